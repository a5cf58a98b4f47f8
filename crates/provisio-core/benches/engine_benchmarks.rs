use criterion::{criterion_group, criterion_main, Criterion};
use provisio_core::{
    Engine, Operand, PhaseSet, PropertyOperand, ProvisioningContext, TouchpointManager,
    UnitOperand,
};
use provisio_metadata::{parse_advice_str, AdviceParser, InstallableUnit, Version};
use provisio_store::{profile_from_xml, profile_to_xml, Profile, ProfileRegistry};
use std::sync::Arc;

fn units(count: usize) -> Vec<Arc<InstallableUnit>> {
    let mut advice = String::new();
    for i in 0..count {
        advice.push_str(&format!(
            "units.{i}.id=org.example.bundle{i}\n\
             units.{i}.version=1.0.0.$qualifier$\n\
             units.{i}.provides.0.namespace=osgi.bundle\n\
             units.{i}.provides.0.name=org.example.bundle{i}\n\
             units.{i}.provides.0.version=1.0.0\n\
             units.{i}.requires.0.namespace=osgi.package\n\
             units.{i}.requires.0.name=org.example.api\n\
             units.{i}.requires.0.range=[1.0.0,2.0.0)\n\
             units.{i}.properties.0.name=org.example.vendor\n\
             units.{i}.properties.0.value=Example\n"
        ));
    }
    let map = parse_advice_str(&advice);
    let host = Version::with_qualifier(1, 0, 0, "v20240101").unwrap();
    AdviceParser::new(&host, &map)
        .parse()
        .unwrap()
        .units
        .into_iter()
        .map(|d| Arc::new(d.build().unwrap()))
        .collect()
}

fn populated_profile(count: usize) -> Profile {
    let mut profile = Profile::new("bench");
    profile.set_timestamp(1);
    profile.set_property("installFolder", "/opt/bench");
    for unit in units(count) {
        let key = unit.key();
        profile.add_unit(unit);
        profile.set_unit_property(&key, "startLevel", "4").unwrap();
    }
    profile
}

fn bench_perform_install(c: &mut Criterion) {
    c.bench_function("engine_perform_install_50units", |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let engine = Engine::new(
                    ProfileRegistry::open(dir.path()).unwrap(),
                    TouchpointManager::new(),
                );
                let mut operands: Vec<Operand> = units(50)
                    .into_iter()
                    .map(|u| UnitOperand::install(u).into())
                    .collect();
                operands.push(
                    PropertyOperand::new("installFolder", None, Some("/opt/bench".to_owned()))
                        .unwrap()
                        .into(),
                );
                (dir, engine, operands)
            },
            |(_dir, engine, operands)| {
                let status = engine.perform(
                    &Profile::new("bench"),
                    &PhaseSet::standard().unwrap(),
                    &operands,
                    &ProvisioningContext::new(),
                    None,
                );
                assert!(status.is_ok());
            },
        );
    });
}

fn bench_snapshot_serialize(c: &mut Criterion) {
    let profile = populated_profile(200);
    c.bench_function("profile_to_xml_200units", |b| {
        b.iter(|| profile_to_xml(&profile).unwrap());
    });
}

fn bench_snapshot_parse(c: &mut Criterion) {
    let xml = profile_to_xml(&populated_profile(200)).unwrap();
    c.bench_function("profile_from_xml_200units", |b| {
        b.iter(|| profile_from_xml(&xml, None).unwrap());
    });
}

criterion_group!(
    benches,
    bench_perform_install,
    bench_snapshot_serialize,
    bench_snapshot_parse,
);
criterion_main!(benches);
