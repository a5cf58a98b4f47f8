//! Touchpoint instruction bodies: `name(key:value,...);name(...)`.

use crate::phase::Parameters;
use crate::CoreError;

/// One parsed call of an instruction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall {
    pub name: String,
    pub args: Vec<(String, String)>,
}

impl ActionCall {
    /// Resolve a short action name against a comma-separated import list.
    ///
    /// Qualified names are returned as they are. A short name maps to the
    /// first import whose last `.`-segment equals it.
    pub fn resolve(&self, import: Option<&str>) -> String {
        if self.name.contains('.') {
            return self.name.clone();
        }
        import
            .into_iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .find(|qualified| qualified.rsplit('.').next() == Some(self.name.as_str()))
            .map_or_else(|| self.name.clone(), str::to_owned)
    }

    /// Arguments with `${...}` references substituted from `params`.
    pub fn substituted_args(&self, params: &Parameters) -> Parameters {
        self.args
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v, params)))
            .collect()
    }
}

/// Parse an instruction body into its calls.
///
/// Statements are separated by `;`, arguments by `,`, and each argument is
/// split on its first `:`. Blank statements are ignored.
pub fn parse_instruction(body: &str) -> Result<Vec<ActionCall>, CoreError> {
    let mut calls = Vec::new();
    for statement in body.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        let open = statement
            .find('(')
            .ok_or_else(|| CoreError::Instruction(format!("missing '(' in {statement:?}")))?;
        if !statement.ends_with(')') {
            return Err(CoreError::Instruction(format!(
                "missing ')' in {statement:?}"
            )));
        }
        let name = statement[..open].trim();
        if name.is_empty() {
            return Err(CoreError::Instruction(format!(
                "missing action name in {statement:?}"
            )));
        }
        let inner = &statement[open + 1..statement.len() - 1];
        let mut args = Vec::new();
        for arg in inner.split(',') {
            let arg = arg.trim();
            if arg.is_empty() {
                continue;
            }
            let (key, value) = arg.split_once(':').ok_or_else(|| {
                CoreError::Instruction(format!("argument {arg:?} of {name} lacks ':'"))
            })?;
            args.push((key.trim().to_owned(), value.trim().to_owned()));
        }
        calls.push(ActionCall {
            name: name.to_owned(),
            args,
        });
    }
    Ok(calls)
}

/// Replace `${name}` with the parameter value and `${#NN}` with the character
/// of decimal code `NN`. Unknown references are left untouched.
pub fn substitute(value: &str, params: &Parameters) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        let replacement = match name.strip_prefix('#') {
            Some(code) => code.parse::<u32>().ok().and_then(char::from_u32).map(String::from),
            None => params.get(name).cloned(),
        };
        match replacement {
            Some(r) => out.push_str(&r),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
