use crate::action::{Action, ActionContext};
use crate::status::Status;
use provisio_store::Profile;
use tracing::{debug, warn};

struct Recorded {
    phase_id: String,
    action: Box<dyn Action>,
}

/// Transaction context of one engine run.
///
/// Owns the staged copy of the profile and a single execution-ordered log
/// of every action that was executed, across all phases.
pub struct Session {
    profile: Profile,
    log: Vec<Recorded>,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            log: Vec::new(),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn into_profile(self) -> Profile {
        self.profile
    }

    /// Number of actions in the log.
    pub fn recorded(&self) -> usize {
        self.log.len()
    }

    /// Execute `action` against the staged profile. It is recorded only if
    /// the execution was not fatal; a failed action is never undone.
    pub fn execute(&mut self, phase_id: &str, mut action: Box<dyn Action>) -> Status {
        let status = action.execute(&mut ActionContext {
            phase_id,
            profile: &mut self.profile,
        });
        debug!("{phase_id}: {} -> {}", action.id(), status.severity());
        if !status.is_fatal() {
            self.record(phase_id, action);
        }
        status
    }

    pub fn record(&mut self, phase_id: &str, action: Box<dyn Action>) {
        self.log.push(Recorded {
            phase_id: phase_id.to_owned(),
            action,
        });
    }

    /// Undo every recorded action exactly once, newest first. Undo failures
    /// are reported as warnings; the log is empty afterwards.
    pub fn rollback(&mut self) -> Status {
        let mut status = Status::multi("rollback");
        while let Some(mut entry) = self.log.pop() {
            let undone = entry.action.undo(&mut ActionContext {
                phase_id: &entry.phase_id,
                profile: &mut self.profile,
            });
            if !undone.is_ok() {
                warn!(
                    "undo of {} in phase {} failed: {undone}",
                    entry.action.id(),
                    entry.phase_id
                );
                status.add(Status::warning(format!(
                    "undo of {} in phase {} failed: {}",
                    entry.action.id(),
                    entry.phase_id,
                    undone
                )));
            }
        }
        status
    }
}
