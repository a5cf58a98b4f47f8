//! Runtime outcomes of phases, operands and actions.
//!
//! Engine-level failures are reported as values rather than errors: every
//! hook and action returns a [`Status`], and statuses are aggregated into a
//! tree whose severity is the worst severity of its leaves.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Warning,
    Error,
    Cancel,
}

impl Severity {
    /// ERROR and CANCEL abort the run.
    pub fn is_fatal(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiStatus {
    pub message: String,
    pub children: Vec<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Single(Outcome),
    Multi(MultiStatus),
}

impl Status {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Status::Single(Outcome {
            severity,
            message: message.into(),
        })
    }

    pub fn ok() -> Self {
        Self::new(Severity::Ok, "")
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn cancel(message: impl Into<String>) -> Self {
        Self::new(Severity::Cancel, message)
    }

    /// An empty aggregate; OK until a worse child is added.
    pub fn multi(message: impl Into<String>) -> Self {
        Status::Multi(MultiStatus {
            message: message.into(),
            children: Vec::new(),
        })
    }

    pub fn severity(&self) -> Severity {
        match self {
            Status::Single(outcome) => outcome.severity,
            Status::Multi(multi) => multi
                .children
                .iter()
                .map(Status::severity)
                .max()
                .unwrap_or(Severity::Ok),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.severity() == Severity::Ok
    }

    pub fn is_fatal(&self) -> bool {
        self.severity().is_fatal()
    }

    pub fn is_cancel(&self) -> bool {
        self.severity() == Severity::Cancel
    }

    pub fn message(&self) -> &str {
        match self {
            Status::Single(outcome) => &outcome.message,
            Status::Multi(multi) => &multi.message,
        }
    }

    pub fn children(&self) -> &[Status] {
        match self {
            Status::Single(_) => &[],
            Status::Multi(multi) => &multi.children,
        }
    }

    /// Append `child`. A single status is first promoted to an aggregate
    /// holding itself, so nothing already reported is lost.
    pub fn add(&mut self, child: Status) {
        if let Status::Single(_) = self {
            let previous = std::mem::replace(self, Status::ok());
            let message = previous.message().to_owned();
            *self = Status::Multi(MultiStatus {
                message,
                children: vec![previous],
            });
        }
        if let Status::Multi(multi) = self {
            multi.children.push(child);
        }
    }

    /// Adopt the children of `other` (or `other` itself when it is single).
    pub fn merge(&mut self, other: Status) {
        match other {
            Status::Multi(multi) => {
                for child in multi.children {
                    self.add(child);
                }
            }
            single => self.add(single),
        }
    }

    /// Every non-OK leaf of the tree, depth first.
    pub fn problems(&self) -> Vec<&Outcome> {
        let mut out = Vec::new();
        self.collect_problems(&mut out);
        out
    }

    fn collect_problems<'a>(&'a self, out: &mut Vec<&'a Outcome>) {
        match self {
            Status::Single(outcome) if outcome.severity != Severity::Ok => out.push(outcome),
            Status::Single(_) => {}
            Status::Multi(multi) => {
                for child in &multi.children {
                    child.collect_problems(out);
                }
            }
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let problems = self.problems();
        match problems.first() {
            Some(first) if self.message().is_empty() => {
                write!(f, "{}: {}", self.severity(), first.message)
            }
            _ => write!(f, "{}: {}", self.severity(), self.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Cancel);
        assert!(!Severity::Warning.is_fatal());
        assert!(Severity::Error.is_fatal());
        assert!(Severity::Cancel.is_fatal());
    }

    #[test]
    fn multi_status_takes_worst_child() {
        let mut status = Status::multi("phase");
        assert!(status.is_ok());
        status.add(Status::warning("slow"));
        assert_eq!(status.severity(), Severity::Warning);
        status.add(Status::error("boom"));
        status.add(Status::ok());
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.children().len(), 3);
    }

    #[test]
    fn adding_to_single_keeps_original() {
        let mut status = Status::error("first");
        status.add(Status::warning("second"));
        assert_eq!(status.children().len(), 2);
        assert_eq!(status.children()[0].message(), "first");
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn merge_flattens_multi_children() {
        let mut target = Status::multi("run");
        let mut rollback = Status::multi("rollback");
        rollback.add(Status::warning("undo a"));
        rollback.add(Status::warning("undo b"));
        target.merge(rollback);
        assert_eq!(target.children().len(), 2);
        assert_eq!(target.problems().len(), 2);
    }

    #[test]
    fn nested_problems_are_found() {
        let mut inner = Status::multi("operand");
        inner.add(Status::ok());
        inner.add(Status::error("action failed"));
        let mut outer = Status::multi("phase");
        outer.add(inner);
        let problems = outer.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message, "action failed");
        assert_eq!(outer.to_string(), "error: phase");
    }
}
