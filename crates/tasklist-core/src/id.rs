use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};

/// Identifier of a task, assigned by the store on insert.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Raw integer value as stored in the database.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn task_id_parses_trimmed_integers() {
        let parsed: TaskId = " 42 ".parse().expect("must parse task id");
        assert_eq!(parsed, TaskId(42));
        assert_eq!(parsed.to_string(), "42");
    }

    #[test]
    fn task_id_rejects_garbage() {
        assert!("forty-two".parse::<TaskId>().is_err());
    }

    #[test]
    fn task_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&TaskId(7)).expect("serialize id");
        assert_eq!(json, "7");
    }
}
