use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(StructuralRole {
    Title => "title",
    Subtitle => "subtitle",
    Body => "body",
});

str_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(DocumentStatus {
    Analyzing => "analyzing",
    Completed => "completed",
    Error => "error",
});

str_enum!(ActivityType {
    Reading => "reading",
    Extracting => "extracting",
    Reviewing => "reviewing",
    Storing => "storing",
    Summarizing => "summarizing",
    Complete => "complete",
});

str_enum!(ActivityStatus {
    InProgress => "in_progress",
    Done => "done",
    Error => "error",
});

str_enum!(JobStatus {
    InProgress => "in_progress",
    Summarizing => "summarizing",
    Done => "done",
    Errored => "errored",
    Cancelled => "cancelled",
});

impl JobStatus {
    /// Terminal states are sticky: once reached, the snapshot never changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn risk_level_roundtrip() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let parsed = RiskLevel::from_str(level.as_str()).unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn activity_type_roundtrip() {
        for ty in [
            ActivityType::Reading,
            ActivityType::Extracting,
            ActivityType::Reviewing,
            ActivityType::Storing,
            ActivityType::Summarizing,
            ActivityType::Complete,
        ] {
            assert_eq!(ActivityType::from_str(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn invalid_enum_value_rejected() {
        assert!(JobStatus::from_str("paused").is_err());
        assert!(RiskLevel::from_str("").is_err());
    }

    #[test]
    fn job_status_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Errored.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(!JobStatus::Summarizing.is_terminal());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ActivityStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: JobStatus = serde_json::from_str("\"summarizing\"").unwrap();
        assert_eq!(parsed, JobStatus::Summarizing);
    }
}
