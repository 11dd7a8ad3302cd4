//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Queue names understood by the job runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    WarmSettings,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::WarmSettings => "warm_settings",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "warm_settings" => Ok(JobType::WarmSettings),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_names_round_trip() {
        assert_eq!(
            JobType::try_from(JobType::WarmSettings.as_str()),
            Ok(JobType::WarmSettings)
        );
        assert!(JobType::try_from("render_post").is_err());
    }
}
