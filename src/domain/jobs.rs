//! Queued units of work.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument that identifies the entity a message works on.
pub const IDENTITY_ARGUMENT: &str = "id";
/// Identity reported for messages without a usable `id` argument.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// One delivery of queued work.
///
/// The attempt counter travels alongside the arguments as `_attempt` and
/// defaults to zero for messages produced without one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "_attempt", default)]
    pub attempt: u32,
    #[serde(flatten)]
    pub arguments: Map<String, Value>,
}

impl JobMessage {
    pub fn new(arguments: Map<String, Value>) -> Self {
        Self {
            attempt: 0,
            arguments,
        }
    }

    /// Build a message from any payload that serialises to a JSON object.
    pub fn from_payload<P: Serialize>(payload: &P) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(payload)?)
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Returns the argument unless it is absent or JSON `null`.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|value| !value.is_null())
    }

    pub fn identity(&self) -> String {
        match self.arguments.get(IDENTITY_ARGUMENT) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => UNKNOWN_IDENTITY.to_string(),
        }
    }

    /// The message to deliver for the next attempt: same arguments, counter + 1.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            arguments: self.arguments.clone(),
        }
    }
}
