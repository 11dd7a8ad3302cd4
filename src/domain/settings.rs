//! Persisted configuration entries and their typed values.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

/// Upper bound for `category` and `key_name`, matching the column widths.
pub const MAX_IDENTIFIER_LEN: usize = 255;

const TRUE_WORDS: [&str; 4] = ["1", "true", "yes", "on"];
const FALSE_WORDS: [&str; 5] = ["", "0", "false", "no", "off"];

/// How a stored setting value is edited and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Text,
    Numeric,
    Bool,
    Textarea,
    Select,
    SelectPage,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Numeric => "numeric",
            ValueType::Bool => "bool",
            ValueType::Textarea => "textarea",
            ValueType::Select => "select",
            ValueType::SelectPage => "select-page",
        }
    }
}

impl FromStr for ValueType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(ValueType::Text),
            "numeric" => Ok(ValueType::Numeric),
            "bool" => Ok(ValueType::Bool),
            "textarea" => Ok(ValueType::Textarea),
            "select" => Ok(ValueType::Select),
            "select-page" => Ok(ValueType::SelectPage),
            other => Err(DomainError::UnknownValueType(other.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded setting value.
///
/// Serialises untagged, so the JSON form is the plain value (`true`, `2.5`,
/// `"text"`, `[..]`, `{..}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    #[default]
    Null,
    Bool(bool),
    Numeric(f64),
    Text(String),
    List(Vec<SettingValue>),
    Map(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn empty_list() -> Self {
        SettingValue::List(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SettingValue::Null)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, SettingValue::List(_) | SettingValue::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Numeric(number) => Some(*number),
            SettingValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, SettingValue>> {
        match self {
            SettingValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up one field of a structured value.
    pub fn get(&self, field: &str) -> Option<&SettingValue> {
        self.as_map().and_then(|map| map.get(field))
    }

    /// Loose truthiness used when a caller asks for a boolean.
    pub fn is_truthy(&self) -> bool {
        match self {
            SettingValue::Null => false,
            SettingValue::Bool(flag) => *flag,
            SettingValue::Numeric(number) => *number != 0.0,
            SettingValue::Text(text) => {
                let normalized = text.trim().to_ascii_lowercase();
                !FALSE_WORDS.contains(&normalized.as_str())
            }
            SettingValue::List(items) => !items.is_empty(),
            SettingValue::Map(map) => !map.is_empty(),
        }
    }

    /// Coerce `self` toward the shape of `default`.
    ///
    /// Boolean defaults force truthiness, list and map defaults force a
    /// collection, every other default passes the value through.
    pub fn coerce_like(self, default: &SettingValue) -> SettingValue {
        match default {
            SettingValue::Bool(_) => SettingValue::Bool(self.is_truthy()),
            SettingValue::List(_) | SettingValue::Map(_) => match self {
                SettingValue::Null => SettingValue::empty_list(),
                value if value.is_collection() => value,
                scalar => SettingValue::List(vec![scalar]),
            },
            _ => self,
        }
    }

    /// Text form written to the `value` column.
    pub fn to_stored_text(&self) -> String {
        match self {
            SettingValue::Null => String::new(),
            SettingValue::Bool(true) => "1".to_string(),
            SettingValue::Bool(false) => "0".to_string(),
            SettingValue::Numeric(number) => format_number(*number),
            SettingValue::Text(text) => text.clone(),
            structured => serde_json::to_string(structured).unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.clone())
    }
}

fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Numeric(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Numeric(value as f64)
    }
}

impl From<Vec<SettingValue>> for SettingValue {
    fn from(value: Vec<SettingValue>) -> Self {
        SettingValue::List(value)
    }
}

impl From<BTreeMap<String, SettingValue>> for SettingValue {
    fn from(value: BTreeMap<String, SettingValue>) -> Self {
        SettingValue::Map(value)
    }
}

impl From<serde_json::Value> for SettingValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => SettingValue::Null,
            Value::Bool(flag) => SettingValue::Bool(flag),
            Value::Number(number) => number
                .as_f64()
                .map(SettingValue::Numeric)
                .unwrap_or_else(|| SettingValue::Text(number.to_string())),
            Value::String(text) => SettingValue::Text(text),
            Value::Array(items) => {
                SettingValue::List(items.into_iter().map(SettingValue::from).collect())
            }
            Value::Object(map) => SettingValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, SettingValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<SettingValue> for serde_json::Value {
    fn from(value: SettingValue) -> Self {
        use serde_json::Value;

        match value {
            SettingValue::Null => Value::Null,
            SettingValue::Bool(flag) => Value::Bool(flag),
            SettingValue::Numeric(number) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SettingValue::Text(text) => Value::String(text),
            SettingValue::List(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            SettingValue::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// A persisted configuration entry. `(category, key_name)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Setting {
    pub id: Uuid,
    pub category: String,
    pub key_name: String,
    pub value: String,
    pub value_type: ValueType,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
}

impl Setting {
    pub fn new(
        category: impl Into<String>,
        key_name: impl Into<String>,
        value_type: ValueType,
        value: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            key_name: key_name.into(),
            value: value.into(),
            value_type,
            created: now,
            modified: now,
        }
    }

    /// Decode the stored text according to `value_type`.
    pub fn typed_value(&self) -> SettingValue {
        match self.value_type {
            ValueType::Bool => {
                let normalized = self.value.trim().to_ascii_lowercase();
                SettingValue::Bool(TRUE_WORDS.contains(&normalized.as_str()))
            }
            ValueType::Numeric => self
                .value
                .trim()
                .parse::<f64>()
                .map(SettingValue::Numeric)
                .unwrap_or_else(|_| SettingValue::Text(self.value.clone())),
            ValueType::Text | ValueType::Textarea | ValueType::Select | ValueType::SelectPage => {
                decode_structured(&self.value)
                    .unwrap_or_else(|| SettingValue::Text(self.value.clone()))
            }
        }
    }

    /// Replace the stored value, encoding it for this setting's `value_type`.
    pub fn assign(&mut self, value: &SettingValue) {
        self.value = match (self.value_type, value) {
            (ValueType::Bool, value) => SettingValue::Bool(value.is_truthy()).to_stored_text(),
            (ValueType::Numeric, SettingValue::Text(text)) => text.trim().to_string(),
            (_, value) => value.to_stored_text(),
        };
        self.modified = OffsetDateTime::now_utc();
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_identifier("category", &self.category)?;
        validate_identifier("key_name", &self.key_name)?;

        match self.value_type {
            ValueType::Numeric => {
                let parsed = self.value.trim().parse::<f64>();
                if !matches!(parsed, Ok(number) if number.is_finite()) {
                    return Err(DomainError::validation(
                        "value",
                        format!("`{}` is not a number", self.value),
                    ));
                }
            }
            ValueType::Bool => {
                if !matches!(self.value.trim(), "0" | "1" | "true" | "false") {
                    return Err(DomainError::validation(
                        "value",
                        format!("`{}` is not a boolean flag", self.value),
                    ));
                }
            }
            ValueType::Text => {
                if self.value.trim().is_empty() {
                    return Err(DomainError::validation("value", "text must not be empty"));
                }
            }
            ValueType::Textarea | ValueType::Select | ValueType::SelectPage => {}
        }

        Ok(())
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    Ok(())
}

fn decode_structured(raw: &str) -> Option<SettingValue> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<SettingValue>(trimmed).ok()
}
