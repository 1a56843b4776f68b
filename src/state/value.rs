use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Accumulated key/value document carried by a workflow run.
pub type StateData = BTreeMap<String, StateValue>;

/// A structured value stored in [`StateData`].
///
/// Serializes to plain JSON so a stored run stays a readable nested document.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<StateValue>),
    Map(StateData),
}

impl StateValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StateData> {
        match self {
            StateValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    /// Loose truthiness used by conditional skip rules: null, false, zero,
    /// and empty strings/collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            StateValue::Null => false,
            StateValue::Bool(b) => *b,
            StateValue::Number(n) => *n != 0.0,
            StateValue::String(s) => !s.is_empty(),
            StateValue::List(items) => !items.is_empty(),
            StateValue::Map(map) => !map.is_empty(),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StateValue::Null => "null",
            StateValue::Bool(_) => "bool",
            StateValue::Number(_) => "number",
            StateValue::String(_) => "string",
            StateValue::List(_) => "list",
            StateValue::Map(_) => "map",
        }
    }

    /// Convert any serializable record into a stored value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(value)?)
    }

    /// Read a stored value back as a typed record.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

/// Integral numbers are written without a fraction so that typed readers
/// (`u8`, `u32`, ...) accept them again.
impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StateValue::Null => serializer.serialize_unit(),
            StateValue::Bool(b) => serializer.serialize_bool(*b),
            StateValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                if *n >= 0.0 {
                    serializer.serialize_u64(*n as u64)
                } else {
                    serializer.serialize_i64(*n as i64)
                }
            }
            StateValue::Number(n) => serializer.serialize_f64(*n),
            StateValue::String(s) => serializer.serialize_str(s),
            StateValue::List(items) => items.serialize(serializer),
            StateValue::Map(map) => map.serialize(serializer),
        }
    }
}

const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<u32> for StateValue {
    fn from(value: u32) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<usize> for StateValue {
    fn from(value: usize) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::String(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(value)
    }
}

impl<T: Into<StateValue>> From<Vec<T>> for StateValue {
    fn from(values: Vec<T>) -> Self {
        StateValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<StateData> for StateValue {
    fn from(map: StateData) -> Self {
        StateValue::Map(map)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StateValue::Null)
    }
}

/// Builds a [`StateData`] map from `key => value` pairs.
#[macro_export]
macro_rules! state_data {
    () => {
        $crate::state::StateData::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::state::StateData::new();
        $(
            data.insert($key.to_string(), $crate::state::StateValue::from($value));
        )+
        data
    }};
}

/// Merge `updates` into `target` at the top level. Existing keys are
/// overwritten, absent keys are kept.
pub fn merge_state_data(target: &mut StateData, updates: StateData) {
    for (key, value) in updates {
        target.insert(key, value);
    }
}

/// Resolve a dotted path (`"route_work.top_candidate"`) through nested maps.
pub fn lookup_path<'a>(data: &'a StateData, path: &str) -> Option<&'a StateValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}
