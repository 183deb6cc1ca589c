//! Task parameters for annotators and parameter negotiation for codecs.
//!
//! Annotators take a query-string style task description:
//!
//! ```text
//!   tokenLayer=word&phoneLayer=phone&language=en+NZ
//! ```
//!
//! Serializers and deserializers instead negotiate a [`ParameterSet`]: the
//! codec returns the parameters it still needs, the caller fills in values
//! and hands the set back until nothing required is missing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{Error, Result};

// =============================================================================
// Task parameters
// =============================================================================

/// Parsed `key=value&key=value` task description.
///
/// Keys keep their first-seen order; a repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameters {
    entries: Vec<(String, String)>,
}

impl TaskParameters {
    /// Parse a non-empty parameter string.
    ///
    /// Pairs are `application/x-www-form-urlencoded`: `+` decodes to a space
    /// and `%XX` to the byte it names. A pair with no `=` is a flag with an
    /// empty value.
    pub fn parse(params: &str) -> Result<Self> {
        if params.trim().is_empty() {
            return Err(Error::configuration("task parameters are empty"));
        }
        check_escapes(params)?;
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
            if key.is_empty() {
                return Err(Error::configuration(format!("parameter '={value}' has no name")));
            }
            parsed.set(key, value);
        }
        Ok(parsed)
    }

    /// Parse `params`, falling back to `default` when absent.
    ///
    /// With neither, the call is a configuration error.
    pub fn resolve(params: Option<&str>, default: Option<&str>) -> Result<Self> {
        match (params, default) {
            (Some(p), _) => Self::parse(p),
            (None, Some(d)) => Self::parse(d),
            (None, None) => Err(Error::configuration(
                "task parameters are required and no default is defined",
            )),
        }
    }

    /// Set (or replace) a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw value, or a configuration error naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::configuration(format!("missing task parameter '{key}'")))
    }

    /// Value converted with `FromStr`, if present.
    pub fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    Error::configuration(format!("task parameter '{key}'='{raw}': {e}"))
                })
            })
            .transpose()
    }

    /// Flag value: present with an empty value, `true`, `on`, `yes` or `1`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(str::to_ascii_lowercase).as_deref(),
            Some("" | "true" | "on" | "yes" | "1")
        )
    }

    /// True if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for TaskParameters {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Reject `%` not followed by two hex digits; the form decoder would keep
/// such text literally.
fn check_escapes(raw: &str) -> Result<()> {
    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(Error::configuration(format!("bad escape at byte {i} in '{raw}'")));
        }
    }
    Ok(())
}

// =============================================================================
// Parameter negotiation
// =============================================================================

/// One named setting a codec needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Key.
    pub name: String,
    /// Short display name; the key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Longer help text; the label when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether a value must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Current or suggested value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Allowed values, when the choice is closed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<Value>,
}

impl Parameter {
    /// Optional parameter with no value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            hint: None,
            required: false,
            value: None,
            possible_values: Vec::new(),
        }
    }

    /// Mark as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Set the value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Add an allowed value.
    #[must_use]
    pub fn with_possible_value(mut self, value: impl Into<Value>) -> Self {
        self.possible_values.push(value.into());
        self
    }

    /// Display name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Help text.
    #[must_use]
    pub fn hint(&self) -> &str {
        self.hint.as_deref().unwrap_or_else(|| self.label())
    }

    /// Value as a string, if it is one.
    #[must_use]
    pub fn str_value(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    /// Required but without a usable value.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.required && matches!(self.value, None | Some(Value::Null))
    }
}

/// Ordered set of parameters keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter, keeping its position if replaced.
    pub fn add(&mut self, parameter: Parameter) {
        match self.parameters.iter_mut().find(|p| p.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => self.parameters.push(parameter),
        }
    }

    /// Builder form of [`Self::add`].
    #[must_use]
    pub fn with(mut self, parameter: Parameter) -> Self {
        self.add(parameter);
        self
    }

    /// Parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Set a parameter's value; unknown names are a configuration error.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let parameter = self
            .parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::configuration(format!("unknown parameter '{name}'")))?;
        let value = value.into();
        if !parameter.possible_values.is_empty() && !parameter.possible_values.contains(&value) {
            return Err(Error::configuration(format!(
                "'{value}' is not an allowed value for parameter '{name}'"
            )));
        }
        parameter.value = Some(value);
        Ok(())
    }

    /// Copy values for names present in both sets.
    pub fn merge_values(&mut self, other: &ParameterSet) {
        for parameter in &mut self.parameters {
            if let Some(value) = other.get(&parameter.name).and_then(|p| p.value.clone()) {
                parameter.value = Some(value);
            }
        }
    }

    /// Required parameters that still lack a value.
    #[must_use]
    pub fn missing(&self) -> Vec<&Parameter> {
        self.parameters.iter().filter(|p| p.is_missing()).collect()
    }

    /// Configuration error naming every missing required parameter.
    pub fn check_complete(&self) -> Result<()> {
        let missing: Vec<&str> = self.missing().iter().map(|p| p.name.as_str()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )))
        }
    }

    /// Parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.parameters.iter()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// True if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut set = Self::new();
        for parameter in iter {
            set.add(parameter);
        }
        set
    }
}
