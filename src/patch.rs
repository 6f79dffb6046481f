//! The patch wire format.

use crate::error::PatchError;
use core::{fmt, str::FromStr};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Property name → new value, in producer order.
pub type PropertyDelta = IndexMap<String, Value>;

/// One mutation instruction, as received.
///
/// `action` stays a string so that unknown actions can be skipped individually.
/// `data` is decoded lazily per action, see [`Patch::payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
	pub action: String,
	pub html_id: String,
	#[serde(default)]
	pub data: Value,
}

impl Patch {
	pub fn new(action: Action, html_id: impl Into<String>, data: Value) -> Self {
		Self {
			action: action.as_str().to_owned(),
			html_id: html_id.into(),
			data,
		}
	}

	pub fn action(&self) -> Result<Action, PatchError> {
		self.action.parse()
	}

	/// Decodes `data` into the payload type of this patch's action.
	///
	/// A missing `data` is treated as an empty object.
	pub fn payload<T: DeserializeOwned>(&self) -> Result<T, PatchError> {
		let data = match &self.data {
			Value::Null => Value::Object(serde_json::Map::new()),
			data => data.clone(),
		};
		Ok(serde_json::from_value(data)?)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
	Insert,
	Remove,
	Update,
	Move,
	Replace,
}

impl Action {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Action::Insert => "INSERT",
			Action::Remove => "REMOVE",
			Action::Update => "UPDATE",
			Action::Move => "MOVE",
			Action::Replace => "REPLACE",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = PatchError;

	fn from_str(action: &str) -> Result<Self, Self::Err> {
		Ok(match action {
			"INSERT" => Action::Insert,
			"REMOVE" => Action::Remove,
			"UPDATE" => Action::Update,
			"MOVE" => Action::Move,
			"REPLACE" => Action::Replace,
			action => return Err(PatchError::UnknownAction { action: action.to_owned() }),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsertData {
	pub parent_html_id: String,
	pub html: String,
	#[serde(default)]
	pub props: Option<PropertyDelta>,
	#[serde(default)]
	pub before_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateData {
	pub props: PropertyDelta,
	#[serde(default)]
	pub old_props: Option<PropertyDelta>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoveData {
	pub parent_html_id: String,
	#[serde(default)]
	pub before_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplaceData {
	pub new_html: String,
	#[serde(default)]
	pub new_props: Option<PropertyDelta>,
}

/// Renders a property value the way a script host would stringify it.
///
/// Integral numbers lose their fractional part (`3.0` → `"3"`), strings are taken verbatim.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
	match value {
		Value::String(string) => string.clone(),
		Value::Null => "null".to_owned(),
		Value::Bool(b) => b.to_string(),
		Value::Number(number) => match number.as_f64() {
			Some(f) if number.is_f64() && f == 0.0 => "0".to_owned(),
			// Below 1e21, integral values are written out in full: shortest digits, zero-padded, no exponent.
			Some(f) if number.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => f.to_string(),
			_ => number.to_string(),
		},
		Value::Array(items) => items.iter().map(value_to_string).collect::<Vec<_>>().join(","),
		Value::Object(_) => "[object Object]".to_owned(),
	}
}

/// Script-style truthiness, used for controller initialisation flags.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(number) => number.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
		Value::String(string) => !string.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}
