//! Sensitivity labels and label-apply options.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A sensitivity label from the backend's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	/// Relative ordering; higher is more restrictive.
	#[serde(default)]
	pub sensitivity: i32,
	#[serde(default = "default_true")]
	pub is_active: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<String>,
	/// Whether applying this label also applies protection.
	#[serde(default)]
	pub protects_content: bool,
}

fn default_true() -> bool {
	true
}

/// The label currently applied to a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLabel {
	pub label: Label,
	pub assignment_method: AssignmentMethod,
	pub is_protection_applied_from_label: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub justification: Option<String>,
}

/// How a label assignment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMethod {
	/// Regular user action.
	#[default]
	Standard,
	/// Administrative override.
	Privileged,
	/// Applied automatically by policy.
	Auto,
}

impl fmt::Display for AssignmentMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AssignmentMethod::Standard => write!(f, "standard"),
			AssignmentMethod::Privileged => write!(f, "privileged"),
			AssignmentMethod::Auto => write!(f, "auto"),
		}
	}
}

impl std::str::FromStr for AssignmentMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"standard" => Ok(AssignmentMethod::Standard),
			"privileged" => Ok(AssignmentMethod::Privileged),
			"auto" => Ok(AssignmentMethod::Auto),
			_ => Err(format!("unknown assignment method: {s}")),
		}
	}
}

/// Options sent along with a label-apply request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelingOptions {
	pub assignment_method: AssignmentMethod,
	pub is_downgrade_justified: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub justification_message: Option<String>,
}

impl LabelingOptions {
	/// Builds options for a caller request.
	///
	/// A non-empty justification always yields a justified, `Standard`
	/// assignment, whatever method was requested.
	pub fn for_request(method: AssignmentMethod, justification: Option<&str>) -> Self {
		match justification.filter(|text| !text.is_empty()) {
			Some(text) => Self {
				assignment_method: AssignmentMethod::Standard,
				is_downgrade_justified: true,
				justification_message: Some(text.to_string()),
			},
			None => Self {
				assignment_method: method,
				is_downgrade_justified: false,
				justification_message: None,
			},
		}
	}
}
