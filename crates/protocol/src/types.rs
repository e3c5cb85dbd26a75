//! Context, capability, and engine identity types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An independent backend subsystem with its own profile/engine pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
	/// File labeling and classification.
	Labeling,
	/// Encryption and decryption.
	Protection,
	/// Policy evaluation.
	Policy,
}

impl Capability {
	/// Every capability, in the order the host starts them.
	pub const ALL: [Capability; 3] = [Capability::Labeling, Capability::Protection, Capability::Policy];

	pub fn as_str(self) -> &'static str {
		match self {
			Capability::Labeling => "labeling",
			Capability::Protection => "protection",
			Capability::Policy => "policy",
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Capability {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"labeling" | "file" => Ok(Capability::Labeling),
			"protection" => Ok(Capability::Protection),
			"policy" => Ok(Capability::Policy),
			_ => Err(format!("unknown capability: {s}")),
		}
	}
}

/// Lifecycle phase of a capability's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
	#[default]
	Absent,
	Starting,
	Running,
	Stopping,
}

impl fmt::Display for EngineState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EngineState::Absent => write!(f, "absent"),
			EngineState::Starting => write!(f, "starting"),
			EngineState::Running => write!(f, "running"),
			EngineState::Stopping => write!(f, "stopping"),
		}
	}
}

/// Identity of the application calling the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
	pub application_id: String,
	pub application_name: String,
	pub application_version: String,
}

/// The principal an engine runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub email: String,
}

impl Identity {
	pub fn new(email: impl Into<String>) -> Self {
		Self { email: email.into() }
	}
}

/// Answer to a backend consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Consent {
	Accept,
	AcceptAlways,
	Reject,
}

/// Where a profile keeps its cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheStorageType {
	#[default]
	InMemory,
	OnDisk,
	OnDiskEncrypted,
}

/// Verbosity of the backend's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	#[default]
	Trace,
	Info,
	Warning,
	Error,
}

/// Settings the shared backend context is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
	pub app_info: ApplicationInfo,
	/// Directory for backend telemetry and state.
	pub data_path: PathBuf,
	pub log_level: LogLevel,
	pub offline: bool,
}

/// Backend-assigned identifier of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for EngineId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
