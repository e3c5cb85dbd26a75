//! Session host configuration.
//!
//! Every field has a default, so `{}` is a valid config file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mip_protocol::{ApplicationInfo, ContextConfig, LogLevel};
use serde::{Deserialize, Serialize};

use crate::auth::{APPLICATION_NAME, APPLICATION_VERSION};
use crate::error::{Error, Result};

pub const DEFAULT_LOCALE: &str = "en-US";

pub const DEFAULT_DATA_PATH: &str = "mip_data";

/// Settings the host builds its shared context and engines from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
	/// Locale every engine is created with.
	pub locale: String,
	/// Directory the backend keeps its state and logs in.
	pub data_path: PathBuf,
	pub log_level: LogLevel,
	pub offline: bool,
	pub application_name: String,
	pub application_version: String,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self {
			locale: DEFAULT_LOCALE.to_string(),
			data_path: PathBuf::from(DEFAULT_DATA_PATH),
			log_level: LogLevel::default(),
			offline: false,
			application_name: APPLICATION_NAME.to_string(),
			application_version: APPLICATION_VERSION.to_string(),
		}
	}
}

impl HostConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_json(&content)
	}

	/// Loads `path`, falling back to defaults when the file does not exist.
	///
	/// A file that exists but cannot be read or parsed is still an error.
	pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
		match Self::from_file(path) {
			Err(Error::ConfigIo { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
			other => other,
		}
	}

	/// Shared context settings for an application whose id is `application_id`.
	pub(crate) fn context_config(&self, application_id: String) -> ContextConfig {
		ContextConfig {
			app_info: ApplicationInfo {
				application_id,
				application_name: self.application_name.clone(),
				application_version: self.application_version.clone(),
			},
			data_path: self.data_path.clone(),
			log_level: self.log_level,
			offline: self.offline,
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let config = HostConfig::from_json("{}").unwrap();
		assert_eq!(config, HostConfig::default());
		assert_eq!(config.locale, "en-US");
		assert_eq!(config.data_path, PathBuf::from("mip_data"));
		assert_eq!(config.log_level, LogLevel::Trace);
	}

	#[test]
	fn reads_camel_case_fields() {
		let config = HostConfig::from_json(r#"{"locale": "de-DE", "dataPath": "/var/lib/mip", "logLevel": "warning", "offline": true}"#).unwrap();
		assert_eq!(config.locale, "de-DE");
		assert_eq!(config.data_path, PathBuf::from("/var/lib/mip"));
		assert_eq!(config.log_level, LogLevel::Warning);
		assert!(config.offline);
		assert_eq!(config.application_name, APPLICATION_NAME);
	}

	#[test]
	fn missing_file_falls_back_to_defaults() {
		let temp = TempDir::new().unwrap();
		let config = HostConfig::load_or_default(temp.path().join("mip.json")).unwrap();
		assert_eq!(config, HostConfig::default());
	}

	#[test]
	fn malformed_file_is_an_error() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("mip.json");
		fs::write(&path, "{ not json").unwrap();
		assert!(matches!(HostConfig::load_or_default(&path), Err(Error::ConfigParse(_))));
	}

	#[test]
	fn context_config_carries_application_identity() {
		let config = HostConfig {
			application_name: "labeler".into(),
			..HostConfig::default()
		};
		let context = config.context_config("client-1".into());
		assert_eq!(context.app_info.application_id, "client-1");
		assert_eq!(context.app_info.application_name, "labeler");
		assert!(!context.offline);
	}
}
