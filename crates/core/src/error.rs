//! Error taxonomy for session, credential, and labeling operations.

use std::path::PathBuf;

use mip_protocol::Capability;

use crate::backend::BackendError;
use crate::credential::CredentialError;

/// Errors surfaced by the session host and the labeled-file facade.
///
/// Validation variants are raised before any backend call is made.
/// Backend failures are passed through unmodified.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The operation needs a live session (or a running engine).
	#[error("not connected: {context}; call authenticate first")]
	NotConnected { context: String },

	#[error("invalid path: {reason}")]
	InvalidPath { reason: String },

	#[error("path does not exist: {}", path.display())]
	NotFound { path: PathBuf },

	#[error("invalid argument `{name}`: {message}")]
	InvalidArgument { name: &'static str, message: String },

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Backend(#[from] BackendError),

	#[error(transparent)]
	Runtime(#[from] mip_runtime::RuntimeError),

	#[error("failed to read config {}: {source}", path.display())]
	ConfigIo {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config: {0}")]
	ConfigParse(#[from] serde_json::Error),
}

impl Error {
	pub(crate) fn not_connected(operation: &str) -> Self {
		Error::NotConnected {
			context: format!("`{operation}` requires an authenticated session"),
		}
	}

	pub(crate) fn capability_not_connected(capability: Capability, operation: &str) -> Self {
		Error::NotConnected {
			context: format!("`{operation}` of the {capability} engine requires an authenticated session"),
		}
	}

	pub(crate) fn engine_not_running(capability: Capability, operation: &str) -> Self {
		Error::NotConnected {
			context: format!("`{operation}` requires the {capability} engine, which is not running"),
		}
	}

	/// Returns `true` for lifecycle errors that `authenticate` resolves.
	pub fn is_not_connected(&self) -> bool {
		matches!(self, Error::NotConnected { .. })
	}
}

pub type Result<T> = std::result::Result<T, Error>;
