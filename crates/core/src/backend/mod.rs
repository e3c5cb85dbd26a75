//! Capability surface of the content-protection backend.
//!
//! The session host drives a backend exclusively through these traits.
//! Calls that are asynchronous in real backends are `async` here and are
//! awaited to completion by the host before it returns to its caller.
//!
//! Disposal is `Drop`: the host drops an engine before the profile that
//! created it, and consumes the context through [`BackendContext::shutdown`].

pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mip_protocol::{CacheStorageType, Capability, ContentLabel, ContextConfig, EngineId, Identity, Label, LabelingOptions};

use crate::auth::AuthDelegate;
use crate::consent::ConsentDelegate;

pub use memory::InMemoryBackend;

/// Opaque failure reported by the backend.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
	message: String,
	#[source]
	source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			source: None,
		}
	}

	pub fn with_source(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
		Self {
			message: message.into(),
			source: Some(Box::new(source)),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Settings a capability profile is loaded with.
#[derive(Clone)]
pub struct ProfileSettings {
	pub capability: Capability,
	pub cache_storage: CacheStorageType,
	pub consent: Arc<dyn ConsentDelegate>,
}

/// Settings an engine is added with.
#[derive(Clone)]
pub struct EngineSettings {
	pub capability: Capability,
	pub identity: Identity,
	/// Callback the backend uses whenever it needs a bearer token.
	pub auth: Arc<dyn AuthDelegate>,
	/// Opaque data stored with the engine.
	pub client_data: String,
	pub locale: String,
	pub load_sensitivity_types: bool,
}

/// Entry point of a backend implementation.
pub trait Backend: Send + Sync {
	/// Declares that `capability` is about to be used.
	fn initialize(&self, capability: Capability) -> BackendResult<()>;

	/// Creates the shared context every profile hangs off.
	fn create_context(&self, config: &ContextConfig) -> BackendResult<Box<dyn BackendContext>>;
}

#[async_trait]
pub trait BackendContext: Send + Sync {
	async fn load_profile(&self, settings: ProfileSettings) -> BackendResult<Box<dyn Profile>>;

	/// Releases all backend resources held by the context.
	fn shutdown(self: Box<Self>);
}

/// Capability-wide settings shared by the engines created from it.
#[async_trait]
pub trait Profile: Send + Sync {
	async fn add_engine(&self, settings: EngineSettings) -> BackendResult<Box<dyn Engine>>;

	/// Asks the backend to forget the engine with `id`.
	async fn delete_engine(&self, id: &EngineId) -> BackendResult<()>;
}

/// A running, authenticated capability instance.
pub trait Engine: Send + Sync {
	fn id(&self) -> &EngineId;

	/// The labeling surface, for engines that have one.
	fn labeling(&self) -> Option<&dyn LabelingEngine> {
		None
	}
}

/// Label catalog and per-file handlers of a labeling engine.
#[async_trait]
pub trait LabelingEngine: Send + Sync {
	async fn create_handler(&self, path: &Path) -> BackendResult<Box<dyn ContentHandler>>;

	fn label_by_id(&self, id: &str) -> BackendResult<Label>;

	/// Every label the engine loaded for its principal.
	fn labels(&self) -> BackendResult<Vec<Label>>;
}

/// Label state of one file, and pending changes to it.
#[async_trait]
pub trait ContentHandler: Send + Sync {
	/// The label currently applied, if any.
	fn label(&self) -> Option<ContentLabel>;

	/// Stages `label` for the next commit.
	fn set_label(&mut self, label: &Label, options: &LabelingOptions) -> BackendResult<()>;

	/// Writes the content with staged changes to `destination`.
	async fn commit(&mut self, destination: &Path) -> BackendResult<bool>;
}
