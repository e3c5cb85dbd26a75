//! In-process backend for tests, examples, and dry runs.
//!
//! Keeps a label catalog and the labels applied to each path in memory,
//! accounts for every live context, profile, and engine, and records each
//! call it receives so callers can assert on lifecycle behavior.
//!
//! # Example
//!
//! ```ignore
//! let backend = InMemoryBackend::with_labels(vec![confidential()]);
//! let mut host = SessionHost::new(Arc::new(backend.clone()), HostConfig::default())?;
//! host.authenticate(primary, sync)?;
//! assert_eq!(backend.live_engines(Capability::Labeling), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mip_protocol::{Capability, Consent, ContentLabel, ContextConfig, EngineId, Identity, Label, LabelingOptions};
use parking_lot::Mutex;
use tracing::debug;

use super::{Backend, BackendContext, BackendError, BackendResult, ContentHandler, Engine, EngineSettings, LabelingEngine, Profile, ProfileSettings};
use crate::auth::{AuthDelegate, RIGHTS_MANAGEMENT_RESOURCE, SYNC_SERVICE_RESOURCE};
use crate::consent::ConsentDelegate;

const AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// A call received by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
	Initialize(Capability),
	CreateContext,
	LoadProfile(Capability),
	AddEngine(Capability),
	DeleteEngine(Capability, EngineId),
	CreateHandler(PathBuf),
	SetLabel { path: PathBuf, label_id: String, options: LabelingOptions },
	Commit { source: PathBuf, destination: PathBuf },
	Shutdown,
}

/// A token the backend obtained from the auth delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
	pub resource: String,
	pub token: String,
}

#[derive(Default)]
struct MemoryState {
	catalog: Vec<Label>,
	applied: HashMap<PathBuf, ContentLabel>,
	context_config: Option<ContextConfig>,
	live_contexts: usize,
	live_profiles: HashMap<Capability, usize>,
	live_engines: HashMap<Capability, usize>,
	deleted_engines: Vec<EngineId>,
	journal: Vec<BackendCall>,
	tokens: Vec<TokenRequest>,
	next_engine: u64,
	fail_engine_deletion: bool,
	fail_engine_creation: HashSet<Capability>,
}

type Shared = Arc<Mutex<MemoryState>>;

/// Backend that keeps all state in process memory.
///
/// Cloning yields another handle to the same state.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
	state: Shared,
}

impl InMemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a backend whose labeling engines serve `labels`.
	pub fn with_labels(labels: Vec<Label>) -> Self {
		let backend = Self::new();
		backend.state.lock().catalog = labels;
		backend
	}

	pub fn add_label(&self, label: Label) {
		self.state.lock().catalog.push(label);
	}

	/// Marks `path` as already carrying `label`.
	pub fn apply_label(&self, path: impl Into<PathBuf>, label: ContentLabel) {
		self.state.lock().applied.insert(path.into(), label);
	}

	/// Removes any label recorded for `path`.
	pub fn clear_label(&self, path: &Path) -> Option<ContentLabel> {
		self.state.lock().applied.remove(path)
	}

	pub fn applied_label(&self, path: &Path) -> Option<ContentLabel> {
		self.state.lock().applied.get(path).cloned()
	}

	/// Config of the most recently created context.
	pub fn context_config(&self) -> Option<ContextConfig> {
		self.state.lock().context_config.clone()
	}

	pub fn live_contexts(&self) -> usize {
		self.state.lock().live_contexts
	}

	pub fn live_profiles(&self, capability: Capability) -> usize {
		self.state.lock().live_profiles.get(&capability).copied().unwrap_or_default()
	}

	pub fn live_engines(&self, capability: Capability) -> usize {
		self.state.lock().live_engines.get(&capability).copied().unwrap_or_default()
	}

	/// Engines whose deletion the backend acknowledged.
	pub fn deleted_engines(&self) -> Vec<EngineId> {
		self.state.lock().deleted_engines.clone()
	}

	pub fn journal(&self) -> Vec<BackendCall> {
		self.state.lock().journal.clone()
	}

	/// Takes all recorded calls, clearing the journal.
	pub fn take_journal(&self) -> Vec<BackendCall> {
		std::mem::take(&mut self.state.lock().journal)
	}

	pub fn token_requests(&self) -> Vec<TokenRequest> {
		self.state.lock().tokens.clone()
	}

	/// Makes every engine deletion request fail.
	pub fn fail_engine_deletion(&self, fail: bool) {
		self.state.lock().fail_engine_deletion = fail;
	}

	/// Makes adding an engine for `capability` fail.
	pub fn fail_engine_creation(&self, capability: Capability) {
		self.state.lock().fail_engine_creation.insert(capability);
	}

	pub fn clear_failures(&self) {
		let mut state = self.state.lock();
		state.fail_engine_deletion = false;
		state.fail_engine_creation.clear();
	}
}

impl Backend for InMemoryBackend {
	fn initialize(&self, capability: Capability) -> BackendResult<()> {
		record(&self.state, BackendCall::Initialize(capability));
		Ok(())
	}

	fn create_context(&self, config: &ContextConfig) -> BackendResult<Box<dyn BackendContext>> {
		let mut state = self.state.lock();
		state.journal.push(BackendCall::CreateContext);
		state.context_config = Some(config.clone());
		state.live_contexts += 1;
		debug!(target: "mip.backend", app = %config.app_info.application_id, "memory context created");
		Ok(Box::new(MemoryContext {
			state: Arc::clone(&self.state),
		}))
	}
}

fn record(state: &Shared, call: BackendCall) {
	state.lock().journal.push(call);
}

/// Asks the auth delegate for a token the way a real backend would before a request.
fn authorize(state: &Shared, auth: &dyn AuthDelegate, identity: &Identity, resource: &str) -> BackendResult<()> {
	let token = auth
		.acquire_token(identity, AUTHORITY, resource, "")
		.map_err(|err| BackendError::with_source(format!("failed to acquire token for {resource}"), err))?;
	state.lock().tokens.push(TokenRequest {
		resource: resource.to_string(),
		token,
	});
	Ok(())
}

fn resource_for(capability: Capability) -> &'static str {
	match capability {
		Capability::Policy => SYNC_SERVICE_RESOURCE,
		Capability::Labeling | Capability::Protection => RIGHTS_MANAGEMENT_RESOURCE,
	}
}

struct MemoryContext {
	state: Shared,
}

#[async_trait]
impl BackendContext for MemoryContext {
	async fn load_profile(&self, settings: ProfileSettings) -> BackendResult<Box<dyn Profile>> {
		let mut state = self.state.lock();
		state.journal.push(BackendCall::LoadProfile(settings.capability));
		*state.live_profiles.entry(settings.capability).or_default() += 1;
		Ok(Box::new(MemoryProfile {
			state: Arc::clone(&self.state),
			capability: settings.capability,
			consent: settings.consent,
		}))
	}

	fn shutdown(self: Box<Self>) {
		record(&self.state, BackendCall::Shutdown);
	}
}

impl Drop for MemoryContext {
	fn drop(&mut self) {
		let mut state = self.state.lock();
		state.live_contexts = state.live_contexts.saturating_sub(1);
	}
}

struct MemoryProfile {
	state: Shared,
	capability: Capability,
	consent: Arc<dyn ConsentDelegate>,
}

#[async_trait]
impl Profile for MemoryProfile {
	async fn add_engine(&self, settings: EngineSettings) -> BackendResult<Box<dyn Engine>> {
		let failing = {
			let mut state = self.state.lock();
			state.journal.push(BackendCall::AddEngine(settings.capability));
			state.fail_engine_creation.contains(&settings.capability)
		};
		if failing {
			return Err(BackendError::new(format!("{} engine rejected by service", settings.capability)));
		}

		let resource = resource_for(settings.capability);
		if self.consent.consent(resource) == Consent::Reject {
			return Err(BackendError::new(format!("consent rejected for {resource}")));
		}
		authorize(&self.state, settings.auth.as_ref(), &settings.identity, resource)?;

		let mut state = self.state.lock();
		state.next_engine += 1;
		let id = EngineId::new(format!("{}-engine-{}", settings.capability, state.next_engine));
		*state.live_engines.entry(settings.capability).or_default() += 1;
		Ok(Box::new(MemoryEngine {
			state: Arc::clone(&self.state),
			id,
			capability: settings.capability,
			identity: settings.identity,
			auth: settings.auth,
		}))
	}

	async fn delete_engine(&self, id: &EngineId) -> BackendResult<()> {
		let mut state = self.state.lock();
		state.journal.push(BackendCall::DeleteEngine(self.capability, id.clone()));
		if state.fail_engine_deletion {
			return Err(BackendError::new(format!("service unreachable while deleting {id}")));
		}
		state.deleted_engines.push(id.clone());
		Ok(())
	}
}

impl Drop for MemoryProfile {
	fn drop(&mut self) {
		let mut state = self.state.lock();
		if let Some(count) = state.live_profiles.get_mut(&self.capability) {
			*count = count.saturating_sub(1);
		}
	}
}

struct MemoryEngine {
	state: Shared,
	id: EngineId,
	capability: Capability,
	identity: Identity,
	auth: Arc<dyn AuthDelegate>,
}

impl Engine for MemoryEngine {
	fn id(&self) -> &EngineId {
		&self.id
	}

	fn labeling(&self) -> Option<&dyn LabelingEngine> {
		(self.capability == Capability::Labeling).then_some(self as &dyn LabelingEngine)
	}
}

#[async_trait]
impl LabelingEngine for MemoryEngine {
	async fn create_handler(&self, path: &Path) -> BackendResult<Box<dyn ContentHandler>> {
		record(&self.state, BackendCall::CreateHandler(path.to_path_buf()));
		tokio::fs::metadata(path)
			.await
			.map_err(|err| BackendError::with_source(format!("cannot open {}", path.display()), err))?;
		authorize(&self.state, self.auth.as_ref(), &self.identity, RIGHTS_MANAGEMENT_RESOURCE)?;

		let current = self.state.lock().applied.get(path).cloned();
		Ok(Box::new(MemoryHandler {
			state: Arc::clone(&self.state),
			path: path.to_path_buf(),
			current,
			pending: None,
		}))
	}

	fn label_by_id(&self, id: &str) -> BackendResult<Label> {
		self.state
			.lock()
			.catalog
			.iter()
			.find(|label| label.id == id)
			.cloned()
			.ok_or_else(|| BackendError::new(format!("label not found: {id}")))
	}

	fn labels(&self) -> BackendResult<Vec<Label>> {
		Ok(self.state.lock().catalog.clone())
	}
}

impl Drop for MemoryEngine {
	fn drop(&mut self) {
		let mut state = self.state.lock();
		if let Some(count) = state.live_engines.get_mut(&self.capability) {
			*count = count.saturating_sub(1);
		}
	}
}

struct MemoryHandler {
	state: Shared,
	path: PathBuf,
	current: Option<ContentLabel>,
	pending: Option<ContentLabel>,
}

#[async_trait]
impl ContentHandler for MemoryHandler {
	fn label(&self) -> Option<ContentLabel> {
		self.current.clone()
	}

	fn set_label(&mut self, label: &Label, options: &LabelingOptions) -> BackendResult<()> {
		if !label.is_active {
			return Err(BackendError::new(format!("label {} is not active", label.id)));
		}
		record(
			&self.state,
			BackendCall::SetLabel {
				path: self.path.clone(),
				label_id: label.id.clone(),
				options: options.clone(),
			},
		);
		self.pending = Some(ContentLabel {
			label: label.clone(),
			assignment_method: options.assignment_method,
			is_protection_applied_from_label: label.protects_content,
			justification: options.justification_message.clone(),
		});
		Ok(())
	}

	async fn commit(&mut self, destination: &Path) -> BackendResult<bool> {
		record(
			&self.state,
			BackendCall::Commit {
				source: self.path.clone(),
				destination: destination.to_path_buf(),
			},
		);
		let Some(pending) = self.pending.take() else {
			return Ok(false);
		};

		tokio::fs::copy(&self.path, destination)
			.await
			.map_err(|err| BackendError::with_source(format!("failed to write {}", destination.display()), err))?;
		self.state.lock().applied.insert(destination.to_path_buf(), pending);
		Ok(true)
	}
}
