//! Session host: one shared backend context and one engine per capability.
//!
//! Each capability moves through `absent -> starting -> running -> stopping
//! -> absent` on its own. Starting a running capability stops it first, so
//! there is never more than one live profile and engine per capability.

use std::future::Future;
use std::sync::Arc;

use mip_protocol::{ApplicationInfo, CacheStorageType, Capability, EngineId, EngineState, Identity, Label};
use mip_runtime::Blocking;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{AuthDelegate, DelegatedAuth};
use crate::backend::{Backend, BackendContext, Engine, EngineSettings, LabelingEngine, Profile, ProfileSettings};
use crate::config::HostConfig;
use crate::consent::{AlwaysAccept, ConsentDelegate};
use crate::credential::Credential;
use crate::error::{Error, Result};

/// Owner of the backend context, profiles, and engines for one principal.
///
/// Operations block until the backend has finished; none of them are meant
/// to be called concurrently.
pub struct SessionHost {
	core: HostCore,
	state: HostState,
}

/// Everything that outlives a connection.
struct HostCore {
	backend: Arc<dyn Backend>,
	runtime: Blocking,
	config: HostConfig,
	consent: Arc<dyn ConsentDelegate>,
}

enum HostState {
	Disconnected,
	Connected(Connection),
}

struct Connection {
	context: Box<dyn BackendContext>,
	auth: Arc<DelegatedAuth>,
	labeling: Slot,
	protection: Slot,
	policy: Slot,
}

#[derive(Default)]
struct Slot {
	state: EngineState,
	live: Option<LivePair>,
}

/// An engine and the profile that created it. The engine must go first.
struct LivePair {
	engine: Box<dyn Engine>,
	profile: Box<dyn Profile>,
}

impl Connection {
	fn slot(&self, capability: Capability) -> &Slot {
		match capability {
			Capability::Labeling => &self.labeling,
			Capability::Protection => &self.protection,
			Capability::Policy => &self.policy,
		}
	}

	fn slot_mut(&mut self, capability: Capability) -> &mut Slot {
		match capability {
			Capability::Labeling => &mut self.labeling,
			Capability::Protection => &mut self.protection,
			Capability::Policy => &mut self.policy,
		}
	}
}

/// Serializable snapshot of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
	pub connected: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub principal: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub application: Option<ApplicationInfo>,
	pub engines: Vec<EngineStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
	pub capability: Capability,
	pub state: EngineState,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub engine_id: Option<EngineId>,
}

impl SessionHost {
	/// Creates a disconnected host over `backend`.
	pub fn new(backend: Arc<dyn Backend>, config: HostConfig) -> Result<Self> {
		Ok(Self {
			core: HostCore {
				backend,
				runtime: Blocking::new()?,
				config,
				consent: Arc::new(AlwaysAccept),
			},
			state: HostState::Disconnected,
		})
	}

	/// Replaces the consent policy handed to profiles started from now on.
	pub fn with_consent(mut self, consent: Arc<dyn ConsentDelegate>) -> Self {
		self.core.consent = consent;
		self
	}

	pub fn config(&self) -> &HostConfig {
		&self.core.config
	}

	/// Connects as the principal of `primary` and starts every capability.
	///
	/// A connected host is disconnected first. If any capability fails to
	/// start, everything built so far is torn down and the host is left
	/// disconnected.
	pub fn authenticate(&mut self, primary: Arc<dyn Credential>, sync: Arc<dyn Credential>) -> Result<()> {
		if self.is_connected() {
			info!(target: "mip.session", "re-authenticating; closing previous session");
			self.disconnect()?;
		}

		let config = &self.core.config;
		let auth = DelegatedAuth::with_application(primary, sync, &config.application_name, &config.application_version)?;
		let principal = auth.principal()?;
		let app_info = auth.app_info();
		let context = self.core.backend.create_context(&config.context_config(app_info.application_id.clone()))?;

		self.state = HostState::Connected(Connection {
			context,
			auth: Arc::new(auth),
			labeling: Slot::default(),
			protection: Slot::default(),
			policy: Slot::default(),
		});

		for capability in Capability::ALL {
			if let Err(err) = self.start(capability) {
				warn!(target: "mip.session", %capability, error = %err, "capability failed to start; closing session");
				if let HostState::Connected(connection) = std::mem::replace(&mut self.state, HostState::Disconnected) {
					self.core.teardown(connection);
				}
				return Err(err);
			}
		}

		info!(target: "mip.session", %principal, application = %app_info.application_id, "session connected");
		Ok(())
	}

	/// Starts `capability`, stopping its running engine first.
	pub fn start(&mut self, capability: Capability) -> Result<()> {
		let HostState::Connected(connection) = &mut self.state else {
			return Err(Error::capability_not_connected(capability, "start"));
		};
		let principal = connection.auth.principal()?;

		self.core.backend.initialize(capability)?;
		self.core.release(connection, capability);

		connection.slot_mut(capability).state = EngineState::Starting;
		let built = self.core.build_pair(connection, capability, principal);
		let slot = connection.slot_mut(capability);
		match built {
			Ok(pair) => {
				info!(target: "mip.session", %capability, engine = %pair.engine.id(), "engine started");
				slot.live = Some(pair);
				slot.state = EngineState::Running;
				Ok(())
			}
			Err(err) => {
				slot.state = EngineState::Absent;
				Err(err)
			}
		}
	}

	/// Stops `capability`. Does nothing if it is not running.
	///
	/// Engine deletion failures are logged, never returned.
	pub fn stop(&mut self, capability: Capability) -> Result<()> {
		let HostState::Connected(connection) = &mut self.state else {
			return Err(Error::capability_not_connected(capability, "stop"));
		};
		self.core.release(connection, capability);
		Ok(())
	}

	/// Stops every capability and shuts the shared context down.
	pub fn disconnect(&mut self) -> Result<()> {
		let HostState::Connected(connection) = std::mem::replace(&mut self.state, HostState::Disconnected) else {
			return Err(Error::not_connected("disconnect"));
		};
		self.core.teardown(connection);
		Ok(())
	}

	pub fn is_connected(&self) -> bool {
		matches!(self.state, HostState::Connected(_))
	}

	pub fn state(&self, capability: Capability) -> EngineState {
		match &self.state {
			HostState::Connected(connection) => connection.slot(capability).state,
			HostState::Disconnected => EngineState::Absent,
		}
	}

	pub fn engine_id(&self, capability: Capability) -> Option<EngineId> {
		self.live_pair(capability).map(|pair| pair.engine.id().clone())
	}

	/// The connected principal, if connected and resolvable.
	pub fn principal(&self) -> Option<String> {
		self.connection().and_then(|connection| connection.auth.principal().ok())
	}

	pub fn app_info(&self) -> Option<ApplicationInfo> {
		self.connection().map(|connection| connection.auth.app_info())
	}

	pub fn status(&self) -> HostStatus {
		HostStatus {
			connected: self.is_connected(),
			principal: self.principal(),
			application: self.app_info(),
			engines: Capability::ALL
				.into_iter()
				.map(|capability| EngineStatus {
					capability,
					state: self.state(capability),
					engine_id: self.engine_id(capability),
				})
				.collect(),
		}
	}

	/// Every label the running labeling engine loaded for the principal.
	pub fn labels(&self) -> Result<Vec<Label>> {
		let (engine, _) = self.labeling_engine("labels")?;
		Ok(engine.labels()?)
	}

	/// The running labeling engine and its id, for `operation`.
	pub(crate) fn labeling_engine(&self, operation: &str) -> Result<(&dyn LabelingEngine, &EngineId)> {
		if !self.is_connected() {
			return Err(Error::not_connected(operation));
		}
		let pair = self
			.live_pair(Capability::Labeling)
			.ok_or_else(|| Error::engine_not_running(Capability::Labeling, operation))?;
		let engine = pair
			.engine
			.labeling()
			.ok_or_else(|| Error::engine_not_running(Capability::Labeling, operation))?;
		Ok((engine, pair.engine.id()))
	}

	pub(crate) fn block_on<F>(&self, future: F) -> F::Output
	where
		F: Future + Send,
		F::Output: Send,
	{
		self.core.runtime.block_on(future)
	}

	fn connection(&self) -> Option<&Connection> {
		match &self.state {
			HostState::Connected(connection) => Some(connection),
			HostState::Disconnected => None,
		}
	}

	fn live_pair(&self, capability: Capability) -> Option<&LivePair> {
		let slot = self.connection()?.slot(capability);
		match slot.state {
			EngineState::Running => slot.live.as_ref(),
			_ => None,
		}
	}
}

impl HostCore {
	fn build_pair(&self, connection: &Connection, capability: Capability, principal: String) -> Result<LivePair> {
		let profile = self.runtime.block_on(connection.context.load_profile(ProfileSettings {
			capability,
			cache_storage: CacheStorageType::InMemory,
			consent: Arc::clone(&self.consent),
		}))?;

		let auth: Arc<dyn AuthDelegate> = connection.auth.clone();
		let engine = self.runtime.block_on(profile.add_engine(EngineSettings {
			capability,
			identity: Identity::new(principal),
			auth,
			client_data: String::new(),
			locale: self.config.locale.clone(),
			load_sensitivity_types: capability == Capability::Labeling,
		}))?;

		Ok(LivePair { engine, profile })
	}

	/// Deletes and disposes the live pair of `capability`, if there is one.
	fn release(&self, connection: &mut Connection, capability: Capability) {
		let slot = connection.slot_mut(capability);
		let Some(LivePair { engine, profile }) = slot.live.take() else {
			return;
		};
		slot.state = EngineState::Stopping;

		let id = engine.id().clone();
		if let Err(err) = self.runtime.block_on(profile.delete_engine(&id)) {
			warn!(target: "mip.session", %capability, engine = %id, error = %err, "engine deletion failed; continuing teardown");
		}
		drop(engine);
		drop(profile);

		slot.state = EngineState::Absent;
		debug!(target: "mip.session", %capability, engine = %id, "engine stopped");
	}

	fn teardown(&self, mut connection: Connection) {
		for capability in Capability::ALL {
			self.release(&mut connection, capability);
		}
		let Connection { context, auth, .. } = connection;
		context.shutdown();
		drop(auth);
		info!(target: "mip.session", "session disconnected");
	}
}

impl Drop for SessionHost {
	fn drop(&mut self) {
		if let HostState::Connected(connection) = std::mem::replace(&mut self.state, HostState::Disconnected) {
			self.core.teardown(connection);
		}
	}
}

impl std::fmt::Debug for SessionHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionHost")
			.field("config", &self.core.config)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}
