//! Authentication delegation for backend callbacks.
//!
//! The backend asks for bearer tokens whenever a request needs one; how
//! often and when is its own decision. [`DelegatedAuth`] answers those
//! callbacks for the single principal this process is connected as.

use std::sync::Arc;

use mip_protocol::{ApplicationInfo, Identity};
use tracing::debug;

use crate::credential::{Credential, CredentialError, TokenProvider};

/// Resource URI of the rights-management service.
pub const RIGHTS_MANAGEMENT_RESOURCE: &str = "https://aadrm.com";

/// Resource URI of the policy sync service.
pub const SYNC_SERVICE_RESOURCE: &str = "https://syncservice.o365syncservice.com/";

pub const APPLICATION_NAME: &str = "Microsoft Information Protection (Rust)";

pub const APPLICATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Callback surface the backend uses to authenticate its requests.
pub trait AuthDelegate: Send + Sync {
	/// Returns a fresh bearer token for `resource`.
	fn acquire_token(&self, identity: &Identity, authority: &str, resource: &str, claims: &str) -> Result<String, CredentialError>;

	fn app_info(&self) -> ApplicationInfo;

	/// The connected principal (UPN or object id).
	fn principal(&self) -> Result<String, CredentialError>;
}

/// Auth delegate over a primary and a sync-service credential.
///
/// One authenticated user per process: the identity, authority, and claims
/// the backend passes are not used to pick a token.
#[derive(Debug)]
pub struct DelegatedAuth {
	primary: TokenProvider,
	sync: TokenProvider,
	app_info: ApplicationInfo,
}

impl DelegatedAuth {
	/// Wraps both credentials using the default application name and version.
	pub fn new(primary: Arc<dyn Credential>, sync: Arc<dyn Credential>) -> Result<Self, CredentialError> {
		Self::with_application(primary, sync, APPLICATION_NAME, APPLICATION_VERSION)
	}

	/// Wraps both credentials; the application id comes from the primary credential's client id.
	pub fn with_application(
		primary: Arc<dyn Credential>,
		sync: Arc<dyn Credential>,
		name: impl Into<String>,
		version: impl Into<String>,
	) -> Result<Self, CredentialError> {
		let primary = TokenProvider::new(primary, RIGHTS_MANAGEMENT_RESOURCE);
		let sync = TokenProvider::new(sync, SYNC_SERVICE_RESOURCE);
		let app_info = ApplicationInfo {
			application_id: primary.app_id()?,
			application_name: name.into(),
			application_version: version.into(),
		};
		Ok(Self { primary, sync, app_info })
	}

	fn provider_for(&self, resource: &str) -> &TokenProvider {
		if resource == SYNC_SERVICE_RESOURCE { &self.sync } else { &self.primary }
	}
}

impl AuthDelegate for DelegatedAuth {
	fn acquire_token(&self, _identity: &Identity, _authority: &str, resource: &str, _claims: &str) -> Result<String, CredentialError> {
		let provider = self.provider_for(resource);
		debug!(target: "mip.auth", %resource, audience = provider.audience(), "token requested");
		provider.get_token()
	}

	fn app_info(&self) -> ApplicationInfo {
		self.app_info.clone()
	}

	fn principal(&self) -> Result<String, CredentialError> {
		self.primary.get_user()
	}
}
