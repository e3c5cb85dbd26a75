//! Consent decisions for backend prompts.

use mip_protocol::Consent;

/// Decides whether the backend may contact a service URL.
pub trait ConsentDelegate: Send + Sync {
	fn consent(&self, url: &str) -> Consent;
}

/// Accepts every prompt without asking anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAccept;

impl ConsentDelegate for AlwaysAccept {
	fn consent(&self, _url: &str) -> Consent {
		Consent::Accept
	}
}
