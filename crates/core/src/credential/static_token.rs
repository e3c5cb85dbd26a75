use std::sync::atomic::{AtomicUsize, Ordering};

use mip_protocol::TokenClaims;
use parking_lot::RwLock;

use super::{Credential, TokenFault};

/// A credential whose token is refreshed by its owner.
///
/// `refresh_if_needed` only records that a validity check happened; callers
/// that manage token lifetimes themselves push new tokens with
/// [`StaticCredential::set_bearer`].
#[derive(Debug, Default)]
pub struct StaticCredential {
	bearer: RwLock<Option<String>>,
	client_id: Option<String>,
	claims: Option<TokenClaims>,
	refreshes: AtomicUsize,
	fail_refresh: bool,
}

impl StaticCredential {
	pub fn new(bearer: impl Into<String>) -> Self {
		Self {
			bearer: RwLock::new(Some(bearer.into())),
			..Default::default()
		}
	}

	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}

	pub fn with_upn(mut self, upn: impl Into<String>) -> Self {
		self.claims.get_or_insert_with(TokenClaims::default).upn = Some(upn.into());
		self
	}

	pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
		self.claims.get_or_insert_with(TokenClaims::default).oid = Some(oid.into());
		self
	}

	/// Makes every validity check fail, as a revoked credential would.
	pub fn failing_refresh(mut self) -> Self {
		self.fail_refresh = true;
		self
	}

	/// Replaces the bearer string handed out from now on.
	pub fn set_bearer(&self, bearer: impl Into<String>) {
		*self.bearer.write() = Some(bearer.into());
	}

	/// Number of validity checks made so far.
	pub fn refresh_count(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}
}

impl Credential for StaticCredential {
	fn refresh_if_needed(&self) -> Result<(), TokenFault> {
		self.refreshes.fetch_add(1, Ordering::SeqCst);
		if self.fail_refresh {
			return Err(TokenFault::Expired { expired_at: 0 });
		}
		Ok(())
	}

	fn bearer(&self) -> Option<String> {
		self.bearer.read().clone()
	}

	fn client_id(&self) -> Option<String> {
		self.client_id.clone()
	}

	fn claims(&self) -> Option<TokenClaims> {
		self.claims.clone()
	}
}
