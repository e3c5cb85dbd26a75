//! Access-token providers for the auth delegate.
//!
//! A [`Credential`] is whatever object the host environment issues for one
//! token audience: it can check its own validity, hand out the current bearer
//! string, and expose the client id and claims it was issued with.
//! [`TokenProvider`] wraps one credential and turns its gaps into typed
//! errors that name the audience they concern.

mod jwt;
mod static_token;

use std::path::PathBuf;
use std::sync::Arc;

use mip_protocol::TokenClaims;

pub use jwt::JwtCredential;
pub use static_token::StaticCredential;

/// Why a credential could not produce a usable token.
#[derive(Debug, thiserror::Error)]
pub enum TokenFault {
	#[error("credential is missing `{0}`")]
	MissingField(&'static str),

	#[error("token expired at {expired_at} and could not be refreshed")]
	Expired { expired_at: i64 },

	#[error("malformed token: {0}")]
	Malformed(String),

	#[error("failed to read token from {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Errors raised by [`TokenProvider`] and the auth delegate.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
	#[error("token unavailable for {audience}: {fault}")]
	TokenUnavailable {
		audience: String,
		#[source]
		fault: TokenFault,
	},

	#[error("identity unresolvable for {audience}: token claims carry neither `upn` nor `oid`")]
	IdentityUnresolvable { audience: String },
}

/// Capability surface of an externally issued, self-refreshing credential.
pub trait Credential: Send + Sync {
	/// Ensures the credential is valid, refreshing it if it has expired.
	fn refresh_if_needed(&self) -> Result<(), TokenFault>;

	/// The current bearer string.
	fn bearer(&self) -> Option<String>;

	fn client_id(&self) -> Option<String>;

	/// Claims of the identity the credential was issued to.
	fn claims(&self) -> Option<TokenClaims>;
}

/// Uniform token access over one credential.
///
/// Holds only the credential reference; any caching is the credential's own.
#[derive(Clone)]
pub struct TokenProvider {
	credential: Arc<dyn Credential>,
	audience: String,
}

impl TokenProvider {
	pub fn new(credential: Arc<dyn Credential>, audience: impl Into<String>) -> Self {
		Self {
			credential,
			audience: audience.into(),
		}
	}

	/// Resource this provider's tokens are issued for.
	pub fn audience(&self) -> &str {
		&self.audience
	}

	/// Refreshes the credential if needed and returns its bearer string.
	pub fn get_token(&self) -> Result<String, CredentialError> {
		self.credential.refresh_if_needed().map_err(|fault| self.unavailable(fault))?;
		self.credential
			.bearer()
			.filter(|token| !token.is_empty())
			.ok_or_else(|| self.unavailable(TokenFault::MissingField("access_token")))
	}

	/// The user the token belongs to: its UPN, or its object id when there is no UPN.
	pub fn get_user(&self) -> Result<String, CredentialError> {
		self.credential
			.claims()
			.and_then(|claims| claims.principal().map(str::to_string))
			.ok_or_else(|| CredentialError::IdentityUnresolvable {
				audience: self.audience.clone(),
			})
	}

	pub fn app_id(&self) -> Result<String, CredentialError> {
		self.credential
			.client_id()
			.filter(|id| !id.is_empty())
			.ok_or_else(|| self.unavailable(TokenFault::MissingField("client_id")))
	}

	fn unavailable(&self, fault: TokenFault) -> CredentialError {
		CredentialError::TokenUnavailable {
			audience: self.audience.clone(),
			fault,
		}
	}
}

impl std::fmt::Debug for TokenProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenProvider").field("audience", &self.audience).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const AUDIENCE: &str = "https://aadrm.com";

	#[test]
	fn get_token_checks_refresh_on_every_read() {
		let credential = Arc::new(StaticCredential::new("token-a").with_upn("ada@contoso.com"));
		let provider = TokenProvider::new(credential.clone(), AUDIENCE);

		assert_eq!(provider.get_token().unwrap(), "token-a");
		credential.set_bearer("token-b");
		assert_eq!(provider.get_token().unwrap(), "token-b");
		assert_eq!(credential.refresh_count(), 2);
	}

	#[test]
	fn missing_bearer_is_token_unavailable() {
		let provider = TokenProvider::new(Arc::new(StaticCredential::default()), AUDIENCE);
		let err = provider.get_token().unwrap_err();
		assert!(matches!(
			err,
			CredentialError::TokenUnavailable {
				fault: TokenFault::MissingField("access_token"),
				..
			}
		));
		assert!(err.to_string().contains(AUDIENCE));
	}

	#[test]
	fn refresh_failure_is_token_unavailable() {
		let credential = StaticCredential::new("token").failing_refresh();
		let provider = TokenProvider::new(Arc::new(credential), AUDIENCE);
		assert!(matches!(provider.get_token(), Err(CredentialError::TokenUnavailable { .. })));
	}

	#[test]
	fn get_user_prefers_upn_over_object_id() {
		let credential = StaticCredential::new("token").with_upn("ada@contoso.com").with_oid("2f1c-oid");
		let provider = TokenProvider::new(Arc::new(credential), AUDIENCE);
		assert_eq!(provider.get_user().unwrap(), "ada@contoso.com");
	}

	#[test]
	fn get_user_falls_back_to_object_id() {
		let credential = StaticCredential::new("token").with_oid("2f1c-oid");
		let provider = TokenProvider::new(Arc::new(credential), AUDIENCE);
		assert_eq!(provider.get_user().unwrap(), "2f1c-oid");
	}

	#[test]
	fn get_user_without_identity_claims_fails() {
		let provider = TokenProvider::new(Arc::new(StaticCredential::new("token")), AUDIENCE);
		assert!(matches!(provider.get_user(), Err(CredentialError::IdentityUnresolvable { .. })));
	}

	#[test]
	fn app_id_requires_client_id() {
		let provider = TokenProvider::new(Arc::new(StaticCredential::new("token")), AUDIENCE);
		let err = provider.app_id().unwrap_err();
		assert!(err.to_string().contains("client_id"));

		let provider = TokenProvider::new(Arc::new(StaticCredential::new("token").with_client_id("c-1")), AUDIENCE);
		assert_eq!(provider.app_id().unwrap(), "c-1");
	}
}
