//! Access-token claims.

use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
///
/// Only the claims the session host reads are modelled; unknown claims are
/// ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// User principal name, present for user tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub upn: Option<String>,
	/// Object id of the user or service principal.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aud: Option<String>,
	/// Client id (v1 tokens).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub appid: Option<String>,
	/// Client id (v2 tokens).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub azp: Option<String>,
	/// Expiry as seconds since the Unix epoch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,
}

impl TokenClaims {
	/// The UPN when present, otherwise the object id.
	pub fn principal(&self) -> Option<&str> {
		self.upn.as_deref().or(self.oid.as_deref())
	}

	pub fn client_id(&self) -> Option<&str> {
		self.appid.as_deref().or(self.azp.as_deref())
	}
}
