use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mip_protocol::TokenClaims;
use parking_lot::RwLock;
use tracing::debug;

use super::{Credential, TokenFault};

/// Tokens this close to expiry are treated as expired.
const REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
enum TokenSource {
	Inline,
	File(PathBuf),
}

#[derive(Debug)]
struct JwtState {
	raw: String,
	claims: TokenClaims,
}

/// A credential over a raw JWT access token.
///
/// Claims are read from the token payload. A token loaded from a file is
/// re-read from that file once it expires, so an external tool that keeps
/// the file current keeps the credential current.
#[derive(Debug)]
pub struct JwtCredential {
	source: TokenSource,
	state: RwLock<JwtState>,
}

impl JwtCredential {
	/// Wraps an in-memory token. It cannot be refreshed once expired.
	pub fn from_token(raw: impl Into<String>) -> Result<Self, TokenFault> {
		let raw = raw.into().trim().to_string();
		let claims = decode_claims(&raw)?;
		Ok(Self {
			source: TokenSource::Inline,
			state: RwLock::new(JwtState { raw, claims }),
		})
	}

	/// Loads a token from `path`, re-reading the file on expiry.
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, TokenFault> {
		let path = path.into();
		let state = load_state(&path)?;
		Ok(Self {
			source: TokenSource::File(path),
			state: RwLock::new(state),
		})
	}

	pub fn expires_at(&self) -> Option<i64> {
		self.state.read().claims.exp
	}
}

impl Credential for JwtCredential {
	fn refresh_if_needed(&self) -> Result<(), TokenFault> {
		let now = unix_now();
		let Some(expired_at) = expiry_passed(&self.state.read().claims, now) else {
			return Ok(());
		};

		let TokenSource::File(path) = &self.source else {
			return Err(TokenFault::Expired { expired_at });
		};

		let reloaded = load_state(path)?;
		if let Some(expired_at) = expiry_passed(&reloaded.claims, now) {
			return Err(TokenFault::Expired { expired_at });
		}

		debug!(target: "mip.auth", path = %path.display(), exp = ?reloaded.claims.exp, "reloaded expired access token");
		*self.state.write() = reloaded;
		Ok(())
	}

	fn bearer(&self) -> Option<String> {
		Some(self.state.read().raw.clone())
	}

	fn client_id(&self) -> Option<String> {
		self.state.read().claims.client_id().map(str::to_string)
	}

	fn claims(&self) -> Option<TokenClaims> {
		Some(self.state.read().claims.clone())
	}
}

fn expiry_passed(claims: &TokenClaims, now: i64) -> Option<i64> {
	claims.exp.filter(|exp| exp - REFRESH_SKEW_SECS <= now)
}

fn load_state(path: &Path) -> Result<JwtState, TokenFault> {
	let raw = std::fs::read_to_string(path).map_err(|source| TokenFault::Io {
		path: path.to_path_buf(),
		source,
	})?;
	let raw = raw.trim().to_string();
	let claims = decode_claims(&raw)?;
	Ok(JwtState { raw, claims })
}

/// Decodes the claims segment of a compact JWT without verifying it.
///
/// The backend validates the signature; the host only reads identity claims.
fn decode_claims(raw: &str) -> Result<TokenClaims, TokenFault> {
	let mut segments = raw.split('.');
	let (Some(_header), Some(payload), Some(_signature), None) = (segments.next(), segments.next(), segments.next(), segments.next()) else {
		return Err(TokenFault::Malformed("expected three dot-separated segments".into()));
	};

	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|e| TokenFault::Malformed(format!("claims segment is not base64url: {e}")))?;
	serde_json::from_slice(&bytes).map_err(|e| TokenFault::Malformed(format!("claims segment is not JSON: {e}")))
}

fn unix_now() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_secs() as i64)
		.unwrap_or_default()
}
