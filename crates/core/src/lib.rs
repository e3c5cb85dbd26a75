//! Session host and authentication delegation for content-protection backends.
//!
//! A [`SessionHost`] connects once as a single principal, starts one engine
//! per [`Capability`], and answers the backend's token callbacks through
//! [`DelegatedAuth`]. [`LabeledFile`] reads and applies labels through the
//! running labeling engine.
//!
//! ```ignore
//! let backend = Arc::new(InMemoryBackend::with_labels(catalog));
//! let mut host = SessionHost::new(backend, HostConfig::default())?;
//! host.authenticate(primary, sync)?;
//!
//! let mut file = LabeledFile::open(&host, "plan.docx")?;
//! file.set_label(&host, "confidential", "plan.labeled.docx", None, AssignmentMethod::Standard)?;
//! ```

pub mod auth;
pub mod backend;
pub mod config;
pub mod consent;
pub mod credential;
pub mod error;
pub mod file;
pub mod host;

pub use auth::{AuthDelegate, DelegatedAuth};
pub use backend::{Backend, BackendError, InMemoryBackend};
pub use config::HostConfig;
pub use consent::{AlwaysAccept, ConsentDelegate};
pub use credential::{Credential, CredentialError, JwtCredential, StaticCredential, TokenFault, TokenProvider};
pub use error::{Error, Result};
pub use file::LabeledFile;
pub use host::{EngineStatus, HostStatus, SessionHost};
pub use mip_protocol::{
	ApplicationInfo, AssignmentMethod, Capability, Consent, ContentLabel, EngineId, EngineState, Identity, Label, LabelingOptions, TokenClaims,
};
