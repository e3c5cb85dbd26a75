//! Labels a file against the in-memory backend.
//!
//! ```text
//! cargo run -p mip-rs --example label_file
//! RUST_LOG=mip=debug cargo run -p mip-rs --example label_file
//! ```

use std::sync::Arc;

use anyhow::Context;
use mip::{AssignmentMethod, Capability, HostConfig, InMemoryBackend, Label, LabeledFile, SessionHost, StaticCredential};
use tracing_subscriber::{EnvFilter, fmt};

fn catalog() -> Vec<Label> {
	vec![
		Label {
			id: "general".into(),
			name: "General".into(),
			description: "Business data not meant for the public".into(),
			sensitivity: 1,
			is_active: true,
			parent_id: None,
			protects_content: false,
		},
		Label {
			id: "confidential".into(),
			name: "Confidential".into(),
			description: "Sensitive business data, encrypted".into(),
			sensitivity: 2,
			is_active: true,
			parent_id: None,
			protects_content: true,
		},
	]
}

fn main() -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	fmt().with_env_filter(filter).init();

	let workdir = tempfile::tempdir().context("creating scratch directory")?;
	let source = workdir.path().join("plan.docx");
	let destination = workdir.path().join("plan.confidential.docx");
	std::fs::write(&source, "quarterly plan").context("writing sample file")?;

	let backend = InMemoryBackend::with_labels(catalog());
	let mut host = SessionHost::new(Arc::new(backend.clone()), HostConfig::default())?;

	let primary = StaticCredential::new("primary-access-token")
		.with_client_id("00000000-0000-0000-0000-000000000001")
		.with_upn("ada@contoso.com");
	let sync = StaticCredential::new("sync-access-token");
	host.authenticate(Arc::new(primary), Arc::new(sync))?;
	println!("{}", serde_json::to_string_pretty(&host.status())?);

	let mut file = LabeledFile::open(&host, &source)?;
	println!("{:?}: label={:?} protected={}", file.name(), file.label_id(), file.is_protected());

	file.set_label(&host, "confidential", &destination, None, AssignmentMethod::Standard)?;
	let labeled = LabeledFile::open(&host, &destination)?;
	println!("{:?}: label={:?} protected={}", labeled.name(), labeled.label_name(), labeled.is_protected());

	host.start(Capability::Labeling)?;
	println!("labeling engine restarted as {:?}", host.engine_id(Capability::Labeling));

	host.disconnect()?;
	println!("connected={} live contexts={}", host.is_connected(), backend.live_contexts());
	Ok(())
}
