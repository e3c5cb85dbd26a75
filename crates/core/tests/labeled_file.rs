use std::path::{Path, PathBuf};
use std::sync::Arc;

use mip::backend::memory::BackendCall;
use mip::{AssignmentMethod, Capability, ContentLabel, Error, HostConfig, InMemoryBackend, Label, LabeledFile, SessionHost, StaticCredential};
use tempfile::TempDir;

fn label(id: &str, name: &str, protects_content: bool) -> Label {
	Label {
		id: id.into(),
		name: name.into(),
		description: String::new(),
		sensitivity: 1,
		is_active: true,
		parent_id: None,
		protects_content,
	}
}

fn catalog() -> Vec<Label> {
	vec![label("general", "General", false), label("confidential", "Confidential", true)]
}

struct Fixture {
	_temp: TempDir,
	dir: PathBuf,
	backend: InMemoryBackend,
	host: SessionHost,
}

impl Fixture {
	fn new() -> Self {
		let temp = TempDir::new().unwrap();
		let dir = temp.path().to_path_buf();
		let backend = InMemoryBackend::with_labels(catalog());
		let mut host = SessionHost::new(Arc::new(backend.clone()), HostConfig::default()).unwrap();
		let primary = StaticCredential::new("rms-token").with_client_id("client-1").with_upn("ada@contoso.com");
		host.authenticate(Arc::new(primary), Arc::new(StaticCredential::new("sync-token"))).unwrap();
		Self {
			_temp: temp,
			dir,
			backend,
			host,
		}
	}

	fn write(&self, name: &str) -> PathBuf {
		let path = self.dir.join(name);
		std::fs::write(&path, format!("contents of {name}")).unwrap();
		path
	}

	fn set_label_calls(&self) -> usize {
		self.backend
			.journal()
			.iter()
			.filter(|call| matches!(call, BackendCall::SetLabel { .. } | BackendCall::Commit { .. }))
			.count()
	}
}

fn applied(label: Label) -> ContentLabel {
	ContentLabel {
		is_protection_applied_from_label: label.protects_content,
		label,
		assignment_method: AssignmentMethod::Standard,
		justification: None,
	}
}

#[test]
fn labeling_an_unprotected_file_end_to_end() {
	let fx = Fixture::new();
	let source = fx.write("plan.docx");
	let destination = fx.dir.join("plan.labeled.docx");

	let mut file = LabeledFile::open(&fx.host, &source).unwrap();
	assert!(!file.is_protected());
	assert_eq!(file.label_id(), None);
	assert_eq!(file.name(), Some("plan.docx"));

	let committed = file
		.set_label(&fx.host, "confidential", &destination, None, AssignmentMethod::Standard)
		.unwrap();
	assert!(committed);
	assert_eq!(file.label_id(), None, "set_label must not touch the snapshot");

	let mut labeled = LabeledFile::open(&fx.host, &destination).unwrap();
	labeled.refresh(&fx.host).unwrap();
	assert!(labeled.is_protected());
	assert_eq!(labeled.label_id(), Some("confidential"));
	assert_eq!(labeled.label_name(), Some("Confidential"));

	file.refresh(&fx.host).unwrap();
	assert_eq!(file.label_id(), None);
	assert_eq!(std::fs::read_to_string(&destination).unwrap(), "contents of plan.docx");
}

#[test]
fn destination_equal_to_source_ignoring_case_is_rejected() {
	let fx = Fixture::new();
	let source = fx.write("report.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();
	let shouted = PathBuf::from(source.to_string_lossy().to_uppercase());

	for destination in [source.clone(), shouted] {
		let err = file
			.set_label(&fx.host, "confidential", &destination, None, AssignmentMethod::Standard)
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument { name: "destination", .. }));
	}
	assert_eq!(fx.set_label_calls(), 0);
}

#[test]
fn justification_forces_standard_justified_assignment() {
	let fx = Fixture::new();
	let source = fx.write("budget.xlsx");
	let destination = fx.dir.join("budget.public.xlsx");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	file.set_label(&fx.host, "general", &destination, Some("approved by finance"), AssignmentMethod::Privileged)
		.unwrap();

	let options = fx
		.backend
		.journal()
		.into_iter()
		.find_map(|call| match call {
			BackendCall::SetLabel { options, .. } => Some(options),
			_ => None,
		})
		.unwrap();
	assert_eq!(options.assignment_method, AssignmentMethod::Standard);
	assert!(options.is_downgrade_justified);
	assert_eq!(options.justification_message.as_deref(), Some("approved by finance"));

	let result = fx.backend.applied_label(&destination).unwrap();
	assert_eq!(result.assignment_method, AssignmentMethod::Standard);
	assert_eq!(result.justification.as_deref(), Some("approved by finance"));
}

#[test]
fn privileged_method_without_justification_is_kept() {
	let fx = Fixture::new();
	let source = fx.write("memo.txt");
	let destination = fx.dir.join("memo.out.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	file.set_label(&fx.host, "general", &destination, Some(""), AssignmentMethod::Privileged)
		.unwrap();

	let result = fx.backend.applied_label(&destination).unwrap();
	assert_eq!(result.assignment_method, AssignmentMethod::Privileged);
	assert!(result.justification.is_none());
}

#[test]
fn open_validates_path() {
	let fx = Fixture::new();

	assert!(matches!(LabeledFile::open(&fx.host, ""), Err(Error::InvalidPath { .. })));

	let missing = fx.dir.join("missing.docx");
	match LabeledFile::open(&fx.host, &missing) {
		Err(Error::NotFound { path }) => assert_eq!(path, missing),
		other => panic!("expected NotFound, got {other:?}"),
	}
}

#[test]
fn open_requires_running_labeling_engine() {
	let mut fx = Fixture::new();
	let source = fx.write("a.txt");

	fx.host.stop(Capability::Labeling).unwrap();

	let err = LabeledFile::open(&fx.host, &source).unwrap_err();
	assert!(err.is_not_connected());
	assert!(err.to_string().contains("labeling"));
}

#[test]
fn existing_label_is_read_on_open() {
	let fx = Fixture::new();
	let source = fx.write("secret.pdf");
	fx.backend.apply_label(&source, applied(label("confidential", "Confidential", true)));

	let file = LabeledFile::open(&fx.host, &source).unwrap();

	assert!(file.is_protected());
	assert_eq!(file.label_id(), Some("confidential"));
	assert_eq!(file.label().unwrap().label.name, "Confidential");
}

#[test]
fn refresh_without_label_clears_snapshot() {
	let fx = Fixture::new();
	let source = fx.write("draft.txt");
	fx.backend.apply_label(&source, applied(label("confidential", "Confidential", true)));
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();
	assert!(file.is_protected());

	fx.backend.clear_label(&source);
	file.refresh(&fx.host).unwrap();

	assert!(!file.is_protected());
	assert_eq!(file.label_id(), None);
	assert_eq!(file.label_name(), None);
	assert!(file.label().is_none());
}

#[test]
fn get_label_refreshes_first() {
	let fx = Fixture::new();
	let source = fx.write("late.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	fx.backend.apply_label(&source, applied(label("general", "General", false)));

	let current = file.get_label(&fx.host).unwrap().unwrap();
	assert_eq!(current.label.id, "general");
	assert_eq!(file.label_id(), Some("general"));
	assert!(!file.is_protected());
}

#[test]
fn handler_from_restarted_engine_is_not_reused() {
	let mut fx = Fixture::new();
	let source = fx.write("restart.txt");
	let destination = fx.dir.join("restart.out.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	fx.host.start(Capability::Labeling).unwrap();
	fx.backend.take_journal();
	file.set_label(&fx.host, "general", &destination, None, AssignmentMethod::Standard)
		.unwrap();

	let journal = fx.backend.journal();
	assert_eq!(journal[0], BackendCall::CreateHandler(source.clone()));
	assert!(matches!(journal[1], BackendCall::SetLabel { .. }));
	assert_eq!(fx.backend.applied_label(&destination).unwrap().label.id, "general");
}

#[test]
fn unknown_label_is_passed_through_from_backend() {
	let fx = Fixture::new();
	let source = fx.write("x.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	let err = file
		.set_label(&fx.host, "does-not-exist", fx.dir.join("y.txt"), None, AssignmentMethod::Standard)
		.unwrap_err();

	assert!(matches!(err, Error::Backend(_)));
	assert_eq!(err.to_string(), "label not found: does-not-exist");
	assert!(!fx.dir.join("y.txt").exists());
}

#[test]
fn empty_label_id_is_rejected_before_backend() {
	let fx = Fixture::new();
	let source = fx.write("x.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	let err = file
		.set_label(&fx.host, "", fx.dir.join("y.txt"), None, AssignmentMethod::Standard)
		.unwrap_err();

	assert!(matches!(err, Error::InvalidArgument { name: "label_id", .. }));
	assert_eq!(fx.set_label_calls(), 0);
}

#[test]
fn empty_destination_is_rejected_before_backend() {
	let fx = Fixture::new();
	let source = fx.write("x.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	let err = file
		.set_label(&fx.host, "general", "", None, AssignmentMethod::Standard)
		.unwrap_err();

	assert!(matches!(err, Error::InvalidPath { .. }));
	assert_eq!(fx.set_label_calls(), 0);
}

#[test]
fn file_deleted_after_open_is_not_found() {
	let fx = Fixture::new();
	let source = fx.write("gone.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();
	std::fs::remove_file(&source).unwrap();
	fx.backend.take_journal();

	match file.refresh(&fx.host) {
		Err(Error::NotFound { path }) => assert_eq!(path, source),
		other => panic!("expected NotFound, got {other:?}"),
	}
	assert!(matches!(file.get_label(&fx.host), Err(Error::NotFound { .. })));
	assert!(fx.backend.journal().is_empty());
}

#[test]
fn re_resolving_a_stale_handler_keeps_snapshot() {
	let mut fx = Fixture::new();
	let source = fx.write("kept.txt");
	let destination = fx.dir.join("kept.out.txt");
	fx.backend.apply_label(&source, applied(label("general", "General", false)));
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	fx.backend.clear_label(&source);
	fx.host.start(Capability::Labeling).unwrap();
	file.set_label(&fx.host, "confidential", &destination, None, AssignmentMethod::Standard)
		.unwrap();

	assert_eq!(file.label_id(), Some("general"));
	assert_eq!(file.label_name(), Some("General"));
	assert_eq!(fx.backend.applied_label(&destination).unwrap().label.id, "confidential");
}

#[test]
fn label_catalog_comes_from_running_labeling_engine() {
	let mut fx = Fixture::new();

	let ids: Vec<_> = fx.host.labels().unwrap().into_iter().map(|label| label.id).collect();
	assert_eq!(ids, ["general", "confidential"]);

	fx.host.stop(Capability::Labeling).unwrap();
	assert!(fx.host.labels().unwrap_err().is_not_connected());
}

#[test]
fn operations_after_disconnect_are_not_connected() {
	let mut fx = Fixture::new();
	let source = fx.write("x.txt");
	let mut file = LabeledFile::open(&fx.host, &source).unwrap();

	fx.host.disconnect().unwrap();

	assert!(file.refresh(&fx.host).unwrap_err().is_not_connected());
	assert!(file.get_label(&fx.host).unwrap_err().is_not_connected());
	let err = file
		.set_label(&fx.host, "general", fx.dir.join("y.txt"), None, AssignmentMethod::Standard)
		.unwrap_err();
	assert!(err.is_not_connected());
	assert_eq!(file.path(), Path::new(&source));
}
