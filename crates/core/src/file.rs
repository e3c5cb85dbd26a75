//! Label state of a single file, read and changed through the labeling engine.

use std::path::{Path, PathBuf};

use mip_protocol::{AssignmentMethod, Capability, ContentLabel, EngineId, LabelingOptions};
use tracing::{debug, info};

use crate::backend::ContentHandler;
use crate::error::{Error, Result};
use crate::host::SessionHost;

/// One file's label snapshot and the handler it was read from.
///
/// The snapshot changes only on [`refresh`](Self::refresh) or
/// [`get_label`](Self::get_label); committing a label never updates it.
pub struct LabeledFile {
	path: PathBuf,
	handler: Option<Box<dyn ContentHandler>>,
	/// Engine that created `handler`.
	handler_engine: Option<EngineId>,
	label: Option<ContentLabel>,
	label_id: Option<String>,
	label_name: Option<String>,
	is_protected: bool,
}

impl LabeledFile {
	/// Opens `path` against the host's running labeling engine and reads its label.
	pub fn open(host: &SessionHost, path: impl AsRef<Path>) -> Result<Self> {
		host.labeling_engine("open")?;
		let path = path.as_ref();
		check_source(path)?;

		let mut file = Self {
			path: path.to_path_buf(),
			handler: None,
			handler_engine: None,
			label: None,
			label_id: None,
			label_name: None,
			is_protected: false,
		};
		file.refresh(host)?;
		Ok(file)
	}

	/// Resolves a new handler and recomputes the snapshot from it.
	///
	/// A file without a label clears the snapshot.
	pub fn refresh(&mut self, host: &SessionHost) -> Result<()> {
		let current = self.resolve_handler(host, "refresh")?.label();
		match current {
			Some(current) => {
				self.label_id = Some(current.label.id.clone());
				self.label_name = Some(current.label.name.clone());
				self.is_protected = current.is_protection_applied_from_label;
				self.label = Some(current);
			}
			None => {
				self.label = None;
				self.label_id = None;
				self.label_name = None;
				self.is_protected = false;
			}
		}

		debug!(target: "mip.file", path = %self.path.display(), label = ?self.label_id, protected = self.is_protected, "label state refreshed");
		Ok(())
	}

	/// Applies `label_id` and writes the result to `destination`.
	///
	/// A non-empty `justification` turns the change into a justified
	/// `Standard` assignment regardless of `method`. Returns whether the
	/// backend wrote anything. The snapshot is left as it was.
	pub fn set_label(
		&mut self,
		host: &SessionHost,
		label_id: &str,
		destination: impl AsRef<Path>,
		justification: Option<&str>,
		method: AssignmentMethod,
	) -> Result<bool> {
		let (engine, engine_id) = host.labeling_engine("set_label")?;

		let destination = destination.as_ref();
		if destination.as_os_str().is_empty() {
			return Err(Error::InvalidPath {
				reason: "destination path is empty".into(),
			});
		}
		if same_resource(&self.path, destination) {
			return Err(Error::InvalidArgument {
				name: "destination",
				message: format!("{} is the source file; choose a different output path", destination.display()),
			});
		}
		if label_id.is_empty() {
			return Err(Error::InvalidArgument {
				name: "label_id",
				message: "label id is empty".into(),
			});
		}

		let options = LabelingOptions::for_request(method, justification);

		if self.handler.is_none() || self.handler_engine.as_ref() != Some(engine_id) {
			debug!(target: "mip.file", path = %self.path.display(), "handler belongs to a previous engine; re-resolving");
			self.resolve_handler(host, "set_label")?;
		}
		let Some(handler) = self.handler.as_mut() else {
			return Err(Error::engine_not_running(Capability::Labeling, "set_label"));
		};

		let label = engine.label_by_id(label_id)?;
		handler.set_label(&label, &options)?;
		let committed = host.block_on(handler.commit(destination))?;

		info!(
			target: "mip.file",
			source = %self.path.display(),
			destination = %destination.display(),
			label = %label.id,
			method = %options.assignment_method,
			justified = options.is_downgrade_justified,
			committed,
			"label applied"
		);
		Ok(committed)
	}

	/// Replaces the held handler with one from the running engine.
	///
	/// The path is checked again on every call. The snapshot is not touched.
	fn resolve_handler(&mut self, host: &SessionHost, operation: &str) -> Result<&mut Box<dyn ContentHandler>> {
		let (engine, engine_id) = host.labeling_engine(operation)?;
		check_source(&self.path)?;
		let handler = host.block_on(engine.create_handler(&self.path))?;
		self.handler_engine = Some(engine_id.clone());
		Ok(self.handler.insert(handler))
	}

	/// Refreshes, then returns the current label.
	pub fn get_label(&mut self, host: &SessionHost) -> Result<Option<&ContentLabel>> {
		self.refresh(host)?;
		Ok(self.label.as_ref())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Final component of the path.
	pub fn name(&self) -> Option<&str> {
		self.path.file_name().and_then(|name| name.to_str())
	}

	pub fn label(&self) -> Option<&ContentLabel> {
		self.label.as_ref()
	}

	pub fn label_id(&self) -> Option<&str> {
		self.label_id.as_deref()
	}

	pub fn label_name(&self) -> Option<&str> {
		self.label_name.as_deref()
	}

	pub fn is_protected(&self) -> bool {
		self.is_protected
	}
}

impl std::fmt::Debug for LabeledFile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LabeledFile")
			.field("path", &self.path)
			.field("label_id", &self.label_id)
			.field("label_name", &self.label_name)
			.field("is_protected", &self.is_protected)
			.finish_non_exhaustive()
	}
}

fn check_source(path: &Path) -> Result<()> {
	if path.as_os_str().is_empty() {
		return Err(Error::InvalidPath {
			reason: "path is empty".into(),
		});
	}
	if !path.exists() {
		return Err(Error::NotFound { path: path.to_path_buf() });
	}
	Ok(())
}

/// Case-insensitive path comparison.
fn same_resource(a: &Path, b: &Path) -> bool {
	a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
