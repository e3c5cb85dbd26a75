//! Drives async backend calls to completion from synchronous code.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::trace;

/// Errors raised while setting up the blocking bridge.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
	#[error("failed to build backend runtime: {0}")]
	Build(#[from] std::io::Error),
}

/// A dedicated runtime that resolves backend futures before returning.
///
/// Calls are never cancelled and no timeout is applied: a backend future
/// that never resolves blocks the caller.
pub struct Blocking {
	runtime: Option<Runtime>,
}

impl Blocking {
	/// Builds a current-thread runtime with IO and timers enabled.
	pub fn new() -> Result<Self, RuntimeError> {
		let runtime = Builder::new_current_thread().enable_all().thread_name("mip-backend").build()?;
		Ok(Self { runtime: Some(runtime) })
	}

	fn runtime(&self) -> &Runtime {
		self.runtime.as_ref().expect("runtime is present until drop")
	}

	/// Runs `future` to completion and returns its output.
	///
	/// From inside an existing tokio runtime the future is driven on a
	/// scoped helper thread, since runtimes cannot be nested. A panic inside
	/// the future is resumed on the calling thread.
	pub fn block_on<F>(&self, future: F) -> F::Output
	where
		F: Future + Send,
		F::Output: Send,
	{
		if Handle::try_current().is_err() {
			return self.runtime().block_on(future);
		}

		trace!(target: "mip.runtime", "inside async context; driving backend call on helper thread");
		std::thread::scope(|scope| match scope.spawn(|| self.runtime().block_on(future)).join() {
			Ok(output) => output,
			Err(panic) => std::panic::resume_unwind(panic),
		})
	}
}

impl Drop for Blocking {
	fn drop(&mut self) {
		// Waiting on the blocking pool is not allowed from async code.
		if let Some(runtime) = self.runtime.take() {
			if Handle::try_current().is_ok() {
				runtime.shutdown_background();
			}
		}
	}
}

impl std::fmt::Debug for Blocking {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Blocking").finish_non_exhaustive()
	}
}
