// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Async front for an executor.
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use spindle_core::PlaybackProgram;

use crate::exception::ExceptionFlags;
use crate::executor::{ExecutorError, ExecutorState, PlaybackProgramExecutor};
use crate::settings::ExecuteOptions;
use crate::transport::Transport;

/// Shares one executor between tasks.
///
/// Runs happen on tokio's blocking pool so the poll loop never stalls the
/// async workers. The mutex is held for the whole run: a second caller waits
/// until the board is free.
pub struct ExecutorHandle<T: Transport + 'static> {
    inner: Arc<Mutex<PlaybackProgramExecutor<T>>>,
}

impl<T: Transport + 'static> Clone for ExecutorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> fmt::Debug for ExecutorHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> ExecutorHandle<T> {
    /// Wraps `executor`.
    pub fn new(executor: PlaybackProgramExecutor<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(executor)),
        }
    }

    /// Runs `program` with the executor's configured poll limits.
    pub async fn run(&self, program: PlaybackProgram) -> Result<(), ExecutorError> {
        let options = self.inner.lock().await.settings().execute_options();
        self.run_with(program, options).await
    }

    /// Runs `program` with `options`.
    pub async fn run_with(
        &self,
        program: PlaybackProgram,
        options: ExecuteOptions,
    ) -> Result<(), ExecutorError> {
        let mut executor = Arc::clone(&self.inner).lock_owned().await;
        debug!(program = %program.id(), "running on blocking pool");
        tokio::task::spawn_blocking(move || executor.run_with(&program, &options))
            .await
            .map_err(|e| ExecutorError::Background(e.to_string()))?
    }

    /// Current stage; waits for a running program to finish.
    pub async fn state(&self) -> ExecutorState {
        self.inner.lock().await.state()
    }

    /// Exception register as last read.
    pub async fn last_exception(&self) -> Option<ExceptionFlags> {
        self.inner.lock().await.last_exception()
    }

    /// Returns the executor once no other handle is left.
    pub fn try_into_inner(self) -> Result<PlaybackProgramExecutor<T>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}
