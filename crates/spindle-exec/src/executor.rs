// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transfer, trigger, poll, fetch and decode.
use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

use spindle_core::{ExecutorBackend, PlaybackProgram, ProgramError, ProgramId};
use spindle_proto::{demultiplex, encode_program, transfer_blocks, ProgramFlags, WireError};

use crate::backoff::{Backoff, BackoffStep};
use crate::exception::ExceptionFlags;
use crate::settings::{ExecuteOptions, ExecutorSettings};
use crate::transport::{Transport, TransportError};

/// Stage the executor is in, or stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorState {
    /// Nothing transferred yet.
    Idle,
    /// Program pushed to the board (or being pushed).
    Transferring,
    /// Execute flag set.
    Triggered,
    /// Waiting for the execute flag to clear.
    Polling,
    /// Reading results back.
    Fetching,
    /// Results stored in the program.
    Decoded,
    /// The last step failed.
    Failed,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Executor failures.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The link failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Encoding the program or decoding the response failed.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The program is restricted to another kind of executor.
    #[error("program {program} requires a {required} executor, this one is {available}")]
    IncompatibleProgram {
        /// Program identity.
        program: ProgramId,
        /// Restriction recorded by the builder.
        required: ExecutorBackend,
        /// Executor behind the transport.
        available: ExecutorBackend,
    },
    /// Execute or fetch before any transfer.
    #[error("no playback program has been transferred yet")]
    NothingTransferred,
    /// Fetch for a program other than the one transferred.
    #[error("program {requested} was not transferred; {transferred} was")]
    ProgramMismatch {
        /// Program on the board.
        transferred: ProgramId,
        /// Program passed to fetch.
        requested: ProgramId,
    },
    /// The chip stayed in reset.
    #[error("chip still in reset after {attempts} checks")]
    ChipInReset {
        /// Checks made.
        attempts: u32,
    },
    /// The execute flag did not clear in time.
    #[error("execute flag not cleared after {waited:?} (exceptions: {})", .exception.map_or_else(|| "unreadable".to_owned(), |e| e.to_string()))]
    Timeout {
        /// Time spent polling.
        waited: Duration,
        /// Exception register at abort, if it could be read.
        exception: Option<ExceptionFlags>,
    },
    /// The board reports more result bytes than result memory holds.
    #[error("result size {size} exceeds result memory of {max} bytes")]
    ResultTooLarge {
        /// Reported size.
        size: usize,
        /// Capacity.
        max: usize,
    },
    /// The exception register has a flag the policy does not tolerate.
    #[error("hardware exception raised: {0}")]
    HardwareException(ExceptionFlags),
    /// The response does not fit the program's tickets.
    #[error(transparent)]
    Resolve(#[from] ProgramError),
    /// The background task running the program died.
    #[error("background run failed: {0}")]
    Background(String),
}

/// Runs playback programs over one transport, one step at a time.
///
/// Every step moves [`state`](Self::state) forward; any error parks the
/// executor in [`ExecutorState::Failed`] until the next step.
pub struct PlaybackProgramExecutor<T: Transport> {
    transport: T,
    settings: ExecutorSettings,
    state: ExecutorState,
    transferred: Option<PlaybackProgram>,
    last_exception: Option<ExceptionFlags>,
}

impl<T: Transport> PlaybackProgramExecutor<T> {
    /// Executor with default settings.
    pub fn new(transport: T) -> Self {
        Self::with_settings(transport, ExecutorSettings::default())
    }

    /// Executor with `settings`.
    pub fn with_settings(transport: T, settings: ExecutorSettings) -> Self {
        Self {
            transport,
            settings,
            state: ExecutorState::Idle,
            transferred: None,
            last_exception: None,
        }
    }

    /// Current stage.
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Exception register as last read, by fetch or by a timed-out execute.
    pub fn last_exception(&self) -> Option<ExceptionFlags> {
        self.last_exception
    }

    /// Settings in use.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Kind of executor behind the transport.
    pub fn executor_backend(&self) -> ExecutorBackend {
        self.transport.executor_backend()
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the executor and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Encodes `program` and pushes it to program memory.
    #[instrument(skip(self, program), fields(program = %program.id()))]
    pub fn transfer(&mut self, program: &PlaybackProgram) -> Result<(), ExecutorError> {
        self.guarded(|this| {
            let available = this.transport.executor_backend();
            if let Some(required) = program.executable_restriction() {
                if required != available {
                    return Err(ExecutorError::IncompatibleProgram {
                        program: program.id(),
                        required,
                        available,
                    });
                }
            }

            this.transferred = None;
            this.state = ExecutorState::Transferring;
            let flags = ProgramFlags::with_time_annotation(this.settings.time_annotation);
            let bytes = encode_program(program.instructions(), flags)?;
            let blocks: Vec<&[u8]> = transfer_blocks(&bytes).collect();
            debug!(
                bytes = bytes.len(),
                blocks = blocks.len(),
                instructions = program.instructions().len(),
                "transferring program"
            );
            this.transport.transmit(&blocks)?;

            this.transferred = Some(program.clone());
            Ok(())
        })
    }

    /// Sets the execute flag and polls until it clears.
    ///
    /// Clears the transferred program's tickets and event buffers first; they
    /// stay empty until a matching [`fetch`](Self::fetch) succeeds.
    ///
    /// Exceeding `options.backoff.max_wait` fails with
    /// [`ExecutorError::Timeout`] carrying the exception register at abort.
    #[instrument(skip(self, options))]
    pub fn execute(&mut self, options: &ExecuteOptions) -> Result<(), ExecutorError> {
        self.guarded(|this| {
            let program = this
                .transferred
                .clone()
                .ok_or(ExecutorError::NothingTransferred)?;
            this.ensure_out_of_reset()?;

            program.begin_run();
            this.transport.trigger()?;
            this.state = ExecutorState::Triggered;
            debug!("execution started");

            if let Some(runtime) = options.expected_runtime {
                trace!(?runtime, "sleeping for expected runtime");
                thread::sleep(runtime);
            }

            this.state = ExecutorState::Polling;
            let mut backoff = Backoff::new(options.backoff);
            while this.transport.poll_status()? {
                match backoff.next_step() {
                    BackoffStep::Sleep(period) => {
                        trace!(?period, "execute flag not yet cleared");
                        thread::sleep(period);
                    }
                    BackoffStep::Expired { waited } => {
                        let exception = this.transport.read_exception_flags().ok();
                        this.last_exception = exception;
                        error!(?waited, ?exception, "execute flag not cleared, aborting");
                        return Err(ExecutorError::Timeout { waited, exception });
                    }
                }
            }
            debug!(
                polls = backoff.steps() + 1,
                waited = ?backoff.waited(),
                "execution finished"
            );
            Ok(())
        })
    }

    /// Reads the results of the last run back into `program`.
    ///
    /// `program` must be the one passed to the last [`transfer`](Self::transfer).
    /// Any exception flag not tolerated by the policy fails the fetch before
    /// a single ticket is resolved.
    #[instrument(skip(self, program), fields(program = %program.id()))]
    pub fn fetch(&mut self, program: &PlaybackProgram) -> Result<(), ExecutorError> {
        self.guarded(|this| {
            let transferred = this
                .transferred
                .as_ref()
                .ok_or(ExecutorError::NothingTransferred)?;
            if transferred != program {
                return Err(ExecutorError::ProgramMismatch {
                    transferred: transferred.id(),
                    requested: program.id(),
                });
            }

            this.state = ExecutorState::Fetching;
            let size = this.transport.read_result_size()?;
            let max = this.transport.max_result_size();
            if size > max {
                return Err(ExecutorError::ResultTooLarge { size, max });
            }

            let flags = this.transport.read_exception_flags()?;
            this.last_exception = Some(flags);
            let fatal = this.settings.exception_policy.fatal(flags);
            if !fatal.is_empty() {
                error!(%flags, "hardware exception raised, aborting fetch");
                return Err(ExecutorError::HardwareException(flags));
            }
            if !flags.is_empty() {
                warn!(%flags, "tolerated hardware exception raised");
            }

            let bytes = this.transport.bulk_read(0, size)?;
            let response = demultiplex(&bytes)?;
            debug!(
                bytes = size,
                words = response.words.len(),
                spikes = response.spikes.len(),
                "fetched results"
            );
            program.complete_run(response)?;
            this.state = ExecutorState::Decoded;
            Ok(())
        })
    }

    /// Transfer, execute with the configured poll limits, fetch.
    pub fn run(&mut self, program: &PlaybackProgram) -> Result<(), ExecutorError> {
        let options = self.settings.execute_options();
        self.run_with(program, &options)
    }

    /// Transfer, execute with `options`, fetch.
    pub fn run_with(
        &mut self,
        program: &PlaybackProgram,
        options: &ExecuteOptions,
    ) -> Result<(), ExecutorError> {
        self.transfer(program)?;
        self.execute(options)?;
        self.fetch(program)?;
        info!(program = %program.id(), run = program.run_count(), "program run complete");
        Ok(())
    }

    fn ensure_out_of_reset(&mut self) -> Result<(), ExecutorError> {
        let attempts = self.settings.reset_attempts.max(1);
        for attempt in 1..=attempts {
            if !self.transport.chip_in_reset()? {
                return Ok(());
            }
            warn!(attempt, attempts, "chip in reset, refusing to trigger yet");
            if attempt < attempts {
                thread::sleep(self.settings.reset_retry());
            }
        }
        Err(ExecutorError::ChipInReset { attempts })
    }

    fn guarded<R>(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<R, ExecutorError>,
    ) -> Result<R, ExecutorError> {
        let out = step(self);
        if out.is_err() {
            self.state = ExecutorState::Failed;
        }
        out
    }
}

impl<T: Transport + fmt::Debug> fmt::Debug for PlaybackProgramExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackProgramExecutor")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("transferred", &self.transferred.as_ref().map(PlaybackProgram::id))
            .field("last_exception", &self.last_exception)
            .finish_non_exhaustive()
    }
}
