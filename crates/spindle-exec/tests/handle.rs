// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::time::Duration;

use spindle_core::containers::Chip;
use spindle_core::Unique;
use spindle_dry_tests::{init_tracing, write_read_wait, LoopbackTransport};
use spindle_exec::{
    ExceptionFlags, ExecuteOptions, ExecutorError, ExecutorHandle, ExecutorState,
    PlaybackProgramExecutor,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_take_turns_on_the_board() {
    init_tracing();
    let mut transport = LoopbackTransport::new();
    transport.set_busy_polls(20);
    let handle = ExecutorHandle::new(PlaybackProgramExecutor::new(transport));

    let chip = Chip::default();
    let (first, first_ticket) = write_read_wait(Unique, &chip).unwrap();
    let (second, second_ticket) = write_read_wait(Unique, &chip).unwrap();

    let a = tokio::spawn({
        let handle = handle.clone();
        async move { handle.run(first).await }
    });
    let b = tokio::spawn({
        let handle = handle.clone();
        async move { handle.run(second).await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(first_ticket.get().unwrap(), chip);
    assert_eq!(second_ticket.get().unwrap(), chip);
    assert_eq!(handle.state().await, ExecutorState::Decoded);

    let executor = handle.try_into_inner().unwrap();
    assert_eq!(executor.transport().trigger_count(), 2);
    assert_eq!(executor.transport().transmit_count(), 2);
}

#[tokio::test]
async fn timeouts_surface_through_the_handle() {
    let mut transport = LoopbackTransport::new();
    transport.set_stuck(true);
    transport.set_exception(ExceptionFlags::SERDES_RACE);
    let handle = ExecutorHandle::new(PlaybackProgramExecutor::new(transport));
    let (program, ticket) = write_read_wait(Unique, &Chip::default()).unwrap();

    let options = ExecuteOptions::new(
        Duration::from_micros(50),
        Duration::from_millis(1),
        Duration::from_millis(20),
    );
    let err = handle.run_with(program, options).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Timeout { .. }), "{err}");
    assert!(!ticket.valid());
    assert_eq!(handle.state().await, ExecutorState::Failed);
    assert_eq!(
        handle.last_exception().await,
        Some(ExceptionFlags::SERDES_RACE)
    );
}

#[test]
fn executor_is_only_released_by_the_last_handle() {
    let handle = ExecutorHandle::new(PlaybackProgramExecutor::new(LoopbackTransport::new()));
    let other = handle.clone();
    assert!(format!("{other:?}").contains("handles: 2"));

    let handle = handle.try_into_inner().unwrap_err();
    drop(other);
    assert!(format!("{handle:?}").contains("handles: 1"));
    let executor = handle.try_into_inner().unwrap();
    assert_eq!(executor.transport().trigger_count(), 0);
}
