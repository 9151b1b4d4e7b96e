// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::time::{Duration, Instant};

use spindle_config::ConfigService;
use spindle_core::containers::{Chip, NeuronConfig, NeuronThreshold, PllClockOutput, PllDivider};
use spindle_core::{
    generate, AdpllOnChip, ExecutorBackend, FpgaTime, IndexedCoordinate, InitGenerator,
    NeuronOnChip, PlaybackProgramBuilder, TicketError, TimerValue, Unique,
};
use spindle_dry_tests::{
    distinct_spike_labels, init_tracing, spike_injection_program, write_read_wait,
    InMemoryConfigStore, LoopbackTransport, DEFAULT_RESULT_MEMORY,
};
use spindle_exec::{
    ExceptionFlags, ExceptionPolicy, ExecuteOptions, ExecutorError, ExecutorSettings,
    ExecutorState, PlaybackProgramExecutor,
};

fn quick_settings() -> ExecutorSettings {
    ExecutorSettings {
        max_wait_us: 1_000_000,
        reset_retry_ms: 1,
        ..ExecutorSettings::default()
    }
}

fn executor(transport: LoopbackTransport) -> PlaybackProgramExecutor<LoopbackTransport> {
    init_tracing();
    PlaybackProgramExecutor::with_settings(transport, quick_settings())
}

fn neuron() -> NeuronConfig {
    NeuronConfig {
        enable_fire: true,
        threshold: NeuronThreshold::saturating(700),
        refractory_time: 12,
        enable_bypass: false,
    }
}

#[test]
fn written_container_reads_back_through_the_ticket() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let chip = Chip::default();
    let (program, ticket) = write_read_wait(Unique, &chip)?;

    assert!(!ticket.valid());
    assert!(matches!(
        ticket.get(),
        Err(TicketError::NotYetAvailable { .. })
    ));

    executor.run(&program)?;
    assert!(ticket.valid());
    assert_eq!(ticket.get()?, chip);
    assert_eq!(executor.state(), ExecutorState::Decoded);
    assert_eq!(executor.last_exception(), Some(ExceptionFlags::empty()));
    assert_eq!(executor.transport().clock(), FpgaTime(1000));
    Ok(())
}

#[test]
fn ticket_carries_the_response_timestamp() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let coord = NeuronOnChip::from_index(3)?;
    let (program, ticket) = write_read_wait(coord, &neuron())?;
    executor.run(&program)?;
    assert_eq!(ticket.get()?, neuron());
    // One write, then the read on the next cycle.
    assert_eq!(ticket.fpga_time()?, FpgaTime(2));
    assert_eq!(ticket.coordinate(), &coord);
    Ok(())
}

#[test]
fn without_time_annotation_tickets_count_messages() -> anyhow::Result<()> {
    let settings = ExecutorSettings {
        time_annotation: false,
        ..quick_settings()
    };
    let mut executor = PlaybackProgramExecutor::with_settings(LoopbackTransport::new(), settings);
    let mut builder = PlaybackProgramBuilder::new();
    let coords = [NeuronOnChip::from_index(0)?, NeuronOnChip::from_index(1)?];
    for coord in coords {
        builder.write(coord, &neuron())?;
    }
    let first = builder.read::<NeuronConfig>(coords[0])?;
    let second = builder.read::<NeuronConfig>(coords[1])?;
    let program = builder.done();

    executor.run(&program)?;
    assert_eq!(first.fpga_time()?, FpgaTime(0));
    assert_eq!(second.fpga_time()?, FpgaTime(1));
    Ok(())
}

#[test]
fn stuck_execute_flag_times_out_within_the_budget() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_stuck(true);
    transport.set_exception(ExceptionFlags::PROGRAM_EXCEPTION);
    let mut executor = executor(transport);
    let (program, ticket) = write_read_wait(Unique, &Chip::default())?;

    let options = ExecuteOptions::new(
        Duration::from_micros(50),
        Duration::from_millis(10),
        Duration::from_secs(1),
    );
    executor.transfer(&program)?;
    let started = Instant::now();
    let err = executor.execute(&options).unwrap_err();
    let elapsed = started.elapsed();

    match err {
        ExecutorError::Timeout { waited, exception } => {
            assert_eq!(waited, Duration::from_secs(1));
            assert_eq!(exception, Some(ExceptionFlags::PROGRAM_EXCEPTION));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(executor.state(), ExecutorState::Failed);
    assert!(!ticket.valid());
    Ok(())
}

#[test]
fn exception_bit_fails_fetch_before_any_ticket_resolves() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_exception(ExceptionFlags::ENCODE_OVERFLOW);
    let mut executor = executor(transport);
    let (program, ticket) = write_read_wait(Unique, &Chip::default())?;

    let err = executor.run(&program).unwrap_err();
    assert!(
        matches!(err, ExecutorError::HardwareException(f) if f == ExceptionFlags::ENCODE_OVERFLOW),
        "{err}"
    );
    assert!(!ticket.valid());
    assert_eq!(program.run_count(), 0);
    assert_eq!(executor.state(), ExecutorState::Failed);
    assert_eq!(
        executor.last_exception(),
        Some(ExceptionFlags::ENCODE_OVERFLOW)
    );
    Ok(())
}

#[test]
fn serdes_overflow_is_a_policy_decision() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_exception(ExceptionFlags::SERDES_OVERFLOW);
    let mut tolerant = executor(transport);
    let (program, ticket) = write_read_wait(Unique, &Chip::default())?;
    tolerant.run(&program)?;
    assert!(ticket.valid());

    let mut transport = tolerant.into_transport();
    transport.set_exception(ExceptionFlags::SERDES_OVERFLOW);
    let strict = ExecutorSettings {
        exception_policy: ExceptionPolicy::strict(),
        ..quick_settings()
    };
    let mut strict = PlaybackProgramExecutor::with_settings(transport, strict);
    let err = strict.run(&program).unwrap_err();
    assert!(matches!(err, ExecutorError::HardwareException(_)), "{err}");
    assert!(!ticket.valid());
    Ok(())
}

#[test]
fn fetch_only_accepts_the_transferred_program() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let (first, _) = write_read_wait(Unique, &Chip::default())?;
    let (second, _) = write_read_wait(Unique, &Chip::default())?;

    assert!(matches!(
        executor.execute(&ExecuteOptions::default()),
        Err(ExecutorError::NothingTransferred)
    ));
    assert!(matches!(
        executor.fetch(&first),
        Err(ExecutorError::NothingTransferred)
    ));

    executor.transfer(&first)?;
    executor.execute(&ExecuteOptions::default())?;
    match executor.fetch(&second) {
        Err(ExecutorError::ProgramMismatch {
            transferred,
            requested,
        }) => {
            assert_eq!(transferred, first.id());
            assert_eq!(requested, second.id());
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    // A clone is the same program.
    executor.fetch(&first.clone())?;
    Ok(())
}

#[test]
fn oversized_result_fails_before_reading() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_result_size_override(Some(DEFAULT_RESULT_MEMORY + 1));
    let mut executor = executor(transport);
    let (program, ticket) = write_read_wait(Unique, &Chip::default())?;
    match executor.run(&program) {
        Err(ExecutorError::ResultTooLarge { size, max }) => {
            assert_eq!(size, DEFAULT_RESULT_MEMORY + 1);
            assert_eq!(max, DEFAULT_RESULT_MEMORY);
        }
        other => panic!("expected size error, got {other:?}"),
    }
    assert!(!ticket.valid());
    // Nothing was read, so the exception register was never sampled.
    assert_eq!(executor.last_exception(), None);
    Ok(())
}

#[test]
fn hardware_only_programs_refuse_simulation() -> anyhow::Result<()> {
    let mut builder = PlaybackProgramBuilder::new();
    builder.write(AdpllOnChip::MIN, &PllClockOutput::default())?;
    let ticket = builder.read::<PllClockOutput>(AdpllOnChip::MIN)?;
    let program = builder.done();

    let mut simulation = executor(LoopbackTransport::new());
    match simulation.run(&program) {
        Err(ExecutorError::IncompatibleProgram {
            required,
            available,
            ..
        }) => {
            assert_eq!(required, ExecutorBackend::Hardware);
            assert_eq!(available, ExecutorBackend::Simulation);
        }
        other => panic!("expected incompatibility, got {other:?}"),
    }
    assert_eq!(simulation.transport().transmit_count(), 0);

    let mut hardware = executor(LoopbackTransport::with_backend(ExecutorBackend::Hardware));
    hardware.run(&program)?;
    assert_eq!(ticket.get()?, PllClockOutput::default());
    Ok(())
}

#[test]
fn every_pll_divider_reads_back_unchanged() -> anyhow::Result<()> {
    let mut hardware = executor(LoopbackTransport::with_backend(ExecutorBackend::Hardware));
    let coord = NeuronOnChip::MIN;
    for raw in PllDivider::MIN.value()..=PllDivider::MAX.value() {
        let config = PllClockOutput {
            enable_output: raw % 2 == 0,
            switch_to_adpll: true,
            divider: PllDivider::new(raw)?,
        };
        let mut builder = PlaybackProgramBuilder::new();
        builder.write(AdpllOnChip::MIN, &config)?;
        builder.write(coord, &neuron())?;
        let pll = builder.read::<PllClockOutput>(AdpllOnChip::MIN)?;
        let neuron_ticket = builder.read::<NeuronConfig>(coord)?;
        let program = builder.done();
        hardware.run(&program)?;
        assert_eq!(pll.get()?, config);
        assert_eq!(neuron_ticket.get()?, neuron());
        assert_eq!(program.run_count(), 1);
    }
    Ok(())
}

#[test]
fn rerunning_overwrites_results() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let labels = distinct_spike_labels(6);
    let program = spike_injection_program(&labels, &[3])?;

    executor.run(&program)?;
    executor.run(&program)?;
    assert_eq!(program.run_count(), 2);
    assert_eq!(program.spikes().len(), 6);
    assert_eq!(program.spike_pack_counts(), [0, 0, 2]);
    assert_eq!(executor.transport().trigger_count(), 2);
    Ok(())
}

#[test]
fn injected_spikes_arrive_once_in_order() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let labels = distinct_spike_labels(1000);
    let program = spike_injection_program(&labels, &[1, 2, 3, 2])?;
    executor.run(&program)?;

    let received: Vec<u16> = program.spikes().iter().map(|s| s.label.0).collect();
    let sent: Vec<u16> = labels.iter().map(|l| l.0).collect();
    assert_eq!(received, sent);
    // 1000 labels in cycles of 8 labels over 4 packs.
    assert_eq!(program.spike_pack_counts(), [125, 250, 125]);
    assert!(program
        .spikes()
        .windows(2)
        .all(|w| w[0].fpga_time <= w[1].fpga_time));
    Ok(())
}

#[test]
fn busy_board_is_polled_until_done() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_busy_polls(5);
    let mut executor = executor(transport);
    let (program, ticket) = write_read_wait(Unique, &Chip::default())?;
    executor.run(&program)?;
    assert!(ticket.valid());
    assert_eq!(executor.transport().poll_count(), 6);
    Ok(())
}

#[test]
fn chip_in_reset_is_retried_then_refused() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_in_reset_for(2);
    let mut executor = executor(transport);
    let (program, _) = write_read_wait(Unique, &Chip::default())?;
    executor.run(&program)?;

    executor.transport_mut().set_in_reset_for(10);
    let err = executor.run(&program).unwrap_err();
    assert!(
        matches!(err, ExecutorError::ChipInReset { attempts: 3 }),
        "{err}"
    );
    assert_eq!(executor.transport().trigger_count(), 1);
    Ok(())
}

#[test]
fn failed_transfer_leaves_nothing_to_execute() -> anyhow::Result<()> {
    let mut transport = LoopbackTransport::new();
    transport.set_fail_transmit(true);
    let mut executor = executor(transport);
    let (program, _) = write_read_wait(Unique, &Chip::default())?;

    assert!(matches!(
        executor.transfer(&program),
        Err(ExecutorError::Transport(_))
    ));
    assert_eq!(executor.state(), ExecutorState::Failed);
    assert!(matches!(
        executor.execute(&ExecuteOptions::default()),
        Err(ExecutorError::NothingTransferred)
    ));
    Ok(())
}

#[test]
fn settings_round_trip_through_the_config_service() -> anyhow::Result<()> {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    assert_eq!(ExecutorSettings::load(&service)?, ExecutorSettings::default());

    let settings = ExecutorSettings {
        max_wait_us: 5_000,
        exception_policy: ExceptionPolicy::strict(),
        ..ExecutorSettings::default()
    };
    settings.save(&service)?;
    assert_eq!(store.keys(), vec![ExecutorSettings::KEY]);

    let loaded = ExecutorSettings::load(&service)?;
    assert_eq!(loaded, settings);
    let executor = PlaybackProgramExecutor::with_settings(LoopbackTransport::new(), loaded);
    assert_eq!(
        executor.settings().execute_options().backoff.max_wait,
        Duration::from_millis(5)
    );
    Ok(())
}

#[test]
fn bring_up_sequence_runs_on_simulation() -> anyhow::Result<()> {
    let mut executor = executor(LoopbackTransport::new());
    let (mut builder, ()) = generate(&InitGenerator::for_simulation())?;
    let coord = NeuronOnChip::from_index(7)?;
    builder.write(coord, &neuron())?;
    let ticket = builder.read::<NeuronConfig>(coord)?;
    let program = builder.done();
    assert_eq!(program.executable_restriction(), None);

    executor.run(&program)?;
    assert_eq!(ticket.get()?, neuron());
    // The read happens after the reset settle wait has elapsed.
    let settle = u64::from(TimerValue::from_us(100).value());
    assert!(ticket.fpga_time()?.0 > settle, "{:?}", ticket.fpga_time());
    Ok(())
}
