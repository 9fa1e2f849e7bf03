//! End-to-end tests for complete ping-pong sessions
//!
//! These tests drive full sessions through the public API against the
//! virtual device: open both ports, run to a stop condition, release
//! everything, then render the collected series.

use midi_ping_pong::{
    executor::{IterationRecord, LoopConfig, NoopObserver, RunLimit},
    logging::{LogLevel, Logger},
    output::{JsonRenderer, RenderOptions, SeriesRenderer, SvgRenderer},
    session::{run_session, Session},
    transport::{Responder, TransportDriver, VirtualDriver},
    AppError, Endpoints, RoundTripOutcome, RunReport, StopReason,
};
use proptest::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

fn quiet_logger() -> Logger {
    Logger::new("E2E").with_level(LogLevel::Fatal)
}

fn config(limit: RunLimit) -> LoopConfig {
    LoopConfig::default()
        .with_interval(Duration::from_millis(1))
        .with_limit(limit)
}

async fn run(driver: &VirtualDriver, config: LoopConfig) -> Result<RunReport, AppError> {
    run_session(
        driver,
        Endpoints::new(0, 0),
        config,
        None,
        &mut NoopObserver,
        quiet_logger(),
    )
    .await
}

#[tokio::test]
async fn test_happy_path_collects_every_sample() {
    let driver = VirtualDriver::new(Responder::echo());
    let report = run(&driver, config(RunLimit::iterations(5))).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::IterationsCompleted);
    assert_eq!(report.iterations, 5);
    assert_eq!(report.series.len(), 5);
    assert_eq!(report.outcomes.matched, 5);
    for sample in &report.series {
        assert!(sample.rtt_ms() > 0.0);
        assert!(sample.rtt_ms() < 1000.0);
    }

    let stats = report.statistics();
    assert_eq!(stats.sample_count, 5);
    assert!((stats.success_rate - 100.0).abs() < 1e-9);
    assert!(stats.min_ms <= stats.mean_ms && stats.mean_ms <= stats.max_ms);
}

#[tokio::test(start_paused = true)]
async fn test_silent_device_times_out_every_iteration() {
    let driver = VirtualDriver::new(Responder::Silent);
    let config = LoopConfig::default().with_limit(RunLimit::iterations(3));
    let report = run(&driver, config).await.unwrap();

    assert_eq!(report.iterations, 3);
    assert_eq!(report.outcomes.timed_out, 3);
    assert!(report.series.is_empty());
    // three 2 s deadlines plus two 20 ms pauses
    assert!(report.elapsed >= Duration::from_millis(6040));
    assert!(report.elapsed < Duration::from_millis(6100));
    assert!(!report.statistics().has_samples());
}

#[tokio::test]
async fn test_corrupt_device_reports_mismatches() {
    let driver = VirtualDriver::new(Responder::corrupt());
    let report = run(&driver, config(RunLimit::iterations(4))).await.unwrap();

    assert_eq!(report.outcomes.mismatched, 4);
    assert!(report.series.is_empty());
    assert!(report
        .history
        .iter()
        .all(|record| matches!(record.outcome, RoundTripOutcome::Mismatch(_))));
}

#[tokio::test]
async fn test_noisy_device_still_matches() {
    let driver = VirtualDriver::new(Responder::noisy());
    let report = run(&driver, config(RunLimit::iterations(5))).await.unwrap();

    assert_eq!(report.outcomes.matched, 5);
    assert_eq!(report.outcomes.mismatched, 0);
    assert_eq!(report.outcomes.timed_out, 0);
}

#[tokio::test]
async fn test_mixed_outcomes_keep_send_order() {
    let driver = VirtualDriver::new(Responder::Sequence(vec![
        Responder::echo(),
        Responder::corrupt(),
        Responder::echo(),
    ]));
    let mut seen: Vec<IterationRecord> = Vec::new();
    let mut observer = |record: &IterationRecord| seen.push(record.clone());

    let report = run_session(
        &driver,
        Endpoints::new(0, 0),
        config(RunLimit::iterations(6)),
        None,
        &mut observer,
        quiet_logger(),
    )
    .await
    .unwrap();

    assert_eq!(seen.len(), 6);
    assert_eq!(seen, report.history);
    assert_eq!(report.outcomes.matched, 4);
    assert_eq!(report.outcomes.mismatched, 2);
    assert!(seen.windows(2).all(|pair| pair[0].sent_at <= pair[1].sent_at));
}

#[tokio::test]
async fn test_listener_failure_keeps_partial_results() {
    let driver = VirtualDriver::new(Responder::echo()).with_input_failure_after(3);
    let report = run(&driver, config(RunLimit::iterations(10))).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::ListenerClosed);
    assert_eq!(report.series.len(), 3);

    let probe = driver.probe();
    assert!(!probe.input_open());
    assert!(!probe.output_open());
}

#[tokio::test]
async fn test_send_failure_releases_ports() {
    let driver = VirtualDriver::new(Responder::echo()).with_send_failure();
    let result = run(&driver, config(RunLimit::iterations(3))).await;

    assert!(matches!(result, Err(AppError::Transport(_))));
    let probe = driver.probe();
    assert!(!probe.input_open());
    assert!(!probe.output_open());
}

#[tokio::test]
async fn test_unknown_port_is_a_port_open_error() {
    let driver = VirtualDriver::default();
    let result = Session::open(&driver, Endpoints::new(0, 9), quiet_logger());

    assert!(matches!(result, Err(AppError::PortOpen(_))));
    assert!(!driver.probe().input_open());
}

#[tokio::test]
async fn test_sessions_can_run_back_to_back() {
    let driver = VirtualDriver::new(Responder::echo());
    for _ in 0..3 {
        let report = run(&driver, config(RunLimit::iterations(2))).await.unwrap();
        assert_eq!(report.series.len(), 2);
    }

    let probe = driver.probe();
    assert_eq!(probe.inputs_opened(), 3);
    assert_eq!(probe.outputs_opened(), 3);
    driver.shutdown();
    assert!(probe.is_shut_down());
}

#[tokio::test]
async fn test_report_renders_to_svg_and_json() {
    let driver = VirtualDriver::new(Responder::echo());
    let report = run(&driver, config(RunLimit::iterations(3))).await.unwrap();

    let dir = TempDir::new().unwrap();
    let svg = SvgRenderer::default()
        .render(&report.series, &RenderOptions::new("E2E", dir.path().join("graphs/run.svg")))
        .unwrap();
    let json = JsonRenderer::for_report(&report)
        .render(&report.series, &RenderOptions::new("E2E", dir.path().join("run.json")))
        .unwrap();

    let svg = std::fs::read_to_string(svg).unwrap();
    assert!(svg.starts_with("<svg") || svg.starts_with("<?xml"));
    assert!(svg.contains("E2E"));

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(value["samples"].as_array().map(Vec::len), Some(3));
    assert_eq!(value["stop_reason"], "iterations_completed");
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_count_bounded_runs_are_exact(count in 1u32..12, delay_ms in 0u64..40) {
        let report = block_on(async {
            let driver = VirtualDriver::new(Responder::echo_after(Duration::from_millis(delay_ms)));
            run(&driver, config(RunLimit::iterations(count))).await
        }).unwrap();

        prop_assert_eq!(report.iterations, count);
        prop_assert_eq!(report.series.len() as u32, count);
        let offsets = report.series.offsets_secs();
        prop_assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
        prop_assert!(report.series.iter().all(|sample| sample.rtt_ms() >= 0.0));
    }
}
