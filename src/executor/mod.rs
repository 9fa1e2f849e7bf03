//! Round-trip execution engine
//!
//! This module contains the measurement loop:
//! - Strictly serialized ping transmissions (never two outstanding pings)
//! - A deadline race between the delivery slot and a timer
//! - Duration-bounded, count-bounded or combined stop conditions
//! - Interruption by the operator between and during iterations

use crate::{
    codec,
    correlator::{Deliveries, Delivery},
    error::{ErrorContext, Result},
    logging::Logger,
    models::{OutcomeCounts, RoundTripOutcome, Sample, SampleSeries},
    stats::LatencyStatistics,
    transport::OutputPort,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// When a run stops
///
/// Whichever configured limit is reached first ends the run. A limit with
/// neither bound never stops on its own and is rejected by config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimit {
    /// Wall-clock length measured from session start
    pub max_duration: Option<Duration>,
    /// Number of resolved iterations (matched, mismatched or timed out)
    pub max_iterations: Option<u32>,
}

impl RunLimit {
    /// Duration-bounded run, for interactive use
    pub fn duration(duration: Duration) -> Self {
        Self {
            max_duration: Some(duration),
            max_iterations: None,
        }
    }

    /// Count-bounded run, for deterministic automation
    pub fn iterations(count: u32) -> Self {
        Self {
            max_duration: None,
            max_iterations: Some(count),
        }
    }

    pub fn both(duration: Duration, count: u32) -> Self {
        Self {
            max_duration: Some(duration),
            max_iterations: Some(count),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_duration.is_some() || self.max_iterations.is_some()
    }

    /// Stop reason if a limit has been reached
    pub fn reached(&self, elapsed: Duration, iterations: u32) -> Option<StopReason> {
        if self.max_iterations.is_some_and(|max| iterations >= max) {
            return Some(StopReason::IterationsCompleted);
        }
        if self.max_duration.is_some_and(|max| elapsed >= max) {
            return Some(StopReason::DurationElapsed);
        }
        None
    }
}

impl Default for RunLimit {
    fn default() -> Self {
        Self::duration(crate::defaults::DEFAULT_TEST_DURATION)
    }
}

/// Parameters of the round-trip loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Deadline for the pong after each ping
    pub timeout: Duration,
    /// Pause after every outcome before the next ping
    pub interval: Duration,
    /// Stop condition
    pub limit: RunLimit,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            timeout: crate::defaults::DEFAULT_TIMEOUT,
            interval: crate::defaults::DEFAULT_INTERVAL,
            limit: RunLimit::default(),
        }
    }
}

impl LoopConfig {
    pub fn with_limit(mut self, limit: RunLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    DurationElapsed,
    IterationsCompleted,
    /// Operator interrupt
    Interrupted,
    /// The input stream ended or failed; no further pong can arrive
    ListenerClosed,
}

impl StopReason {
    /// Whether the run ended the way the caller asked it to
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopReason::ListenerClosed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::DurationElapsed => "test duration elapsed",
            StopReason::IterationsCompleted => "iteration count completed",
            StopReason::Interrupted => "interrupted",
            StopReason::ListenerClosed => "input stream closed",
        };
        f.write_str(text)
    }
}

/// One resolved iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    /// Zero-based iteration number
    pub index: u32,
    /// Ping send time from session start
    pub sent_at: Duration,
    pub outcome: RoundTripOutcome,
}

/// Receives every resolved iteration as it happens
pub trait IterationObserver: Send {
    fn on_iteration(&mut self, record: &IterationRecord);
}

impl<F> IterationObserver for F
where
    F: FnMut(&IterationRecord) + Send,
{
    fn on_iteration(&mut self, record: &IterationRecord) {
        self(record)
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IterationObserver for NoopObserver {
    fn on_iteration(&mut self, _record: &IterationRecord) {}
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Matched round trips in send order
    pub series: SampleSeries,
    pub outcomes: OutcomeCounts,
    /// Every resolved iteration in order
    pub history: Vec<IterationRecord>,
    /// Resolved iterations, equal to `outcomes.total()`
    pub iterations: u32,
    /// Wall-clock length of the run
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl RunReport {
    pub fn statistics(&self) -> LatencyStatistics {
        LatencyStatistics::from_series(&self.series, &self.outcomes)
    }
}

/// How the wait for a pong ended
enum Wait {
    Delivered(Delivery),
    Deadline,
    Closed,
    Interrupted,
}

/// The send/await/record/pace control loop
pub struct RoundTripLoop {
    config: LoopConfig,
    logger: Logger,
    interrupt: Option<watch::Receiver<bool>>,
}

impl RoundTripLoop {
    pub fn new(config: LoopConfig, logger: Logger) -> Self {
        Self {
            config,
            logger,
            interrupt: None,
        }
    }

    /// Stop early once `interrupt` becomes true
    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run until a limit, an interrupt or listener closure
    ///
    /// A send failure aborts the run with the error; all other conditions
    /// return a report holding whatever was measured.
    pub async fn run(
        &mut self,
        output: &mut dyn OutputPort,
        deliveries: &mut Deliveries,
        observer: &mut dyn IterationObserver,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let mut series = SampleSeries::new();
        let mut outcomes = OutcomeCounts::default();
        let mut history = Vec::new();
        let mut iterations: u32 = 0;

        self.logger
            .info(&format!("Pinging {}", output.name()))
            .field("timeout_ms", self.config.timeout.as_millis() as u64)
            .field("interval_ms", self.config.interval.as_millis() as u64)
            .field("max_iterations", self.config.limit.max_iterations)
            .field("max_duration_s", self.config.limit.max_duration.map(|d| d.as_secs_f64()))
            .log()
            .await;

        let mut previous_timed_out = false;

        let stop_reason = 'run: loop {
            if let Some(reason) = self.config.limit.reached(started.elapsed(), iterations) {
                break reason;
            }
            if self.is_interrupted() {
                break StopReason::Interrupted;
            }

            // Anything received before this ping belongs to an earlier one.
            let stale = deliveries.flush().await;
            if stale > 0 {
                self.logger
                    .debug("Discarded stale deliveries")
                    .field("count", stale)
                    .field("iteration", iterations)
                    .log()
                    .await;
            }
            if deliveries.is_closed() {
                break StopReason::ListenerClosed;
            }

            let sent = Instant::now();
            let sent_at = sent.duration_since(started);
            output
                .send(codec::ping_payload())
                .with_context(|| format!("sending ping {} on {}", iterations, output.name()))?;

            let deadline = sent + self.config.timeout;
            let outcome = loop {
                match wait_for_reply(deliveries, deadline, &mut self.interrupt).await {
                    Wait::Delivered(delivery) if delivery.received_at < sent => {
                        self.logger
                            .debug("Discarded delivery received before ping")
                            .bytes("message", delivery.message.as_bytes())
                            .log()
                            .await;
                    }
                    Wait::Delivered(delivery) if delivery.message.is_pong() => {
                        let rtt = delivery.received_at.duration_since(sent);
                        break RoundTripOutcome::Matched(Sample::new(sent_at, rtt));
                    }
                    Wait::Delivered(delivery) => break RoundTripOutcome::Mismatch(delivery.message.into_bytes()),
                    Wait::Deadline => break RoundTripOutcome::Timeout,
                    Wait::Closed => break 'run StopReason::ListenerClosed,
                    Wait::Interrupted => break 'run StopReason::Interrupted,
                }
            };

            // Pongs carry no sequence number, so a pong that turns up after
            // a timeout may be the earlier ping's.
            if previous_timed_out && outcome.is_matched() {
                self.logger
                    .warn("Pong follows a timeout and may answer the earlier ping")
                    .field("iteration", iterations)
                    .log()
                    .await;
            }
            previous_timed_out = matches!(outcome, RoundTripOutcome::Timeout);

            if let RoundTripOutcome::Matched(sample) = &outcome {
                series.push(*sample)?;
            }
            outcomes.record(&outcome);
            self.log_outcome(iterations, &outcome).await;

            let record = IterationRecord {
                index: iterations,
                sent_at,
                outcome,
            };
            observer.on_iteration(&record);
            history.push(record);
            iterations += 1;

            // No pause after the final iteration.
            if self.config.limit.reached(started.elapsed(), iterations).is_none()
                && !self.config.interval.is_zero()
                && !self.pace().await
            {
                break StopReason::Interrupted;
            }
        };

        let report = RunReport {
            series,
            outcomes,
            history,
            iterations,
            elapsed: started.elapsed(),
            stop_reason,
        };

        self.logger
            .info(&format!("Run stopped: {}", stop_reason))
            .field("iterations", report.iterations)
            .field("matched", report.outcomes.matched)
            .field("mismatched", report.outcomes.mismatched)
            .field("timed_out", report.outcomes.timed_out)
            .log()
            .await;

        Ok(report)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Inter-iteration sleep; false if interrupted while sleeping
    async fn pace(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.interval) => true,
            _ = interrupted(&mut self.interrupt) => false,
        }
    }

    async fn log_outcome(&self, index: u32, outcome: &RoundTripOutcome) {
        match outcome {
            RoundTripOutcome::Matched(sample) => {
                self.logger
                    .debug(&format!("Pong! ({:.3} ms)", sample.rtt_ms()))
                    .field("iteration", index)
                    .outcome(outcome)
                    .log()
                    .await;
            }
            RoundTripOutcome::Mismatch(bytes) => {
                self.logger
                    .warn(&format!("Mismatch! {}", codec::to_hex(bytes)))
                    .field("iteration", index)
                    .outcome(outcome)
                    .log()
                    .await;
            }
            RoundTripOutcome::Timeout => {
                self.logger
                    .warn(&format!("Timeout after {} ms", self.config.timeout.as_millis()))
                    .field("iteration", index)
                    .outcome(outcome)
                    .log()
                    .await;
            }
        }
    }
}

async fn wait_for_reply(
    deliveries: &mut Deliveries,
    deadline: Instant,
    interrupt: &mut Option<watch::Receiver<bool>>,
) -> Wait {
    tokio::select! {
        biased;
        message = deliveries.next() => match message {
            Some(message) => Wait::Delivered(message),
            None => Wait::Closed,
        },
        _ = tokio::time::sleep_until(deadline) => Wait::Deadline,
        _ = interrupted(interrupt) => Wait::Interrupted,
    }
}

/// Resolves once the interrupt flag is set; never resolves without one
async fn interrupted(interrupt: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = interrupt.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without an interrupt: nothing can interrupt us now.
            return std::future::pending().await;
        }
    }
}
