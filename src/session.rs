//! Session lifecycle: open both endpoints, run, release everything
//!
//! A session owns both ports from `open` until it is dropped or `run`
//! returns. Every exit path closes both ports and stops the correlator.

use crate::{
    correlator::Correlator,
    error::{ErrorContext, Result},
    executor::{IterationObserver, LoopConfig, RoundTripLoop, RunReport},
    logging::Logger,
    transport::{InputPort, OutputPort, TransportDriver},
    types::Endpoints,
};
use tokio::sync::watch;

pub struct Session {
    endpoints: Endpoints,
    input: Option<Box<dyn InputPort>>,
    output: Box<dyn OutputPort>,
    logger: Logger,
}

impl Session {
    /// Open the input, then the output
    ///
    /// If the output cannot be opened the input is closed before the error
    /// is returned, so a failed open never leaves a port behind.
    pub fn open(driver: &dyn TransportDriver, endpoints: Endpoints, logger: Logger) -> Result<Self> {
        let mut input = driver
            .open_input(endpoints.input)
            .with_context(|| format!("opening {} input {}", driver.name(), endpoints.input))?;

        let output = match driver.open_output(endpoints.output) {
            Ok(output) => output,
            Err(error) => {
                input.close();
                return Err(error).with_context(|| format!("opening {} output {}", driver.name(), endpoints.output));
            }
        };

        Ok(Self {
            endpoints,
            input: Some(input),
            output,
            logger,
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    pub fn input_name(&self) -> Option<&str> {
        self.input.as_deref().map(|input| input.name())
    }

    pub fn output_name(&self) -> &str {
        self.output.name()
    }

    /// Measure until the loop stops, then release both ports
    ///
    /// The loop's error wins over a correlator shutdown error.
    pub async fn run(
        mut self,
        config: LoopConfig,
        interrupt: Option<watch::Receiver<bool>>,
        observer: &mut dyn IterationObserver,
    ) -> Result<RunReport> {
        let Some(input) = self.input.take() else {
            return Err(crate::error::AppError::internal("session input already consumed"));
        };

        let operation = format!("ping-pong {} -> {}", self.output.name(), input.name());
        let correlation_id = self.logger.start_operation(&operation).await;

        let (correlator, mut deliveries) = Correlator::spawn(input, self.logger.named("CORRELATOR"));
        let mut round_trip = RoundTripLoop::new(config, self.logger.named("LOOP"));
        if let Some(interrupt) = interrupt {
            round_trip = round_trip.with_interrupt(interrupt);
        }

        let outcome = round_trip.run(self.output.as_mut(), &mut deliveries, observer).await;

        // Dropping the slot unblocks a correlator parked on a full channel.
        drop(deliveries);
        let shutdown = correlator.shutdown().await;
        self.output.close();

        self.logger
            .end_operation(&correlation_id, &operation, outcome.is_ok() && shutdown.is_ok())
            .await;

        let report = outcome?;
        shutdown?;
        Ok(report)
    }

    /// Release both ports without running
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.close();
        }
        self.output.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open a session on `driver`, run it and release it
pub async fn run_session(
    driver: &dyn TransportDriver,
    endpoints: Endpoints,
    config: LoopConfig,
    interrupt: Option<watch::Receiver<bool>>,
    observer: &mut dyn IterationObserver,
    logger: Logger,
) -> Result<RunReport> {
    Session::open(driver, endpoints, logger)?
        .run(config, interrupt, observer)
        .await
}
