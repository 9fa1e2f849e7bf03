//! Background listener that feeds SysEx frames to the round-trip loop
//!
//! The correlator owns the input port for the lifetime of a session. It
//! forwards every SysEx frame into a single-slot channel and drops all other
//! traffic (clock, active sensing, channel messages). When the input stream
//! ends or fails, the task exits and the channel closes, so the loop sees a
//! permanent end of deliveries instead of waiting forever.
//!
//! Each frame is stamped with the instant it came off the input. Before a
//! ping goes out the loop asks the listener to flush: anything the input
//! already holds, and any frame parked on a full slot, is discarded.

use crate::{
    codec::Message,
    error::{AppError, Result},
    logging::Logger,
    transport::InputPort,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of the delivery slot
const DELIVERY_CAPACITY: usize = 1;

/// Reply channel for one flush request, carrying the discarded frame count
type FlushAck = oneshot::Sender<usize>;

/// A SysEx frame and the instant the listener received it
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub received_at: Instant,
}

impl Delivery {
    fn stamp(message: Message) -> Self {
        Self {
            message,
            received_at: Instant::now(),
        }
    }
}

/// Spawner for the listener task
pub struct Correlator;

impl Correlator {
    /// Start listening on `input`; must be called from a tokio runtime
    pub fn spawn(input: Box<dyn InputPort>, logger: Logger) -> (CorrelatorHandle, Deliveries) {
        let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_CAPACITY);
        let (flush_tx, flush_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(listen(input, delivery_tx, flush_rx, stop_rx, logger));

        (
            CorrelatorHandle { stop_tx, task },
            Deliveries {
                rx: delivery_rx,
                flush_tx,
                closed: false,
            },
        )
    }
}

/// Owner side of the listener task
pub struct CorrelatorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Box<dyn InputPort>>,
}

impl CorrelatorHandle {
    /// Whether the task has already exited (end of stream or failure)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal stop, wait for the task to acknowledge, and close the input
    ///
    /// Returns the closed port so callers can inspect it.
    pub async fn shutdown(self) -> Result<Box<dyn InputPort>> {
        // The receiver is gone if the task already exited; that is fine.
        let _ = self.stop_tx.send(true);
        let mut input = self.task.await?;
        input.close();
        Ok(input)
    }
}

/// Loop side of the delivery slot
pub struct Deliveries {
    rx: mpsc::Receiver<Delivery>,
    flush_tx: mpsc::Sender<FlushAck>,
    closed: bool,
}

impl Deliveries {
    /// Next delivered frame, `None` once the listener has stopped
    ///
    /// Cancel safe, so it can race a deadline in `select!`.
    pub async fn next(&mut self) -> Option<Delivery> {
        let delivery = self.rx.recv().await;
        if delivery.is_none() {
            self.closed = true;
        }
        delivery
    }

    /// Discard every frame received so far, wherever it is waiting
    ///
    /// Covers frames still held by the input, a frame the listener has parked
    /// on a full slot, and the slot itself. Returns the number discarded.
    pub async fn flush(&mut self) -> usize {
        let (ack_tx, ack_rx) = oneshot::channel();
        let mut discarded = 0;
        if self.flush_tx.send(ack_tx).await.is_ok() {
            discarded += ack_rx.await.unwrap_or(0);
        }
        discarded + self.drain_stale().len()
    }

    /// Take whatever sits in the slot without waiting
    pub fn drain_stale(&mut self) -> Vec<Delivery> {
        let mut stale = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(delivery) => stale.push(delivery),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        stale
    }

    /// True once the listener is known to have stopped
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

async fn listen(
    mut input: Box<dyn InputPort>,
    deliveries: mpsc::Sender<Delivery>,
    mut flushes: mpsc::Receiver<FlushAck>,
    mut stop: watch::Receiver<bool>,
    logger: Logger,
) -> Box<dyn InputPort> {
    logger.debug(&format!("Listening on {}", input.name())).log().await;

    loop {
        let received = tokio::select! {
            biased;
            _ = stop.changed() => break,
            Some(ack) = flushes.recv() => {
                if !flush_input(&mut *input, ack, 0, &logger).await {
                    break;
                }
                continue;
            }
            received = input.recv() => received,
        };

        match received {
            Ok(Some(message)) if message.is_sysex() => {
                let delivery = Delivery::stamp(message);
                // Parks while the slot is full; a flush drops the parked frame.
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    Some(ack) = flushes.recv() => {
                        if !flush_input(&mut *input, ack, 1, &logger).await {
                            break;
                        }
                    }
                    sent = deliveries.send(delivery) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Some(message)) => {
                logger.debug("Dropped non-SysEx message")
                    .bytes("message", message.as_bytes())
                    .log()
                    .await;
            }
            Ok(None) => {
                log_stream_end(input.name(), None, &logger).await;
                break;
            }
            Err(error) => {
                log_stream_end(input.name(), Some(&error), &logger).await;
                break;
            }
        }
    }

    logger.debug("Listener stopped").log().await;
    input
}

/// Read and discard everything the input holds right now, then acknowledge
///
/// `discarded` counts frames already dropped by the caller. Returns false if
/// the stream ended or failed while draining.
async fn flush_input(input: &mut dyn InputPort, ack: FlushAck, mut discarded: usize, logger: &Logger) -> bool {
    let open = loop {
        match recv_now(input).await {
            None => break true,
            Some(Ok(Some(message))) => {
                if message.is_sysex() {
                    logger.debug("Discarded frame received before ping")
                        .bytes("message", message.as_bytes())
                        .log()
                        .await;
                    discarded += 1;
                }
            }
            Some(Ok(None)) => {
                log_stream_end(input.name(), None, logger).await;
                break false;
            }
            Some(Err(error)) => {
                log_stream_end(input.name(), Some(&error), logger).await;
                break false;
            }
        }
    };

    // The loop may have given up waiting; nothing to report then.
    let _ = ack.send(discarded);
    open
}

/// One poll of `recv`; `None` if no message is ready
async fn recv_now(input: &mut dyn InputPort) -> Option<Result<Option<Message>>> {
    tokio::select! {
        biased;
        received = tokio::task::unconstrained(input.recv()) => Some(received),
        _ = std::future::ready(()) => None,
    }
}

async fn log_stream_end(name: &str, error: Option<&AppError>, logger: &Logger) {
    match error {
        None => logger.warn(&format!("Input stream on {} ended", name)).log().await,
        Some(error) => {
            logger.error(&format!("Input stream on {} failed: {}", name, error))
                .error_info(error)
                .log()
                .await
        }
    }
}
