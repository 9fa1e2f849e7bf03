//! In-process virtual MIDI device
//!
//! [`VirtualDriver`] exposes one input (ID 0) and one output (ID 0) wired to
//! a simulated remote device. Every ping written to the output is answered
//! according to a [`Responder`] script and pushed back through the input,
//! the same way a Mega Drive running the pong firmware would answer over a
//! real cable. [`PortProbe`] lets callers observe port state from outside.

use super::{InputPort, OutputPort, TransportDriver};
use crate::{
    codec::{self, Message},
    error::{AppError, Result},
    types::{PortDirection, PortInfo},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Name of the virtual input (the device's reply bus)
pub const VIRTUAL_INPUT_NAME: &str = "Virtual MIDI Bus 2";

/// Name of the virtual output (the device's listen bus)
pub const VIRTUAL_OUTPUT_NAME: &str = "Virtual MIDI Bus 1";

/// SysEx with the non-commercial manufacturer ID, never a valid pong
pub const CORRUPT_SYSEX: [u8; 6] = [0xF0, 0x7D, 0x01, 0x02, 0x03, 0xF7];

/// How the simulated device answers each ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Responder {
    /// Reply with the canonical pong after `delay`
    Echo { delay: Duration },
    /// Never reply
    Silent,
    /// Reply with the given bytes instead of a pong
    Corrupt(Vec<u8>),
    /// Emit realtime and channel traffic, then the pong after `delay`
    Noisy { delay: Duration },
    /// Use step `n % len` for the n-th ping
    Sequence(Vec<Responder>),
}

impl Responder {
    /// Prompt echo, 1 ms turnaround
    pub fn echo() -> Self {
        Self::Echo { delay: Duration::from_millis(1) }
    }

    pub fn echo_after(delay: Duration) -> Self {
        Self::Echo { delay }
    }

    /// Replies with [`CORRUPT_SYSEX`]
    pub fn corrupt() -> Self {
        Self::Corrupt(CORRUPT_SYSEX.to_vec())
    }

    pub fn noisy() -> Self {
        Self::Noisy { delay: Duration::from_millis(1) }
    }

    /// Turnaround delay and reply messages for the `ping_index`-th ping
    fn replies(&self, ping_index: usize) -> (Duration, Vec<Vec<u8>>) {
        match self {
            Self::Echo { delay } => (*delay, vec![codec::PONG_SYSEX.to_vec()]),
            Self::Silent => (Duration::ZERO, Vec::new()),
            Self::Corrupt(bytes) => (Duration::ZERO, vec![bytes.clone()]),
            Self::Noisy { delay } => (
                *delay,
                vec![
                    vec![0xFE],             // active sensing
                    vec![0xF8],             // timing clock
                    vec![0x90, 0x3C, 0x40], // note on
                    codec::PONG_SYSEX.to_vec(),
                ],
            ),
            Self::Sequence(steps) if steps.is_empty() => (Duration::ZERO, Vec::new()),
            Self::Sequence(steps) => steps[ping_index % steps.len()].replies(ping_index / steps.len()),
        }
    }
}

impl Default for Responder {
    fn default() -> Self {
        Self::echo()
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    input_open: AtomicBool,
    output_open: AtomicBool,
    inputs_opened: AtomicUsize,
    outputs_opened: AtomicUsize,
    messages_sent: AtomicUsize,
    pings_received: AtomicUsize,
    shut_down: AtomicBool,
}

/// Read-only view of the virtual device's port state
#[derive(Debug, Clone, Default)]
pub struct PortProbe {
    state: Arc<ProbeState>,
}

impl PortProbe {
    pub fn input_open(&self) -> bool {
        self.state.input_open.load(Ordering::SeqCst)
    }

    pub fn output_open(&self) -> bool {
        self.state.output_open.load(Ordering::SeqCst)
    }

    /// How many times the input was opened over the driver's lifetime
    pub fn inputs_opened(&self) -> usize {
        self.state.inputs_opened.load(Ordering::SeqCst)
    }

    /// How many times the output was opened over the driver's lifetime
    pub fn outputs_opened(&self) -> usize {
        self.state.outputs_opened.load(Ordering::SeqCst)
    }

    /// Messages accepted by the output port
    pub fn messages_sent(&self) -> usize {
        self.state.messages_sent.load(Ordering::SeqCst)
    }

    /// Pings seen by the simulated device
    pub fn pings_received(&self) -> usize {
        self.state.pings_received.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.shut_down.load(Ordering::SeqCst)
    }
}

/// Wiring shared by the driver, its ports and the device task
#[derive(Debug, Default)]
struct Bus {
    to_app: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Bus {
    fn deliver(&self, bytes: Vec<u8>) {
        if let Ok(guard) = self.to_app.lock() {
            if let Some(tx) = guard.as_ref() {
                // A closed input simply drops device traffic.
                let _ = tx.send(Message::new(bytes));
            }
        }
    }

    fn attach(&self, tx: mpsc::UnboundedSender<Message>) -> Result<()> {
        let mut guard = self
            .to_app
            .lock()
            .map_err(|_| AppError::internal("virtual bus lock poisoned"))?;
        *guard = Some(tx);
        Ok(())
    }

    fn detach(&self) {
        if let Ok(mut guard) = self.to_app.lock() {
            guard.take();
        }
    }
}

/// Transport driver backed by a simulated device
#[derive(Debug, Clone)]
pub struct VirtualDriver {
    responder: Responder,
    bus: Arc<Bus>,
    probe: PortProbe,
    input_failure_after: Option<usize>,
    fail_sends: bool,
    fail_output_open: bool,
}

impl VirtualDriver {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            bus: Arc::new(Bus::default()),
            probe: PortProbe::default(),
            input_failure_after: None,
            fail_sends: false,
            fail_output_open: false,
        }
    }

    /// Make the input stream fail after delivering `messages` messages
    pub fn with_input_failure_after(mut self, messages: usize) -> Self {
        self.input_failure_after = Some(messages);
        self
    }

    /// Make every send on the output fail
    pub fn with_send_failure(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Make opening the output fail
    pub fn with_output_open_failure(mut self) -> Self {
        self.fail_output_open = true;
        self
    }

    pub fn probe(&self) -> PortProbe {
        self.probe.clone()
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }
}

impl Default for VirtualDriver {
    fn default() -> Self {
        Self::new(Responder::default())
    }
}

impl TransportDriver for VirtualDriver {
    fn name(&self) -> &str {
        "virtual"
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(vec![
            PortInfo {
                id: 0,
                name: VIRTUAL_INPUT_NAME.to_string(),
                direction: PortDirection::Input,
            },
            PortInfo {
                id: 0,
                name: VIRTUAL_OUTPUT_NAME.to_string(),
                direction: PortDirection::Output,
            },
        ])
    }

    fn open_input(&self, index: usize) -> Result<Box<dyn InputPort>> {
        if index != 0 {
            return Err(AppError::port_open(format!("no virtual input with ID {}", index)));
        }
        if self.probe.input_open() {
            return Err(AppError::port_open(format!("{} is already open", VIRTUAL_INPUT_NAME)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.bus.attach(tx)?;
        self.probe.state.input_open.store(true, Ordering::SeqCst);
        self.probe.state.inputs_opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(VirtualInput {
            rx,
            bus: Arc::clone(&self.bus),
            probe: self.probe.clone(),
            delivered: 0,
            fail_after: self.input_failure_after,
            closed: false,
        }))
    }

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputPort>> {
        if index != 0 {
            return Err(AppError::port_open(format!("no virtual output with ID {}", index)));
        }
        if self.fail_output_open {
            return Err(AppError::port_open(format!("{} refused the connection", VIRTUAL_OUTPUT_NAME)));
        }
        if self.probe.output_open() {
            return Err(AppError::port_open(format!("{} is already open", VIRTUAL_OUTPUT_NAME)));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::port_open(format!("virtual device needs a tokio runtime: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_device(rx, Arc::clone(&self.bus), self.probe.clone(), self.responder.clone()));
        self.probe.state.output_open.store(true, Ordering::SeqCst);
        self.probe.state.outputs_opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(VirtualOutput {
            tx: Some(tx),
            probe: self.probe.clone(),
            fail_sends: self.fail_sends,
        }))
    }

    fn shutdown(&self) {
        self.bus.detach();
        self.probe.state.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Simulated remote: runs until the output port is closed
async fn run_device(
    mut from_app: mpsc::UnboundedReceiver<Vec<u8>>,
    bus: Arc<Bus>,
    probe: PortProbe,
    responder: Responder,
) {
    let mut ping_index = 0;
    while let Some(bytes) = from_app.recv().await {
        if !codec::is_ping(&bytes) {
            continue;
        }
        probe.state.pings_received.fetch_add(1, Ordering::SeqCst);

        let (delay, replies) = responder.replies(ping_index);
        ping_index += 1;
        if replies.is_empty() {
            continue;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        for reply in replies {
            bus.deliver(reply);
        }
    }
}

struct VirtualInput {
    rx: mpsc::UnboundedReceiver<Message>,
    bus: Arc<Bus>,
    probe: PortProbe,
    delivered: usize,
    fail_after: Option<usize>,
    closed: bool,
}

#[async_trait]
impl InputPort for VirtualInput {
    fn name(&self) -> &str {
        VIRTUAL_INPUT_NAME
    }

    async fn recv(&mut self) -> Result<Option<Message>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(limit) = self.fail_after {
            if self.delivered >= limit {
                return Err(AppError::listener(format!(
                    "{} stream failed after {} messages",
                    VIRTUAL_INPUT_NAME, self.delivered
                )));
            }
        }

        match self.rx.recv().await {
            Some(message) => {
                self.delivered += 1;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        self.bus.detach();
        self.probe.state.input_open.store(false, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for VirtualInput {
    fn drop(&mut self) {
        self.close();
    }
}

struct VirtualOutput {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    probe: PortProbe,
    fail_sends: bool,
}

impl OutputPort for VirtualOutput {
    fn name(&self) -> &str {
        VIRTUAL_OUTPUT_NAME
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(AppError::transport(format!("{} is closed", VIRTUAL_OUTPUT_NAME)));
        };
        if self.fail_sends {
            return Err(AppError::transport(format!("{} link is down", VIRTUAL_OUTPUT_NAME)));
        }
        tx.send(bytes.to_vec())
            .map_err(|_| AppError::transport("virtual device stopped listening"))?;
        self.probe.state.messages_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the sender ends the device task.
        if self.tx.take().is_some() {
            self.probe.state.output_open.store(false, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for VirtualOutput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_echo_round_trip() {
        let driver = VirtualDriver::new(Responder::echo());
        let mut input = driver.open_input(0).unwrap();
        let mut output = driver.open_output(0).unwrap();

        output.send(codec::ping_payload()).unwrap();
        let reply = timeout(WAIT, input.recv()).await.unwrap().unwrap().unwrap();
        assert!(reply.is_pong());
        assert_eq!(driver.probe().pings_received(), 1);
        assert_eq!(driver.probe().messages_sent(), 1);
    }

    #[tokio::test]
    async fn test_recv_stays_pending_without_traffic() {
        let driver = VirtualDriver::new(Responder::Silent);
        let mut input = driver.open_input(0).unwrap();

        {
            let mut recv = tokio_test::task::spawn(input.recv());
            tokio_test::assert_pending!(recv.poll());
        }

        input.close();
        let mut recv = tokio_test::task::spawn(input.recv());
        let result = tokio_test::assert_ready!(recv.poll());
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_non_ping_traffic_is_ignored_by_device() {
        let driver = VirtualDriver::new(Responder::echo());
        let mut input = driver.open_input(0).unwrap();
        let mut output = driver.open_output(0).unwrap();

        output.send(&[0xF0, 0x00, 0x22, 0x77, 0x09, 0xF7]).unwrap();
        assert!(timeout(Duration::from_millis(50), input.recv()).await.is_err());
        assert_eq!(driver.probe().pings_received(), 0);
    }

    #[tokio::test]
    async fn test_noisy_responder_interleaves_traffic() {
        let driver = VirtualDriver::new(Responder::noisy());
        let mut input = driver.open_input(0).unwrap();
        let mut output = driver.open_output(0).unwrap();
        output.send(codec::ping_payload()).unwrap();

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(timeout(WAIT, input.recv()).await.unwrap().unwrap().unwrap());
        }
        assert!(!received[0].is_sysex());
        assert!(received[3].is_pong());
    }

    #[tokio::test]
    async fn test_sequence_cycles_steps() {
        let responder = Responder::Sequence(vec![Responder::Silent, Responder::corrupt()]);
        let (_, first) = responder.replies(0);
        let (_, second) = responder.replies(1);
        let (_, third) = responder.replies(2);
        assert!(first.is_empty());
        assert_eq!(second, vec![CORRUPT_SYSEX.to_vec()]);
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_index_rejected() {
        let driver = VirtualDriver::default();
        assert!(matches!(driver.open_input(1), Err(AppError::PortOpen(_))));
        assert!(matches!(driver.open_output(3), Err(AppError::PortOpen(_))));
    }

    #[tokio::test]
    async fn test_close_and_drop_update_port_state() {
        let driver = VirtualDriver::default();
        let probe = driver.probe();
        let mut input = driver.open_input(0).unwrap();
        let output = driver.open_output(0).unwrap();
        assert!(probe.input_open());
        assert!(probe.output_open());

        input.close();
        assert!(input.is_closed());
        assert!(!probe.input_open());
        assert!(input.recv().await.unwrap().is_none());

        drop(output);
        assert!(!probe.output_open());
    }

    #[tokio::test]
    async fn test_input_cannot_be_opened_twice() {
        let driver = VirtualDriver::default();
        let _input = driver.open_input(0).unwrap();
        assert!(driver.open_input(0).is_err());
    }

    #[tokio::test]
    async fn test_input_failure_injection() {
        let driver = VirtualDriver::default().with_input_failure_after(0);
        let mut input = driver.open_input(0).unwrap();
        assert!(matches!(input.recv().await, Err(AppError::Listener(_))));
    }

    #[tokio::test]
    async fn test_send_failure_injection() {
        let driver = VirtualDriver::default().with_send_failure();
        let mut output = driver.open_output(0).unwrap();
        assert!(matches!(output.send(codec::ping_payload()), Err(AppError::Transport(_))));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let driver = VirtualDriver::default();
        let mut output = driver.open_output(0).unwrap();
        output.close();
        assert!(output.send(codec::ping_payload()).is_err());
    }

    #[test]
    fn test_list_ports() {
        let driver = VirtualDriver::default();
        let ports = driver.list_ports().unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].direction, PortDirection::Input);
        assert_eq!(ports[1].name, VIRTUAL_OUTPUT_NAME);
    }
}
