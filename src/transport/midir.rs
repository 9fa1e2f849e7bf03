//! Real MIDI devices through the `midir` crate
//!
//! midir delivers input on its own callback thread. The callback forwards
//! every message into an unbounded tokio channel, which turns the push-based
//! source into the awaitable [`InputPort::recv`].

use super::{InputPort, OutputPort, TransportDriver};
use crate::{
    codec::Message,
    error::{AppError, Result},
    types::{PortDirection, PortInfo},
};
use async_trait::async_trait;
use ::midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;

/// Driver handle for the platform MIDI API
#[derive(Debug, Clone)]
pub struct MidirDriver {
    client_name: String,
}

impl MidirDriver {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn midi_input(&self) -> Result<MidiInput> {
        MidiInput::new(&self.client_name)
            .map_err(|e| AppError::port_open(format!("failed to initialise MIDI input: {}", e)))
    }

    fn midi_output(&self) -> Result<MidiOutput> {
        MidiOutput::new(&self.client_name)
            .map_err(|e| AppError::port_open(format!("failed to initialise MIDI output: {}", e)))
    }
}

impl Default for MidirDriver {
    fn default() -> Self {
        Self::new(crate::defaults::CLIENT_NAME)
    }
}

impl TransportDriver for MidirDriver {
    fn name(&self) -> &str {
        "midir"
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let mut ports = Vec::new();

        let input = self.midi_input()?;
        for (id, port) in input.ports().iter().enumerate() {
            let name = input.port_name(port).unwrap_or_else(|_| format!("Port {id}"));
            ports.push(PortInfo { id, name, direction: PortDirection::Input });
        }

        let output = self.midi_output()?;
        for (id, port) in output.ports().iter().enumerate() {
            let name = output.port_name(port).unwrap_or_else(|_| format!("Port {id}"));
            ports.push(PortInfo { id, name, direction: PortDirection::Output });
        }

        Ok(ports)
    }

    fn open_input(&self, index: usize) -> Result<Box<dyn InputPort>> {
        let mut input = self.midi_input()?;
        // SysEx is filtered out by default on some backends.
        input.ignore(Ignore::None);

        let ports = input.ports();
        let Some(port) = ports.get(index) else {
            return Err(AppError::port_open(format!(
                "MIDI input ID {} out of range ({} available)",
                index,
                ports.len()
            )));
        };
        let name = input.port_name(port).unwrap_or_else(|_| format!("Port {index}"));

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = input
            .connect(
                port,
                "ping-pong-in",
                move |_timestamp, message, _| {
                    if !message.is_empty() {
                        let _ = tx.send(Message::from(message));
                    }
                },
                (),
            )
            .map_err(|e| AppError::port_open(format!("failed to connect MIDI input '{}': {}", name, e)))?;

        Ok(Box::new(MidirInput {
            name,
            connection: Some(connection),
            rx,
        }))
    }

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputPort>> {
        let output = self.midi_output()?;
        let ports = output.ports();
        let Some(port) = ports.get(index) else {
            return Err(AppError::port_open(format!(
                "MIDI output ID {} out of range ({} available)",
                index,
                ports.len()
            )));
        };
        let name = output.port_name(port).unwrap_or_else(|_| format!("Port {index}"));
        let connection = output
            .connect(port, "ping-pong-out")
            .map_err(|e| AppError::port_open(format!("failed to connect MIDI output '{}': {}", name, e)))?;

        Ok(Box::new(MidirOutput {
            name,
            connection: Some(connection),
        }))
    }
}

struct MidirInput {
    name: String,
    connection: Option<MidiInputConnection<()>>,
    rx: mpsc::UnboundedReceiver<Message>,
}

#[async_trait]
impl InputPort for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self) -> Result<Option<Message>> {
        if self.connection.is_none() {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.rx.close();
    }

    fn is_closed(&self) -> bool {
        self.connection.is_none()
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.close();
    }
}

struct MidirOutput {
    name: String,
    connection: Option<MidiOutputConnection>,
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(AppError::transport(format!("MIDI output '{}' is closed", self.name)));
        };
        connection
            .send(bytes)
            .map_err(|e| AppError::transport(format!("failed to send on '{}': {}", self.name, e)))
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.connection.is_none()
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.close();
    }
}
