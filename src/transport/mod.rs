//! Duplex byte-message transport
//!
//! The measurement core only needs three capabilities: open a numbered
//! endpoint, send one message, and await the next inbound message. A
//! [`TransportDriver`] is created by the caller and handed to the session;
//! nothing in this crate initialises a driver behind the caller's back.
//!
//! Backends:
//! - [`memory`]: in-process virtual device with scripted responders
//! - `midir` (feature `midi`): real MIDI ports

pub mod memory;
#[cfg(feature = "midi")]
pub mod midir;

pub use memory::{PortProbe, Responder, VirtualDriver};
#[cfg(feature = "midi")]
pub use self::midir::MidirDriver;

use crate::{
    codec::Message,
    error::Result,
    types::{PortDirection, PortInfo},
};
use async_trait::async_trait;

/// Receiving half of an open endpoint
#[async_trait]
pub trait InputPort: Send {
    /// Port name as reported by the driver
    fn name(&self) -> &str;

    /// Wait for the next message in arrival order
    ///
    /// `Ok(None)` means the stream has ended, which is also what a closed
    /// port returns. Implementations must be cancel safe: dropping the
    /// returned future must not lose a message.
    async fn recv(&mut self) -> Result<Option<Message>>;

    /// Release the underlying connection; idempotent
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Sending half of an open endpoint
pub trait OutputPort: Send {
    /// Port name as reported by the driver
    fn name(&self) -> &str;

    /// Transmit one complete message
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the underlying connection; idempotent
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Caller-owned handle to a transport implementation
pub trait TransportDriver: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// All ports the backend can open, inputs and outputs numbered separately
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    fn open_input(&self, index: usize) -> Result<Box<dyn InputPort>>;

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputPort>>;

    /// Release driver-wide resources once every port is closed
    fn shutdown(&self) {}
}

/// Input ports only, in ID order
pub fn input_ports(driver: &dyn TransportDriver) -> Result<Vec<PortInfo>> {
    Ok(driver
        .list_ports()?
        .into_iter()
        .filter(|port| port.direction == PortDirection::Input)
        .collect())
}

/// Output ports only, in ID order
pub fn output_ports(driver: &dyn TransportDriver) -> Result<Vec<PortInfo>> {
    Ok(driver
        .list_ports()?
        .into_iter()
        .filter(|port| port.direction == PortDirection::Output)
        .collect())
}
