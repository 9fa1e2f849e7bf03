//! Ping and pong SysEx layouts
//!
//! Both messages are complete System-Exclusive frames: start byte, the
//! three-byte manufacturer ID, one command byte and the end byte. A received
//! message is a pong only if it equals [`PONG_SYSEX`] byte for byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SysEx start-of-message byte
pub const SYSEX_START: u8 = 0xF0;

/// SysEx end-of-message byte
pub const SYSEX_END: u8 = 0xF7;

/// Extended manufacturer ID carried by both messages
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x22, 0x77];

/// Command byte of a ping request
pub const PING_COMMAND: u8 = 0x01;

/// Command byte of a pong acknowledgment
pub const PONG_COMMAND: u8 = 0x02;

/// Outbound request sent on every iteration
pub const PING_SYSEX: [u8; 6] = [SYSEX_START, 0x00, 0x22, 0x77, PING_COMMAND, SYSEX_END];

/// The only byte sequence accepted as an acknowledgment
pub const PONG_SYSEX: [u8; 6] = [SYSEX_START, 0x00, 0x22, 0x77, PONG_COMMAND, SYSEX_END];

/// Canonical ping payload
pub fn ping_payload() -> &'static [u8] {
    &PING_SYSEX
}

/// Canonical pong payload
pub fn pong_payload() -> &'static [u8] {
    &PONG_SYSEX
}

/// Exact match against the canonical pong, no prefix or padding tolerance
pub fn is_pong(bytes: &[u8]) -> bool {
    bytes == PONG_SYSEX
}

/// Exact match against the canonical ping
pub fn is_ping(bytes: &[u8]) -> bool {
    bytes == PING_SYSEX
}

/// Framing check used to filter inbound traffic before content validation
pub fn is_sysex_frame(bytes: &[u8]) -> bool {
    bytes.first() == Some(&SYSEX_START)
}

/// Space-separated lowercase hex, e.g. `f0 00 22 77 02 f7`
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classification of one transport frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Ping,
    Pong,
    /// SysEx with any other content
    OtherSysEx,
    /// Channel, system common or realtime traffic
    NonSysEx,
}

/// One discrete message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message(Vec<u8>);

impl Message {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn ping() -> Self {
        Self(PING_SYSEX.to_vec())
    }

    pub fn pong() -> Self {
        Self(PONG_SYSEX.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn kind(&self) -> MessageKind {
        if is_ping(&self.0) {
            MessageKind::Ping
        } else if is_pong(&self.0) {
            MessageKind::Pong
        } else if is_sysex_frame(&self.0) {
            MessageKind::OtherSysEx
        } else {
            MessageKind::NonSysEx
        }
    }

    pub fn is_pong(&self) -> bool {
        is_pong(&self.0)
    }

    pub fn is_sysex(&self) -> bool {
        is_sysex_frame(&self.0)
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_payloads() {
        assert_eq!(ping_payload(), &[0xF0, 0x00, 0x22, 0x77, 0x01, 0xF7]);
        assert_eq!(pong_payload(), &[0xF0, 0x00, 0x22, 0x77, 0x02, 0xF7]);
        assert!(is_pong(pong_payload()));
        assert!(!is_pong(ping_payload()));
    }

    #[test]
    fn test_pong_variants_from_older_layouts_rejected() {
        // Padded, undelimited and truncated layouts are all mismatches.
        assert!(!is_pong(&[0xF0, 0x00, 0x22, 0x77, 0x02, 0xF7, 0x00, 0x00]));
        assert!(!is_pong(&[0x00, 0x22, 0x77, 0x02]));
        assert!(!is_pong(&[0xF0, 0x00, 0x22, 0x77, 0x02]));
        assert!(!is_pong(&[]));
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::ping().kind(), MessageKind::Ping);
        assert_eq!(Message::pong().kind(), MessageKind::Pong);
        assert_eq!(Message::new(vec![0xF0, 0x7D, 0x01, 0xF7]).kind(), MessageKind::OtherSysEx);
        assert_eq!(Message::new(vec![0xFE]).kind(), MessageKind::NonSysEx);
        assert_eq!(Message::new(vec![0x90, 0x40, 0x7F]).kind(), MessageKind::NonSysEx);
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(to_hex(&PONG_SYSEX), "f0 00 22 77 02 f7");
        assert_eq!(to_hex(&[]), "");
        assert_eq!(Message::new(vec![0x0A, 0xFF]).to_string(), "0a ff");
    }

    proptest! {
        #[test]
        fn prop_single_byte_change_is_not_pong(index in 0usize..6, replacement in any::<u8>()) {
            let mut bytes = PONG_SYSEX;
            prop_assume!(bytes[index] != replacement);
            bytes[index] = replacement;
            prop_assert!(!is_pong(&bytes));
        }

        #[test]
        fn prop_only_canonical_bytes_match(bytes in proptest::collection::vec(any::<u8>(), 0..12)) {
            prop_assert_eq!(is_pong(&bytes), bytes.as_slice() == PONG_SYSEX);
        }

        #[test]
        fn prop_extended_pong_is_not_pong(tail in proptest::collection::vec(any::<u8>(), 1..4)) {
            let mut bytes = PONG_SYSEX.to_vec();
            bytes.extend(tail);
            prop_assert!(!is_pong(&bytes));
        }
    }
}
