use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Empty MIDI message")]
    Empty,

    #[error("Invalid status byte: 0x{0:02X}")]
    InvalidStatus(u8),

    #[error("Message with status 0x{status:02X} needs {expected} bytes, got {actual}")]
    Truncated {
        status: u8,
        expected: usize,
        actual: usize,
    },

    #[error("System-exclusive message has no 0xF7 terminator")]
    UnterminatedSysEx,
}
