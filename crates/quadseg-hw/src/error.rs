//! Error types for the quadseg hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the display.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial device not found or could not be opened.
    #[error("Serial device not found at {0}")]
    PortNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial I/O error.
    #[error("Serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    /// The bus writer has shut down and can no longer accept packets.
    #[error("Bus writer closed")]
    BusClosed,

    /// Invalid blink rate name.
    #[error("Invalid blink rate: {0}")]
    InvalidBlinkRate(String),

    /// A scripted bus failure, used by test doubles.
    #[error("Bus rejected write to 0x{address:02X}")]
    Rejected { address: u8 },
}
