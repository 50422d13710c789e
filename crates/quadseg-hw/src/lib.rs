//! quadseg Hardware Library
//!
//! Provides glyph encoding, the register protocol and a display driver for
//! 4-character 14-segment alphanumeric panels driven by an HT16K33 controller.

pub mod bus;
pub mod display;
pub mod error;
pub mod firmata;
pub mod frame;
pub mod glyph;
pub mod protocol;
pub mod scroll;

pub use bus::{Bus, BusWrite, NullBus, RecordingBus};
pub use display::{BlinkRate, Display};
pub use error::{Error, Result};
pub use firmata::{DigitalPin, FirmataBus, FlushHandle};
pub use frame::Frame;
pub use scroll::{ScrollSession, ScrollTick};

/// Number of character positions on the panel.
pub const DISPLAY_WIDTH: usize = 4;

/// Default I2C address of the HT16K33 backpack.
pub const DEFAULT_ADDRESS: u8 = 0x70;

/// Maximum brightness level accepted by the dimming register.
pub const MAX_BRIGHTNESS: u8 = 15;
