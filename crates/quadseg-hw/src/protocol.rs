//! HT16K33 register protocol definitions and encoding.
//!
//! Protocol structure:
//! - Configuration commands are single-byte writes: the command nibble in
//!   the high bits OR'd with its parameter in the low bits.
//! - Display RAM writes start with a register address followed by data
//!   bytes. Each character position owns two consecutive registers holding
//!   the low and high byte of its segment mask.

use crate::frame::Frame;
use crate::DISPLAY_WIDTH;

/// Display RAM start address used for full-frame writes.
pub const DISPLAY_RAM: u8 = 0x00;

/// Size of a full-frame register buffer (address byte + 2 bytes per slot).
pub const FRAME_PACKET_SIZE: usize = 1 + DISPLAY_WIDTH * 2;

/// System setup flag: internal oscillator on.
pub const OSCILLATOR_ON: u8 = 0x01;

/// Display setup flag: display on.
pub const DISPLAY_ON: u8 = 0x01;

/// HT16K33 command nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Oscillator control.
    SystemSetup = 0x20,
    /// Display on/off and blink frequency.
    DisplaySetup = 0x80,
    /// Brightness (16 dimming steps).
    Dimming = 0xE0,
}

/// Builds the oscillator-enable command.
pub fn build_oscillator_packet() -> [u8; 1] {
    [Command::SystemSetup as u8 | OSCILLATOR_ON]
}

/// Builds a display-setup command with the display on and the given blink bits.
///
/// `rate` must already be in 0..=3.
pub fn build_blink_packet(rate: u8) -> [u8; 1] {
    [Command::DisplaySetup as u8 | DISPLAY_ON | ((rate & 0x03) << 1)]
}

/// Builds a dimming command. `level` must already be in 0..=15.
pub fn build_brightness_packet(level: u8) -> [u8; 1] {
    [Command::Dimming as u8 | (level & 0x0F)]
}

/// Serializes a frame into the full-frame register buffer.
///
/// Each slot is written low byte first (little-endian).
pub fn build_frame_packet(frame: &Frame) -> [u8; FRAME_PACKET_SIZE] {
    let mut buffer = [0u8; FRAME_PACKET_SIZE];
    buffer[0] = DISPLAY_RAM;
    for (i, &mask) in frame.masks().iter().enumerate() {
        let offset = 1 + i * 2;
        buffer[offset] = (mask & 0xFF) as u8;
        buffer[offset + 1] = ((mask >> 8) & 0xFF) as u8;
    }
    buffer
}

/// Decodes a full-frame register buffer back into a frame.
///
/// Returns `None` for anything that is not a full-frame write.
pub fn decode_frame_packet(bytes: &[u8]) -> Option<Frame> {
    if bytes.len() != FRAME_PACKET_SIZE || bytes[0] != DISPLAY_RAM {
        return None;
    }
    let mut masks = [0u16; DISPLAY_WIDTH];
    for (slot, pair) in masks.iter_mut().zip(bytes[1..].chunks_exact(2)) {
        *slot = u16::from_le_bytes([pair[0], pair[1]]);
    }
    Some(Frame::from_masks(masks))
}
