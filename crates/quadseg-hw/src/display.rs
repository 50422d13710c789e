//! HT16K33 display driver.
//!
//! The driver never reads the chip back. Brightness, blink rate and the
//! current frame are host-side bookkeeping of what was last written.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::bus::Bus;
use crate::frame::Frame;
use crate::protocol::{
    build_blink_packet, build_brightness_packet, build_frame_packet, build_oscillator_packet,
};
use crate::{Error, Result, MAX_BRIGHTNESS};

/// Blink rate options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BlinkRate {
    /// Steady display.
    #[default]
    Off = 0,
    /// Blink at 2 Hz.
    TwoHz = 1,
    /// Blink at 1 Hz.
    OneHz = 2,
    /// Blink at 0.5 Hz.
    HalfHz = 3,
}

impl BlinkRate {
    /// Converts a raw rate (0-3). Anything else falls back to `Off`.
    pub fn from_raw(value: i64) -> Self {
        match value {
            1 => BlinkRate::TwoHz,
            2 => BlinkRate::OneHz,
            3 => BlinkRate::HalfHz,
            _ => BlinkRate::Off,
        }
    }

    /// Returns the raw rate as written into the display setup register.
    pub fn raw(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for BlinkRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok(BlinkRate::Off),
            "2hz" | "1" => Ok(BlinkRate::TwoHz),
            "1hz" | "2" => Ok(BlinkRate::OneHz),
            "0.5hz" | "half" | "3" => Ok(BlinkRate::HalfHz),
            _ => Err(Error::InvalidBlinkRate(s.to_string())),
        }
    }
}

impl fmt::Display for BlinkRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlinkRate::Off => write!(f, "off"),
            BlinkRate::TwoHz => write!(f, "2hz"),
            BlinkRate::OneHz => write!(f, "1hz"),
            BlinkRate::HalfHz => write!(f, "0.5hz"),
        }
    }
}

/// Driver for one 4-character panel.
pub struct Display<B: Bus> {
    bus: B,
    address: u8,
    brightness: Option<u8>,
    blink_rate: BlinkRate,
    frame: Frame,
}

impl<B: Bus> Display<B> {
    /// Creates a driver for the panel at `address`. Nothing is written
    /// until [`Display::initialize`] is called.
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            bus,
            address,
            brightness: None,
            blink_rate: BlinkRate::Off,
            frame: Frame::blank(),
        }
    }

    /// Starts the oscillator, turns the display on without blinking and
    /// sets the brightness (clamped to 0-15).
    ///
    /// Every configuration register is written, even if the tracked values
    /// already match. Calling this again is harmless.
    pub fn initialize(&mut self, brightness: i32) -> Result<()> {
        self.bus.write(self.address, &build_oscillator_packet())?;
        self.set_blink_rate(BlinkRate::Off)?;
        self.brightness = None;
        self.set_brightness(brightness)?;
        info!(
            "Display at 0x{:02X} initialized (brightness {})",
            self.address,
            self.brightness.unwrap_or(MAX_BRIGHTNESS)
        );
        Ok(())
    }

    /// Sets the blink rate.
    pub fn set_blink_rate(&mut self, rate: BlinkRate) -> Result<()> {
        let packet = build_blink_packet(rate.raw());
        debug!("Setting blink rate to {}: {:02X?}", rate, packet);
        self.bus.write(self.address, &packet)?;
        self.blink_rate = rate;
        Ok(())
    }

    /// Sets the brightness, clamping `level` to 0-15.
    ///
    /// The write is skipped when the clamped level is already current.
    pub fn set_brightness(&mut self, level: i32) -> Result<()> {
        let level = level.clamp(0, i32::from(MAX_BRIGHTNESS)) as u8;
        if self.brightness == Some(level) {
            return Ok(());
        }
        let packet = build_brightness_packet(level);
        debug!("Setting brightness to {}: {:02X?}", level, packet);
        self.bus.write(self.address, &packet)?;
        self.brightness = Some(level);
        Ok(())
    }

    /// Writes a full frame in a single bus transaction.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let packet = build_frame_packet(frame);
        debug!("Writing frame {}: {:02X?}", frame, packet);
        self.bus.write(self.address, &packet)?;
        self.frame = *frame;
        Ok(())
    }

    /// Encodes and writes up to four characters.
    pub fn write_text(&mut self, text: &str, dots: &[bool]) -> Result<()> {
        self.write_frame(&Frame::encode(text, dots))
    }

    /// Turns every segment and decimal point off.
    pub fn clear(&mut self) -> Result<()> {
        self.write_frame(&Frame::blank())?;
        debug!("Display cleared");
        Ok(())
    }

    /// Blanks the panel before the host lets go of it.
    pub fn shutdown(&mut self) -> Result<()> {
        self.clear()?;
        info!("Display at 0x{:02X} shut down", self.address);
        Ok(())
    }

    /// Returns the last brightness written, if any.
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    /// Returns the last blink rate written.
    pub fn blink_rate(&self) -> BlinkRate {
        self.blink_rate
    }

    /// Returns the last frame written.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Returns the device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Returns a reference to the bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns a mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;
    use crate::DEFAULT_ADDRESS;

    fn display() -> (Display<RecordingBus>, RecordingBus) {
        let bus = RecordingBus::new();
        (Display::new(bus.clone(), DEFAULT_ADDRESS), bus)
    }

    fn bytes(bus: &RecordingBus) -> Vec<Vec<u8>> {
        bus.writes().into_iter().map(|w| w.bytes).collect()
    }

    #[test]
    fn test_initialize_sequence() {
        let (mut display, bus) = display();
        display.initialize(15).unwrap();
        assert_eq!(bytes(&bus), vec![vec![0x21], vec![0x81], vec![0xEF]]);
        assert!(bus.writes().iter().all(|w| w.address == 0x70));
        assert_eq!(display.brightness(), Some(15));

        // Re-running writes the full sequence again.
        display.initialize(15).unwrap();
        assert_eq!(bus.len(), 6);
    }

    #[test]
    fn test_blink_rate_from_raw() {
        assert_eq!(BlinkRate::from_raw(0), BlinkRate::Off);
        assert_eq!(BlinkRate::from_raw(1), BlinkRate::TwoHz);
        assert_eq!(BlinkRate::from_raw(3), BlinkRate::HalfHz);
        assert_eq!(BlinkRate::from_raw(4), BlinkRate::Off);
        assert_eq!(BlinkRate::from_raw(-1), BlinkRate::Off);
    }

    #[test]
    fn test_blink_rate_from_str() {
        assert_eq!("2hz".parse::<BlinkRate>().unwrap(), BlinkRate::TwoHz);
        assert_eq!("0.5HZ".parse::<BlinkRate>().unwrap(), BlinkRate::HalfHz);
        assert_eq!("off".parse::<BlinkRate>().unwrap(), BlinkRate::Off);
        assert!("fast".parse::<BlinkRate>().is_err());
    }

    #[test]
    fn test_set_blink_rate_writes_display_setup() {
        let (mut display, bus) = display();
        display.set_blink_rate(BlinkRate::OneHz).unwrap();
        assert_eq!(bytes(&bus), vec![vec![0x85]]);
        assert_eq!(display.blink_rate(), BlinkRate::OneHz);
    }

    #[test]
    fn test_brightness_clamps() {
        let (mut display, bus) = display();
        display.set_brightness(20).unwrap();
        assert_eq!(display.brightness(), Some(15));
        display.set_brightness(-5).unwrap();
        assert_eq!(display.brightness(), Some(0));
        assert_eq!(bytes(&bus), vec![vec![0xEF], vec![0xE0]]);
    }

    #[test]
    fn test_repeated_brightness_writes_once() {
        let (mut display, bus) = display();
        display.set_brightness(7).unwrap();
        display.set_brightness(7).unwrap();
        display.set_brightness(7).unwrap();
        assert_eq!(bytes(&bus), vec![vec![0xE7]]);
    }

    #[test]
    fn test_write_text_and_clear() {
        let (mut display, bus) = display();
        display.write_text("A", &[true]).unwrap();
        assert_eq!(
            bytes(&bus),
            vec![vec![0x00, 0xF7, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]]
        );
        assert_eq!(display.frame(), &Frame::encode("A", &[true]));

        display.clear().unwrap();
        assert_eq!(bus.last_frame(), Some(Frame::blank()));
        assert!(display.frame().is_blank());
    }

    #[test]
    fn test_bus_errors_propagate() {
        let (mut display, bus) = display();
        display.write_text("OK", &[]).unwrap();
        bus.set_failing(true);
        assert!(matches!(
            display.write_text("FAIL", &[]),
            Err(Error::Rejected { .. })
        ));
        // Bookkeeping only follows successful writes.
        assert_eq!(display.frame(), &Frame::encode("OK", &[]));
        assert!(display.set_brightness(3).is_err());
        assert_eq!(display.brightness(), None);
    }
}
