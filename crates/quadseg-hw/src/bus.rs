//! Bus abstraction for register writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::frame::Frame;
use crate::protocol::decode_frame_packet;
use crate::{Error, Result};

/// A write-only, register-addressed bus.
///
/// Implementations must deliver writes in call order. A write that returns
/// `Ok` has been accepted, not necessarily transferred.
pub trait Bus: Send {
    /// Writes `bytes` to the device at the 7-bit `address`.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()>;
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        (**self).write(address, bytes)
    }
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        (**self).write(address, bytes)
    }
}

/// Bus that accepts and discards every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl Bus for NullBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        debug!("Discarding write to 0x{:02X}: {:02X?}", address, bytes);
        Ok(())
    }
}

/// A single recorded bus write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusWrite {
    pub address: u8,
    pub bytes: Vec<u8>,
}

impl BusWrite {
    /// Decodes the write as a full frame, if it is one.
    pub fn frame(&self) -> Option<Frame> {
        decode_frame_packet(&self.bytes)
    }
}

#[derive(Debug, Default)]
struct Recording {
    writes: Vec<BusWrite>,
    failing: bool,
}

/// In-memory bus that records every write.
///
/// Clones share the same log, so a handle kept outside the display can
/// inspect what the display sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingBus {
    /// Creates an empty recording bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of all writes so far.
    pub fn writes(&self) -> Vec<BusWrite> {
        self.lock().writes.clone()
    }

    /// Returns every full frame written so far, in order.
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().writes.iter().filter_map(BusWrite::frame).collect()
    }

    /// Returns the most recent full frame written.
    pub fn last_frame(&self) -> Option<Frame> {
        self.lock().writes.iter().rev().find_map(BusWrite::frame)
    }

    /// Returns the number of writes recorded.
    pub fn len(&self) -> usize {
        self.lock().writes.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.lock().writes.is_empty()
    }

    /// Forgets all recorded writes.
    pub fn clear(&self) {
        self.lock().writes.clear();
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }
}

impl Bus for RecordingBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        let mut recording = self.lock();
        if recording.failing {
            return Err(Error::Rejected { address });
        }
        debug!("Bus write to 0x{:02X}: {:02X?}", address, bytes);
        recording.writes.push(BusWrite {
            address,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}
