//! I2C over a Firmata serial link.
//!
//! Boards running StandardFirmata expose their I2C master through sysex
//! messages. Every data byte travels as two 7-bit bytes, LSB first.
//!
//! Writes are queued on a channel and drained in order by a writer task, so
//! [`Bus::write`] never waits on the serial port. Opening the port resets
//! most boards, so the writer holds the queue back until the firmware
//! announces itself with a version report.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, warn};

use crate::bus::Bus;
use crate::{Error, Result};

/// Default Firmata baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// How long to wait for the firmware version report after opening the port.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol version report, sent by the firmware once it is running.
pub const REPORT_VERSION: u8 = 0xF9;

/// Pin mode change.
pub const SET_PIN_MODE: u8 = 0xF4;

/// Single digital pin value.
pub const SET_DIGITAL_PIN_VALUE: u8 = 0xF5;

/// Sysex start byte.
pub const START_SYSEX: u8 = 0xF0;

/// Sysex end byte.
pub const END_SYSEX: u8 = 0xF7;

/// I2C read/write request.
pub const I2C_REQUEST: u8 = 0x76;

/// I2C configuration.
pub const I2C_CONFIG: u8 = 0x78;

/// Request mode bits for a write (bits 3-4 of the mode byte).
pub const I2C_MODE_WRITE: u8 = 0x00;

/// Digital output pin mode.
pub const PIN_MODE_OUTPUT: u8 = 0x01;

/// Builds the I2C configuration message with a read delay in microseconds.
pub fn build_i2c_config(delay_us: u16) -> [u8; 5] {
    [
        START_SYSEX,
        I2C_CONFIG,
        (delay_us & 0x7F) as u8,
        ((delay_us >> 7) & 0x7F) as u8,
        END_SYSEX,
    ]
}

/// Builds an I2C write request for a 7-bit address.
pub fn build_i2c_write(address: u8, bytes: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(5 + bytes.len() * 2);
    message.extend_from_slice(&[START_SYSEX, I2C_REQUEST, address & 0x7F, I2C_MODE_WRITE]);
    for &byte in bytes {
        message.push(byte & 0x7F);
        message.push(byte >> 7);
    }
    message.push(END_SYSEX);
    message
}

/// Builds a pin mode message.
pub fn build_pin_mode(pin: u8, mode: u8) -> [u8; 3] {
    [SET_PIN_MODE, pin & 0x7F, mode & 0x7F]
}

/// Builds a digital pin value message.
pub fn build_digital_pin_value(pin: u8, high: bool) -> [u8; 3] {
    [SET_DIGITAL_PIN_VALUE, pin & 0x7F, u8::from(high)]
}

enum Outgoing {
    Message(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Bus that forwards I2C writes to a Firmata board.
pub struct FirmataBus {
    tx: mpsc::UnboundedSender<Outgoing>,
    label: String,
}

impl FirmataBus {
    /// Opens the serial port and starts the writer task.
    ///
    /// Writes are accepted immediately and sent once the board reports
    /// ready, or after [`DEFAULT_READY_TIMEOUT`]. Must be called from within
    /// a tokio runtime.
    pub fn open(port_path: &str, baud: u32) -> Result<Self> {
        let port = tokio_serial::new(port_path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| {
                if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                    if *kind == std::io::ErrorKind::NotFound
                        && !std::path::Path::new(port_path).exists()
                    {
                        return Error::PortNotFound(port_path.to_string());
                    }
                }
                Error::Serial(e)
            })?;

        info!("Firmata link opened on {} at {} baud", port_path, baud);
        Ok(Self::from_port(port, port_path, DEFAULT_READY_TIMEOUT))
    }

    /// Starts a writer task over a duplex link that waits for the board's
    /// version report (at most `ready_timeout`) before sending anything.
    pub fn from_port<P>(port: P, label: &str, ready_timeout: Duration) -> Self
    where
        P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(port);
        Self::spawn(label, |rx, label| async move {
            wait_ready(reader, ready_timeout, &label).await;
            drain(writer, rx, label).await;
        })
    }

    /// Starts a writer task over a byte sink that needs no handshake.
    pub fn from_writer<W>(writer: W, label: &str) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::spawn(label, |rx, label| drain(writer, rx, label))
    }

    fn spawn<F, Fut>(label: &str, task: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedReceiver<Outgoing>, String) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = label.to_string();
        tokio::spawn(task(rx, label.clone()));

        // The I2C configuration goes first. The receiver cannot be closed yet.
        let _ = tx.send(Outgoing::Message(build_i2c_config(0).to_vec()));
        Self { tx, label }
    }

    /// Returns the port path or label this bus writes to.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns a handle that can wait for the queue to drain after the bus
    /// itself has been handed off.
    pub fn flush_handle(&self) -> FlushHandle {
        FlushHandle {
            tx: self.tx.clone(),
        }
    }

    /// Waits until every write queued so far has been sent.
    pub async fn flush(&self) -> Result<()> {
        self.flush_handle().flush().await
    }

    /// Configures `pin` as a digital output on the board.
    pub fn digital_output(&self, pin: u8) -> Result<DigitalPin> {
        let pin = DigitalPin {
            tx: self.tx.clone(),
            pin,
        };
        pin.send(build_pin_mode(pin.pin, PIN_MODE_OUTPUT).to_vec())?;
        Ok(pin)
    }
}

impl Bus for FirmataBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(Outgoing::Message(build_i2c_write(address, bytes)))
            .map_err(|_| Error::BusClosed)
    }
}

/// Waits for a [`FirmataBus`] queue to drain.
#[derive(Clone)]
pub struct FlushHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl FlushHandle {
    /// Waits until every write queued before this call has been sent.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Outgoing::Flush(done_tx))
            .map_err(|_| Error::BusClosed)?;
        done_rx.await.map_err(|_| Error::BusClosed)
    }
}

/// A digital output pin on the Firmata board.
///
/// Pin writes share the bus queue, so they stay ordered with display writes.
#[derive(Clone)]
pub struct DigitalPin {
    tx: mpsc::UnboundedSender<Outgoing>,
    pin: u8,
}

impl DigitalPin {
    /// Drives the pin high or low.
    pub fn set(&self, high: bool) -> Result<()> {
        self.send(build_digital_pin_value(self.pin, high).to_vec())
    }

    /// Returns the pin number.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    fn send(&self, message: Vec<u8>) -> Result<()> {
        self.tx
            .send(Outgoing::Message(message))
            .map_err(|_| Error::BusClosed)
    }
}

/// Reads until the firmware sends its version report, the link ends, or
/// `timeout` passes. Everything else the board sends is discarded.
async fn wait_ready<R>(mut reader: R, timeout: Duration, label: &str)
where
    R: AsyncRead + Unpin,
{
    let handshake = async {
        let mut buf = [0u8; 64];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => return Err("link closed".to_string()),
                Ok(n) if buf[..n].contains(&REPORT_VERSION) => return Ok(()),
                Ok(n) => debug!("Ignoring {} bytes from {} before ready", n, label),
                Err(e) => return Err(e.to_string()),
            }
        }
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(Ok(())) => info!("Firmata board on {} is ready", label),
        Ok(Err(e)) => warn!("No version report from {} ({}), sending anyway", label, e),
        Err(_) => warn!(
            "No version report from {} within {:?}, sending anyway",
            label, timeout
        ),
    }
}

async fn drain<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Outgoing>, label: String)
where
    W: AsyncWrite + Unpin,
{
    while let Some(outgoing) = rx.recv().await {
        let message = match outgoing {
            Outgoing::Message(message) => message,
            Outgoing::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        debug!("Sending Firmata message to {}: {:02X?}", label, message);
        let sent = async {
            writer.write_all(&message).await?;
            writer.flush().await
        };
        if let Err(e) = sent.await {
            warn!("Firmata link {} failed: {}", label, e);
            break;
        }
    }
    debug!("Firmata writer for {} stopped", label);
}
