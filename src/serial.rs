//! Serial port transport for desktop hosts using the serialport crate

use std::io::{self, ErrorKind};
use std::time::Duration;

use log::{debug, info};

use crate::transport::{RfidTransport, TransportError};

/// Settle time after opening before stale input is flushed
const OPEN_SETTLE: Duration = Duration::from_millis(500);

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_secs(1))
            .open()?;
        std::thread::sleep(OPEN_SETTLE);
        port.clear(serialport::ClearBuffer::Input)?;
        info!("Opened {} at {} baud", port_name, baud_rate);

        Ok(Self { port })
    }

    /// Reconfigure the host side after a successful `set_baudrate`
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        debug!("Switching host baudrate to {}", baud_rate);
        self.port.set_baud_rate(baud_rate).map_err(map_serial_error)
    }
}

fn map_io_error(e: io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
        ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof => TransportError::NotConnected,
        _ => TransportError::Io(e),
    }
}

fn map_serial_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::NotConnected,
        serialport::ErrorKind::Io(kind) => map_io_error(io::Error::new(kind, e.description)),
        _ => TransportError::Io(io::Error::other(e)),
    }
}

impl RfidTransport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        io::Write::write(&mut self.port, data).map_err(map_io_error)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        self.port
            .set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(map_serial_error)?;
        io::Read::read(&mut self.port, buf).map_err(map_io_error)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(map_serial_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        assert!(matches!(
            map_io_error(io::Error::from(ErrorKind::TimedOut)),
            TransportError::Timeout
        ));
        assert!(matches!(
            map_io_error(io::Error::from(ErrorKind::BrokenPipe)),
            TransportError::NotConnected
        ));
        assert!(matches!(
            map_io_error(io::Error::from(ErrorKind::PermissionDenied)),
            TransportError::Io(_)
        ));
    }
}
