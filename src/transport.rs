/// Errors reported by a transport backend.
///
/// The exchange loop treats [`TransportError::Timeout`] as "nothing arrived yet" and keeps
/// polling; the other variants abort the current exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device went away (USB unplugged, port closed, socket reset)
    #[error("transport not connected")]
    NotConnected,
    /// No bytes arrived within the driver-level timeout
    #[error("transport timeout")]
    Timeout,
    /// Any other I/O failure
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for NUR module communication backends.
/// Implement this trait for different transports (UART, serial port, etc.)
pub trait RfidTransport {
    /// Write data to the transport
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read whatever is available, waiting at most `timeout_ms` milliseconds.
    ///
    /// Returning `Ok(0)` is not an error; the caller polls again.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
