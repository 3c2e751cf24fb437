use log::{debug, error, trace, warn};
use std::io;
use std::time::{Duration, Instant};

use crate::assembler::{Packet, PacketAssembler, ParseOutcome};
use crate::config::ReaderConfig;
use crate::error::{ModuleStatus, NurError, TagError};
use crate::frame::{encode_frame_into, frame_len};
use crate::protocol::{ACK_FRAME, NUR_MAX_SEND_SZ, flags};
use crate::transport::{RfidTransport, TransportError};

/// Callback receiving unsolicited packets, or solicited packets nobody waited for
pub type PacketHandler = Box<dyn FnMut(&Packet<'_>) + Send>;
/// Callback receiving bytes discarded while scanning for a frame start
pub type IgnoredByteHandler = Box<dyn FnMut(u8) + Send>;

/// Connection to a NUR module.
///
/// Owns the transport, the send buffer, the receive chunk and the packet assembler. One
/// exchange runs at a time; `&mut self` on every command enforces that.
pub struct NurReader<T: RfidTransport> {
    transport: T,
    config: ReaderConfig,
    tx: Vec<u8>,
    rx: Vec<u8>,
    rx_pos: usize,
    rx_len: usize,
    assembler: PacketAssembler,
    on_notification: Option<PacketHandler>,
    on_unexpected: Option<PacketHandler>,
    on_ignored_byte: Option<IgnoredByteHandler>,
}

impl<T: RfidTransport> NurReader<T> {
    /// Create a new reader instance with the given transport and default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReaderConfig::default())
    }

    /// Create a new reader instance with custom timeouts and buffer sizes
    pub fn with_config(transport: T, config: ReaderConfig) -> Self {
        Self {
            transport,
            tx: vec![0u8; frame_len(NUR_MAX_SEND_SZ)],
            rx: vec![0u8; config.rx_chunk_size.max(1)],
            rx_pos: 0,
            rx_len: 0,
            assembler: PacketAssembler::with_capacity(config.rx_capacity),
            config,
            on_notification: None,
            on_unexpected: None,
            on_ignored_byte: None,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Register a handler for unsolicited notifications.
    ///
    /// The handler runs inline, inside whichever call is reading from the transport.
    pub fn set_notification_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Packet<'_>) + Send + 'static,
    {
        self.on_notification = Some(Box::new(handler));
    }

    /// Register a handler for solicited packets that do not match the pending command
    pub fn set_unexpected_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Packet<'_>) + Send + 'static,
    {
        self.on_unexpected = Some(Box::new(handler));
    }

    /// Register a handler for bytes discarded outside of any frame
    pub fn set_ignored_byte_handler<F>(&mut self, handler: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.on_ignored_byte = Some(Box::new(handler));
    }

    /// Drop buffered input on both sides: the transport and any unprocessed bytes
    pub fn clear_input(&mut self) -> Result<(), NurError> {
        self.rx_pos = 0;
        self.rx_len = 0;
        self.assembler.reset();
        self.transport.clear_input()?;
        Ok(())
    }

    /// Wait for the next packet of any kind without sending anything.
    ///
    /// Unsolicited packets are passed to the notification handler before returning.
    pub fn wait_event(&mut self, timeout: Duration) -> Result<Packet<'_>, NurError> {
        self.exchange(0, &[], timeout)
    }

    /// Send a command and wait for the response with the same command id.
    ///
    /// # Arguments
    /// * `cmd` - Command id; `0` sends nothing and returns the first packet received
    /// * `payload` - Command data following the command byte
    /// * `timeout` - Overall deadline for the response
    ///
    /// # Returns
    /// The matching packet with its status byte. A non-zero status is not an error here;
    /// the returned packet borrows the receive buffer until the next call.
    ///
    /// Unsolicited packets received while waiting go to the notification handler and never
    /// satisfy the wait. Solicited packets with another command id go to the unexpected
    /// handler and are skipped.
    pub fn exchange(&mut self, cmd: u8, payload: &[u8], timeout: Duration) -> Result<Packet<'_>, NurError> {
        if cmd != 0 {
            let len = encode_frame_into(cmd, payload, 0, &mut self.tx)?;
            debug!("Sending command 0x{:02X}: {:02X?}", cmd, &self.tx[..len]);
            write_all(&mut self.transport, &self.tx[..len])?;
        }

        self.assembler.reset();
        let deadline = Instant::now() + timeout;

        loop {
            if self.rx_pos >= self.rx_len {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                self.fill(deadline - now)?;
                continue;
            }

            let outcome = {
                let hook = &mut self.on_ignored_byte;
                self.assembler
                    .feed_with(&self.rx[self.rx_pos..self.rx_len], |byte| {
                        if let Some(handler) = hook.as_mut() {
                            handler(byte);
                        }
                    })
            };

            let consumed = match outcome {
                Ok(ParseOutcome::NeedMore) => {
                    self.rx_pos = self.rx_len;
                    continue;
                }
                Ok(ParseOutcome::Ready { consumed }) => consumed,
                Err(e) => {
                    error!("Dropping receive chunk: {}", e);
                    self.rx_pos = self.rx_len;
                    return Err(e);
                }
            };
            self.rx_pos += consumed;

            let (packet_cmd, packet_flags) = match self.assembler.packet() {
                Some(packet) => (packet.cmd, packet.flags),
                None => continue,
            };
            debug!(
                "Received packet 0x{:02X} (flags 0x{:04X})",
                packet_cmd, packet_flags
            );

            if packet_flags & flags::ACK != 0 {
                trace!("Module requested ACK");
                write_all(&mut self.transport, &ACK_FRAME)?;
            }

            let unsolicited = packet_flags & flags::UNSOL != 0;
            if unsolicited {
                if let (Some(handler), Some(packet)) =
                    (self.on_notification.as_mut(), self.assembler.packet())
                {
                    handler(&packet);
                }
            }

            if cmd == 0 || (!unsolicited && packet_cmd == cmd) {
                return self
                    .assembler
                    .packet()
                    .ok_or_else(|| NurError::InvalidResponse("packet no longer available".into()));
            }

            if !unsolicited {
                warn!(
                    "Unexpected response 0x{:02X} while waiting for 0x{:02X}",
                    packet_cmd, cmd
                );
                if let (Some(handler), Some(packet)) =
                    (self.on_unexpected.as_mut(), self.assembler.packet())
                {
                    handler(&packet);
                }
            }

            self.assembler.reset();
        }

        warn!("Timed out waiting for response to 0x{:02X}", cmd);
        Err(NurError::Timeout { cmd })
    }

    /// Exchange and turn a non-zero module status into an error
    pub(crate) fn command(&mut self, cmd: u8, payload: &[u8], timeout: Duration) -> Result<Packet<'_>, NurError> {
        let packet = self.exchange(cmd, payload, timeout)?;
        check_status(&packet)?;
        Ok(packet)
    }

    /// Command with the default timeout
    pub(crate) fn simple_command(&mut self, cmd: u8, payload: &[u8]) -> Result<Packet<'_>, NurError> {
        let timeout = self.config.default_timeout;
        self.command(cmd, payload, timeout)
    }

    fn fill(&mut self, remaining: Duration) -> Result<(), NurError> {
        self.rx_pos = 0;
        self.rx_len = 0;

        let timeout_ms = remaining.as_millis().clamp(1, u32::MAX as u128) as u32;
        match self.transport.read(&mut self.rx, timeout_ms) {
            Ok(n) => {
                self.rx_len = n.min(self.rx.len());
                if self.rx_len > 0 {
                    trace!("Read {} bytes: {:02X?}", self.rx_len, &self.rx[..self.rx_len]);
                }
                Ok(())
            }
            Err(TransportError::Timeout) => Ok(()),
            Err(e) => {
                error!("Read error: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Map a response status to `Ok` or the matching error.
///
/// `G2_TAG_RESP` carries the tag's own error code in the first data byte.
pub(crate) fn check_status(packet: &Packet<'_>) -> Result<(), NurError> {
    match packet.module_status() {
        ModuleStatus::Success => Ok(()),
        ModuleStatus::G2TagResp => {
            let tag_error = TagError::from_code(packet.data.first().copied().unwrap_or(0));
            warn!("Command 0x{:02X} failed: {}", packet.cmd, tag_error);
            Err(NurError::Tag(tag_error))
        }
        status => {
            warn!("Command 0x{:02X} failed: {}", packet.cmd, status);
            Err(NurError::Module(status))
        }
    }
}

fn write_all<T: RfidTransport>(transport: &mut T, mut data: &[u8]) -> Result<(), NurError> {
    while !data.is_empty() {
        match transport.write(data) {
            Ok(0) => {
                error!("Transport accepted no bytes");
                return Err(TransportError::Io(io::Error::from(io::ErrorKind::WriteZero)).into());
            }
            Ok(n) => data = &data[n.min(data.len())..],
            Err(e) => {
                error!("Write error: {}", e);
                return Err(e.into());
            }
        }
    }
    Ok(())
}
