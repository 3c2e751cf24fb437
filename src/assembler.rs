//! Incremental packet assembler for the receive direction.
//!
//! Bytes arrive in arbitrary fragments. The assembler accumulates them into a fixed
//! buffer, validates the header checksum and payload CRC, and holds a complete packet
//! until the owner calls [`PacketAssembler::reset`]:
//! - `Idle`: scanning for the start byte, everything else is discarded
//! - `HeaderPending`: collecting the rest of the header
//! - `PayloadPending`: header valid, collecting `payloadLen` bytes
//! - `PacketReady`: a validated packet is available, further bytes are left unconsumed
//!
//! Checksum and CRC failures silently drop the frame in progress and return to `Idle`.

use log::{debug, trace};

use crate::checksum::{CRC16_START, crc16, header_checksum};
use crate::error::{ModuleStatus, NurError};
use crate::protocol::{HDR_SIZE, MIN_PAYLOAD_LEN, NUR_MAX_RCV_SZ, START_BYTE, flags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    HeaderPending,
    PayloadPending,
    PacketReady,
}

/// Result of feeding a chunk of bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// All bytes were consumed and no packet is complete yet
    NeedMore,
    /// A packet is ready; `consumed` bytes of the chunk were used, the rest belong to
    /// whatever follows
    Ready { consumed: usize },
}

/// A validated packet, borrowed from the assembler buffer.
///
/// Only valid until the assembler is reset, which the borrow checker enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// Command or notification id
    pub cmd: u8,
    /// Header flags
    pub flags: u16,
    /// Status byte, 0 when the payload carries no status
    pub status: u8,
    /// Response data after the status byte
    pub data: &'a [u8],
    /// Everything between the command byte and the CRC
    pub payload: &'a [u8],
}

impl Packet<'_> {
    pub fn is_unsolicited(&self) -> bool {
        self.flags & flags::UNSOL != 0
    }

    pub fn has_ir_data(&self) -> bool {
        self.flags & flags::IRDATA != 0
    }

    pub fn requests_ack(&self) -> bool {
        self.flags & flags::ACK != 0
    }

    pub fn module_status(&self) -> ModuleStatus {
        ModuleStatus::from_code(self.status)
    }
}

pub struct PacketAssembler {
    buf: Vec<u8>,
    used: usize,
    state: AssemblerState,
    payload_len: usize,
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketAssembler {
    /// Create an assembler sized for the largest frame the module sends
    pub fn new() -> Self {
        Self::with_capacity(NUR_MAX_RCV_SZ)
    }

    /// Create an assembler holding frames of at most `capacity` bytes (header included)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(HDR_SIZE + MIN_PAYLOAD_LEN)],
            used: 0,
            state: AssemblerState::Idle,
            payload_len: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Bytes of the frame in progress
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial or completed packet and return to `Idle`
    pub fn reset(&mut self) {
        self.used = 0;
        self.payload_len = 0;
        self.state = AssemblerState::Idle;
    }

    /// Feed bytes, discarding noise silently
    pub fn feed(&mut self, bytes: &[u8]) -> Result<ParseOutcome, NurError> {
        self.feed_with(bytes, |_| {})
    }

    /// Feed bytes, reporting every byte discarded while scanning for a start byte.
    ///
    /// # Returns
    /// [`ParseOutcome::Ready`] as soon as a packet validates; bytes after it are not
    /// consumed. While a packet is held, nothing is consumed.
    ///
    /// # Errors
    /// [`NurError::BufferOverflow`] when a valid header announces a frame larger than the
    /// buffer. The assembler is reset before returning.
    pub fn feed_with<F>(&mut self, bytes: &[u8], mut on_ignored: F) -> Result<ParseOutcome, NurError>
    where
        F: FnMut(u8),
    {
        if self.state == AssemblerState::PacketReady {
            return Ok(ParseOutcome::Ready { consumed: 0 });
        }

        for (i, &byte) in bytes.iter().enumerate() {
            match self.state {
                AssemblerState::Idle => {
                    if byte == START_BYTE {
                        self.buf[0] = byte;
                        self.used = 1;
                        self.state = AssemblerState::HeaderPending;
                    } else {
                        self.used = 0;
                        on_ignored(byte);
                    }
                }
                AssemblerState::HeaderPending => {
                    self.push(byte);
                    if self.used == HDR_SIZE {
                        self.validate_header()?;
                    }
                }
                AssemblerState::PayloadPending => {
                    self.push(byte);
                    if self.used == HDR_SIZE + self.payload_len && self.validate_payload() {
                        return Ok(ParseOutcome::Ready { consumed: i + 1 });
                    }
                }
                AssemblerState::PacketReady => {
                    return Ok(ParseOutcome::Ready { consumed: i });
                }
            }
        }

        Ok(ParseOutcome::NeedMore)
    }

    /// The held packet, if one is ready
    pub fn packet(&self) -> Option<Packet<'_>> {
        if self.state != AssemblerState::PacketReady {
            return None;
        }

        let flags = u16::from_le_bytes([self.buf[3], self.buf[4]]);
        let body = &self.buf[HDR_SIZE..HDR_SIZE + self.payload_len - 2];
        let cmd = body[0];
        let payload = &body[1..];
        let (status, data) = match payload.split_first() {
            Some((&status, data)) => (status, data),
            None => (0, payload),
        };

        Some(Packet {
            cmd,
            flags,
            status,
            data,
            payload,
        })
    }

    /// The complete raw frame, if one is ready
    pub fn frame(&self) -> Option<&[u8]> {
        (self.state == AssemblerState::PacketReady).then(|| &self.buf[..self.used])
    }

    fn push(&mut self, byte: u8) {
        // Bounds are checked against the header before entering PayloadPending
        self.buf[self.used] = byte;
        self.used += 1;
    }

    fn validate_header(&mut self) -> Result<(), NurError> {
        let expected = header_checksum(&self.buf[..HDR_SIZE]);
        if expected != self.buf[HDR_SIZE - 1] {
            debug!(
                "Header checksum mismatch (got 0x{:02X}, expected 0x{:02X})",
                self.buf[HDR_SIZE - 1],
                expected
            );
            self.resync_header();
            return Ok(());
        }

        let payload_len = u16::from_le_bytes([self.buf[1], self.buf[2]]) as usize;
        if payload_len < MIN_PAYLOAD_LEN {
            debug!("Header announces impossible payload length {}", payload_len);
            self.resync_header();
            return Ok(());
        }

        let needed = HDR_SIZE + payload_len;
        if needed > self.buf.len() {
            let capacity = self.buf.len();
            self.reset();
            return Err(NurError::BufferOverflow { needed, capacity });
        }

        self.payload_len = payload_len;
        self.state = AssemblerState::PayloadPending;
        Ok(())
    }

    /// Drop a rejected header, keeping its tail from the next start byte on
    fn resync_header(&mut self) {
        match self.buf[1..HDR_SIZE].iter().position(|&b| b == START_BYTE) {
            Some(offset) => {
                let start = offset + 1;
                self.buf.copy_within(start..HDR_SIZE, 0);
                self.used = HDR_SIZE - start;
                self.payload_len = 0;
                self.state = AssemblerState::HeaderPending;
            }
            None => self.reset(),
        }
    }

    fn validate_payload(&mut self) -> bool {
        let body_end = HDR_SIZE + self.payload_len - 2;
        let calculated = crc16(CRC16_START, &self.buf[HDR_SIZE..body_end]);
        let received = u16::from_le_bytes([self.buf[body_end], self.buf[body_end + 1]]);

        if calculated != received {
            debug!(
                "Payload CRC mismatch (got 0x{:04X}, expected 0x{:04X})",
                received, calculated
            );
            self.reset();
            return false;
        }

        trace!("Packet ready: {:02X?}", &self.buf[..self.used]);
        self.state = AssemblerState::PacketReady;
        true
    }
}
