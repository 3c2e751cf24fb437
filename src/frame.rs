//! Outgoing frame encoder.

use crate::checksum::{CRC16_START, crc16, header_checksum};
use crate::error::NurError;
use crate::protocol::{HDR_SIZE, MIN_PAYLOAD_LEN, NUR_MAX_SEND_SZ, START_BYTE};

/// Total frame size for `data_len` bytes of command data
pub fn frame_len(data_len: usize) -> usize {
    HDR_SIZE + data_len + MIN_PAYLOAD_LEN
}

/// Encode a frame into `out` and return the number of bytes written.
///
/// # Arguments
/// * `cmd` - Command id
/// * `data` - Command data, without the command byte
/// * `flags` - Header flags
/// * `out` - Destination, at least [`frame_len`] bytes
///
/// # Returns
/// Exact length of header + command byte + data + CRC
pub fn encode_frame_into(cmd: u8, data: &[u8], flags: u16, out: &mut [u8]) -> Result<usize, NurError> {
    let payload_len = data.len() + MIN_PAYLOAD_LEN;
    if payload_len > NUR_MAX_SEND_SZ {
        return Err(NurError::PacketTooLong {
            len: payload_len,
            max: NUR_MAX_SEND_SZ,
        });
    }

    let total = HDR_SIZE + payload_len;
    if out.len() < total {
        return Err(NurError::InvalidParameter(format!(
            "frame buffer too small ({} bytes, need {})",
            out.len(),
            total
        )));
    }

    out[0] = START_BYTE;
    out[1..3].copy_from_slice(&(payload_len as u16).to_le_bytes());
    out[3..5].copy_from_slice(&flags.to_le_bytes());
    out[5] = header_checksum(&out[..HDR_SIZE]);

    out[HDR_SIZE] = cmd;
    out[HDR_SIZE + 1..HDR_SIZE + 1 + data.len()].copy_from_slice(data);

    let crc_pos = HDR_SIZE + 1 + data.len();
    let crc = crc16(CRC16_START, &out[HDR_SIZE..crc_pos]);
    out[crc_pos..crc_pos + 2].copy_from_slice(&crc.to_le_bytes());

    Ok(total)
}

/// Encode a frame into a fresh buffer.
pub fn encode_frame(cmd: u8, data: &[u8], flags: u16) -> Result<Vec<u8>, NurError> {
    let mut out = vec![0u8; frame_len(data.len())];
    let len = encode_frame_into(cmd, data, flags, &mut out)?;
    out.truncate(len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ACK_FRAME, cmd};

    #[test]
    fn test_encode_ping_frame() {
        let frame = encode_frame(cmd::PING, &[], 0).unwrap();
        assert_eq!(frame, [0xA5, 0x03, 0x00, 0x00, 0x00, 0xFF ^ 0xA5 ^ 0x03, 0x01, 0xD1, 0xF1]);
    }

    #[test]
    fn test_ack_frame_is_a_regular_frame() {
        let frame = encode_frame(cmd::VERSION, &[], 0).unwrap();
        assert_eq!(frame, ACK_FRAME);
    }

    #[test]
    fn test_encode_with_data_and_flags() {
        let frame = encode_frame(cmd::STORESETUP, &[0x01], 0x0004).unwrap();
        assert_eq!(frame.len(), 10);
        assert_eq!(&frame[1..3], &[0x04, 0x00]);
        assert_eq!(&frame[3..5], &[0x04, 0x00]);
        assert_eq!(frame[6], cmd::STORESETUP);
        assert_eq!(frame[7], 0x01);
        let crc = crc16(CRC16_START, &[cmd::STORESETUP, 0x01]);
        assert_eq!(&frame[8..], &crc.to_le_bytes());
    }

    #[test]
    fn test_encode_max_size() {
        let data = vec![0x55; NUR_MAX_SEND_SZ - MIN_PAYLOAD_LEN];
        let frame = encode_frame(0x33, &data, 0).unwrap();
        assert_eq!(frame.len(), HDR_SIZE + NUR_MAX_SEND_SZ);
    }

    #[test]
    fn test_encode_packet_too_long() {
        let data = vec![0u8; NUR_MAX_SEND_SZ - MIN_PAYLOAD_LEN + 1];
        let result = encode_frame(0x33, &data, 0);
        assert!(matches!(
            result,
            Err(NurError::PacketTooLong { len: 2048, max: 2047 })
        ));
    }

    #[test]
    fn test_encode_into_small_buffer() {
        let mut out = [0u8; 8];
        let result = encode_frame_into(cmd::PING, &[], 0, &mut out);
        assert!(matches!(result, Err(NurError::InvalidParameter(_))));
    }
}
