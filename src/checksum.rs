//! Checksums used on the wire and for flash pages.

use crc::{CRC_16_IBM_3740, CRC_32_ISO_HDLC, Crc};

use crate::protocol::{HDR_SIZE, HEADER_CHECKSUM_SEED};

/// CCITT polynomial 0x1021, MSB first, no final XOR
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);
/// Reflected 0xEDB88320, complemented in and out
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Seed of the payload CRC-16
pub const CRC16_START: u16 = 0xFFFF;

/// CRC-16/CCITT-FALSE continued from `seed`.
pub fn crc16(seed: u16, bytes: &[u8]) -> u16 {
    let mut digest = CRC16.digest_with_initial(seed);
    digest.update(bytes);
    digest.finalize()
}

/// CRC-32 continued from a previous result (`0` for a fresh checksum).
pub fn crc32(seed: u32, bytes: &[u8]) -> u32 {
    // The crate expects the initial register unreflected
    let mut digest = CRC32.digest_with_initial((seed ^ 0xFFFF_FFFF).reverse_bits());
    digest.update(bytes);
    digest.finalize()
}

/// XOR checksum over the header bytes preceding the checksum field.
pub fn header_checksum(header: &[u8]) -> u8 {
    header[..HDR_SIZE - 1]
        .iter()
        .fold(HEADER_CHECKSUM_SEED, |acc, &b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc16_bitwise(mut crc: u16, bytes: &[u8]) -> u16 {
        for &b in bytes {
            crc ^= (b as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
            }
        }
        crc
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(CRC16_START, b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc16_matches_bit_serial_update() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(crc16(CRC16_START, &data), crc16_bitwise(CRC16_START, &data));
        assert_eq!(crc16(0x1234, &data[..17]), crc16_bitwise(0x1234, &data[..17]));
    }

    #[test]
    fn test_crc16_single_command_bytes() {
        assert_eq!(crc16(CRC16_START, &[0x01]), 0xF1D1);
        assert_eq!(crc16(CRC16_START, &[0x02]), 0xC1B2);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(0, b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(0, &[]), 0);
    }

    #[test]
    fn test_crc32_continuation() {
        let whole = crc32(0, b"123456789");
        let partial = crc32(0, b"1234");
        assert_eq!(crc32(partial, b"56789"), whole);
    }

    #[test]
    fn test_header_checksum() {
        let header = [0xA5, 0x03, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(header_checksum(&header), 0x59);
        assert_eq!(header_checksum(&[0xA5, 0x10, 0x00, 0x01, 0x00]), 0xFF ^ 0xA5 ^ 0x10 ^ 0x01);
    }
}
