//! Error types for NUR operations

use crate::protocol::status;
use crate::transport::TransportError;

/// Status reported by the module in the second payload byte of a response.
///
/// A status is part of a successfully decoded packet; it only becomes an error when a command
/// wrapper decides the call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModuleStatus {
    #[error("Call succeeded")]
    Success,
    #[error("Invalid command sent to module")]
    InvalidCommand,
    #[error("Invalid packet length sent to module")]
    InvalidLength,
    #[error("Command parameter(s) out of range")]
    ParameterOutOfRange,
    #[error("Data receive timeout")]
    ReceiveTimeout,
    #[error("Invalid command parameter(s)")]
    InvalidParameter,
    #[error("Programming failure")]
    ProgramFailed,
    #[error("Parameter mismatch")]
    ParameterMismatch,
    #[error("HW mismatch")]
    HwMismatch,
    #[error("Reserved error 1")]
    Reserved1,
    #[error("Page programming failure")]
    PageProgram,
    #[error("Memory check failed")]
    CrcCheck,
    #[error("CRC mismatch in parameter")]
    CrcMismatch,
    #[error("Device not ready or region that is being programmed is not unlocked")]
    NotReady,
    #[error("Module application not present")]
    AppNotPresent,
    #[error("Generic, non-interpreted / unexpected error")]
    General,
    #[error("No tag(s) found")]
    NoTag,
    #[error("Air error")]
    RespAir,
    #[error("G2 select error")]
    G2Select,
    #[error("G2 select data missing")]
    MissingSelData,
    #[error("G2 access error")]
    G2Access,
    #[error("G2 read error, unspecified")]
    G2Read,
    #[error("G2 partially successful read")]
    G2ReadPartial,
    #[error("G2 write error, unspecified")]
    G2Write,
    #[error("G2 partially successful write")]
    G2WritePartial,
    #[error("G2 tag responded with error")]
    G2TagResp,
    #[error("Special error; additional debug data is returned with this error")]
    G2Special,
    #[error("HW error")]
    ReaderHw,
    #[error("Unknown module status 0x{0:02X}")]
    Unknown(u8),
}

impl ModuleStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            status::SUCCESS => Self::Success,
            status::INVALID_COMMAND => Self::InvalidCommand,
            status::INVALID_LENGTH => Self::InvalidLength,
            status::PARAMETER_OUT_OF_RANGE => Self::ParameterOutOfRange,
            status::RECEIVE_TIMEOUT => Self::ReceiveTimeout,
            status::INVALID_PARAMETER => Self::InvalidParameter,
            status::PROGRAM_FAILED => Self::ProgramFailed,
            status::PARAMETER_MISMATCH => Self::ParameterMismatch,
            status::HW_MISMATCH => Self::HwMismatch,
            status::RESERVED1 => Self::Reserved1,
            status::PAGE_PROGRAM => Self::PageProgram,
            status::CRC_CHECK => Self::CrcCheck,
            status::CRC_MISMATCH => Self::CrcMismatch,
            status::NOT_READY => Self::NotReady,
            status::APP_NOT_PRESENT => Self::AppNotPresent,
            status::GENERAL => Self::General,
            status::NO_TAG => Self::NoTag,
            status::RESP_AIR => Self::RespAir,
            status::G2_SELECT => Self::G2Select,
            status::MISSING_SELDATA => Self::MissingSelData,
            status::G2_ACCESS => Self::G2Access,
            status::G2_READ => Self::G2Read,
            status::G2_RD_PART => Self::G2ReadPartial,
            status::G2_WRITE => Self::G2Write,
            status::G2_WR_PART => Self::G2WritePartial,
            status::G2_TAG_RESP => Self::G2TagResp,
            status::G2_SPECIAL => Self::G2Special,
            status::READER_HW => Self::ReaderHw,
            other => Self::Unknown(other),
        }
    }

    /// Raw status byte
    pub fn code(self) -> u8 {
        match self {
            Self::Success => status::SUCCESS,
            Self::InvalidCommand => status::INVALID_COMMAND,
            Self::InvalidLength => status::INVALID_LENGTH,
            Self::ParameterOutOfRange => status::PARAMETER_OUT_OF_RANGE,
            Self::ReceiveTimeout => status::RECEIVE_TIMEOUT,
            Self::InvalidParameter => status::INVALID_PARAMETER,
            Self::ProgramFailed => status::PROGRAM_FAILED,
            Self::ParameterMismatch => status::PARAMETER_MISMATCH,
            Self::HwMismatch => status::HW_MISMATCH,
            Self::Reserved1 => status::RESERVED1,
            Self::PageProgram => status::PAGE_PROGRAM,
            Self::CrcCheck => status::CRC_CHECK,
            Self::CrcMismatch => status::CRC_MISMATCH,
            Self::NotReady => status::NOT_READY,
            Self::AppNotPresent => status::APP_NOT_PRESENT,
            Self::General => status::GENERAL,
            Self::NoTag => status::NO_TAG,
            Self::RespAir => status::RESP_AIR,
            Self::G2Select => status::G2_SELECT,
            Self::MissingSelData => status::MISSING_SELDATA,
            Self::G2Access => status::G2_ACCESS,
            Self::G2Read => status::G2_READ,
            Self::G2ReadPartial => status::G2_RD_PART,
            Self::G2Write => status::G2_WRITE,
            Self::G2WritePartial => status::G2_WR_PART,
            Self::G2TagResp => status::G2_TAG_RESP,
            Self::G2Special => status::G2_SPECIAL,
            Self::ReaderHw => status::READER_HW,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Tag-level error carried in the first data byte of a `G2_TAG_RESP` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("The specified memory location does not exist or the EPC length field is not supported by the tag")]
    MemOverrun,
    #[error("The specified memory location is locked and/or permalocked and is not writeable or not readable")]
    MemLocked,
    #[error("The tag has insufficient power to perform the memory-write operation")]
    InsufficientPower,
    #[error("The tag does not support error-specific codes")]
    NonSpecific,
    #[error("Tag responded with error code 0x{0:02X}")]
    Generic(u8),
}

impl TagError {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x03 => Self::MemOverrun,
            0x04 => Self::MemLocked,
            0x0B => Self::InsufficientPower,
            0x0F => Self::NonSpecific,
            other => Self::Generic(other),
        }
    }
}

/// Errors that can occur during NUR operations
#[derive(Debug, thiserror::Error)]
pub enum NurError {
    /// Transport layer error (UART, serial, etc.)
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No matching response arrived before the deadline
    #[error("timed out waiting for response to command 0x{cmd:02X}")]
    Timeout { cmd: u8 },
    /// Outgoing payload does not fit in one frame
    #[error("packet too long ({len} bytes, max {max})")]
    PacketTooLong { len: usize, max: usize },
    /// Incoming frame is larger than the receive buffer
    #[error("receive buffer overflow ({needed} bytes, capacity {capacity})")]
    BufferOverflow { needed: usize, capacity: usize },
    /// Module rejected the command
    #[error("module error: {0}")]
    Module(ModuleStatus),
    /// Tag rejected the air operation
    #[error("tag error: {0}")]
    Tag(TagError),
    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Response payload could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("data not on word boundary")]
    NotWordBoundary,
    /// Stopped by a progress callback
    #[error("operation aborted")]
    Aborted,
}

impl NurError {
    /// Module status behind this error, if the module reported one
    pub fn module_status(&self) -> Option<ModuleStatus> {
        match self {
            Self::Module(status) => Some(*status),
            Self::Tag(_) => Some(ModuleStatus::G2TagResp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_module_status_code_roundtrip() {
        for code in 0..=0xFFu8 {
            assert_eq!(ModuleStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_module_status_messages() {
        assert_eq!(ModuleStatus::NoTag.to_string(), "No tag(s) found");
        assert_eq!(ModuleStatus::from_code(0x7F).to_string(), "Unknown module status 0x7F");
        assert!(ModuleStatus::from_code(0).is_success());
    }

    #[rstest]
    #[case(0x03, TagError::MemOverrun)]
    #[case(0x04, TagError::MemLocked)]
    #[case(0x0B, TagError::InsufficientPower)]
    #[case(0x0F, TagError::NonSpecific)]
    #[case(0x00, TagError::Generic(0x00))]
    #[case(0x05, TagError::Generic(0x05))]
    fn test_tag_error_translation(#[case] code: u8, #[case] expected: TagError) {
        assert_eq!(TagError::from_code(code), expected);
    }

    #[test]
    fn test_error_display() {
        let err = NurError::Timeout { cmd: 0x01 };
        assert_eq!(err.to_string(), "timed out waiting for response to command 0x01");

        let err = NurError::from(TransportError::NotConnected);
        assert_eq!(err.to_string(), "transport not connected");
        assert_eq!(err.module_status(), None);

        let err = NurError::Tag(TagError::MemLocked);
        assert_eq!(err.module_status(), Some(ModuleStatus::G2TagResp));
    }
}
