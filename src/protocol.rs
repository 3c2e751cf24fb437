//! Wire-level constants of the NUR host protocol.
//!
//! Command ids are a flat byte space split into ranges: basic (from 1), control (0x20),
//! Gen2 tag operations (0x30), proprietary (0x50), test/RF (0x60), bootloader (0x70),
//! notifications (0x80), register (0x90) and Ethernet/standalone (0xA0).

/// First byte of every frame
pub const START_BYTE: u8 = 0xA5;
/// Seed of the header XOR checksum
pub const HEADER_CHECKSUM_SEED: u8 = 0xFF;
/// Header: start, payload length (u16 LE), flags (u16 LE), checksum
pub const HDR_SIZE: usize = 6;
/// Command byte plus CRC-16
pub const MIN_PAYLOAD_LEN: usize = 3;
/// Smallest valid frame: header, command byte, CRC-16
pub const MIN_FRAME_SIZE: usize = HDR_SIZE + MIN_PAYLOAD_LEN;

/// Largest payload length (cmd + data + crc) the module accepts
pub const NUR_MAX_SEND_SZ: usize = 2047;
/// Largest frame the host is expected to receive
pub const NUR_MAX_RCV_SZ: usize = 8191;

pub const NUR_MAX_EPC_LENGTH: usize = 62;
pub const NUR_MAX_SELMASK: usize = 62;
pub const NUR_MAX_SELMASKBITS: usize = NUR_MAX_SELMASK * 8;
pub const NUR_MAX_GPIO: usize = 7;
pub const NUR_MAX_FILTERS: usize = 8;
pub const NUR_MAX_CUSTOM_FREQS: usize = 100;
pub const NUR_FLASH_PAGE_SIZE: usize = 256;
pub const NR_TUNEBANDS: usize = 6;

/// First flash page of the application image (64 KiB offset)
pub const NUR_APP_FIRST_PAGE: u16 = ((64 * 1024) / NUR_FLASH_PAGE_SIZE) as u16;
/// First flash page of the bootloader image
pub const NUR_BL_FIRST_PAGE: u16 = 0;

/// Magic prefix of versioned reader info responses
pub const NUR_READERINFO_VERSION1: u32 = 0x5244_4901;

/// Header flag bits
pub mod flags {
    /// Packet is an unsolicited notification
    pub const UNSOL: u16 = 1 << 0;
    /// Inventory read data is appended to the tag entries
    pub const IRDATA: u16 = 1 << 1;
    /// Module requests an ACK frame
    pub const ACK: u16 = 1 << 2;
}

/// Fixed frame sent back when the module sets [`flags::ACK`]
pub const ACK_FRAME: [u8; 9] = [0xA5, 0x03, 0x00, 0x00, 0x00, 0x59, 0x02, 0xB2, 0xC1];

/// Singulated command flags (common read/write block)
pub mod rw {
    /// Secured: password present
    pub const SEC: u8 = 1 << 0;
    /// Singulation block present
    pub const SBP: u8 = 1 << 1;
    /// 64-bit singulation address
    pub const EA1: u8 = 1 << 2;
    /// 64-bit read/write address
    pub const EA2: u8 = 1 << 3;
}

/// Command ids
pub mod cmd {
    // Basic
    pub const PING: u8 = 0x01;
    pub const VERSION: u8 = 0x02;
    pub const RESET: u8 = 0x03;
    pub const GETMODE: u8 = 0x04;
    pub const CLEARIDBUF: u8 = 0x05;
    pub const GETIDBUF: u8 = 0x06;
    pub const GETMETABUF: u8 = 0x07;
    pub const GETSYSTEM: u8 = 0x08;
    pub const GETREADERINFO: u8 = 0x09;
    pub const MCUARCH: u8 = 0x0A;
    pub const DEVCAPS: u8 = 0x0B;
    pub const VERSIONEX: u8 = 0x0C;
    pub const BEEP: u8 = 0x0D;
    pub const STOPALLCONT: u8 = 0x0E;
    pub const CONFIGGPIO: u8 = 0x0F;
    pub const GETGPIO: u8 = 0x10;
    pub const SETGPIO: u8 = 0x11;
    pub const SENSORS: u8 = 0x12;
    pub const FACTORYRESET: u8 = 0x13;
    pub const RESTART: u8 = 0x14;
    pub const GETETHCONFIG: u8 = 0x15;
    pub const SETETHCONFIG: u8 = 0x16;
    pub const TITLE_SET: u8 = 0x17;
    pub const TITLE_GET: u8 = 0x18;
    pub const GETFWINFO: u8 = 0x1E;

    // Control
    pub const SETBDR: u8 = 0x20;
    pub const ANTIDTRANSLATION: u8 = 0x21;
    pub const LOADSETUP2: u8 = 0x22;
    pub const INVREADCONFIG: u8 = 0x23;
    pub const GETREGIONINFO: u8 = 0x24;
    pub const ANTENNAMAP: u8 = 0x25;
    pub const ANTENNA: u8 = 0x27;
    pub const STORESETUP: u8 = 0x28;
    pub const CUSTOMHOP: u8 = 0x29;
    pub const CUSTOMHOP_EX: u8 = 0x2A;

    // Gen2
    pub const SCANSINGLE: u8 = 0x30;
    pub const INVENTORY: u8 = 0x31;
    pub const INVENTORYSEL: u8 = 0x32;
    pub const READ: u8 = 0x33;
    pub const WRITE: u8 = 0x34;
    pub const BLWRITE: u8 = 0x35;
    pub const LOCK: u8 = 0x36;
    pub const KILL: u8 = 0x37;
    pub const TRACETAG: u8 = 0x38;
    pub const INVENTORYSTREAM: u8 = 0x39;
    pub const RESETTARGET: u8 = 0x3A;
    pub const INVENTORYEX: u8 = 0x3B;
    pub const CUSTREAD: u8 = 0x3C;
    pub const CUSTWRITE: u8 = 0x3D;
    pub const CUSTBLWRITE: u8 = 0x3E;
    pub const CUSTOMEXCHANGE: u8 = 0x3F;
    pub const BLKERASE: u8 = 0x40;
    pub const INVENTORYREAD: u8 = 0x41;
    pub const BLWRITE_EX: u8 = 0x42;
    pub const EPCENUM: u8 = 0x43;
    pub const PERMALOCK: u8 = 0x44;

    // Proprietary
    pub const NXP_RDPROTECT: u8 = 0x50;
    pub const NXP_EAS: u8 = 0x51;
    pub const NXP_EASALARM: u8 = 0x52;
    pub const MZ4_QT: u8 = 0x53;
    pub const NXP_EASALARMSTREAM: u8 = 0x54;
    pub const BLE_EXT: u8 = 0x55;

    // Test
    pub const GETREFPOWER: u8 = 0x60;
    pub const CONTCARR: u8 = 0x61;
    pub const CARRIER: u8 = 0x62;
    pub const SCANCHANNELS: u8 = 0x63;
    pub const RFSETTINGS: u8 = 0x64;
    pub const TUNEANTENNA: u8 = 0x66;
    pub const GETREFPOWEREX: u8 = 0x67;
    pub const SETCHANNEL: u8 = 0x6A;

    // Bootloader
    pub const UNLOCKALL: u8 = 0x70;
    pub const PAGEWRITE: u8 = 0x71;
    pub const PAGEREAD: u8 = 0x72;
    pub const ENTERBOOT: u8 = 0x73;
    pub const APPVALIDATE: u8 = 0x74;
    pub const QUERYCRC: u8 = 0x75;
    pub const PRODUCTION_CFG: u8 = 0x76;
    pub const BLVALIDATE: u8 = 0x77;
    pub const CRYPTOBYPASS: u8 = 0x78;
    pub const SCRATCHDATA: u8 = 0x79;

    // Register
    pub const READREG: u8 = 0x90;
    pub const WRITEREG: u8 = 0x91;
    pub const MAKEPERMANENT: u8 = 0x92;
    pub const WRITELONG: u8 = 0x93;
    pub const REGDUMP: u8 = 0x94;
    pub const GENSETUP: u8 = 0x95;
    pub const READCONT: u8 = 0x96;
    pub const READALL: u8 = 0x97;

    // Ethernet / standalone
    pub const STANDALONE_GET_1: u8 = 0xA0;
    pub const STANDALONE_SET_1: u8 = 0xA1;
    pub const STANDALONE_GET_2: u8 = 0xA2;
    pub const STANDALONE_SET_2: u8 = 0xA3;
    pub const EXTIO: u8 = 0xA4;
    pub const ETHCLOCK: u8 = 0xA5;
    pub const ALLOW_NOTIFY: u8 = 0xA6;
    pub const GET_HCR: u8 = 0xA7;
    pub const GET_BUFFEREDDATA: u8 = 0xA8;
    pub const ACK_BUFFEREDDATA: u8 = 0xA9;
}

/// Notification ids carried by unsolicited packets
pub mod notify {
    pub const BOOT: u8 = 0x80;
    pub const IOCHANGE: u8 = 0x81;
    pub const INVENTORY: u8 = 0x82;
    pub const TT_INVENTORY: u8 = 0x83;
    pub const TRACETAG: u8 = 0x84;
    pub const TRIGGERREAD: u8 = 0x85;
    pub const HOPEVENT: u8 = 0x86;
    pub const DEBUGMSG: u8 = 0x87;
    pub const INVENTORYEX: u8 = 0x88;
    pub const NXPALARM: u8 = 0x89;
    pub const EPCENUM: u8 = 0x8A;
    pub const EXTIN: u8 = 0x8B;
    pub const GENERAL: u8 = 0x8C;
    pub const AUTOTUNE: u8 = 0x8D;
    pub const WLAN_SEARCH: u8 = 0x8E;
    pub const AR_NOTIFY: u8 = 0x8F;
    pub const BLE_READER: u8 = 0x90;
}

/// Module status codes carried in the status byte of a response
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const INVALID_COMMAND: u8 = 0x01;
    pub const INVALID_LENGTH: u8 = 0x02;
    pub const PARAMETER_OUT_OF_RANGE: u8 = 0x03;
    pub const RECEIVE_TIMEOUT: u8 = 0x04;
    pub const INVALID_PARAMETER: u8 = 0x05;
    pub const PROGRAM_FAILED: u8 = 0x06;
    pub const PARAMETER_MISMATCH: u8 = 0x07;
    pub const HW_MISMATCH: u8 = 0x08;
    pub const RESERVED1: u8 = 0x09;
    pub const PAGE_PROGRAM: u8 = 0x0A;
    pub const CRC_CHECK: u8 = 0x0B;
    pub const CRC_MISMATCH: u8 = 0x0C;
    pub const NOT_READY: u8 = 0x0D;
    pub const APP_NOT_PRESENT: u8 = 0x0E;
    pub const GENERAL: u8 = 0x10;
    pub const NO_TAG: u8 = 0x20;
    pub const RESP_AIR: u8 = 0x21;
    pub const G2_SELECT: u8 = 0x22;
    pub const MISSING_SELDATA: u8 = 0x23;
    pub const G2_ACCESS: u8 = 0x24;
    pub const G2_READ: u8 = 0x30;
    pub const G2_RD_PART: u8 = 0x31;
    pub const G2_WRITE: u8 = 0x40;
    pub const G2_WR_PART: u8 = 0x41;
    pub const G2_TAG_RESP: u8 = 0x42;
    pub const G2_SPECIAL: u8 = 0x50;
    pub const READER_HW: u8 = 0x60;
}
