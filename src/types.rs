//! Parameter types for tag and module operations

use crate::error::NurError;
use crate::protocol::{NUR_MAX_GPIO, NUR_MAX_SELMASKBITS, rw};

/// Gen2 memory banks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBank {
    /// Kill and access passwords
    Passwd = 0,
    Epc = 1,
    Tid = 2,
    User = 3,
}

impl MemoryBank {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Passwd),
            1 => Some(Self::Epc),
            2 => Some(Self::Tid),
            3 => Some(Self::User),
            _ => None,
        }
    }
}

/// Bytes needed to hold `bits` mask bits
pub(crate) fn mask_bytes(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Selects which tag a singulated command addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Singulation {
    pub bank: MemoryBank,
    /// Bit address of the mask; addresses above `u32::MAX` use the extended encoding
    pub address: u64,
    pub mask_bits: u16,
    pub mask: Vec<u8>,
}

impl Singulation {
    /// Match the full EPC starting after the CRC and PC words
    pub fn by_epc(epc: &[u8]) -> Self {
        Self {
            bank: MemoryBank::Epc,
            address: 32,
            mask_bits: (epc.len() * 8) as u16,
            mask: epc.to_vec(),
        }
    }

    fn is_extended(&self) -> bool {
        self.address > u32::MAX as u64
    }

    fn validate(&self) -> Result<(), NurError> {
        let bits = self.mask_bits as usize;
        if bits > NUR_MAX_SELMASKBITS {
            return Err(NurError::InvalidParameter(format!(
                "Select mask of {} bits exceeds {} bits",
                bits, NUR_MAX_SELMASKBITS
            )));
        }
        if self.mask.len() < mask_bytes(bits) {
            return Err(NurError::InvalidParameter(format!(
                "Select mask has {} bytes, {} bits need {}",
                self.mask.len(),
                bits,
                mask_bytes(bits)
            )));
        }
        Ok(())
    }
}

/// Password and singulation shared by read, write, lock, kill and permalock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAccess {
    /// Access (or kill) password; `None` sends an unsecured command
    pub password: Option<u32>,
    /// `None` addresses whichever tag answers
    pub singulation: Option<Singulation>,
}

impl TagAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: u32) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_singulation(mut self, singulation: Singulation) -> Self {
        self.singulation = Some(singulation);
        self
    }

    /// Singulate by EPC
    pub fn by_epc(epc: &[u8]) -> Self {
        Self::new().with_singulation(Singulation::by_epc(epc))
    }

    /// Append the flags byte, password and optional singulation block.
    ///
    /// `extra_flags` carries bits owned by the operation block that follows (for example
    /// the extended read/write address).
    pub(crate) fn encode(&self, extra_flags: u8, out: &mut Vec<u8>) -> Result<(), NurError> {
        let mut flags = extra_flags;
        if self.password.is_some() {
            flags |= rw::SEC;
        }
        if let Some(sb) = &self.singulation {
            sb.validate()?;
            flags |= rw::SBP;
            if sb.is_extended() {
                flags |= rw::EA1;
            }
        }

        out.push(flags);
        out.extend_from_slice(&self.password.unwrap_or(0).to_le_bytes());

        if let Some(sb) = &self.singulation {
            let header_len = if sb.is_extended() { 11 } else { 7 };
            let mask_len = mask_bytes(sb.mask_bits as usize);
            out.push((mask_len + header_len) as u8);
            out.push(sb.bank as u8);
            if sb.is_extended() {
                out.extend_from_slice(&sb.address.to_le_bytes());
            } else {
                out.extend_from_slice(&(sb.address as u32).to_le_bytes());
            }
            out.extend_from_slice(&sb.mask_bits.to_le_bytes());
            out.extend_from_slice(&sb.mask[..mask_len]);
        }
        Ok(())
    }
}

/// Memory areas covered by a Gen2 lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTarget {
    KillPassword,
    AccessPassword,
    Epc,
    Tid,
    User,
}

impl LockTarget {
    fn shift(self) -> u16 {
        match self {
            Self::KillPassword => 8,
            Self::AccessPassword => 6,
            Self::Epc => 4,
            Self::Tid => 2,
            Self::User => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    /// Writable without password
    Open,
    /// Permanently writable
    PermaOpen,
    /// Writable only in the secured state
    Secured,
    /// Permanently locked
    PermaLock,
}

impl LockAction {
    fn bits(self) -> u16 {
        match self {
            Self::Open => 0b00,
            Self::PermaOpen => 0b01,
            Self::Secured => 0b10,
            Self::PermaLock => 0b11,
        }
    }
}

/// Raw 10-bit mask and action fields of a Gen2 lock command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockPayload {
    pub mask: u16,
    pub action: u16,
}

impl LockPayload {
    pub fn new(targets: &[LockTarget], action: LockAction) -> Self {
        targets.iter().fold(Self::default(), |payload, target| {
            let shift = target.shift();
            Self {
                mask: payload.mask | (0b11 << shift),
                action: payload.action | (action.bits() << shift),
            }
        })
    }
}

/// Block permalock parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermalockBlock {
    /// 1 to lock, 0 to read the lock state
    pub lock: u8,
    pub bank: MemoryBank,
    /// First block, in mask-word units
    pub address: u32,
    /// One mask word per 16 blocks
    pub masks: Vec<u16>,
}

impl PermalockBlock {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), NurError> {
        if self.masks.is_empty() || self.masks.len() > 255 {
            return Err(NurError::InvalidParameter(
                "Permalock range must be 1..=255 mask words".into(),
            ));
        }
        out.push(self.lock);
        out.push(self.bank as u8);
        out.extend_from_slice(&self.address.to_le_bytes());
        out.push(self.masks.len() as u8);
        for mask in &self.masks {
            out.extend_from_slice(&mask.to_le_bytes());
        }
        Ok(())
    }
}

/// Parameters of a plain inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryParams {
    pub q: u8,
    pub session: u8,
    pub rounds: u8,
}

/// Select filter applied before an extended inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryFilter {
    pub truncate: u8,
    pub target: u8,
    pub action: u8,
    pub bank: MemoryBank,
    pub address: u32,
    pub mask_bits: u8,
    pub mask: Vec<u8>,
}

/// Parameters of an extended inventory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryExParams {
    pub flags: u8,
    pub q: u8,
    pub session: u8,
    pub rounds: u8,
    pub transit_time: u16,
    pub inventory_target: u8,
    pub inventory_sel_state: u8,
    pub filters: Vec<InventoryFilter>,
}

impl InventoryExParams {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), NurError> {
        if self.filters.len() > crate::protocol::NUR_MAX_FILTERS {
            return Err(NurError::InvalidParameter(format!(
                "At most {} inventory filters are supported",
                crate::protocol::NUR_MAX_FILTERS
            )));
        }

        out.push(self.flags);
        out.push(self.q);
        out.push(self.session);
        out.push(self.rounds);
        out.extend_from_slice(&self.transit_time.to_le_bytes());
        out.push(self.inventory_target);
        out.push(self.inventory_sel_state);
        out.push(self.filters.len() as u8);

        for filter in &self.filters {
            let mask_len = mask_bytes(filter.mask_bits as usize);
            if filter.mask.len() < mask_len {
                return Err(NurError::InvalidParameter(format!(
                    "Filter mask has {} bytes, {} bits need {}",
                    filter.mask.len(),
                    filter.mask_bits,
                    mask_len
                )));
            }
            out.push(filter.truncate);
            out.push(filter.target);
            out.push(filter.action);
            out.push(filter.bank as u8);
            out.extend_from_slice(&filter.address.to_le_bytes());
            out.push(filter.mask_bits);
            out.extend_from_slice(&filter.mask[..mask_len]);
        }
        Ok(())
    }
}

/// Inventory + read configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrConfig {
    pub active: bool,
    /// 0 = EPC + data, 1 = data only
    pub ir_type: u8,
    pub bank: u8,
    pub word_address: u32,
    pub word_count: u8,
}

impl IrConfig {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.active as u8);
        // An inactive configuration is a single byte
        if self.active {
            out.push(self.ir_type);
            out.push(self.bank);
            out.extend_from_slice(&self.word_address.to_le_bytes());
            out.push(self.word_count);
        }
    }
}

/// Trace tag parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceTagParams {
    /// Trace flags; the extended address bit is set automatically
    pub flags: u8,
    pub bank: MemoryBank,
    pub address: u64,
    pub mask_bits: u8,
    pub mask: Vec<u8>,
}

impl TraceTagParams {
    pub fn by_epc(epc: &[u8]) -> Self {
        Self {
            flags: 0,
            bank: MemoryBank::Epc,
            address: 32,
            mask_bits: (epc.len() * 8).min(u8::MAX as usize) as u8,
            mask: epc.to_vec(),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), NurError> {
        let mask_len = mask_bytes(self.mask_bits as usize);
        if self.mask.len() < mask_len {
            return Err(NurError::InvalidParameter("Trace mask shorter than its bit length".into()));
        }

        let extended = self.address > u32::MAX as u64;
        out.push(if extended { self.flags | rw::EA1 } else { self.flags });
        out.push(self.bank as u8);
        if extended {
            out.extend_from_slice(&self.address.to_le_bytes());
        } else {
            out.extend_from_slice(&(self.address as u32).to_le_bytes());
        }
        out.push(self.mask_bits);
        out.extend_from_slice(&self.mask[..mask_len]);
        Ok(())
    }
}

/// Configuration of a single GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpioSetup {
    pub enabled: bool,
    pub gpio_type: u8,
    pub edge: u8,
    pub action: u8,
}

/// GPIO configuration; `None` pins are left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpioConfig {
    pub pins: [Option<GpioSetup>; NUR_MAX_GPIO],
}

impl GpioConfig {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        let flags = self
            .pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| pin.is_some())
            .fold(0u8, |acc, (i, _)| acc | (1 << i));
        out.push(flags);
        for setup in self.pins.iter().flatten() {
            out.extend_from_slice(&[setup.enabled as u8, setup.gpio_type, setup.edge, setup.action]);
        }
    }
}

/// Custom frequency hopping table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomHoptable {
    /// Channel time in milliseconds
    pub channel_time: u32,
    /// Silent time between channels in milliseconds
    pub silent_time: u32,
    /// Maximum backscatter link frequency
    pub max_blf: u32,
    /// 1 = 12.5 us, 2 = 25 us
    pub tari: u32,
    /// Listen-before-talk threshold in dBm
    pub lbt_threshold: i32,
    pub max_tx_level: u32,
    /// Frequencies in kHz
    pub frequencies: Vec<u32>,
}

impl CustomHoptable {
    pub(crate) fn validate(&self) -> Result<(), NurError> {
        let count = self.frequencies.len();
        if count == 0 || count > crate::protocol::NUR_MAX_CUSTOM_FREQS {
            return Err(NurError::InvalidParameter(format!(
                "Hop table needs 1..={} frequencies, got {}",
                crate::protocol::NUR_MAX_CUSTOM_FREQS,
                count
            )));
        }
        if self.silent_time > 1000 {
            return Err(NurError::InvalidParameter("Silent time above 1000 ms".into()));
        }
        if !matches!(self.max_blf, 160_000 | 256_000 | 320_000) {
            return Err(NurError::InvalidParameter(format!("Unsupported BLF {}", self.max_blf)));
        }
        if !matches!(self.tari, 1 | 2) {
            return Err(NurError::InvalidParameter(format!("Unsupported Tari {}", self.tari)));
        }
        if self.max_tx_level > 19 {
            return Err(NurError::InvalidParameter("TX level above 19".into()));
        }
        if self.lbt_threshold < -90 {
            return Err(NurError::InvalidParameter("LBT threshold below -90 dBm".into()));
        }
        Ok(())
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.frequencies.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.channel_time.to_le_bytes());
        out.extend_from_slice(&self.silent_time.to_le_bytes());
        out.extend_from_slice(&self.max_blf.to_le_bytes());
        out.extend_from_slice(&self.tari.to_le_bytes());
        out.extend_from_slice(&self.lbt_threshold.to_le_bytes());
        out.extend_from_slice(&self.max_tx_level.to_le_bytes());
        for freq in &self.frequencies {
            out.extend_from_slice(&freq.to_le_bytes());
        }
    }
}

/// Convert bytes to uppercase hex string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_without_singulation() {
        let mut out = Vec::new();
        TagAccess::new().encode(0, &mut out).unwrap();
        assert_eq!(out, [0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_access_with_password_and_epc() {
        let epc = [0xE2, 0x00, 0x12, 0x34];
        let mut out = Vec::new();
        TagAccess::by_epc(&epc)
            .with_password(0x1122_3344)
            .encode(0, &mut out)
            .unwrap();

        assert_eq!(out[0], rw::SEC | rw::SBP);
        assert_eq!(&out[1..5], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(out[5], 7 + 4); // bytes to follow
        assert_eq!(out[6], MemoryBank::Epc as u8);
        assert_eq!(&out[7..11], &32u32.to_le_bytes());
        assert_eq!(&out[11..13], &32u16.to_le_bytes());
        assert_eq!(&out[13..], &epc);
    }

    #[test]
    fn test_access_partial_mask_bits() {
        let sb = Singulation {
            bank: MemoryBank::Tid,
            address: 0,
            mask_bits: 12,
            mask: vec![0xE2, 0x80, 0xFF],
        };
        let mut out = Vec::new();
        TagAccess::new().with_singulation(sb).encode(rw::EA2, &mut out).unwrap();

        assert_eq!(out[0], rw::SBP | rw::EA2);
        assert_eq!(out[5], 7 + 2);
        assert_eq!(&out[13..], &[0xE2, 0x80]);
    }

    #[test]
    fn test_access_extended_address() {
        let sb = Singulation {
            bank: MemoryBank::User,
            address: 0x1_0000_0000,
            mask_bits: 8,
            mask: vec![0xAA],
        };
        let mut out = Vec::new();
        TagAccess::new().with_singulation(sb).encode(0, &mut out).unwrap();

        assert_eq!(out[0], rw::SBP | rw::EA1);
        assert_eq!(out[5], 11 + 1);
        assert_eq!(&out[7..15], &0x1_0000_0000u64.to_le_bytes());
    }

    #[test]
    fn test_access_rejects_long_mask() {
        let sb = Singulation {
            bank: MemoryBank::Epc,
            address: 32,
            mask_bits: 497,
            mask: vec![0; 63],
        };
        let mut out = Vec::new();
        let result = TagAccess::new().with_singulation(sb).encode(0, &mut out);
        assert!(matches!(result, Err(NurError::InvalidParameter(_))));
    }

    #[test]
    fn test_lock_payload() {
        let payload = LockPayload::new(&[LockTarget::Epc], LockAction::Secured);
        assert_eq!(payload.mask, 0b00_00_11_00_00);
        assert_eq!(payload.action, 0b00_00_10_00_00);

        let payload = LockPayload::new(
            &[LockTarget::KillPassword, LockTarget::AccessPassword],
            LockAction::PermaLock,
        );
        assert_eq!(payload.mask, 0b11_11_00_00_00);
        assert_eq!(payload.action, 0b11_11_00_00_00);
    }

    #[test]
    fn test_inventory_ex_filter_encoding() {
        let params = InventoryExParams {
            q: 4,
            session: 1,
            rounds: 2,
            transit_time: 0x0102,
            filters: vec![InventoryFilter {
                truncate: 0,
                target: 4,
                action: 0,
                bank: MemoryBank::Epc,
                address: 32,
                mask_bits: 12,
                mask: vec![0x30, 0x08],
            }],
            ..Default::default()
        };
        let mut out = Vec::new();
        params.encode(&mut out).unwrap();

        assert_eq!(&out[..9], &[0, 4, 1, 2, 0x02, 0x01, 0, 0, 1]);
        assert_eq!(out.len(), 9 + 9 + 2);
        assert_eq!(&out[9..13], &[0, 4, 0, 1]);
        assert_eq!(&out[13..17], &32u32.to_le_bytes());
        assert_eq!(&out[17..], &[12, 0x30, 0x08]);
    }

    #[test]
    fn test_ir_config_inactive_is_one_byte() {
        let mut out = Vec::new();
        IrConfig::default().encode(&mut out);
        assert_eq!(out, [0]);

        let mut out = Vec::new();
        IrConfig {
            active: true,
            ir_type: 0,
            bank: 2,
            word_address: 0,
            word_count: 6,
        }
        .encode(&mut out);
        assert_eq!(out, [1, 0, 2, 0, 0, 0, 0, 6]);
    }

    #[test]
    fn test_gpio_config_encoding() {
        let mut config = GpioConfig::default();
        config.pins[0] = Some(GpioSetup {
            enabled: true,
            gpio_type: 1,
            edge: 2,
            action: 3,
        });
        config.pins[2] = Some(GpioSetup::default());

        let mut out = Vec::new();
        config.encode(&mut out);
        assert_eq!(out, [0b101, 1, 1, 2, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn test_custom_hoptable_validation() {
        let table = CustomHoptable {
            channel_time: 400,
            silent_time: 0,
            max_blf: 256_000,
            tari: 1,
            lbt_threshold: -74,
            max_tx_level: 0,
            frequencies: vec![865_700, 866_300],
        };
        assert!(table.validate().is_ok());

        let mut out = Vec::new();
        table.encode(&mut out);
        assert_eq!(out.len(), 7 * 4 + 2 * 4);
        assert_eq!(&out[..4], &2u32.to_le_bytes());

        let bad = CustomHoptable { max_blf: 100_000, ..table.clone() };
        assert!(bad.validate().is_err());
        let bad = CustomHoptable { frequencies: vec![], ..table };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xE2, 0x00, 0x0A]), "E2000A");
    }
}
