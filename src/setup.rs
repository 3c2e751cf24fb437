//! Module setup: a flag-selected, bit-ordered set of configuration members.
//!
//! Each set bit in [`SetupFlags`] marks one member as present. Members are serialized
//! back to back in ascending bit order with no tags, so encode and decode must walk the
//! same table.

use std::ops::{BitOr, BitOrAssign};

use crate::error::NurError;
use crate::response::ByteReader;

/// Number of antennas addressed by the legacy per-antenna arrays
pub const NUR_MAX_ANTENNAS: usize = 4;
/// Number of antennas addressed by the extended per-antenna power array
pub const NUR_MAX_ANTENNAS_EX: usize = 32;

/// Selects which [`ModuleSetup`] members are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupFlags(pub u32);

impl SetupFlags {
    pub const LINKFREQ: Self = Self(1 << 0);
    pub const RXDEC: Self = Self(1 << 1);
    pub const TXLEVEL: Self = Self(1 << 2);
    pub const TXMOD: Self = Self(1 << 3);
    pub const REGION: Self = Self(1 << 4);
    pub const INVQ: Self = Self(1 << 5);
    pub const INVSESSION: Self = Self(1 << 6);
    pub const INVROUNDS: Self = Self(1 << 7);
    pub const ANTMASK: Self = Self(1 << 8);
    pub const SCANSINGLETO: Self = Self(1 << 9);
    pub const INVENTORYTO: Self = Self(1 << 10);
    pub const SELECTEDANT: Self = Self(1 << 11);
    pub const OPFLAGS: Self = Self(1 << 12);
    pub const INVTARGET: Self = Self(1 << 13);
    pub const INVEPCLEN: Self = Self(1 << 14);
    pub const READRSSIFILTER: Self = Self(1 << 15);
    pub const WRITERSSIFILTER: Self = Self(1 << 16);
    pub const INVRSSIFILTER: Self = Self(1 << 17);
    pub const READTIMEOUT: Self = Self(1 << 18);
    pub const WRITETIMEOUT: Self = Self(1 << 19);
    pub const LOCKTIMEOUT: Self = Self(1 << 20);
    pub const KILLTIMEOUT: Self = Self(1 << 21);
    pub const AUTOPERIOD: Self = Self(1 << 22);
    pub const PERANTPOWER: Self = Self(1 << 23);
    pub const PERANTOFFSET: Self = Self(1 << 24);
    pub const ANTMASKEX: Self = Self(1 << 25);
    pub const AUTOTUNE: Self = Self(1 << 26);
    pub const PERANTPOWER_EX: Self = Self(1 << 27);
    pub const RXSENS: Self = Self(1 << 28);
    pub const RFPROFILE: Self = Self(1 << 29);
    pub const TO_SLEEP_TIME: Self = Self(1 << 30);

    pub const ALL: Self = Self((1 << 31) - 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for SetupFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SetupFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Accepted RSSI window in dBm; 0 disables a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RssiFilter {
    pub min: i8,
    pub max: i8,
}

/// Runtime antenna autotune settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutotuneSetup {
    pub mode: u8,
    pub threshold_dbm: i8,
}

/// Module configuration. Only members selected by `flags` are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSetup {
    pub flags: SetupFlags,
    pub link_freq: u32,
    /// Miller coding
    pub rx_decoding: u8,
    pub tx_level: u8,
    pub tx_modulation: u8,
    pub region_id: u8,
    pub inventory_q: u8,
    pub inventory_session: u8,
    pub inventory_rounds: u8,
    pub antenna_mask: u8,
    pub scan_single_trigger_timeout: u16,
    pub inventory_trigger_timeout: u16,
    pub selected_antenna: u8,
    pub op_flags: u32,
    pub inventory_target: u8,
    pub inventory_epc_length: u8,
    pub read_rssi_filter: RssiFilter,
    pub write_rssi_filter: RssiFilter,
    pub inventory_rssi_filter: RssiFilter,
    pub read_timeout: u16,
    pub write_timeout: u16,
    pub lock_timeout: u16,
    pub kill_timeout: u16,
    pub period_setup: u16,
    pub ant_power: [u8; NUR_MAX_ANTENNAS],
    pub power_offset: [i8; NUR_MAX_ANTENNAS],
    pub antenna_mask_ex: u32,
    pub autotune: AutotuneSetup,
    pub ant_power_ex: [i8; NUR_MAX_ANTENNAS_EX],
    pub rx_sensitivity: u8,
    pub rf_profile: u8,
    pub to_sleep_time: u16,
}

impl Default for ModuleSetup {
    fn default() -> Self {
        Self {
            flags: SetupFlags::default(),
            link_freq: 0,
            rx_decoding: 0,
            tx_level: 0,
            tx_modulation: 0,
            region_id: 0,
            inventory_q: 0,
            inventory_session: 0,
            inventory_rounds: 0,
            antenna_mask: 0,
            scan_single_trigger_timeout: 0,
            inventory_trigger_timeout: 0,
            selected_antenna: 0,
            op_flags: 0,
            inventory_target: 0,
            inventory_epc_length: 0,
            read_rssi_filter: RssiFilter::default(),
            write_rssi_filter: RssiFilter::default(),
            inventory_rssi_filter: RssiFilter::default(),
            read_timeout: 0,
            write_timeout: 0,
            lock_timeout: 0,
            kill_timeout: 0,
            period_setup: 0,
            ant_power: [0; NUR_MAX_ANTENNAS],
            power_offset: [0; NUR_MAX_ANTENNAS],
            antenna_mask_ex: 0,
            autotune: AutotuneSetup::default(),
            ant_power_ex: [-1; NUR_MAX_ANTENNAS_EX],
            rx_sensitivity: 0,
            rf_profile: 0,
            to_sleep_time: 0,
        }
    }
}

/// Walks the members in wire order, writing present ones into a buffer
struct Writer<'a> {
    flags: SetupFlags,
    out: &'a mut Vec<u8>,
}

impl Writer<'_> {
    fn put(&mut self, flag: SetupFlags, bytes: &[u8]) {
        if self.flags.contains(flag) {
            self.out.extend_from_slice(bytes);
        }
    }
}

fn i8_bytes<const N: usize>(values: &[i8; N]) -> [u8; N] {
    values.map(|v| v as u8)
}

impl ModuleSetup {
    /// Serialize the flags dword followed by every selected member in bit order
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), NurError> {
        if self.flags.is_empty() {
            return Err(NurError::InvalidParameter("No module setup members selected".into()));
        }

        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        let mut w = Writer { flags: self.flags, out };
        w.put(SetupFlags::LINKFREQ, &self.link_freq.to_le_bytes());
        w.put(SetupFlags::RXDEC, &[self.rx_decoding]);
        w.put(SetupFlags::TXLEVEL, &[self.tx_level]);
        w.put(SetupFlags::TXMOD, &[self.tx_modulation]);
        w.put(SetupFlags::REGION, &[self.region_id]);
        w.put(SetupFlags::INVQ, &[self.inventory_q]);
        w.put(SetupFlags::INVSESSION, &[self.inventory_session]);
        w.put(SetupFlags::INVROUNDS, &[self.inventory_rounds]);
        w.put(SetupFlags::ANTMASK, &[self.antenna_mask]);
        w.put(SetupFlags::SCANSINGLETO, &self.scan_single_trigger_timeout.to_le_bytes());
        w.put(SetupFlags::INVENTORYTO, &self.inventory_trigger_timeout.to_le_bytes());
        w.put(SetupFlags::SELECTEDANT, &[self.selected_antenna]);
        w.put(SetupFlags::OPFLAGS, &self.op_flags.to_le_bytes());
        w.put(SetupFlags::INVTARGET, &[self.inventory_target]);
        w.put(SetupFlags::INVEPCLEN, &[self.inventory_epc_length]);
        for (flag, filter) in [
            (SetupFlags::READRSSIFILTER, self.read_rssi_filter),
            (SetupFlags::WRITERSSIFILTER, self.write_rssi_filter),
            (SetupFlags::INVRSSIFILTER, self.inventory_rssi_filter),
        ] {
            w.put(flag, &[filter.min as u8, filter.max as u8]);
        }
        w.put(SetupFlags::READTIMEOUT, &self.read_timeout.to_le_bytes());
        w.put(SetupFlags::WRITETIMEOUT, &self.write_timeout.to_le_bytes());
        w.put(SetupFlags::LOCKTIMEOUT, &self.lock_timeout.to_le_bytes());
        w.put(SetupFlags::KILLTIMEOUT, &self.kill_timeout.to_le_bytes());
        w.put(SetupFlags::AUTOPERIOD, &self.period_setup.to_le_bytes());
        w.put(SetupFlags::PERANTPOWER, &self.ant_power);
        w.put(SetupFlags::PERANTOFFSET, &i8_bytes(&self.power_offset));
        w.put(SetupFlags::ANTMASKEX, &self.antenna_mask_ex.to_le_bytes());
        w.put(
            SetupFlags::AUTOTUNE,
            &[self.autotune.mode, self.autotune.threshold_dbm as u8],
        );
        w.put(SetupFlags::PERANTPOWER_EX, &i8_bytes(&self.ant_power_ex));
        w.put(SetupFlags::RXSENS, &[self.rx_sensitivity]);
        w.put(SetupFlags::RFPROFILE, &[self.rf_profile]);
        w.put(SetupFlags::TO_SLEEP_TIME, &self.to_sleep_time.to_le_bytes());
        Ok(())
    }

    /// Parse the members selected by `flags` from `data`, which starts after the
    /// response's own flags dword.
    pub fn decode(flags: SetupFlags, data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let mut setup = Self {
            flags,
            ..Self::default()
        };
        let has = |flag: SetupFlags| flags.contains(flag);

        if has(SetupFlags::LINKFREQ) {
            setup.link_freq = r.u32()?;
        }
        if has(SetupFlags::RXDEC) {
            setup.rx_decoding = r.u8()?;
        }
        if has(SetupFlags::TXLEVEL) {
            setup.tx_level = r.u8()?;
        }
        if has(SetupFlags::TXMOD) {
            setup.tx_modulation = r.u8()?;
        }
        if has(SetupFlags::REGION) {
            setup.region_id = r.u8()?;
        }
        if has(SetupFlags::INVQ) {
            setup.inventory_q = r.u8()?;
        }
        if has(SetupFlags::INVSESSION) {
            setup.inventory_session = r.u8()?;
        }
        if has(SetupFlags::INVROUNDS) {
            setup.inventory_rounds = r.u8()?;
        }
        if has(SetupFlags::ANTMASK) {
            setup.antenna_mask = r.u8()?;
        }
        if has(SetupFlags::SCANSINGLETO) {
            setup.scan_single_trigger_timeout = r.u16()?;
        }
        if has(SetupFlags::INVENTORYTO) {
            setup.inventory_trigger_timeout = r.u16()?;
        }
        if has(SetupFlags::SELECTEDANT) {
            setup.selected_antenna = r.u8()?;
        }
        if has(SetupFlags::OPFLAGS) {
            setup.op_flags = r.u32()?;
        }
        if has(SetupFlags::INVTARGET) {
            setup.inventory_target = r.u8()?;
        }
        if has(SetupFlags::INVEPCLEN) {
            setup.inventory_epc_length = r.u8()?;
        }
        if has(SetupFlags::READRSSIFILTER) {
            setup.read_rssi_filter = read_rssi_filter(&mut r)?;
        }
        if has(SetupFlags::WRITERSSIFILTER) {
            setup.write_rssi_filter = read_rssi_filter(&mut r)?;
        }
        if has(SetupFlags::INVRSSIFILTER) {
            setup.inventory_rssi_filter = read_rssi_filter(&mut r)?;
        }
        if has(SetupFlags::READTIMEOUT) {
            setup.read_timeout = r.u16()?;
        }
        if has(SetupFlags::WRITETIMEOUT) {
            setup.write_timeout = r.u16()?;
        }
        if has(SetupFlags::LOCKTIMEOUT) {
            setup.lock_timeout = r.u16()?;
        }
        if has(SetupFlags::KILLTIMEOUT) {
            setup.kill_timeout = r.u16()?;
        }
        if has(SetupFlags::AUTOPERIOD) {
            setup.period_setup = r.u16()?;
        }
        if has(SetupFlags::PERANTPOWER) {
            setup.ant_power = r.array()?;
        }
        if has(SetupFlags::PERANTOFFSET) {
            setup.power_offset = r.array::<NUR_MAX_ANTENNAS>()?.map(|b| b as i8);
        }
        if has(SetupFlags::ANTMASKEX) {
            setup.antenna_mask_ex = r.u32()?;
        }
        if has(SetupFlags::AUTOTUNE) {
            setup.autotune = AutotuneSetup {
                mode: r.u8()?,
                threshold_dbm: r.i8()?,
            };
        }
        if has(SetupFlags::PERANTPOWER_EX) {
            setup.ant_power_ex = r.array::<NUR_MAX_ANTENNAS_EX>()?.map(|b| b as i8);
        }
        if has(SetupFlags::RXSENS) {
            setup.rx_sensitivity = r.u8()?;
        }
        if has(SetupFlags::RFPROFILE) {
            setup.rf_profile = r.u8()?;
        }
        if has(SetupFlags::TO_SLEEP_TIME) {
            setup.to_sleep_time = r.u16()?;
        }

        Ok(setup)
    }
}

fn read_rssi_filter(r: &mut ByteReader<'_>) -> Result<RssiFilter, NurError> {
    Ok(RssiFilter {
        min: r.i8()?,
        max: r.i8()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linkfreq_then_txlevel_order() {
        let setup = ModuleSetup {
            flags: SetupFlags::LINKFREQ | SetupFlags::TXLEVEL,
            link_freq: 256_000,
            tx_level: 7,
            ..Default::default()
        };

        let mut out = Vec::new();
        setup.encode(&mut out).unwrap();
        assert_eq!(&out[..4], &0b101u32.to_le_bytes());
        assert_eq!(&out[4..8], &256_000u32.to_le_bytes());
        assert_eq!(out[8], 7);
        assert_eq!(out.len(), 9);

        let decoded = ModuleSetup::decode(setup.flags, &out[4..]).unwrap();
        assert_eq!(decoded.link_freq, 256_000);
        assert_eq!(decoded.tx_level, 7);
        assert_eq!(decoded, setup);
    }

    #[test]
    fn test_empty_flags_rejected() {
        let mut out = Vec::new();
        let result = ModuleSetup::default().encode(&mut out);
        assert!(matches!(result, Err(NurError::InvalidParameter(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_full_setup_round_trip() {
        let mut setup = ModuleSetup {
            flags: SetupFlags::ALL,
            link_freq: 160_000,
            rx_decoding: 2,
            tx_level: 3,
            region_id: 1,
            inventory_q: 4,
            scan_single_trigger_timeout: 500,
            op_flags: 0xDEAD_BEEF,
            read_rssi_filter: RssiFilter { min: -70, max: -20 },
            period_setup: 2,
            antenna_mask_ex: 0x30300,
            autotune: AutotuneSetup { mode: 3, threshold_dbm: -10 },
            rf_profile: 1,
            to_sleep_time: 1200,
            ..Default::default()
        };
        setup.power_offset[0] = -1;
        setup.ant_power_ex[5] = 19;

        let mut out = Vec::new();
        setup.encode(&mut out).unwrap();
        // flags + fixed members
        assert_eq!(out.len(), 4 + 89);

        let decoded = ModuleSetup::decode(SetupFlags::ALL, &out[4..]).unwrap();
        assert_eq!(decoded, setup);
    }

    #[test]
    fn test_decode_truncated() {
        let result = ModuleSetup::decode(SetupFlags::LINKFREQ | SetupFlags::TXLEVEL, &[0, 0, 0, 0]);
        assert!(matches!(result, Err(NurError::InvalidResponse(_))));
    }

    #[test]
    fn test_flags_ops() {
        let mut flags = SetupFlags::TXLEVEL;
        flags |= SetupFlags::REGION;
        assert!(flags.contains(SetupFlags::REGION));
        assert!(!flags.contains(SetupFlags::LINKFREQ));
        assert!(SetupFlags::ALL.contains(SetupFlags::TO_SLEEP_TIME));
        assert!(SetupFlags(1 << 31).is_empty());
    }
}
