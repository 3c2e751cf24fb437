//! Typed views of module responses and notifications.
//!
//! Every decoder copies fields out of the packet, so decoded values outlive the receive
//! buffer they came from.

use log::debug;

use crate::assembler::Packet;
use crate::error::NurError;
use crate::protocol::{NR_TUNEBANDS, NUR_MAX_CUSTOM_FREQS, NUR_MAX_GPIO, NUR_READERINFO_VERSION1, cmd, notify};
use crate::reader::check_status;
use crate::setup::{ModuleSetup, SetupFlags};
use crate::types::{CustomHoptable, GpioConfig, GpioSetup, IrConfig};

/// Little-endian cursor over a response payload
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], NurError> {
        if self.remaining() < n {
            return Err(NurError::InvalidResponse(format!(
                "response truncated at offset {} (need {} bytes, have {})",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], NurError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    pub(crate) fn u8(&mut self) -> Result<u8, NurError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn i8(&mut self) -> Result<i8, NurError> {
        Ok(self.u8()? as i8)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, NurError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, NurError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, NurError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Length-prefixed string
    pub(crate) fn string8(&mut self) -> Result<String, NurError> {
        let len = self.u8()? as usize;
        Ok(text(self.bytes(len)?))
    }
}

/// Module strings are not NUL-terminated on the wire, but some firmware pads them
pub(crate) fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}-{}", self.major, self.minor, self.build as char)
    }
}

/// Firmware versions reported by VERSIONEX
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    /// 'A' when the application runs, 'B' in the bootloader
    pub mode: char,
    /// Version of the running image
    pub primary: Version,
    /// Version of the other image (bootloader when in application mode)
    pub secondary: Version,
}

impl Versions {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let mode = r.u8()? as char;
        let mut version = || -> Result<Version, NurError> {
            Ok(Version {
                major: r.u8()?,
                minor: r.u8()?,
                build: r.u8()?,
            })
        };
        let primary = version()?;
        let secondary = version()?;
        Ok(Self { mode, primary, secondary })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderInfo {
    /// 1 for modules that predate the versioned layout
    pub version: u32,
    pub serial: String,
    pub alt_serial: String,
    pub name: String,
    pub fcc_id: String,
    pub hw_version: String,
    pub sw_version: Version,
    pub num_gpio: u8,
    pub num_sensors: u8,
    pub num_regions: u8,
    pub num_antennas: u8,
    pub max_antennas: u8,
}

impl ReaderInfo {
    /// Decode a reader info block.
    ///
    /// Versioned responses start with the magic dword and carry an alternate serial.
    /// Older ones start directly at the serial length byte.
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let versioned = data.len() >= 4
            && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == NUR_READERINFO_VERSION1;

        let mut info = Self::default();
        if versioned {
            info.version = r.u32()?;
        } else {
            debug!("Reader info without version magic");
            info.version = 1;
        }

        info.serial = r.string8()?;
        if versioned {
            info.alt_serial = r.string8()?;
        }
        info.name = r.string8()?;
        info.fcc_id = r.string8()?;
        info.hw_version = r.string8()?;
        info.sw_version = Version {
            major: r.u8()?,
            minor: r.u8()?,
            build: r.u8()?,
        };
        info.num_gpio = r.u8()?;
        info.num_sensors = r.u8()?;
        info.num_regions = r.u8()?;
        info.num_antennas = r.u8()?;
        // Added in later firmware
        info.max_antennas = if r.remaining() > 0 { r.u8()? } else { info.num_antennas };
        Ok(info)
    }
}

/// Fixed part of the 128-byte device capabilities block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    pub size: u32,
    pub flag_set1: u32,
    pub flag_set2: u32,
    pub max_tx_dbm: i32,
    pub tx_attn_step: i32,
    pub max_tx_mw: u16,
    pub tx_steps: u16,
    pub tag_buffer_size: u16,
    pub max_antennas: u16,
    pub max_gpio: u16,
    pub chip_version: u16,
    pub module_type: u16,
    pub module_config_flags: u32,
}

impl DeviceCaps {
    pub const SIZE: usize = 128;

    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            size: r.u32()?,
            flag_set1: r.u32()?,
            flag_set2: r.u32()?,
            max_tx_dbm: r.i32()?,
            tx_attn_step: r.i32()?,
            max_tx_mw: r.u16()?,
            tx_steps: r.u16()?,
            tag_buffer_size: r.u16()?,
            max_antennas: r.u16()?,
            max_gpio: r.u16()?,
            chip_version: r.u16()?,
            module_type: r.u16()?,
            module_config_flags: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub region_id: u8,
    pub base_freq_khz: u32,
    pub channel_spacing_khz: u32,
    pub channel_count: u8,
    pub channel_time_ms: u32,
    pub name: String,
}

impl RegionInfo {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            region_id: r.u8()?,
            base_freq_khz: r.u32()?,
            channel_spacing_khz: r.u32()?,
            channel_count: r.u8()?,
            channel_time_ms: r.u32()?,
            name: r.string8()?,
        })
    }
}

/// Summary returned by INVENTORY and INVENTORYEX
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryResponse {
    pub num_tags_found: u16,
    pub num_tags_mem: u16,
    pub rounds_done: u8,
    pub collisions: u16,
    pub q: u8,
}

impl InventoryResponse {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            num_tags_found: r.u16()?,
            num_tags_mem: r.u16()?,
            rounds_done: r.u8()?,
            collisions: r.u16()?,
            q: r.u8()?,
        })
    }
}

const XPC_W1_MASK: u16 = 0x0200;
const XPC_EXT_MASK: u16 = 0x8000;
/// rssi, scaled rssi, timestamp, frequency, data length, pc, channel
const META_PREFIX_IR: usize = 12;

/// One entry from the module's tag buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagEntry {
    pub rssi: i8,
    pub scaled_rssi: u8,
    pub timestamp: u16,
    pub frequency: u32,
    pub pc: u16,
    pub channel: u8,
    pub antenna_id: u8,
    pub epc: Vec<u8>,
    /// Inventory + read data, empty unless the buffer carried IR data
    pub data: Vec<u8>,
    pub xpc_w1: Option<u16>,
    pub xpc_w2: Option<u16>,
}

impl TagEntry {
    /// Move XPC words from the front of the EPC into `xpc_w1`/`xpc_w2`.
    ///
    /// Returns how many words were extracted. Only meaningful for entries read with
    /// metadata, since the PC word decides whether an XPC is present.
    pub fn extract_xpc(&mut self) -> usize {
        if self.pc & XPC_W1_MASK == 0 || self.epc.len() < 2 {
            return 0;
        }

        let w1 = u16::from_be_bytes([self.epc[0], self.epc[1]]);
        self.epc.drain(..2);
        self.xpc_w1 = Some(w1);

        if w1 & XPC_EXT_MASK != 0 && self.epc.len() >= 2 {
            self.xpc_w2 = Some(u16::from_be_bytes([self.epc[0], self.epc[1]]));
            self.epc.drain(..2);
            return 2;
        }
        1
    }

    pub fn epc_hex(&self) -> String {
        crate::types::bytes_to_hex(&self.epc)
    }
}

/// Parse a tag buffer: length-prefixed blocks, a zero length ends the list.
///
/// IR data implies metadata.
pub fn parse_id_buffer(buffer: &[u8], include_meta: bool, include_ir: bool) -> Result<Vec<TagEntry>, NurError> {
    let include_meta = include_meta || include_ir;
    let mut r = ByteReader::new(buffer);
    let mut tags = Vec::new();

    while r.remaining() > 0 {
        let block_len = r.u8()? as usize;
        if block_len == 0 {
            break;
        }

        let mut block = ByteReader::new(r.bytes(block_len)?);
        let mut entry = TagEntry::default();
        let mut data_len = 0usize;

        if include_meta {
            entry.rssi = block.i8()?;
            entry.scaled_rssi = block.u8()?;
            entry.timestamp = block.u16()?;
            entry.frequency = block.u32()?;
            if include_ir {
                data_len = block.u8()? as usize;
            }
            entry.pc = block.u16()?;
            entry.channel = block.u8()?;
        }
        entry.antenna_id = block.u8()?;

        let rest = block.rest();
        if data_len > rest.len() {
            return Err(NurError::InvalidResponse(format!(
                "tag block data length {} exceeds block ({} bytes left)",
                data_len,
                rest.len()
            )));
        }
        let (epc, data) = rest.split_at(rest.len() - data_len);
        entry.epc = epc.to_vec();
        entry.data = data.to_vec();
        tags.push(entry);
    }

    debug!("Parsed {} tags from {} bytes", tags.len(), buffer.len());
    Ok(tags)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSingle {
    pub antenna_id: u8,
    pub rssi: i8,
    pub scaled_rssi: u8,
    pub epc: Vec<u8>,
}

impl ScanSingle {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            antenna_id: r.u8()?,
            rssi: r.i8()?,
            scaled_rssi: r.u8()?,
            epc: r.rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceTag {
    pub rssi: i8,
    pub scaled_rssi: u8,
    pub antenna_id: u8,
    pub epc: Vec<u8>,
}

impl TraceTag {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            rssi: r.i8()?,
            scaled_rssi: r.u8()?,
            antenna_id: r.u8()?,
            epc: r.rest().to_vec(),
        })
    }
}

/// Reflected power as raw I/Q parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedPower {
    pub i: i32,
    pub q: i32,
    pub div: i32,
    /// 0 when the module did not report a frequency
    pub freq_khz: u32,
}

impl ReflectedPower {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            i: r.i32()?,
            q: r.i32()?,
            div: r.i32()?,
            freq_khz: if r.remaining() >= 4 { r.u32()? } else { 0 },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TuneBand {
    pub i: i32,
    pub q: i32,
    /// Reflected power in dBm * 1000
    pub dbm: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneResult {
    pub antenna: i32,
    pub bands: [TuneBand; NR_TUNEBANDS],
}

impl TuneResult {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let antenna = r.i32()?;
        // reserved
        r.bytes(3 * 4)?;
        let mut bands = [TuneBand::default(); NR_TUNEBANDS];
        for band in bands.iter_mut() {
            *band = TuneBand {
                i: r.i32()?,
                q: r.i32()?,
                dbm: r.i32()?,
            };
        }
        Ok(Self { antenna, bands })
    }

    pub fn dbm_results(&self) -> [i32; NR_TUNEBANDS] {
        self.bands.map(|band| band.dbm)
    }
}

/// State of one GPIO pin as returned by GETGPIO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioState {
    pub number: u8,
    pub enabled: bool,
    pub gpio_type: u8,
    pub state: bool,
}

/// Pin/state pair echoed by SETGPIO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPinState {
    pub number: u8,
    pub state: bool,
}

fn mask_count(mask: u8) -> usize {
    (mask & ((1 << NUR_MAX_GPIO) - 1)).count_ones() as usize
}

pub(crate) fn decode_gpio_get(data: &[u8]) -> Result<Vec<GpioState>, NurError> {
    let mut r = ByteReader::new(data);
    let mask = r.u8()?;
    (0..mask_count(mask))
        .map(|_| {
            Ok(GpioState {
                number: r.u8()?,
                enabled: r.u8()? != 0,
                gpio_type: r.u8()?,
                state: r.u8()? != 0,
            })
        })
        .collect()
}

pub(crate) fn decode_gpio_set(data: &[u8]) -> Result<Vec<GpioPinState>, NurError> {
    let mut r = ByteReader::new(data);
    let mask = r.u8()?;
    (0..mask_count(mask))
        .map(|_| {
            Ok(GpioPinState {
                number: r.u8()?,
                state: r.u8()? != 0,
            })
        })
        .collect()
}

impl GpioConfig {
    /// Setups follow the flags byte in ascending pin order, one per set bit
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let flags = r.u8()?;
        let mut config = Self::default();
        for (pin, slot) in config.pins.iter_mut().enumerate() {
            if flags & (1 << pin) != 0 {
                *slot = Some(GpioSetup {
                    enabled: r.u8()? != 0,
                    gpio_type: r.u8()?,
                    edge: r.u8()?,
                    action: r.u8()?,
                });
            }
        }
        Ok(config)
    }
}

impl IrConfig {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let active = r.u8()? != 0;
        if r.remaining() == 0 {
            return Ok(Self { active, ..Self::default() });
        }
        Ok(Self {
            active,
            ir_type: r.u8()?,
            bank: r.u8()?,
            word_address: r.u32()?,
            word_count: r.u8()?,
        })
    }
}

impl CustomHoptable {
    pub fn decode(data: &[u8]) -> Result<Self, NurError> {
        let mut r = ByteReader::new(data);
        let count = r.u32()? as usize;
        if count > NUR_MAX_CUSTOM_FREQS {
            return Err(NurError::InvalidResponse(format!("hop table with {} channels", count)));
        }
        let mut table = Self {
            channel_time: r.u32()?,
            silent_time: r.u32()?,
            max_blf: r.u32()?,
            tari: r.u32()?,
            lbt_threshold: r.i32()?,
            max_tx_level: r.u32()?,
            frequencies: Vec::with_capacity(count),
        };
        for _ in 0..count {
            table.frequencies.push(r.u32()?);
        }
        Ok(table)
    }
}

/// Unsolicited packets pushed by the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Boot(String),
    DebugMessage(String),
    HopEvent {
        hop_table_id: u8,
        freq_idx: u8,
        freq_khz: u32,
    },
    TuneEvent {
        cap1: u8,
        cap2: u8,
        /// dBm * 1000
        reflected_power_dbm: i32,
        antenna: u8,
        freq_khz: u32,
    },
    InventoryStream {
        stopped: bool,
        rounds_done: u8,
        collisions: u16,
        q: u8,
        /// Anything the module appended after the summary
        data: Vec<u8>,
    },
    Other {
        cmd: u8,
        data: Vec<u8>,
    },
}

impl Notification {
    pub fn decode(packet: &Packet<'_>) -> Result<Self, NurError> {
        let mut r = ByteReader::new(packet.data);
        let notification = match packet.cmd {
            notify::BOOT => Self::Boot(text(packet.data)),
            notify::DEBUGMSG => Self::DebugMessage(text(packet.data)),
            notify::HOPEVENT => Self::HopEvent {
                hop_table_id: r.u8()?,
                freq_idx: r.u8()?,
                freq_khz: r.u32()?,
            },
            notify::AUTOTUNE => Self::TuneEvent {
                cap1: r.u8()?,
                cap2: r.u8()?,
                reflected_power_dbm: r.i32()?,
                antenna: r.u8()?,
                freq_khz: r.u32()?,
            },
            notify::INVENTORY => Self::InventoryStream {
                stopped: r.u8()? != 0,
                rounds_done: r.u8()?,
                collisions: r.u16()?,
                q: r.u8()?,
                data: r.rest().to_vec(),
            },
            other => Self::Other {
                cmd: other,
                data: packet.data.to_vec(),
            },
        };
        Ok(notification)
    }
}

/// Decoded response, keyed by command id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ping,
    Versions(Versions),
    ReaderInfo(ReaderInfo),
    DeviceCaps(DeviceCaps),
    RegionInfo(RegionInfo),
    ModuleSetup(ModuleSetup),
    Inventory(InventoryResponse),
    IdBuffer(Vec<TagEntry>),
    ScanSingle(ScanSingle),
    TraceTag(TraceTag),
    Read(Vec<u8>),
    ReflectedPower(ReflectedPower),
    TuneAntenna(TuneResult),
    GpioConfig(GpioConfig),
    GpioSet(Vec<GpioPinState>),
    GpioGet(Vec<GpioState>),
    IrConfig(IrConfig),
    CustomHoptable(CustomHoptable),
    Mode(char),
    Baudrate(u8),
    FirmwareInfo(String),
    Notification(Notification),
    Raw { cmd: u8, data: Vec<u8> },
}

impl Response {
    /// Decode a packet by its command id.
    ///
    /// Unsolicited packets become [`Response::Notification`]. A failed status is returned
    /// as the matching error; commands whose data carries no structure fall back to
    /// [`Response::Raw`].
    pub fn interpret(packet: &Packet<'_>) -> Result<Self, NurError> {
        if packet.is_unsolicited() {
            return Notification::decode(packet).map(Self::Notification);
        }
        check_status(packet)?;

        let data = packet.data;
        let response = match packet.cmd {
            cmd::PING => Self::Ping,
            cmd::VERSIONEX => Self::Versions(Versions::decode(data)?),
            cmd::GETREADERINFO => Self::ReaderInfo(ReaderInfo::decode(data)?),
            cmd::DEVCAPS => Self::DeviceCaps(DeviceCaps::decode(data)?),
            cmd::GETREGIONINFO => Self::RegionInfo(RegionInfo::decode(data)?),
            cmd::LOADSETUP2 => {
                let mut r = ByteReader::new(data);
                let flags = SetupFlags(r.u32()?);
                Self::ModuleSetup(ModuleSetup::decode(flags, r.rest())?)
            }
            cmd::INVENTORY | cmd::INVENTORYEX => Self::Inventory(InventoryResponse::decode(data)?),
            cmd::GETIDBUF | cmd::GETMETABUF => Self::IdBuffer(parse_id_buffer(
                data,
                packet.cmd == cmd::GETMETABUF,
                packet.has_ir_data(),
            )?),
            cmd::SCANSINGLE => Self::ScanSingle(ScanSingle::decode(data)?),
            cmd::TRACETAG => Self::TraceTag(TraceTag::decode(data)?),
            cmd::READ => Self::Read(data.to_vec()),
            cmd::GETREFPOWEREX => Self::ReflectedPower(ReflectedPower::decode(data)?),
            cmd::TUNEANTENNA => Self::TuneAntenna(TuneResult::decode(data)?),
            cmd::CONFIGGPIO if !data.is_empty() => Self::GpioConfig(GpioConfig::decode(data)?),
            cmd::SETGPIO => Self::GpioSet(decode_gpio_set(data)?),
            cmd::GETGPIO => Self::GpioGet(decode_gpio_get(data)?),
            cmd::INVENTORYREAD if !data.is_empty() => Self::IrConfig(IrConfig::decode(data)?),
            cmd::CUSTOMHOP_EX if !data.is_empty() => Self::CustomHoptable(CustomHoptable::decode(data)?),
            cmd::GETMODE => Self::Mode(ByteReader::new(data).u8()? as char),
            cmd::SETBDR if !data.is_empty() => Self::Baudrate(data[0]),
            cmd::GETFWINFO => Self::FirmwareInfo(text(data)),
            other => Self::Raw {
                cmd: other,
                data: data.to_vec(),
            },
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::PacketAssembler;
    use crate::error::{ModuleStatus, TagError};
    use crate::frame::encode_frame;
    use crate::protocol::{flags, status};

    /// Build a response frame (`status` + `data`) and run `check` on the decoded packet
    fn with_packet<R>(cmd: u8, frame_flags: u16, status: u8, data: &[u8], check: impl FnOnce(&Packet<'_>) -> R) -> R {
        let mut payload = vec![status];
        payload.extend_from_slice(data);
        let frame = encode_frame(cmd, &payload, frame_flags).unwrap();
        let mut assembler = PacketAssembler::new();
        assembler.feed(&frame).unwrap();
        check(&assembler.packet().unwrap())
    }

    fn reader_info_body(serial: &str, alt: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        let push_str = |body: &mut Vec<u8>, s: &str| {
            body.push(s.len() as u8);
            body.extend_from_slice(s.as_bytes());
        };
        push_str(&mut body, serial);
        if let Some(alt) = alt {
            push_str(&mut body, alt);
        }
        push_str(&mut body, "NUR-05WL2");
        push_str(&mut body, "FCC123");
        push_str(&mut body, "1.2");
        body.extend_from_slice(&[5, 12, b'A']);
        body.extend_from_slice(&[4, 0, 16, 1, 2]);
        body
    }

    #[test]
    fn test_reader_info_versioned() {
        let mut data = NUR_READERINFO_VERSION1.to_le_bytes().to_vec();
        data.extend(reader_info_body("SN0001", Some("ALT1")));

        let info = ReaderInfo::decode(&data).unwrap();
        assert_eq!(info.version, NUR_READERINFO_VERSION1);
        assert_eq!(info.serial, "SN0001");
        assert_eq!(info.alt_serial, "ALT1");
        assert_eq!(info.name, "NUR-05WL2");
        assert_eq!(info.fcc_id, "FCC123");
        assert_eq!(info.hw_version, "1.2");
        assert_eq!(info.sw_version, Version { major: 5, minor: 12, build: b'A' });
        assert_eq!(info.num_gpio, 4);
        assert_eq!(info.num_regions, 16);
        assert_eq!(info.num_antennas, 1);
        assert_eq!(info.max_antennas, 2);
    }

    #[test]
    fn test_reader_info_without_magic() {
        let data = reader_info_body("SN0001", None);
        let info = ReaderInfo::decode(&data).unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.serial, "SN0001");
        assert_eq!(info.alt_serial, "");
        assert_eq!(info.name, "NUR-05WL2");
        assert_eq!(info.max_antennas, 2);
    }

    #[test]
    fn test_reader_info_truncated() {
        let data = [6, b'S', b'N'];
        assert!(matches!(ReaderInfo::decode(&data), Err(NurError::InvalidResponse(_))));
    }

    #[test]
    fn test_versions_decode() {
        let versions = Versions::decode(&[b'A', 5, 10, b'B', 4, 1, b'C']).unwrap();
        assert_eq!(versions.mode, 'A');
        assert_eq!(versions.primary.to_string(), "5.10-B");
        assert_eq!(versions.secondary, Version { major: 4, minor: 1, build: b'C' });
    }

    fn tag_block_meta(rssi: i8, pc: u16, antenna: u8, epc: &[u8]) -> Vec<u8> {
        let mut block = vec![rssi as u8, 80];
        block.extend_from_slice(&1234u16.to_le_bytes());
        block.extend_from_slice(&866_900u32.to_le_bytes());
        block.extend_from_slice(&pc.to_le_bytes());
        block.push(3);
        block.push(antenna);
        block.extend_from_slice(epc);
        let mut out = vec![block.len() as u8];
        out.extend(block);
        out
    }

    #[test]
    fn test_id_buffer_epc_only() {
        let buffer = [5, 0, 0xE2, 0x00, 0x11, 0x22, 3, 1, 0xAA, 0xBB];
        let tags = parse_id_buffer(&buffer, false, false).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].antenna_id, 0);
        assert_eq!(tags[0].epc, [0xE2, 0x00, 0x11, 0x22]);
        assert_eq!(tags[1].antenna_id, 1);
        assert_eq!(tags[1].epc, [0xAA, 0xBB]);
        assert!(tags[1].data.is_empty());
    }

    #[test]
    fn test_id_buffer_with_meta() {
        let mut buffer = tag_block_meta(-60, 0x3000, 1, &[1, 2, 3, 4, 5, 6]);
        buffer.extend(tag_block_meta(-45, 0x3000, 0, &[9, 8]));
        buffer.push(0);
        buffer.extend_from_slice(&[0xFF, 0xFF]);

        let tags = parse_id_buffer(&buffer, true, false).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].rssi, -60);
        assert_eq!(tags[0].scaled_rssi, 80);
        assert_eq!(tags[0].timestamp, 1234);
        assert_eq!(tags[0].frequency, 866_900);
        assert_eq!(tags[0].pc, 0x3000);
        assert_eq!(tags[0].channel, 3);
        assert_eq!(tags[0].antenna_id, 1);
        assert_eq!(tags[0].epc, [1, 2, 3, 4, 5, 6]);
        assert_eq!(tags[1].rssi, -45);
        assert_eq!(tags[1].epc, [9, 8]);
    }

    #[test]
    fn test_id_buffer_with_ir_data() {
        let mut block = vec![0xC4, 70];
        block.extend_from_slice(&7u16.to_le_bytes());
        block.extend_from_slice(&915_250u32.to_le_bytes());
        block.push(4); // data length
        block.extend_from_slice(&0x3000u16.to_le_bytes());
        block.push(9);
        assert_eq!(block.len(), META_PREFIX_IR);
        block.push(2); // antenna
        block.extend_from_slice(&[0xE2, 0x80, 0x11, 0x22]);
        block.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut buffer = vec![block.len() as u8];
        buffer.extend(block);

        // IR data forces metadata even if not requested
        let tags = parse_id_buffer(&buffer, false, true).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].rssi, -60);
        assert_eq!(tags[0].frequency, 915_250);
        assert_eq!(tags[0].channel, 9);
        assert_eq!(tags[0].antenna_id, 2);
        assert_eq!(tags[0].epc, [0xE2, 0x80, 0x11, 0x22]);
        assert_eq!(tags[0].data, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_id_buffer_truncated_block() {
        let buffer = [10, 0, 1, 2];
        assert!(matches!(
            parse_id_buffer(&buffer, false, false),
            Err(NurError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_xpc_extraction() {
        let mut entry = TagEntry {
            pc: 0x3200,
            epc: vec![0x80, 0x01, 0x12, 0x34, 0xE2, 0x00, 0xAB, 0xCD],
            ..Default::default()
        };
        assert_eq!(entry.extract_xpc(), 2);
        assert_eq!(entry.xpc_w1, Some(0x8001));
        assert_eq!(entry.xpc_w2, Some(0x1234));
        assert_eq!(entry.epc, [0xE2, 0x00, 0xAB, 0xCD]);

        let mut entry = TagEntry {
            pc: 0x3200,
            epc: vec![0x00, 0x01, 0xE2, 0x00],
            ..Default::default()
        };
        assert_eq!(entry.extract_xpc(), 1);
        assert_eq!(entry.xpc_w1, Some(0x0001));
        assert_eq!(entry.xpc_w2, None);
        assert_eq!(entry.epc, [0xE2, 0x00]);

        let mut entry = TagEntry {
            pc: 0x3000,
            epc: vec![0x80, 0x01],
            ..Default::default()
        };
        assert_eq!(entry.extract_xpc(), 0);
        assert_eq!(entry.epc.len(), 2);
    }

    #[test]
    fn test_tune_result_decode() {
        let mut data = 1i32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 12]);
        for band in 0..NR_TUNEBANDS as i32 {
            data.extend_from_slice(&(band * 10).to_le_bytes());
            data.extend_from_slice(&(-band).to_le_bytes());
            data.extend_from_slice(&(-20_000 - band).to_le_bytes());
        }
        let result = TuneResult::decode(&data).unwrap();
        assert_eq!(result.antenna, 1);
        assert_eq!(result.bands[2], TuneBand { i: 20, q: -2, dbm: -20_002 });
        assert_eq!(result.dbm_results()[5], -20_005);
    }

    #[test]
    fn test_interpret_versions() {
        let response = with_packet(cmd::VERSIONEX, 0, status::SUCCESS, &[b'A', 5, 0, b'A', 4, 2, b'B'], |p| {
            Response::interpret(p)
        })
        .unwrap();
        assert!(matches!(response, Response::Versions(v) if v.primary.major == 5));
    }

    #[test]
    fn test_interpret_module_setup_reads_flags() {
        let mut data = (SetupFlags::TXLEVEL | SetupFlags::REGION).bits().to_le_bytes().to_vec();
        data.extend_from_slice(&[19, 2]);
        let response = with_packet(cmd::LOADSETUP2, 0, status::SUCCESS, &data, |p| Response::interpret(p)).unwrap();
        match response {
            Response::ModuleSetup(setup) => {
                assert_eq!(setup.tx_level, 19);
                assert_eq!(setup.region_id, 2);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_interpret_ir_flag_from_header() {
        let mut block = vec![0xC4, 70, 0, 0, 0, 0, 0, 0, 2, 0, 0x30, 0, 0];
        block.extend_from_slice(&[0xE2, 0x00, 0xAA, 0xBB]);
        let mut data = vec![block.len() as u8];
        data.extend(block);

        let response = with_packet(cmd::GETMETABUF, flags::IRDATA, status::SUCCESS, &data, |p| {
            Response::interpret(p)
        })
        .unwrap();
        match response {
            Response::IdBuffer(tags) => {
                assert_eq!(tags[0].epc, [0xE2, 0x00]);
                assert_eq!(tags[0].data, [0xAA, 0xBB]);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_interpret_failed_status() {
        let result = with_packet(cmd::READ, 0, status::G2_TAG_RESP, &[0x0B], |p| Response::interpret(p));
        assert!(matches!(result, Err(NurError::Tag(TagError::InsufficientPower))));

        let result = with_packet(cmd::INVENTORY, 0, status::NO_TAG, &[], |p| Response::interpret(p));
        assert!(matches!(result, Err(NurError::Module(ModuleStatus::NoTag))));
    }

    #[test]
    fn test_interpret_unknown_is_raw() {
        let response = with_packet(cmd::BEEP, 0, status::SUCCESS, &[1, 2], |p| Response::interpret(p)).unwrap();
        assert_eq!(response, Response::Raw { cmd: cmd::BEEP, data: vec![1, 2] });
    }

    #[test]
    fn test_notification_decoding() {
        let response = with_packet(notify::DEBUGMSG, flags::UNSOL, 0, b"hello\0", |p| Response::interpret(p))
            .unwrap();
        assert_eq!(
            response,
            Response::Notification(Notification::DebugMessage("hello".into()))
        );

        // Unsolicited packets are never checked for status
        let response = with_packet(notify::IOCHANGE, flags::UNSOL, 0x05, &[1, 0], |p| Response::interpret(p)).unwrap();
        assert_eq!(
            response,
            Response::Notification(Notification::Other {
                cmd: notify::IOCHANGE,
                data: vec![1, 0],
            })
        );
    }

    #[test]
    fn test_hop_event_notification() {
        let mut data = vec![2, 3];
        data.extend_from_slice(&866_300u32.to_le_bytes());
        let n = with_packet(notify::HOPEVENT, flags::UNSOL, 0, &data, |p| Notification::decode(p)).unwrap();
        assert_eq!(n, Notification::HopEvent {
            hop_table_id: 2,
            freq_idx: 3,
            freq_khz: 866_300
        });
    }

    #[test]
    fn test_inventory_stream_notification() {
        let n = with_packet(notify::INVENTORY, flags::UNSOL, 0, &[1, 4, 0x10, 0x00, 5], |p| Notification::decode(p))
            .unwrap();
        assert_eq!(n, Notification::InventoryStream {
            stopped: true,
            rounds_done: 4,
            collisions: 16,
            q: 5,
            data: vec![],
        });

        // Summary is one byte short
        let truncated = with_packet(notify::INVENTORY, flags::UNSOL, 0, &[0, 4, 0x10, 0x00], |p| Notification::decode(p));
        assert!(matches!(truncated, Err(NurError::InvalidResponse(_))));
    }
}
