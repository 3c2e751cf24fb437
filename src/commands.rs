//! High-level module operations built on [`NurReader::exchange`].

use log::{debug, warn};

use crate::assembler::Packet;
use crate::error::{ModuleStatus, NurError};
use crate::protocol::{NR_TUNEBANDS, NUR_MAX_EPC_LENGTH, NUR_MAX_GPIO, cmd, rw};
use crate::reader::{NurReader, check_status};
use crate::response::{
    ByteReader, DeviceCaps, GpioState, InventoryResponse, ReaderInfo, ReflectedPower, RegionInfo, ScanSingle,
    TagEntry, TraceTag, TuneResult, Versions, decode_gpio_get, decode_gpio_set, parse_id_buffer, text,
};
use crate::setup::{ModuleSetup, SetupFlags};
use crate::transport::RfidTransport;
use crate::types::{
    CustomHoptable, GpioConfig, InventoryExParams, InventoryParams, IrConfig, LockPayload, MemoryBank,
    PermalockBlock, TagAccess, TraceTagParams,
};

/// Largest single read, in bytes
const MAX_READ_BYTES: usize = 510;
/// Largest single write, in bytes
const MAX_WRITE_BYTES: usize = 244;
/// Largest single write, in words
const MAX_WRITE_WORDS: usize = 127;

const TUNE_ALL_BANDS: u32 = u32::MAX;
const TUNE_GOOD_ENOUGH_DBM: i32 = -100;
const TUNE_CODE_LEN: usize = 8;

/// Append a read/write block address, choosing the 64-bit form when needed
fn push_address(out: &mut Vec<u8>, address: u64) {
    if address > u32::MAX as u64 {
        out.extend_from_slice(&address.to_le_bytes());
    } else {
        out.extend_from_slice(&(address as u32).to_le_bytes());
    }
}

fn address_flags(address: u64) -> u8 {
    if address > u32::MAX as u64 { rw::EA2 } else { 0 }
}

fn address_block_len(address: u64) -> u8 {
    if address > u32::MAX as u64 { 10 } else { 6 }
}

impl<T: RfidTransport> NurReader<T> {
    fn long_command(&mut self, cmd: u8, payload: &[u8]) -> Result<Packet<'_>, NurError> {
        let timeout = self.config().long_timeout;
        self.command(cmd, payload, timeout)
    }

    /// Check that the module answers
    pub fn ping(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::PING, &[]).map(|_| ())
    }

    /// Get the running mode and the application/bootloader versions
    pub fn get_versions(&mut self) -> Result<Versions, NurError> {
        self.simple_command(cmd::VERSIONEX, &[])
            .and_then(|packet| Versions::decode(packet.data))
    }

    pub fn get_reader_info(&mut self) -> Result<ReaderInfo, NurError> {
        self.simple_command(cmd::GETREADERINFO, &[])
            .and_then(|packet| ReaderInfo::decode(packet.data))
    }

    pub fn get_device_caps(&mut self) -> Result<DeviceCaps, NurError> {
        self.simple_command(cmd::DEVCAPS, &[])
            .and_then(|packet| DeviceCaps::decode(packet.data))
    }

    /// Get region information
    ///
    /// # Arguments
    /// * `region_id` - Region to describe; `None` describes the current region
    pub fn get_region_info(&mut self, region_id: Option<u8>) -> Result<RegionInfo, NurError> {
        let payload: Vec<u8> = region_id.into_iter().collect();
        self.simple_command(cmd::GETREGIONINFO, &payload)
            .and_then(|packet| RegionInfo::decode(packet.data))
    }

    /// Firmware information string
    pub fn get_fw_info(&mut self) -> Result<String, NurError> {
        self.simple_command(cmd::GETFWINFO, &[])
            .map(|packet| text(packet.data))
    }

    /// 'A' in application mode, 'B' in bootloader mode
    pub fn get_mode(&mut self) -> Result<char, NurError> {
        self.simple_command(cmd::GETMODE, &[])
            .and_then(|packet| ByteReader::new(packet.data).u8())
            .map(char::from)
    }

    /// Current baudrate setting index
    pub fn get_baudrate(&mut self) -> Result<u8, NurError> {
        self.simple_command(cmd::SETBDR, &[])
            .and_then(|packet| ByteReader::new(packet.data).u8())
    }

    /// Change the baudrate setting; the new rate applies after the response
    pub fn set_baudrate(&mut self, setting: u8) -> Result<(), NurError> {
        self.simple_command(cmd::SETBDR, &[setting]).map(|_| ())
    }

    /// Store the current setup to non-volatile memory
    pub fn store_setup(&mut self, flags: u8) -> Result<(), NurError> {
        self.simple_command(cmd::STORESETUP, &[flags]).map(|_| ())
    }

    /// Read the setup members selected by `flags`
    pub fn get_module_setup(&mut self, flags: SetupFlags) -> Result<ModuleSetup, NurError> {
        if flags.is_empty() {
            return Err(NurError::InvalidParameter("No module setup members selected".into()));
        }

        let packet = self.simple_command(cmd::LOADSETUP2, &flags.bits().to_le_bytes())?;
        let mut r = ByteReader::new(packet.data);
        r.u32()?;
        ModuleSetup::decode(flags, r.rest())
    }

    /// Apply the setup members selected by `setup.flags`
    ///
    /// # Returns
    /// The setup as the module applied it. When the module rejects a value with
    /// `InvalidParameter` the echoed setup is logged and the error returned.
    pub fn set_module_setup(&mut self, setup: &ModuleSetup) -> Result<ModuleSetup, NurError> {
        let mut payload = Vec::with_capacity(128);
        setup.encode(&mut payload)?;

        let timeout = self.config().default_timeout;
        let packet = self.exchange(cmd::LOADSETUP2, &payload, timeout)?;
        let status = packet.module_status();
        if !matches!(status, ModuleStatus::Success | ModuleStatus::InvalidParameter) {
            return check_status(&packet).map(|_| setup.clone());
        }

        let mut r = ByteReader::new(packet.data);
        r.u32()?;
        let applied = ModuleSetup::decode(setup.flags, r.rest())?;
        if status == ModuleStatus::InvalidParameter {
            warn!("Module rejected setup, current values: {:?}", applied);
            return Err(NurError::Module(status));
        }
        Ok(applied)
    }

    // Inventory

    /// Run an inventory with optional Q, session and rounds
    pub fn inventory(&mut self, params: Option<InventoryParams>) -> Result<InventoryResponse, NurError> {
        let payload = params
            .map(|p| vec![p.q, p.session, p.rounds])
            .unwrap_or_default();
        self.long_command(cmd::INVENTORY, &payload)
            .and_then(|packet| InventoryResponse::decode(packet.data))
    }

    /// Run an inventory with select filters
    pub fn inventory_ex(&mut self, params: &InventoryExParams) -> Result<InventoryResponse, NurError> {
        let mut payload = Vec::with_capacity(64);
        params.encode(&mut payload)?;
        self.long_command(cmd::INVENTORYEX, &payload)
            .and_then(|packet| InventoryResponse::decode(packet.data))
    }

    pub fn get_inventory_read_config(&mut self) -> Result<IrConfig, NurError> {
        self.simple_command(cmd::INVENTORYREAD, &[])
            .and_then(|packet| IrConfig::decode(packet.data))
    }

    pub fn set_inventory_read_config(&mut self, config: &IrConfig) -> Result<(), NurError> {
        let mut payload = Vec::with_capacity(8);
        config.encode(&mut payload);
        self.simple_command(cmd::INVENTORYREAD, &payload).map(|_| ())
    }

    /// Clear the module's tag buffer
    pub fn clear_tags(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::CLEARIDBUF, &[]).map(|_| ())
    }

    /// Fetch the module's tag buffer
    ///
    /// # Arguments
    /// * `include_meta` - Fetch RSSI, timestamp, frequency, PC and channel as well
    /// * `clear` - Clear the module's buffer after fetching
    pub fn fetch_tags(&mut self, include_meta: bool, clear: bool) -> Result<Vec<TagEntry>, NurError> {
        let command = if include_meta { cmd::GETMETABUF } else { cmd::GETIDBUF };
        let payload: &[u8] = if clear { &[0x01] } else { &[] };
        let packet = self.simple_command(command, payload)?;
        parse_id_buffer(packet.data, include_meta, packet.has_ir_data())
    }

    /// Fetch a single tag buffer entry by index
    pub fn fetch_tag_at(&mut self, include_meta: bool, index: u32) -> Result<Option<TagEntry>, NurError> {
        let command = if include_meta { cmd::GETMETABUF } else { cmd::GETIDBUF };
        let packet = self.simple_command(command, &index.to_le_bytes())?;
        parse_id_buffer(packet.data, include_meta, packet.has_ir_data()).map(|tags| tags.into_iter().next())
    }

    /// Stop every continuous operation (streams, carrier tests)
    pub fn stop_continuous(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::STOPALLCONT, &[0]).map(|_| ())
    }

    /// Wait for a single tag
    ///
    /// # Arguments
    /// * `timeout_ms` - Module-side scan time; the host waits `scan_margin` longer
    pub fn scan_single(&mut self, timeout_ms: u16) -> Result<ScanSingle, NurError> {
        let timeout = std::time::Duration::from_millis(timeout_ms as u64) + self.config().scan_margin;
        self.command(cmd::SCANSINGLE, &timeout_ms.to_le_bytes(), timeout)
            .and_then(|packet| ScanSingle::decode(packet.data))
    }

    /// Locate a single tag by mask and report its signal
    pub fn trace_tag(&mut self, params: &TraceTagParams) -> Result<TraceTag, NurError> {
        let mut payload = Vec::with_capacity(16 + params.mask.len());
        params.encode(&mut payload)?;
        self.simple_command(cmd::TRACETAG, &payload)
            .and_then(|packet| TraceTag::decode(packet.data))
    }

    // Tag memory

    /// Read tag memory
    ///
    /// # Arguments
    /// * `access` - Password and singulation
    /// * `bank` - Memory bank to read
    /// * `address` - Word address
    /// * `byte_count` - Bytes to read; even, 2..=510
    ///
    /// # Returns
    /// The bytes read
    pub fn read_tag(
        &mut self,
        access: &TagAccess,
        bank: MemoryBank,
        address: u64,
        byte_count: usize,
    ) -> Result<Vec<u8>, NurError> {
        if !(2..=MAX_READ_BYTES).contains(&byte_count) || byte_count % 2 != 0 {
            return Err(NurError::InvalidParameter(format!(
                "Read length must be an even byte count in 2..={}, got {}",
                MAX_READ_BYTES, byte_count
            )));
        }

        let mut payload = Vec::with_capacity(96);
        access.encode(address_flags(address), &mut payload)?;
        payload.push(address_block_len(address));
        payload.push(bank as u8);
        push_address(&mut payload, address);
        payload.push((byte_count / 2) as u8);

        debug!("Reading {} bytes from {:?} word {}", byte_count, bank, address);
        self.long_command(cmd::READ, &payload)
            .map(|packet| packet.data.to_vec())
    }

    /// Read from the tag whose EPC matches `epc`
    pub fn read_tag_by_epc(
        &mut self,
        password: Option<u32>,
        epc: &[u8],
        bank: MemoryBank,
        address: u64,
        byte_count: usize,
    ) -> Result<Vec<u8>, NurError> {
        let access = TagAccess {
            password,
            ..TagAccess::by_epc(epc)
        };
        self.read_tag(&access, bank, address, byte_count)
    }

    /// Write tag memory
    ///
    /// # Arguments
    /// * `access` - Password and singulation
    /// * `bank` - Memory bank to write
    /// * `address` - Word address
    /// * `data` - Whole words to write, at most 244 bytes
    pub fn write_tag(
        &mut self,
        access: &TagAccess,
        bank: MemoryBank,
        address: u64,
        data: &[u8],
    ) -> Result<(), NurError> {
        if data.len() > MAX_WRITE_BYTES {
            return Err(NurError::InvalidParameter(format!(
                "Write length {} exceeds {} bytes",
                data.len(),
                MAX_WRITE_BYTES
            )));
        }
        if data.len() % 2 != 0 {
            return Err(NurError::NotWordBoundary);
        }
        let word_count = data.len() / 2;
        if !(1..=MAX_WRITE_WORDS).contains(&word_count) {
            return Err(NurError::InvalidParameter("Nothing to write".into()));
        }

        let mut payload = Vec::with_capacity(96 + data.len());
        access.encode(address_flags(address), &mut payload)?;
        payload.push(data.len() as u8 + address_block_len(address));
        payload.push(bank as u8);
        push_address(&mut payload, address);
        payload.push(word_count as u8);
        payload.extend_from_slice(data);

        debug!("Writing {} words to {:?} word {}", word_count, bank, address);
        self.long_command(cmd::WRITE, &payload).map(|_| ())
    }

    /// Write to the tag whose EPC matches `epc`
    pub fn write_tag_by_epc(
        &mut self,
        password: Option<u32>,
        epc: &[u8],
        bank: MemoryBank,
        address: u64,
        data: &[u8],
    ) -> Result<(), NurError> {
        let access = TagAccess {
            password,
            ..TagAccess::by_epc(epc)
        };
        self.write_tag(&access, bank, address, data)
    }

    /// Replace the EPC, updating the length bits of the PC word
    pub fn write_epc(&mut self, access: &TagAccess, new_epc: &[u8]) -> Result<(), NurError> {
        if !(2..=NUR_MAX_EPC_LENGTH).contains(&new_epc.len()) {
            return Err(NurError::InvalidParameter(format!(
                "EPC length must be 2..={} bytes, got {}",
                NUR_MAX_EPC_LENGTH,
                new_epc.len()
            )));
        }
        if new_epc.len() % 2 != 0 {
            return Err(NurError::NotWordBoundary);
        }

        let pc = ((new_epc.len() / 2) as u16) << 11;
        let mut data = Vec::with_capacity(new_epc.len() + 2);
        data.extend_from_slice(&pc.to_be_bytes());
        data.extend_from_slice(new_epc);

        // PC is word 1 of the EPC bank, after the stored CRC
        self.write_tag(access, MemoryBank::Epc, 1, &data)
    }

    /// Replace the EPC of the tag currently holding `epc`
    pub fn write_epc_by_epc(&mut self, password: Option<u32>, epc: &[u8], new_epc: &[u8]) -> Result<(), NurError> {
        let access = TagAccess {
            password,
            ..TagAccess::by_epc(epc)
        };
        self.write_epc(&access, new_epc)
    }

    /// Lock or unlock tag memory areas
    pub fn lock_tag(&mut self, access: &TagAccess, lock: LockPayload) -> Result<(), NurError> {
        let mut payload = Vec::with_capacity(96);
        access.encode(0, &mut payload)?;
        payload.push(4);
        payload.extend_from_slice(&lock.mask.to_le_bytes());
        payload.extend_from_slice(&lock.action.to_le_bytes());
        self.long_command(cmd::LOCK, &payload).map(|_| ())
    }

    /// Permanently disable a tag. `access.password` is the kill password.
    pub fn kill_tag(&mut self, access: &TagAccess) -> Result<(), NurError> {
        if access.password.is_none() {
            return Err(NurError::InvalidParameter("Kill requires a password".into()));
        }
        let mut payload = Vec::with_capacity(80);
        access.encode(0, &mut payload)?;
        self.long_command(cmd::KILL, &payload).map(|_| ())
    }

    /// Block permalock
    pub fn permalock_tag(&mut self, access: &TagAccess, block: &PermalockBlock) -> Result<(), NurError> {
        let mut payload = Vec::with_capacity(96 + block.masks.len() * 2);
        access.encode(0, &mut payload)?;
        block.encode(&mut payload)?;
        self.long_command(cmd::PERMALOCK, &payload).map(|_| ())
    }

    // RF

    /// Tune an antenna across all bands
    ///
    /// # Arguments
    /// * `antenna` - Antenna id
    /// * `wide` - Wide tune instead of narrow
    /// * `save` - Store the results in the module
    pub fn tune_antenna(&mut self, antenna: u32, wide: bool, save: bool) -> Result<TuneResult, NurError> {
        let mut payload = Vec::with_capacity(20 + TUNE_CODE_LEN);
        payload.extend_from_slice(&(if wide { 2u32 } else { 0 }).to_le_bytes());
        payload.extend_from_slice(&antenna.to_le_bytes());
        payload.extend_from_slice(&TUNE_ALL_BANDS.to_le_bytes());
        payload.extend_from_slice(&(save as u32).to_le_bytes());
        payload.extend_from_slice(&TUNE_GOOD_ENOUGH_DBM.to_le_bytes());
        payload.extend_from_slice(&[0u8; TUNE_CODE_LEN]);

        let timeout = self.config().tune_timeout;
        let result = self
            .command(cmd::TUNEANTENNA, &payload, timeout)
            .and_then(|packet| TuneResult::decode(packet.data))?;
        debug!("Tune results over {} bands: {:?}", NR_TUNEBANDS, result.dbm_results());
        Ok(result)
    }

    /// Reflected power, optionally at a specific frequency
    pub fn get_reflected_power(&mut self, freq_khz: u32) -> Result<ReflectedPower, NurError> {
        let payload = if freq_khz > 0 { freq_khz.to_le_bytes().to_vec() } else { Vec::new() };
        self.simple_command(cmd::GETREFPOWEREX, &payload)
            .and_then(|packet| ReflectedPower::decode(packet.data))
    }

    /// Control the external carrier; `0` turns it off
    pub fn set_ext_carrier(&mut self, on: i32) -> Result<(), NurError> {
        self.simple_command(cmd::CARRIER, &on.to_le_bytes()).map(|_| ())
    }

    /// Start a continuous carrier on `channel`
    pub fn cont_carrier(&mut self, channel: u8) -> Result<(), NurError> {
        self.simple_command(cmd::CONTCARR, &[0x22, channel]).map(|_| ())
    }

    pub fn stop_cont_carrier(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::CONTCARR, &[0x88]).map(|_| ())
    }

    /// Pin the radio to one channel of the hop table
    pub fn set_constant_channel(&mut self, channel_index: u8) -> Result<(), NurError> {
        self.simple_command(cmd::SETCHANNEL, &[channel_index]).map(|_| ())
    }

    pub fn set_custom_hoptable(&mut self, table: &CustomHoptable) -> Result<(), NurError> {
        table.validate()?;
        let mut payload = Vec::with_capacity(28 + table.frequencies.len() * 4);
        table.encode(&mut payload);
        self.simple_command(cmd::CUSTOMHOP_EX, &payload).map(|_| ())
    }

    pub fn get_custom_hoptable(&mut self) -> Result<CustomHoptable, NurError> {
        self.simple_command(cmd::CUSTOMHOP_EX, &[])
            .and_then(|packet| CustomHoptable::decode(packet.data))
    }

    // GPIO

    pub fn set_gpio_config(&mut self, config: &GpioConfig) -> Result<(), NurError> {
        let mut payload = Vec::with_capacity(1 + NUR_MAX_GPIO * 4);
        config.encode(&mut payload);
        self.simple_command(cmd::CONFIGGPIO, &payload).map(|_| ())
    }

    pub fn get_gpio_config(&mut self) -> Result<GpioConfig, NurError> {
        self.simple_command(cmd::CONFIGGPIO, &[])
            .and_then(|packet| GpioConfig::decode(packet.data))
    }

    /// Drive an output pin. The module echoes the new state, which must match.
    pub fn set_gpio(&mut self, gpio: u8, state: bool) -> Result<(), NurError> {
        let mask = gpio_mask(gpio)?;
        let states = self
            .simple_command(cmd::SETGPIO, &[mask, state as u8])
            .and_then(|packet| decode_gpio_set(packet.data))?;

        match states.first() {
            Some(pin) if pin.state == state => Ok(()),
            _ => Err(NurError::InvalidResponse(format!(
                "GPIO {} did not switch to {}",
                gpio, state
            ))),
        }
    }

    pub fn get_gpio(&mut self, gpio: u8) -> Result<GpioState, NurError> {
        let mask = gpio_mask(gpio)?;
        self.simple_command(cmd::GETGPIO, &[mask])
            .and_then(|packet| decode_gpio_get(packet.data))?
            .into_iter()
            .next()
            .ok_or_else(|| NurError::InvalidResponse(format!("No state for GPIO {}", gpio)))
    }

    // Boot control

    /// Restart into the bootloader
    pub fn enter_boot(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::ENTERBOOT, &[]).map(|_| ())
    }

    pub fn restart(&mut self) -> Result<(), NurError> {
        self.simple_command(cmd::RESTART, &[]).map(|_| ())
    }
}

fn gpio_mask(gpio: u8) -> Result<u8, NurError> {
    if gpio as usize >= NUR_MAX_GPIO {
        return Err(NurError::InvalidParameter(format!(
            "GPIO {} out of range (0..{})",
            gpio, NUR_MAX_GPIO
        )));
    }
    Ok(1 << gpio)
}
