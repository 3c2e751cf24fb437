//! Host-side driver for NUR UHF RFID reader modules with support for multiple transport backends.
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use nur_rfid::{NurReader, SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyACM0", 115200)?;
//! let mut reader = NurReader::new(transport);
//!
//! reader.ping()?;
//! reader.clear_tags()?;
//! let summary = reader.inventory(None)?;
//! if summary.num_tags_found > 0 {
//!     for tag in reader.fetch_tags(true, true)? {
//!         println!("{} rssi {}", tag.epc_hex(), tag.rssi);
//!     }
//! }
//! ```

mod assembler;
mod checksum;
mod commands;
mod config;
mod error;
mod firmware;
mod frame;
pub mod protocol;
mod reader;
mod response;
mod setup;
mod transport;
mod types;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use assembler::{AssemblerState, Packet, PacketAssembler, ParseOutcome};
pub use checksum::{crc16, crc32, header_checksum};
pub use config::ReaderConfig;
pub use error::{ModuleStatus, NurError, TagError};
pub use firmware::Progress;
pub use frame::{encode_frame, encode_frame_into, frame_len};
pub use reader::{IgnoredByteHandler, NurReader, PacketHandler};
pub use response::{
    DeviceCaps, GpioPinState, GpioState, InventoryResponse, Notification, ReaderInfo, ReflectedPower,
    RegionInfo, Response, ScanSingle, TagEntry, TraceTag, TuneBand, TuneResult, Version, Versions,
    parse_id_buffer,
};
pub use setup::{AutotuneSetup, ModuleSetup, RssiFilter, SetupFlags};
pub use transport::{RfidTransport, TransportError};
pub use types::{
    CustomHoptable, GpioConfig, GpioSetup, InventoryExParams, InventoryFilter, InventoryParams, IrConfig,
    LockAction, LockPayload, LockTarget, MemoryBank, PermalockBlock, Singulation, TagAccess,
    TraceTagParams, bytes_to_hex,
};

#[cfg(feature = "uart-esp32")]
pub use uart::UartTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
