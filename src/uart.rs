//! UART transport for ESP32 using esp-idf-svc

use std::io;
use std::time::Duration;

use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};
use esp_idf_svc::sys::EspError;
use log::info;

use crate::transport::{RfidTransport, TransportError};

pub struct UartTransport<'a> {
    uart: UartDriver<'a>,
}

impl<'a> UartTransport<'a> {
    /// Drive a NUR module on `uart`, no flow control
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        baud_rate: u32,
    ) -> Result<Self, EspError> {
        let config = uart::config::Config::default().baudrate(baud_rate.into());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &config,
        )?;

        // The module emits a boot notification right after power-up
        std::thread::sleep(Duration::from_millis(500));
        uart.clear_rx()?;
        info!("UART ready at {} baud", baud_rate);

        Ok(Self { uart })
    }

    /// Reconfigure the host side after a successful `set_baudrate`
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.uart
            .change_baudrate(baud_rate)
            .map(|_| ())
            .map_err(map_esp_error)
    }
}

fn map_esp_error(e: EspError) -> TransportError {
    TransportError::Io(io::Error::other(e))
}

impl RfidTransport for UartTransport<'_> {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.uart.write(data).map_err(map_esp_error)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        // Driver timeout is in RTOS ticks; Ok(0) means nothing arrived
        let ticks = TickType::new_millis(timeout_ms as u64).ticks();
        self.uart.read(buf, ticks).map_err(map_esp_error)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.uart.clear_rx().map_err(map_esp_error)
    }
}
