//! busbind Firmware
//!
//! Reference board for the I2C binding (STM32F042K6). Bus 1 runs on the
//! I2C1 peripheral (PB6=SCL, PB7=SDA) through the generic driver shape and
//! is brought up from the boot defaults. A background task scans the bus
//! periodically and logs the peers it finds.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::time::Hertz;
use embassy_time::{Delay, Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use busbind_core::{BindingConfig, BusConfig, Generic, I2cBuses, TransferStatus};
use busbind_hal::BlockingDriver;

/// Board I2C bus as the HAL provides it
type BoardI2c = I2c<'static, Blocking>;

/// Bus registry for this board (one bus)
type Buses = I2cBuses<Generic<BlockingDriver<BoardI2c>>, 1>;

/// SCL rate the I2C1 pins are wired for
const BUS_FREQUENCY: u32 = 100_000;

/// Per-address timeout while scanning
const SCAN_TIMEOUT_MS: u32 = 10;

/// Interval between bus scans
const SCAN_PERIOD: Duration = Duration::from_secs(5);

// Transfer status cells, written from the driver's completion path
static STATUS: [TransferStatus; 1] = [TransferStatus::new()];

// Registry must live forever for task references
static BUSES: StaticCell<Buses> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("busbind firmware starting...");

    let p = embassy_stm32::init(Default::default());

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(BUS_FREQUENCY);
    let i2c = I2c::new_blocking(p.I2C1, p.PB6, p.PB7, i2c_config);

    let config = match BindingConfig::default().with_default_bus(1, BusConfig::master(BUS_FREQUENCY)) {
        Ok(config) => config,
        Err(e) => {
            warn!("Default bus list rejected: {}", e);
            BindingConfig::default()
        }
    };

    let driver = match BlockingDriver::new(i2c, BUS_FREQUENCY) {
        Ok(driver) => Some(Generic::new(driver)),
        Err(e) => {
            error!("I2C1 wired for {} Hz, no speed class fits: {}", BUS_FREQUENCY, e);
            None
        }
    };
    let drivers = [driver];
    let buses = BUSES.init(I2cBuses::new(drivers, &STATUS, config));

    if let Err(e) = buses.init_defaults() {
        error!("Failed to bring up default buses: {}", e);
    }
    for bus in buses.iter() {
        info!("{}", Display2Format(bus));
    }

    spawner.spawn(scan_task(buses)).unwrap();
    info!("All tasks spawned");
}

/// Bus scan task - logs the peers acknowledging on bus 1
#[embassy_executor::task]
async fn scan_task(buses: &'static mut Buses) {
    info!("Scan task started");
    let mut delay = Delay;

    loop {
        match buses.bus_mut(1) {
            Ok(bus) if bus.is_ready() => match bus.scan(SCAN_TIMEOUT_MS, &mut delay) {
                Ok(found) => info!("I2C1: {} peers {=[u8]:x}", found.len(), found.as_slice()),
                Err(e) => warn!("I2C1 scan failed: {}", e),
            },
            Ok(_) => debug!("I2C1 not ready, skipping scan"),
            Err(e) => error!("I2C1 unavailable: {}", e),
        }

        Timer::after(SCAN_PERIOD).await;
    }
}
