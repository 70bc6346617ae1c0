//! Bus registry
//!
//! The fixed table of peripheral objects for one board. The board builds it
//! once at boot from its vendor driver table and one status cell per bus,
//! then the runtime resolves bus numbers through it. Every object lives as
//! long as the registry; `deinitialize` only returns it to `Uninitialized`.

use busbind_hal::I2cIrq;

use crate::adapter::{DriverHandle, Transport};
use crate::bus::{BusId, MAX_BUSES};
use crate::config::{BindingConfig, BusConfig};
use crate::error::{Error, Result};
use crate::peripheral::{I2cPeripheral, Tuning};
use crate::status::TransferStatus;

/// Peripheral objects for up to `N` buses
#[derive(Debug)]
pub struct I2cBuses<T, const N: usize> {
    drivers: [Option<T>; N],
    slots: [I2cPeripheral<T>; N],
    config: BindingConfig,
}

impl<T: Transport, const N: usize> I2cBuses<T, N> {
    const FITS: () = assert!(N <= MAX_BUSES, "more buses than MAX_BUSES");

    /// Create the registry
    ///
    /// `drivers[i]` backs bus `i + 1`; `None` marks a bus the board does not
    /// wire. No vendor driver is touched until a bus is initialized.
    pub fn new(
        drivers: [Option<T>; N],
        statuses: &'static [TransferStatus; N],
        config: BindingConfig,
    ) -> Self {
        let () = Self::FITS;
        let tuning = Tuning::from(&config);
        let slots = core::array::from_fn(|i| {
            I2cPeripheral::new(BusId::from_index(i), &statuses[i], tuning)
        });
        Self {
            drivers,
            slots,
            config,
        }
    }

    /// Binding settings in use
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    fn slot_index(&self, bus: u8) -> Result<usize> {
        let id = BusId::new(bus)?;
        if id.index() >= N {
            return Err(Error::UnsupportedBus);
        }
        Ok(id.index())
    }

    /// Configure bus `bus` and return its ready object
    ///
    /// The first call binds the bus to its vendor driver; later calls reuse
    /// the binding and fully re-apply `config`.
    pub fn initialize(&mut self, bus: u8, config: BusConfig) -> Result<&mut I2cPeripheral<T>> {
        let index = self
            .slot_index(bus)
            .inspect_err(|_| warn!("I2C{}: bus not supported", bus))?;
        let slot = &mut self.slots[index];
        if !slot.has_handle() {
            let handle = DriverHandle::acquire(&mut self.drivers, slot.bus())?;
            slot.attach(handle);
        }
        slot.configure(config)?;
        Ok(slot)
    }

    /// Object for bus `bus`
    pub fn bus(&self, bus: u8) -> Result<&I2cPeripheral<T>> {
        let index = self.slot_index(bus)?;
        Ok(&self.slots[index])
    }

    /// Mutable object for bus `bus`
    pub fn bus_mut(&mut self, bus: u8) -> Result<&mut I2cPeripheral<T>> {
        let index = self.slot_index(bus)?;
        Ok(&mut self.slots[index])
    }

    /// Interrupt half behind bus `bus`, for the board's vectors
    ///
    /// Available from construction on, whether or not the bus was
    /// initialized. Fails with [`Error::UnsupportedBus`] when the bus has no
    /// driver or its driver has no interrupt half.
    pub fn irq(&self, bus: u8) -> Result<&'static dyn I2cIrq> {
        let index = self.slot_index(bus)?;
        self.slots[index]
            .irq()
            .or_else(|| self.drivers[index].as_ref().and_then(Transport::irq))
            .ok_or(Error::UnsupportedBus)
    }

    /// Deinitialize bus `bus`
    pub fn deinitialize(&mut self, bus: u8) -> Result<()> {
        self.bus_mut(bus)?.deinitialize();
        Ok(())
    }

    /// Bring up the buses listed in the binding config
    ///
    /// Every listed bus is attempted; the first failure is returned.
    pub fn init_defaults(&mut self) -> Result<()> {
        let defaults = self.config.default_buses.clone();
        let mut first_error = None;
        for default in &defaults {
            if let Err(e) = self.initialize(default.bus, default.config) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Return every bus to `Uninitialized`
    pub fn deinit_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.has_handle()) {
            slot.deinitialize();
        }
    }

    /// Iterate over all bus objects
    pub fn iter(&self) -> impl Iterator<Item = &I2cPeripheral<T>> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Generic, LegacyDma};
    use crate::peripheral::tests::NoDelay;
    use crate::peripheral::PeripheralState;
    use busbind_hal::mock::{MockDriver, MockHandle, SimBus};
    use busbind_hal::BusSpeed;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Buses = I2cBuses<Generic<MockDriver>, 3>;

    fn statuses() -> &'static [TransferStatus; 3] {
        Box::leak(Box::new([
            TransferStatus::new(),
            TransferStatus::new(),
            TransferStatus::new(),
        ]))
    }

    /// Buses 1 and 2 wired, bus 3 absent
    fn board() -> (Buses, [Rc<RefCell<SimBus>>; 2]) {
        let sims = [SimBus::shared(), SimBus::shared()];
        let drivers = [
            Some(Generic::new(MockDriver::new(sims[0].clone()))),
            Some(Generic::new(MockDriver::new(sims[1].clone()))),
            None,
        ];
        (
            I2cBuses::new(drivers, statuses(), BindingConfig::default()),
            sims,
        )
    }

    /// Every bus a registry can hold, all wired
    fn full_board() -> I2cBuses<Generic<MockDriver>, MAX_BUSES> {
        let drivers =
            core::array::from_fn(|_| Some(Generic::new(MockDriver::new(SimBus::shared()))));
        let statuses: &'static [TransferStatus; MAX_BUSES] =
            Box::leak(Box::new(core::array::from_fn(|_| TransferStatus::new())));
        I2cBuses::new(drivers, statuses, BindingConfig::default())
    }

    #[test]
    fn test_objects_start_uninitialized() {
        let (buses, _) = board();
        assert!(buses
            .iter()
            .all(|b| b.status() == PeripheralState::Uninitialized));
        assert_eq!(buses.bus(2).unwrap().bus().number(), 2);
    }

    #[test]
    fn test_unsupported_buses() {
        let (mut buses, _) = board();
        assert_eq!(
            buses.initialize(0, BusConfig::STANDARD).err(),
            Some(Error::UnsupportedBus)
        );
        // Known identity, but no driver on this board
        assert_eq!(
            buses.initialize(3, BusConfig::STANDARD).err(),
            Some(Error::UnsupportedBus)
        );
        // Beyond this registry
        assert_eq!(
            buses.initialize(4, BusConfig::STANDARD).err(),
            Some(Error::UnsupportedBus)
        );
        assert_eq!(buses.bus(9).err(), Some(Error::UnsupportedBus));
    }

    #[test]
    fn test_reinitialize_reuses_binding() {
        let (mut buses, sims) = board();
        buses.initialize(1, BusConfig::STANDARD).unwrap();
        buses.initialize(1, BusConfig::FAST).unwrap();

        assert_eq!(sims[0].borrow().setup_calls(), 2);
        assert_eq!(sims[0].borrow().speed(), Some(BusSpeed::Fast));
        assert_eq!(buses.bus(1).unwrap().frequency(), Some(400_000));
    }

    #[test]
    fn test_deinitialize_keeps_slot() {
        let (mut buses, _) = board();
        buses.initialize(2, BusConfig::STANDARD).unwrap();
        buses.deinitialize(2).unwrap();
        assert_eq!(
            buses.bus(2).unwrap().status(),
            PeripheralState::Uninitialized
        );
        assert!(buses.initialize(2, BusConfig::STANDARD).is_ok());
    }

    #[test]
    fn test_init_defaults_and_deinit_all() {
        let sims = [SimBus::shared(), SimBus::shared()];
        let config = BindingConfig::default()
            .with_default_bus(1, BusConfig::FAST)
            .unwrap()
            .with_default_bus(3, BusConfig::STANDARD)
            .unwrap()
            .with_default_bus(2, BusConfig::STANDARD)
            .unwrap();
        let drivers = [
            Some(Generic::new(MockDriver::new(sims[0].clone()))),
            Some(Generic::new(MockDriver::new(sims[1].clone()))),
            None,
        ];
        let mut buses: Buses = I2cBuses::new(drivers, statuses(), config);

        assert_eq!(buses.init_defaults(), Err(Error::UnsupportedBus));
        assert!(buses.bus(1).unwrap().is_ready());
        assert!(buses.bus(2).unwrap().is_ready());

        buses.deinit_all();
        assert!(buses
            .iter()
            .all(|b| b.status() == PeripheralState::Uninitialized));
    }

    #[test]
    fn test_irq_half_available_before_initialize() {
        let sim = SimBus::shared();
        let statuses: &'static [TransferStatus; 2] =
            Box::leak(Box::new([TransferStatus::new(), TransferStatus::new()]));
        let mut buses = I2cBuses::new(
            [Some(LegacyDma::new(MockHandle::new(sim.clone()))), None],
            statuses,
            BindingConfig::default(),
        );

        let before = buses.irq(1).unwrap();
        buses.initialize(1, BusConfig::STANDARD).unwrap();
        let after = buses.irq(1).unwrap();
        assert!(core::ptr::addr_eq(before, after));
        assert!(core::ptr::addr_eq(after, sim.borrow().irq()));

        assert_eq!(buses.irq(2).err(), Some(Error::UnsupportedBus));
        assert_eq!(buses.irq(0).err(), Some(Error::UnsupportedBus));
    }

    #[test]
    fn test_generic_driver_has_no_irq_half() {
        let (mut buses, _) = board();
        buses.initialize(1, BusConfig::STANDARD).unwrap();
        assert_eq!(buses.irq(1).err(), Some(Error::UnsupportedBus));
        assert!(buses.bus(1).unwrap().irq().is_none());
    }

    #[test]
    fn test_bus_mut_transfers() {
        let (mut buses, sims) = board();
        sims[1].borrow_mut().add_loopback(0x42);
        buses.initialize(2, BusConfig::STANDARD).unwrap();

        let bus = buses.bus_mut(2).unwrap();
        assert_eq!(bus.write(0x42, &[5, 6], 10, &mut NoDelay), Ok(2));
        assert!(sims[0].borrow().transactions().is_empty());
    }

    proptest! {
        #[test]
        fn prop_every_wired_bus_reaches_ready(freq in 1u32..=1_000_000) {
            let (mut buses, _) = board();
            for bus in 1..=2 {
                buses.initialize(bus, BusConfig::master(freq)).unwrap();
                prop_assert_eq!(buses.bus(bus).unwrap().status(), PeripheralState::Ready);
            }
        }

        #[test]
        fn prop_full_board_reaches_ready_on_every_bus(freq in 1u32..=1_000_000) {
            let mut buses = full_board();
            let expected = BusSpeed::for_frequency(freq).unwrap().nominal_hz();
            for bus in 1..=MAX_BUSES as u8 {
                buses.initialize(bus, BusConfig::master(freq)).unwrap();
                prop_assert_eq!(buses.bus(bus).unwrap().status(), PeripheralState::Ready);
                prop_assert_eq!(buses.bus(bus).unwrap().frequency(), Some(expected));
            }
            prop_assert!(buses.iter().all(|b| b.is_ready()));
            prop_assert_eq!(
                buses.initialize(MAX_BUSES as u8 + 1, BusConfig::master(freq)).err(),
                Some(Error::UnsupportedBus)
            );
        }

        #[test]
        fn prop_unsupported_bus_leaves_others(
            bad in prop_oneof![Just(0u8), 3u8..=255],
            freq in 1u32..=400_000,
        ) {
            let (mut buses, sims) = board();
            buses.initialize(1, BusConfig::master(freq)).unwrap();
            let before = buses.bus(1).unwrap().active_config();
            let calls = sims[0].borrow().setup_calls();

            prop_assert_eq!(
                buses.initialize(bad, BusConfig::STANDARD).err(),
                Some(Error::UnsupportedBus)
            );
            prop_assert_eq!(buses.bus(1).unwrap().active_config(), before);
            prop_assert_eq!(sims[0].borrow().setup_calls(), calls);
            prop_assert_eq!(buses.bus(2).unwrap().status(), PeripheralState::Uninitialized);
        }

        #[test]
        fn prop_last_frequency_wins(
            first in 1u32..=1_000_000,
            second in 1u32..=1_000_000,
        ) {
            let (mut buses, sims) = board();
            buses.initialize(1, BusConfig::master(first)).unwrap();
            buses.initialize(1, BusConfig::master(second)).unwrap();

            let expected = BusSpeed::for_frequency(second).unwrap();
            let active = buses.bus(1).unwrap().active_config().unwrap();
            prop_assert_eq!(active.requested, second);
            prop_assert_eq!(active.frequency, expected.nominal_hz());
            prop_assert_eq!(sims[0].borrow().speed(), Some(expected));
        }

        #[test]
        fn prop_master_sentinel_always_rejected(
            initialized in any::<bool>(),
            busy in any::<bool>(),
            data in proptest::collection::vec(any::<u8>(), 0..8),
        ) {
            let (mut buses, sims) = board();
            sims[0].borrow_mut().add_loopback(0x50);
            sims[0].borrow_mut().set_completion(busbind_hal::mock::Completion::Deferred);
            if initialized {
                buses.initialize(1, BusConfig::STANDARD).unwrap();
                if busy {
                    buses.bus_mut(1).unwrap().start_write(0x50, &[1]).unwrap();
                }
            }
            let bus = buses.bus_mut(1).unwrap();
            let state = bus.status();
            prop_assert_eq!(
                bus.write(0xFE, &data, 10, &mut NoDelay),
                Err(Error::InvalidAddress)
            );
            prop_assert_eq!(bus.status(), state);
        }
    }
}
