//! Simulated I2C bus and vendor drivers for testing
//!
//! [`SimBus`] holds the simulated peers and records every transaction. Its
//! interrupt line [`SimIrq`] reports completion through the registered
//! [`EventSink`] either immediately or when a test fires it, through
//! [`SimBus::complete_pending`] or the [`I2cIrq`] entry points.
//! [`MockDriver`] and [`MockHandle`] expose the same simulated bus through
//! the two vendor driver shapes.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::driver::{Control, DriverError, DriverStatus, I2cDriver, PowerState};
use crate::i2c::{BusFault, BusSpeed, EventSink, I2cEvent, MAX_TRANSFER_LEN};
use crate::legacy::{
    DmaDescriptor, FrameEnd, HalStatus, HandleInit, HandleState, I2cIrq, LegacyI2cHandle,
    TransferMode,
};

/// Size of a simulated memory peer
pub const SIM_MEMORY_SIZE: usize = 256;

/// Behaviour of a simulated peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerKind {
    /// Reads return previously written bytes in FIFO order
    Loopback { fifo: Vec<u8> },
    /// Register-addressed memory (EEPROM-like)
    Memory {
        addr_size: u8,
        data: Vec<u8>,
        pointer: usize,
    },
    /// Acknowledges its address but NACKs every data byte
    NackData,
}

/// Simulated peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPeer {
    pub address: u8,
    pub kind: PeerKind,
}

/// When the simulated interrupt fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Inside the start call
    Immediate,
    /// When the test calls [`SimBus::complete_pending`]
    Deferred,
}

/// Transaction log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimTransaction {
    /// Write transaction
    Write { addr: u8, data: Vec<u8> },
    /// Read transaction
    Read { addr: u8, len: usize },
    /// Write then read joined by a repeated start
    WriteRead { addr: u8, data: Vec<u8>, len: usize },
}

/// Mode a legacy transfer ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Interrupt,
    Dma { stream: u8 },
}

#[derive(Debug, Default)]
struct LineState {
    sink: Option<&'static dyn EventSink>,
    pending: Option<I2cEvent>,
}

/// Interrupt line of a simulated bus
///
/// Holds the sink and the completion waiting for its interrupt. It is
/// `Sync`, so a test can fire it from another thread while the driver is
/// borrowed elsewhere.
#[derive(Debug, Default)]
pub struct SimIrq {
    state: Mutex<LineState>,
}

impl SimIrq {
    fn lock(&self) -> MutexGuard<'_, LineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(&self) -> Option<&'static dyn EventSink> {
        self.lock().sink
    }

    fn set_sink(&self, sink: Option<&'static dyn EventSink>) {
        self.lock().sink = sink;
    }

    fn park(&self, event: I2cEvent) {
        self.lock().pending = Some(event);
    }

    fn clear(&self) {
        self.lock().pending = None;
    }

    /// Whether a completion waits for its interrupt
    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Report the waiting completion if `accepts` it
    fn fire_if(&self, accepts: impl FnOnce(&I2cEvent) -> bool) -> bool {
        let mut state = self.lock();
        let (Some(event), Some(sink)) = (state.pending, state.sink) else {
            return false;
        };
        if !accepts(&event) {
            return false;
        }
        state.pending = None;
        drop(state);
        sink.signal(event);
        true
    }
}

impl I2cIrq for SimIrq {
    fn irq_event(&self) {
        self.fire_if(|e| matches!(e, I2cEvent::TransferDone { .. }));
    }

    fn irq_error(&self) {
        self.fire_if(|e| matches!(e, I2cEvent::Fault { .. }));
    }
}

/// Simulated bus state shared between a mock driver and the test
#[derive(Debug)]
pub struct SimBus {
    peers: Vec<SimPeer>,
    completion: Completion,
    line: &'static SimIrq,
    held: Option<u8>,
    received: Vec<u8>,
    progress: usize,
    transactions: Vec<SimTransaction>,
    modes: Vec<SimMode>,
    fault_next: Option<BusFault>,
    stall_after: Option<usize>,
    not_ready_attempts: u32,
    setup_calls: u32,
    max_speed: BusSpeed,
    speed: Option<BusSpeed>,
    reserved_dma: Vec<u8>,
}

impl core::fmt::Debug for dyn EventSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("EventSink")
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            completion: Completion::Immediate,
            line: Box::leak(Box::new(SimIrq::default())),
            held: None,
            received: Vec::new(),
            progress: 0,
            transactions: Vec::new(),
            modes: Vec::new(),
            fault_next: None,
            stall_after: None,
            not_ready_attempts: 0,
            setup_calls: 0,
            max_speed: BusSpeed::FastPlus,
            speed: None,
            reserved_dma: Vec::new(),
        }
    }
}

impl SimBus {
    /// Create a shared simulated bus
    pub fn shared() -> Rc<RefCell<SimBus>> {
        Rc::new(RefCell::new(SimBus::default()))
    }

    /// Add a loopback peer at `address`
    pub fn add_loopback(&mut self, address: u8) {
        self.peers.push(SimPeer {
            address,
            kind: PeerKind::Loopback { fifo: Vec::new() },
        });
    }

    /// Add a memory peer at `address` with `addr_size` register address bytes
    pub fn add_memory(&mut self, address: u8, addr_size: u8) {
        self.peers.push(SimPeer {
            address,
            kind: PeerKind::Memory {
                addr_size,
                data: vec![0; SIM_MEMORY_SIZE],
                pointer: 0,
            },
        });
    }

    /// Add a peer that NACKs data bytes
    pub fn add_nacking(&mut self, address: u8) {
        self.peers.push(SimPeer {
            address,
            kind: PeerKind::NackData,
        });
    }

    /// Select when completion is reported
    pub fn set_completion(&mut self, completion: Completion) {
        self.completion = completion;
    }

    /// Fail the next transfer with `fault`
    pub fn fail_next(&mut self, fault: BusFault) {
        self.fault_next = Some(fault);
    }

    /// Stall every transfer after `count` bytes; completion never fires
    pub fn stall_after(&mut self, count: Option<usize>) {
        self.stall_after = count;
    }

    /// Report "not ready" for the next `attempts` setup calls
    pub fn not_ready_for(&mut self, attempts: u32) {
        self.not_ready_attempts = attempts;
    }

    /// Fastest speed class the simulated controller accepts
    pub fn set_max_speed(&mut self, speed: BusSpeed) {
        self.max_speed = speed;
    }

    /// Speed class currently programmed, if any
    pub fn speed(&self) -> Option<BusSpeed> {
        self.speed
    }

    /// Number of setup (initialize/init) calls seen
    pub fn setup_calls(&self) -> u32 {
        self.setup_calls
    }

    /// Transaction log
    pub fn transactions(&self) -> Vec<SimTransaction> {
        self.transactions.clone()
    }

    /// Clear transaction log
    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    /// Modes legacy transfers ran in
    pub fn modes(&self) -> Vec<SimMode> {
        self.modes.clone()
    }

    /// DMA streams currently reserved
    pub fn reserved_dma(&self) -> Vec<u8> {
        self.reserved_dma.clone()
    }

    /// Peek at a memory peer's contents
    pub fn memory(&self, address: u8) -> Option<&[u8]> {
        self.peers.iter().find_map(|p| match &p.kind {
            PeerKind::Memory { data, .. } if p.address == address => Some(data.as_slice()),
            _ => None,
        })
    }

    /// Interrupt line of this bus
    pub fn irq(&self) -> &'static SimIrq {
        self.line
    }

    /// Whether a transfer waits for its simulated interrupt
    pub fn has_pending(&self) -> bool {
        self.line.has_pending()
    }

    /// Fire the simulated interrupt for the outstanding transfer
    ///
    /// Returns `false` if nothing was pending.
    pub fn complete_pending(&self) -> bool {
        self.line.fire_if(|_| true)
    }

    fn cancel_pending(&mut self) {
        self.line.clear();
        self.held = None;
    }

    fn attempt_setup(&mut self) -> bool {
        self.setup_calls += 1;
        if self.not_ready_attempts > 0 {
            self.not_ready_attempts -= 1;
            return false;
        }
        true
    }

    /// Start a write; with `hold` the bus is kept for a repeated start
    fn start_write(&mut self, addr: u8, data: &[u8], hold: bool) -> Result<(), DriverError> {
        if self.has_pending() {
            return Err(DriverError::Busy);
        }
        self.transactions.push(SimTransaction::Write {
            addr,
            data: data.to_vec(),
        });
        self.held = hold.then_some(addr);
        let event = self.run_write(addr, data);
        self.dispatch(event);
        Ok(())
    }

    fn start_read(&mut self, addr: u8, len: usize) -> Result<(), DriverError> {
        if self.has_pending() {
            return Err(DriverError::Busy);
        }
        if len > MAX_TRANSFER_LEN {
            return Err(DriverError::Parameter);
        }
        let entry = match self.held.take() {
            Some(held) if held == addr => match self.transactions.pop() {
                Some(SimTransaction::Write { data, .. }) => {
                    SimTransaction::WriteRead { addr, data, len }
                }
                other => {
                    self.transactions.extend(other);
                    SimTransaction::Read { addr, len }
                }
            },
            _ => SimTransaction::Read { addr, len },
        };
        self.transactions.push(entry);
        let event = self.run_read(addr, len);
        self.dispatch(event);
        Ok(())
    }

    fn run_write(&mut self, addr: u8, data: &[u8]) -> Option<I2cEvent> {
        self.progress = 0;
        if let Some(fault) = self.fault_next.take() {
            return Some(I2cEvent::Fault { fault, count: 0 });
        }
        let stall = self.stall_after;
        let Some(peer) = self.peers.iter_mut().find(|p| p.address == addr) else {
            return Some(I2cEvent::Fault {
                fault: BusFault::AddressNack,
                count: 0,
            });
        };
        let moved = stall.map_or(data.len(), |n| n.min(data.len()));
        match &mut peer.kind {
            PeerKind::Loopback { fifo } => fifo.extend_from_slice(&data[..moved]),
            PeerKind::Memory {
                addr_size,
                data: memory,
                pointer,
            } => {
                let header = (*addr_size as usize).min(moved);
                if header > 0 {
                    *pointer = data[..header]
                        .iter()
                        .fold(0usize, |acc, b| (acc << 8) | *b as usize)
                        % SIM_MEMORY_SIZE;
                }
                for b in &data[header..moved] {
                    memory[*pointer] = *b;
                    *pointer = (*pointer + 1) % SIM_MEMORY_SIZE;
                }
            }
            PeerKind::NackData if !data.is_empty() => {
                return Some(I2cEvent::Fault {
                    fault: BusFault::DataNack,
                    count: 0,
                });
            }
            PeerKind::NackData => {}
        }
        self.progress = moved;
        if stall.is_some_and(|n| n < data.len()) {
            return None;
        }
        Some(I2cEvent::TransferDone { count: moved })
    }

    fn run_read(&mut self, addr: u8, len: usize) -> Option<I2cEvent> {
        self.progress = 0;
        self.received.clear();
        if let Some(fault) = self.fault_next.take() {
            return Some(I2cEvent::Fault { fault, count: 0 });
        }
        let stall = self.stall_after;
        let Some(peer) = self.peers.iter_mut().find(|p| p.address == addr) else {
            return Some(I2cEvent::Fault {
                fault: BusFault::AddressNack,
                count: 0,
            });
        };
        let moved = stall.map_or(len, |n| n.min(len));
        match &mut peer.kind {
            PeerKind::Loopback { fifo } => {
                for _ in 0..moved {
                    let b = if fifo.is_empty() { 0xFF } else { fifo.remove(0) };
                    self.received.push(b);
                }
            }
            PeerKind::Memory {
                data: memory,
                pointer,
                ..
            } => {
                for _ in 0..moved {
                    self.received.push(memory[*pointer]);
                    *pointer = (*pointer + 1) % SIM_MEMORY_SIZE;
                }
            }
            PeerKind::NackData => self.received.resize(moved, 0xFF),
        }
        self.progress = moved;
        if stall.is_some_and(|n| n < len) {
            return None;
        }
        Some(I2cEvent::TransferDone { count: moved })
    }

    /// Report `event` now or park it for [`SimBus::complete_pending`]
    ///
    /// `None` means the transfer stalled: it stays pending with no
    /// completion ever queued.
    fn dispatch(&mut self, event: Option<I2cEvent>) {
        let sink = self.line.sink();
        let Some(event) = event else {
            if let Some(sink) = sink {
                sink.signal(I2cEvent::Progress {
                    count: self.progress,
                });
            }
            return;
        };
        match (self.completion, sink) {
            (Completion::Immediate, Some(sink)) => sink.signal(event),
            _ => self.line.park(event),
        }
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.received.len());
        buf[..n].copy_from_slice(&self.received[..n]);
        n
    }
}

/// Generic vendor driver backed by a [`SimBus`]
#[derive(Debug)]
pub struct MockDriver {
    sim: Rc<RefCell<SimBus>>,
    initialized: bool,
    powered: bool,
}

impl MockDriver {
    /// Create a driver on the shared simulated bus
    pub fn new(sim: Rc<RefCell<SimBus>>) -> Self {
        Self {
            sim,
            initialized: false,
            powered: false,
        }
    }
}

impl I2cDriver for MockDriver {
    fn initialize(&mut self, sink: &'static dyn EventSink) -> Result<(), DriverError> {
        let mut sim = self.sim.borrow_mut();
        if !sim.attempt_setup() {
            return Err(DriverError::Busy);
        }
        sim.line.set_sink(Some(sink));
        sim.cancel_pending();
        self.initialized = true;
        Ok(())
    }

    fn uninitialize(&mut self) -> Result<(), DriverError> {
        let mut sim = self.sim.borrow_mut();
        sim.line.set_sink(None);
        sim.cancel_pending();
        sim.speed = None;
        self.initialized = false;
        self.powered = false;
        Ok(())
    }

    fn power_control(&mut self, state: PowerState) -> Result<(), DriverError> {
        if !self.initialized {
            return Err(DriverError::Error);
        }
        self.powered = state == PowerState::Full;
        Ok(())
    }

    fn control(&mut self, control: Control) -> Result<(), DriverError> {
        let mut sim = self.sim.borrow_mut();
        match control {
            Control::BusSpeed(speed) if speed.nominal_hz() <= sim.max_speed.nominal_hz() => {
                sim.speed = Some(speed);
                Ok(())
            }
            Control::BusSpeed(_) => Err(DriverError::Unsupported),
            Control::OwnAddress(_) | Control::BusClear => Ok(()),
            Control::AbortTransfer => {
                sim.cancel_pending();
                Ok(())
            }
        }
    }

    fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        pending: bool,
    ) -> Result<(), DriverError> {
        if !self.powered {
            return Err(DriverError::Error);
        }
        self.sim.borrow_mut().start_write(address, data, pending)
    }

    fn master_receive(
        &mut self,
        address: u8,
        len: usize,
        _pending: bool,
    ) -> Result<(), DriverError> {
        if !self.powered {
            return Err(DriverError::Error);
        }
        self.sim.borrow_mut().start_read(address, len)
    }

    fn read_received(&mut self, buf: &mut [u8]) -> usize {
        self.sim.borrow_mut().take_received(buf)
    }

    fn data_count(&self) -> usize {
        self.sim.borrow().progress
    }

    fn status(&self) -> DriverStatus {
        DriverStatus {
            initialized: self.initialized,
            powered: self.powered,
            busy: self.sim.borrow().has_pending(),
            arbitration_lost: false,
            bus_error: false,
        }
    }
}

/// Legacy handle backed by a [`SimBus`]
///
/// In [`Completion::Deferred`] mode completion is only reported when the
/// bus's [`SimIrq`], handed out by [`LegacyI2cHandle::irq`], is fired,
/// mirroring a board whose interrupt vectors call into the handle.
#[derive(Debug)]
pub struct MockHandle {
    sim: Rc<RefCell<SimBus>>,
    state: HandleState,
    init: Option<HandleInit>,
}

impl MockHandle {
    /// Create a handle on the shared simulated bus
    pub fn new(sim: Rc<RefCell<SimBus>>) -> Self {
        Self {
            sim,
            state: HandleState::Reset,
            init: None,
        }
    }

    /// Init structure last programmed
    pub fn init_struct(&self) -> Option<HandleInit> {
        self.init
    }

    fn record_mode(&mut self, mode: TransferMode) {
        let mode = match mode {
            TransferMode::Interrupt => SimMode::Interrupt,
            TransferMode::Dma(d) => SimMode::Dma { stream: d.stream },
        };
        self.sim.borrow_mut().modes.push(mode);
    }
}

fn hal_status(e: DriverError) -> HalStatus {
    match e {
        DriverError::Busy => HalStatus::Busy,
        DriverError::Timeout => HalStatus::Timeout,
        _ => HalStatus::Error,
    }
}

impl LegacyI2cHandle for MockHandle {
    fn init(&mut self, init: &HandleInit) -> Result<(), HalStatus> {
        let mut sim = self.sim.borrow_mut();
        if !sim.attempt_setup() {
            return Err(HalStatus::Busy);
        }
        let speed = BusSpeed::for_frequency(init.clock_speed).ok_or(HalStatus::Error)?;
        if speed.nominal_hz() > sim.max_speed.nominal_hz() {
            return Err(HalStatus::Error);
        }
        sim.speed = Some(speed);
        sim.cancel_pending();
        self.init = Some(*init);
        self.state = HandleState::Ready;
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), HalStatus> {
        let mut sim = self.sim.borrow_mut();
        sim.cancel_pending();
        sim.speed = None;
        self.state = HandleState::Reset;
        Ok(())
    }

    fn state(&self) -> HandleState {
        if self.state == HandleState::Ready && self.sim.borrow().has_pending() {
            return HandleState::BusyTx;
        }
        self.state
    }

    fn baudrate(&self) -> u32 {
        // Timing registers can only produce the requested rate up to the
        // nominal rate of its class
        self.init.map_or(0, |i| i.clock_speed)
    }

    fn register_callbacks(&mut self, sink: &'static dyn EventSink) {
        self.sim.borrow().line.set_sink(Some(sink));
    }

    fn reserve_dma(&mut self, descriptor: &'static DmaDescriptor) -> Result<(), HalStatus> {
        let mut sim = self.sim.borrow_mut();
        if sim.reserved_dma.contains(&descriptor.stream) {
            return Err(HalStatus::Busy);
        }
        sim.reserved_dma.push(descriptor.stream);
        Ok(())
    }

    fn release_dma(&mut self, descriptor: &'static DmaDescriptor) {
        self.sim
            .borrow_mut()
            .reserved_dma
            .retain(|s| *s != descriptor.stream);
    }

    fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        mode: TransferMode,
        end: FrameEnd,
    ) -> Result<(), HalStatus> {
        if self.state != HandleState::Ready {
            return Err(HalStatus::Error);
        }
        self.record_mode(mode);
        self.sim
            .borrow_mut()
            .start_write(address, data, end == FrameEnd::Hold)
            .map_err(hal_status)
    }

    fn master_receive(
        &mut self,
        address: u8,
        len: usize,
        mode: TransferMode,
        _end: FrameEnd,
    ) -> Result<(), HalStatus> {
        if self.state != HandleState::Ready {
            return Err(HalStatus::Error);
        }
        self.record_mode(mode);
        self.sim
            .borrow_mut()
            .start_read(address, len)
            .map_err(hal_status)
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        self.sim.borrow_mut().take_received(buf)
    }

    fn transfer_count(&self) -> usize {
        self.sim.borrow().progress
    }

    fn irq(&self) -> &'static dyn I2cIrq {
        self.sim.borrow().line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<I2cEvent>>);

    impl EventSink for Recorder {
        fn signal(&self, event: I2cEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<I2cEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    fn recorder() -> &'static Recorder {
        Box::leak(Box::new(Recorder(Mutex::new(Vec::new()))))
    }

    fn powered(sim: &Rc<RefCell<SimBus>>, sink: &'static Recorder) -> MockDriver {
        let mut driver = MockDriver::new(sim.clone());
        driver.initialize(sink).unwrap();
        driver.power_control(PowerState::Full).unwrap();
        driver
    }

    #[test]
    fn test_loopback_returns_written_bytes() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x50, &[0xAA, 0xBB], false).unwrap();
        driver.master_receive(0x50, 2, false).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(driver.read_received(&mut buf), 2);
        assert_eq!(buf, [0xAA, 0xBB]);
        assert_eq!(
            sim.borrow().transactions(),
            vec![
                SimTransaction::Write {
                    addr: 0x50,
                    data: vec![0xAA, 0xBB]
                },
                SimTransaction::Read { addr: 0x50, len: 2 },
            ]
        );
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_memory_peer_register_pointer() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_memory(0x50, 1);
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x50, &[0x10, 1, 2, 3], false).unwrap();
        driver.master_transmit(0x50, &[0x11], false).unwrap();
        driver.master_receive(0x50, 2, false).unwrap();

        let mut buf = [0u8; 2];
        driver.read_received(&mut buf);
        assert_eq!(buf, [2, 3]);
        assert_eq!(&sim.borrow().memory(0x50).unwrap()[0x10..0x13], &[1, 2, 3]);
    }

    #[test]
    fn test_deferred_completion_holds_event() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        sim.borrow_mut().set_completion(Completion::Deferred);
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x50, &[1], false).unwrap();
        assert!(sink.events().is_empty());
        assert_eq!(
            driver.master_transmit(0x50, &[2], false),
            Err(DriverError::Busy)
        );

        assert!(sim.borrow_mut().complete_pending());
        assert_eq!(sink.events(), vec![I2cEvent::TransferDone { count: 1 }]);
    }

    #[test]
    fn test_absent_peer_nacks_address() {
        let sim = SimBus::shared();
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x33, &[], false).unwrap();
        assert_eq!(
            sink.events(),
            vec![I2cEvent::Fault {
                fault: BusFault::AddressNack,
                count: 0
            }]
        );
    }

    #[test]
    fn test_stall_reports_progress_only() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        sim.borrow_mut().stall_after(Some(3));
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x50, &[0; 8], false).unwrap();
        assert_eq!(driver.data_count(), 3);
        assert_eq!(sink.events(), vec![I2cEvent::Progress { count: 3 }]);
    }

    #[test]
    fn test_not_ready_attempts_count_down() {
        let sim = SimBus::shared();
        sim.borrow_mut().not_ready_for(2);
        let sink = recorder();
        let mut driver = MockDriver::new(sim.clone());

        assert_eq!(driver.initialize(sink), Err(DriverError::Busy));
        assert_eq!(driver.initialize(sink), Err(DriverError::Busy));
        assert_eq!(driver.initialize(sink), Ok(()));
        assert_eq!(sim.borrow().setup_calls(), 3);
    }

    #[test]
    fn test_handle_dma_reservation_is_exclusive() {
        static TX: DmaDescriptor = DmaDescriptor {
            controller: 1,
            stream: 6,
            request: 1,
        };
        let sim = SimBus::shared();
        let mut handle = MockHandle::new(sim.clone());

        assert_eq!(handle.reserve_dma(&TX), Ok(()));
        assert_eq!(handle.reserve_dma(&TX), Err(HalStatus::Busy));
        handle.release_dma(&TX);
        assert!(sim.borrow().reserved_dma().is_empty());
    }

    #[test]
    fn test_held_write_logged_with_following_read() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_memory(0x50, 1);
        let sink = recorder();
        let mut driver = powered(&sim, sink);

        driver.master_transmit(0x50, &[0x10, 9], false).unwrap();
        driver.master_transmit(0x50, &[0x10], true).unwrap();
        driver.master_receive(0x50, 1, false).unwrap();

        let mut buf = [0u8; 1];
        driver.read_received(&mut buf);
        assert_eq!(buf, [9]);
        assert_eq!(
            sim.borrow().transactions()[1..],
            [SimTransaction::WriteRead {
                addr: 0x50,
                data: vec![0x10],
                len: 1
            }]
        );
    }

    #[test]
    fn test_irq_line_fires_from_another_thread() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        sim.borrow_mut().set_completion(Completion::Deferred);
        let sink = recorder();
        let mut handle = MockHandle::new(sim.clone());
        handle.register_callbacks(sink);
        handle.init(&HandleInit::master(100_000)).unwrap();

        handle
            .master_transmit(0x50, &[1, 2], TransferMode::Interrupt, FrameEnd::Stop)
            .unwrap();
        assert_eq!(handle.state(), HandleState::BusyTx);

        let irq = handle.irq();
        std::thread::spawn(move || {
            // Nothing for the error vector on a clean transfer
            irq.irq_error();
            irq.irq_event();
        })
        .join()
        .unwrap();

        assert_eq!(sink.events(), vec![I2cEvent::TransferDone { count: 2 }]);
        assert_eq!(handle.state(), HandleState::Ready);
    }
}
