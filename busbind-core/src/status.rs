//! Interrupt-safe transfer status cell
//!
//! One cell per bus carries the outcome of the outstanding transfer from the
//! vendor driver's interrupt handler (the only writer of completions) to the
//! next API call (the only reader). The handoff is lock-free:
//!
//! - the API side arms the cell with [`TransferStatus::begin`] before the
//!   transfer is started, and later claims the outcome with
//!   [`TransferStatus::take`]
//! - the interrupt side stores the byte count and fault first, then flips
//!   the phase from `Busy` to `Done`/`Failed` with release ordering
//!
//! A completion arriving after the API side reset the cell finds the phase
//! no longer `Busy` and is dropped.

use busbind_hal::{BusFault, DriverError, EventSink, I2cEvent};
use portable_atomic::{AtomicI32, AtomicU8, AtomicUsize, Ordering};

const IDLE: u8 = 0;
const BUSY: u8 = 1;
const DONE: u8 = 2;
const FAILED: u8 = 3;

/// Outcome of a finished transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// All requested bytes moved
    Done { count: usize },
    /// Fault reported after `count` bytes
    Failed { fault: BusFault, count: usize },
}

/// Phase of the cell as seen by the API side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No transfer, or the last outcome was claimed
    Idle,
    /// Transfer outstanding
    Busy,
    /// Outcome waiting to be claimed
    Finished,
}

/// Single-producer/single-consumer status cell
pub struct TransferStatus {
    phase: AtomicU8,
    count: AtomicUsize,
    fault: AtomicU8,
    /// Vendor code of a [`DriverError::Specific`] fault
    code: AtomicI32,
}

impl TransferStatus {
    /// Create an idle cell
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(IDLE),
            count: AtomicUsize::new(0),
            fault: AtomicU8::new(0),
            code: AtomicI32::new(0),
        }
    }

    /// Arm the cell for a new transfer
    ///
    /// Any unclaimed outcome of an earlier transfer is discarded.
    pub fn begin(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.phase.store(BUSY, Ordering::Release);
    }

    /// Return to idle without an outcome
    pub fn reset(&self) {
        self.phase.store(IDLE, Ordering::Release);
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            BUSY => Phase::Busy,
            DONE | FAILED => Phase::Finished,
            _ => Phase::Idle,
        }
    }

    /// Whether a transfer is outstanding
    pub fn is_busy(&self) -> bool {
        self.phase() == Phase::Busy
    }

    /// Bytes reported so far for the current transfer
    pub fn transferred(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Claim the outcome of a finished transfer
    ///
    /// Returns `None` while the transfer is outstanding or when there is
    /// nothing to claim.
    pub fn take(&self) -> Option<Outcome> {
        let outcome = match self.phase.load(Ordering::Acquire) {
            DONE => Outcome::Done {
                count: self.count.load(Ordering::Relaxed),
            },
            FAILED => Outcome::Failed {
                fault: match decode_fault(self.fault.load(Ordering::Relaxed)) {
                    BusFault::Driver(DriverError::Specific(_)) => BusFault::Driver(
                        DriverError::Specific(self.code.load(Ordering::Relaxed)),
                    ),
                    fault => fault,
                },
                count: self.count.load(Ordering::Relaxed),
            },
            _ => return None,
        };
        self.phase.store(IDLE, Ordering::Release);
        Some(outcome)
    }

    /// Publish a final phase if the cell is still armed
    fn finish(&self, phase: u8) {
        // Ignored when reset() ran first
        let _ = self
            .phase
            .compare_exchange(BUSY, phase, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferStatus")
            .field("phase", &self.phase())
            .field("count", &self.transferred())
            .finish()
    }
}

impl EventSink for TransferStatus {
    fn signal(&self, event: I2cEvent) {
        if self.phase.load(Ordering::Acquire) != BUSY {
            return;
        }
        match event {
            I2cEvent::Progress { count } => {
                self.count.store(count, Ordering::Release);
            }
            I2cEvent::TransferDone { count } => {
                self.count.store(count, Ordering::Relaxed);
                self.finish(DONE);
            }
            I2cEvent::Fault { fault, count } => {
                self.count.store(count, Ordering::Relaxed);
                if let BusFault::Driver(DriverError::Specific(code)) = fault {
                    self.code.store(code, Ordering::Relaxed);
                }
                self.fault.store(encode_fault(fault), Ordering::Relaxed);
                self.finish(FAILED);
            }
        }
    }
}

fn encode_fault(fault: BusFault) -> u8 {
    use busbind_hal::DriverError::*;
    match fault {
        BusFault::AddressNack => 0,
        BusFault::DataNack => 1,
        BusFault::ArbitrationLost => 2,
        BusFault::BusError => 3,
        BusFault::Incomplete => 4,
        BusFault::Driver(Error) => 5,
        BusFault::Driver(Busy) => 6,
        BusFault::Driver(Timeout) => 7,
        BusFault::Driver(Unsupported) => 8,
        BusFault::Driver(Parameter) => 9,
        BusFault::Driver(Specific(_)) => 10,
    }
}

fn decode_fault(code: u8) -> BusFault {
    use busbind_hal::DriverError::*;
    match code {
        0 => BusFault::AddressNack,
        1 => BusFault::DataNack,
        2 => BusFault::ArbitrationLost,
        3 => BusFault::BusError,
        4 => BusFault::Incomplete,
        5 => BusFault::Driver(Error),
        6 => BusFault::Driver(Busy),
        7 => BusFault::Driver(Timeout),
        8 => BusFault::Driver(Unsupported),
        9 => BusFault::Driver(Parameter),
        // Code is kept beside the kind, see `take`
        _ => BusFault::Driver(Specific(0)),
    }
}
