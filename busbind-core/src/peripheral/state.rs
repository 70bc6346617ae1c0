//! Peripheral object state machine
//!
//! The lifecycle of a bus object is a function of its current state and a
//! lifecycle event. `Busy` is only entered by starting a transfer and only
//! left by its completion or by deinitialization.

/// Peripheral object states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralState {
    /// Not configured; transfers are refused
    #[default]
    Uninitialized,
    /// Configured and idle
    Ready,
    /// A transfer is outstanding
    Busy,
}

/// Lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Configuration applied successfully
    Configured,
    /// Hardware reset at the start of (re)initialization, or a failed one
    Reset,
    /// Transfer started
    TransferStarted,
    /// Outstanding transfer completed
    TransferFinished,
    /// Object deinitialized
    Deinitialized,
}

impl PeripheralState {
    /// Check if a new transfer may start
    pub fn accepts_transfer(&self) -> bool {
        matches!(self, PeripheralState::Ready)
    }

    /// Check if (re)configuration may start
    pub fn accepts_configure(&self) -> bool {
        !matches!(self, PeripheralState::Busy)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use PeripheralState::*;

        match (self, event) {
            // Uninitialized transitions
            (Uninitialized, Configured) => Ready,

            // Ready transitions
            (Ready, Configured) => Ready,
            (Ready, Reset) => Uninitialized,
            (Ready, TransferStarted) => Busy,
            (Ready, Deinitialized) => Uninitialized,

            // Busy transitions
            (Busy, TransferFinished) => Ready,
            (Busy, Deinitialized) => Uninitialized,

            // Default: stay in current state
            _ => self,
        }
    }
}
