//! Runtime-facing surface of the peripheral object
//!
//! The scripting runtime sees each bus as an `I2C` object. This module holds
//! what the runtime glue needs beyond the object's methods: the type tag, the
//! role constants it exposes, and the textual representation.

use core::fmt;

use crate::adapter::{Capability, Transport};
use crate::config::Role;
use crate::peripheral::I2cPeripheral;

/// Name of the object type in the runtime
pub const TYPE_NAME: &str = "I2C";

/// Runtime value of the `I2C.MASTER` constant
pub const MASTER: i32 = 0;

/// Type identity registered with the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TypeTag {
    /// Type name
    pub name: &'static str,
    /// Vendor shape this build binds to
    pub capability: Capability,
}

impl<T: Transport> I2cPeripheral<T> {
    /// Type identity of objects backed by `T`
    pub const TYPE_TAG: TypeTag = TypeTag {
        name: TYPE_NAME,
        capability: T::CAPABILITY,
    };
}

/// Convert a runtime role constant
///
/// Returns `None` for anything other than [`MASTER`].
pub fn parse_role(value: i32) -> Option<Role> {
    match value {
        MASTER => Some(Role::Master),
        _ => None,
    }
}

/// Runtime name of a role constant
pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Master => "MASTER",
    }
}

impl<T: Transport> fmt::Display for I2cPeripheral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.active_config() {
            Some(active) => write!(
                f,
                "{}({}, {}.{}, freq={})",
                TYPE_NAME,
                self.bus(),
                TYPE_NAME,
                role_name(active.role),
                active.frequency
            ),
            None => write!(f, "{}({})", TYPE_NAME, self.bus()),
        }
    }
}
