//! Part of [homie](https://crates.io/crates/homie), a [Homie](https://homieiot.github.io/) device development library.
//!
//! This library defines the convention's constants, topic layout, identifier grammar and the
//! per-datatype validation and serialization of property values.

pub mod constants;
pub mod topic;
pub mod utils;

mod datatype;
mod duration;
mod error;
mod format;
mod value;

pub use datatype::*;
pub use duration::*;
pub use error::*;
pub use format::*;
pub use value::*;

use std::fmt;

/// The lifecycle state a device announces on its `$state` topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Init,
    Ready,
    /// Only ever published by the broker on behalf of the device, through its last will
    Lost,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Init => constants::STATE_INIT,
            DeviceState::Ready => constants::STATE_READY,
            DeviceState::Lost => constants::STATE_LOST,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
