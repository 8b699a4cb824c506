//! [Homie](https://homieiot.github.io/) device development framework.
//!
//! Re-exports the crates of the workspace:
//!
//! - [device]: devices, nodes and properties (feature `device`, default)
//! - [types]: convention constants, datatypes and values
//! - [client]: the transport traits, with the [rumqttc](https://crates.io/crates/rumqttc)
//!   based implementation under [client::mqtt_client::rumqtt] (feature `rumqtt-client`, default)

#[cfg(feature = "device")]
pub use homie_device as device;
pub use homie_types as types;
pub mod client {
  pub use homie_client::*;

  #[cfg(feature = "rumqtt-client")]
  pub mod mqtt_client {
    pub use homie_client_rumqtt as rumqtt;
  }
}
