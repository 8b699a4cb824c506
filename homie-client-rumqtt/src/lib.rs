//! Part of [homie](https://crates.io/crates/homie), a [Homie](https://homieiot.github.io/) device development library.
//!
//! A [homie_client::Client] and [homie_client::EventLoop] implementation using [rumqttc]

mod client;

pub use client::{Client, EventLoop};
pub use rumqttc::v5::MqttOptions;
