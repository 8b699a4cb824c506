use homie::{client::mqtt_client::rumqtt, device::DeviceBuilder};

use log::LevelFilter;

/// Remove everything a previous run of the `light` demo left retained on the broker.
#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .init();

    let opts = rumqtt::MqttOptions::new("light-cleanup", "localhost", 1883);
    let (eventloop, client) = rumqtt::EventLoop::new(opts, 10);

    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("kitchen-light")
        .with_name("Kitchen light")
        .build()
        .unwrap();

    match device.clear_topics().await {
        Ok(()) => println!("Cleared retained topics of {}", device.topic()),
        Err(e) => println!("Failed to clear topics: {e}"),
    }
    _ = device.disconnect().await;
}
