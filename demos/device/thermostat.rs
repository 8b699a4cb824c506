use homie::{
    client::mqtt_client::rumqtt,
    device::{DeviceBuilder, Node, PropertyBuilder},
    types::Datatype,
};
use std::time::Duration;

use tokio::time;

use log::LevelFilter;

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .init();

    let opts = rumqtt::MqttOptions::new("thermostat", "localhost", 1883);
    let (eventloop, client) = rumqtt::EventLoop::new(opts, 10);

    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("thermostat")
        .with_name("Living room thermostat")
        .build()
        .unwrap();

    let node = Node::new("heating", "Heating", "thermostat")
        .unwrap()
        .with_property(
            PropertyBuilder::new("temperature", "Temperature", Datatype::Float)
                .unit("°C")
                .value(19.0)
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_property(
            PropertyBuilder::new("target", "Target temperature", Datatype::Float)
                .format(5.0..=30.0)
                .unit("°C")
                .value(21.0)
                .settable(|property, value| async move {
                    _ = property.set_value(value).await;
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_property(
            PropertyBuilder::new("mode", "Mode", Datatype::Enum)
                .format(["off", "heat", "eco"])
                .value("heat")
                .settable(|property, value| async move {
                    _ = property.set_value(value).await;
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();

    let temperature = device.property("heating", "temperature").unwrap();
    let target = device.property("heating", "target").unwrap();
    tokio::spawn(async move {
        let mut current = 19.0_f64;
        loop {
            time::sleep(Duration::from_secs(5)).await;
            if let Some(homie::types::Value::Float(goal)) = target.value() {
                current += (goal - current).clamp(-0.5, 0.5);
            }
            _ = temperature.set_value((current * 10.0).round() / 10.0).await;
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                println!("Failed to register CTRL-C handler: {e}");
            }
            _ = device.disconnect().await;
        }
        result = device.join() => {
            if let Err(e) = result {
                println!("Device stopped: {e}");
            }
        }
    }
}
