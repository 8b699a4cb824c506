use homie::{
    client::mqtt_client::rumqtt,
    device::{DeviceBuilder, Node, PropertyBuilder},
    types::{utils::escape_id, Color, ColorModel, Datatype, Value},
};

use log::{info, LevelFilter};

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .init();

    let opts = rumqtt::MqttOptions::new("light", "localhost", 1883);
    let (eventloop, client) = rumqtt::EventLoop::new(opts, 10);

    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id(escape_id("Kitchen Light"))
        .with_name("Kitchen light")
        .with_out_of_band_handler(|topic, payload| {
            info!("Message on {topic}: {} bytes", payload.len());
        })
        .build()
        .unwrap();

    let node = Node::new("lamp", "Lamp", "light")
        .unwrap()
        .with_property(
            PropertyBuilder::new("power", "Power", Datatype::Boolean)
                .value(false)
                .settable(|property, value| async move {
                    _ = property.set_value(value).await;
                })
                // Accept the payloads of switches that do not speak the convention
                .validator(|raw| match raw {
                    "ON" | "on" => Some(Value::Boolean(true)),
                    "OFF" | "off" => Some(Value::Boolean(false)),
                    _ => None,
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_property(
            PropertyBuilder::new("color", "Color", Datatype::Color)
                .format(ColorModel::Rgb)
                .value(Color(255, 255, 255))
                .settable(|property, value| async move {
                    _ = property.set_value(value).await;
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_property(
            PropertyBuilder::new("brightness", "Brightness", Datatype::Integer)
                .format(0..=100)
                .unit("%")
                .value(100)
                .settable(|property, value| async move {
                    _ = property.set_value(value).await;
                })
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_property(
            PropertyBuilder::new("scene", "Scene", Datatype::Enum)
                .format(["reading", "dinner", "night"])
                .retained(false)
                .settable(|property, value| async move {
                    info!("Activating scene {value}");
                    _ = property.set_value(value).await;
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();

    if let Err(e) = tokio::signal::ctrl_c().await {
        println!("Failed to register CTRL-C handler: {e}");
    }
    _ = device.disconnect().await;
    _ = device.join().await;
}
