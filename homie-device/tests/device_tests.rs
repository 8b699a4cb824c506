mod utils;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use homie_client::{
    channel::{ChannelEventLoop, OutboundMessage},
    Event, LastWill, PublishMessage,
};
use homie_device::{
    DeviceBuilder, HomieError, Node, PropertyBuilder, PropertyHandle, RoutingError,
};
use homie_types::{topic::QoS, Color, ColorModel, Datatype, DeviceState, Value, ValueError};
use tokio::{sync::mpsc, time::timeout};
use utils::tester::{
    assert_quiet, create_device, drain, expect_publish, publishes, recv, send_command,
    send_message, state_changes, subscriptions,
};

fn recording_property(
    id: &str,
    datatype: Datatype,
) -> (PropertyBuilder, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let builder = PropertyBuilder::new(id, id, datatype).settable(move |_, value| {
        let tx = tx.clone();
        async move {
            _ = tx.send(value);
        }
    });
    (builder, rx)
}

async fn next_value(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("callback was not invoked")
        .unwrap()
}

async fn assert_no_value(rx: &mut mpsc::UnboundedReceiver<Value>) {
    let result = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(result.is_err(), "callback invoked with {result:?}");
}

#[tokio::test]
async fn builder_validation() {
    let (eventloop, client, _) = ChannelEventLoop::new();
    let result = DeviceBuilder::new(eventloop, client)
        .with_id("Bad_Id")
        .with_name("Device")
        .build();
    assert_eq!(
        result.err(),
        Some(HomieError::Value(ValueError::InvalidIdentifier(
            "Bad_Id".into()
        )))
    );

    let (eventloop, client, _) = ChannelEventLoop::new();
    let result = DeviceBuilder::new(eventloop, client).with_id("d1").build();
    assert_eq!(
        result.err(),
        Some(HomieError::MissingConfiguration("device name"))
    );

    let (eventloop, client, _) = ChannelEventLoop::new();
    let result = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .with_root_topic("homie/#")
        .build();
    assert!(matches!(
        result.err(),
        Some(HomieError::Value(ValueError::InvalidRootTopic(_)))
    ));
}

#[tokio::test]
async fn last_will_is_registered() {
    let (eventloop, client, broker) = ChannelEventLoop::new();
    let device = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .with_root_topic("devices/home")
        .build()
        .unwrap();
    assert_eq!(device.topic(), "devices/home/d1");
    assert_eq!(device.state(), DeviceState::Init);
    assert_eq!(
        broker.last_will(),
        Some(LastWill::new_device("devices/home/d1"))
    );
    assert_eq!(
        broker.last_will().unwrap().payload,
        b"lost".to_vec()
    );
}

#[tokio::test]
async fn end_to_end_publish() {
    let (mut device, mut broker) = create_device("d1");
    let (temp, _rx) = recording_property("temp", Datatype::Integer);
    let node = Node::new("n1", "Sensor", "sensor")
        .unwrap()
        .with_property(temp.format(0..=100).build().unwrap())
        .unwrap();
    device.add_node(node).await.unwrap();
    assert_quiet(&mut broker).await;

    device.publish().await.unwrap();
    expect_publish(&mut broker, "homie/d1/$homie", Some("4.0.0")).await;
    expect_publish(&mut broker, "homie/d1/$name", Some("Test device")).await;
    expect_publish(&mut broker, "homie/d1/$state", Some("init")).await;
    expect_publish(&mut broker, "homie/d1/$nodes", Some("n1")).await;
    expect_publish(&mut broker, "homie/d1/n1/$name", Some("Sensor")).await;
    expect_publish(&mut broker, "homie/d1/n1/$type", Some("sensor")).await;
    expect_publish(&mut broker, "homie/d1/n1/$properties", Some("temp")).await;
    expect_publish(&mut broker, "homie/d1/n1/temp/$name", Some("temp")).await;
    expect_publish(&mut broker, "homie/d1/n1/temp/$datatype", Some("integer")).await;
    expect_publish(&mut broker, "homie/d1/n1/temp/$format", Some("0:100")).await;
    expect_publish(&mut broker, "homie/d1/n1/temp/$settable", Some("true")).await;
    match recv(&mut broker).await {
        OutboundMessage::Subscribe(filters) => {
            assert_eq!(filters.len(), 1);
            assert_eq!(filters[0].topic, "homie/d1/n1/temp/set");
            assert_eq!(filters[0].qos, QoS::AtLeastOnce);
        }
        message => panic!("expected subscribe, got {message:?}"),
    }
    expect_publish(&mut broker, "homie/d1/$state", Some("ready")).await;
    assert!(device.is_published());
    assert_eq!(device.state(), DeviceState::Ready);

    // Idempotent
    device.publish().await.unwrap();
    assert_quiet(&mut broker).await;
}

#[tokio::test]
async fn announcements_are_retained() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("level", "Level", Datatype::Float)
                .unit("%")
                .value(12.5)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    let messages = drain(&mut broker).await;
    for message in messages {
        if let OutboundMessage::Publish(message) = message {
            assert!(message.retain, "{} not retained", message.topic);
            assert_eq!(message.qos, QoS::AtLeastOnce);
        }
    }
}

#[tokio::test]
async fn second_node_after_publish() {
    let (mut device, mut broker) = create_device("d1");
    device
        .add_node(Node::new("n1", "First", "type").unwrap())
        .await
        .unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    let node = Node::new("n2", "Second", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("p1", "Prop", Datatype::Boolean)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();

    let messages = publishes(&drain(&mut broker).await);
    let topics = messages.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>();
    assert_eq!(
        topics,
        vec![
            "homie/d1/$state",
            "homie/d1/n2/$name",
            "homie/d1/n2/$type",
            "homie/d1/n2/$properties",
            "homie/d1/n2/p1/$name",
            "homie/d1/n2/p1/$datatype",
            "homie/d1/$nodes",
            "homie/d1/$state",
        ]
    );
    assert_eq!(messages[0].1.as_deref(), Some("init"));
    assert_eq!(messages[6].1.as_deref(), Some("n1,n2"));
    assert_eq!(messages[7].1.as_deref(), Some("ready"));
    assert_eq!(device.node_ids(), vec!["n1", "n2"]);
}

#[tokio::test]
async fn duplicate_ids_leave_tree_unchanged() {
    let (mut device, mut broker) = create_device("d1");
    device
        .add_node(Node::new("n1", "First", "type").unwrap())
        .await
        .unwrap();
    let result = device
        .add_node(Node::new("n1", "Again", "type").unwrap())
        .await;
    assert_eq!(result, Err(HomieError::DuplicateIdentifier("n1".into())));
    assert_eq!(device.node_count(), 1);

    device.publish().await.unwrap();
    drain(&mut broker).await;

    let result = device
        .with_reconfiguration(|ctx| {
            let mut node = ctx.node("n1")?;
            node.add_property(
                PropertyBuilder::new("p1", "Prop", Datatype::String)
                    .build()
                    .unwrap(),
            )?;
            node.add_property(
                PropertyBuilder::new("p1", "Prop", Datatype::String)
                    .build()
                    .unwrap(),
            )
        })
        .await;
    assert_eq!(result, Err(HomieError::DuplicateIdentifier("p1".into())));
    assert!(device.property("n1", "p1").is_some());

    let messages = drain(&mut broker).await;
    assert_eq!(state_changes(&messages, "homie/d1"), vec!["init", "ready"]);
    assert_eq!(device.state(), DeviceState::Ready);
}

#[tokio::test]
async fn remove_node_after_publish() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("p1", "Prop", Datatype::Integer)
                .value(4)
                .settable(|_, _| async {})
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    assert!(device.remove_node("n1").await.unwrap());
    let messages = drain(&mut broker).await;
    assert!(messages.contains(&OutboundMessage::Unsubscribe(
        "homie/d1/n1/p1/set".into()
    )));
    let published = publishes(&messages);
    for topic in [
        "homie/d1/n1/$name",
        "homie/d1/n1/$type",
        "homie/d1/n1/$properties",
        "homie/d1/n1/p1/$name",
        "homie/d1/n1/p1/$settable",
        "homie/d1/n1/p1",
    ] {
        assert!(
            published.contains(&(topic.to_string(), None)),
            "{topic} not cleared"
        );
    }
    assert!(published.contains(&("homie/d1/$nodes".to_string(), Some(String::new()))));
    assert!(!device.remove_node("n1").await.unwrap());
}

#[tokio::test]
async fn retained_value_assignment() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("level", "Level", Datatype::Integer)
                .value(1)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    let level = device.property("n1", "level").unwrap();
    level.set_value(1).await.unwrap();
    assert_quiet(&mut broker).await;

    level.set_value(2).await.unwrap();
    assert_eq!(
        drain(&mut broker).await,
        vec![OutboundMessage::Publish(PublishMessage::new(
            "homie/d1/n1/level",
            Some("2".into()),
            true,
            QoS::AtLeastOnce
        ))]
    );
    assert_eq!(level.value(), Some(Value::Integer(2)));

    assert_eq!(
        level.set_value("high").await,
        Err(HomieError::Value(ValueError::ValueTypeMismatch {
            expected: Datatype::Integer,
            found: Datatype::String
        }))
    );
}

#[tokio::test]
async fn non_retained_value_assignment() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("button", "Button", Datatype::Enum)
                .format(["press", "release"])
                .retained(false)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    let announced = publishes(&drain(&mut broker).await);
    assert!(announced.contains(&(
        "homie/d1/n1/button/$retained".to_string(),
        Some("false".to_string())
    )));

    let button = device.property("n1", "button").unwrap();
    for _ in 0..2 {
        button.set_value("press").await.unwrap();
        assert_eq!(
            drain(&mut broker).await,
            vec![OutboundMessage::Publish(PublishMessage::new(
                "homie/d1/n1/button",
                Some("press".into()),
                false,
                QoS::AtLeastOnce
            ))]
        );
    }
    assert_eq!(button.value(), None);
}

#[tokio::test]
async fn batch_update_sends_one_batch() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(PropertyBuilder::new("a", "A", Datatype::Integer).build().unwrap())
        .unwrap()
        .with_property(PropertyBuilder::new("b", "B", Datatype::Float).build().unwrap())
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    device
        .batch_update("n1", [("a", Value::Integer(1)), ("b", Value::Integer(2))])
        .await
        .unwrap();
    assert_eq!(
        publishes(&drain(&mut broker).await),
        vec![
            ("homie/d1/n1/a".to_string(), Some("1".to_string())),
            ("homie/d1/n1/b".to_string(), Some("2".to_string())),
        ]
    );

    let result = device
        .batch_update("n1", [("a", Value::Integer(5)), ("b", Value::Boolean(true))])
        .await;
    assert!(result.is_err());
    assert_quiet(&mut broker).await;
    assert_eq!(
        device.property("n1", "a").unwrap().value(),
        Some(Value::Integer(1))
    );
}

#[tokio::test]
async fn metadata_changes_are_reannounced() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("level", "Level", Datatype::Integer)
                .format(0..=10)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    let level = device.property("n1", "level").unwrap();
    level.set_format(0..=20).await.unwrap();
    level.set_unit("%").await.unwrap();
    level.set_name("Brightness").await.unwrap();
    let published = publishes(&drain(&mut broker).await);
    assert!(published.contains(&("homie/d1/n1/level/$format".into(), Some("0:20".into()))));
    assert!(published.contains(&("homie/d1/n1/level/$unit".into(), Some("%".into()))));
    assert!(published.contains(&(
        "homie/d1/n1/level/$name".into(),
        Some("Brightness".into())
    )));

    assert_eq!(
        level.set_format(5..).await,
        Err(HomieError::Value(ValueError::AmbiguousRange))
    );
    level.clear_unit().await.unwrap();
    let published = publishes(&drain(&mut broker).await);
    assert!(published.contains(&("homie/d1/n1/level/$unit".into(), None)));
    assert_eq!(level.full_name().unwrap(), "Node Brightness");
}

#[tokio::test]
async fn metadata_disabled() {
    let (eventloop, client, mut broker) = ChannelEventLoop::new();
    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .with_metadata(false)
        .build()
        .unwrap();
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("p1", "Prop", Datatype::Integer)
                .value(3)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    let topics = publishes(&drain(&mut broker).await)
        .into_iter()
        .map(|(t, _)| t)
        .collect::<Vec<_>>();
    assert!(topics.contains(&"homie/d1/n1/$name".to_string()));
    assert!(topics.contains(&"homie/d1/n1/p1".to_string()));
    assert!(!topics.iter().any(|t| t.starts_with("homie/d1/n1/p1/$")));
}

#[tokio::test]
async fn boolean_commands() {
    let (mut device, mut broker) = create_device("d1");
    let (power, mut rx) = recording_property("power", Datatype::Boolean);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(power.build().unwrap())
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "true");
    assert_eq!(next_value(&mut rx).await, Value::Boolean(true));
    send_command(&broker, "homie/d1/n1/power/set", "false");
    assert_eq!(next_value(&mut rx).await, Value::Boolean(false));
    for payload in ["TRUE", "1", "on", ""] {
        send_command(&broker, "homie/d1/n1/power/set", payload);
    }
    assert_no_value(&mut rx).await;

    send_message(&broker, "homie/d1/n1/power/set", &[0xff, 0xfe], false);
    assert_no_value(&mut rx).await;
}

#[tokio::test]
async fn integer_and_color_commands() {
    let (mut device, mut broker) = create_device("d1");
    let (level, mut level_rx) = recording_property("level", Datatype::Integer);
    let (color, mut color_rx) = recording_property("color", Datatype::Color);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(level.format("0:10").build().unwrap())
        .unwrap()
        .with_property(color.format(ColorModel::Hsv).build().unwrap())
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/level/set", "5");
    assert_eq!(next_value(&mut level_rx).await, Value::Integer(5));
    send_command(&broker, "homie/d1/n1/level/set", "11");
    send_command(&broker, "homie/d1/n1/level/set", "abc");
    assert_no_value(&mut level_rx).await;

    send_command(&broker, "homie/d1/n1/color/set", "200,50,50");
    assert_eq!(
        next_value(&mut color_rx).await,
        Value::Color(Color(200, 50, 50))
    );
    send_command(&broker, "homie/d1/n1/color/set", "200,300,50");
    send_command(&broker, "homie/d1/n1/color/set", "1000,0,0");
    assert_no_value(&mut color_rx).await;
}

#[tokio::test]
async fn callback_sets_value() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("power", "Power", Datatype::Boolean)
                .value(false)
                .settable(|property, value| async move {
                    property.set_value(value).await.unwrap();
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "true");
    expect_publish(&mut broker, "homie/d1/n1/power", Some("true")).await;
    assert_eq!(
        device.property("n1", "power").unwrap().value(),
        Some(Value::Boolean(true))
    );
}

#[tokio::test]
async fn fallback_validator() {
    let (mut device, mut broker) = create_device("d1");
    let (power, mut rx) = recording_property("power", Datatype::Boolean);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            power
                .validator(|raw| match raw {
                    "on" => Some(Value::Boolean(true)),
                    "off" => Some(Value::Boolean(false)),
                    _ => None,
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "on");
    assert_eq!(next_value(&mut rx).await, Value::Boolean(true));
    send_command(&broker, "homie/d1/n1/power/set", "maybe");
    assert_no_value(&mut rx).await;
}

#[tokio::test]
async fn out_of_band_messages() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (eventloop, client, mut broker) = ChannelEventLoop::new();
    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .with_out_of_band_handler({
            let received = received.clone();
            move |topic, payload| {
                received
                    .lock()
                    .unwrap()
                    .push((topic.to_string(), payload.to_vec()))
            }
        })
        .build()
        .unwrap();
    let (power, mut rx) = recording_property("power", Datatype::Boolean);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(power.build().unwrap())
        .unwrap()
        .with_property(
            PropertyBuilder::new("level", "Level", Datatype::Integer)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/level/set", "3");
    send_command(&broker, "homie/d1/n1/missing/set", "3");
    send_command(&broker, "homie/other", "x");
    // Rejected commands for settable properties are not forwarded
    send_command(&broker, "homie/d1/n1/power/set", "nope");
    send_command(&broker, "homie/d1/n1/power/set", "true");
    assert_eq!(next_value(&mut rx).await, Value::Boolean(true));

    let received = received.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![
            ("homie/d1/n1/level/set".to_string(), b"3".to_vec()),
            ("homie/d1/n1/missing/set".to_string(), b"3".to_vec()),
            ("homie/other".to_string(), b"x".to_vec()),
        ]
    );
}

#[tokio::test]
async fn reconnect_recovery() {
    let (mut device, mut broker) = create_device("d1");
    let (power, _rx) = recording_property("power", Datatype::Boolean);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(power.build().unwrap())
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();

    broker.tx_event.send(Event::Online).unwrap();
    drain(&mut broker).await;

    broker.tx_event.send(Event::Offline).unwrap();
    broker.tx_event.send(Event::Online).unwrap();
    let messages = drain(&mut broker).await;
    assert_eq!(subscriptions(&messages), vec!["homie/d1/n1/power/set"]);
    assert_eq!(state_changes(&messages, "homie/d1"), vec!["init", "ready"]);
}

#[tokio::test]
async fn clear_topics_before_publish() {
    let (mut device, mut broker) = create_device("d1");
    broker.tx_event.send(Event::Online).unwrap();
    send_message(&broker, "homie/d1/$name", b"Old", true);
    send_message(&broker, "homie/d1/old/$name", b"Old node", true);
    send_message(&broker, "homie/d1/old/$name", b"Old node", true);
    send_message(&broker, "homie/d1/live", b"1", false);
    send_message(&broker, "homie/d1/empty", b"", true);
    broker.tx_event.send(Event::Unsubscribed).unwrap();

    device.clear_topics().await.unwrap();

    match recv(&mut broker).await {
        OutboundMessage::Subscribe(filters) => assert_eq!(filters[0].topic, "homie/d1/#"),
        message => panic!("expected subscribe, got {message:?}"),
    }
    assert_eq!(
        recv(&mut broker).await,
        OutboundMessage::Unsubscribe("homie/d1/#".into())
    );
    assert_eq!(
        drain(&mut broker).await,
        vec![
            OutboundMessage::Publish(PublishMessage::clear("homie/d1/$name")),
            OutboundMessage::Publish(PublishMessage::clear("homie/d1/old/$name")),
        ]
    );

    device.publish().await.unwrap();
    assert_eq!(
        device.clear_topics().await,
        Err(HomieError::AlreadyPublished)
    );
}

#[tokio::test]
async fn callback_panic_surfaces_at_join() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("power", "Power", Datatype::Boolean)
                .settable(|_, _| async { panic!("boom") })
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "true");
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(
        result,
        Err(HomieError::RoutingTask(RoutingError::CallbackPanicked(
            "boom".into()
        )))
    );
}

#[tokio::test]
async fn callback_panic_before_await_surfaces_at_join() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("power", "Power", Datatype::Boolean)
                .settable(|_, _| {
                    if true {
                        panic!("boom before await");
                    }
                    async {}
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "true");
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(
        result,
        Err(HomieError::RoutingTask(RoutingError::CallbackPanicked(
            "boom before await".into()
        )))
    );
}

#[tokio::test]
async fn validator_panic_leaves_device_usable() {
    let (mut device, mut broker) = create_device("d1");
    let (power, _rx) = recording_property("power", Datatype::Boolean);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            power
                .validator(|_| panic!("validator boom"))
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;

    send_command(&broker, "homie/d1/n1/power/set", "maybe");
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(
        result,
        Err(HomieError::RoutingTask(RoutingError::CallbackPanicked(
            "validator boom".into()
        )))
    );

    assert_eq!(device.state(), DeviceState::Ready);
    let power = device.property("n1", "power").unwrap();
    assert_eq!(power.value(), None);
    device.disconnect().await.unwrap();
    assert_eq!(recv(&mut broker).await, OutboundMessage::Disconnect);
    assert!(!device.is_published());
}

#[tokio::test]
async fn validator_can_read_the_device() {
    let (mut device, mut broker) = create_device("d1");
    let handle: Arc<Mutex<Option<PropertyHandle>>> = Arc::default();
    let (level, mut rx) = recording_property("level", Datatype::Integer);
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            level
                .value(4)
                .validator({
                    let handle = handle.clone();
                    move |raw| {
                        let level = handle.lock().unwrap().clone()?;
                        (raw == "same").then(|| level.value()).flatten()
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;
    *handle.lock().unwrap() = device.property("n1", "level");

    send_command(&broker, "homie/d1/n1/level/set", "same");
    assert_eq!(next_value(&mut rx).await, Value::Integer(4));
}

#[tokio::test]
async fn out_of_band_panic_surfaces_at_join() {
    let (eventloop, client, broker) = ChannelEventLoop::new();
    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .with_out_of_band_handler(|_, _| panic!("handler failed"))
        .build()
        .unwrap();
    device.publish().await.unwrap();

    send_command(&broker, "homie/d1/x", "1");
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(
        result,
        Err(HomieError::RoutingTask(RoutingError::TaskPanicked(
            "handler failed".into()
        )))
    );
}

#[tokio::test]
async fn join_after_event_stream_ends() {
    let (eventloop, client, broker) = ChannelEventLoop::new();
    let mut device = DeviceBuilder::new(eventloop, client)
        .with_id("d1")
        .with_name("Device")
        .build()
        .unwrap();
    device.publish().await.unwrap();
    drop(broker);
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn disconnect() {
    let (mut device, mut broker) = create_device("d1");
    let node = Node::new("n1", "Node", "type")
        .unwrap()
        .with_property(
            PropertyBuilder::new("level", "Level", Datatype::Integer)
                .build()
                .unwrap(),
        )
        .unwrap();
    device.add_node(node).await.unwrap();
    device.publish().await.unwrap();
    drain(&mut broker).await;
    let level = device.property("n1", "level").unwrap();

    device.disconnect().await.unwrap();
    assert_eq!(recv(&mut broker).await, OutboundMessage::Disconnect);
    assert!(!device.is_published());
    let result = timeout(Duration::from_secs(1), device.join()).await.unwrap();
    assert_eq!(result, Ok(()));

    // Values are still cached but no longer sent
    level.set_value(7).await.unwrap();
    assert_eq!(level.value(), Some(Value::Integer(7)));
    assert_eq!(
        device
            .add_node(Node::new("n2", "Node", "type").unwrap())
            .await,
        Err(HomieError::Disconnected)
    );
    assert_eq!(device.publish().await, Err(HomieError::Disconnected));
    assert_quiet(&mut broker).await;
}
