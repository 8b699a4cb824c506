use std::{
    any::Any,
    sync::{atomic::Ordering, Arc},
};

use homie_client::{DynEventLoop, Event, InboundMessage};
use homie_types::topic::parse_command_topic;
use log::{debug, info, trace};
use tokio::{
    select,
    task::{JoinError, JoinSet},
};

use crate::{
    device::DeviceShared,
    error::RoutingError,
    tree::Route,
    PropertyHandle,
};

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

fn check_child(result: Result<(), JoinError>) -> Result<(), RoutingError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_panic() => Err(RoutingError::CallbackPanicked(panic_message(e.into_panic()))),
        Err(_) => Ok(()),
    }
}

struct Router {
    shared: Arc<DeviceShared>,
    children: JoinSet<()>,
}

impl Router {
    fn on_online(&mut self) {
        if !self.shared.online_once.swap(true, Ordering::SeqCst) {
            info!("Device online. device={}", self.shared.topic);
            return;
        }
        info!("Device reconnected, restoring session. device={}", self.shared.topic);
        let out = self.shared.tree.lock().unwrap().recover();
        let shared = self.shared.clone();
        // Sent from a child task so the event loop keeps being polled
        self.children.spawn(async move {
            _ = shared.flush(out).await;
        });
    }

    fn on_message(&mut self, message: InboundMessage) {
        let target = parse_command_topic(&self.shared.topic, &message.topic);
        let route = match &target {
            Some(target) => self
                .shared
                .tree
                .lock()
                .unwrap()
                .route(target.node_id, target.property_id),
            None => Route::OutOfBand,
        };

        match (route, target) {
            (Route::Settable(callback, parser), Some(target)) => {
                let Ok(payload) = String::from_utf8(message.payload) else {
                    debug!("Dropping command with non UTF-8 payload. topic={}", message.topic);
                    return;
                };
                let handle = PropertyHandle::new(
                    self.shared.clone(),
                    target.node_id,
                    target.property_id,
                );
                let topic = message.topic;
                // User validator and callback code runs in the child, never under the tree lock
                self.children.spawn(async move {
                    match parser.parse(&payload) {
                        Some(value) => callback(handle, value).await,
                        None => debug!("Dropping invalid command. topic={topic}"),
                    }
                });
            }
            _ => match &self.shared.out_of_band {
                Some(handler) => {
                    debug!("Routing out of band message. topic={}", message.topic);
                    handler(message.topic.as_str(), message.payload.as_slice());
                }
                None => trace!("Ignoring message. topic={}", message.topic),
            },
        }
    }

    fn handle_event(&mut self, event: Event) {
        trace!("Event: {event:?}");
        match event {
            Event::Online => self.on_online(),
            Event::Offline => info!("Device offline. device={}", self.shared.topic),
            Event::Message(message) => self.on_message(message),
            Event::Subscribed | Event::Unsubscribed => (),
        }
    }
}

/// Route inbound events until the event stream ends.
///
/// Command validation and callbacks run as child tasks of the router. A panicking child ends
/// routing with [RoutingError::CallbackPanicked].
pub(crate) async fn run(
    shared: Arc<DeviceShared>,
    mut eventloop: Box<DynEventLoop>,
) -> Result<(), RoutingError> {
    let mut router = Router {
        shared,
        children: JoinSet::new(),
    };
    loop {
        select! {
            event = eventloop.poll() => match event {
                Some(event) => router.handle_event(event),
                None => break,
            },
            Some(result) = router.children.join_next() => check_child(result)?,
        }
    }
    debug!("Event stream ended. device={}", router.shared.topic);
    while let Some(result) = router.children.join_next().await {
        check_child(result)?;
    }
    Ok(())
}
