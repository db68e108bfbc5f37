//! Event system for state-change notifications.
//!
//! The hub produces [`Event`]s while it holds the device lock and
//! dispatches them after releasing it. Dispatching never blocks; a
//! [`NotificationSink`] consumes them on its own task through
//! [`forward_notifications`].

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::connection::ConnectionState;
use crate::device::AlarmKind;
use crate::error::Result;

/// Opaque identifier of the chat a command came from.
pub type OriginId = i64;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The service started.
    Started,
    /// The connection state changed.
    ConnectionChanged(ConnectionState),
    /// A sensor crossed an alarm's trigger threshold.
    AlarmRaised {
        device: String,
        temperature: f64,
        threshold: f64,
        kind: AlarmKind,
    },
    /// A sensor crossed back over an alarm's release threshold.
    AlarmCleared {
        device: String,
        temperature: f64,
        threshold: f64,
        kind: AlarmKind,
    },
    /// A user command was applied to a device.
    CommandApplied {
        author: String,
        command: String,
        origin: Option<OriginId>,
    },
}

impl Event {
    /// Human-readable text for the notification sink.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Started => "Server started".to_owned(),
            Self::ConnectionChanged(state) => state.message().to_owned(),
            Self::AlarmRaised {
                device,
                temperature,
                threshold,
                kind,
            } => format!(
                "{device} alarm {temperature:.1} {} {threshold:.1}",
                kind.raise_operator()
            ),
            Self::AlarmCleared {
                device,
                temperature,
                threshold,
                kind,
            } => format!(
                "{device} back to normal {temperature:.1} {} {threshold:.1}",
                kind.clear_operator()
            ),
            Self::CommandApplied {
                author, command, ..
            } => format!("{author} {command}"),
        }
    }

    /// The chat that should not receive this notification, if any.
    #[must_use]
    pub const fn exclude_origin(&self) -> Option<OriginId> {
        match self {
            Self::CommandApplied { origin, .. } => *origin,
            _ => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("notification subscriber lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-dispatched event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Drains every already-dispatched event.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        tracing::debug!("event: {}", event.message());
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Dispatches several events in order.
    pub fn dispatch_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.dispatch(event);
        }
    }

    /// Subscribes to events dispatched from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }
}

/// Receiver of human-readable notifications, e.g. a chat broadcaster.
///
/// Delivery is best effort: errors are logged by the forwarder and never
/// reach the hub.
pub trait NotificationSink: Send + Sync {
    /// Sends `text` to every recipient except `exclude_origin`.
    fn broadcast<'a>(
        &'a self,
        text: &'a str,
        exclude_origin: Option<OriginId>,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn broadcast<'a>(
        &'a self,
        text: &'a str,
        exclude_origin: Option<OriginId>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match exclude_origin {
                Some(origin) => tracing::info!("notify (except {}): {}", origin, text),
                None => tracing::info!("notify: {}", text),
            }
            Ok(())
        })
    }
}

/// Feeds every event from `subscription` to `sink` until the dispatcher is
/// dropped.
pub async fn forward_notifications<S: NotificationSink>(mut subscription: Subscription, sink: S) {
    while let Some(event) = subscription.recv().await {
        let text = event.message();
        if let Err(e) = sink.broadcast(&text, event.exclude_origin()).await {
            tracing::error!("failed to deliver notification {:?}: {}", text, e);
        }
    }
    tracing::debug!("notification forwarder stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<(String, Option<OriginId>)>>>,
        fail: bool,
    }

    impl NotificationSink for RecordingSink {
        fn broadcast<'a>(
            &'a self,
            text: &'a str,
            exclude_origin: Option<OriginId>,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.sent
                    .lock()
                    .unwrap()
                    .push((text.to_owned(), exclude_origin));
                if self.fail {
                    return Err(Error::Notification {
                        message: "chat unreachable".into(),
                    });
                }
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(Event::ConnectionChanged(ConnectionState::Responding));

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), sub.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(Event::ConnectionChanged(ConnectionState::Responding))
        );
    }

    #[test]
    fn test_alarm_messages() {
        let raised = Event::AlarmRaised {
            device: "Boiler".into(),
            temperature: 26.5,
            threshold: 25.0,
            kind: AlarmKind::Upper,
        };
        assert_eq!(raised.message(), "Boiler alarm 26.5 >= 25.0");

        let frost = Event::AlarmRaised {
            device: "Cellar".into(),
            temperature: 4.0,
            threshold: 5.0,
            kind: AlarmKind::Lower,
        };
        assert_eq!(frost.message(), "Cellar alarm 4.0 <= 5.0");

        let cleared = Event::AlarmCleared {
            device: "Cellar".into(),
            temperature: 6.04,
            threshold: 6.0,
            kind: AlarmKind::Lower,
        };
        assert_eq!(cleared.message(), "Cellar back to normal 6.0 >= 6.0");
    }

    #[test]
    fn test_command_event_excludes_origin() {
        let event = Event::CommandApplied {
            author: "Alice".into(),
            command: "turn on Pump".into(),
            origin: Some(42),
        };
        assert_eq!(event.message(), "Alice turn on Pump");
        assert_eq!(event.exclude_origin(), Some(42));
        assert_eq!(Event::Started.exclude_origin(), None);
    }

    #[tokio::test]
    async fn test_forwarder_swallows_sink_errors() {
        let dispatcher = EventDispatcher::new(16);
        let sub = dispatcher.subscribe();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            sent: Arc::clone(&sent),
            fail: true,
        };

        dispatcher.dispatch(Event::Started);
        dispatcher.dispatch(Event::CommandApplied {
            author: "Bob".into(),
            command: "turn off Pump".into(),
            origin: Some(7),
        });
        drop(dispatcher);

        forward_notifications(sub, sink).await;

        let sent = sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                ("Server started".to_owned(), None),
                ("Bob turn off Pump".to_owned(), Some(7)),
            ]
        );
    }

    #[test]
    fn test_drain_is_non_blocking() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();
        assert!(sub.drain().is_empty());

        dispatcher.dispatch_all([Event::Started, Event::Started]);
        assert_eq!(sub.drain().len(), 2);
    }
}
