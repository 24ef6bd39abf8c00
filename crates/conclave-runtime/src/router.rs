//! Topic-keyed message router.
//!
//! Agents never hold references to each other. Everything crosses the
//! router: inter-agent messages on the recipient's topic, transcript
//! updates for observers, lifecycle signals for the supervisor, and
//! broadcast events for session viewers.
//!
//! Delivery is synchronous and in publish order. Handlers are cloned out of
//! the table before they run, so a handler may publish or subscribe without
//! deadlocking the router. Handlers must not block.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use conclave_core::events::SessionEvent;
use conclave_core::messages::{AgentMessage, Message};
use conclave_core::roles::AgentRole;
use parking_lot::RwLock;
use tracing::trace;

/// Where an envelope is published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Messages addressed to one agent.
    Agent(AgentRole),
    /// Transcript growth, for projections.
    Transcript,
    /// Agent lifecycle signals, for the supervisor.
    Lifecycle,
    /// Session events, for viewers.
    Broadcast,
}

/// Agent lifecycle changes the supervisor tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The agent finished a turn and may run another.
    TurnCompleted(AgentRole),
    /// The agent reached Complete.
    Completed(AgentRole),
    /// A Complete agent was reactivated by an incoming message.
    Resumed(AgentRole),
}

/// A routed payload.
#[derive(Clone, Debug)]
pub enum Envelope {
    /// An inter-agent or system message.
    Message(AgentMessage),
    /// Entries appended to an agent's transcript.
    TranscriptUpdate {
        /// Owning agent.
        role: AgentRole,
        /// Newly appended entries, in append order.
        entries: Vec<Message>,
    },
    /// A lifecycle change.
    Lifecycle(LifecycleSignal),
    /// A session event.
    Event(SessionEvent),
}

/// Handle returned by [`MessageRouter::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Synchronous publish/subscribe over [`Topic`]s.
#[derive(Default)]
pub struct MessageRouter {
    next_id: AtomicU64,
    topics: RwLock<HashMap<Topic, Vec<(SubscriptionId, Handler)>>>,
}

impl MessageRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every envelope published on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .write()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        trace!(?topic, ?id, "router subscription added");
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        for handlers in topics.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sid, _)| *sid == id) {
                let _ = handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `envelope` to every subscriber of `topic`, in subscription
    /// order. Returns how many handlers ran.
    pub fn publish(&self, topic: Topic, envelope: &Envelope) -> usize {
        let handlers: Vec<Handler> = self
            .topics
            .read()
            .get(&topic)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }

    /// Whether anything listens on `topic`.
    pub fn has_subscribers(&self, topic: Topic) -> bool {
        self.topics.read().get(&topic).is_some_and(|hs| !hs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::roles::Sender;
    use parking_lot::Mutex;

    fn message(to: AgentRole, content: &str) -> Envelope {
        Envelope::Message(AgentMessage::system(to, content))
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(&Envelope) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |env: &Envelope| {
            if let Envelope::Message(m) = env {
                sink.lock().push(m.content.clone());
            }
        };
        (seen, handler)
    }

    #[test]
    fn publish_reaches_only_topic_subscribers() {
        let router = MessageRouter::new();
        let (backend, h1) = collector();
        let (frontend, h2) = collector();
        let _ = router.subscribe(Topic::Agent(AgentRole::Backend), h1);
        let _ = router.subscribe(Topic::Agent(AgentRole::Frontend), h2);

        let delivered = router.publish(
            Topic::Agent(AgentRole::Backend),
            &message(AgentRole::Backend, "hi"),
        );
        assert_eq!(delivered, 1);
        assert_eq!(backend.lock().as_slice(), ["hi"]);
        assert!(frontend.lock().is_empty());
    }

    #[test]
    fn delivery_preserves_publish_order() {
        let router = MessageRouter::new();
        let (seen, handler) = collector();
        let _ = router.subscribe(Topic::Agent(AgentRole::Devops), handler);
        for n in 0..5 {
            let _ = router.publish(
                Topic::Agent(AgentRole::Devops),
                &message(AgentRole::Devops, &n.to_string()),
            );
        }
        assert_eq!(seen.lock().as_slice(), ["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let router = MessageRouter::new();
        let (seen, handler) = collector();
        let id = router.subscribe(Topic::Agent(AgentRole::Backend), handler);
        assert!(router.unsubscribe(id));
        assert!(!router.unsubscribe(id));
        assert_eq!(
            router.publish(Topic::Agent(AgentRole::Backend), &message(AgentRole::Backend, "x")),
            0
        );
        assert!(seen.lock().is_empty());
        assert!(!router.has_subscribers(Topic::Agent(AgentRole::Backend)));
    }

    #[test]
    fn handler_may_republish() {
        let router = Arc::new(MessageRouter::new());
        let (seen, handler) = collector();
        let _ = router.subscribe(Topic::Agent(AgentRole::Frontend), handler);
        let relay = Arc::clone(&router);
        let _ = router.subscribe(Topic::Agent(AgentRole::Backend), move |env| {
            if let Envelope::Message(m) = env {
                let forwarded = AgentMessage::new(
                    Sender::Agent(AgentRole::Backend),
                    AgentRole::Frontend,
                    m.content.clone(),
                    m.delivery,
                );
                let _ = relay.publish(
                    Topic::Agent(AgentRole::Frontend),
                    &Envelope::Message(forwarded),
                );
            }
        });
        let _ = router.publish(
            Topic::Agent(AgentRole::Backend),
            &message(AgentRole::Backend, "relay me"),
        );
        assert_eq!(seen.lock().as_slice(), ["relay me"]);
    }

    #[test]
    fn lifecycle_topic_is_separate() {
        let router = MessageRouter::new();
        let signals = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&signals);
        let _ = router.subscribe(Topic::Lifecycle, move |env| {
            if let Envelope::Lifecycle(s) = env {
                sink.lock().push(*s);
            }
        });
        let _ = router.publish(
            Topic::Lifecycle,
            &Envelope::Lifecycle(LifecycleSignal::Completed(AgentRole::Devops)),
        );
        assert_eq!(
            signals.lock().as_slice(),
            [LifecycleSignal::Completed(AgentRole::Devops)]
        );
    }
}
