//! Event registry between the push-channel transport and the dashboard.
//!
//! Subscribers run in registration order. A subscriber that returns an error is
//! logged and skipped; the remaining subscribers still see the event.

use crate::power::PowerDelta;
use std::collections::HashMap;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataReceived,
    Connected,
    Disconnected,
    Reconnecting,
    Error,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::DataReceived => "data_received",
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Reconnecting => "reconnecting",
            EventKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Data(PowerDelta),
    Connected,
    Disconnected,
    Reconnecting,
    Error(String),
}

impl SocketEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SocketEvent::Data(_) => EventKind::DataReceived,
            SocketEvent::Connected => EventKind::Connected,
            SocketEvent::Disconnected => EventKind::Disconnected,
            SocketEvent::Reconnecting => EventKind::Reconnecting,
            SocketEvent::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Subscriber = Box<dyn FnMut(&SocketEvent) -> anyhow::Result<()>>;

#[derive(Default)]
pub struct EventRegistry {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, Subscriber)>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&SocketEvent) -> anyhow::Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Box::new(subscriber)));
        id
    }

    /// Register the same subscriber for several kinds.
    pub fn on_many<F>(&mut self, kinds: &[EventKind], subscriber: F) -> Vec<SubscriptionId>
    where
        F: FnMut(&SocketEvent) -> anyhow::Result<()> + Clone + 'static,
    {
        kinds
            .iter()
            .map(|kind| self.on(*kind, subscriber.clone()))
            .collect()
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        warn!("Unknown subscription: {:?}", id);
        false
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Deliver an event; returns how many subscribers handled it without error.
    pub fn emit(&mut self, event: &SocketEvent) -> usize {
        let kind = event.kind();
        let Some(list) = self.subscribers.get_mut(&kind) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, subscriber) in list.iter_mut() {
            match subscriber(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!("Subscriber {:?} for {} failed: {:#}", id, kind.name(), e);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::Phase;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribers_run_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();

        for n in 0..3 {
            let seen = seen.clone();
            registry.on(EventKind::Connected, move |_| {
                seen.borrow_mut().push(n);
                Ok(())
            });
        }

        assert_eq!(registry.emit(&SocketEvent::Connected), 3);
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_subscriber_does_not_stop_others() {
        let hits = Rc::new(RefCell::new(0));
        let mut registry = EventRegistry::new();

        registry.on(EventKind::DataReceived, |_| Err(anyhow::anyhow!("render blew up")));
        let counter = hits.clone();
        registry.on(EventKind::DataReceived, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        let delivered = registry.emit(&SocketEvent::Data(PowerDelta::single(Phase::L0, 1.0)));

        assert_eq!(delivered, 1);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_events_only_reach_their_kind() {
        let hits = Rc::new(RefCell::new(0));
        let mut registry = EventRegistry::new();
        let counter = hits.clone();
        registry.on(EventKind::Disconnected, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        registry.emit(&SocketEvent::Connected);
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_off_removes_subscriber() {
        let mut registry = EventRegistry::new();
        let id = registry.on(EventKind::Error, |_| Ok(()));

        assert!(registry.off(id));
        assert!(!registry.off(id));
        assert_eq!(registry.subscriber_count(EventKind::Error), 0);
    }
}
