// ── Event bus ──
//
// Typed publish/subscribe hub between the connection layer and consumers.
// Listeners are stored type-erased per `EventKind` but every call site is
// typed through a `Topic` marker, so a listener for `topic::NewAlert`
// can only ever receive an `Alert`.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, trace};

use crate::model::{Event, EventKind};

/// A subscribed callback. Compared by pointer identity on removal.
pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
///
/// Keep the returned `Arc` around if you intend to unsubscribe later.
pub fn listener<P, F>(f: F) -> Listener<P>
where
    F: Fn(&P) + Send + Sync + 'static,
{
    Arc::new(f)
}

mod sealed {
    pub trait Sealed {}
}

/// Binds an event name to its payload type.
///
/// Sealed: the set of topics is exactly the [`topic`] markers.
pub trait Topic: sealed::Sealed + 'static {
    const KIND: EventKind;
    type Payload: Send + Sync + 'static;
}

/// Marker types, one per public event name.
pub mod topic {
    use serde_json::Value;

    use super::{Topic, sealed};
    use crate::model::{Alert, EventKind, MlPrediction, SensorSnapshot, StatusUpdate};

    macro_rules! topics {
        ($($(#[$meta:meta])* $name:ident => $payload:ty;)*) => {
            $(
                $(#[$meta])*
                #[derive(Debug, Clone, Copy)]
                pub struct $name;

                impl sealed::Sealed for $name {}

                impl Topic for $name {
                    const KIND: EventKind = EventKind::$name;
                    type Payload = $payload;
                }
            )*
        };
    }

    topics! {
        /// `new_alert`: canonical alert records.
        NewAlert => Alert;
        /// `alert_update`: acknowledgement / resolution changes.
        AlertUpdate => Alert;
        /// `system_status_update`: mirrored sensor, ML and health reports.
        SystemStatusUpdate => StatusUpdate;
        SensorUpdate => SensorSnapshot;
        MlAnalysis => MlPrediction;
        PatternAnalysis => Value;
        /// `fire_alert`: the raw hazard push, before normalization.
        FireAlert => crate::model::FireAlert;
        PipelineSummary => Value;
        Status => Value;
        /// `connection_status`: emitted on every connection state change.
        ConnectionStatus => crate::model::ConnectionStatus;
    }
}

/// Publish/subscribe registry.
///
/// Safe to share across tasks (`Arc<EventBus>`). Publication is
/// synchronous: listeners run on the publishing task, in subscription
/// order.
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<EventKind, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.listeners.len())
            .finish()
    }
}

fn slot<P: 'static>(erased: &(dyn Any + Send + Sync)) -> Option<&Vec<Listener<P>>> {
    erased.downcast_ref()
}

fn slot_mut<P: 'static>(erased: &mut (dyn Any + Send + Sync)) -> Option<&mut Vec<Listener<P>>> {
    erased.downcast_mut()
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `T`. The same listener may be registered
    /// under several topics (or several times under one).
    pub fn subscribe<T: Topic>(&self, listener: Listener<T::Payload>) {
        let mut entry = self
            .listeners
            .entry(T::KIND)
            .or_insert_with(|| Box::new(Vec::<Listener<T::Payload>>::new()));
        if let Some(list) = slot_mut::<T::Payload>(&mut **entry) {
            list.push(listener);
        }
    }

    /// Remove the first registration of `listener` for `T`.
    ///
    /// Returns `false` if it was not registered.
    pub fn unsubscribe<T: Topic>(&self, listener: &Listener<T::Payload>) -> bool {
        let Some(mut entry) = self.listeners.get_mut(&T::KIND) else {
            return false;
        };
        let Some(list) = slot_mut::<T::Payload>(&mut **entry) else {
            return false;
        };
        match list.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver `payload` to every listener registered for `T` right now.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn publish<T: Topic>(&self, payload: &T::Payload) {
        // Snapshot so listeners can (un)subscribe re-entrantly.
        let snapshot: Vec<Listener<T::Payload>> = match self.listeners.get(&T::KIND) {
            Some(entry) => slot::<T::Payload>(&**entry).cloned().unwrap_or_default(),
            None => return,
        };

        trace!(event = %T::KIND, listeners = snapshot.len(), "publish");
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                error!(event = %T::KIND, "event listener panicked");
            }
        }
    }

    /// Route an erased [`Event`] to its typed topic.
    pub fn dispatch(&self, event: &Event) {
        match event {
            Event::NewAlert(p) => self.publish::<topic::NewAlert>(p),
            Event::AlertUpdate(p) => self.publish::<topic::AlertUpdate>(p),
            Event::SystemStatusUpdate(p) => self.publish::<topic::SystemStatusUpdate>(p),
            Event::SensorUpdate(p) => self.publish::<topic::SensorUpdate>(p),
            Event::MlAnalysis(p) => self.publish::<topic::MlAnalysis>(p),
            Event::PatternAnalysis(p) => self.publish::<topic::PatternAnalysis>(p),
            Event::FireAlert(p) => self.publish::<topic::FireAlert>(p),
            Event::PipelineSummary(p) => self.publish::<topic::PipelineSummary>(p),
            Event::Status(p) => self.publish::<topic::Status>(p),
            Event::ConnectionStatus(p) => self.publish::<topic::ConnectionStatus>(p),
        }
    }

    /// Number of registrations currently held for `T`.
    pub fn listener_count<T: Topic>(&self) -> usize {
        self.listeners
            .get(&T::KIND)
            .and_then(|entry| slot::<T::Payload>(&**entry).map(Vec::len))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::ConnectionStatus;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener<serde_json::Value>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: &'static str| {
            let sink = Arc::clone(&sink);
            listener(move |v: &serde_json::Value| {
                sink.lock().unwrap().push(format!("{tag}:{v}"));
            })
        };
        (log, make)
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe::<topic::Status>(make("a"));
        bus.subscribe::<topic::Status>(make("b"));
        bus.subscribe::<topic::Status>(make("c"));
        bus.publish::<topic::Status>(&json!(1));

        assert_eq!(*log.lock().unwrap(), ["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn publish_without_listeners_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish::<topic::NewAlert>(&serde_json::from_value(json!({
            "id": "a", "timestamp": "t"
        })).unwrap());
        assert_eq!(bus.listener_count::<topic::NewAlert>(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe::<topic::PipelineSummary>(make("first"));
        bus.subscribe::<topic::PipelineSummary>(listener(|_: &serde_json::Value| {
            panic!("listener bug");
        }));
        bus.subscribe::<topic::PipelineSummary>(make("third"));

        bus.publish::<topic::PipelineSummary>(&json!("x"));

        assert_eq!(*log.lock().unwrap(), [r#"first:"x""#, r#"third:"x""#]);
    }

    #[test]
    fn unsubscribe_removes_only_first_match() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let l = listener(move |_: &serde_json::Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.subscribe::<topic::Status>(Arc::clone(&l));
        bus.subscribe::<topic::Status>(Arc::clone(&l));
        assert!(bus.unsubscribe::<topic::Status>(&l));
        assert_eq!(bus.listener_count::<topic::Status>(), 1);

        bus.publish::<topic::Status>(&json!(null));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_unknown_listener_is_silent() {
        let bus = EventBus::new();
        let l = listener(|_: &serde_json::Value| {});
        assert!(!bus.unsubscribe::<topic::Status>(&l));

        bus.subscribe::<topic::Status>(listener(|_: &serde_json::Value| {}));
        assert!(!bus.unsubscribe::<topic::Status>(&l));
        assert_eq!(bus.listener_count::<topic::Status>(), 1);
    }

    #[test]
    fn same_listener_under_two_topics() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let l = make("shared");

        bus.subscribe::<topic::PatternAnalysis>(Arc::clone(&l));
        bus.subscribe::<topic::PipelineSummary>(Arc::clone(&l));
        bus.unsubscribe::<topic::PatternAnalysis>(&l);

        bus.publish::<topic::PatternAnalysis>(&json!(1));
        bus.publish::<topic::PipelineSummary>(&json!(2));

        assert_eq!(*log.lock().unwrap(), ["shared:2"]);
    }

    #[test]
    fn listener_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe::<topic::Status>(listener(move |_: &serde_json::Value| {
            inner.subscribe::<topic::Status>(listener(|_: &serde_json::Value| {}));
        }));

        bus.publish::<topic::Status>(&json!(null));
        assert_eq!(bus.listener_count::<topic::Status>(), 2);
    }

    #[test]
    fn dispatch_routes_by_variant() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.subscribe::<topic::ConnectionStatus>(listener(move |s: &ConnectionStatus| {
            *sink.lock().unwrap() = Some(s.clone());
        }));

        bus.dispatch(&Event::ConnectionStatus(ConnectionStatus::websocket()));
        bus.dispatch(&Event::Status(json!("ignored by this listener")));

        assert_eq!(*seen.lock().unwrap(), Some(ConnectionStatus::websocket()));
    }
}
