//! Typed payment lifecycle events.
//!
//! A process holds one [`EventBus`], created at startup and threaded
//! through the facilitator, settler, verifier, and client engine.
//! Events are delivered to every subscriber before `emit` returns and
//! are retained in a bounded ring buffer (default 1000). Listener
//! panics are swallowed and logged; they never abort the emitter.

use alloy_primitives::B256;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::amount::TokenAmount;
use crate::networks::Network;

/// Default ring-buffer capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// The fixed set of payment lifecycle event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// A 402 was received and an option selected.
    #[serde(rename = "payment:initiated")]
    Initiated,
    /// The client signed an authorization.
    #[serde(rename = "payment:signed")]
    Signed,
    /// The facilitator accepted a payment.
    #[serde(rename = "payment:verified")]
    Verified,
    /// Settlement confirmed on-chain.
    #[serde(rename = "payment:settled")]
    Settled,
    /// Verification or settlement failed terminally.
    #[serde(rename = "payment:failed")]
    Failed,
    /// A refund was recorded by an external consumer.
    #[serde(rename = "payment:refunded")]
    Refunded,
    /// A streaming response began.
    #[serde(rename = "payment:stream_started")]
    StreamStarted,
    /// A streaming chunk was delivered.
    #[serde(rename = "payment:stream_chunk")]
    StreamChunk,
    /// A streaming response ended.
    #[serde(rename = "payment:stream_ended")]
    StreamEnded,
}

impl EventKind {
    /// The canonical event name (e.g. `"payment:settled"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "payment:initiated",
            Self::Signed => "payment:signed",
            Self::Verified => "payment:verified",
            Self::Settled => "payment:settled",
            Self::Failed => "payment:failed",
            Self::Refunded => "payment:refunded",
            Self::StreamStarted => "payment:stream_started",
            Self::StreamChunk => "payment:stream_chunk",
            Self::StreamEnded => "payment:stream_ended",
        }
    }
}

/// An immutable lifecycle event record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// The event name.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Emission time in Unix milliseconds.
    pub timestamp: u64,
    /// The resource URL involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The amount involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<TokenAmount>,
    /// The network involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// The settlement transaction hash, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// The error message, for failure events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form metadata attached by the emitter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PaymentEvent {
    /// Creates an event of the given kind stamped with the current time.
    #[must_use]
    pub fn now(kind: EventKind) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            kind,
            timestamp,
            url: None,
            amount: None,
            network: None,
            tx_hash: None,
            error: None,
            metadata: None,
        }
    }

    /// Attaches the resource URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches the amount.
    #[must_use]
    pub fn with_amount(mut self, amount: TokenAmount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attaches the network.
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    /// Attaches the transaction hash.
    #[must_use]
    pub fn with_tx_hash(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Attaches an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

type Listener = Arc<dyn Fn(&PaymentEvent) + Send + Sync>;

struct Registration {
    id: u64,
    filter: Option<EventKind>,
    listener: Listener,
}

struct Inner {
    next_id: u64,
    registrations: Vec<Registration>,
    buffer: VecDeque<PaymentEvent>,
    capacity: usize,
}

/// Cheaply cloneable handle to a shared event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("subscribers", &inner.registrations.len())
            .field("buffered", &inner.buffer.len())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with the default ring-buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a bus with a custom ring-buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                registrations: Vec::new(),
                buffer: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY)),
                capacity,
            })),
        }
    }

    /// Subscribes to a single event kind. Returns an unsubscribe handle.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&PaymentEvent) + Send + Sync + 'static,
    {
        self.subscribe(Some(kind), Arc::new(listener))
    }

    /// Subscribes to every event kind. Returns an unsubscribe handle.
    pub fn on_all<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PaymentEvent) + Send + Sync + 'static,
    {
        self.subscribe(None, Arc::new(listener))
    }

    fn subscribe(&self, filter: Option<EventKind>, listener: Listener) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.registrations.push(Registration { id, filter, listener });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Emits an event: appends it to the ring buffer and delivers it to
    /// every matching subscriber, in subscription order, before returning.
    pub fn emit(&self, event: PaymentEvent) {
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.lock();
            if inner.buffer.len() == inner.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(event.clone());
            inner
                .registrations
                .iter()
                .filter(|r| r.filter.is_none_or(|k| k == event.kind))
                .map(|r| Arc::clone(&r.listener))
                .collect()
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::warn!(event = event.kind.as_str(), "event listener panicked");
            }
        }
    }

    /// Returns up to `n` most recent events, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<PaymentEvent> {
        let inner = self.inner.lock();
        let skip = inner.buffer.len().saturating_sub(n);
        inner.buffer.iter().skip(skip).cloned().collect()
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::on_all`].
///
/// Call [`Subscription::unsubscribe`] to detach the listener; dropping
/// the handle leaves the subscription active.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Mutex<Inner>>,
}

impl Subscription {
    /// Removes the listener from the bus, if the bus is still alive.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.lock().registrations.retain(|r| r.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_to_filtered_and_global_subscribers() {
        let bus = EventBus::new();
        let settled = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        let settled_count = Arc::clone(&settled);
        let _sub = bus.on(EventKind::Settled, move |_| {
            settled_count.fetch_add(1, Ordering::SeqCst);
        });
        let all_count = Arc::clone(&all);
        let _sub_all = bus.on_all(move |_| {
            all_count.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(PaymentEvent::now(EventKind::Settled));
        bus.emit(PaymentEvent::now(EventKind::Failed));

        assert_eq!(settled.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_detaches_listener() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = bus.on_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(PaymentEvent::now(EventKind::Initiated));
        sub.unsubscribe();
        bus.emit(PaymentEvent::now(EventKind::Initiated));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let bus = EventBus::with_capacity(3);
        for _ in 0..10 {
            bus.emit(PaymentEvent::now(EventKind::Signed));
        }
        assert_eq!(bus.recent(100).len(), 3);
    }

    #[test]
    fn panicking_listener_does_not_abort_emit() {
        let bus = EventBus::new();
        let _sub = bus.on_all(|_| panic!("listener bug"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub2 = bus.on_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(PaymentEvent::now(EventKind::Verified));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
