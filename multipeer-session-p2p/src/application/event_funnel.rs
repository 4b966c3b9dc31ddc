use crate::application::{EventCategory, SessionEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Consumer endpoint of one event category
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Outcome of raising an event
#[derive(Debug, PartialEq)]
pub enum Delivery {
    Delivered,
    /// No endpoint was armed (or it was closed); the event comes back to the caller
    Dropped(SessionEvent),
}

/// Persistent, per-category subscription slots
///
/// Each category holds at most one endpoint. Arming replaces the previous
/// endpoint, and an armed endpoint keeps receiving every later event of its
/// category in raise order. Events raised into an empty slot are not buffered.
#[derive(Debug, Default)]
pub struct EventFunnel {
    slots: HashMap<EventCategory, EventSender>,
}

impl EventFunnel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `category` with `endpoint`, replacing any previous endpoint
    pub fn arm(&mut self, category: EventCategory, endpoint: EventSender) {
        if self.slots.insert(category, endpoint).is_some() {
            tracing::debug!(%category, "Replaced event subscriber");
        } else {
            tracing::debug!(%category, "Armed event subscriber");
        }
    }

    /// Clear the endpoint of `category`
    pub fn disarm(&mut self, category: EventCategory) {
        self.slots.remove(&category);
    }

    /// Whether `category` has a live endpoint
    pub fn is_armed(&self, category: EventCategory) -> bool {
        self.slots
            .get(&category)
            .is_some_and(|endpoint| !endpoint.is_closed())
    }

    /// Deliver `event` to the endpoint armed for its category
    ///
    /// Never blocks. A closed endpoint is cleared and the event is dropped.
    pub fn raise(&mut self, event: SessionEvent) -> Delivery {
        let category = event.category();

        let Some(endpoint) = self.slots.get(&category) else {
            tracing::trace!(%category, "No subscriber, dropping event");
            return Delivery::Dropped(event);
        };

        match endpoint.send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(%category, "Subscriber went away, disarming");
                self.slots.remove(&category);
                Delivery::Dropped(event)
            }
        }
    }
}
