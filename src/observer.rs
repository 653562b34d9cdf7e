use std::collections::HashMap;

use crate::event::CogEvent;

/// Observer that reacts to cog notifications
///
/// Observers run synchronously at the point the mutation happens and only
/// see the event payload, so they cannot re-enter the space.
pub trait Observer: Send + Sync {
    fn on_event(&mut self, event: &CogEvent);

    /// Get name for debugging
    fn name(&self) -> &str {
        "Observer"
    }

    /// Called once the observer is stored in the registry
    fn on_registered(&mut self, _index: usize) {}

    /// Called when observer is unregistered
    fn on_unregistered(&mut self) {}
}

/// Counts of delivered events
#[derive(Debug, Clone, Default)]
pub struct ObserverMetrics {
    pub total_events: u64,
    pub events_by_type: HashMap<&'static str, u64>,
}

impl ObserverMetrics {
    pub fn reset(&mut self) {
        self.total_events = 0;
        self.events_by_type.clear();
    }

    pub fn record_event(&mut self, event_type: &'static str) {
        self.total_events += 1;
        *self.events_by_type.entry(event_type).or_insert(0) += 1;
    }
}

/// Registry that manages all observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Box<dyn Observer>>,
    metrics: ObserverMetrics,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register observer, returning its index
    pub fn register(&mut self, observer: Box<dyn Observer>) -> usize {
        let index = self.observers.len();
        self.observers.push(observer);
        if let Some(obs) = self.observers.last_mut() {
            tracing::debug!(observer = obs.name(), index, "observer registered");
            obs.on_registered(index);
        }
        index
    }

    /// Unregister observer by index
    pub fn unregister(&mut self, index: usize) -> Option<Box<dyn Observer>> {
        if index < self.observers.len() {
            let mut observer = self.observers.remove(index);
            observer.on_unregistered();
            Some(observer)
        } else {
            None
        }
    }

    /// Broadcast event to all observers
    pub fn broadcast(&mut self, event: &CogEvent) {
        self.metrics.record_event(event.event_type());
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn metrics(&self) -> &ObserverMetrics {
        &self.metrics
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

/// Observer that records every event it sees; handy in tests and tooling
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: std::sync::Arc<parking_lot::Mutex<Vec<CogEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the recorded events (clone before registering)
    pub fn events(&self) -> Vec<CogEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Observer for RecordingObserver {
    fn on_event(&mut self, event: &CogEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "RecordingObserver"
    }
}

/// Observer that logs every event through `tracing`
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_event(&mut self, event: &CogEvent) {
        tracing::info!(event = event.event_type(), cog = %event.cog_id(), "cog event");
    }

    fn name(&self) -> &str {
        "LoggingObserver"
    }
}
