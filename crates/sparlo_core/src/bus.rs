//! Typed app-wide event bus.
//!
//! Every [`Listener`] owns its receiving end; dropping it detaches the
//! listener exactly once.

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc, Mutex, PoisonError, Weak};

use crate::notify::Notification;
use crate::report::ReportId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ActiveSectionChanged { section_id: String },
    ReportArchived { report_id: ReportId },
    ReportRestored { report_id: ReportId },
    Notification(Notification),
    CheckoutStarted { plan: String },
    CheckoutCompleted { plan: String },
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    senders: BTreeMap<u64, mpsc::Sender<AppEvent>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Listener {
        let (tx, rx) = mpsc::channel();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.senders.insert(id, tx);
        Listener {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers to every live listener and returns how many received it.
    pub fn publish(&self, event: AppEvent) -> usize {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .senders
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        registry.senders.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

pub struct Listener {
    id: u64,
    rx: mpsc::Receiver<AppEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Listener {
    pub fn try_recv(&self) -> Option<AppEvent> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<AppEvent> {
        self.rx.try_iter().collect()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .senders
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_listener_detaches_it() {
        let bus = EventBus::new();
        let sidebar = bus.subscribe();
        let dots = bus.subscribe();
        assert_eq!(bus.listener_count(), 2);

        let event = AppEvent::ActiveSectionChanged {
            section_id: "risks".into(),
        };
        assert_eq!(bus.publish(event.clone()), 2);
        assert_eq!(sidebar.try_recv(), Some(event.clone()));
        assert_eq!(dots.drain(), vec![event]);

        drop(dots);
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(
            bus.publish(AppEvent::CheckoutStarted { plan: "pro".into() }),
            1
        );
    }

    #[test]
    fn listener_outliving_bus_drops_cleanly() {
        let bus = EventBus::new();
        let listener = bus.subscribe();
        drop(bus);
        assert_eq!(listener.try_recv(), None);
    }
}
