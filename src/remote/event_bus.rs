use std::{
    collections::HashMap,
    fmt,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc, Mutex, MutexGuard,
    },
};

use crate::domain::events::{EventKind, RealtimeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Box<dyn FnMut(&RealtimeEvent) + Send>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Handler)>>,
}

/// Per-kind listener lists for inbound realtime events.
///
/// Cloning yields another handle to the same registry. Handlers run
/// synchronously on the publishing thread while the registry is locked, so a
/// handler must not register or remove listeners itself.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let counts: HashMap<EventKind, usize> = registry
            .listeners
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: FnMut(&RealtimeEvent) + Send + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Drops every listener registered for `kind`.
    pub fn off(&self, kind: EventKind) -> usize {
        self.lock()
            .listeners
            .remove(&kind)
            .map_or(0, |handlers| handlers.len())
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let mut removed = false;
        for handlers in registry.listeners.values_mut() {
            let before = handlers.len();
            handlers.retain(|(listener, _)| *listener != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().listeners.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Routes the given kinds into a queue the caller drains on its own thread.
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let ids = kinds
            .iter()
            .map(|kind| {
                let tx = tx.clone();
                self.on(*kind, move |event| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();

        Subscription {
            bus: self.clone(),
            ids,
            rx,
        }
    }

    /// Fans `event` out to its kind's listeners in registration order.
    pub fn publish(&self, event: &RealtimeEvent) -> usize {
        let mut registry = self.lock();
        let Some(handlers) = registry.listeners.get_mut(&event.kind()) else {
            return 0;
        };

        for (_, handler) in handlers.iter_mut() {
            handler(event);
        }
        handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Queue-backed listener set; unregisters itself from the bus on drop.
pub struct Subscription {
    bus: EventBus,
    ids: Vec<ListenerId>,
    rx: Receiver<RealtimeEvent>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("ids", &self.ids)
            .finish()
    }
}

impl Subscription {
    pub fn try_next(&self) -> Option<RealtimeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn drain(&self) -> Vec<RealtimeEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.remove(id);
        }
    }
}
