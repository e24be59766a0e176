//! Change notification for the display host.
//!
//! `ChangeBus` is a single-channel publish/subscribe mechanism. A refresh
//! event carries either the node whose children may have changed or `None`
//! for the whole forest, with no other payload; subscribers re-invoke the tree
//! builder themselves. Delivery is synchronous and fire-and-forget, with no
//! queuing or replay for late subscribers.

use crate::tree::Node;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<ChangeBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Publishes "the children of this node may have changed" events.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct ChangeBus {
    subscribers: RwLock<Vec<(usize, Arc<dyn Fn(Option<Node>) + Send + Sync>)>>,
    next_id: AtomicUsize,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to refresh events. Returns a `Subscription` that
    /// unsubscribes on drop.
    ///
    /// Requires `self` to be wrapped in `Arc`.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(Option<Node>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // Use try_write to avoid deadlock if Drop runs during panic
        // unwinding while a read lock is held (e.g., during notify).
        if let Ok(mut guard) = self.subscribers.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Wake all subscribers. `Some(node)` means "recompute this node's
    /// children"; `None` means "recompute the whole forest".
    pub fn notify(&self, node: Option<Node>) {
        // Clone the subscriber list to prevent deadlock if a callback
        // subscribes.
        let subscribers: Vec<_> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in subscribers {
            callback(node.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Project;
    use crate::tree::{Disposition, NodeSource};
    use std::sync::atomic::AtomicUsize;

    fn project_node() -> Node {
        let project = Project {
            id: "p1".into(),
            name: "Errands".into(),
            color: "red".into(),
            is_shared: false,
            is_favorite: false,
            order: 1,
            parent_id: None,
        };
        Node {
            id: project.id.clone(),
            label: project.name.clone(),
            tooltip: Some(project.name.clone()),
            disposition: Disposition::Collapsed,
            source: NodeSource::Project(project),
        }
    }

    #[test]
    fn test_subscribe_and_notify() {
        let bus = Arc::new(ChangeBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let _sub = bus.subscribe(move |_node| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.notify(None);
        bus.notify(Some(project_node()));

        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_notify_carries_node_identity() {
        let bus = Arc::new(ChangeBus::new());
        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let _sub = bus.subscribe(move |node| {
            seen_clone
                .write()
                .unwrap()
                .push(node.map(|n| n.id));
        });

        bus.notify(Some(project_node()));
        bus.notify(None);

        let seen = seen.read().unwrap();
        assert_eq!(*seen, vec![Some("p1".to_string()), None]);
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let bus = Arc::new(ChangeBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        {
            let _sub = bus.subscribe(move |_| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            });
            bus.notify(None);
            assert_eq!(count.load(Ordering::Relaxed), 1);
            // _sub dropped here
        }

        bus.notify(None);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = Arc::new(ChangeBus::new());
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        let count1_clone = Arc::clone(&count1);
        let count2_clone = Arc::clone(&count2);

        let _sub1 = bus.subscribe(move |_| {
            count1_clone.fetch_add(1, Ordering::Relaxed);
        });
        let _sub2 = bus.subscribe(move |_| {
            count2_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.notify(None);

        assert_eq!(count1.load(Ordering::Relaxed), 1);
        assert_eq!(count2.load(Ordering::Relaxed), 1);
    }
}
