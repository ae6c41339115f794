//! Property-change notifications for view-models.
//!
//! A view-model owns a [`ChangeNotifier`] and emits a [`PropertyChange`] whenever
//! one of its bindable properties changes. Views subscribe and re-render only the
//! fragment bound to the named property.

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A notification that a view-model changed.
///
/// `property` is the name of the changed property, or `None` if the whole
/// view-model should be considered changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyChange {
    pub property: Option<&'static str>,
}

impl PropertyChange {
    pub fn is(&self, property: &str) -> bool {
        self.property == Some(property)
    }
}

#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: Vec<Sender<PropertyChange>>,
    closed: bool,
}

impl ChangeNotifier {
    pub fn subscribe(&mut self) -> Receiver<PropertyChange> {
        let (sender, receiver) = unbounded();
        if !self.closed {
            self.subscribers.push(sender);
        }
        receiver
    }

    /// Notifies all live subscribers, dropping the ones whose receiver is gone.
    pub fn emit(&mut self, property: Option<&'static str>) {
        let change = PropertyChange { property };
        self.subscribers.retain(|sender| sender.send(change).is_ok());
    }

    pub fn emit_property(&mut self, property: &'static str) {
        self.emit(Some(property));
    }

    /// Disconnects all subscribers; later subscriptions receive nothing.
    pub fn close(&mut self) {
        self.subscribers.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Collects every change currently queued on a receiver.
pub fn drain_changes(receiver: &Receiver<PropertyChange>) -> Vec<PropertyChange> {
    receiver.try_iter().collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_to_all_subscribers() {
        let mut notifier = ChangeNotifier::default();
        let first = notifier.subscribe();
        let second = notifier.subscribe();
        notifier.emit_property("isContinuation");
        notifier.emit(None);
        assert_eq!(drain_changes(&first).len(), 2);
        let changes = drain_changes(&second);
        assert!(changes[0].is("isContinuation"));
        assert_eq!(changes[1].property, None);
    }

    #[test]
    fn dropped_receivers_are_pruned_and_close_disconnects() {
        let mut notifier = ChangeNotifier::default();
        drop(notifier.subscribe());
        let live = notifier.subscribe();
        notifier.emit(None);
        assert_eq!(notifier.subscribers.len(), 1);

        notifier.close();
        assert!(live.recv().is_ok());
        assert!(live.recv().is_err());
        assert!(notifier.subscribe().recv().is_err());
    }
}
