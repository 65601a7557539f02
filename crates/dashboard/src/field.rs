//! Observable field: last-known value of one quantity plus change subscribers

use tracing::trace;

/// Handle returned by [`ObservableField::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(f64)>;

/// A named numeric cell that notifies subscribers on every write
///
/// Fields live on the UI thread; values from other threads reach them
/// through [`crate::Dashboard::pump`].
pub struct ObservableField {
    name: String,
    value: f64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl ObservableField {
    /// Create a field holding the default value 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    /// Replace the value and notify every subscriber in registration order
    ///
    /// Unchanged values still notify.
    pub fn set(&mut self, value: f64) {
        trace!("{} <- {}", self.name, value);
        self.value = value;
        for (_, subscriber) in &mut self.subscribers {
            subscriber(value);
        }
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(f64) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for ObservableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableField")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
