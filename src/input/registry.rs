//! Callback routing table keyed by button.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ActionType, ButtonId, Hand, InputEvent};

/// Input subscriber. Returning `true` hides the triggering edge from the game.
pub type InputCallback = Arc<dyn Fn(&InputEvent) -> bool + Send + Sync>;

/// Wrap a closure as an [`InputCallback`]
pub fn callback<F>(func: F) -> InputCallback
where
    F: Fn(&InputEvent) -> bool + Send + Sync + 'static,
{
    Arc::new(func)
}

#[derive(Clone)]
struct Registration {
    hand: Hand,
    action: ActionType,
    func: InputCallback,
}

impl Registration {
    fn matches(&self, func: &InputCallback, hand: Hand, action: ActionType) -> bool {
        self.hand == hand && self.action == action && Arc::ptr_eq(&self.func, func)
    }
}

/// Per-button ordered subscriber lists.
///
/// Mutation and dispatch are serialised by one lock. Dispatch snapshots the
/// matching subscribers and releases the lock before invoking them, so a
/// callback may add or remove registrations without deadlocking; such changes
/// take effect from the next dispatch.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: Mutex<HashMap<ButtonId, Vec<Registration>>>,
}

impl CallbackRegistry {
    /// Append a subscriber. Duplicates are kept and called once per entry.
    pub fn add(&self, func: InputCallback, button: ButtonId, hand: Hand, action: ActionType) {
        self.callbacks
            .lock()
            .entry(button)
            .or_default()
            .push(Registration { hand, action, func });
    }

    /// Remove the first registration matching hand, action and function identity
    pub fn remove(&self, func: &InputCallback, button: ButtonId, hand: Hand, action: ActionType) {
        let mut callbacks = self.callbacks.lock();
        let Some(list) = callbacks.get_mut(&button) else {
            return;
        };
        if let Some(pos) = list.iter().position(|r| r.matches(func, hand, action)) {
            list.remove(pos);
        }
        if list.is_empty() {
            callbacks.remove(&button);
        }
    }

    /// True when any subscriber exists for `button`, regardless of hand
    pub fn has_interest(&self, button: ButtonId) -> bool {
        self.callbacks
            .lock()
            .get(&button)
            .is_some_and(|list| !list.is_empty())
    }

    pub fn count(&self, button: ButtonId, hand: Hand, action: ActionType) -> usize {
        self.callbacks.lock().get(&button).map_or(0, |list| {
            list.iter()
                .filter(|r| r.hand == hand && r.action == action)
                .count()
        })
    }

    /// Invoke every subscriber of `event` in insertion order.
    ///
    /// `on_consume` runs once for each subscriber that asked to block.
    /// Returns the number of subscribers invoked.
    pub fn dispatch(&self, event: &InputEvent, mut on_consume: impl FnMut()) -> usize {
        let targets: Vec<InputCallback> = {
            let callbacks = self.callbacks.lock();
            let Some(list) = callbacks.get(&event.button) else {
                return 0;
            };
            list.iter()
                .filter(|r| r.hand == event.hand && r.action == event.action)
                .map(|r| Arc::clone(&r.func))
                .collect()
        };

        for func in &targets {
            if func(event) {
                on_consume();
            }
        }
        targets.len()
    }
}
