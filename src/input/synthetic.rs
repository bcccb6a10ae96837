//! Emulated button input written into outgoing packets.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{ActionType, ButtonId, ControllerState, Hand, InputEvent};

#[derive(Default)]
struct Overrides {
    momentary: [VecDeque<InputEvent>; 2],
    persistent: Vec<InputEvent>,
}

/// Momentary and persistent overrides plus the global block switch.
///
/// Written from any thread, applied on the input thread by the classifier.
#[derive(Default)]
pub struct SyntheticInput {
    overrides: Mutex<Overrides>,
    block_all: AtomicBool,
}

impl SyntheticInput {
    /// Queue an override applied to the next packet of `event.hand`, then discarded
    pub fn send_momentary(&self, event: InputEvent) {
        self.overrides.lock().momentary[event.hand.index()].push_back(event);
    }

    /// Apply `event` to every packet of its hand until cleared
    pub fn set_persistent(&self, event: InputEvent) {
        self.overrides.lock().persistent.push(event);
    }

    /// Remove the first persistent override equal to `event`
    pub fn clear_persistent(&self, event: InputEvent) {
        let mut overrides = self.overrides.lock();
        if let Some(pos) = overrides.persistent.iter().position(|e| *e == event) {
            overrides.persistent.remove(pos);
        }
    }

    pub fn clear_all_persistent(&self) {
        self.overrides.lock().persistent.clear();
    }

    pub fn set_block_all(&self, block: bool) {
        self.block_all.store(block, Ordering::Release);
    }

    pub fn is_blocking_all(&self) -> bool {
        self.block_all.load(Ordering::Acquire)
    }

    pub fn pending_momentary(&self, hand: Hand) -> usize {
        self.overrides.lock().momentary[hand.index()].len()
    }

    /// Write overrides for `hand` into `out`, draining its momentary queue.
    ///
    /// `trigger` is forced to 1.0/0.0 whenever a press override targets the
    /// trigger. Returns true when any override exists for either hand, in
    /// which case the packet must be written back to the engine.
    pub(crate) fn apply(&self, hand: Hand, out: &mut ControllerState, trigger: &mut f32) -> bool {
        let mut overrides = self.overrides.lock();
        let needs_write = overrides.momentary.iter().any(|q| !q.is_empty())
            || !overrides.persistent.is_empty();

        while let Some(event) = overrides.momentary[hand.index()].pop_front() {
            write_override(&event, out);
            if event.button == ButtonId::Trigger {
                *trigger = if event.action == ActionType::Press && event.state.is_down() {
                    1.0
                } else {
                    0.0
                };
            }
        }

        for event in overrides.persistent.iter().filter(|e| e.hand == hand) {
            write_override(event, out);
            if event.button == ButtonId::Trigger && event.action == ActionType::Press {
                *trigger = if event.state.is_down() { 1.0 } else { 0.0 };
            }
        }

        needs_write
    }
}

fn write_override(event: &InputEvent, out: &mut ControllerState) {
    let mask = out.mask_mut(event.action);
    if event.state.is_down() {
        *mask |= event.button.mask();
    } else {
        *mask &= !event.button.mask();
    }
}
