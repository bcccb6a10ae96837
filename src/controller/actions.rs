//! Button bindings for grabbing, equipping, favoriting and dropping
//!
//! Callbacks run on the input thread. They never touch backpacks directly:
//! they read the [`HandFocus`] published by the last frame, decide whether
//! to hide the press from the game, and forward a [`HandAction`] over a
//! channel that the controller drains at the start of the next frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use super::Controller;
use crate::backpack::{Backpack, BackpackState, ItemRef, View};
use crate::config::InputBindings;
use crate::host::{HandState, HostEngine, HostTask, RemoveReason};
use crate::input::{callback, ActionType, ButtonId, Hand, InputCallback, InputEvent, VrInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandAction {
    Grab { hand: Hand, pressed: bool },
    Equip { hand: Hand },
    Favorite { hand: Hand },
    Drop { hand: Hand },
}

/// What each hand pointed at during the last frame.
#[derive(Debug, Default)]
pub struct HandFocus {
    item: [AtomicBool; 2],
    handle: [AtomicBool; 2],
    summon: [AtomicBool; 2],
}

impl HandFocus {
    pub fn publish(&self, hand: Hand, on_item: bool, on_handle: bool, in_summon_zone: bool) {
        let slot = hand.index();
        self.item[slot].store(on_item, Ordering::Relaxed);
        self.handle[slot].store(on_handle, Ordering::Relaxed);
        self.summon[slot].store(in_summon_zone, Ordering::Relaxed);
    }

    pub fn on_item(&self, hand: Hand) -> bool {
        self.item[hand.index()].load(Ordering::Relaxed)
    }

    pub fn on_handle(&self, hand: Hand) -> bool {
        self.handle[hand.index()].load(Ordering::Relaxed)
    }

    pub fn in_summon_zone(&self, hand: Hand) -> bool {
        self.summon[hand.index()].load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
enum ActionKind {
    Grab,
    Equip,
    Favorite,
    Drop,
}

/// Callbacks registered for the current bindings
pub struct ActionBindings {
    entries: Vec<(InputCallback, ButtonId, Hand)>,
}

impl ActionBindings {
    fn register(
        input: &VrInput,
        bindings: &InputBindings,
        sender: &Sender<HandAction>,
        focus: &Arc<HandFocus>,
    ) -> Self {
        let kinds = [
            (bindings.grab, ActionKind::Grab),
            (bindings.equip, ActionKind::Equip),
            (bindings.favorite, ActionKind::Favorite),
            (bindings.drop, ActionKind::Drop),
        ];
        let mut entries = Vec::new();
        for (button, kind) in kinds {
            let sender = sender.clone();
            let focus = Arc::clone(focus);
            let func = callback(move |event: &InputEvent| forward(kind, event, &sender, &focus));
            for hand in Hand::ALL {
                input.add_callback(func.clone(), button, hand, ActionType::Press);
                entries.push((func.clone(), button, hand));
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unbind(self, input: &VrInput) {
        for (func, button, hand) in &self.entries {
            input.remove_callback(func, *button, *hand, ActionType::Press);
        }
    }
}

/// Forward a press and report whether the game should not see it.
///
/// Releases are never hidden. A grab press is hidden while the hand is on
/// the carry handle or in the summon zone; the other actions only while the
/// hand points at an item.
fn forward(
    kind: ActionKind,
    event: &InputEvent,
    sender: &Sender<HandAction>,
    focus: &HandFocus,
) -> bool {
    let hand = event.hand;
    let pressed = event.state.is_down();
    let action = match kind {
        ActionKind::Grab if !pressed => HandAction::Grab { hand, pressed },
        ActionKind::Grab if focus.on_handle(hand) || focus.in_summon_zone(hand) => {
            HandAction::Grab { hand, pressed }
        }
        _ if !pressed || !focus.on_item(hand) => return false,
        ActionKind::Equip => HandAction::Equip { hand },
        ActionKind::Favorite => HandAction::Favorite { hand },
        ActionKind::Drop => HandAction::Drop { hand },
        ActionKind::Grab => return false,
    };
    if sender.try_send(action).is_err() {
        trace!(?action, "action queue full");
    }
    pressed
}

impl Controller {
    /// Register the configured buttons on `input`. Replaces an earlier binding.
    pub fn bind_input(&mut self, input: Arc<VrInput>) {
        self.unbind_input();
        let bindings =
            ActionBindings::register(&input, &self.settings.bindings, &self.action_sender, &self.focus);
        debug!(callbacks = bindings.len(), "backpack buttons bound");
        self.input = Some((input, bindings));
    }

    pub fn unbind_input(&mut self) {
        if let Some((input, bindings)) = self.input.take() {
            bindings.unbind(&input);
        }
    }

    pub(super) fn process_actions(&mut self, host: &mut dyn HostEngine) {
        while let Ok(action) = self.actions.try_recv() {
            debug!(?action, "hand action");
            match action {
                HandAction::Grab {
                    hand,
                    pressed: true,
                } => self.begin_grab(host, hand),
                HandAction::Grab {
                    hand,
                    pressed: false,
                } => self.end_grab(hand),
                HandAction::Equip { hand } => self.equip_selected(host, hand),
                HandAction::Favorite { hand } => self.favorite_selected(host, hand),
                HandAction::Drop { hand } => self.drop_selected(host, hand),
            }
        }
    }

    fn begin_grab(&mut self, host: &mut dyn HostEngine, hand: Hand) {
        if self.is_in_summon_zone(hand) {
            let player = host.player();
            let parked = self
                .backpacks
                .iter()
                .find(|b| b.wearer() == player && b.state() == BackpackState::Disabled)
                .map(Backpack::id);
            if let Some(id) = parked {
                self.summon(host, id);
                return;
            }
        }

        let Some(id) = self.selected[hand.index()] else { return };
        let Some(index) = self.index_of(id) else { return };
        let on_handle = self.backpacks[index]
            .active_view(hand)
            .is_some_and(View::is_handle);
        if !on_handle {
            return;
        }
        self.release_hands(index);
        self.disable_activator(host, id);
        self.backpacks[index].grab(hand);
    }

    fn end_grab(&mut self, hand: Hand) {
        for backpack in &mut self.backpacks {
            if backpack.grabbed_by() == Some(hand) {
                backpack.transition(BackpackState::Idle);
            }
        }
    }

    fn selected_item(&self, hand: Hand) -> Option<(usize, ItemRef)> {
        let index = self.index_of(self.selected[hand.index()]?)?;
        let item = self.backpacks[index].active_item(hand)?;
        Some((index, item))
    }

    fn equip_selected(&mut self, host: &mut dyn HostEngine, hand: Hand) {
        let Some((index, item_ref)) = self.selected_item(hand) else {
            trace!(?hand, "equip without an active item");
            return;
        };
        if !self.settings.allow_equip_swapping && host.hand_state(hand) == HandState::Weapon {
            debug!(?hand, "hand already holds a weapon");
            return;
        }
        let actor = self.backpacks[index].wearer();
        let Some(item) = self.take_item(host, index, item_ref) else { return };
        host.submit_task(HostTask::EquipItem {
            actor,
            base: item.base,
            extra: item.extra,
            hand,
        });
    }

    fn favorite_selected(&mut self, host: &mut dyn HostEngine, hand: Hand) {
        let Some((index, item_ref)) = self.selected_item(hand) else { return };
        let actor = self.backpacks[index].wearer();
        let Some(item) = self.take_item(host, index, item_ref) else { return };
        host.submit_task(HostTask::ToggleFavorite {
            actor,
            base: item.base,
            extra: item.extra,
        });
        self.backpacks[index].request_rescan();
    }

    fn drop_selected(&mut self, host: &mut dyn HostEngine, hand: Hand) {
        let Some((index, item_ref)) = self.selected_item(hand) else { return };
        let actor = self.backpacks[index].wearer();
        let at = host.hand_world_transform(hand).map(|t| t.translate);
        let Some(item) = self.take_item(host, index, item_ref) else { return };
        self.expect_removal(actor, item.base);
        host.submit_task(HostTask::DropItem {
            actor,
            base: item.base,
            count: item.count,
            extra: item.extra,
            at,
            reason: RemoveReason::Dropping,
        });
    }
}
