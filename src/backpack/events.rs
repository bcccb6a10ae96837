//! Deferred UI notifications produced by state changes.

use std::collections::VecDeque;

use super::{HoverState, ItemRef, ViewRef};
use crate::geometry::NodeTransform;
use crate::host::{BaseObjectId, RefId};
use crate::input::Hand;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewHoverEvent {
    pub new_state: HoverState,
    pub hand: Hand,
    pub view: ViewRef,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemHoverEvent {
    pub new_state: HoverState,
    pub old_state: HoverState,
    pub hand: Hand,
    pub item: ItemRef,
}

/// Attach a stored transform to an inventory entry once the engine has
/// created its extra-data list.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateExtraDataEvent {
    /// Inventory that received the object
    pub owner: RefId,
    pub base: BaseObjectId,
    pub count: i32,
    /// Marker written on the world object before pick-up
    pub marker: u16,
    /// Placement relative to the target view
    pub local: NodeTransform,
    /// View that receives the item once the list is found
    pub target: ViewRef,
    pub hand: Hand,
    /// Drains that already failed to find the list
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ViewHovered(ViewHoverEvent),
    ItemHovered(ItemHoverEvent),
    CreateExtraData(CreateExtraDataEvent),
}

/// FIFO of pending UI events, drained once per frame.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<UiEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: UiEvent) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<UiEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &UiEvent> {
        self.events.iter()
    }

    /// Remove and return every queued event in arrival order
    pub fn take_all(&mut self) -> Vec<UiEvent> {
        self.events.drain(..).collect()
    }
}
