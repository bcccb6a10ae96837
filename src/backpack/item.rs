use super::events::{EventQueue, ItemHoverEvent, UiEvent};
use super::{HoverState, ItemId, ItemRef};
use crate::geometry::NodeTransform;
use crate::host::{ArtAddonHandle, BaseObjectId, ExtraListId};
use crate::input::Hand;

/// Transient effect attached on behalf of one hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemEffect {
    pub hand: Hand,
    pub handle: ArtAddonHandle,
}

/// One inventory stack shown inside a view.
#[derive(Debug, Clone)]
pub struct Item {
    id: ItemId,
    pub base: BaseObjectId,
    pub count: i32,
    pub extra: Option<ExtraListId>,
    pub model: Option<ArtAddonHandle>,
    pub effects: Vec<ItemEffect>,
    /// Placement relative to the owning view's node
    pub local: NodeTransform,
    /// Model finished attaching and has been scaled
    pub model_ready: bool,
    state: [HoverState; 2],
}

impl Item {
    pub(crate) fn new(
        id: ItemId,
        base: BaseObjectId,
        count: i32,
        extra: Option<ExtraListId>,
        local: NodeTransform,
    ) -> Self {
        Self {
            id,
            base,
            count,
            extra,
            model: None,
            effects: Vec::new(),
            local,
            model_ready: false,
            state: [HoverState::Idle; 2],
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn state(&self, hand: Hand) -> HoverState {
        self.state[hand.index()]
    }

    /// Change the state for `hand`, queueing an [`ItemHoverEvent`] on change.
    ///
    /// Returns false and queues nothing when the state is unchanged.
    pub fn set_state(
        &mut self,
        handle: ItemRef,
        hand: Hand,
        new_state: HoverState,
        events: &mut EventQueue,
    ) -> bool {
        let old_state = self.state[hand.index()];
        if old_state == new_state {
            return false;
        }
        self.state[hand.index()] = new_state;
        events.push(UiEvent::ItemHovered(ItemHoverEvent {
            new_state,
            old_state,
            hand,
            item: handle,
        }));
        true
    }

    /// Detach and return the effects owned by `hand`
    pub fn take_effects(&mut self, hand: Hand) -> Vec<ArtAddonHandle> {
        let mut taken = Vec::new();
        self.effects.retain(|effect| {
            if effect.hand == hand {
                taken.push(effect.handle);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Every attachment owned by this item, model included
    pub fn attachments(&self) -> impl Iterator<Item = ArtAddonHandle> + '_ {
        self.model
            .into_iter()
            .chain(self.effects.iter().map(|effect| effect.handle))
    }
}
