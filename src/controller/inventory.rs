//! Inventory changes and items placed by hand
//!
//! Releasing a world object inside a view records where it was let go and
//! asks the engine to pick it up. The engine reports the pick-up through the
//! container-changed notification; only then can the stored placement be
//! attached, and only once the engine has created the entry's extra-data
//! list, which may take a few frames.

use tracing::{debug, trace};

use super::Controller;
use crate::backpack::{CreateExtraDataEvent, UiEvent, ViewKind, ViewRef};
use crate::geometry::NodeTransform;
use crate::host::{
    BaseObjectId, ContainerChanged, HandState, HostEngine, HostTask, RefId, RemoveReason,
};
use crate::input::Hand;

/// Placement waiting for its object to arrive in the wearer's inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItemEvent {
    /// Placement relative to the target view
    pub local: NodeTransform,
    pub base: BaseObjectId,
    pub count: i32,
    pub marker: u16,
    pub hand: Hand,
    pub target: ViewRef,
}

impl Controller {
    pub fn pending_items(&self) -> &[NewItemEvent] {
        &self.pending_items
    }

    /// Remember a placement until the matching inventory change arrives
    pub fn push_new_transform(&mut self, event: NewItemEvent) {
        trace!(base = ?event.base, marker = event.marker, "placement pending");
        self.pending_items.push(event);
    }

    fn next_marker(&mut self) -> u16 {
        self.next_marker = self.next_marker.wrapping_add(1).max(1);
        self.next_marker
    }

    fn is_wearer(&self, actor: RefId) -> bool {
        self.backpacks.iter().any(|backpack| backpack.wearer() == actor)
    }

    fn request_rescan_for(&mut self, wearer: RefId) {
        for backpack in &mut self.backpacks {
            if backpack.wearer() == wearer && backpack.is_init() {
                backpack.request_rescan();
            }
        }
    }

    /// A physics-held object was let go by `hand`.
    ///
    /// Returns true when the object landed in a view that accepts it and a
    /// pick-up was requested.
    pub fn on_object_released(
        &mut self,
        host: &mut dyn HostEngine,
        hand: Hand,
        object: RefId,
    ) -> bool {
        let Some(index) = self.selected[hand.index()].and_then(|id| self.index_of(id)) else {
            return false;
        };
        let backpack = &self.backpacks[index];
        let Some(view) = backpack.active_view(hand).filter(|view| !view.is_handle()) else {
            return false;
        };
        let Some(base) = host.ref_base(object) else {
            trace!(?object, "released object has no base");
            return false;
        };
        if !view.can_accept(host.item_category(base)) {
            debug!(?base, kind = ?view.kind(), "view does not take this item");
            return false;
        }
        let (Some(object_world), Some(view_world)) =
            (host.ref_world_transform(object), host.world_transform(view.node()))
        else {
            return false;
        };
        if view.check_overlap(&view_world, object_world.translate).is_none() {
            trace!(?object, "released outside the view bounds");
            return false;
        }

        let actor = backpack.wearer();
        let target = view.handle();
        let local = view_world.child_local_for(&object_world);
        let marker = self.next_marker();
        host.set_marker(object, marker);
        self.push_new_transform(NewItemEvent {
            local,
            base,
            count: 1,
            marker,
            hand,
            target,
        });
        host.submit_task(HostTask::PickUp { actor, object });
        debug!(?object, ?base, marker, "object placed in backpack");
        true
    }

    /// Inventory change notification. Game objects are never changed here;
    /// removals are applied next frame and drops go through host tasks.
    pub fn on_container_changed(&mut self, host: &mut dyn HostEngine, event: &ContainerChanged) {
        let base = event.base_object;
        if let Some(old) = event.old_container.filter(|old| self.is_wearer(*old)) {
            let expected = self
                .expected_removals
                .iter()
                .position(|e| e.actor == old && e.base == base);
            match expected {
                Some(pos) => {
                    self.expected_removals.remove(pos);
                }
                None => self.pending_removals.push((old, base)),
            }
        }

        let Some(owner) = event.new_container.filter(|new| self.is_wearer(*new)) else {
            return;
        };

        let pending = self
            .pending_items
            .iter()
            .position(|p| p.base == base && p.count == event.item_count);
        if let Some(pos) = pending {
            let pending = self.pending_items.remove(pos);
            self.events.push(UiEvent::CreateExtraData(CreateExtraDataEvent {
                owner,
                base,
                count: pending.count,
                marker: pending.marker,
                local: pending.local,
                target: pending.target,
                hand: pending.hand,
                attempts: 0,
            }));
            return;
        }

        let looted = event.old_container.is_some();
        let drop = !self.settings.newitems_drop_paused
            && if looted {
                self.settings.newitems_drop_on_loot
            } else {
                self.settings.newitems_drop_on_pickup
            };
        if drop {
            self.drop_new_item(host, owner, base, event.item_count);
        } else {
            self.request_rescan_for(owner);
        }
    }

    /// Send a freshly received item to an empty hand, or to the ground
    fn drop_new_item(
        &mut self,
        host: &mut dyn HostEngine,
        actor: RefId,
        base: BaseObjectId,
        count: i32,
    ) {
        let to_ground = self.settings.newitems_drop_to_ground;
        let free_hand = if to_ground {
            None
        } else {
            [self.off_hand(), self.primary_hand()]
                .into_iter()
                .find(|hand| host.hand_state(*hand) == HandState::Empty)
        };
        if free_hand.is_none() && !to_ground && !self.settings.hardcore_mode {
            trace!(?base, "no free hand, keeping new item");
            self.request_rescan_for(actor);
            return;
        }

        let at = free_hand
            .and_then(|hand| host.hand_world_transform(hand))
            .map(|t| t.translate);
        self.expect_removal(actor, base);
        host.submit_task(HostTask::DropItem {
            actor,
            base,
            count,
            extra: None,
            at,
            reason: RemoveReason::Dropping,
        });
        debug!(?base, hand = ?free_hand, "dropping new item");
    }

    /// Attach a stored placement once its extra-data list exists.
    ///
    /// Returns the event when it should be retried on the next drain.
    pub(super) fn on_create_extra_data(
        &mut self,
        host: &mut dyn HostEngine,
        mut event: CreateExtraDataEvent,
    ) -> Option<CreateExtraDataEvent> {
        let Some(list) = host.find_marked_extra_list(event.owner, event.base, event.marker) else {
            event.attempts += 1;
            if event.attempts >= self.settings.extradata_max_attempts {
                debug!(
                    base = ?event.base,
                    marker = event.marker,
                    attempts = event.attempts,
                    "extra data never appeared, dropping placement"
                );
                return None;
            }
            trace!(base = ?event.base, attempts = event.attempts, "extra data not ready");
            return Some(event);
        };

        let stored = self
            .container_relative(host, event.target, event.local)
            .unwrap_or(event.local);
        host.set_item_transform(list, stored);
        host.clear_marker(list);

        let Some(index) = self.index_of(event.target.backpack) else {
            return None;
        };
        let backpack = &mut self.backpacks[index];
        if backpack.view(event.target).is_some() {
            backpack.place_item(
                host,
                event.target.index,
                event.base,
                event.count,
                Some(list),
                event.local,
            );
        } else {
            trace!(base = ?event.base, "target view gone, rescanning");
            backpack.request_rescan();
        }
        None
    }

    /// Stored placements are kept relative to the container view
    fn container_relative(
        &self,
        host: &dyn HostEngine,
        target: ViewRef,
        local: NodeTransform,
    ) -> Option<NodeTransform> {
        let backpack = self.backpack(target.backpack)?;
        let view = backpack.view(target)?;
        if view.kind() == ViewKind::Container {
            return Some(local);
        }
        let container = &backpack.views()[backpack.view_index(ViewKind::Container)?];
        let view_world = host.world_transform(view.node())?;
        let container_world = host.world_transform(container.node())?;
        Some(container_world.child_local_for(&view_world.compose(&local)))
    }
}
