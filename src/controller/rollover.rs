//! Activation proxy and rollover overlay placement
//!
//! The engine only shows its name prompt for real objects the player aims
//! at. The backpack object carries a small collision node: while an item is
//! active it is moved in front of the primary hand and the backpack takes
//! the item's base, so the engine prompts for that item. The overlay itself
//! is drawn next to the primary hand; when the off hand is the one pointing,
//! the overlay node is moved to the off hand every frame.

use bevy::prelude::Vec3;
use tracing::{debug, trace};

use super::Controller;
use crate::backpack::{Backpack, BackpackId};
use crate::geometry::NodeTransform;
use crate::host::{BaseObjectId, HostEngine, NodeId, RefId};
use crate::input::Hand;

pub const ROLLOVER_NODE: &str = "WSActivateRollover";
pub const COLLISION_NODE: &str = "CollisionNode";
/// Local height that puts the collision node out of reach
pub const INACTIVE_COLLIDER_Z: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Activator {
    backpack: BackpackId,
    hand: Hand,
}

#[derive(Debug, Default)]
pub struct Rollover {
    default_local: Option<NodeTransform>,
    override_enabled: bool,
    overridden: bool,
    activator: Option<Activator>,
}

impl Rollover {
    /// Overlay placement captured after the last game load
    pub fn default_local(&self) -> Option<NodeTransform> {
        self.default_local
    }

    pub fn is_override_enabled(&self) -> bool {
        self.override_enabled
    }

    /// The overlay currently sits at the off hand
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    pub fn activator_backpack(&self) -> Option<BackpackId> {
        self.activator.map(|a| a.backpack)
    }

    pub fn activator_hand(&self) -> Option<Hand> {
        self.activator.map(|a| a.hand)
    }
}

fn rollover_node(host: &dyn HostEngine) -> Option<NodeId> {
    host.room_node()
        .and_then(|room| host.find_child(room, ROLLOVER_NODE))
}

fn collision_node(host: &dyn HostEngine, object: RefId) -> Option<NodeId> {
    host.ref_root(object)
        .and_then(|root| host.find_child(root, COLLISION_NODE))
}

fn move_collider_to(host: &mut dyn HostEngine, node: NodeId, point: Vec3) {
    let (Some(mut local), Some(parent)) = (
        host.local_transform(node),
        host.parent(node).and_then(|p| host.world_transform(p)),
    ) else {
        return;
    };
    local.translate = parent.world_to_local(point);
    host.set_local_transform(node, local);
}

fn park_collider(host: &mut dyn HostEngine, node: NodeId) {
    let Some(mut local) = host.local_transform(node) else { return };
    if local.translate.z < INACTIVE_COLLIDER_Z * 0.5 {
        local.translate.z = INACTIVE_COLLIDER_Z;
        host.set_local_transform(node, local);
    }
}

impl Controller {
    /// Record the overlay's resting placement. Call after every game load.
    pub fn capture_rollover_defaults(&mut self, host: &dyn HostEngine) -> bool {
        self.rollover.default_local = rollover_node(host).and_then(|node| host.local_transform(node));
        self.rollover.overridden = false;
        self.rollover.default_local.is_some()
    }

    /// Make the engine prompt for `shown` as if the player aimed at it
    pub fn set_activator(
        &mut self,
        host: &mut dyn HostEngine,
        backpack: BackpackId,
        shown: BaseObjectId,
        hand: Hand,
    ) {
        let Some(object) = self.backpack(backpack).map(Backpack::object) else {
            return;
        };
        let primary = host.hand_world_transform(self.primary_hand());
        match (collision_node(host, object), primary) {
            (Some(node), Some(primary)) => move_collider_to(host, node, primary.translate),
            _ => trace!(?backpack, "collision node or hand not loaded"),
        }
        host.set_ref_base(object, shown);
        host.set_activation_blocked(object, false);
        self.rollover.override_enabled = hand == self.off_hand();
        self.rollover.activator = Some(Activator { backpack, hand });
        debug!(?backpack, base = ?shown, ?hand, "activator set");
    }

    /// Park the collider and restore the backpack's own identity
    pub fn disable_activator(&mut self, host: &mut dyn HostEngine, backpack: BackpackId) {
        let Some(pack) = self.backpack(backpack) else { return };
        let object = pack.object();
        let default_base = pack.default_base();

        if let Some(node) = collision_node(host, object) {
            park_collider(host, node);
        }
        if let Some(base) = default_base {
            host.set_ref_base(object, base);
        }
        host.set_activation_blocked(object, true);
        self.rollover.override_enabled = false;
        if self.rollover.activator_backpack() == Some(backpack) {
            self.rollover.activator = None;
            debug!(?backpack, "activator disabled");
        }
    }

    pub(super) fn update_rollover(&mut self, host: &mut dyn HostEngine) {
        // keep the collider in front of the hand while it moves
        let object = self
            .rollover
            .activator
            .and_then(|activator| self.backpack(activator.backpack))
            .map(Backpack::object);
        if let Some(object) = object {
            let collider = collision_node(host, object);
            let primary = host.hand_world_transform(self.primary_hand());
            if let (Some(node), Some(primary)) = (collider, primary) {
                move_collider_to(host, node, primary.translate);
            }
        }

        let Some(node) = rollover_node(host) else {
            trace!("rollover node not loaded");
            return;
        };
        if self.rollover.default_local.is_none() {
            self.rollover.default_local = host.local_transform(node);
        }
        let Some(default) = self.rollover.default_local else { return };

        if self.rollover.override_enabled {
            let (Some(hand), Some(parent)) = (
                host.hand_world_transform(self.off_hand()),
                host.parent(node).and_then(|p| host.world_transform(p)),
            ) else {
                return;
            };
            let desired = NodeTransform {
                rotate: hand.rotate * default.rotate,
                translate: hand.translate + hand.rotate * default.translate,
                scale: parent.scale * default.scale,
            };
            host.set_local_transform(node, parent.child_local_for(&desired));
            self.rollover.overridden = true;
        } else if self.rollover.overridden {
            host.set_local_transform(node, default);
            self.rollover.overridden = false;
        }
    }
}
