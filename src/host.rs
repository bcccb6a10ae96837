//! Engine services consumed by the plugin
//!
//! The game engine, the VR runtime and the model attachment service are
//! reached only through these traits. Every query returns `Option`: `None`
//! means the data is not available this frame and callers skip the work.

use bevy::prelude::Vec3;

use crate::geometry::{BoundingSphere, NodeTransform};
use crate::input::Hand;

/// Scene graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Placed object reference in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub u32);

/// Base object (item type) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseObjectId(pub u32);

/// Per-instance extra-data list of an inventory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtraListId(pub u64);

/// Model attached through the art-addon service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtAddonHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Weapon,
    Armor,
    Ammo,
    Potion,
    Food,
    Ingredient,
    Book,
    Scroll,
    SoulGem,
    Key,
    Light,
    Misc,
}

/// One stack in an actor's inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub base: BaseObjectId,
    pub count: i32,
    /// One list per distinct instance; a stack with no instance data has none
    pub extra_lists: Vec<ExtraListId>,
}

/// Inventory change notification as delivered by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerChanged {
    pub old_container: Option<RefId>,
    pub new_container: Option<RefId>,
    pub base_object: BaseObjectId,
    pub item_count: i32,
    pub unique_id: u16,
}

/// What a hand is currently holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandState {
    #[default]
    Invalid,
    Empty,
    Weapon,
    /// Holding a physics object
    Grabbing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    Remove,
    Dropping,
    StoreInContainer,
}

/// Work that must not run inside an engine notification callback.
#[derive(Debug, Clone, PartialEq)]
pub enum HostTask {
    /// Remove an item from `actor`, placing it in the world at `at` when given
    DropItem {
        actor: RefId,
        base: BaseObjectId,
        count: i32,
        extra: Option<ExtraListId>,
        at: Option<Vec3>,
        reason: RemoveReason,
    },
    EquipItem {
        actor: RefId,
        base: BaseObjectId,
        extra: Option<ExtraListId>,
        hand: Hand,
    },
    ToggleFavorite {
        actor: RefId,
        base: BaseObjectId,
        extra: Option<ExtraListId>,
    },
    /// Move a world object into `actor`'s inventory
    PickUp { actor: RefId, object: RefId },
    /// Teleport `object` to `target`
    MoveTo { object: RefId, target: RefId },
}

/// Node hierarchy queries and updates.
pub trait SceneGraph {
    fn world_transform(&self, node: NodeId) -> Option<NodeTransform>;
    fn local_transform(&self, node: NodeId) -> Option<NodeTransform>;
    /// Set a node's local transform and refresh world transforms below it
    fn set_local_transform(&mut self, node: NodeId, local: NodeTransform);
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// Depth-first search for a descendant named `name`, including `root`
    fn find_child(&self, root: NodeId, name: &str) -> Option<NodeId>;
    fn vector_extra_data(&self, node: NodeId, key: &str) -> Option<Vec3>;
    fn world_bound(&self, node: NodeId) -> Option<BoundingSphere>;
}

/// Object, inventory and task services of the game.
pub trait GameWorld {
    fn player(&self) -> RefId;
    /// Root node of a reference's loaded 3D
    fn ref_root(&self, object: RefId) -> Option<NodeId>;
    fn ref_cell(&self, object: RefId) -> Option<CellId>;
    fn ref_base(&self, object: RefId) -> Option<BaseObjectId>;
    /// Swap the base object a reference displays and activates as
    fn set_ref_base(&mut self, object: RefId, base: BaseObjectId);
    fn set_activation_blocked(&mut self, object: RefId, blocked: bool);

    fn hand_node(&self, hand: Hand) -> Option<NodeId>;
    fn hand_state(&self, hand: Hand) -> HandState;
    /// Parent of the HUD overlay nodes
    fn room_node(&self) -> Option<NodeId>;
    fn camera_node(&self) -> Option<NodeId>;
    /// Marker in the holding cell where shut-off backpacks are parked
    fn disabled_marker(&self) -> Option<RefId>;

    fn inventory(&self, actor: RefId) -> Vec<InventoryEntry>;
    fn item_category(&self, base: BaseObjectId) -> ItemCategory;
    fn model_path(&self, base: BaseObjectId) -> Option<String>;

    /// Transform persisted in an extra-data list
    fn item_transform(&self, list: ExtraListId) -> Option<NodeTransform>;
    fn set_item_transform(&mut self, list: ExtraListId, local: NodeTransform);
    /// Tag a world object so its extra-data list can be found after pick-up
    fn set_marker(&mut self, object: RefId, marker: u16);
    fn find_marked_extra_list(
        &self,
        owner: RefId,
        base: BaseObjectId,
        marker: u16,
    ) -> Option<ExtraListId>;
    fn clear_marker(&mut self, list: ExtraListId);

    fn submit_task(&mut self, task: HostTask);
}

/// Asynchronous model attachment.
pub trait ArtAddons {
    /// Begin attaching `path` under `parent`; the model appears on a later frame
    fn attach_model(
        &mut self,
        path: &str,
        target: RefId,
        parent: NodeId,
        local: NodeTransform,
    ) -> Option<ArtAddonHandle>;
    /// Root node of a completed attachment
    fn model_root(&self, handle: ArtAddonHandle) -> Option<NodeId>;
    fn detach(&mut self, handle: ArtAddonHandle);
}

pub trait VrRuntime {
    fn trigger_haptic_pulse(&mut self, hand: Hand, duration_micros: u16);
}

/// Everything the per-frame update needs from the engine.
pub trait HostEngine: SceneGraph + GameWorld + ArtAddons {
    fn ref_world_transform(&self, object: RefId) -> Option<NodeTransform> {
        self.ref_root(object)
            .and_then(|root| self.world_transform(root))
    }

    fn hand_world_transform(&self, hand: Hand) -> Option<NodeTransform> {
        self.hand_node(hand)
            .and_then(|node| self.world_transform(node))
    }
}

impl<T: SceneGraph + GameWorld + ArtAddons> HostEngine for T {}
