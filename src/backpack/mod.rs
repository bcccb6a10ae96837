//! Backpack model: views, items and their hover state machines
//!
//! A backpack is a placed object whose 3D model carries named child nodes,
//! one per [`ViewKind`]. Each node becomes a [`View`] with local bounds read
//! from its `extent` data. Views own the [`Item`]s drawn inside them.
//!
//! Views and items track a per-hand [`HoverState`]. Every state change queues
//! exactly one UI event; unchanged states queue nothing. Views and items are
//! referred to from outside by [`ViewRef`] / [`ItemRef`] handles that carry
//! the backpack generation, so handles taken before a teardown no longer
//! resolve afterwards.

use bevy::prelude::Vec3;
use tracing::{debug, info, trace};

use crate::config::Settings;
use crate::geometry::{yaw_towards, BoundingSphere, NodeTransform};
use crate::host::{BaseObjectId, ExtraListId, HostEngine, NodeId, RefId};
use crate::input::Hand;

pub mod events;
pub mod item;
pub mod view;

pub use events::{CreateExtraDataEvent, EventQueue, ItemHoverEvent, UiEvent, ViewHoverEvent};
pub use item::{Item, ItemEffect};
pub use view::{GridLayout, View, ViewKind};

/// Extra-data key holding a view node's box size
pub const EXTENT_KEY: &str = "extent";

/// Horizontal distance under which a grabbed pack stops turning to the camera
const FACE_CAMERA_TOLERANCE: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackpackId(pub u32);

/// Non-owning reference to a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRef {
    pub backpack: BackpackId,
    pub index: usize,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

/// Non-owning reference to an item inside a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub view: ViewRef,
    pub item: ItemId,
}

/// Per-hand selection state of a view or item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovered,
    Active,
}

/// Lifecycle and interaction phase of a backpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackpackState {
    /// Parked in the disabled worldspace; nothing is updated
    #[default]
    Disabled,
    /// Summoned, but no hand is close enough to interact
    Idle,
    /// A hand is within reach; views and items are tested every frame
    Active,
    /// Following a hand by its carry handle
    Grabbed,
}

#[derive(Debug)]
pub struct Backpack {
    id: BackpackId,
    object: RefId,
    wearer: RefId,
    default_base: Option<BaseObjectId>,
    views: Vec<View>,
    state: BackpackState,
    generation: u32,
    grabbed_by: Option<Hand>,
    rescan: bool,
}

impl Backpack {
    pub fn new(id: BackpackId, object: RefId, wearer: RefId) -> Self {
        Self {
            id,
            object,
            wearer,
            default_base: None,
            views: Vec::new(),
            state: BackpackState::Disabled,
            generation: 0,
            grabbed_by: None,
            rescan: false,
        }
    }

    pub fn id(&self) -> BackpackId {
        self.id
    }

    /// Placed object implementing the backpack
    pub fn object(&self) -> RefId {
        self.object
    }

    pub fn wearer(&self) -> RefId {
        self.wearer
    }

    /// Base object the backpack reference shows when nothing is selected
    pub fn default_base(&self) -> Option<BaseObjectId> {
        self.default_base
    }

    pub fn state(&self) -> BackpackState {
        self.state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn grabbed_by(&self) -> Option<Hand> {
        self.grabbed_by
    }

    pub fn is_init(&self) -> bool {
        !self.views.is_empty()
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Rebuild the views from the inventory on the next update
    pub fn request_rescan(&mut self) {
        self.rescan = true;
    }

    pub fn take_rescan(&mut self) -> bool {
        std::mem::take(&mut self.rescan)
    }

    pub fn transition(&mut self, new_state: BackpackState) {
        if self.state != new_state {
            debug!(backpack = ?self.id, from = ?self.state, to = ?new_state, "backpack state change");
            self.state = new_state;
        }
        if new_state != BackpackState::Grabbed {
            self.grabbed_by = None;
        }
    }

    pub fn grab(&mut self, hand: Hand) {
        self.transition(BackpackState::Grabbed);
        self.grabbed_by = Some(hand);
    }

    /// Both the backpack and its wearer have loaded 3D
    pub fn is_valid(&self, host: &dyn HostEngine) -> bool {
        host.ref_root(self.object).is_some() && host.ref_root(self.wearer).is_some()
    }

    /// Build views from the model's named nodes and show the wearer's inventory.
    ///
    /// Returns false when the model is not loaded yet or has no view nodes.
    pub fn init(&mut self, host: &mut dyn HostEngine, settings: &Settings) -> bool {
        let Some(root) = host.ref_root(self.object) else {
            trace!(backpack = ?self.id, "init skipped, 3D not loaded");
            return false;
        };
        if self.default_base.is_none() {
            self.default_base = host.ref_base(self.object);
        }
        host.set_activation_blocked(self.object, true);

        let mut views = Vec::new();
        for kind in ViewKind::ALL {
            let Some(node) = host.find_child(root, kind.node_name()) else {
                trace!(backpack = ?self.id, ?kind, "no node for view");
                continue;
            };
            let extent = host.vector_extra_data(node, EXTENT_KEY);
            let Some(bounds) = kind.bounds(extent) else {
                trace!(backpack = ?self.id, ?kind, "view node has no extent");
                continue;
            };
            let handle = ViewRef {
                backpack: self.id,
                index: views.len(),
                generation: self.generation,
            };
            let mut view = View::new(handle, kind, node, bounds);
            if let (ViewKind::Grid, Some(extent)) = (kind, extent) {
                view = view.with_grid(GridLayout::new(
                    extent,
                    settings.mini_items_per_row,
                    settings.mini_horizontal_spacing,
                ));
            }
            views.push(view);
        }

        if views.is_empty() {
            return false;
        }
        self.views = views;
        self.populate(host, settings);
        info!(
            backpack = ?self.id,
            views = self.views.len(),
            items = self.views.iter().map(|v| v.items().len()).sum::<usize>(),
            "backpack initialized"
        );
        true
    }

    /// Items with a stored transform go to the container, the rest to the grid
    fn populate(&mut self, host: &mut dyn HostEngine, settings: &Settings) {
        let container = self.view_index(ViewKind::Container);
        let grid = self.view_index(ViewKind::Grid);

        for entry in host.inventory(self.wearer) {
            let mut shown = 0;
            if let Some(container) = container {
                for list in &entry.extra_lists {
                    if let Some(local) = host.item_transform(*list) {
                        self.place_item(host, container, entry.base, 1, Some(*list), local);
                        shown += 1;
                    }
                }
            }

            let remaining = entry.count - shown;
            if remaining <= 0 || settings.disable_grid {
                continue;
            }
            let Some(grid) = grid else { continue };
            let Some(slot) = self.views[grid].next_grid_slot() else {
                trace!(backpack = ?self.id, base = ?entry.base, "grid full");
                continue;
            };
            let local = NodeTransform::from_translation(slot);
            self.place_item(host, grid, entry.base, remaining, None, local);
        }
    }

    /// Add an item to a view and start attaching its model
    pub fn place_item(
        &mut self,
        host: &mut dyn HostEngine,
        view_index: usize,
        base: BaseObjectId,
        count: i32,
        extra: Option<ExtraListId>,
        local: NodeTransform,
    ) -> Option<ItemRef> {
        let object = self.object;
        let view = self.views.get_mut(view_index)?;
        let id = view.add_item(base, count, extra, local);
        let node = view.node();
        let model = host
            .model_path(base)
            .and_then(|path| host.attach_model(&path, object, node, local));
        if let Some(item) = view.item_mut(id) {
            item.model = model;
        }
        Some(view.item_ref(id))
    }

    /// Detach everything and drop all views. Outstanding handles stop resolving.
    pub fn teardown(&mut self, host: &mut dyn HostEngine) {
        for view in &mut self.views {
            for item in view.take_items() {
                for handle in item.attachments() {
                    host.detach(handle);
                }
            }
        }
        self.views.clear();
        self.generation = self.generation.wrapping_add(1);
        self.grabbed_by = None;
        debug!(backpack = ?self.id, generation = self.generation, "backpack torn down");
    }

    pub fn view_index(&self, kind: ViewKind) -> Option<usize> {
        self.views.iter().position(|view| view.kind() == kind)
    }

    pub fn view(&self, handle: ViewRef) -> Option<&View> {
        if handle.backpack != self.id || handle.generation != self.generation {
            return None;
        }
        self.views.get(handle.index)
    }

    pub fn view_mut(&mut self, handle: ViewRef) -> Option<&mut View> {
        if handle.backpack != self.id || handle.generation != self.generation {
            return None;
        }
        self.views.get_mut(handle.index)
    }

    pub fn item(&self, handle: ItemRef) -> Option<&Item> {
        self.view(handle.view)?.item(handle.item)
    }

    pub fn item_mut(&mut self, handle: ItemRef) -> Option<&mut Item> {
        self.view_mut(handle.view)?.item_mut(handle.item)
    }

    pub fn remove_item(&mut self, handle: ItemRef) -> Option<Item> {
        self.view_mut(handle.view)?.remove_item(handle.item)
    }

    /// First item showing `base`, searching views in order
    pub fn find_item(&self, base: BaseObjectId) -> Option<ItemRef> {
        self.views.iter().find_map(|view| {
            view.items()
                .iter()
                .find(|item| item.base == base)
                .map(|item| view.item_ref(item.id()))
        })
    }

    pub fn active_view(&self, hand: Hand) -> Option<&View> {
        self.views
            .iter()
            .find(|view| view.state(hand) == HoverState::Active)
    }

    pub fn active_item(&self, hand: Hand) -> Option<ItemRef> {
        let view = self.active_view(hand)?;
        view.active_item(hand).map(|item| view.item_ref(item.id()))
    }

    /// Broad phase: choose the view containing `point` for `hand`.
    ///
    /// When boxes overlap, the last matching view in iteration order wins and
    /// the other matches become `Hovered`. Views losing `Active` are demoted
    /// first so their item cascades are queued before the winner activates.
    pub fn pick_active_view(
        &mut self,
        hand: Hand,
        point: Vec3,
        world_of: impl Fn(NodeId) -> Option<NodeTransform>,
        events: &mut EventQueue,
    ) -> Option<usize> {
        let hits: Vec<bool> = self
            .views
            .iter()
            .map(|view| {
                world_of(view.node())
                    .and_then(|world| view.check_overlap(&world, point))
                    .is_some()
            })
            .collect();
        let winner = hits.iter().rposition(|hit| *hit);

        for (index, view) in self.views.iter_mut().enumerate() {
            if winner == Some(index) {
                continue;
            }
            let state = if hits[index] {
                HoverState::Hovered
            } else {
                HoverState::Idle
            };
            view.set_state(hand, state, events);
        }
        if let Some(index) = winner {
            self.views[index].set_state(hand, HoverState::Active, events);
        }
        winner
    }

    /// Narrow phase inside the active view for `hand`
    pub fn pick_active_item(
        &mut self,
        view_index: usize,
        hand: Hand,
        point: Vec3,
        bound_of: impl Fn(&Item) -> Option<BoundingSphere>,
        events: &mut EventQueue,
    ) -> Option<ItemRef> {
        let view = self.views.get_mut(view_index)?;
        if view.is_handle() {
            return None;
        }
        let id = view.pick_active_item(hand, point, bound_of, events)?;
        Some(view.item_ref(id))
    }

    /// Force every view, and by cascade every item, to `Idle` for `hand`
    pub fn reset_hand(&mut self, hand: Hand, events: &mut EventQueue) {
        for view in &mut self.views {
            view.set_state(hand, HoverState::Idle, events);
        }
    }

    /// True when the pack should be parked: wearer too far or in another cell
    pub fn check_shutoff_distance(&self, host: &dyn HostEngine, settings: &Settings) -> bool {
        let (Some(pack), Some(wearer)) = (
            host.ref_world_transform(self.object),
            host.ref_world_transform(self.wearer),
        ) else {
            return false;
        };
        let limit = if self.wearer == host.player() {
            settings.shutoff_distance_player
        } else {
            settings.shutoff_distance_npc
        };
        pack.translate.distance(wearer.translate) > limit
            || host.ref_cell(self.object) != host.ref_cell(self.wearer)
    }

    /// True when either hand is within interaction distance of the pack
    pub fn check_interact_distance(&self, host: &dyn HostEngine, settings: &Settings) -> bool {
        let Some(pack) = host.ref_world_transform(self.object) else {
            return false;
        };
        Hand::ALL.into_iter().any(|hand| {
            host.hand_world_transform(hand).is_some_and(|t| {
                t.translate.distance(pack.translate) < settings.min_interaction_distance
            })
        })
    }

    /// Place the pack so its carry handle sits in the grabbing hand, turned to face the camera
    pub fn move_grabbed(&self, host: &mut dyn HostEngine) {
        let Some(hand) = self.grabbed_by else { return };
        let Some(root) = host.ref_root(self.object) else { return };
        let (Some(root_world), Some(hand_world)) =
            (host.world_transform(root), host.hand_world_transform(hand))
        else {
            return;
        };

        let handle_offset = self
            .view_index(ViewKind::Handle)
            .and_then(|index| host.world_transform(self.views[index].node()))
            .map(|grab| root_world.world_to_local(grab.translate))
            .unwrap_or(Vec3::ZERO);

        let mut rotate = root_world.rotate;
        if let Some(camera) = host.camera_node().and_then(|node| host.world_transform(node)) {
            if let Some(yaw) = yaw_towards(hand_world.translate, camera.translate, FACE_CAMERA_TOLERANCE) {
                rotate = yaw;
            }
        }

        let desired = NodeTransform {
            rotate,
            translate: hand_world.translate - rotate * (handle_offset * root_world.scale),
            scale: root_world.scale,
        };
        let local = match host.parent(root).and_then(|parent| host.world_transform(parent)) {
            Some(parent) => parent.child_local_for(&desired),
            None => desired,
        };
        host.set_local_transform(root, local);
    }

    /// Scale down item models that finished attaching since the last frame
    pub fn update_models(&mut self, host: &mut dyn HostEngine, settings: &Settings) {
        for view in &mut self.views {
            let limit = view
                .grid()
                .map_or(settings.scale_big_items, |grid| grid.item_radius);
            for item in view.items_mut() {
                if item.model_ready {
                    continue;
                }
                let Some(node) = item.model.and_then(|model| host.model_root(model)) else {
                    continue;
                };
                let Some(bound) = host.world_bound(node) else { continue };
                if bound.radius > limit && bound.radius > 0.0 {
                    let mut local = host.local_transform(node).unwrap_or(item.local);
                    local.scale *= limit / bound.radius;
                    host.set_local_transform(node, local);
                }
                item.model_ready = true;
            }
        }
    }
}

/// World bounding sphere of an item's attached model
pub fn item_bound(host: &dyn HostEngine, item: &Item) -> Option<BoundingSphere> {
    let node = host.model_root(item.model?)?;
    host.world_bound(node)
}
