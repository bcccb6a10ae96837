//! In-memory engine for headless sessions
//!
//! [`SimHost`] implements every host trait over plain collections: a node
//! tree with world transforms, placed references, inventories with extra-data
//! lists and an art-addon service whose attachments complete one frame
//! later. Tasks submitted by the controller are queued and run by
//! [`SimHost::advance_frame`], which also reports the inventory changes they
//! cause so the caller can forward them to the controller.

use std::collections::HashMap;

use bevy::prelude::Vec3;
use tracing::trace;

use crate::backpack::{ViewKind, EXTENT_KEY};
use crate::controller::{COLLISION_NODE, INACTIVE_COLLIDER_Z, ROLLOVER_NODE};
use crate::geometry::{BoundingSphere, NodeTransform};
use crate::host::{
    ArtAddonHandle, ArtAddons, BaseObjectId, CellId, ContainerChanged, ExtraListId, GameWorld,
    HandState, HostTask, InventoryEntry, ItemCategory, NodeId, RefId, SceneGraph, VrRuntime,
};
use crate::input::Hand;

/// Bounding radius given to attached models
pub const DEFAULT_MODEL_RADIUS: f32 = 5.0;
pub const PLAYER_CELL: CellId = CellId(1);
pub const DISABLED_CELL: CellId = CellId(99);

#[derive(Debug, Clone)]
struct SimNode {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: NodeTransform,
    world: NodeTransform,
    extra: HashMap<String, Vec3>,
    radius: Option<f32>,
}

#[derive(Debug, Clone)]
struct SimRef {
    base: BaseObjectId,
    root: Option<NodeId>,
    cell: Option<CellId>,
    activation_blocked: bool,
    marker: Option<u16>,
    count: i32,
}

#[derive(Debug, Clone)]
struct ExtraList {
    transform: Option<NodeTransform>,
    marker: Option<u16>,
}

#[derive(Debug, Clone)]
struct Stack {
    base: BaseObjectId,
    count: i32,
    lists: Vec<ExtraListId>,
}

#[derive(Debug, Clone)]
struct PendingAttach {
    handle: ArtAddonHandle,
    parent: NodeId,
    local: NodeTransform,
}

/// Nodes of a backpack built by [`SimHost::spawn_backpack`]
#[derive(Debug, Clone, Copy)]
pub struct BackpackNodes {
    pub root: NodeId,
    pub container: NodeId,
    pub grid: NodeId,
    pub holster: NodeId,
    pub handle: NodeId,
    pub collider: NodeId,
}

/// Size of the views created by [`SimHost::spawn_backpack`]
pub const CONTAINER_EXTENT: Vec3 = Vec3::new(20.0, 20.0, 20.0);
pub const GRID_EXTENT: Vec3 = Vec3::new(4.0, 20.0, 12.0);
pub const HOLSTER_EXTENT: Vec3 = Vec3::new(6.0, 6.0, 6.0);

#[derive(Debug)]
pub struct SimHost {
    nodes: Vec<SimNode>,
    refs: HashMap<RefId, SimRef>,
    next_ref: u32,
    player: RefId,
    hands: [NodeId; 2],
    hand_states: [HandState; 2],
    room: NodeId,
    camera: NodeId,
    disabled_marker: RefId,
    inventories: HashMap<RefId, Vec<Stack>>,
    lists: HashMap<ExtraListId, ExtraList>,
    next_list: u64,
    categories: HashMap<BaseObjectId, ItemCategory>,
    models: HashMap<BaseObjectId, String>,
    pending_attach: Vec<PendingAttach>,
    attached: HashMap<ArtAddonHandle, NodeId>,
    next_addon: u32,
    queued_tasks: Vec<HostTask>,
    completed_tasks: Vec<HostTask>,
    /// Frames a picked-up object's extra-data list takes to appear
    pub extra_list_delay: u32,
    delayed_lists: Vec<(u32, RefId, BaseObjectId, u16)>,
    pulses: Vec<(Hand, u16)>,
}

fn at(position: Vec3) -> NodeTransform {
    NodeTransform::from_translation(position)
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Empty world with a player at the origin, both hands, a camera and the
    /// HUD room node with its rollover child.
    pub fn new() -> Self {
        let mut host = Self {
            nodes: Vec::new(),
            refs: HashMap::new(),
            next_ref: 1,
            player: RefId(0),
            hands: [NodeId(0); 2],
            hand_states: [HandState::Empty; 2],
            room: NodeId(0),
            camera: NodeId(0),
            disabled_marker: RefId(0),
            inventories: HashMap::new(),
            lists: HashMap::new(),
            next_list: 1,
            categories: HashMap::new(),
            models: HashMap::new(),
            pending_attach: Vec::new(),
            attached: HashMap::new(),
            next_addon: 1,
            queued_tasks: Vec::new(),
            completed_tasks: Vec::new(),
            extra_list_delay: 0,
            delayed_lists: Vec::new(),
            pulses: Vec::new(),
        };

        let player_root = host.add_node("PlayerRoot", None, NodeTransform::IDENTITY);
        host.player = host.add_ref(BaseObjectId(7), Some(player_root), Some(PLAYER_CELL));
        let right = host.add_node("RightHand", None, at(Vec3::new(20.0, 0.0, 100.0)));
        let left = host.add_node("LeftHand", None, at(Vec3::new(-20.0, 0.0, 100.0)));
        host.hands = [right, left];
        host.camera = host.add_node("Camera", None, at(Vec3::new(0.0, 0.0, 120.0)));
        let room = host.add_node("Room", None, at(Vec3::new(0.0, 0.0, 110.0)));
        host.room = room;
        host.add_node(ROLLOVER_NODE, Some(room), at(Vec3::new(10.0, 5.0, 0.0)));
        host.disabled_marker = host.add_ref(BaseObjectId(8), None, Some(DISABLED_CELL));
        host
    }

    pub fn add_node(&mut self, name: &str, parent: Option<NodeId>, local: NodeTransform) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SimNode {
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            local,
            world: local,
            extra: HashMap::new(),
            radius: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        self.refresh_world(id);
        id
    }

    pub fn add_ref(&mut self, base: BaseObjectId, root: Option<NodeId>, cell: Option<CellId>) -> RefId {
        let id = RefId(self.next_ref);
        self.next_ref += 1;
        self.refs.insert(
            id,
            SimRef {
                base,
                root,
                cell,
                activation_blocked: false,
                marker: None,
                count: 1,
            },
        );
        id
    }

    /// A loose world object of `base` with a small bound at `position`
    pub fn spawn_object(&mut self, base: BaseObjectId, position: Vec3) -> RefId {
        let root = self.add_node("WorldObject", None, NodeTransform::from_translation(position));
        self.set_bound_radius(root, 1.0);
        self.add_ref(base, Some(root), Some(PLAYER_CELL))
    }

    /// Backpack model with one node per view and a parked collision node.
    ///
    /// The container box spans `CONTAINER_EXTENT` from the root, the grid sits
    /// above it, the holster beside it and the carry handle below.
    pub fn spawn_backpack(&mut self, base: BaseObjectId, position: Vec3) -> (RefId, BackpackNodes) {
        let root = self.add_node("Backpack", None, NodeTransform::from_translation(position));
        let container = self.add_node(ViewKind::Container.node_name(), Some(root), NodeTransform::IDENTITY);
        self.set_extra(container, EXTENT_KEY, CONTAINER_EXTENT);
        let grid = self.add_node(
            ViewKind::Grid.node_name(),
            Some(root),
            NodeTransform::from_translation(Vec3::new(0.0, 0.0, 30.0)),
        );
        self.set_extra(grid, EXTENT_KEY, GRID_EXTENT);
        let holster = self.add_node(
            ViewKind::Holster.node_name(),
            Some(root),
            NodeTransform::from_translation(Vec3::new(-20.0, 10.0, 10.0)),
        );
        self.set_extra(holster, EXTENT_KEY, HOLSTER_EXTENT);
        let handle = self.add_node(
            ViewKind::Handle.node_name(),
            Some(root),
            NodeTransform::from_translation(Vec3::new(10.0, 10.0, -15.0)),
        );
        let collider = self.add_node(
            COLLISION_NODE,
            Some(root),
            NodeTransform::from_translation(Vec3::new(0.0, 0.0, INACTIVE_COLLIDER_Z)),
        );
        let object = self.add_ref(base, Some(root), Some(PLAYER_CELL));
        (
            object,
            BackpackNodes {
                root,
                container,
                grid,
                holster,
                handle,
                collider,
            },
        )
    }

    pub fn set_extra(&mut self, node: NodeId, key: &str, value: Vec3) {
        if let Some(node) = self.nodes.get_mut(node.0 as usize) {
            node.extra.insert(key.to_owned(), value);
        }
    }

    pub fn set_bound_radius(&mut self, node: NodeId, radius: f32) {
        if let Some(node) = self.nodes.get_mut(node.0 as usize) {
            node.radius = Some(radius);
        }
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0 as usize).map(|n| n.name.as_str())
    }

    pub fn hand(&self, hand: Hand) -> NodeId {
        self.hands[hand.index()]
    }

    pub fn room(&self) -> NodeId {
        self.room
    }

    pub fn set_hand_position(&mut self, hand: Hand, position: Vec3) {
        let node = self.hands[hand.index()];
        let mut local = self.nodes[node.0 as usize].local;
        local.translate = position;
        self.set_local_transform(node, local);
    }

    pub fn set_hand_transform(&mut self, hand: Hand, local: NodeTransform) {
        self.set_local_transform(self.hands[hand.index()], local);
    }

    pub fn set_hand_state(&mut self, hand: Hand, state: HandState) {
        self.hand_states[hand.index()] = state;
    }

    /// Move a reference's root node, or unload its 3D with `None`
    pub fn set_ref_position(&mut self, object: RefId, position: Vec3) {
        if let Some(root) = self.refs.get(&object).and_then(|r| r.root) {
            let mut local = self.nodes[root.0 as usize].local;
            local.translate = position;
            self.set_local_transform(root, local);
        }
    }

    pub fn set_ref_cell(&mut self, object: RefId, cell: CellId) {
        if let Some(r) = self.refs.get_mut(&object) {
            r.cell = Some(cell);
        }
    }

    pub fn unload_3d(&mut self, object: RefId) {
        if let Some(r) = self.refs.get_mut(&object) {
            r.root = None;
        }
    }

    pub fn is_activation_blocked(&self, object: RefId) -> bool {
        self.refs.get(&object).is_some_and(|r| r.activation_blocked)
    }

    pub fn ref_marker(&self, object: RefId) -> Option<u16> {
        self.refs.get(&object).and_then(|r| r.marker)
    }

    pub fn define_item(&mut self, base: BaseObjectId, category: ItemCategory, model: Option<&str>) {
        self.categories.insert(base, category);
        if let Some(model) = model {
            self.models.insert(base, model.to_owned());
        }
    }

    /// Add plain stock to an actor's inventory
    pub fn give_item(&mut self, actor: RefId, base: BaseObjectId, count: i32) {
        let stacks = self.inventories.entry(actor).or_default();
        match stacks.iter_mut().find(|s| s.base == base) {
            Some(stack) => stack.count += count,
            None => stacks.push(Stack {
                base,
                count,
                lists: Vec::new(),
            }),
        }
    }

    /// Add one instance with a stored transform
    pub fn give_placed_item(
        &mut self,
        actor: RefId,
        base: BaseObjectId,
        transform: NodeTransform,
    ) -> ExtraListId {
        let list = self.new_list(Some(transform), None);
        self.give_item(actor, base, 1);
        if let Some(stack) = self
            .inventories
            .get_mut(&actor)
            .and_then(|stacks| stacks.iter_mut().find(|s| s.base == base))
        {
            stack.lists.push(list);
        }
        list
    }

    pub fn item_count(&self, actor: RefId, base: BaseObjectId) -> i32 {
        self.inventories
            .get(&actor)
            .and_then(|stacks| stacks.iter().find(|s| s.base == base))
            .map_or(0, |s| s.count)
    }

    pub fn list_marker(&self, list: ExtraListId) -> Option<u16> {
        self.lists.get(&list).and_then(|l| l.marker)
    }

    fn new_list(&mut self, transform: Option<NodeTransform>, marker: Option<u16>) -> ExtraListId {
        let id = ExtraListId(self.next_list);
        self.next_list += 1;
        self.lists.insert(id, ExtraList { transform, marker });
        id
    }

    /// Tasks waiting for the next [`SimHost::advance_frame`]
    pub fn queued_tasks(&self) -> &[HostTask] {
        &self.queued_tasks
    }

    pub fn completed_tasks(&self) -> &[HostTask] {
        &self.completed_tasks
    }

    pub fn pulses(&self) -> &[(Hand, u16)] {
        &self.pulses
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len() + self.pending_attach.len()
    }

    pub fn is_attached(&self, handle: ArtAddonHandle) -> bool {
        self.attached.contains_key(&handle) || self.pending_attach.iter().any(|p| p.handle == handle)
    }

    /// Finish pending attachments, run queued tasks and return the inventory
    /// changes they produced, in order.
    pub fn advance_frame(&mut self) -> Vec<ContainerChanged> {
        for pending in std::mem::take(&mut self.pending_attach) {
            let node = self.add_node("ArtAddon", Some(pending.parent), pending.local);
            self.set_bound_radius(node, DEFAULT_MODEL_RADIUS);
            self.attached.insert(pending.handle, node);
        }

        let mut delayed = Vec::new();
        for (frames, owner, base, marker) in std::mem::take(&mut self.delayed_lists) {
            if frames == 0 {
                self.attach_marked_list(owner, base, marker);
            } else {
                delayed.push((frames - 1, owner, base, marker));
            }
        }
        self.delayed_lists = delayed;

        let mut changes = Vec::new();
        for task in std::mem::take(&mut self.queued_tasks) {
            self.run_task(&task, &mut changes);
            self.completed_tasks.push(task);
        }
        changes
    }

    fn attach_marked_list(&mut self, owner: RefId, base: BaseObjectId, marker: u16) {
        let list = self.new_list(None, Some(marker));
        if let Some(stack) = self
            .inventories
            .get_mut(&owner)
            .and_then(|stacks| stacks.iter_mut().find(|s| s.base == base))
        {
            stack.lists.push(list);
        }
    }

    fn remove_stock(&mut self, actor: RefId, base: BaseObjectId, count: i32, extra: Option<ExtraListId>) -> i32 {
        let Some(stacks) = self.inventories.get_mut(&actor) else { return 0 };
        let Some(pos) = stacks.iter().position(|s| s.base == base) else { return 0 };
        let stack = &mut stacks[pos];
        let removed = count.min(stack.count);
        stack.count -= removed;
        if let Some(extra) = extra {
            stack.lists.retain(|list| *list != extra);
        }
        if stack.count <= 0 {
            stacks.remove(pos);
        }
        removed
    }

    fn run_task(&mut self, task: &HostTask, changes: &mut Vec<ContainerChanged>) {
        trace!(?task, "running host task");
        match *task {
            HostTask::DropItem {
                actor,
                base,
                count,
                extra,
                at,
                ..
            } => {
                let removed = self.remove_stock(actor, base, count, extra);
                if removed > 0 {
                    let object = self.spawn_object(base, at.unwrap_or(Vec3::ZERO));
                    if let Some(r) = self.refs.get_mut(&object) {
                        r.count = removed;
                    }
                    changes.push(ContainerChanged {
                        old_container: Some(actor),
                        new_container: None,
                        base_object: base,
                        item_count: removed,
                        unique_id: 0,
                    });
                }
            }
            HostTask::PickUp { actor, object } => {
                let Some(picked) = self.refs.remove(&object) else { return };
                self.give_item(actor, picked.base, picked.count);
                if let Some(marker) = picked.marker {
                    match self.extra_list_delay {
                        0 => self.attach_marked_list(actor, picked.base, marker),
                        delay => self.delayed_lists.push((delay - 1, actor, picked.base, marker)),
                    }
                }
                changes.push(ContainerChanged {
                    old_container: None,
                    new_container: Some(actor),
                    base_object: picked.base,
                    item_count: picked.count,
                    unique_id: 0,
                });
            }
            HostTask::MoveTo { object, target } => {
                let (position, cell) = match self.refs.get(&target) {
                    Some(r) => (
                        r.root.map(|root| self.nodes[root.0 as usize].world.translate),
                        r.cell,
                    ),
                    None => return,
                };
                if let Some(position) = position {
                    self.set_ref_position(object, position);
                }
                if let (Some(cell), Some(r)) = (cell, self.refs.get_mut(&object)) {
                    r.cell = Some(cell);
                }
            }
            HostTask::EquipItem { .. } | HostTask::ToggleFavorite { .. } => {}
        }
    }

    fn refresh_world(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let index = current.0 as usize;
            let world = match self.nodes[index].parent {
                Some(parent) => self.nodes[parent.0 as usize]
                    .world
                    .compose(&self.nodes[index].local),
                None => self.nodes[index].local,
            };
            self.nodes[index].world = world;
            stack.extend(self.nodes[index].children.iter().copied());
        }
    }

    fn node(&self, node: NodeId) -> Option<&SimNode> {
        self.nodes.get(node.0 as usize)
    }
}

impl SceneGraph for SimHost {
    fn world_transform(&self, node: NodeId) -> Option<NodeTransform> {
        self.node(node).map(|n| n.world)
    }

    fn local_transform(&self, node: NodeId) -> Option<NodeTransform> {
        self.node(node).map(|n| n.local)
    }

    fn set_local_transform(&mut self, node: NodeId, local: NodeTransform) {
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.local = local;
            self.refresh_world(node);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn find_child(&self, root: NodeId, name: &str) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let n = self.node(current)?;
            if n.name == name {
                return Some(current);
            }
            stack.extend(n.children.iter().rev().copied());
        }
        None
    }

    fn vector_extra_data(&self, node: NodeId, key: &str) -> Option<Vec3> {
        self.node(node).and_then(|n| n.extra.get(key).copied())
    }

    fn world_bound(&self, node: NodeId) -> Option<BoundingSphere> {
        let n = self.node(node)?;
        let radius = n.radius?;
        Some(BoundingSphere::new(n.world.translate, radius * n.world.scale))
    }
}

impl GameWorld for SimHost {
    fn player(&self) -> RefId {
        self.player
    }

    fn ref_root(&self, object: RefId) -> Option<NodeId> {
        self.refs.get(&object).and_then(|r| r.root)
    }

    fn ref_cell(&self, object: RefId) -> Option<CellId> {
        self.refs.get(&object).and_then(|r| r.cell)
    }

    fn ref_base(&self, object: RefId) -> Option<BaseObjectId> {
        self.refs.get(&object).map(|r| r.base)
    }

    fn set_ref_base(&mut self, object: RefId, base: BaseObjectId) {
        if let Some(r) = self.refs.get_mut(&object) {
            r.base = base;
        }
    }

    fn set_activation_blocked(&mut self, object: RefId, blocked: bool) {
        if let Some(r) = self.refs.get_mut(&object) {
            r.activation_blocked = blocked;
        }
    }

    fn hand_node(&self, hand: Hand) -> Option<NodeId> {
        Some(self.hands[hand.index()])
    }

    fn hand_state(&self, hand: Hand) -> HandState {
        self.hand_states[hand.index()]
    }

    fn room_node(&self) -> Option<NodeId> {
        Some(self.room)
    }

    fn camera_node(&self) -> Option<NodeId> {
        Some(self.camera)
    }

    fn disabled_marker(&self) -> Option<RefId> {
        Some(self.disabled_marker)
    }

    fn inventory(&self, actor: RefId) -> Vec<InventoryEntry> {
        self.inventories
            .get(&actor)
            .map(|stacks| {
                stacks
                    .iter()
                    .map(|s| InventoryEntry {
                        base: s.base,
                        count: s.count,
                        extra_lists: s.lists.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn item_category(&self, base: BaseObjectId) -> ItemCategory {
        self.categories
            .get(&base)
            .copied()
            .unwrap_or(ItemCategory::Misc)
    }

    fn model_path(&self, base: BaseObjectId) -> Option<String> {
        self.models.get(&base).cloned()
    }

    fn item_transform(&self, list: ExtraListId) -> Option<NodeTransform> {
        self.lists.get(&list).and_then(|l| l.transform)
    }

    fn set_item_transform(&mut self, list: ExtraListId, local: NodeTransform) {
        if let Some(l) = self.lists.get_mut(&list) {
            l.transform = Some(local);
        }
    }

    fn set_marker(&mut self, object: RefId, marker: u16) {
        if let Some(r) = self.refs.get_mut(&object) {
            r.marker = Some(marker);
        }
    }

    fn find_marked_extra_list(
        &self,
        owner: RefId,
        base: BaseObjectId,
        marker: u16,
    ) -> Option<ExtraListId> {
        let stack = self.inventories.get(&owner)?.iter().find(|s| s.base == base)?;
        stack
            .lists
            .iter()
            .copied()
            .find(|list| self.list_marker(*list) == Some(marker))
    }

    fn clear_marker(&mut self, list: ExtraListId) {
        if let Some(l) = self.lists.get_mut(&list) {
            l.marker = None;
        }
    }

    fn submit_task(&mut self, task: HostTask) {
        self.queued_tasks.push(task);
    }
}

impl ArtAddons for SimHost {
    fn attach_model(
        &mut self,
        path: &str,
        target: RefId,
        parent: NodeId,
        local: NodeTransform,
    ) -> Option<ArtAddonHandle> {
        self.node(parent)?;
        let handle = ArtAddonHandle(self.next_addon);
        self.next_addon += 1;
        trace!(path, ?target, ?handle, "attaching model");
        self.pending_attach.push(PendingAttach {
            handle,
            parent,
            local,
        });
        Some(handle)
    }

    fn model_root(&self, handle: ArtAddonHandle) -> Option<NodeId> {
        self.attached.get(&handle).copied()
    }

    fn detach(&mut self, handle: ArtAddonHandle) {
        self.pending_attach.retain(|p| p.handle != handle);
        if let Some(node) = self.attached.remove(&handle) {
            // orphan the node so it no longer moves with its parent
            if let Some(parent) = self.nodes[node.0 as usize].parent.take() {
                self.nodes[parent.0 as usize].children.retain(|c| *c != node);
            }
        }
    }
}

impl VrRuntime for SimHost {
    fn trigger_haptic_pulse(&mut self, hand: Hand, duration_micros: u16) {
        self.pulses.push((hand, duration_micros));
    }
}
