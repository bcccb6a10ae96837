use bevy::prelude::Vec3;

use super::events::{EventQueue, UiEvent, ViewHoverEvent};
use super::item::Item;
use super::{HoverState, ItemId, ItemRef, ViewRef};
use crate::geometry::{BoundingSphere, LocalBox, NodeTransform};
use crate::host::{BaseObjectId, ExtraListId, ItemCategory, NodeId};
use crate::input::Hand;

/// Half size of the carry handle's grab box
const HANDLE_HALF_SIZE: f32 = 3.0;

/// Zone kinds, each backed by a named node in the backpack model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Container,
    Grid,
    Holster,
    Handle,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::Container,
        ViewKind::Grid,
        ViewKind::Holster,
        ViewKind::Handle,
    ];

    pub const fn node_name(self) -> &'static str {
        match self {
            ViewKind::Container => "Container",
            ViewKind::Grid => "Grid",
            ViewKind::Holster => "Holster",
            ViewKind::Handle => "GrabNode",
        }
    }

    pub const fn is_handle(self) -> bool {
        matches!(self, ViewKind::Handle)
    }

    /// Local bounds from the node's `extent` data.
    ///
    /// Container and grid boxes start at the node origin, holsters are
    /// centred on it. The handle has a fixed cube and ignores extents.
    pub fn bounds(self, extent: Option<Vec3>) -> Option<LocalBox> {
        match self {
            ViewKind::Container | ViewKind::Grid => extent.map(LocalBox::from_origin),
            ViewKind::Holster => extent.map(LocalBox::centered),
            ViewKind::Handle => Some(LocalBox::cube(HANDLE_HALF_SIZE)),
        }
    }

    pub fn accepts(self, category: ItemCategory) -> bool {
        match self {
            ViewKind::Container | ViewKind::Grid => true,
            ViewKind::Holster => matches!(
                category,
                ItemCategory::Weapon | ItemCategory::Scroll | ItemCategory::Light
            ),
            ViewKind::Handle => false,
        }
    }
}

/// Cell arrangement of the miniature item grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub depth: f32,
    pub width: f32,
    pub height: f32,
    pub item_radius: f32,
    pub per_row: u32,
    pub per_column: u32,
    pub horizontal_spacing: f32,
    pub vertical_spacing: f32,
}

impl GridLayout {
    /// Rows run along local Y, columns fill downward from the top of local Z
    pub fn new(extent: Vec3, per_row: u32, horizontal_spacing: f32) -> Self {
        let per_row = per_row.max(1);
        let width = extent.y;
        let height = extent.z;
        let item_radius = ((width / per_row as f32 - horizontal_spacing) * 0.5).max(0.0);
        let cell = 2.0 * item_radius + horizontal_spacing;
        let per_column = if cell > 0.0 {
            (height / cell).floor().max(0.0) as u32
        } else {
            0
        };
        let vertical_spacing = if per_column > 0 {
            (height - per_column as f32 * 2.0 * item_radius) / per_column as f32
        } else {
            0.0
        };

        Self {
            depth: extent.x,
            width,
            height,
            item_radius,
            per_row,
            per_column,
            horizontal_spacing,
            vertical_spacing,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.per_row * self.per_column) as usize
    }

    /// Centre of cell `index`, or `None` once the grid is full
    pub fn slot(&self, index: usize) -> Option<Vec3> {
        if index >= self.capacity() {
            return None;
        }
        let column = (index % self.per_row as usize) as f32;
        let row = (index / self.per_row as usize) as f32;
        let diameter = 2.0 * self.item_radius;
        let y = self.horizontal_spacing * 0.5
            + self.item_radius
            + column * (diameter + self.horizontal_spacing);
        let z = self.height
            - (self.vertical_spacing * 0.5 + self.item_radius + row * (diameter + self.vertical_spacing));
        Some(Vec3::new(self.depth * 0.5, y, z))
    }
}

/// A selectable zone of a backpack and the items shown in it.
#[derive(Debug)]
pub struct View {
    handle: ViewRef,
    kind: ViewKind,
    node: NodeId,
    bounds: LocalBox,
    grid: Option<GridLayout>,
    items: Vec<Item>,
    state: [HoverState; 2],
    next_item: u32,
}

impl View {
    pub fn new(handle: ViewRef, kind: ViewKind, node: NodeId, bounds: LocalBox) -> Self {
        Self {
            handle,
            kind,
            node,
            bounds,
            grid: None,
            items: Vec::new(),
            state: [HoverState::Idle; 2],
            next_item: 0,
        }
    }

    pub fn with_grid(mut self, layout: GridLayout) -> Self {
        self.grid = Some(layout);
        self
    }

    pub fn handle(&self) -> ViewRef {
        self.handle
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn is_handle(&self) -> bool {
        self.kind.is_handle()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn bounds(&self) -> &LocalBox {
        &self.bounds
    }

    pub fn grid(&self) -> Option<&GridLayout> {
        self.grid.as_ref()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn item_ref(&self, id: ItemId) -> ItemRef {
        ItemRef {
            view: self.handle,
            item: id,
        }
    }

    pub fn state(&self, hand: Hand) -> HoverState {
        self.state[hand.index()]
    }

    pub fn can_accept(&self, category: ItemCategory) -> bool {
        self.kind.accepts(category)
    }

    /// Next free grid cell, if this is a grid view with room left
    pub fn next_grid_slot(&self) -> Option<Vec3> {
        self.grid.and_then(|grid| grid.slot(self.items.len()))
    }

    pub fn add_item(
        &mut self,
        base: BaseObjectId,
        count: i32,
        extra: Option<ExtraListId>,
        local: NodeTransform,
    ) -> ItemId {
        let id = ItemId(self.next_item);
        self.next_item += 1;
        self.items.push(Item::new(id, base, count, extra, local));
        id
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let pos = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(pos))
    }

    pub fn take_items(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    /// Change the state for `hand`, queueing a [`ViewHoverEvent`] on change.
    ///
    /// Leaving `Active` forces every item to `Idle` for that hand; the item
    /// events follow the view event in the queue.
    pub fn set_state(&mut self, hand: Hand, new_state: HoverState, events: &mut EventQueue) -> bool {
        let old_state = self.state[hand.index()];
        if old_state == new_state {
            return false;
        }
        self.state[hand.index()] = new_state;
        events.push(UiEvent::ViewHovered(ViewHoverEvent {
            new_state,
            hand,
            view: self.handle,
        }));
        if old_state == HoverState::Active {
            self.reset_items(hand, events);
        }
        true
    }

    pub fn reset_items(&mut self, hand: Hand, events: &mut EventQueue) {
        let view = self.handle;
        for item in &mut self.items {
            let handle = ItemRef {
                view,
                item: item.id(),
            };
            item.set_state(handle, hand, HoverState::Idle, events);
        }
    }

    /// Local distance from the view origin when `point` lies inside the bounds
    pub fn check_overlap(&self, root_world: &NodeTransform, point: Vec3) -> Option<f32> {
        let local = root_world.world_to_local(point);
        self.bounds.contains(local).then(|| local.length())
    }

    /// Narrow phase: the closest overlapping item becomes `Active`, other
    /// overlapping items `Hovered`, the rest `Idle`.
    ///
    /// Items are visited in insertion order and `bound_of` gives each item's
    /// world bounding sphere; items without one never overlap.
    pub fn pick_active_item(
        &mut self,
        hand: Hand,
        point: Vec3,
        bound_of: impl Fn(&Item) -> Option<BoundingSphere>,
        events: &mut EventQueue,
    ) -> Option<ItemId> {
        let distances: Vec<Option<f32>> = self
            .items
            .iter()
            .map(|item| bound_of(item).and_then(|sphere| sphere.overlap(point)))
            .collect();

        let winner = distances
            .iter()
            .enumerate()
            .filter_map(|(index, distance)| distance.map(|d| (index, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index);

        let view = self.handle;
        for (index, item) in self.items.iter_mut().enumerate() {
            let new_state = if winner == Some(index) {
                HoverState::Active
            } else if distances[index].is_some() {
                HoverState::Hovered
            } else {
                HoverState::Idle
            };
            let handle = ItemRef {
                view,
                item: item.id(),
            };
            item.set_state(handle, hand, new_state, events);
        }

        winner.map(|index| self.items[index].id())
    }

    pub fn active_item(&self, hand: Hand) -> Option<&Item> {
        self.items
            .iter()
            .find(|item| item.state(hand) == HoverState::Active)
    }
}
