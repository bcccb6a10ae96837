//! Per-frame driver for every backpack
//!
//! The [`Controller`] owns all backpacks and must run exactly once per
//! simulation frame, after hand transforms are final. One frame:
//!
//! 1. applies hand actions forwarded from the input thread
//! 2. updates each backpack's lifecycle and selects views and items per hand
//! 3. publishes what each hand points at for the input callbacks
//! 4. moves the activation proxy and the rollover overlay
//! 5. drains the UI event queue
//!
//! Engine notifications ([`Controller::on_container_changed`],
//! [`Controller::on_object_released`]) only record work; anything that
//! touches game objects happens in the next frame or through host tasks.

use std::sync::Arc;

use bevy::prelude::Resource;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, trace};

use crate::backpack::{
    item_bound, Backpack, BackpackId, BackpackState, EventQueue, HoverState, Item, ItemEffect,
    ItemHoverEvent, ItemRef, UiEvent, View, ViewHoverEvent,
};
use crate::config::Settings;
use crate::geometry::NodeTransform;
use crate::host::{ArtAddonHandle, BaseObjectId, HostEngine, HostTask, RefId};
use crate::input::{Hand, VrInput};
use crate::overlap::{OverlapSphereManager, SphereId, SphereShape};

mod actions;
mod inventory;
mod rollover;

pub use actions::{ActionBindings, HandAction, HandFocus};
pub use inventory::NewItemEvent;
pub use rollover::{Rollover, COLLISION_NODE, INACTIVE_COLLIDER_Z, ROLLOVER_NODE};

/// Glow attached to a hand while it points into a view
pub const HAND_FX_MODEL: &str = "effects/BackpackHandGlow.nif";
/// Glow drawn around hovered and active items
pub const ITEM_FX_MODEL: &str = "effects/BackpackItemGlow.nif";

const HOVERED_FX_SCALE: f32 = 1.1;
const ACTIVE_FX_SCALE: f32 = 1.3;
const ACTION_QUEUE_CAPACITY: usize = 64;
/// Frames a self-caused removal waits for its engine notification
pub const EXPECTED_REMOVAL_FRAMES: u64 = 30;

/// Removal the controller submitted and already reflected in its views
#[derive(Debug, Clone, Copy, PartialEq)]
struct ExpectedRemoval {
    actor: RefId,
    base: BaseObjectId,
    since: u64,
}

#[derive(Resource)]
pub struct Controller {
    backpacks: Vec<Backpack>,
    next_backpack: u32,
    settings: Settings,
    events: EventQueue,
    /// Backpack each hand is interacting with; one per hand at most
    selected: [Option<BackpackId>; 2],
    /// Summoned backpacks whose move has not landed yet
    in_transit: Vec<BackpackId>,
    pending_items: Vec<NewItemEvent>,
    /// Inventory removals reported by the engine, applied next frame
    pending_removals: Vec<(RefId, BaseObjectId)>,
    /// Removals the controller caused itself; they expire after
    /// [`EXPECTED_REMOVAL_FRAMES`] without a matching notification
    expected_removals: Vec<ExpectedRemoval>,
    frame: u64,
    next_marker: u16,
    hand_effects: [Option<ArtAddonHandle>; 2],
    rollover: Rollover,
    overlap: OverlapSphereManager,
    summon_zone: Option<SphereId>,
    focus: Arc<HandFocus>,
    action_sender: Sender<HandAction>,
    actions: Receiver<HandAction>,
    input: Option<(Arc<VrInput>, ActionBindings)>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        let (action_sender, actions) = crossbeam_channel::bounded(ACTION_QUEUE_CAPACITY);
        Self {
            backpacks: Vec::new(),
            next_backpack: 0,
            overlap: OverlapSphereManager::new(settings.palm_offset.into()),
            settings,
            events: EventQueue::default(),
            selected: [None; 2],
            in_transit: Vec::new(),
            pending_items: Vec::new(),
            pending_removals: Vec::new(),
            expected_removals: Vec::new(),
            frame: 0,
            next_marker: 0,
            hand_effects: [None; 2],
            rollover: Rollover::default(),
            summon_zone: None,
            focus: Arc::new(HandFocus::default()),
            action_sender,
            actions,
            input: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings. Changed button bindings are re-registered on the
    /// bound input, and the summon zone is rebuilt on the next frame.
    pub fn set_settings(&mut self, settings: Settings) {
        let rebind = settings.bindings != self.settings.bindings;
        self.overlap.set_palm_offset(settings.palm_offset.into());
        if let Some(zone) = self.summon_zone.take() {
            self.overlap.destroy(zone);
        }
        self.settings = settings;

        if rebind {
            if let Some((input, bindings)) = self.input.take() {
                bindings.unbind(&input);
                self.bind_input(input);
            }
        }
        info!("controller settings updated");
    }

    /// Track a backpack object worn by `wearer`. It starts `Disabled`.
    pub fn add_backpack(&mut self, object: RefId, wearer: RefId) -> BackpackId {
        let id = BackpackId(self.next_backpack);
        self.next_backpack += 1;
        self.backpacks.push(Backpack::new(id, object, wearer));
        debug!(backpack = ?id, ?object, ?wearer, "backpack registered");
        id
    }

    pub fn backpacks(&self) -> &[Backpack] {
        &self.backpacks
    }

    pub fn backpack(&self, id: BackpackId) -> Option<&Backpack> {
        self.backpacks.iter().find(|backpack| backpack.id() == id)
    }

    pub fn backpack_mut(&mut self, id: BackpackId) -> Option<&mut Backpack> {
        self.backpacks.iter_mut().find(|backpack| backpack.id() == id)
    }

    fn index_of(&self, id: BackpackId) -> Option<usize> {
        self.backpacks.iter().position(|backpack| backpack.id() == id)
    }

    pub fn selected_backpack(&self, hand: Hand) -> Option<BackpackId> {
        self.selected[hand.index()]
    }

    /// Events queued since the last drain
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn rollover(&self) -> &Rollover {
        &self.rollover
    }

    pub fn focus(&self) -> &Arc<HandFocus> {
        &self.focus
    }

    /// Sender for actions that do not come from a bound button
    pub fn action_sender(&self) -> Sender<HandAction> {
        self.action_sender.clone()
    }

    pub fn is_in_summon_zone(&self, hand: Hand) -> bool {
        self.summon_zone
            .is_some_and(|zone| self.overlap.is_inside(zone, hand))
    }

    /// The hand the rollover overlay is not normally drawn next to
    pub fn off_hand(&self) -> Hand {
        if self.settings.left_hand_mode {
            Hand::Right
        } else {
            Hand::Left
        }
    }

    pub fn primary_hand(&self) -> Hand {
        self.off_hand().other()
    }

    /// Process one frame. Call after the hand nodes have their final pose.
    pub fn post_wand_update(&mut self, host: &mut dyn HostEngine) {
        self.frame += 1;
        self.expire_removals();
        self.apply_removals(host);
        self.process_actions(host);
        self.update_summon_zone(host);
        for index in 0..self.backpacks.len() {
            self.update_backpack(host, index);
        }
        self.publish_focus();
        self.update_rollover(host);
        self.process_events(host);
    }

    fn update_backpack(&mut self, host: &mut dyn HostEngine, index: usize) {
        let id = self.backpacks[index].id();
        if self.backpacks[index].state() == BackpackState::Disabled {
            return;
        }
        if !self.backpacks[index].is_valid(host) {
            trace!(backpack = ?id, "backpack or wearer 3D not loaded");
            return;
        }

        if self.backpacks[index].take_rescan() && self.backpacks[index].is_init() {
            self.release_hands(index);
            self.backpacks[index].teardown(host);
        }

        if self.backpacks[index].state() == BackpackState::Grabbed {
            self.backpacks[index].move_grabbed(host);
        } else if self.in_transit.contains(&id) {
            if !self.backpacks[index].check_shutoff_distance(host, &self.settings) {
                self.in_transit.retain(|other| *other != id);
            }
        } else if self.backpacks[index].check_shutoff_distance(host, &self.settings) {
            self.shutoff(host, id);
            return;
        }

        let backpack = &mut self.backpacks[index];
        if !backpack.is_init() && !backpack.init(host, &self.settings) {
            return;
        }
        backpack.update_models(host, &self.settings);

        let in_reach = backpack.check_interact_distance(host, &self.settings);
        match (backpack.state(), in_reach) {
            (BackpackState::Idle, true) => backpack.transition(BackpackState::Active),
            (BackpackState::Active, false) => {
                self.release_hands(index);
                self.backpacks[index].transition(BackpackState::Idle);
            }
            _ => {}
        }
        if self.backpacks[index].state() != BackpackState::Active {
            return;
        }

        for hand in Hand::ALL {
            let slot = hand.index();
            if self.selected[slot].is_some_and(|other| other != id) {
                continue;
            }
            let Some(point) = host.hand_world_transform(hand).map(|t| t.translate) else {
                trace!(?hand, "hand node not loaded");
                continue;
            };

            let backpack = &mut self.backpacks[index];
            let view = backpack.pick_active_view(
                hand,
                point,
                |node| host.world_transform(node),
                &mut self.events,
            );
            match view {
                Some(view_index) => {
                    self.selected[slot] = Some(id);
                    backpack.pick_active_item(
                        view_index,
                        hand,
                        point,
                        |item| item_bound(&*host, item),
                        &mut self.events,
                    );
                }
                None if self.selected[slot] == Some(id) => self.selected[slot] = None,
                None => {}
            }
        }
    }

    /// Force both hands idle on a backpack and drop it as their selection
    fn release_hands(&mut self, index: usize) {
        let backpack = &mut self.backpacks[index];
        for hand in Hand::ALL {
            backpack.reset_hand(hand, &mut self.events);
            if self.selected[hand.index()] == Some(backpack.id()) {
                self.selected[hand.index()] = None;
            }
        }
    }

    /// Move a disabled backpack to its wearer
    pub fn summon(&mut self, host: &mut dyn HostEngine, id: BackpackId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let backpack = &mut self.backpacks[index];
        if backpack.state() != BackpackState::Disabled {
            return false;
        }
        host.submit_task(HostTask::MoveTo {
            object: backpack.object(),
            target: backpack.wearer(),
        });
        backpack.transition(BackpackState::Idle);
        self.in_transit.push(id);
        info!(backpack = ?id, "backpack summoned");
        true
    }

    /// Tear a backpack down and park it in the disabled cell
    pub fn shutoff(&mut self, host: &mut dyn HostEngine, id: BackpackId) {
        let Some(index) = self.index_of(id) else { return };
        self.release_hands(index);
        self.disable_activator(host, id);

        let backpack = &mut self.backpacks[index];
        backpack.teardown(host);
        match host.disabled_marker() {
            Some(target) => host.submit_task(HostTask::MoveTo {
                object: backpack.object(),
                target,
            }),
            None => trace!(backpack = ?id, "no disable marker to park at"),
        }
        backpack.transition(BackpackState::Disabled);
        self.in_transit.retain(|other| *other != id);
        info!(backpack = ?id, "backpack shut off");
    }

    fn update_summon_zone(&mut self, host: &dyn HostEngine) {
        if self.summon_zone.is_none() {
            if let Some(camera) = host.camera_node() {
                let shape = SphereShape::new(
                    camera,
                    self.settings.summon_sphere_offset.into(),
                    self.settings.summon_sphere_radius,
                )
                .heading_only();
                self.summon_zone = Some(self.overlap.create(shape));
            }
        }
        for event in self.overlap.update(host) {
            trace!(hand = ?event.hand, entered = event.entered, "summon zone");
        }
    }

    fn publish_focus(&self) {
        for hand in Hand::ALL {
            let backpack = self.selected[hand.index()].and_then(|id| self.backpack(id));
            let on_item = backpack.is_some_and(|b| b.active_item(hand).is_some());
            let on_handle = backpack
                .and_then(|b| b.active_view(hand))
                .is_some_and(View::is_handle);
            self.focus
                .publish(hand, on_item, on_handle, self.is_in_summon_zone(hand));
        }
    }

    /// Remove an item from its view, detaching its model and effects
    fn take_item(
        &mut self,
        host: &mut dyn HostEngine,
        index: usize,
        item_ref: ItemRef,
    ) -> Option<Item> {
        let backpack = &mut self.backpacks[index];
        if let Some(item) = backpack.item_mut(item_ref) {
            for hand in Hand::ALL {
                item.set_state(item_ref, hand, HoverState::Idle, &mut self.events);
            }
        }
        let item = backpack.remove_item(item_ref)?;
        for handle in item.attachments() {
            host.detach(handle);
        }
        Some(item)
    }

    /// Record a removal this controller submitted so its notification is skipped
    fn expect_removal(&mut self, actor: RefId, base: BaseObjectId) {
        self.expected_removals.push(ExpectedRemoval {
            actor,
            base,
            since: self.frame,
        });
    }

    fn expire_removals(&mut self) {
        let frame = self.frame;
        self.expected_removals.retain(|expected| {
            let alive = frame - expected.since <= EXPECTED_REMOVAL_FRAMES;
            if !alive {
                debug!(base = ?expected.base, "expected removal never reported");
            }
            alive
        });
    }

    fn apply_removals(&mut self, host: &mut dyn HostEngine) {
        for (wearer, base) in std::mem::take(&mut self.pending_removals) {
            let found = self.backpacks.iter().enumerate().find_map(|(index, backpack)| {
                (backpack.wearer() == wearer)
                    .then(|| backpack.find_item(base))
                    .flatten()
                    .map(|item| (index, item))
            });
            match found {
                Some((index, item)) => {
                    self.take_item(host, index, item);
                    debug!(?base, "item left the inventory");
                }
                None => trace!(?base, "removed item was not shown"),
            }
        }
    }

    /// Run the side effects of every queued event in arrival order
    fn process_events(&mut self, host: &mut dyn HostEngine) {
        let mut retry = Vec::new();
        while let Some(event) = self.events.pop() {
            match event {
                UiEvent::ViewHovered(event) => self.on_view_hovered(host, event),
                UiEvent::ItemHovered(event) => self.on_item_hovered(host, event),
                UiEvent::CreateExtraData(event) => {
                    if let Some(event) = self.on_create_extra_data(host, event) {
                        retry.push(event);
                    }
                }
            }
        }
        for event in retry {
            self.events.push(UiEvent::CreateExtraData(event));
        }
    }

    fn on_view_hovered(&mut self, host: &mut dyn HostEngine, event: ViewHoverEvent) {
        let slot = event.hand.index();
        if event.new_state == HoverState::Active {
            if self.hand_effects[slot].is_none() {
                let player = host.player();
                self.hand_effects[slot] = host.hand_node(event.hand).and_then(|node| {
                    host.attach_model(HAND_FX_MODEL, player, node, NodeTransform::IDENTITY)
                });
            }
            return;
        }
        let still_active = self
            .backpacks
            .iter()
            .any(|backpack| backpack.active_view(event.hand).is_some());
        if !still_active {
            if let Some(effect) = self.hand_effects[slot].take() {
                host.detach(effect);
            }
        }
    }

    fn on_item_hovered(&mut self, host: &mut dyn HostEngine, event: ItemHoverEvent) {
        let id = event.item.view.backpack;
        let mut activate = None;

        if let Some(index) = self.index_of(id) {
            let backpack = &mut self.backpacks[index];
            let object = backpack.object();
            let parent = backpack.view(event.item.view).map(View::node);
            if let Some(item) = backpack.item_mut(event.item) {
                for effect in item.take_effects(event.hand) {
                    host.detach(effect);
                }
                let scale = match event.new_state {
                    HoverState::Idle => None,
                    HoverState::Hovered => Some(HOVERED_FX_SCALE),
                    HoverState::Active => Some(ACTIVE_FX_SCALE),
                };
                if let (Some(scale), Some(parent)) = (scale, parent) {
                    let local = item.local.with_scale(item.local.scale * scale);
                    if let Some(handle) = host.attach_model(ITEM_FX_MODEL, object, parent, local) {
                        item.effects.push(ItemEffect {
                            hand: event.hand,
                            handle,
                        });
                    }
                }
                if event.new_state == HoverState::Active {
                    activate = Some(item.base);
                }
            }
        }

        if let Some(base) = activate {
            self.set_activator(host, id, base, event.hand);
        } else if event.old_state == HoverState::Active
            && self.rollover.activator_hand() == Some(event.hand)
            && !self.any_active_item(event.hand)
        {
            self.disable_activator(host, id);
        }
    }

    fn any_active_item(&self, hand: Hand) -> bool {
        self.backpacks
            .iter()
            .any(|backpack| backpack.active_item(hand).is_some())
    }
}
