//! Broad and narrow phase selection with their hover events

use backpack_vr::backpack::{
    item_bound, Backpack, BackpackId, EventQueue, HoverState, ItemRef, UiEvent, ViewKind,
};
use backpack_vr::geometry::NodeTransform;
use backpack_vr::host::{BaseObjectId, GameWorld, ItemCategory, SceneGraph};
use backpack_vr::{Hand, Settings, SimHost};
use bevy::prelude::Vec3;

const GEM: BaseObjectId = BaseObjectId(300);
const CENTER: Vec3 = Vec3::new(10.0, 10.0, 10.0);
const FAR: Vec3 = Vec3::new(100.0, 100.0, 100.0);

/// Initialized pack at the origin with no inventory
fn empty_pack() -> (SimHost, Backpack) {
    let mut host = SimHost::new();
    host.define_item(GEM, ItemCategory::Misc, Some("misc/Gem.nif"));
    let (object, _) = host.spawn_backpack(BaseObjectId(100), Vec3::ZERO);
    let mut backpack = Backpack::new(BackpackId(0), object, host.player());
    assert!(backpack.init(&mut host, &Settings::default()));
    (host, backpack)
}

/// Gems in the container at the given local positions, models loaded
fn with_gems(host: &mut SimHost, backpack: &mut Backpack, positions: &[Vec3]) -> Vec<ItemRef> {
    let container = backpack
        .view_index(ViewKind::Container)
        .expect("container view");
    let items = positions
        .iter()
        .map(|position| {
            backpack
                .place_item(host, container, GEM, 1, None, NodeTransform::from_translation(*position))
                .expect("container accepts items")
        })
        .collect();
    host.advance_frame();
    items
}

fn pick(host: &SimHost, backpack: &mut Backpack, hand: Hand, point: Vec3, events: &mut EventQueue) {
    if let Some(view) = backpack.pick_active_view(hand, point, |node| host.world_transform(node), events) {
        backpack.pick_active_item(view, hand, point, |item| item_bound(host, item), events);
    }
}

fn item_states(events: &[UiEvent]) -> Vec<(HoverState, HoverState)> {
    events
        .iter()
        .filter_map(|event| match event {
            UiEvent::ItemHovered(e) => Some((e.old_state, e.new_state)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_closest_item_wins_and_others_hover() {
    let (mut host, mut backpack) = empty_pack();
    let items = with_gems(
        &mut host,
        &mut backpack,
        &[
            CENTER + Vec3::Z * 3.0,
            CENTER + Vec3::Z * 1.0,
            CENTER + Vec3::Z * 4.0,
        ],
    );

    let mut events = EventQueue::default();
    pick(&host, &mut backpack, Hand::Right, CENTER, &mut events);
    let events = events.take_all();

    assert_eq!(events.len(), 4);
    match &events[0] {
        UiEvent::ViewHovered(e) => {
            assert_eq!(e.new_state, HoverState::Active);
            assert_eq!(e.hand, Hand::Right);
        }
        other => panic!("expected view event first, got {other:?}"),
    }
    // items are visited in insertion order
    assert_eq!(
        item_states(&events),
        vec![
            (HoverState::Idle, HoverState::Hovered),
            (HoverState::Idle, HoverState::Active),
            (HoverState::Idle, HoverState::Hovered),
        ]
    );
    assert_eq!(backpack.active_item(Hand::Right), Some(items[1]));
}

#[test]
fn test_repeated_pick_is_silent() {
    let (mut host, mut backpack) = empty_pack();
    with_gems(&mut host, &mut backpack, &[CENTER + Vec3::X]);

    let mut events = EventQueue::default();
    pick(&host, &mut backpack, Hand::Left, CENTER, &mut events);
    assert!(!events.is_empty());
    events.clear();

    pick(&host, &mut backpack, Hand::Left, CENTER, &mut events);
    assert!(events.is_empty());
}

#[test]
fn test_leaving_active_view_resets_its_items() {
    let (mut host, mut backpack) = empty_pack();
    with_gems(
        &mut host,
        &mut backpack,
        &[CENTER + Vec3::Z * 3.0, CENTER + Vec3::Z],
    );

    let mut events = EventQueue::default();
    pick(&host, &mut backpack, Hand::Right, CENTER, &mut events);
    events.clear();

    pick(&host, &mut backpack, Hand::Right, FAR, &mut events);
    let events = events.take_all();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        UiEvent::ViewHovered(e) if e.new_state == HoverState::Idle
    ));
    assert_eq!(
        item_states(&events),
        vec![
            (HoverState::Hovered, HoverState::Idle),
            (HoverState::Active, HoverState::Idle),
        ]
    );
    assert!(backpack.active_view(Hand::Right).is_none());
}

#[test]
fn test_hands_select_independently() {
    let (mut host, mut backpack) = empty_pack();
    let items = with_gems(
        &mut host,
        &mut backpack,
        &[CENTER, Vec3::new(4.0, 4.0, 4.0)],
    );

    let mut events = EventQueue::default();
    pick(&host, &mut backpack, Hand::Right, CENTER, &mut events);
    pick(&host, &mut backpack, Hand::Left, Vec3::new(4.0, 4.0, 5.0), &mut events);

    assert_eq!(backpack.active_item(Hand::Right), Some(items[0]));
    assert_eq!(backpack.active_item(Hand::Left), Some(items[1]));

    let left_item = backpack.item(items[1]).expect("item exists");
    assert_eq!(left_item.state(Hand::Right), HoverState::Idle);
    assert_eq!(left_item.state(Hand::Left), HoverState::Active);
}

#[test]
fn test_at_most_one_active_item_per_hand() {
    let (mut host, mut backpack) = empty_pack();
    let positions: Vec<Vec3> = (0..6)
        .map(|i| CENTER + Vec3::new(i as f32 * 0.5, 0.0, 0.0))
        .collect();
    with_gems(&mut host, &mut backpack, &positions);

    let mut events = EventQueue::default();
    for step in 0..8 {
        let point = CENTER + Vec3::new(step as f32 * 0.4, 0.5, 0.0);
        pick(&host, &mut backpack, Hand::Right, point, &mut events);
        let active = backpack
            .views()
            .iter()
            .flat_map(|view| view.items())
            .filter(|item| item.state(Hand::Right) == HoverState::Active)
            .count();
        assert_eq!(active, 1, "point {point:?}");
    }
}

#[test]
fn test_last_overlapping_view_wins() {
    let mut host = SimHost::new();
    let (object, nodes) = host.spawn_backpack(BaseObjectId(100), Vec3::ZERO);
    // holster moved inside the container box
    host.set_local_transform(nodes.holster, NodeTransform::from_translation(CENTER));
    let mut backpack = Backpack::new(BackpackId(0), object, host.player());
    assert!(backpack.init(&mut host, &Settings::default()));

    let mut events = EventQueue::default();
    let winner = backpack.pick_active_view(
        Hand::Right,
        CENTER,
        |node| host.world_transform(node),
        &mut events,
    );

    let holster = backpack.view_index(ViewKind::Holster).expect("holster view");
    let container = backpack
        .view_index(ViewKind::Container)
        .expect("container view");
    assert_eq!(winner, Some(holster));
    assert_eq!(backpack.views()[container].state(Hand::Right), HoverState::Hovered);
    assert_eq!(backpack.views()[holster].state(Hand::Right), HoverState::Active);

    // the losing view is reported before the winner
    let events = events.take_all();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        UiEvent::ViewHovered(e) if e.view.index == container && e.new_state == HoverState::Hovered
    ));
    assert!(matches!(
        &events[1],
        UiEvent::ViewHovered(e) if e.view.index == holster && e.new_state == HoverState::Active
    ));
}

#[test]
fn test_handle_view_never_selects_items() {
    let (host, mut backpack) = empty_pack();
    let handle = backpack.view_index(ViewKind::Handle).expect("handle view");
    let grab_point = Vec3::new(10.0, 10.0, -15.0);

    let mut events = EventQueue::default();
    let view = backpack.pick_active_view(
        Hand::Right,
        grab_point,
        |node| host.world_transform(node),
        &mut events,
    );
    assert_eq!(view, Some(handle));
    assert!(backpack
        .pick_active_item(handle, Hand::Right, grab_point, |_| None, &mut events)
        .is_none());
    assert!(backpack.active_view(Hand::Right).is_some_and(|v| v.is_handle()));
}

#[test]
fn test_reset_hand_clears_only_that_hand() {
    let (mut host, mut backpack) = empty_pack();
    with_gems(&mut host, &mut backpack, &[CENTER]);

    let mut events = EventQueue::default();
    pick(&host, &mut backpack, Hand::Right, CENTER, &mut events);
    pick(&host, &mut backpack, Hand::Left, CENTER, &mut events);
    events.clear();

    backpack.reset_hand(Hand::Right, &mut events);
    assert_eq!(events.len(), 2);
    assert!(backpack.active_item(Hand::Right).is_none());
    assert!(backpack.active_item(Hand::Left).is_some());
}
