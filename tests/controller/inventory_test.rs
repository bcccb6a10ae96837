//! Items placed by hand, inventory notifications and new item handling

use backpack_vr::backpack::ViewKind;
use backpack_vr::host::{ContainerChanged, GameWorld, HostTask, RefId};
use backpack_vr::controller::EXPECTED_REMOVAL_FRAMES;
use backpack_vr::geometry::NodeTransform;
use backpack_vr::{Hand, HandAction, Settings};
use bevy::prelude::Vec3;

use crate::assert_vec3_near;
use crate::test_utils::{constants, Session};

const CONTAINER_POINT: Vec3 = Vec3::new(10.0, 10.0, 10.0);

/// Right hand inside the container, holding a gem that is about to be let go
fn holding_gem(settings: Settings) -> (Session, RefId) {
    let mut session = Session::ready_with(settings);
    let gem = session.host.spawn_object(constants::GEM, CONTAINER_POINT);
    session.host.set_hand_position(Hand::Right, CONTAINER_POINT);
    session.frame();
    let active = session
        .backpack()
        .active_view(Hand::Right)
        .map(|view| view.kind());
    assert_eq!(active, Some(ViewKind::Container));
    (session, gem)
}

fn looted(session: &Session, base: backpack_vr::host::BaseObjectId) -> ContainerChanged {
    ContainerChanged {
        old_container: Some(RefId(500)),
        new_container: Some(session.player()),
        base_object: base,
        item_count: 1,
        unique_id: 0,
    }
}

fn drop_targets(session: &Session) -> Vec<Option<Vec3>> {
    session
        .host
        .queued_tasks()
        .iter()
        .chain(session.host.completed_tasks())
        .filter_map(|task| match task {
            HostTask::DropItem { at, .. } => Some(*at),
            _ => None,
        })
        .collect()
}

#[test]
fn test_released_object_is_stored_where_it_was_let_go() {
    let (mut session, gem) = holding_gem(Settings::default());
    let player = session.player();

    assert!(session
        .controller
        .on_object_released(&mut session.host, Hand::Right, gem));
    assert_eq!(session.host.ref_marker(gem), Some(1));
    assert_eq!(session.controller.pending_items().len(), 1);
    assert!(matches!(
        session.host.queued_tasks(),
        [HostTask::PickUp { actor, object }] if *actor == player && *object == gem
    ));

    // pick-up lands, then the stored transform is attached
    session.frames(2);
    assert!(session.controller.pending_items().is_empty());
    assert_eq!(session.host.item_count(player, constants::GEM), 1);

    let entry = session
        .host
        .inventory(player)
        .into_iter()
        .find(|entry| entry.base == constants::GEM)
        .expect("gem in inventory");
    let list = entry.extra_lists[0];
    assert_eq!(session.host.list_marker(list), None);
    let stored = session.host.item_transform(list).expect("stored transform");
    assert_vec3_near!(stored.translate, CONTAINER_POINT);

    let item = session
        .backpack()
        .find_item(constants::GEM)
        .expect("gem shown");
    let container = session
        .backpack()
        .view_index(ViewKind::Container)
        .expect("container view");
    assert_eq!(item.view.index, container);
    assert_eq!(session.backpack().item(item).and_then(|i| i.extra), Some(list));
}

#[test]
fn test_release_outside_views_is_ignored() {
    let (mut session, _) = holding_gem(Settings::default());
    let stray = session
        .host
        .spawn_object(constants::GEM, Vec3::new(100.0, 0.0, 0.0));
    assert!(!session
        .controller
        .on_object_released(&mut session.host, Hand::Right, stray));
    assert!(!session
        .controller
        .on_object_released(&mut session.host, Hand::Left, stray));
    assert!(session.host.queued_tasks().is_empty());
    assert!(session.controller.pending_items().is_empty());
}

#[test]
fn test_holster_only_takes_matching_items() {
    let mut session = Session::ready();
    let holster = session.world_position(session.nodes.holster);
    session.host.set_hand_position(Hand::Right, holster);
    session.frame();

    let gem = session.host.spawn_object(constants::GEM, holster);
    assert!(!session
        .controller
        .on_object_released(&mut session.host, Hand::Right, gem));

    let dagger = session.host.spawn_object(constants::DAGGER, holster);
    assert!(session
        .controller
        .on_object_released(&mut session.host, Hand::Right, dagger));
}

#[test]
fn test_late_extra_data_is_retried() {
    let (mut session, gem) = holding_gem(Settings::default());
    session.host.extra_list_delay = 2;
    assert!(session
        .controller
        .on_object_released(&mut session.host, Hand::Right, gem));

    session.frames(2);
    assert_eq!(session.controller.events().len(), 1);
    assert!(session.backpack().find_item(constants::GEM).is_none());

    session.frames(2);
    assert!(session.controller.events().is_empty());
    assert!(session.backpack().find_item(constants::GEM).is_some());
}

#[test]
fn test_extra_data_gives_up_after_max_attempts() {
    let settings = Settings {
        extradata_max_attempts: 2,
        ..Settings::default()
    };
    let (mut session, gem) = holding_gem(settings);
    session.host.extra_list_delay = 10;
    assert!(session
        .controller
        .on_object_released(&mut session.host, Hand::Right, gem));

    session.frames(4);
    assert!(session.controller.events().is_empty());
    assert!(session.backpack().find_item(constants::GEM).is_none());
    assert!(session.controller.pending_items().is_empty());
}

#[test]
fn test_looted_item_appears_after_rescan() {
    let mut session = Session::ready();
    let player = session.player();
    let generation = session.backpack().generation();

    session.host.give_item(player, constants::GEM, 1);
    let change = looted(&session, constants::GEM);
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    session.frame();

    assert_eq!(session.backpack().generation(), generation + 1);
    assert!(session.backpack().find_item(constants::GEM).is_some());
    assert!(drop_targets(&session).is_empty());
}

#[test]
fn test_loot_drops_to_the_free_off_hand() {
    let settings = Settings {
        newitems_drop_on_loot: true,
        ..Settings::default()
    };
    let mut session = Session::ready_with(settings);
    let player = session.player();
    session.host.give_item(player, constants::GEM, 1);

    let change = looted(&session, constants::GEM);
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    let left = session.world_position(session.host.hand(Hand::Left));
    assert_eq!(drop_targets(&session), vec![Some(left)]);

    session.frames(2);
    assert_eq!(session.host.item_count(player, constants::GEM), 0);
    // the drop was expected, nothing else is removed from the views
    assert!(session.backpack().find_item(constants::SWORD).is_some());
    assert!(session.backpack().find_item(constants::APPLE).is_some());
}

#[test]
fn test_loot_stays_when_no_hand_is_free() {
    let settings = Settings {
        newitems_drop_on_loot: true,
        ..Settings::default()
    };
    let mut session = Session::ready_with(settings);
    let player = session.player();
    session.host.set_hand_state(Hand::Left, backpack_vr::host::HandState::Weapon);
    session.host.set_hand_state(Hand::Right, backpack_vr::host::HandState::Grabbing);
    session.host.give_item(player, constants::GEM, 1);

    let change = looted(&session, constants::GEM);
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    assert!(drop_targets(&session).is_empty());

    session.frame();
    assert!(session.backpack().find_item(constants::GEM).is_some());
}

#[test]
fn test_hardcore_loot_falls_to_the_ground() {
    let settings = Settings {
        newitems_drop_on_loot: true,
        hardcore_mode: true,
        ..Settings::default()
    };
    let mut session = Session::ready_with(settings);
    let player = session.player();
    session.host.set_hand_state(Hand::Left, backpack_vr::host::HandState::Weapon);
    session.host.set_hand_state(Hand::Right, backpack_vr::host::HandState::Weapon);
    session.host.give_item(player, constants::GEM, 1);

    let change = looted(&session, constants::GEM);
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    assert_eq!(drop_targets(&session), vec![None]);
}

#[test]
fn test_paused_drops_keep_new_items() {
    let settings = Settings {
        newitems_drop_on_pickup: true,
        newitems_drop_paused: true,
        ..Settings::default()
    };
    let mut session = Session::ready_with(settings);
    let player = session.player();
    session.host.give_item(player, constants::GEM, 1);

    let change = ContainerChanged {
        old_container: None,
        ..looted(&session, constants::GEM)
    };
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    assert!(drop_targets(&session).is_empty());
}

#[test]
fn test_external_removal_is_applied_next_frame() {
    let mut session = Session::ready();
    let player = session.player();
    let change = ContainerChanged {
        old_container: Some(player),
        new_container: None,
        base_object: constants::APPLE,
        item_count: 4,
        unique_id: 0,
    };
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    // nothing changes inside the notification
    assert!(session.backpack().find_item(constants::APPLE).is_some());

    session.frame();
    assert!(session.backpack().find_item(constants::APPLE).is_none());
    assert!(session.backpack().find_item(constants::SWORD).is_some());
}

#[test]
fn test_changes_for_other_actors_are_ignored() {
    let mut session = Session::ready();
    let change = ContainerChanged {
        old_container: Some(RefId(500)),
        new_container: Some(RefId(501)),
        base_object: constants::APPLE,
        item_count: 1,
        unique_id: 0,
    };
    let generation = session.backpack().generation();
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    session.frame();
    assert_eq!(session.backpack().generation(), generation);
    assert!(session.backpack().find_item(constants::APPLE).is_some());
}

#[test]
fn test_unreported_drops_stop_hiding_later_removals() {
    let mut session = Session::new(Settings::default());
    let player = session.player();
    let stored = NodeTransform::from_translation(Vec3::new(15.0, 15.0, 5.0));
    session.host.give_placed_item(player, constants::SWORD, stored);
    session.park_hands();
    assert!(session.controller.summon(&mut session.host, session.id));
    session.frames(3);

    let slot = session.grid_slot(0);
    session.host.set_hand_position(Hand::Right, slot);
    session.frame();
    session
        .controller
        .action_sender()
        .send(HandAction::Drop { hand: Hand::Right })
        .expect("controller is alive");

    // the engine runs the drop but its notification is lost
    session.controller.post_wand_update(&mut session.host);
    session.host.advance_frame();
    session.park_hands();
    session.frames(EXPECTED_REMOVAL_FRAMES as usize + 1);
    assert!(session.backpack().find_item(constants::SWORD).is_some());

    let change = ContainerChanged {
        old_container: Some(player),
        new_container: None,
        base_object: constants::SWORD,
        item_count: 1,
        unique_id: 0,
    };
    session
        .controller
        .on_container_changed(&mut session.host, &change);
    session.frame();
    assert!(session.backpack().find_item(constants::SWORD).is_none());
}
