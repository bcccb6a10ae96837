//! Equip, favorite, drop and grab driven through bound buttons

use backpack_vr::backpack::{BackpackState, ViewKind};
use backpack_vr::geometry::NodeTransform;
use backpack_vr::host::{HandState, HostTask, RemoveReason};
use backpack_vr::{ButtonId, Hand, HandAction, Settings};
use bevy::prelude::Vec3;

use crate::assert_vec3_near;
use crate::test_utils::{constants, press, release, Session};

fn pointing_at_sword(settings: Settings) -> Session {
    let mut session = Session::ready_with(settings);
    let slot = session.grid_slot(0);
    session.host.set_hand_position(Hand::Right, slot);
    session.frame();
    assert!(session.controller.focus().on_item(Hand::Right));
    session
}

fn equip_tasks(session: &Session) -> Vec<&HostTask> {
    session
        .host
        .completed_tasks()
        .iter()
        .filter(|task| matches!(task, HostTask::EquipItem { .. }))
        .collect()
}

#[test]
fn test_equip_press_is_hidden_and_equips() {
    let mut session = pointing_at_sword(Settings::default());
    let input = session.bind_input();

    let outcome = press(&input, Hand::Right, ButtonId::A);
    assert_eq!(outcome.state.pressed & ButtonId::A.mask(), 0);
    release(&input, Hand::Right);
    session.frame();

    let tasks = equip_tasks(&session);
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0],
        &HostTask::EquipItem {
            actor: session.player(),
            base: constants::SWORD,
            extra: None,
            hand: Hand::Right,
        }
    );
    assert!(session.backpack().find_item(constants::SWORD).is_none());
    // the emptied slot no longer drives the activator
    assert_eq!(session.controller.rollover().activator_hand(), None);
}

#[test]
fn test_presses_away_from_items_reach_the_game() {
    let mut session = Session::ready();
    let input = session.bind_input();

    let outcome = press(&input, Hand::Right, ButtonId::A);
    assert_eq!(outcome.state.pressed, ButtonId::A.mask());
    release(&input, Hand::Right);
    session.frame();

    assert!(equip_tasks(&session).is_empty());
    assert!(session.backpack().find_item(constants::SWORD).is_some());
}

#[test]
fn test_equip_respects_weapon_in_hand() {
    let settings = Settings {
        allow_equip_swapping: false,
        ..Settings::default()
    };
    let mut session = pointing_at_sword(settings);
    session.host.set_hand_state(Hand::Right, HandState::Weapon);
    let input = session.bind_input();

    press(&input, Hand::Right, ButtonId::A);
    release(&input, Hand::Right);
    session.frame();
    assert!(equip_tasks(&session).is_empty());
    assert!(session.backpack().find_item(constants::SWORD).is_some());

    session.host.set_hand_state(Hand::Right, HandState::Empty);
    press(&input, Hand::Right, ButtonId::A);
    release(&input, Hand::Right);
    session.frame();
    assert_eq!(equip_tasks(&session).len(), 1);
}

#[test]
fn test_drop_places_item_at_hand_and_keeps_other_copies() {
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
    let input = session.bind_input();

    let outcome = press(&input, Hand::Right, ButtonId::Trigger);
    assert_eq!(outcome.state.pressed, 0);
    release(&input, Hand::Right);
    session.frames(2);

    let dropped = session
        .host
        .completed_tasks()
        .iter()
        .find_map(|task| match task {
            HostTask::DropItem {
                base, at, reason, ..
            } => Some((*base, *at, *reason)),
            _ => None,
        })
        .expect("drop task ran");
    assert_eq!(dropped.0, constants::SWORD);
    assert_eq!(dropped.1, Some(slot));
    assert_eq!(dropped.2, RemoveReason::Dropping);
    assert_eq!(session.host.item_count(player, constants::SWORD), 1);

    // the placed copy in the container is still shown
    let remaining = session
        .backpack()
        .find_item(constants::SWORD)
        .expect("placed sword still shown");
    let container = session
        .backpack()
        .view_index(ViewKind::Container)
        .expect("container view");
    assert_eq!(remaining.view.index, container);
}

#[test]
fn test_favorite_rebuilds_the_views() {
    let mut session = pointing_at_sword(Settings::default());
    let input = session.bind_input();
    let generation = session.backpack().generation();

    let outcome = press(&input, Hand::Right, ButtonId::KNUCKLES_B);
    assert_eq!(outcome.state.pressed, 0);
    release(&input, Hand::Right);
    session.frame();

    assert!(session
        .host
        .completed_tasks()
        .iter()
        .any(|task| matches!(task, HostTask::ToggleFavorite { base, .. } if *base == constants::SWORD)));
    assert_eq!(session.backpack().generation(), generation + 1);
    assert!(session.backpack().find_item(constants::SWORD).is_some());
}

#[test]
fn test_grab_handle_carries_the_pack() {
    let mut session = Session::ready();
    let input = session.bind_input();
    let handle = session.world_position(session.nodes.handle);
    session.host.set_hand_position(Hand::Right, handle);
    session.frame();
    assert!(session.controller.focus().on_handle(Hand::Right));

    let outcome = press(&input, Hand::Right, ButtonId::Grip);
    assert_eq!(outcome.state.pressed, 0);
    session.frame();
    assert_eq!(session.backpack().state(), BackpackState::Grabbed);
    assert_eq!(session.backpack().grabbed_by(), Some(Hand::Right));

    let carried = Vec3::new(30.0, 0.0, 80.0);
    session.host.set_hand_position(Hand::Right, carried);
    session.frame();
    assert_vec3_near!(session.world_position(session.nodes.handle), carried);

    let outcome = release(&input, Hand::Right);
    assert_eq!(outcome.state.pressed, 0);
    session.frame();
    assert_ne!(session.backpack().state(), BackpackState::Grabbed);
    assert_eq!(session.backpack().grabbed_by(), None);
}

#[test]
fn test_grip_outside_handle_is_not_hidden() {
    let mut session = Session::ready();
    let input = session.bind_input();
    let outcome = press(&input, Hand::Left, ButtonId::Grip);
    assert_eq!(outcome.state.pressed, ButtonId::Grip.mask());
    session.frame();
    assert_eq!(session.backpack().state(), BackpackState::Active);
}

#[test]
fn test_summon_zone_grab_summons_parked_pack() {
    let mut session = Session::new(Settings::default());
    let input = session.bind_input();
    // palm offset lands the palm on the zone centre below the camera
    session
        .host
        .set_hand_position(Hand::Right, Vec3::new(0.0, -9.6, 106.0));
    session.frame();
    assert!(session.controller.is_in_summon_zone(Hand::Right));
    assert!(session.controller.focus().in_summon_zone(Hand::Right));
    assert_eq!(session.backpack().state(), BackpackState::Disabled);

    let outcome = press(&input, Hand::Right, ButtonId::Grip);
    assert_eq!(outcome.state.pressed, 0);
    session.frames(2);
    assert_ne!(session.backpack().state(), BackpackState::Disabled);
    assert!(session.backpack().is_init());
}

#[test]
fn test_rebinding_moves_actions_to_new_buttons() {
    let mut session = pointing_at_sword(Settings::default());
    let input = session.bind_input();

    let mut settings = Settings::default();
    settings.bindings.equip = ButtonId::Touchpad;
    session.controller.set_settings(settings);

    let outcome = press(&input, Hand::Right, ButtonId::A);
    assert_eq!(outcome.state.pressed, ButtonId::A.mask());
    release(&input, Hand::Right);
    let outcome = press(&input, Hand::Right, ButtonId::Touchpad);
    assert_eq!(outcome.state.pressed, 0);
    release(&input, Hand::Right);
    session.frame();
    assert_eq!(equip_tasks(&session).len(), 1);
}

#[test]
fn test_actions_can_be_sent_without_buttons() {
    let mut session = pointing_at_sword(Settings::default());
    session
        .controller
        .action_sender()
        .send(HandAction::Equip { hand: Hand::Right })
        .expect("controller is alive");
    session.frame();
    assert_eq!(equip_tasks(&session).len(), 1);

    session.controller.unbind_input();
}
