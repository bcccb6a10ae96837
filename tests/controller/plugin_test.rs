//! Bevy plugin wiring

use backpack_vr::host::GameWorld;
use backpack_vr::{BackpackPlugin, BackpackState, Controller, Host, Settings, SimHost};
use bevy::prelude::*;

use crate::test_utils::constants;

#[test]
fn test_plugin_inserts_controller_with_its_settings() {
    let settings = Settings {
        left_hand_mode: true,
        ..Settings::default()
    };
    let mut app = App::new();
    app.add_plugins(BackpackPlugin::<SimHost>::new(settings));

    let controller = app.world().resource::<Controller>();
    assert!(controller.settings().left_hand_mode);
    assert!(controller.backpacks().is_empty());
}

#[test]
fn test_update_without_host_is_skipped() {
    let mut app = App::new();
    app.add_plugins(BackpackPlugin::<SimHost>::default());
    app.update();
    app.update();
    assert!(app.world().resource::<Controller>().backpacks().is_empty());
}

#[test]
fn test_update_runs_the_controller_frame() {
    let mut app = App::new();
    app.add_plugins(BackpackPlugin::<SimHost>::default());

    let mut host = SimHost::new();
    let player = host.player();
    let (pack, _) = host.spawn_backpack(constants::BACKPACK_BASE, Vec3::ZERO);
    let id = {
        let mut controller = app.world_mut().resource_mut::<Controller>();
        let id = controller.add_backpack(pack, player);
        assert!(controller.summon(&mut host, id));
        id
    };
    app.insert_resource(Host(host));

    app.update();
    app.world_mut()
        .resource_mut::<Host<SimHost>>()
        .0
        .advance_frame();
    app.update();

    let controller = app.world().resource::<Controller>();
    let backpack = controller.backpack(id).expect("registered");
    assert!(backpack.is_init());
    // default hand poses are within reach of a pack at the origin
    assert_eq!(backpack.state(), BackpackState::Active);
}
