//! Headless backpack session against the in-memory engine.
//!
//! Summons the player's backpack, reaches into the grid with the right hand,
//! presses the equip button through the input pipeline and walks away until
//! the backpack shuts off.

use std::sync::Arc;

use anyhow::{Context, Result};
use bevy::prelude::*;
use tracing::{info, warn};

use backpack_vr::host::{BaseObjectId, GameWorld, ItemCategory};
use backpack_vr::{
    init_logging, BackpackPlugin, BackpackState, ButtonId, ConfigWatcher, Controller,
    ControllerState, Hand, Host, Settings, SimHost, VrInput,
};

const BACKPACK: BaseObjectId = BaseObjectId(100);
const SWORD: BaseObjectId = BaseObjectId(200);
const APPLE: BaseObjectId = BaseObjectId(201);
const RIGHT_DEVICE: u32 = 1;
const LEFT_DEVICE: u32 = 2;

fn main() -> Result<()> {
    let settings_path = Settings::default_path();
    let settings = match &settings_path {
        Some(path) => Settings::load_or_default(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Err(e) = init_logging(&settings) {
        eprintln!("Logging already initialized: {e}");
    }

    let input = Arc::new(VrInput::new());
    input.set_device(Hand::Right, RIGHT_DEVICE);
    input.set_device(Hand::Left, LEFT_DEVICE);

    let mut host = SimHost::new();
    let player = host.player();
    host.define_item(SWORD, ItemCategory::Weapon, Some("weapons/IronSword.nif"));
    host.define_item(APPLE, ItemCategory::Food, Some("food/Apple.nif"));
    host.give_item(player, SWORD, 1);
    host.give_item(player, APPLE, 4);
    let (pack, _) = host.spawn_backpack(BACKPACK, Vec3::new(900.0, 0.0, 0.0));

    let mut app = App::new();
    app.add_plugins(BackpackPlugin::<SimHost>::new(settings).with_input(Arc::clone(&input)))
        .insert_resource(Host(host));

    if let Some(path) = settings_path {
        match ConfigWatcher::new(&path) {
            Ok(watcher) => {
                app.insert_non_send_resource(watcher);
            }
            Err(e) => warn!("Settings hot reload disabled: {}", e),
        }
    }

    let id = app
        .world_mut()
        .resource_mut::<Controller>()
        .add_backpack(pack, player);
    app.world_mut()
        .resource_scope(|world, mut controller: Mut<Controller>| {
            let mut host = world.resource_mut::<Host<SimHost>>();
            controller.summon(&mut host.0, id);
        });

    for _ in 0..3 {
        step(&mut app);
    }
    report(&mut app, "after summon");

    // first grid cell of a pack sitting at the wearer's origin
    move_hand(&mut app, Hand::Right, Vec3::new(2.0, 2.0, 40.0));
    step(&mut app);
    report(&mut app, "hand in grid");

    let press = ControllerState {
        pressed: ButtonId::A.mask(),
        ..Default::default()
    };
    if let Some(outcome) = input.on_controller_state(RIGHT_DEVICE, &press) {
        info!(
            hidden = outcome.state.pressed & ButtonId::A.mask() == 0,
            "equip button pressed"
        );
    }
    input.on_controller_state(RIGHT_DEVICE, &ControllerState::default());
    step(&mut app);
    step(&mut app);

    let completed = app.world().resource::<Host<SimHost>>().0.completed_tasks().len();
    info!(completed, "host tasks run");

    move_hand(&mut app, Hand::Right, Vec3::new(20.0, 0.0, 100.0));
    app.world_mut()
        .resource_mut::<Host<SimHost>>()
        .0
        .set_ref_position(player, Vec3::new(0.0, 1000.0, 0.0));
    step(&mut app);
    report(&mut app, "wearer walked away");

    let state = app
        .world()
        .resource::<Controller>()
        .backpack(id)
        .map(|b| b.state())
        .unwrap_or_default();
    info!(?state, "session finished");
    anyhow::ensure!(state == BackpackState::Disabled, "backpack should have shut off");
    Ok(())
}

/// One engine frame: systems, then deferred engine work and its notifications
fn step(app: &mut App) {
    app.update();
    let world = app.world_mut();
    let changes = world.resource_mut::<Host<SimHost>>().0.advance_frame();
    if changes.is_empty() {
        return;
    }
    world.resource_scope(|world, mut controller: Mut<Controller>| {
        let mut host = world.resource_mut::<Host<SimHost>>();
        for change in &changes {
            controller.on_container_changed(&mut host.0, change);
        }
    });
}

fn move_hand(app: &mut App, hand: Hand, position: Vec3) {
    app.world_mut()
        .resource_mut::<Host<SimHost>>()
        .0
        .set_hand_position(hand, position);
}

fn report(app: &mut App, label: &str) {
    let controller = app.world().resource::<Controller>();
    for backpack in controller.backpacks() {
        let items: usize = backpack.views().iter().map(|v| v.items().len()).sum();
        info!(
            label,
            backpack = ?backpack.id(),
            state = ?backpack.state(),
            views = backpack.views().len(),
            items,
            selected = ?controller.selected_backpack(Hand::Right),
            "backpack status"
        );
    }
}
