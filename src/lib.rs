//! VR Backpack Library
//!
//! A physically interactive inventory for VR: a backpack object whose views
//! show the wearer's items, selected by reaching into them with tracked
//! controllers. The library is split into:
//! - `input`: controller packet classification, callbacks and overrides
//! - `backpack`: views, items and their per-hand hover state machines
//! - `controller`: the per-frame driver, hand actions and activator proxy
//! - `host`: the engine services everything above is written against
//!
//! [`BackpackPlugin`] wires the controller into a Bevy app and runs it once
//! per `Update` against the [`Host`] resource.

use std::marker::PhantomData;
use std::sync::Arc;

use bevy::prelude::*;

pub mod backpack;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod host;
pub mod input;
pub mod logging;
pub mod overlap;
pub mod sim;

pub use backpack::{Backpack, BackpackId, BackpackState, HoverState, ItemRef, UiEvent, ViewKind, ViewRef};
pub use config::{ConfigWatcher, InputBindings, Settings};
pub use controller::{Controller, HandAction, NewItemEvent};
pub use error::{BackpackError, BackpackResult};
pub use host::HostEngine;
pub use input::{ButtonId, ControllerState, Hand, InputEvent, VrInput};
pub use logging::init_logging;
pub use sim::SimHost;

/// Engine services the controller runs against
#[derive(Resource)]
pub struct Host<H: HostEngine + Send + Sync + 'static>(pub H);

/// Adds the [`Controller`] resource and its per-frame systems.
pub struct BackpackPlugin<H> {
    pub settings: Settings,
    pub input: Option<Arc<VrInput>>,
    host: PhantomData<fn() -> H>,
}

impl<H> BackpackPlugin<H> {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            input: None,
            host: PhantomData,
        }
    }

    /// Bind the configured action buttons on `input` at startup
    pub fn with_input(mut self, input: Arc<VrInput>) -> Self {
        self.input = Some(input);
        self
    }
}

impl<H> Default for BackpackPlugin<H> {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl<H: HostEngine + Send + Sync + 'static> Plugin for BackpackPlugin<H> {
    fn build(&self, app: &mut App) {
        let mut controller = Controller::new(self.settings.clone());
        if let Some(input) = &self.input {
            controller.bind_input(Arc::clone(input));
        }

        app.insert_resource(controller).add_systems(
            Update,
            (config_reload_system, post_wand_update_system::<H>).chain(),
        );
    }
}

/// Run the controller frame once hands are posed. Skipped until a host exists.
pub fn post_wand_update_system<H: HostEngine + Send + Sync + 'static>(
    mut controller: ResMut<Controller>,
    host: Option<ResMut<Host<H>>>,
) {
    let Some(mut host) = host else {
        return;
    };
    controller.post_wand_update(&mut host.0);
}

/// Apply settings written to disk since the last frame
pub fn config_reload_system(
    watcher: Option<NonSend<ConfigWatcher>>,
    mut controller: ResMut<Controller>,
) {
    if let Some(settings) = watcher.and_then(|watcher| watcher.poll()) {
        controller.set_settings(settings);
    }
}
