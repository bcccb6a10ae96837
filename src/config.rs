//! Tuning values and settings hot reload
//!
//! Settings are stored as TOML. Missing keys take their defaults, so a file
//! only needs the values a user wants to change. [`ConfigWatcher`] follows
//! the file on disk and hands back freshly parsed settings after each write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BackpackError, BackpackResult};
use crate::input::ButtonId;

pub const SETTINGS_FILE_NAME: &str = "backpack_vr.toml";

/// Buttons bound to backpack actions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBindings {
    /// Grab the carry handle, or summon the pack from the shoulder zone
    pub grab: ButtonId,
    pub equip: ButtonId,
    pub favorite: ButtonId,
    pub drop: ButtonId,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            grab: ButtonId::Grip,
            equip: ButtonId::A,
            favorite: ButtonId::KNUCKLES_B,
            drop: ButtonId::Trigger,
        }
    }
}

/// Runtime settings read by the controller each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Player backpacks beyond this distance from their wearer shut off
    pub shutoff_distance_player: f32,
    /// Same for backpacks worn by NPCs
    pub shutoff_distance_npc: f32,
    /// Hands further than this from a backpack cannot interact with it
    pub min_interaction_distance: f32,
    /// Item models with a larger bounding radius are scaled down to it
    pub scale_big_items: f32,
    /// Grid view columns
    pub mini_items_per_row: u32,
    /// Gap between grid cells
    pub mini_horizontal_spacing: f32,
    pub hardcore_mode: bool,
    pub allow_equip_swapping: bool,
    /// Put items with no stored transform in the grid view
    pub disable_grid: bool,
    /// Drop looted items instead of keeping them in the backpack
    pub newitems_drop_on_loot: bool,
    /// Drop picked-up items instead of keeping them in the backpack
    pub newitems_drop_on_pickup: bool,
    pub newitems_drop_paused: bool,
    /// Dropped new items go to the ground instead of the hand
    pub newitems_drop_to_ground: bool,
    /// Swaps which hand counts as the off hand for the rollover overlay
    pub left_hand_mode: bool,
    pub debug_logging: bool,
    /// Frames a deferred extra-data attachment is retried before it is dropped
    pub extradata_max_attempts: u32,
    /// Palm centre relative to the hand node
    pub palm_offset: [f32; 3],
    /// Shoulder summon zone relative to the camera node
    pub summon_sphere_offset: [f32; 3],
    pub summon_sphere_radius: f32,
    pub bindings: InputBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shutoff_distance_player: 400.0,
            shutoff_distance_npc: 300.0,
            min_interaction_distance: 150.0,
            scale_big_items: 30.0,
            mini_items_per_row: 5,
            mini_horizontal_spacing: 2.0,
            hardcore_mode: false,
            allow_equip_swapping: true,
            disable_grid: false,
            newitems_drop_on_loot: false,
            newitems_drop_on_pickup: false,
            newitems_drop_paused: false,
            newitems_drop_to_ground: false,
            left_hand_mode: false,
            debug_logging: false,
            extradata_max_attempts: 5,
            palm_offset: [0.0, -2.4, 6.0],
            summon_sphere_offset: [0.0, -12.0, -8.0],
            summon_sphere_radius: 14.0,
            bindings: InputBindings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> BackpackResult<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> BackpackResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> BackpackResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Per-user settings location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("backpack-vr").join(SETTINGS_FILE_NAME))
    }

    pub fn validate(&self) -> BackpackResult<()> {
        let distances = [
            ("shutoff_distance_player", self.shutoff_distance_player),
            ("shutoff_distance_npc", self.shutoff_distance_npc),
            ("min_interaction_distance", self.min_interaction_distance),
            ("scale_big_items", self.scale_big_items),
            ("summon_sphere_radius", self.summon_sphere_radius),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value <= 0.0 {
                return Err(BackpackError::invalid(name, format!("must be positive, got {value}")));
            }
        }
        if self.mini_items_per_row == 0 {
            return Err(BackpackError::invalid("mini_items_per_row", "must be at least 1"));
        }
        if !self.mini_horizontal_spacing.is_finite() || self.mini_horizontal_spacing < 0.0 {
            return Err(BackpackError::invalid(
                "mini_horizontal_spacing",
                format!("must not be negative, got {}", self.mini_horizontal_spacing),
            ));
        }
        if self.extradata_max_attempts == 0 {
            return Err(BackpackError::invalid("extradata_max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

/// Watches a settings file and reparses it after changes.
pub struct ConfigWatcher {
    path: PathBuf,
    changes: Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> BackpackResult<Self> {
        let path = path.into();
        let (tx, rx) = crossbeam_channel::bounded(16);

        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| {
                if let Ok(Event {
                    kind: EventKind::Create(_) | EventKind::Modify(_),
                    ..
                }) = event
                {
                    // a full channel already holds a pending reload
                    let _ = tx.try_send(());
                }
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        // watch the directory so editors that replace the file are still seen
        let watch_target = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        watcher.watch(watch_target, RecursiveMode::NonRecursive)?;

        info!("Watching settings file {}", path.display());
        Ok(Self {
            path,
            changes: rx,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// New settings if the file changed since the last poll and still parses
    pub fn poll(&self) -> Option<Settings> {
        let mut changed = false;
        loop {
            match self.changes.try_recv() {
                Ok(()) => changed = true,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if !changed {
            return None;
        }

        match Settings::load(&self.path) {
            Ok(settings) => {
                info!("Reloaded settings from {}", self.path.display());
                Some(settings)
            }
            Err(e) => {
                warn!("Keeping previous settings: {}", e);
                None
            }
        }
    }
}
