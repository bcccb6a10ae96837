//! VR controller input handling
//!
//! This module turns raw per-packet controller bitmasks into discrete input
//! events and routes them to registered callbacks:
//! - Edge classification of pressed/touched masks per hand
//! - Callback routing keyed by (button, hand, action type)
//! - Synthetic momentary and persistent button overrides
//! - Joystick driven D-pad events and haptic keyframe playback
//!
//! Everything here runs on the VR runtime's input thread. [`VrInput`] is the
//! shared entry point; hold it in an `Arc` and hand clones to feature modules
//! that want to intercept input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use classifier::{classify_changes, InputClassifier, InputSnapshot, PacketOutcome};
pub use haptics::HapticPlayer;
pub use registry::{callback, CallbackRegistry, InputCallback};
pub use synthetic::SyntheticInput;

mod classifier;
mod haptics;
mod registry;
mod synthetic;

/// Device identity of a tracked controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Right = 0,
    Left = 1,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Right, Hand::Left];

    /// Slot used by every per-hand `[T; 2]` array in the crate
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn other(self) -> Hand {
        match self {
            Hand::Right => Hand::Left,
            Hand::Left => Hand::Right,
        }
    }

    pub const fn is_left(self) -> bool {
        matches!(self, Hand::Left)
    }
}

/// Controllers report a digital press and a capacitive touch per button;
/// both are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Press = 0,
    Touch = 1,
}

impl ActionType {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonState {
    #[default]
    Up = 0,
    Down = 1,
}

impl ButtonState {
    #[inline]
    pub const fn from_bit(set: bool) -> Self {
        if set {
            ButtonState::Down
        } else {
            ButtonState::Up
        }
    }

    #[inline]
    pub const fn is_down(self) -> bool {
        matches!(self, ButtonState::Down)
    }
}

/// Physical button ids, numbered as the VR runtime numbers mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonId {
    System = 0,
    /// Also reported as "B" on knuckles controllers
    ApplicationMenu = 1,
    Grip = 2,
    DPadLeft = 3,
    DPadUp = 4,
    DPadRight = 5,
    DPadDown = 6,
    A = 7,
    /// Joystick click on most controllers
    Touchpad = 32,
    Trigger = 33,
}

impl ButtonId {
    pub const KNUCKLES_B: ButtonId = ButtonId::ApplicationMenu;

    #[inline]
    pub const fn mask(self) -> u64 {
        1u64 << (self as u32)
    }
}

/// Buttons whose mask bits are classified into events.
pub const TRACKED_BUTTONS: [ButtonId; 6] = [
    ButtonId::System,
    ButtonId::KNUCKLES_B,
    ButtonId::Grip,
    ButtonId::A,
    ButtonId::Touchpad,
    ButtonId::Trigger,
];

/// Buttons synthesised from joystick deflection, in left/up/right/down order.
pub const DPAD_BUTTONS: [ButtonId; 4] = [
    ButtonId::DPadLeft,
    ButtonId::DPadUp,
    ButtonId::DPadRight,
    ButtonId::DPadDown,
];

/// Immutable edge notification handed to callbacks.
///
/// Equality compares hand, action type and state only; the button is implied
/// by the dispatch slot the event was routed through.
#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub hand: Hand,
    pub action: ActionType,
    pub state: ButtonState,
    pub button: ButtonId,
}

impl InputEvent {
    pub const fn new(hand: Hand, action: ActionType, state: ButtonState, button: ButtonId) -> Self {
        Self {
            hand,
            action,
            state,
            button,
        }
    }

    pub const fn press(hand: Hand, button: ButtonId, state: ButtonState) -> Self {
        Self::new(hand, ActionType::Press, state, button)
    }
}

impl PartialEq for InputEvent {
    fn eq(&self, other: &Self) -> bool {
        self.hand == other.hand && self.action == other.action && self.state == other.state
    }
}

impl Eq for InputEvent {}

/// Analog axis pair as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Axis {
    pub x: f32,
    pub y: f32,
}

/// One controller packet. `axes[0]` is the joystick, `axes[1].x` the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub packet_num: u32,
    pub pressed: u64,
    pub touched: u64,
    pub axes: [Axis; 5],
}

impl ControllerState {
    pub const JOYSTICK_AXIS: usize = 0;
    pub const TRIGGER_AXIS: usize = 1;

    pub fn joystick(&self) -> Axis {
        self.axes[Self::JOYSTICK_AXIS]
    }

    pub fn trigger(&self) -> f32 {
        self.axes[Self::TRIGGER_AXIS].x
    }

    pub fn mask(&self, action: ActionType) -> u64 {
        match action {
            ActionType::Press => self.pressed,
            ActionType::Touch => self.touched,
        }
    }

    pub fn mask_mut(&mut self, action: ActionType) -> &mut u64 {
        match action {
            ActionType::Press => &mut self.pressed,
            ActionType::Touch => &mut self.touched,
        }
    }
}

/// Shared input entry point driven by the VR runtime callbacks.
pub struct VrInput {
    registry: Arc<CallbackRegistry>,
    synthetic: Arc<SyntheticInput>,
    classifier: Mutex<InputClassifier>,
    snapshot: InputSnapshot,
    haptics: Mutex<HapticPlayer>,
    devices: Mutex<[Option<u32>; 2]>,
    game_stopped: AtomicBool,
}

impl Default for VrInput {
    fn default() -> Self {
        Self::new()
    }
}

impl VrInput {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(CallbackRegistry::default()),
            synthetic: Arc::new(SyntheticInput::default()),
            classifier: Mutex::new(InputClassifier::default()),
            snapshot: InputSnapshot::default(),
            haptics: Mutex::new(HapticPlayer::default()),
            devices: Mutex::new([None, None]),
            game_stopped: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn synthetic(&self) -> &Arc<SyntheticInput> {
        &self.synthetic
    }

    /// Bind a runtime device index to a hand
    pub fn set_device(&self, hand: Hand, device_index: u32) {
        self.devices.lock()[hand.index()] = Some(device_index);
    }

    pub fn hand_for_device(&self, device_index: u32) -> Option<Hand> {
        let devices = self.devices.lock();
        Hand::ALL
            .into_iter()
            .find(|hand| devices[hand.index()] == Some(device_index))
    }

    /// Menus that pause the game suspend all classification
    pub fn set_game_stopped(&self, stopped: bool) {
        self.game_stopped.store(stopped, Ordering::Release);
    }

    pub fn is_game_stopped(&self) -> bool {
        self.game_stopped.load(Ordering::Acquire)
    }

    /// Controller state callback.
    ///
    /// Returns the packet to forward to the engine, or `None` when the packet
    /// should pass through untouched (unknown device or game stopped).
    ///
    /// Callbacks may query button and axis state from inside dispatch, but
    /// must not call back into this method.
    pub fn on_controller_state(
        &self,
        device_index: u32,
        state: &ControllerState,
    ) -> Option<PacketOutcome> {
        if self.is_game_stopped() {
            return None;
        }
        let Some(hand) = self.hand_for_device(device_index) else {
            trace!(device_index, "packet from untracked device");
            return None;
        };
        let outcome =
            self.classifier
                .lock()
                .process_packet(hand, state, &self.registry, &self.synthetic, &self.snapshot);
        Some(outcome)
    }

    /// Pose callback; advances haptic playback by one keyframe per hand
    pub fn on_pose_update(&self, runtime: &mut dyn crate::host::VrRuntime) {
        self.haptics.lock().advance(runtime);
    }

    pub fn add_callback(
        &self,
        func: InputCallback,
        button: ButtonId,
        hand: Hand,
        action: ActionType,
    ) {
        self.registry.add(func, button, hand, action);
    }

    pub fn remove_callback(
        &self,
        func: &InputCallback,
        button: ButtonId,
        hand: Hand,
        action: ActionType,
    ) {
        self.registry.remove(func, button, hand, action);
    }

    pub fn send_fake_input_event(&self, event: InputEvent) {
        self.synthetic.send_momentary(event);
    }

    pub fn set_fake_button_state(&self, event: InputEvent) {
        self.synthetic.set_persistent(event);
    }

    pub fn clear_fake_button_state(&self, event: InputEvent) {
        self.synthetic.clear_persistent(event);
    }

    pub fn clear_all_fake(&self) {
        self.synthetic.clear_all_persistent();
    }

    pub fn start_blocking_all(&self) {
        self.synthetic.set_block_all(true);
    }

    pub fn stop_blocking_all(&self) {
        self.synthetic.set_block_all(false);
    }

    pub fn is_blocking_all(&self) -> bool {
        self.synthetic.is_blocking_all()
    }

    pub fn button_state(&self, button: ButtonId, hand: Hand, action: ActionType) -> ButtonState {
        self.snapshot.button_state(button, hand, action)
    }

    pub fn trigger(&self, hand: Hand) -> f32 {
        self.snapshot.trigger(hand)
    }

    pub fn joystick(&self, hand: Hand) -> Axis {
        self.snapshot.joystick(hand)
    }

    /// Start a haptic pattern on `hand`, replacing any pattern in progress
    pub fn vibrate(&self, hand: Hand, keyframes: Arc<[u16]>, power: f32) {
        self.haptics.lock().play(hand, keyframes, power);
    }
}
