//! Edge classification of controller packets.

use parking_lot::Mutex;
use tracing::trace;

use super::{
    ActionType, Axis, ButtonId, ButtonState, CallbackRegistry, ControllerState, Hand, InputEvent,
    SyntheticInput, DPAD_BUTTONS, TRACKED_BUTTONS,
};

/// Joystick deflection that counts as a D-pad press
pub const DPAD_THRESHOLD: f32 = 0.7;

/// Events for every tracked button whose bit differs between `previous` and `current`.
fn edges(
    previous: u64,
    current: u64,
    hand: Hand,
    action: ActionType,
) -> impl Iterator<Item = InputEvent> {
    let changed = previous ^ current;
    TRACKED_BUTTONS
        .into_iter()
        .filter(move |button| changed & button.mask() != 0)
        .map(move |button| {
            let state = ButtonState::from_bit(current & button.mask() != 0);
            InputEvent::new(hand, action, state, button)
        })
}

/// Classify one packet transition into press events followed by touch events.
///
/// Bits that did not change never produce an event.
pub fn classify_changes(
    previous_pressed: u64,
    current_pressed: u64,
    previous_touched: u64,
    current_touched: u64,
    hand: Hand,
) -> Vec<InputEvent> {
    edges(previous_pressed, current_pressed, hand, ActionType::Press)
        .chain(edges(previous_touched, current_touched, hand, ActionType::Touch))
        .collect()
}

/// Result of processing one packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketOutcome {
    /// Packet to hand on to the engine
    pub state: ControllerState,
    /// Overrides or blocking are active; the engine-bound copy must be rewritten
    pub needs_write: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct HandReading {
    /// Last observed masks indexed by [`ActionType::index`]
    button_states: [u64; 2],
    trigger: f32,
    joystick: Axis,
}

/// Last observed buttons and axes per hand.
///
/// Kept apart from the classifier and only locked for single reads and
/// writes, so callbacks may query it while a packet is being dispatched.
#[derive(Debug, Default)]
pub struct InputSnapshot {
    hands: Mutex<[HandReading; 2]>,
}

impl InputSnapshot {
    pub fn button_state(&self, button: ButtonId, hand: Hand, action: ActionType) -> ButtonState {
        let mask = self.hands.lock()[hand.index()].button_states[action.index()];
        ButtonState::from_bit(mask & button.mask() != 0)
    }

    pub fn trigger(&self, hand: Hand) -> f32 {
        self.hands.lock()[hand.index()].trigger
    }

    pub fn joystick(&self, hand: Hand) -> Axis {
        self.hands.lock()[hand.index()].joystick
    }

    fn set_mask(&self, hand: Hand, action: ActionType, mask: u64) {
        self.hands.lock()[hand.index()].button_states[action.index()] = mask;
    }

    fn set_axes(&self, hand: Hand, trigger: f32, joystick: Axis) {
        let reading = &mut self.hands.lock()[hand.index()];
        reading.trigger = trigger;
        reading.joystick = joystick;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct HandChannel {
    prev_pressed: u64,
    prev_touched: u64,
    prev_pressed_out: u64,
    prev_touched_out: u64,
    dpad: [bool; 4],
}

/// Per-hand edge tracker for the input thread.
///
/// Callbacks run while the tracker is borrowed mutably; they must not feed
/// another packet into the same tracker.
#[derive(Debug, Default)]
pub struct InputClassifier {
    hands: [HandChannel; 2],
}

impl InputClassifier {

    /// Classify `input`, dispatch callbacks, and build the outgoing packet.
    ///
    /// The outgoing masks start as the input masks. Consumed edges are hidden
    /// from them, and unchanged masks repeat the previous output so blocking
    /// holds until the release edge. Synthetic overrides are written after
    /// callbacks and block-all mode is applied last.
    pub fn process_packet(
        &mut self,
        hand: Hand,
        input: &ControllerState,
        registry: &CallbackRegistry,
        synthetic: &SyntheticInput,
        snapshot: &InputSnapshot,
    ) -> PacketOutcome {
        let mut out = *input;

        self.process_axes(hand, input, registry, snapshot);

        let channel = self.hands[hand.index()];
        if channel.prev_pressed != input.pressed {
            self.process_buttons(
                hand,
                ActionType::Press,
                channel.prev_pressed,
                input.pressed,
                &mut out,
                registry,
                snapshot,
            );
            let channel = &mut self.hands[hand.index()];
            channel.prev_pressed = input.pressed;
            channel.prev_pressed_out = out.pressed;
        } else {
            out.pressed = channel.prev_pressed_out;
        }

        if channel.prev_touched != input.touched {
            self.process_buttons(
                hand,
                ActionType::Touch,
                channel.prev_touched,
                input.touched,
                &mut out,
                registry,
                snapshot,
            );
            let channel = &mut self.hands[hand.index()];
            channel.prev_touched = input.touched;
            channel.prev_touched_out = out.touched;
        } else {
            out.touched = channel.prev_touched_out;
        }

        let mut trigger = input.trigger();
        let mut needs_write = synthetic.apply(hand, &mut out, &mut trigger);

        if synthetic.is_blocking_all() {
            out.pressed = 0;
            out.touched = 0;
            out.axes[ControllerState::JOYSTICK_AXIS] = Axis::default();
            trigger = 0.0;
            needs_write = true;
        }

        if needs_write {
            out.axes[ControllerState::TRIGGER_AXIS].x = trigger;
        }

        PacketOutcome {
            state: out,
            needs_write,
        }
    }

    fn process_buttons(
        &mut self,
        hand: Hand,
        action: ActionType,
        previous: u64,
        current: u64,
        out: &mut ControllerState,
        registry: &CallbackRegistry,
        snapshot: &InputSnapshot,
    ) {
        snapshot.set_mask(hand, action, current);

        for event in edges(previous, current, hand, action) {
            if !registry.has_interest(event.button) {
                continue;
            }
            let bit = event.button.mask();
            let mask = out.mask_mut(action);
            registry.dispatch(&event, || {
                if event.state.is_down() {
                    *mask &= !bit;
                } else {
                    *mask |= bit;
                }
            });
            trace!(?event, "dispatched input edge");
        }
    }

    fn process_axes(
        &mut self,
        hand: Hand,
        input: &ControllerState,
        registry: &CallbackRegistry,
        snapshot: &InputSnapshot,
    ) {
        let joystick = input.joystick();
        snapshot.set_axes(hand, input.trigger(), joystick);
        let deflected = [
            joystick.x < -DPAD_THRESHOLD,
            joystick.y > DPAD_THRESHOLD,
            joystick.x > DPAD_THRESHOLD,
            joystick.y < -DPAD_THRESHOLD,
        ];

        let channel = &mut self.hands[hand.index()];
        if channel.dpad != deflected {
            for (slot, button) in DPAD_BUTTONS.into_iter().enumerate() {
                if channel.dpad[slot] != deflected[slot] {
                    let event = InputEvent::new(
                        hand,
                        ActionType::Press,
                        ButtonState::from_bit(deflected[slot]),
                        button,
                    );
                    // D-pad edges are synthesised, there is nothing to hide from the game
                    registry.dispatch(&event, || {});
                }
            }
            channel.dpad = deflected;
        }
    }
}
