//! Edge classification, callback routing and press hiding

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use backpack_vr::input::{
    callback, ActionType, Axis, ButtonId, ButtonState, ControllerState, Hand, InputEvent, VrInput,
};
use parking_lot::Mutex;

const RIGHT_DEVICE: u32 = 3;
const LEFT_DEVICE: u32 = 4;

fn tracked_input() -> VrInput {
    let input = VrInput::new();
    input.set_device(Hand::Right, RIGHT_DEVICE);
    input.set_device(Hand::Left, LEFT_DEVICE);
    input
}

fn pressed(mask: u64) -> ControllerState {
    ControllerState {
        pressed: mask,
        ..Default::default()
    }
}

/// Callback that records every event and hides presses when `consume` is set
fn recorder(consume: bool) -> (Arc<Mutex<Vec<InputEvent>>>, backpack_vr::input::InputCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let func = callback(move |event: &InputEvent| {
        sink.lock().push(*event);
        consume && event.state.is_down()
    });
    (seen, func)
}

#[test]
fn test_untracked_device_passes_through() {
    let input = tracked_input();
    assert!(input.on_controller_state(99, &pressed(ButtonId::A.mask())).is_none());
    assert_eq!(input.hand_for_device(LEFT_DEVICE), Some(Hand::Left));
}

#[test]
fn test_press_and_release_reach_callback_once_each() {
    let input = tracked_input();
    let (seen, func) = recorder(false);
    input.add_callback(func, ButtonId::Grip, Hand::Right, ActionType::Press);

    let down = pressed(ButtonId::Grip.mask());
    input.on_controller_state(RIGHT_DEVICE, &down);
    // held: no new edge
    input.on_controller_state(RIGHT_DEVICE, &down);
    input.on_controller_state(RIGHT_DEVICE, &ControllerState::default());

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].state, ButtonState::Down);
    assert_eq!(seen[0].button, ButtonId::Grip);
    assert_eq!(seen[1].state, ButtonState::Up);
}

#[test]
fn test_callbacks_only_see_their_hand() {
    let input = tracked_input();
    let (seen, func) = recorder(false);
    input.add_callback(func, ButtonId::A, Hand::Left, ActionType::Press);

    input.on_controller_state(RIGHT_DEVICE, &pressed(ButtonId::A.mask()));
    assert!(seen.lock().is_empty());

    input.on_controller_state(LEFT_DEVICE, &pressed(ButtonId::A.mask()));
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(seen.lock()[0].hand, Hand::Left);
}

#[test]
fn test_consumed_press_stays_hidden_until_release() {
    let input = tracked_input();
    let (_seen, func) = recorder(true);
    input.add_callback(func, ButtonId::A, Hand::Right, ActionType::Press);

    let down = pressed(ButtonId::A.mask() | ButtonId::Grip.mask());
    let first = input
        .on_controller_state(RIGHT_DEVICE, &down)
        .expect("tracked device");
    assert_eq!(first.state.pressed, ButtonId::Grip.mask());
    assert!(!first.needs_write);

    let held = input
        .on_controller_state(RIGHT_DEVICE, &down)
        .expect("tracked device");
    assert_eq!(held.state.pressed, ButtonId::Grip.mask());

    let released = input
        .on_controller_state(RIGHT_DEVICE, &ControllerState::default())
        .expect("tracked device");
    assert_eq!(released.state.pressed, 0);

    // the raw state is still tracked for hidden presses
    input.on_controller_state(RIGHT_DEVICE, &pressed(ButtonId::A.mask()));
    assert_eq!(
        input.button_state(ButtonId::A, Hand::Right, ActionType::Press),
        ButtonState::Down
    );
}

#[test]
fn test_touch_edges_follow_press_edges() {
    let input = tracked_input();
    let (seen, func) = recorder(false);
    input.add_callback(func.clone(), ButtonId::Trigger, Hand::Right, ActionType::Press);
    input.add_callback(func, ButtonId::Trigger, Hand::Right, ActionType::Touch);

    let state = ControllerState {
        pressed: ButtonId::Trigger.mask(),
        touched: ButtonId::Trigger.mask(),
        ..Default::default()
    };
    input.on_controller_state(RIGHT_DEVICE, &state);

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].action, ActionType::Press);
    assert_eq!(seen[1].action, ActionType::Touch);
}

#[test]
fn test_removed_callback_is_not_called() {
    let input = tracked_input();
    let (seen, func) = recorder(true);
    input.add_callback(func.clone(), ButtonId::A, Hand::Right, ActionType::Press);
    input.remove_callback(&func, ButtonId::A, Hand::Right, ActionType::Press);

    let outcome = input
        .on_controller_state(RIGHT_DEVICE, &pressed(ButtonId::A.mask()))
        .expect("tracked device");
    assert!(seen.lock().is_empty());
    assert_eq!(outcome.state.pressed, ButtonId::A.mask());
}

#[test]
fn test_joystick_deflection_emits_dpad_edges() {
    let input = tracked_input();
    let (seen, func) = recorder(true);
    input.add_callback(func, ButtonId::DPadRight, Hand::Left, ActionType::Press);

    let mut state = ControllerState::default();
    state.axes[ControllerState::JOYSTICK_AXIS] = Axis { x: 0.9, y: 0.0 };
    let outcome = input
        .on_controller_state(LEFT_DEVICE, &state)
        .expect("tracked device");
    // nothing to hide for synthesised buttons
    assert_eq!(outcome.state.pressed, 0);
    assert_eq!(input.joystick(Hand::Left).x, 0.9);

    state.axes[ControllerState::JOYSTICK_AXIS] = Axis { x: 0.5, y: 0.0 };
    input.on_controller_state(LEFT_DEVICE, &state);

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].button, ButtonId::DPadRight);
    assert_eq!(seen[0].state, ButtonState::Down);
    assert_eq!(seen[1].state, ButtonState::Up);
}

#[test]
fn test_stopped_game_suspends_classification() {
    let input = tracked_input();
    let (seen, func) = recorder(false);
    input.add_callback(func, ButtonId::Grip, Hand::Right, ActionType::Press);

    input.set_game_stopped(true);
    assert!(input
        .on_controller_state(RIGHT_DEVICE, &pressed(ButtonId::Grip.mask()))
        .is_none());
    assert!(seen.lock().is_empty());

    input.set_game_stopped(false);
    input.on_controller_state(RIGHT_DEVICE, &pressed(ButtonId::Grip.mask()));
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_callbacks_can_query_input_state() {
    let input = Arc::new(tracked_input());
    let seen = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&input);
    let sink = Arc::clone(&seen);
    let func = callback(move |_event: &InputEvent| {
        if let Some(input) = weak.upgrade() {
            *sink.lock() = Some((
                input.button_state(ButtonId::Grip, Hand::Right, ActionType::Press),
                input.trigger(Hand::Right),
                input.joystick(Hand::Right).y,
            ));
        }
        false
    });
    input.add_callback(func, ButtonId::Trigger, Hand::Right, ActionType::Press);

    let mut state = pressed(ButtonId::Trigger.mask() | ButtonId::Grip.mask());
    state.axes[ControllerState::TRIGGER_AXIS].x = 0.8;
    state.axes[ControllerState::JOYSTICK_AXIS] = Axis { x: 0.0, y: 0.25 };

    let (done, finished) = crossbeam_channel::bounded(1);
    let worker_input = Arc::clone(&input);
    thread::spawn(move || {
        let outcome = worker_input.on_controller_state(RIGHT_DEVICE, &state);
        let _ = done.send(outcome.is_some());
    });
    let returned = finished
        .recv_timeout(Duration::from_secs(3))
        .expect("packet processing returned while a callback read input state");
    assert!(returned);

    // the callback sees the packet being dispatched
    assert_eq!(*seen.lock(), Some((ButtonState::Down, 0.8, 0.25)));
}
