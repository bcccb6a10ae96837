//! Keyframed haptic playback.

use std::sync::Arc;

use super::Hand;
use crate::host::VrRuntime;

pub const MIN_POWER: f32 = 0.1;
pub const MAX_POWER: f32 = 1.0;

#[derive(Debug, Clone)]
struct Track {
    keyframes: Arc<[u16]>,
    position: usize,
    power: f32,
}

/// Plays one pulse per pose update from a per-hand keyframe list.
///
/// Keyframes are pulse durations in microseconds, scaled by the power the
/// pattern was started with.
#[derive(Debug, Default)]
pub struct HapticPlayer {
    tracks: [Option<Track>; 2],
}

impl HapticPlayer {
    pub fn play(&mut self, hand: Hand, keyframes: Arc<[u16]>, power: f32) {
        self.tracks[hand.index()] = Some(Track {
            keyframes,
            position: 0,
            power: power.clamp(MIN_POWER, MAX_POWER),
        });
    }

    pub fn stop(&mut self, hand: Hand) {
        self.tracks[hand.index()] = None;
    }

    pub fn is_playing(&self, hand: Hand) -> bool {
        self.tracks[hand.index()].is_some()
    }

    /// Emit the next keyframe for each playing hand
    pub fn advance(&mut self, runtime: &mut dyn VrRuntime) {
        for hand in Hand::ALL {
            let slot = &mut self.tracks[hand.index()];
            let Some(track) = slot else { continue };
            match track.keyframes.get(track.position).copied() {
                Some(frame) => {
                    let duration = (f32::from(frame) * track.power) as u16;
                    runtime.trigger_haptic_pulse(hand, duration);
                    track.position += 1;
                }
                None => *slot = None,
            }
        }
    }
}
