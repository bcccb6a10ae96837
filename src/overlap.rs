//! Hand overlap spheres with hysteresis
//!
//! A sphere follows a scene node and reports when a palm enters or leaves
//! it. Leaving needs the palm to move a band further out than entering did,
//! so a hand resting on the boundary does not flicker between states.

use bevy::prelude::{Mat3, Vec3};
use tracing::{debug, trace};

use crate::geometry::{angle_between, azimuth};
use crate::host::{HostEngine, NodeId};
use crate::input::Hand;

/// Extra squared distance past the radius before a hand counts as outside
pub const HYSTERESIS_SQ: f32 = 20.0;
/// Extra cone angle before a hand counts as outside
pub const HYSTERESIS_ANGLE: f32 = 3.0 * std::f32::consts::PI / 180.0;
/// Palm direction in hand-node space
pub const PALM_NORMAL: Vec3 = Vec3::new(0.0, -1.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SphereId(pub u32);

/// Placement and activation shape of one sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereShape {
    pub attach: NodeId,
    /// Offset from the attach node, in its frame
    pub local_position: Vec3,
    pub radius: f32,
    /// When set, the palm must face within `max_angle` of this direction
    pub normal: Option<Vec3>,
    pub max_angle: f32,
    /// Only inherit the node's heading, ignoring pitch and roll
    pub only_heading: bool,
}

impl SphereShape {
    pub fn new(attach: NodeId, local_position: Vec3, radius: f32) -> Self {
        Self {
            attach,
            local_position,
            radius,
            normal: None,
            max_angle: 0.0,
            only_heading: false,
        }
    }

    pub fn with_normal(mut self, normal: Vec3, max_angle: f32) -> Self {
        self.normal = Some(normal);
        self.max_angle = max_angle;
        self
    }

    pub fn heading_only(mut self) -> Self {
        self.only_heading = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapEvent {
    pub sphere: SphereId,
    pub hand: Hand,
    pub entered: bool,
}

#[derive(Debug)]
struct Sphere {
    id: SphereId,
    shape: SphereShape,
    inside: [bool; 2],
}

#[derive(Debug, Default)]
pub struct OverlapSphereManager {
    spheres: Vec<Sphere>,
    palm_offset: Vec3,
    next_id: u32,
}

impl OverlapSphereManager {
    pub fn new(palm_offset: Vec3) -> Self {
        Self {
            palm_offset,
            ..Default::default()
        }
    }

    pub fn set_palm_offset(&mut self, offset: Vec3) {
        self.palm_offset = offset;
    }

    pub fn create(&mut self, shape: SphereShape) -> SphereId {
        let id = SphereId(self.next_id);
        self.next_id += 1;
        self.spheres.push(Sphere {
            id,
            shape,
            inside: [false; 2],
        });
        debug!(sphere = id.0, radius = shape.radius, "overlap sphere created");
        id
    }

    pub fn destroy(&mut self, id: SphereId) {
        self.spheres.retain(|sphere| sphere.id != id);
    }

    pub fn is_inside(&self, id: SphereId, hand: Hand) -> bool {
        self.spheres
            .iter()
            .find(|sphere| sphere.id == id)
            .is_some_and(|sphere| sphere.inside[hand.index()])
    }

    /// Test both palms against every sphere and return the state changes
    pub fn update(&mut self, host: &dyn HostEngine) -> Vec<OverlapEvent> {
        let mut events = Vec::new();
        let palms: Vec<Option<(Vec3, Vec3)>> = Hand::ALL
            .iter()
            .map(|hand| {
                host.hand_world_transform(*hand).map(|t| {
                    (
                        t.translate + t.rotate * self.palm_offset,
                        t.rotate * PALM_NORMAL,
                    )
                })
            })
            .collect();

        for sphere in &mut self.spheres {
            let Some(node) = host.world_transform(sphere.shape.attach) else {
                trace!(sphere = sphere.id.0, "attach node not loaded");
                continue;
            };
            let offset = if sphere.shape.only_heading {
                Mat3::from_rotation_z(-azimuth(&node.rotate)) * sphere.shape.local_position
            } else {
                node.rotate * sphere.shape.local_position
            };
            let center = node.translate + offset;
            let radius_sq = sphere.shape.radius * sphere.shape.radius;

            for (hand, palm) in Hand::ALL.into_iter().zip(&palms) {
                let Some((position, palm_normal)) = palm else { continue };
                let distance_sq = center.distance_squared(*position);
                let angle = sphere
                    .shape
                    .normal
                    .map_or(0.0, |normal| angle_between(node.rotate * normal, *palm_normal));

                let inside = &mut sphere.inside[hand.index()];
                let entered = !*inside && distance_sq <= radius_sq && angle <= sphere.shape.max_angle;
                let exited = *inside
                    && (distance_sq > radius_sq + HYSTERESIS_SQ
                        || angle > sphere.shape.max_angle + HYSTERESIS_ANGLE);
                if entered || exited {
                    *inside = entered;
                    debug!(sphere = sphere.id.0, ?hand, entered, "overlap change");
                    events.push(OverlapEvent {
                        sphere: sphere.id,
                        hand,
                        entered,
                    });
                }
            }
        }
        events
    }
}
