//! Transform and overlap math for hand/object selection
//!
//! Engine scene nodes carry a rotation matrix, translation and uniform scale.
//! Views test hands against boxes in their own local frame; items test hands
//! against world-space bounding spheres using squared distances.

use bevy::prelude::{Mat3, Vec3};

/// Below this length a rotation axis is considered degenerate
const DEGENERATE_AXIS: f32 = 0.0005;

/// Rotation, translation and uniform scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub rotate: Mat3,
    pub translate: Vec3,
    pub scale: f32,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl NodeTransform {
    pub const IDENTITY: Self = Self {
        rotate: Mat3::IDENTITY,
        translate: Vec3::ZERO,
        scale: 1.0,
    };

    pub fn from_translation(translate: Vec3) -> Self {
        Self {
            translate,
            ..Self::IDENTITY
        }
    }

    pub fn new(rotate: Mat3, translate: Vec3) -> Self {
        Self {
            rotate,
            translate,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// World transform of a child whose local transform is `child`
    pub fn compose(&self, child: &NodeTransform) -> NodeTransform {
        NodeTransform {
            rotate: self.rotate * child.rotate,
            translate: self.translate + self.rotate * (child.translate * self.scale),
            scale: self.scale * child.scale,
        }
    }

    /// Express a world-space point in this node's local frame
    pub fn world_to_local(&self, point: Vec3) -> Vec3 {
        let scale = if self.scale.abs() > f32::EPSILON {
            self.scale
        } else {
            1.0
        };
        self.rotate.transpose() * (point - self.translate) / scale
    }

    pub fn local_to_world(&self, point: Vec3) -> Vec3 {
        self.translate + self.rotate * (point * self.scale)
    }

    /// Local transform that places a child of `self` at `world`
    pub fn child_local_for(&self, world: &NodeTransform) -> NodeTransform {
        let scale = if self.scale.abs() > f32::EPSILON {
            self.scale
        } else {
            1.0
        };
        NodeTransform {
            rotate: self.rotate.transpose() * world.rotate,
            translate: self.world_to_local(world.translate),
            scale: world.scale / scale,
        }
    }
}

/// Axis-aligned box in a node's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl LocalBox {
    /// Box spanning two corners; components are reordered so `min <= max`
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box from the local origin to `extent`
    pub fn from_origin(extent: Vec3) -> Self {
        Self::new(Vec3::ZERO, extent)
    }

    /// Box of size `extent` centred on the local origin
    pub fn centered(extent: Vec3) -> Self {
        let half = extent * 0.5;
        Self::new(-half, half)
    }

    pub fn cube(half_size: f32) -> Self {
        Self::new(Vec3::splat(-half_size), Vec3::splat(half_size))
    }

    /// Inclusive containment test
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// World-space bounding sphere of a rendered model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Squared distance from `point` when it lies within the sphere
    pub fn overlap(&self, point: Vec3) -> Option<f32> {
        let distance_sq = self.center.distance_squared(point);
        (distance_sq <= self.radius * self.radius).then_some(distance_sq)
    }
}

/// Dot product clamped to the domain of `acos`
pub fn dot_safe(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0)
}

/// Angle in radians between two directions; zero vectors give zero
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    dot_safe(a.normalize_or_zero(), b.normalize_or_zero()).acos()
}

/// Rotation matrix of `theta` radians about a unit `axis`
pub fn rotation_axis_angle(axis: Vec3, theta: f32) -> Mat3 {
    let (s, c) = theta.sin_cos();
    let t = 1.0 - c;
    let Vec3 { x, y, z } = axis;
    let rows = [
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ];
    Mat3::from_cols_array_2d(&rows).transpose()
}

/// Rotation taking direction `src` onto direction `dest`.
///
/// Colinear or zero inputs fall back to a fixed perpendicular axis so the
/// result is always a valid rotation.
pub fn rotate_between_vectors(src: Vec3, dest: Vec3) -> Mat3 {
    let angle = angle_between(src, dest);
    let mut axis = src.cross(dest.normalize_or_zero()).normalize_or_zero();
    if axis.length() < DEGENERATE_AXIS {
        axis = fallback_axis(src);
    }
    rotation_axis_angle(axis, angle)
}

fn fallback_axis(src: Vec3) -> Vec3 {
    let candidate = src.cross(Vec3::X);
    if candidate.length() >= DEGENERATE_AXIS {
        return candidate.normalize();
    }
    let candidate = src.cross(Vec3::Y);
    if candidate.length() >= DEGENERATE_AXIS {
        return candidate.normalize();
    }
    Vec3::Z
}

/// Heading about Z ignoring pitch and roll
pub fn azimuth(rotate: &Mat3) -> f32 {
    // row/column naming follows the engine's row-major convention
    let entry = |row: usize, col: usize| rotate.col(col)[row];
    if entry(2, 1).abs() < 0.9995 {
        entry(0, 1).atan2(entry(1, 1))
    } else {
        -entry(1, 0).atan2(entry(0, 0))
    }
}

/// Z-only rotation turning +X from `from` towards `target`.
///
/// Returns `None` when the horizontal distance is within `tolerance`,
/// which keeps the result stable when the target is almost overhead.
pub fn yaw_towards(from: Vec3, target: Vec3, tolerance: f32) -> Option<Mat3> {
    let to_target = target - from;
    let horizontal_sq = to_target.x * to_target.x + to_target.y * to_target.y;
    if horizontal_sq <= tolerance * tolerance {
        return None;
    }
    let heading = to_target.normalize_or_zero();
    Some(Mat3::from_rotation_z(heading.y.atan2(heading.x)))
}
