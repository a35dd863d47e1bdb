//! Circle collision and path correction on the continuous map plane.

use crate::DEFAULT_RADIUS;
use serde::{Deserialize, Serialize};

/// Slack applied around every contact so that a corrected point is never
/// reported as colliding when it is fed back into the resolver.
pub const CONTACT_TOLERANCE: f32 = 1e-3;

/// A point or direction on the map plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f32 {
        self.dot(*self).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        self.sub(other).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalize(&self) -> Vec2 {
        let length = self.length();
        if length == 0.0 {
            Vec2::ZERO
        } else {
            self.scale(1.0 / length)
        }
    }

    /// Linear interpolation; `alpha` is clamped to [0, 1].
    pub fn lerp(&self, other: Vec2, alpha: f32) -> Vec2 {
        let alpha = alpha.clamp(0.0, 1.0);
        self.add(other.sub(*self).scale(alpha))
    }

    /// Keeps a body of radius `margin` inside a `width` x `height` map.
    pub fn clamp_to_bounds(&self, width: f32, height: f32, margin: f32) -> Vec2 {
        Vec2::new(
            self.x.clamp(margin, (width - margin).max(margin)),
            self.y.clamp(margin, (height - margin).max(margin)),
        )
    }

    /// Point reached by travelling from `self` towards `target`, at most
    /// `max_distance` units.
    pub fn step_towards(&self, target: Vec2, max_distance: f32) -> Vec2 {
        let offset = target.sub(*self);
        let distance = offset.length();
        if distance <= max_distance {
            target
        } else {
            self.add(offset.normalize().scale(max_distance))
        }
    }
}

/// A circular body: characters, monsters and static obstacles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub const fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub const fn with_default_radius(center: Vec2) -> Self {
        Self::new(center, DEFAULT_RADIUS)
    }
}

/// Two circles collide when their centers are closer than the sum of radii.
/// Touching circles do not collide.
pub fn collides(a: &Circle, b: &Circle) -> bool {
    a.center.distance(b.center) < a.radius + b.radius
}

/// Resolves a move of a body with radius `mover_radius` from `from` to `to`.
///
/// Returns `to` when the straight path is clear. When obstacles block it, the
/// result is the point on the path where the mover first touches a blocking
/// obstacle, which is the reachable point closest to the target. A mover
/// already overlapping an obstacle may move away from it but not deeper
/// into it; in the latter case it stays at `from`.
///
/// Re-resolving the returned point from the same start yields the same point.
pub fn nearest_free_position(mover_radius: f32, from: Vec2, to: Vec2, obstacles: &[Circle]) -> Vec2 {
    let path = to.sub(from);
    let length_sq = path.dot(path);
    if length_sq <= f32::EPSILON {
        return from;
    }

    let mut first_contact = 1.0_f32;

    for obstacle in obstacles {
        let safe = mover_radius + obstacle.radius;
        let offset = from.sub(obstacle.center);
        let heading = offset.dot(path);

        if offset.length() < safe {
            if heading < 0.0 {
                return from;
            }
            // Moving away: distance only grows along the path.
            continue;
        }

        let closest_t = (-heading / length_sq).clamp(0.0, 1.0);
        let closest = offset.add(path.scale(closest_t));
        if closest.length() >= safe - CONTACT_TOLERANCE {
            continue;
        }

        // |offset + t * path| = contact, earliest root.
        let contact = safe + CONTACT_TOLERANCE;
        let b = 2.0 * heading;
        let c = offset.dot(offset) - contact * contact;
        let discriminant = (b * b - 4.0 * length_sq * c).max(0.0);
        let t = ((-b - discriminant.sqrt()) / (2.0 * length_sq)).clamp(0.0, 1.0);

        first_contact = first_contact.min(t);
    }

    if first_contact >= 1.0 {
        to
    } else {
        from.add(path.scale(first_contact))
    }
}
