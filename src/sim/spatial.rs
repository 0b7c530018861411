//! Ground-plane geometry and range queries.
//!
//! Combat happens on the XZ plane; entity positions come from their
//! `Transform`. The helpers here stand in for the world module's spatial
//! index: they scan the combatant query directly, which is adequate for
//! the populations a single shard tick handles and keeps the core free of
//! any spatial-partitioning dependency.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::{Combatant, EntityId};

/// A point on the world ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroundPoint {
    pub x: f32,
    pub z: f32,
}

impl GroundPoint {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            x: transform.translation.x,
            z: transform.translation.z,
        }
    }

    pub fn distance(&self, other: GroundPoint) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// Target selection predicate for area queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFilter {
    Enemies,
    Allies,
    All,
}

/// Geometric shape of an area payload, centered on the cast point and
/// oriented from the caster towards it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetShape {
    Single,
    Circle { radius: f32 },
    Cone { radius: f32, angle_deg: f32 },
    Line { length: f32, width: f32 },
}

impl TargetShape {
    /// Whether `point` lies inside the shape anchored at `origin` facing
    /// towards `toward`.
    pub fn contains(&self, origin: GroundPoint, toward: GroundPoint, point: GroundPoint) -> bool {
        match *self {
            TargetShape::Single => false,
            TargetShape::Circle { radius } => toward.distance(point) <= radius,
            TargetShape::Cone { radius, angle_deg } => {
                if origin.distance(point) > radius {
                    return false;
                }
                let aim = (toward.x - origin.x, toward.z - origin.z);
                let at = (point.x - origin.x, point.z - origin.z);
                let aim_len = (aim.0 * aim.0 + aim.1 * aim.1).sqrt();
                let at_len = (at.0 * at.0 + at.1 * at.1).sqrt();
                if aim_len <= f32::EPSILON || at_len <= f32::EPSILON {
                    return true;
                }
                let cos = (aim.0 * at.0 + aim.1 * at.1) / (aim_len * at_len);
                cos.clamp(-1.0, 1.0).acos() <= angle_deg.to_radians() * 0.5
            }
            TargetShape::Line { length, width } => {
                let aim = (toward.x - origin.x, toward.z - origin.z);
                let aim_len = (aim.0 * aim.0 + aim.1 * aim.1).sqrt();
                if aim_len <= f32::EPSILON {
                    return origin.distance(point) <= width * 0.5;
                }
                let dir = (aim.0 / aim_len, aim.1 / aim_len);
                let at = (point.x - origin.x, point.z - origin.z);
                let along = at.0 * dir.0 + at.1 * dir.1;
                let across = (at.0 * -dir.1 + at.1 * dir.0).abs();
                (0.0..=length).contains(&along) && across <= width * 0.5
            }
        }
    }
}

/// All targetable combatants within `radius` of `center`, excluding
/// `exclude`. Relationship filtering is applied by the caller, which owns
/// the policy context.
pub fn combatants_in_range(
    combatants: &Query<(&mut Combatant, &Transform)>,
    center: GroundPoint,
    radius: f32,
    exclude: Option<EntityId>,
) -> Vec<EntityId> {
    let mut found = Vec::new();
    for (combatant, transform) in combatants.iter() {
        if Some(combatant.id) == exclude || !combatant.can_be_targeted() {
            continue;
        }
        if GroundPoint::from_transform(transform).distance(center) <= radius {
            found.push(combatant.id);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cone_accepts_targets_inside_half_angle() {
        let shape = TargetShape::Cone {
            radius: 10.0,
            angle_deg: 90.0,
        };
        let origin = GroundPoint::new(0.0, 0.0);
        let toward = GroundPoint::new(0.0, 5.0);
        assert!(shape.contains(origin, toward, GroundPoint::new(1.0, 4.0)));
        assert!(!shape.contains(origin, toward, GroundPoint::new(5.0, -1.0)));
        assert!(!shape.contains(origin, toward, GroundPoint::new(0.0, 11.0)));
    }

    #[test]
    fn line_is_bounded_by_length_and_width() {
        let shape = TargetShape::Line {
            length: 8.0,
            width: 2.0,
        };
        let origin = GroundPoint::new(0.0, 0.0);
        let toward = GroundPoint::new(8.0, 0.0);
        assert!(shape.contains(origin, toward, GroundPoint::new(4.0, 0.5)));
        assert!(!shape.contains(origin, toward, GroundPoint::new(4.0, 1.5)));
        assert!(!shape.contains(origin, toward, GroundPoint::new(9.0, 0.0)));
    }
}
