//! Coordinate frames used throughout the crate.
//!
//! World coordinates are cartesian map coordinates. Road coordinates follow a
//! road's reference line: `s` is arc length from the road start, `t` is the
//! signed lateral offset from the reference line, positive to the left of the
//! direction of increasing `s`. Lane coordinates additionally name a lane and
//! measure `offset` from the lane center.

use std::fmt;

use super::{LaneId, RoadId};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WorldCoord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldCoord {
    pub fn new(x: f64, y: f64, z: f64) -> WorldCoord {
        WorldCoord { x, y, z }
    }

    /// Distance in the xy plane, ignoring elevation.
    pub fn planar_distance(&self, other: &WorldCoord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance(&self, other: &WorldCoord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for WorldCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RoadCoord {
    pub road_id: RoadId,
    pub s: f64,
    pub t: f64,
}

impl RoadCoord {
    pub fn new(road_id: RoadId, s: f64, t: f64) -> RoadCoord {
        RoadCoord { road_id, s, t }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LaneCoord {
    pub road_id: RoadId,
    pub lane_id: LaneId,
    pub s: f64,
    /// Lateral offset from the lane center, positive toward the left of
    /// increasing `s`.
    pub offset: f64,
}

impl LaneCoord {
    pub fn new(road_id: RoadId, lane_id: LaneId, s: f64) -> LaneCoord {
        LaneCoord { road_id, lane_id, s, offset: 0.0 }
    }

    pub fn with_offset(road_id: RoadId, lane_id: LaneId, s: f64, offset: f64) -> LaneCoord {
        LaneCoord { road_id, lane_id, s, offset }
    }
}

/// A placement in the world: position plus heading about the z axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: WorldCoord,
    pub yaw: f64,
}

impl Transform {
    pub fn new(position: WorldCoord, yaw: f64) -> Transform {
        Transform { position, yaw }
    }

    /// Unit vector in the heading direction, in the xy plane.
    pub fn forward(&self) -> (f64, f64) {
        (self.yaw.cos(), self.yaw.sin())
    }

    /// Unit vector pointing to the left of the heading, in the xy plane.
    pub fn left(&self) -> (f64, f64) {
        (-self.yaw.sin(), self.yaw.cos())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn zero() -> Vec3 {
        Vec3 { x: 0.0, y: 0.0, z: 0.0 }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Normalize an angle into `(-pi, pi]`.
pub fn normalize_angle(a: f64) -> f64 {
    use std::f64::consts::PI;
    let mut a = a % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn angle_normalization() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_angle(-0.5) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn planar_distance_ignores_z() {
        let a = WorldCoord::new(0.0, 0.0, 0.0);
        let b = WorldCoord::new(3.0, 4.0, 100.0);
        assert!((a.planar_distance(&b) - 5.0).abs() < 1e-12);
        assert!(a.distance(&b) > 100.0);
    }
}
