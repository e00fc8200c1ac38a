//! Trigger predicates.
//!
//! A predicate is a pure check against the simulation context, evaluated
//! once per frame by the scheduler. Predicates never fail: a vehicle that
//! is unknown or has left the world simply makes the predicate false.

use crate::road::coords::WorldCoord;

use super::clock::SimulationContext;
use super::world::World;
use super::{Frame, VehicleId};

pub type Predicate<W> = Box<dyn Fn(&SimulationContext<W>) -> bool>;

/// Tolerance band for `DistanceCheck::Equal`, meters.
pub const DISTANCE_EQUAL_TOLERANCE: f64 = 0.5;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DistanceCheck {
    Less,
    Greater,
    Equal,
}

/// True exactly on the given frame.
pub fn when_timestep_equals<W: World>(frame: Frame) -> Predicate<W> {
    Box::new(move |ctx| ctx.current_frame() == frame)
}

/// True on the given frame and every frame after it.
pub fn when_timestep_reached<W: World>(frame: Frame) -> Predicate<W> {
    Box::new(move |ctx| ctx.current_frame() >= frame)
}

/// True while the vehicle is within `radius` meters of a world position.
pub fn when_near_location<W: World>(
    vehicle: VehicleId,
    target: WorldCoord,
    radius: f64,
) -> Predicate<W> {
    Box::new(move |ctx| {
        ctx.vehicle_position(vehicle)
            .map(|p| p.distance(&target) <= radius)
            .unwrap_or(false)
    })
}

/// Compare the distance between two vehicles against a threshold.
pub fn when_distance_between<W: World>(
    a: VehicleId,
    b: VehicleId,
    threshold: f64,
    check: DistanceCheck,
) -> Predicate<W> {
    Box::new(move |ctx| {
        let pa = match ctx.vehicle_position(a) {
            Some(p) => p,
            None => return false,
        };
        let pb = match ctx.vehicle_position(b) {
            Some(p) => p,
            None => return false,
        };
        let d = pa.distance(&pb);
        match check {
            DistanceCheck::Less => d < threshold,
            DistanceCheck::Greater => d > threshold,
            DistanceCheck::Equal => (d - threshold).abs() <= DISTANCE_EQUAL_TOLERANCE,
        }
    })
}

/// True while the vehicle's speed exceeds `threshold` m/s.
pub fn when_speed_above<W: World>(vehicle: VehicleId, threshold: f64) -> Predicate<W> {
    Box::new(move |ctx| {
        ctx.vehicle_speed(vehicle)
            .map(|v| v > threshold)
            .unwrap_or(false)
    })
}

/// True while the vehicle's speed is below `threshold` m/s.
pub fn when_speed_below<W: World>(vehicle: VehicleId, threshold: f64) -> Predicate<W> {
    Box::new(move |ctx| {
        ctx.vehicle_speed(vehicle)
            .map(|v| v < threshold)
            .unwrap_or(false)
    })
}
