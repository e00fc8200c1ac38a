pub mod world;
pub mod registry;
pub mod triggers;
pub mod clock;
pub mod behaviors;

/// Simulation frame counter. One frame is one fixed timestep of the
/// underlying world.
pub type Frame = u64;

/// Opaque handle for a registered vehicle. Handles are never reused within
/// a registry.
pub type VehicleId = usize;

/// Which side of the vehicle a lateral maneuver moves toward, in the
/// vehicle's own frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Errors from the vehicle control layer.
#[derive(Debug, Fail, PartialEq)]
pub enum ControlError {
    #[fail(display = "unknown vehicle handle {}", _0)]
    UnknownVehicle(VehicleId),
    #[fail(display = "maneuver not feasible: {}", _0)]
    ManeuverInfeasible(String),
}
