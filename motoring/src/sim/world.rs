//! Interface to the simulator backend.
//!
//! The scheduler and control layer only ever talk to the backend through
//! this trait: stepping the world one fixed timestep, spawning and
//! destroying actors, and reading actor state back.

use crate::road::coords::{Transform, Vec3};

/// Backend actor identifier, assigned by the world on spawn.
pub type ActorId = u64;

#[derive(Debug, Fail)]
pub enum WorldError {
    #[fail(display = "simulator step failed: {}", _0)]
    StepFailed(String),
    #[fail(display = "spawn of '{}' failed: {}", _0, _1)]
    SpawnFailed(String, String),
}

pub trait World {
    /// Advance the world by exactly one fixed timestep.
    fn advance_by_one_fixed_step(&mut self) -> Result<(), WorldError>;

    /// Length of one fixed timestep in seconds.
    fn fixed_timestep(&self) -> f64;

    fn spawn_actor(&mut self, blueprint: &str, at: &Transform) -> Result<ActorId, WorldError>;

    /// Remove an actor. Returns false when the actor is already gone.
    fn destroy_actor(&mut self, actor: ActorId) -> bool;

    fn actor_transform(&self, actor: ActorId) -> Option<Transform>;

    fn actor_velocity(&self, actor: ActorId) -> Option<Vec3>;
}
