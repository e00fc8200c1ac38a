//! Road network tooling for driving simulations: an OpenDRIVE map model
//! with coordinate transforms between world, road and lane frames, spawn
//! point planning, and a frame-synchronous trigger scheduler that drives
//! scripted vehicle maneuvers against a simulator backend.

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

pub mod input;
pub mod output;
pub mod road;
pub mod sim;

#[cfg(test)]
pub mod testmap;

use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use crate::input::opendrive::{parse_opendrive, ParseError};
pub use crate::output::stamp::{ControlAction, StampLog, StateKind};
pub use crate::road::coords::{LaneCoord, RoadCoord, Transform, Vec3, WorldCoord};
pub use crate::road::network::RoadNetwork;
pub use crate::road::query::AdvancedQueries;
pub use crate::road::spawn::SpawnPlanner;
pub use crate::road::transform::CoordinateTransformer;
pub use crate::road::RoadError;
pub use crate::sim::behaviors::ManeuverResult;
pub use crate::sim::clock::{RunState, SimulationContext};
pub use crate::sim::registry::{VehicleConfig, VehicleRegistry};
pub use crate::sim::world::{ActorId, World, WorldError};
pub use crate::sim::{ControlError, Direction, Frame, VehicleId};

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f: &Path) -> AppResult<String> {
    let mut file = File::open(f)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Load a road network from an OpenDRIVE file.
pub fn get_road_network(path: &Path) -> AppResult<RoadNetwork> {
    let contents = read_file(path)?;
    let net = parse_opendrive(&contents)?;
    info!(
        "loaded road network: {} roads, {} junctions, {} signals",
        net.roads().count(),
        net.junctions().count(),
        net.signals().len()
    );
    Ok(net)
}

pub fn get_road_network_string(contents: &str) -> AppResult<RoadNetwork> {
    Ok(parse_opendrive(contents)?)
}
