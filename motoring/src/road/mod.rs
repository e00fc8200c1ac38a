pub mod coords;
pub mod network;
pub mod transform;
pub mod spawn;
pub mod query;

pub type RoadId = i32;
pub type LaneId = i32;
pub type JunctionId = i32;

/// Errors from road network lookups and coordinate conversions.
#[derive(Debug, Fail, PartialEq)]
pub enum RoadError {
    #[fail(display = "road {} not found", _0)]
    RoadNotFound(RoadId),
    #[fail(display = "junction {} not found", _0)]
    JunctionNotFound(JunctionId),
    #[fail(display = "lane {} not present on road {} at s={}", lane_id, road_id, s)]
    LaneNotFound { road_id: RoadId, lane_id: LaneId, s: f64 },
    #[fail(display = "s={} out of range on road {} (length {})", s, road_id, length)]
    CoordinateOutOfRange { road_id: RoadId, s: f64, length: f64 },
    #[fail(display = "coordinates reference different roads or lanes")]
    IncompatibleCoordinates,
    #[fail(display = "lane topology ended after {:.2} of {:.2} requested meters", covered, requested)]
    EndOfRoadNetwork { requested: f64, covered: f64 },
    #[fail(display = "no road to project onto")]
    NoProjection,
    #[fail(display = "road {} is not part of a junction", _0)]
    NotAJunctionRoad(RoadId),
    #[fail(display = "junction {} has no path from road {} to road {}", junction_id, incoming, outgoing)]
    NoJunctionPath { junction_id: JunctionId, incoming: RoadId, outgoing: RoadId },
    #[fail(display = "road {} does not border junction {}", road_id, junction_id)]
    RoadNotAtJunction { junction_id: JunctionId, road_id: RoadId },
    #[fail(display = "signal {} does not face lane {}", signal, lane_id)]
    SignalNotFacingLane { signal: String, lane_id: LaneId },
}
