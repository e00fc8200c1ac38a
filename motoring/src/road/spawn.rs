//! Spawn transform computation: placing actors on lanes, at distances along
//! lane topology, and relative to existing actors.

use super::coords::{LaneCoord, RoadCoord, Transform, WorldCoord};
use super::network::{ContactPoint, RoadNetwork};
use super::transform::CoordinateTransformer;
use super::{LaneId, RoadError, RoadId};

/// Vertical clearance added to spawn positions so actors drop onto the road
/// surface instead of intersecting it.
pub const DEFAULT_Z_OFFSET: f64 = 0.5;

/// Margin kept from junction boundaries when picking safe spawn points.
const JUNCTION_MARGIN: f64 = 10.0;

/// Bound on link traversals per walk, against degenerate loops of
/// zero-length roads.
const MAX_WALK_LINKS: usize = 1024;

pub struct SpawnPlanner<'a> {
    net: &'a RoadNetwork,
    transformer: CoordinateTransformer<'a>,
    z_offset: f64,
}

impl<'a> SpawnPlanner<'a> {
    pub fn new(net: &'a RoadNetwork) -> SpawnPlanner<'a> {
        SpawnPlanner {
            net,
            transformer: CoordinateTransformer::new(net),
            z_offset: DEFAULT_Z_OFFSET,
        }
    }

    pub fn with_z_offset(net: &'a RoadNetwork, z_offset: f64) -> SpawnPlanner<'a> {
        SpawnPlanner {
            net,
            transformer: CoordinateTransformer::new(net),
            z_offset,
        }
    }

    /// World transform for a lane position, oriented along the lane's travel
    /// direction and lifted by the configured z offset.
    pub fn get_spawn_transform_from_lane(&self, lc: &LaneCoord) -> Result<Transform, RoadError> {
        self.net.get_lane(lc.road_id, lc.lane_id, lc.s)?;
        let pos = self.transformer.lane_to_world(lc)?;
        let yaw = self.transformer.lane_heading(lc.road_id, lc.lane_id, lc.s)?;
        Ok(Transform {
            position: WorldCoord { z: pos.z + self.z_offset, ..pos },
            yaw,
        })
    }

    /// World transform for a road position, oriented along the travel
    /// direction of the laterally nearest lane.
    pub fn get_spawn_transform_from_road(&self, rc: &RoadCoord) -> Result<Transform, RoadError> {
        let pos = self.transformer.road_to_world(rc)?;
        let lc = self.transformer.road_to_nearest_lane(rc)?;
        let yaw = self.transformer.lane_heading(lc.road_id, lc.lane_id, lc.s)?;
        Ok(Transform {
            position: WorldCoord { z: pos.z + self.z_offset, ..pos },
            yaw,
        })
    }

    /// Spawn transform near an arbitrary world position: the point is
    /// projected onto the nearest lane and the transform sits on that lane's
    /// center.
    pub fn find_spawn_point_near_location(&self, w: &WorldCoord) -> Result<Transform, RoadError> {
        let lc = self.transformer.world_to_lane(w)?;
        self.get_spawn_transform_from_lane(&LaneCoord::new(lc.road_id, lc.lane_id, lc.s))
    }

    /// Follow the lane topology `distance` meters from `start` in the lane's
    /// travel direction (negative distance walks backward), crossing road
    /// links and unambiguous junction connections.
    pub fn walk_along_lane(&self, start: &LaneCoord, distance: f64) -> Result<LaneCoord, RoadError> {
        if start.lane_id == 0 {
            return Err(RoadError::LaneNotFound {
                road_id: start.road_id,
                lane_id: 0,
                s: start.s,
            });
        }
        self.net.get_lane(start.road_id, start.lane_id, start.s)?;

        let mut road_id = start.road_id;
        let mut lane_id = start.lane_id;
        let mut s = start.s;
        // Negative lanes travel in increasing s, positive lanes in
        // decreasing s. A negative distance reverses that.
        let mut sense: f64 = if lane_id < 0 { 1.0 } else { -1.0 };
        if distance < 0.0 {
            sense = -sense;
        }

        let requested = distance.abs();
        let mut left = requested;
        for _ in 0..MAX_WALK_LINKS {
            let length = self.net.get_road(road_id)?.length;
            let room = if sense > 0.0 { length - s } else { s };
            if left <= room + 1e-9 {
                s = (s + sense * left).max(0.0).min(length);
                return Ok(LaneCoord {
                    road_id,
                    lane_id,
                    s,
                    offset: start.offset,
                });
            }
            left -= room;
            let exit = if sense > 0.0 { ContactPoint::End } else { ContactPoint::Start };
            match self.net.continuation(road_id, lane_id, exit)? {
                Some(entry) => {
                    road_id = entry.road_id;
                    lane_id = entry.lane_id;
                    match entry.contact {
                        ContactPoint::Start => {
                            s = 0.0;
                            sense = 1.0;
                        }
                        ContactPoint::End => {
                            s = self.net.get_road(road_id)?.length;
                            sense = -1.0;
                        }
                    }
                }
                None => {
                    return Err(RoadError::EndOfRoadNetwork {
                        requested,
                        covered: requested - left,
                    });
                }
            }
        }
        Err(RoadError::EndOfRoadNetwork {
            requested,
            covered: requested - left,
        })
    }

    pub fn get_spawn_transform_at_distance(
        &self,
        start: &LaneCoord,
        distance: f64,
    ) -> Result<Transform, RoadError> {
        let lc = self.walk_along_lane(start, distance)?;
        self.get_spawn_transform_from_lane(&lc)
    }

    /// Evenly spaced transforms along a lane, starting at `start`.
    pub fn get_spawn_points_along_lane(
        &self,
        start: &LaneCoord,
        num_points: usize,
        spacing: f64,
    ) -> Result<Vec<Transform>, RoadError> {
        let mut points = Vec::with_capacity(num_points);
        for i in 0..num_points {
            let lc = self.walk_along_lane(start, i as f64 * spacing)?;
            points.push(self.get_spawn_transform_from_lane(&lc)?);
        }
        Ok(points)
    }

    /// A transform on a connecting road inside a junction, at a fractional
    /// progress (0 = start of the connecting road, 1 = its end). The entry
    /// and exit roads are validated against the junction topology.
    pub fn get_spawn_transform_at_junction(
        &self,
        junction_road_id: RoadId,
        entry_road_id: RoadId,
        exit_road_id: RoadId,
        progress: f64,
    ) -> Result<Transform, RoadError> {
        let road = self.net.get_road(junction_road_id)?;
        let junction_id = road
            .junction
            .ok_or(RoadError::NotAJunctionRoad(junction_road_id))?;
        let junction = self.net.get_junction(junction_id)?;

        let enters = junction
            .connections
            .iter()
            .any(|c| c.incoming_road == entry_road_id && c.connecting_road == junction_road_id);
        if !enters {
            return Err(RoadError::NoJunctionPath {
                junction_id,
                incoming: entry_road_id,
                outgoing: exit_road_id,
            });
        }
        let exits = match (road.link.successor, road.link.predecessor) {
            (Some(super::network::LinkTarget::Road { id, .. }), _) if id == exit_road_id => true,
            (_, Some(super::network::LinkTarget::Road { id, .. })) if id == exit_road_id => true,
            _ => false,
        };
        if !exits {
            return Err(RoadError::NoJunctionPath {
                junction_id,
                incoming: entry_road_id,
                outgoing: exit_road_id,
            });
        }

        let s = road.length * progress.max(0.0).min(1.0);
        let lane_id = self
            .net
            .get_available_lanes(junction_road_id, s)?
            .into_iter()
            .next()
            .ok_or(RoadError::LaneNotFound {
                road_id: junction_road_id,
                lane_id: 0,
                s,
            })?;
        self.get_spawn_transform_from_lane(&LaneCoord::new(junction_road_id, lane_id, s))
    }

    /// Spawn points along a lane with at least `min_spacing` between them,
    /// keeping clear of junction boundaries. Roads inside a junction yield
    /// no points.
    pub fn get_safe_spawn_points(
        &self,
        road_id: RoadId,
        lane_id: LaneId,
        min_spacing: f64,
    ) -> Result<Vec<Transform>, RoadError> {
        let road = self.net.get_road(road_id)?;
        if road.junction.is_some() {
            return Ok(Vec::new());
        }
        let starts_at_junction = matches!(
            road.link.predecessor,
            Some(super::network::LinkTarget::Junction { .. })
        );
        let ends_at_junction = matches!(
            road.link.successor,
            Some(super::network::LinkTarget::Junction { .. })
        );
        let from = if starts_at_junction { JUNCTION_MARGIN } else { 0.0 };
        let to = road.length - if ends_at_junction { JUNCTION_MARGIN } else { 0.0 };

        let mut points = Vec::new();
        let mut s = from;
        while s <= to + 1e-9 {
            let lc = LaneCoord::new(road_id, lane_id, s.min(road.length));
            match self.net.get_lane(road_id, lane_id, lc.s) {
                Ok(_) => points.push(self.get_spawn_transform_from_lane(&lc)?),
                // Lane may be absent from some sections, skip those stretches.
                Err(RoadError::LaneNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            s += min_spacing;
        }
        Ok(points)
    }
}

/// A transform displaced from a reference: `forward_distance` along the
/// reference heading, `lateral_offset` to its left, `z_offset` up. The
/// heading is preserved.
pub fn calculate_relative_spawn(
    reference: &Transform,
    forward_distance: f64,
    lateral_offset: f64,
    z_offset: f64,
) -> Transform {
    let (fx, fy) = reference.forward();
    let (lx, ly) = reference.left();
    Transform {
        position: WorldCoord {
            x: reference.position.x + fx * forward_distance + lx * lateral_offset,
            y: reference.position.y + fy * forward_distance + ly * lateral_offset,
            z: reference.position.z + z_offset,
        },
        yaw: reference.yaw,
    }
}
