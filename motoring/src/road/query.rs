//! Higher-level lookups on top of the network model: signals ahead of a
//! vehicle, junction entry and exit points, paths through junctions, and
//! stop line placement.

use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, VecDeque};

use super::coords::{normalize_angle, LaneCoord, RoadCoord, Transform, Vec3, WorldCoord};
use super::network::{
    ContactPoint, Junction, LinkTarget, Orientation, RoadNetwork, StopLine, TrafficSignal,
};
use super::spawn::SpawnPlanner;
use super::transform::CoordinateTransformer;
use super::{JunctionId, LaneId, RoadError, RoadId};

/// How far into a connecting road junction entry points are placed.
const ENTRY_MARGIN: f64 = 5.0;
/// How far past the junction exit points are placed on the outgoing road.
const EXIT_MARGIN: f64 = 10.0;

const MAX_WALK_LINKS: usize = 1024;

pub struct AdvancedQueries<'a> {
    net: &'a RoadNetwork,
    planner: SpawnPlanner<'a>,
    transformer: CoordinateTransformer<'a>,
}

impl<'a> AdvancedQueries<'a> {
    pub fn new(net: &'a RoadNetwork) -> AdvancedQueries<'a> {
        AdvancedQueries {
            net,
            planner: SpawnPlanner::new(net),
            transformer: CoordinateTransformer::new(net),
        }
    }

    pub fn traffic_signals(&self) -> &[TrafficSignal] {
        self.net.signals()
    }

    pub fn signals_on_road(&self, road_id: RoadId) -> Vec<&TrafficSignal> {
        self.net
            .signals()
            .iter()
            .filter(|sig| sig.road_id == road_id)
            .collect()
    }

    /// The first signal facing the vehicle within `max_distance` ahead along
    /// its lane, following links and unambiguous junction connections.
    pub fn nearest_signal_ahead(
        &self,
        start: &LaneCoord,
        max_distance: f64,
    ) -> Result<Option<TrafficSignal>, RoadError> {
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
        let mut sense: f64 = if lane_id < 0 { 1.0 } else { -1.0 };
        let mut travelled = 0.0;

        for _ in 0..MAX_WALK_LINKS {
            let road = self.net.get_road(road_id)?;
            let facing = if sense > 0.0 { Orientation::Positive } else { Orientation::Negative };
            let mut best: Option<(f64, &TrafficSignal)> = None;
            for sig in self
                .net
                .signals()
                .iter()
                .filter(|sig| sig.road_id == road_id && sig.orientation == facing)
            {
                let ahead = if sense > 0.0 { sig.s - s } else { s - sig.s };
                if ahead >= -1e-9 {
                    match best {
                        Some((d, _)) if d <= ahead => {}
                        _ => best = Some((ahead, sig)),
                    }
                }
            }
            if let Some((d, sig)) = best {
                if travelled + d <= max_distance {
                    return Ok(Some(sig.clone()));
                }
                return Ok(None);
            }

            let room = if sense > 0.0 { road.length - s } else { s };
            travelled += room;
            if travelled > max_distance {
                return Ok(None);
            }
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
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Spawn transform a given distance before a signal, against the travel
    /// direction of the lanes it faces.
    pub fn get_spawn_before_signal(
        &self,
        signal: &TrafficSignal,
        lane_id: LaneId,
        distance_before: f64,
    ) -> Result<Transform, RoadError> {
        let governed = match signal.orientation {
            Orientation::Positive => lane_id < 0,
            Orientation::Negative => lane_id > 0,
        };
        if !governed {
            return Err(RoadError::SignalNotFacingLane {
                signal: signal.id.clone(),
                lane_id,
            });
        }
        let road = self.net.get_road(signal.road_id)?;
        let s = match signal.orientation {
            Orientation::Positive => (signal.s - distance_before).max(0.0),
            Orientation::Negative => (signal.s + distance_before).min(road.length),
        };
        self.planner
            .get_spawn_transform_from_lane(&LaneCoord::new(signal.road_id, lane_id, s))
    }

    /// World transform of a signal itself, yawed toward the traffic it
    /// governs.
    pub fn get_signal_transform(&self, signal: &TrafficSignal) -> Result<Transform, RoadError> {
        let road = self.net.get_road(signal.road_id)?;
        let pos = self
            .transformer
            .road_to_world(&RoadCoord::new(signal.road_id, signal.s, signal.t))?;
        let (_, _, hdg) = road.eval_centerline(signal.s);
        let yaw = match signal.orientation {
            Orientation::Positive => hdg,
            Orientation::Negative => normalize_angle(hdg + std::f64::consts::PI),
        };
        Ok(Transform::new(pos, yaw))
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.net.junctions()
    }

    /// The junction a road belongs to, if it is a connecting road.
    pub fn junction_of_road(&self, road_id: RoadId) -> Result<Option<&Junction>, RoadError> {
        let road = self.net.get_road(road_id)?;
        match road.junction {
            Some(id) => Ok(Some(self.net.get_junction(id)?)),
            None => Ok(None),
        }
    }

    /// Transforms just inside the junction on each connecting lane reachable
    /// from `incoming_road_id`.
    pub fn junction_entry_points(
        &self,
        junction_id: JunctionId,
        incoming_road_id: RoadId,
    ) -> Result<Vec<Transform>, RoadError> {
        let junction = self.net.get_junction(junction_id)?;
        let mut points = Vec::new();
        for conn in junction
            .connections
            .iter()
            .filter(|c| c.incoming_road == incoming_road_id)
        {
            let road = self.net.get_road(conn.connecting_road)?;
            let margin = ENTRY_MARGIN.min(road.length / 2.0);
            let s = match conn.contact {
                ContactPoint::Start => margin,
                ContactPoint::End => road.length - margin,
            };
            for &(_, to) in &conn.lane_links {
                points.push(
                    self.planner
                        .get_spawn_transform_from_lane(&LaneCoord::new(conn.connecting_road, to, s))?,
                );
            }
        }
        Ok(points)
    }

    /// Transforms just past the junction on each lane of the outgoing road.
    /// The road end bordering the junction is found from its links; either
    /// end may be the boundary.
    pub fn junction_exit_points(
        &self,
        junction_id: JunctionId,
        outgoing_road_id: RoadId,
    ) -> Result<Vec<Transform>, RoadError> {
        self.net.get_junction(junction_id)?;
        let road = self.net.get_road(outgoing_road_id)?;
        let borders = |target: Option<LinkTarget>| {
            matches!(target, Some(LinkTarget::Junction { id }) if id == junction_id)
        };
        let margin = EXIT_MARGIN.min(road.length / 2.0);
        let s = if borders(road.link.predecessor) {
            margin
        } else if borders(road.link.successor) {
            road.length - margin
        } else {
            return Err(RoadError::RoadNotAtJunction {
                junction_id,
                road_id: outgoing_road_id,
            });
        };
        let mut points = Vec::new();
        for lane_id in self.net.get_available_lanes(outgoing_road_id, s)? {
            points.push(
                self.planner
                    .get_spawn_transform_from_lane(&LaneCoord::new(outgoing_road_id, lane_id, s))?,
            );
        }
        Ok(points)
    }

    /// Road id sequence from `incoming` to `outgoing` through a junction,
    /// breadth-first over its connections. `Ok(None)` when no path exists.
    pub fn find_path_through_junction(
        &self,
        junction_id: JunctionId,
        incoming: RoadId,
        outgoing: RoadId,
    ) -> Result<Option<Vec<RoadId>>, RoadError> {
        let junction = self.net.get_junction(junction_id)?;

        let mut graph = DiGraphMap::<RoadId, ()>::new();
        for conn in &junction.connections {
            graph.add_edge(conn.incoming_road, conn.connecting_road, ());
            // The far end of a connecting road leads out of the junction.
            let road = self.net.get_road(conn.connecting_road)?;
            let far = match conn.contact {
                ContactPoint::Start => road.link.successor,
                ContactPoint::End => road.link.predecessor,
            };
            if let Some(LinkTarget::Road { id, .. }) = far {
                graph.add_edge(conn.connecting_road, id, ());
            }
        }

        if !graph.contains_node(incoming) || !graph.contains_node(outgoing) {
            return Ok(None);
        }

        let mut parents: HashMap<RoadId, RoadId> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(incoming);
        while let Some(node) = queue.pop_front() {
            if node == outgoing {
                let mut path = vec![outgoing];
                let mut cur = outgoing;
                while let Some(&p) = parents.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Ok(Some(path));
            }
            let mut next: Vec<RoadId> = graph.neighbors(node).collect();
            next.sort();
            for n in next {
                if n != incoming && !parents.contains_key(&n) {
                    parents.insert(n, node);
                    queue.push_back(n);
                }
            }
        }
        Ok(None)
    }

    /// Approximate center of a junction: the mean of the midpoints of its
    /// first few connecting roads, yawed along the nearest lane.
    pub fn get_junction_center_transform(
        &self,
        junction_id: JunctionId,
    ) -> Result<Transform, RoadError> {
        let junction = self.net.get_junction(junction_id)?;
        let mut sum = Vec3::zero();
        let mut count = 0;
        for conn in junction.connections.iter().take(3) {
            let road = self.net.get_road(conn.connecting_road)?;
            let s = road.length / 2.0;
            let lane_id = match self
                .net
                .get_available_lanes(conn.connecting_road, s)?
                .into_iter()
                .next()
            {
                Some(id) => id,
                None => continue,
            };
            let w = self
                .transformer
                .lane_to_world(&LaneCoord::new(conn.connecting_road, lane_id, s))?;
            sum.x += w.x;
            sum.y += w.y;
            sum.z += w.z;
            count += 1;
        }
        if count == 0 {
            return Err(RoadError::NoProjection);
        }
        let n = count as f64;
        let center = WorldCoord::new(sum.x / n, sum.y / n, sum.z / n);
        let lc = self.transformer.world_to_lane(&center)?;
        let yaw = self.transformer.lane_heading(lc.road_id, lc.lane_id, lc.s)?;
        Ok(Transform::new(center, yaw))
    }

    pub fn stop_lines(&self) -> &[StopLine] {
        self.net.stop_lines()
    }

    pub fn stop_lines_on_road(&self, road_id: RoadId) -> Vec<&StopLine> {
        self.net
            .stop_lines()
            .iter()
            .filter(|line| line.road_id == road_id)
            .collect()
    }

    /// Spawn transform a given distance before a stop line, in the travel
    /// direction of its lane.
    pub fn get_spawn_at_stop_line(
        &self,
        line: &StopLine,
        offset_before: f64,
    ) -> Result<Transform, RoadError> {
        let road = self.net.get_road(line.road_id)?;
        let s = if line.lane_id < 0 {
            (line.s - offset_before).max(0.0)
        } else {
            (line.s + offset_before).min(road.length)
        };
        self.planner
            .get_spawn_transform_from_lane(&LaneCoord::new(line.road_id, line.lane_id, s))
    }

    /// World transform on the stop line itself, at its lane's center.
    pub fn get_stop_line_transform(&self, line: &StopLine) -> Result<Transform, RoadError> {
        self.planner
            .get_spawn_transform_from_lane(&LaneCoord::new(line.road_id, line.lane_id, line.s))
    }
}
