//! Static road network model.
//!
//! The network is an immutable description of roads, lane sections, junctions
//! and signals. Geometry is evaluated lazily from the analytic records, there
//! is no tessellation step.

use smallvec::SmallVec;
use std::collections::BTreeMap;

use super::coords::normalize_angle;
use super::{JunctionId, LaneId, RoadError, RoadId};

const POSITION_EPSILON: f64 = 1e-9;

#[derive(Debug)]
pub struct RoadNetwork {
    roads: BTreeMap<RoadId, Road>,
    junctions: BTreeMap<JunctionId, Junction>,
    signals: Vec<TrafficSignal>,
    stop_lines: Vec<StopLine>,
}

#[derive(Debug)]
pub struct Road {
    pub id: RoadId,
    pub name: String,
    pub length: f64,
    /// Set when the road is a connecting road inside a junction.
    pub junction: Option<JunctionId>,
    pub link: RoadLink,
    pub plan_view: Vec<Geometry>,
    pub elevation: Vec<Elevation>,
    pub sections: Vec<LaneSection>,
}

#[derive(Debug, Copy, Clone)]
pub struct Geometry {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub hdg: f64,
    pub length: f64,
    pub kind: GeometryKind,
}

#[derive(Debug, Copy, Clone)]
pub enum GeometryKind {
    Line,
    Arc { curvature: f64 },
}

/// Cubic elevation record: z(ds) = a + b*ds + c*ds^2 + d*ds^3.
#[derive(Debug, Copy, Clone)]
pub struct Elevation {
    pub s: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

#[derive(Debug, Default)]
pub struct RoadLink {
    pub predecessor: Option<LinkTarget>,
    pub successor: Option<LinkTarget>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LinkTarget {
    Road { id: RoadId, contact: ContactPoint },
    Junction { id: JunctionId },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContactPoint {
    Start,
    End,
}

#[derive(Debug)]
pub struct LaneSection {
    pub s_start: f64,
    pub lanes: BTreeMap<LaneId, Lane>,
}

#[derive(Debug)]
pub struct Lane {
    pub id: LaneId,
    pub lane_type: String,
    pub widths: Vec<WidthRecord>,
}

/// Cubic width record: w(ds) = a + b*ds + c*ds^2 + d*ds^3, where ds is
/// measured from `s_offset` past the section start.
#[derive(Debug, Copy, Clone)]
pub struct WidthRecord {
    pub s_offset: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

#[derive(Debug, Clone)]
pub struct TrafficSignal {
    pub id: String,
    pub road_id: RoadId,
    pub s: f64,
    pub t: f64,
    pub orientation: Orientation,
    pub signal_type: String,
    pub subtype: String,
    pub dynamic: bool,
}

/// Which driving direction a signal faces. `Positive` signals face traffic
/// traveling in the direction of increasing `s` (right-hand lanes).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Orientation {
    Positive,
    Negative,
}

/// A stop position derived from a signal, placed on each driving lane the
/// signal governs, a fixed distance before the signal in travel direction.
#[derive(Debug, Clone)]
pub struct StopLine {
    pub road_id: RoadId,
    pub lane_id: LaneId,
    pub s: f64,
    pub width: f64,
    pub signal_id: String,
}

pub const STOP_LINE_SETBACK: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct Junction {
    pub id: JunctionId,
    pub name: String,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u32,
    pub incoming_road: RoadId,
    pub connecting_road: RoadId,
    pub contact: ContactPoint,
    pub lane_links: SmallVec<[(LaneId, LaneId); 2]>,
}

/// A lane reached by following a road link or junction connection, together
/// with the end of the new road the traversal enters at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LaneEntry {
    pub road_id: RoadId,
    pub lane_id: LaneId,
    pub contact: ContactPoint,
}

/// Structural problems detected while assembling a network.
#[derive(Debug, Fail, PartialEq)]
pub enum ModelError {
    #[fail(display = "duplicate road id {}", _0)]
    DuplicateRoad(RoadId),
    #[fail(display = "duplicate junction id {}", _0)]
    DuplicateJunction(JunctionId),
    #[fail(display = "junction {} references unknown road {}", junction, road)]
    UnknownJunctionRoad { junction: JunctionId, road: RoadId },
    #[fail(display = "signal {} references unknown road {}", signal, road)]
    UnknownSignalRoad { signal: String, road: RoadId },
    #[fail(display = "road {} has no lane sections", _0)]
    NoSections(RoadId),
    #[fail(display = "road {} has no plan view geometry", _0)]
    NoGeometry(RoadId),
    #[fail(display = "road {} lane sections do not cover [0, length): gap at s={}", road, s)]
    SectionGap { road: RoadId, s: f64 },
}

impl RoadNetwork {
    /// Build a network from parsed parts, validating cross references and
    /// section coverage, and deriving stop lines from signals.
    pub fn assemble(
        roads: Vec<Road>,
        junctions: Vec<Junction>,
        signals: Vec<TrafficSignal>,
    ) -> Result<RoadNetwork, ModelError> {
        let mut road_map = BTreeMap::new();
        for road in roads {
            if road.plan_view.is_empty() {
                return Err(ModelError::NoGeometry(road.id));
            }
            if road.sections.is_empty() {
                return Err(ModelError::NoSections(road.id));
            }
            if road.sections[0].s_start > POSITION_EPSILON {
                return Err(ModelError::SectionGap { road: road.id, s: 0.0 });
            }
            for w in road.sections.windows(2) {
                if w[1].s_start <= w[0].s_start {
                    return Err(ModelError::SectionGap { road: road.id, s: w[1].s_start });
                }
            }
            let id = road.id;
            if road_map.insert(id, road).is_some() {
                return Err(ModelError::DuplicateRoad(id));
            }
        }

        let mut junction_map = BTreeMap::new();
        for junction in junctions {
            for conn in &junction.connections {
                for &road in &[conn.incoming_road, conn.connecting_road] {
                    if !road_map.contains_key(&road) {
                        return Err(ModelError::UnknownJunctionRoad {
                            junction: junction.id,
                            road,
                        });
                    }
                }
            }
            let id = junction.id;
            if junction_map.insert(id, junction).is_some() {
                return Err(ModelError::DuplicateJunction(id));
            }
        }

        for sig in &signals {
            if !road_map.contains_key(&sig.road_id) {
                return Err(ModelError::UnknownSignalRoad {
                    signal: sig.id.clone(),
                    road: sig.road_id,
                });
            }
        }

        let mut net = RoadNetwork {
            roads: road_map,
            junctions: junction_map,
            signals,
            stop_lines: Vec::new(),
        };
        net.stop_lines = net.derive_stop_lines();
        Ok(net)
    }

    /// One stop line per driving lane a signal faces, set back from the
    /// signal position against the lane's travel direction.
    fn derive_stop_lines(&self) -> Vec<StopLine> {
        let mut lines = Vec::new();
        for sig in &self.signals {
            let road = match self.roads.get(&sig.road_id) {
                Some(r) => r,
                None => continue,
            };
            let s = match sig.orientation {
                Orientation::Positive => (sig.s - STOP_LINE_SETBACK).max(0.0),
                Orientation::Negative => (sig.s + STOP_LINE_SETBACK).min(road.length),
            };
            let section = match road.section_at(sig.s) {
                Some(sec) => sec,
                None => continue,
            };
            for lane in section.lanes.values() {
                let governed = match sig.orientation {
                    Orientation::Positive => lane.id < 0,
                    Orientation::Negative => lane.id > 0,
                };
                if !governed || lane.lane_type != "driving" {
                    continue;
                }
                let width = lane.width_at(sig.s - section.s_start);
                lines.push(StopLine {
                    road_id: sig.road_id,
                    lane_id: lane.id,
                    s,
                    width,
                    signal_id: sig.id.clone(),
                });
            }
        }
        lines
    }

    pub fn get_road(&self, id: RoadId) -> Result<&Road, RoadError> {
        self.roads.get(&id).ok_or(RoadError::RoadNotFound(id))
    }

    /// All roads in ascending id order.
    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    pub fn get_junction(&self, id: JunctionId) -> Result<&Junction, RoadError> {
        self.junctions.get(&id).ok_or(RoadError::JunctionNotFound(id))
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn signals(&self) -> &[TrafficSignal] {
        &self.signals
    }

    pub fn stop_lines(&self) -> &[StopLine] {
        &self.stop_lines
    }

    pub fn is_junction(&self, road_id: RoadId) -> Result<bool, RoadError> {
        Ok(self.get_road(road_id)?.junction.is_some())
    }

    pub fn get_lane_section(&self, road_id: RoadId, s: f64) -> Result<&LaneSection, RoadError> {
        let road = self.get_road(road_id)?;
        road.check_s(s)?;
        road.section_at(s).ok_or(RoadError::CoordinateOutOfRange {
            road_id,
            s,
            length: road.length,
        })
    }

    /// Lane ids available at a position, ascending, excluding the center lane.
    pub fn get_available_lanes(&self, road_id: RoadId, s: f64) -> Result<Vec<LaneId>, RoadError> {
        let section = self.get_lane_section(road_id, s)?;
        Ok(section.lanes.keys().cloned().filter(|&id| id != 0).collect())
    }

    pub fn get_lane(&self, road_id: RoadId, lane_id: LaneId, s: f64) -> Result<&Lane, RoadError> {
        let section = self.get_lane_section(road_id, s)?;
        section
            .lanes
            .get(&lane_id)
            .ok_or(RoadError::LaneNotFound { road_id, lane_id, s })
    }

    pub fn get_lane_width(&self, road_id: RoadId, lane_id: LaneId, s: f64) -> Result<f64, RoadError> {
        let section = self.get_lane_section(road_id, s)?;
        let lane = section
            .lanes
            .get(&lane_id)
            .ok_or(RoadError::LaneNotFound { road_id, lane_id, s })?;
        Ok(lane.width_at(s - section.s_start))
    }

    /// Signed lateral position of a lane's center relative to the reference
    /// line, summing the widths of all lanes between it and the center line.
    pub fn lane_center_offset(&self, road_id: RoadId, lane_id: LaneId, s: f64) -> Result<f64, RoadError> {
        if lane_id == 0 {
            return Err(RoadError::LaneNotFound { road_id, lane_id, s });
        }
        let sign = if lane_id > 0 { 1.0 } else { -1.0 };
        let mut t = 0.0;
        for k in 1..lane_id.abs() {
            let inner = lane_id.signum() * k;
            t += self.get_lane_width(road_id, inner, s)?;
        }
        t += 0.5 * self.get_lane_width(road_id, lane_id, s)?;
        Ok(sign * t)
    }

    /// The lane reached by leaving `road_id` in lane `lane_id` over the given
    /// road end. `Ok(None)` means the topology stops there: no link, a dead
    /// lane, or a junction that does not continue this lane unambiguously.
    pub fn continuation(
        &self,
        road_id: RoadId,
        lane_id: LaneId,
        exit: ContactPoint,
    ) -> Result<Option<LaneEntry>, RoadError> {
        let road = self.get_road(road_id)?;
        let link = match exit {
            ContactPoint::End => road.link.successor,
            ContactPoint::Start => road.link.predecessor,
        };
        match link {
            None => Ok(None),
            Some(LinkTarget::Road { id, contact }) => {
                let next = self.get_road(id)?;
                // When the two roads meet start-to-start or end-to-end their
                // reference frames are anti-aligned and lane signs flip.
                let next_lane = if contact == exit { -lane_id } else { lane_id };
                let entry_s = match contact {
                    ContactPoint::Start => 0.0,
                    ContactPoint::End => next.length,
                };
                let available = self.get_available_lanes(id, entry_s)?;
                if available.contains(&next_lane) {
                    Ok(Some(LaneEntry { road_id: id, lane_id: next_lane, contact }))
                } else {
                    debug!("lane {} of road {} has no counterpart on road {}", lane_id, road_id, id);
                    Ok(None)
                }
            }
            Some(LinkTarget::Junction { id }) => {
                let junction = self.get_junction(id)?;
                let mut entries = Vec::new();
                for conn in junction.connections.iter().filter(|c| c.incoming_road == road_id) {
                    if let Some(&(_, to)) = conn.lane_links.iter().find(|&&(from, _)| from == lane_id) {
                        entries.push(LaneEntry {
                            road_id: conn.connecting_road,
                            lane_id: to,
                            contact: conn.contact,
                        });
                    }
                }
                match entries.len() {
                    1 => Ok(Some(entries[0])),
                    0 => Ok(None),
                    n => {
                        debug!(
                            "junction {} continues lane {} of road {} {} ways, stopping",
                            id, lane_id, road_id, n
                        );
                        Ok(None)
                    }
                }
            }
        }
    }
}

impl Road {
    fn check_s(&self, s: f64) -> Result<(), RoadError> {
        if s < -POSITION_EPSILON || s > self.length + POSITION_EPSILON {
            return Err(RoadError::CoordinateOutOfRange {
                road_id: self.id,
                s,
                length: self.length,
            });
        }
        Ok(())
    }

    /// The lane section containing `s`. At a section boundary the later
    /// section wins; `s == length` selects the final section.
    pub fn section_at(&self, s: f64) -> Option<&LaneSection> {
        if s < -POSITION_EPSILON || s > self.length + POSITION_EPSILON {
            return None;
        }
        self.sections
            .iter()
            .rev()
            .find(|sec| sec.s_start <= s + POSITION_EPSILON)
    }

    /// Reference line position and heading at arc length `s`.
    pub fn eval_centerline(&self, s: f64) -> (f64, f64, f64) {
        let s = s.max(0.0).min(self.length);
        let geo = self
            .plan_view
            .iter()
            .rev()
            .find(|g| g.s <= s + POSITION_EPSILON)
            .unwrap_or(&self.plan_view[0]);
        let ds = (s - geo.s).max(0.0);
        match geo.kind {
            GeometryKind::Line => (
                geo.x + ds * geo.hdg.cos(),
                geo.y + ds * geo.hdg.sin(),
                geo.hdg,
            ),
            GeometryKind::Arc { curvature } if curvature.abs() < 1e-12 => (
                geo.x + ds * geo.hdg.cos(),
                geo.y + ds * geo.hdg.sin(),
                geo.hdg,
            ),
            GeometryKind::Arc { curvature } => {
                let hdg = geo.hdg + curvature * ds;
                let r = 1.0 / curvature;
                // Chord from the arc's start, center at 90 degrees left.
                let x = geo.x + r * (hdg.sin() - geo.hdg.sin());
                let y = geo.y - r * (hdg.cos() - geo.hdg.cos());
                (x, y, normalize_angle(hdg))
            }
        }
    }

    /// Elevation at arc length `s`; zero when no profile is given.
    pub fn eval_elevation(&self, s: f64) -> f64 {
        let s = s.max(0.0).min(self.length);
        let rec = match self.elevation.iter().rev().find(|e| e.s <= s + POSITION_EPSILON) {
            Some(rec) => rec,
            None => return 0.0,
        };
        let ds = s - rec.s;
        rec.a + rec.b * ds + rec.c * ds * ds + rec.d * ds * ds * ds
    }
}

impl Lane {
    /// Width at `ds` meters past the section start.
    pub fn width_at(&self, ds: f64) -> f64 {
        let rec = match self
            .widths
            .iter()
            .rev()
            .find(|w| w.s_offset <= ds + POSITION_EPSILON)
        {
            Some(rec) => rec,
            None => return 0.0,
        };
        let x = (ds - rec.s_offset).max(0.0);
        rec.a + rec.b * x + rec.c * x * x + rec.d * x * x * x
    }
}
