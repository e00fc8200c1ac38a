//! Conversions between world, road and lane coordinates.

use ordered_float::OrderedFloat;

use super::coords::{normalize_angle, LaneCoord, RoadCoord, WorldCoord};
use super::network::{Road, RoadNetwork};
use super::{LaneId, RoadError, RoadId};

/// Coarse sampling step for projecting a world position onto a reference
/// line, before refinement.
const PROJECTION_COARSE_STEP: f64 = 1.0;
const PROJECTION_REFINE_STEPS: &[f64] = &[0.25, 0.05, 0.01];

pub struct CoordinateTransformer<'a> {
    net: &'a RoadNetwork,
}

impl<'a> CoordinateTransformer<'a> {
    pub fn new(net: &'a RoadNetwork) -> CoordinateTransformer<'a> {
        CoordinateTransformer { net }
    }

    /// Project a world position onto the nearest road's reference line.
    /// Elevation is ignored: projection happens in the xy plane. Ties between
    /// roads go to the lower road id.
    pub fn world_to_road(&self, w: &WorldCoord) -> Result<RoadCoord, RoadError> {
        let mut best: Option<(f64, RoadId, f64)> = None;
        for road in self.net.roads() {
            let (s, d2) = project_onto_road(road, w);
            let better = match best {
                None => true,
                Some((best_d2, _, _)) => d2 < best_d2,
            };
            if better {
                best = Some((d2, road.id, s));
            }
        }
        let (_, road_id, s) = best.ok_or(RoadError::NoProjection)?;
        let road = self.net.get_road(road_id)?;
        let (cx, cy, hdg) = road.eval_centerline(s);
        let dx = w.x - cx;
        let dy = w.y - cy;
        let t = -dx * hdg.sin() + dy * hdg.cos();
        Ok(RoadCoord { road_id, s, t })
    }

    pub fn road_to_world(&self, rc: &RoadCoord) -> Result<WorldCoord, RoadError> {
        let road = self.net.get_road(rc.road_id)?;
        if rc.s < -1e-9 || rc.s > road.length + 1e-9 {
            return Err(RoadError::CoordinateOutOfRange {
                road_id: rc.road_id,
                s: rc.s,
                length: road.length,
            });
        }
        let (cx, cy, hdg) = road.eval_centerline(rc.s);
        Ok(WorldCoord {
            x: cx - rc.t * hdg.sin(),
            y: cy + rc.t * hdg.cos(),
            z: road.eval_elevation(rc.s),
        })
    }

    /// Project a world position onto the nearest road and resolve the lane
    /// whose center is laterally closest.
    pub fn world_to_lane(&self, w: &WorldCoord) -> Result<LaneCoord, RoadError> {
        self.road_to_nearest_lane(&self.world_to_road(w)?)
    }

    /// The lane on `rc`'s road whose center is laterally closest to `rc.t`.
    pub fn road_to_nearest_lane(&self, rc: &RoadCoord) -> Result<LaneCoord, RoadError> {
        let lanes = self.net.get_available_lanes(rc.road_id, rc.s)?;
        let lane_id = lanes
            .into_iter()
            .min_by_key(|&id| {
                let center = self
                    .net
                    .lane_center_offset(rc.road_id, id, rc.s)
                    .unwrap_or(std::f64::INFINITY);
                OrderedFloat((rc.t - center).abs())
            })
            .ok_or(RoadError::LaneNotFound {
                road_id: rc.road_id,
                lane_id: 0,
                s: rc.s,
            })?;
        let center = self.net.lane_center_offset(rc.road_id, lane_id, rc.s)?;
        Ok(LaneCoord {
            road_id: rc.road_id,
            lane_id,
            s: rc.s,
            offset: rc.t - center,
        })
    }

    pub fn lane_to_road(&self, lc: &LaneCoord) -> Result<RoadCoord, RoadError> {
        let center = self.net.lane_center_offset(lc.road_id, lc.lane_id, lc.s)?;
        Ok(RoadCoord {
            road_id: lc.road_id,
            s: lc.s,
            t: center + lc.offset,
        })
    }

    pub fn road_to_lane(&self, rc: &RoadCoord, lane_id: LaneId) -> Result<LaneCoord, RoadError> {
        let center = self.net.lane_center_offset(rc.road_id, lane_id, rc.s)?;
        Ok(LaneCoord {
            road_id: rc.road_id,
            lane_id,
            s: rc.s,
            offset: rc.t - center,
        })
    }

    pub fn lane_to_world(&self, lc: &LaneCoord) -> Result<WorldCoord, RoadError> {
        self.road_to_world(&self.lane_to_road(lc)?)
    }

    /// Heading of travel for a lane at `s`. Positive lanes travel against the
    /// reference direction, so their heading is rotated half a turn.
    pub fn lane_heading(&self, road_id: RoadId, lane_id: LaneId, s: f64) -> Result<f64, RoadError> {
        let road = self.net.get_road(road_id)?;
        if s < -1e-9 || s > road.length + 1e-9 {
            return Err(RoadError::CoordinateOutOfRange { road_id, s, length: road.length });
        }
        let (_, _, hdg) = road.eval_centerline(s);
        if lane_id > 0 {
            Ok(normalize_angle(hdg + std::f64::consts::PI))
        } else {
            Ok(hdg)
        }
    }

    /// Longitudinal distance between two positions on the same lane.
    pub fn calculate_distance_along_lane(&self, a: &LaneCoord, b: &LaneCoord) -> Result<f64, RoadError> {
        if a.road_id != b.road_id || a.lane_id != b.lane_id {
            return Err(RoadError::IncompatibleCoordinates);
        }
        self.net.get_lane(a.road_id, a.lane_id, a.s)?;
        self.net.get_lane(b.road_id, b.lane_id, b.s)?;
        Ok((b.s - a.s).abs())
    }

    /// Signed lateral distance from the center of `lc`'s lane to the center
    /// of `target_lane` at the same `s`.
    pub fn calculate_lateral_offset(&self, lc: &LaneCoord, target_lane: LaneId) -> Result<f64, RoadError> {
        let here = self.net.lane_center_offset(lc.road_id, lc.lane_id, lc.s)?;
        let there = self.net.lane_center_offset(lc.road_id, target_lane, lc.s)?;
        Ok(there - here)
    }
}

/// Find the `s` on `road`'s reference line closest to `w` in the xy plane.
/// Returns the arc length and the squared planar distance. Sampled coarsely
/// along the whole road, then refined around the best sample.
fn project_onto_road(road: &Road, w: &WorldCoord) -> (f64, f64) {
    let d2_at = |s: f64| {
        let (x, y, _) = road.eval_centerline(s);
        let dx = w.x - x;
        let dy = w.y - y;
        dx * dx + dy * dy
    };

    let mut best_s = 0.0;
    let mut best_d2 = d2_at(0.0);
    let mut s = PROJECTION_COARSE_STEP;
    while s < road.length {
        let d2 = d2_at(s);
        if d2 < best_d2 {
            best_d2 = d2;
            best_s = s;
        }
        s += PROJECTION_COARSE_STEP;
    }
    let d2 = d2_at(road.length);
    if d2 < best_d2 {
        best_d2 = d2;
        best_s = road.length;
    }

    let mut window = PROJECTION_COARSE_STEP;
    for &step in PROJECTION_REFINE_STEPS {
        let lo = (best_s - window).max(0.0);
        let hi = (best_s + window).min(road.length);
        let mut s = lo;
        while s <= hi {
            let d2 = d2_at(s);
            if d2 < best_d2 {
                best_d2 = d2;
                best_s = s;
            }
            s += step;
        }
        window = step;
    }

    (best_s, best_d2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::coords::LaneCoord;
    use crate::testmap;

    const EPS: f64 = 1e-3;

    #[test]
    fn lane_world_round_trip() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let lc = LaneCoord::new(10, -1, 42.0);
        let w = tr.lane_to_world(&lc).unwrap();
        let back = tr.world_to_lane(&w).unwrap();
        assert_eq!(back.road_id, lc.road_id);
        assert_eq!(back.lane_id, lc.lane_id);
        assert!((back.s - lc.s).abs() < EPS);
        assert!(back.offset.abs() < EPS);
    }

    #[test]
    fn round_trip_on_curved_road() {
        let net = testmap::curved_road();
        let tr = CoordinateTransformer::new(&net);
        let lc = LaneCoord::new(5, -1, 30.0);
        let w = tr.lane_to_world(&lc).unwrap();
        let back = tr.world_to_lane(&w).unwrap();
        assert_eq!(back.lane_id, -1);
        assert!((back.s - 30.0).abs() < EPS);
        assert!(back.offset.abs() < EPS);
    }

    #[test]
    fn round_trip_across_section_change() {
        let net = testmap::two_section_road();
        let tr = CoordinateTransformer::new(&net);
        // Past s=60 lane -1 is 4.0 m wide, center at t=-2.0.
        let lc = LaneCoord::new(40, -1, 70.0);
        let w = tr.lane_to_world(&lc).unwrap();
        assert!((w.y - (-2.0)).abs() < 1e-9);
        let back = tr.world_to_lane(&w).unwrap();
        assert_eq!(back.lane_id, -1);
        assert!((back.s - 70.0).abs() < EPS);
        assert!(back.offset.abs() < EPS);
    }

    #[test]
    fn lateral_offset_sign_convention() {
        // Straight road heading +x: left of travel (for lane -1, traveling
        // +s) is +y, which is positive t.
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let center = tr.lane_to_world(&LaneCoord::new(10, -1, 10.0)).unwrap();
        let left = WorldCoord::new(center.x, center.y + 0.5, center.z);
        let lc = tr.world_to_lane(&left).unwrap();
        assert_eq!(lc.lane_id, -1);
        assert!((lc.offset - 0.5).abs() < EPS);
    }

    #[test]
    fn world_to_lane_picks_nearest_lane_center() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        // t = -5.25 is the center of lane -2.
        let w = tr
            .road_to_world(&RoadCoord::new(10, 20.0, -5.25))
            .unwrap();
        let lc = tr.world_to_lane(&w).unwrap();
        assert_eq!(lc.lane_id, -2);
        assert!(lc.offset.abs() < EPS);
    }

    #[test]
    fn distance_along_lane_requires_same_lane() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let a = LaneCoord::new(10, -1, 10.0);
        let b = LaneCoord::new(10, -2, 30.0);
        assert_eq!(
            tr.calculate_distance_along_lane(&a, &b),
            Err(RoadError::IncompatibleCoordinates)
        );
        let c = LaneCoord::new(10, -1, 30.0);
        assert!((tr.calculate_distance_along_lane(&a, &c).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn lateral_offset_between_lanes() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let lc = LaneCoord::new(10, -1, 10.0);
        // From -1 (center -1.75) to -2 (center -5.25): 3.5 to the right.
        let off = tr.calculate_lateral_offset(&lc, -2).unwrap();
        assert!((off - (-3.5)).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_s_rejected() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let rc = RoadCoord::new(10, 150.0, 0.0);
        assert!(matches!(
            tr.road_to_world(&rc),
            Err(RoadError::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn heading_flips_for_left_lanes() {
        let net = testmap::straight_road();
        let tr = CoordinateTransformer::new(&net);
        let fwd = tr.lane_heading(10, -1, 10.0).unwrap();
        let rev = tr.lane_heading(10, 1, 10.0).unwrap();
        assert!(fwd.abs() < 1e-9);
        assert!((rev.abs() - std::f64::consts::PI).abs() < 1e-9);
    }
}
