//! Scripted maneuvers for controlled vehicles.
//!
//! Behaviors validate feasibility against the road network, adjust the
//! vehicle's control configuration for the traffic layer to act on, and
//! record the state transitions in the stamp log. Each returns a
//! `ManeuverResult` summarizing what was set up.

use std::collections::HashMap;

use crate::output::stamp::{ControlAction, StateKind};
use crate::road::coords::{LaneCoord, WorldCoord};
use crate::road::transform::CoordinateTransformer;
use crate::road::LaneId;

use super::clock::SimulationContext;
use super::world::World;
use super::{ControlError, Direction, Frame, VehicleId};

/// Nominal cruise speed corresponding to 100% speed, m/s (about 50 km/h).
const BASE_SPEED_MPS: f64 = 13.9;

/// Frames a cut-in maneuver is expected to take.
const CUT_IN_FRAMES: Frame = 150;

#[derive(Debug, Clone)]
pub struct ManeuverResult {
    pub success: bool,
    pub message: String,
    pub metrics: HashMap<String, f64>,
    pub start_frame: Frame,
    pub end_frame: Frame,
    pub start_location: WorldCoord,
    pub end_location: WorldCoord,
}

impl<W: World> SimulationContext<W> {
    /// Locate a vehicle on the lane network.
    fn vehicle_lane(&self, vehicle: VehicleId) -> Result<LaneCoord, ControlError> {
        let at = self.vehicle_transform(vehicle)?;
        CoordinateTransformer::new(&self.network)
            .world_to_lane(&at.position)
            .map_err(|e| ControlError::ManeuverInfeasible(format!("not on a mapped lane: {}", e)))
    }

    /// The lane id one lane over in the vehicle's own frame, validated to
    /// exist at the vehicle's position. Crossing the center line is refused.
    fn adjacent_lane(&self, lc: &LaneCoord, direction: Direction) -> Result<LaneId, ControlError> {
        // Left in the vehicle frame is always toward the center line, for
        // both lane signs, because positive lanes drive the other way.
        let delta: LaneId = match direction {
            Direction::Left => -1,
            Direction::Right => 1,
        };
        let magnitude = lc.lane_id.abs() + delta;
        if magnitude < 1 {
            return Err(ControlError::ManeuverInfeasible(
                "lane change would cross the center line".to_string(),
            ));
        }
        let target = lc.lane_id.signum() * magnitude;
        self.network
            .get_lane(lc.road_id, target, lc.s)
            .map_err(|_| {
                ControlError::ManeuverInfeasible(format!(
                    "no lane {} on road {} at s={:.1}",
                    target, lc.road_id, lc.s
                ))
            })?;
        Ok(target)
    }

    /// Force a lane change over the given number of frames. Disables the
    /// traffic layer's automatic lane changes for this vehicle.
    pub fn lane_change(
        &mut self,
        vehicle: VehicleId,
        direction: Direction,
        duration_frames: Frame,
    ) -> Result<ManeuverResult, ControlError> {
        let start_location = self.vehicle_transform(vehicle)?.position;
        let lc = self.vehicle_lane(vehicle)?;
        let target = self.adjacent_lane(&lc, direction)?;

        let start_frame = self.current_frame();
        {
            let config = self.vehicles.config_mut(vehicle)?;
            config.auto_lane_change = false;
            config.force_lane_change = Some(direction);
        }
        let action = match direction {
            Direction::Left => ControlAction::LaneChangeLeft,
            Direction::Right => ControlAction::LaneChangeRight,
        };
        self.log_transition(start_frame, vehicle, StateKind::LaneChanging, Some(action));

        let end_frame = start_frame + duration_frames;
        let end_location = self.vehicle_transform(vehicle)?.position;
        self.log_transition(end_frame, vehicle, StateKind::Driving, None);

        let mut metrics = HashMap::new();
        metrics.insert("duration_frames".to_string(), duration_frames as f64);
        metrics.insert("from_lane".to_string(), lc.lane_id as f64);
        metrics.insert("to_lane".to_string(), target as f64);
        Ok(ManeuverResult {
            success: true,
            message: format!("lane change {:?} from lane {} to lane {}", direction, lc.lane_id, target),
            metrics,
            start_frame,
            end_frame,
            start_location,
            end_location,
        })
    }

    /// Cut in ahead of another vehicle: change into its lane with a speed
    /// boost and a reduced gap.
    pub fn cut_in(
        &mut self,
        vehicle: VehicleId,
        target_vehicle: VehicleId,
        gap_distance: f64,
        speed_boost: f64,
    ) -> Result<ManeuverResult, ControlError> {
        let own = self.vehicle_transform(vehicle)?;
        let other = self.vehicle_transform(target_vehicle)?;

        // Which side the target is on decides the cut direction.
        let (lx, ly) = own.left();
        let dx = other.position.x - own.position.x;
        let dy = other.position.y - own.position.y;
        let direction = if dx * lx + dy * ly >= 0.0 { Direction::Left } else { Direction::Right };

        let lc = self.vehicle_lane(vehicle)?;
        self.adjacent_lane(&lc, direction)?;

        let start_frame = self.current_frame();
        {
            let config = self.vehicles.config_mut(vehicle)?;
            config.speed_percentage = speed_boost;
            config.distance_to_leading = gap_distance;
            config.auto_lane_change = false;
            config.force_lane_change = Some(direction);
        }
        self.log_transition(start_frame, vehicle, StateKind::LaneChanging, Some(ControlAction::CutIn));
        let end_frame = start_frame + CUT_IN_FRAMES;
        self.log_transition(end_frame, vehicle, StateKind::Driving, None);

        let mut metrics = HashMap::new();
        metrics.insert("gap_distance".to_string(), gap_distance);
        metrics.insert("speed_boost".to_string(), speed_boost);
        metrics.insert("initial_gap".to_string(), own.position.distance(&other.position));
        Ok(ManeuverResult {
            success: true,
            message: format!("cut in {:?} ahead of vehicle {}", direction, target_vehicle),
            metrics,
            start_frame,
            end_frame,
            start_location: own.position,
            end_location: self.vehicle_transform(vehicle)?.position,
        })
    }

    /// Follow another vehicle at a fixed gap for a number of frames.
    pub fn follow(
        &mut self,
        vehicle: VehicleId,
        target_vehicle: VehicleId,
        distance: f64,
        duration_frames: Frame,
    ) -> Result<ManeuverResult, ControlError> {
        let start_location = self.vehicle_transform(vehicle)?.position;
        self.vehicle_transform(target_vehicle)?;

        let start_frame = self.current_frame();
        {
            let config = self.vehicles.config_mut(vehicle)?;
            config.distance_to_leading = distance;
        }
        self.log_transition(start_frame, vehicle, StateKind::Following, Some(ControlAction::Follow));
        let end_frame = start_frame + duration_frames;
        self.log_transition(end_frame, vehicle, StateKind::Driving, None);

        let mut metrics = HashMap::new();
        metrics.insert("distance".to_string(), distance);
        metrics.insert("duration_frames".to_string(), duration_frames as f64);
        Ok(ManeuverResult {
            success: true,
            message: format!("following vehicle {} at {:.1} m", target_vehicle, distance),
            metrics,
            start_frame,
            end_frame,
            start_location,
            end_location: self.vehicle_transform(vehicle)?.position,
        })
    }

    /// Bring a vehicle to a halt for a number of frames.
    pub fn stop(
        &mut self,
        vehicle: VehicleId,
        duration_frames: Frame,
    ) -> Result<ManeuverResult, ControlError> {
        let start_location = self.vehicle_transform(vehicle)?.position;
        let start_frame = self.current_frame();
        {
            let config = self.vehicles.config_mut(vehicle)?;
            config.speed_percentage = 0.0;
        }
        self.log_transition(start_frame, vehicle, StateKind::Stopping, Some(ControlAction::Brake));
        let end_frame = start_frame + duration_frames;
        self.log_transition(end_frame, vehicle, StateKind::Stopped, Some(ControlAction::Stop));

        let mut metrics = HashMap::new();
        metrics.insert("duration_frames".to_string(), duration_frames as f64);
        Ok(ManeuverResult {
            success: true,
            message: format!("stopping for {} frames", duration_frames),
            metrics,
            start_frame,
            end_frame,
            start_location,
            end_location: self.vehicle_transform(vehicle)?.position,
        })
    }

    /// Pace a vehicle so it reaches a world position in a given time. The
    /// required speed is expressed to the traffic layer as a percentage of
    /// the nominal cruise speed, scaled by `speed_adjustment`.
    pub fn timed_approach(
        &mut self,
        vehicle: VehicleId,
        target: WorldCoord,
        target_time: f64,
        speed_adjustment: f64,
        ignore_traffic: bool,
    ) -> Result<ManeuverResult, ControlError> {
        if target_time <= 0.0 {
            return Err(ControlError::ManeuverInfeasible(
                "target time must be positive".to_string(),
            ));
        }
        let start_location = self.vehicle_transform(vehicle)?.position;
        let distance = start_location.distance(&target);
        let required_speed = distance / target_time;
        let percentage = required_speed / BASE_SPEED_MPS * 100.0 * speed_adjustment;

        let start_frame = self.current_frame();
        {
            let config = self.vehicles.config_mut(vehicle)?;
            config.speed_percentage = percentage;
            if ignore_traffic {
                config.ignore_lights = true;
                config.ignore_vehicles = true;
            }
        }
        self.log_transition(start_frame, vehicle, StateKind::Driving, Some(ControlAction::Accelerate));
        let estimated_frames = (target_time / self.world.fixed_timestep()).round() as Frame;
        let end_frame = start_frame + estimated_frames;
        self.log_transition(end_frame, vehicle, StateKind::Stopped, None);

        let mut metrics = HashMap::new();
        metrics.insert("distance".to_string(), distance);
        metrics.insert("required_speed".to_string(), required_speed);
        metrics.insert("speed_percentage".to_string(), percentage);
        Ok(ManeuverResult {
            success: true,
            message: format!("timed approach: {:.1} m in {:.1} s", distance, target_time),
            metrics,
            start_frame,
            end_frame,
            start_location,
            end_location: self.vehicle_transform(vehicle)?.position,
        })
    }
}
