//! Bookkeeping of controlled vehicles.
//!
//! The registry maps opaque vehicle handles to backend actors plus the
//! per-vehicle control configuration the traffic layer consumes. Handles
//! stay valid until the vehicle is forgotten and are never reused.

use std::collections::BTreeMap;

use super::world::ActorId;
use super::{ControlError, Direction, VehicleId};

/// Control knobs for one vehicle. Behaviors express their effect by
/// adjusting these; the traffic layer applies them each step.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleConfig {
    pub auto_lane_change: bool,
    /// Desired gap to a leading vehicle, meters.
    pub distance_to_leading: f64,
    /// Target speed as a percentage of the road speed limit.
    pub speed_percentage: f64,
    pub ignore_lights: bool,
    pub ignore_vehicles: bool,
    /// Pending forced lane change, consumed by the traffic layer.
    pub force_lane_change: Option<Direction>,
    /// Destroy the backend actor when the simulation finishes.
    pub auto_destroy: bool,
}

impl Default for VehicleConfig {
    fn default() -> VehicleConfig {
        VehicleConfig {
            auto_lane_change: true,
            distance_to_leading: 2.5,
            speed_percentage: 100.0,
            ignore_lights: false,
            ignore_vehicles: false,
            force_lane_change: None,
            auto_destroy: true,
        }
    }
}

#[derive(Debug)]
struct VehicleEntry {
    actor: ActorId,
    config: VehicleConfig,
}

#[derive(Debug, Default)]
pub struct VehicleRegistry {
    vehicles: BTreeMap<VehicleId, VehicleEntry>,
    next: VehicleId,
}

impl VehicleRegistry {
    pub fn new() -> VehicleRegistry {
        VehicleRegistry {
            vehicles: BTreeMap::new(),
            next: 1,
        }
    }

    pub fn register_vehicle(&mut self, actor: ActorId, config: VehicleConfig) -> VehicleId {
        let id = self.next;
        self.next += 1;
        self.vehicles.insert(id, VehicleEntry { actor, config });
        id
    }

    pub fn actor(&self, id: VehicleId) -> Result<ActorId, ControlError> {
        self.vehicles
            .get(&id)
            .map(|e| e.actor)
            .ok_or(ControlError::UnknownVehicle(id))
    }

    pub fn config(&self, id: VehicleId) -> Result<&VehicleConfig, ControlError> {
        self.vehicles
            .get(&id)
            .map(|e| &e.config)
            .ok_or(ControlError::UnknownVehicle(id))
    }

    pub fn config_mut(&mut self, id: VehicleId) -> Result<&mut VehicleConfig, ControlError> {
        self.vehicles
            .get_mut(&id)
            .map(|e| &mut e.config)
            .ok_or(ControlError::UnknownVehicle(id))
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.contains_key(&id)
    }

    /// Drop a vehicle from the registry, returning its backend actor.
    pub fn forget(&mut self, id: VehicleId) -> Option<ActorId> {
        self.vehicles.remove(&id).map(|e| e.actor)
    }

    /// Handles in ascending registration order.
    pub fn all_vehicles(&self) -> Vec<VehicleId> {
        self.vehicles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Remove and return every vehicle marked for automatic teardown.
    pub fn drain_auto_destroy(&mut self) -> Vec<(VehicleId, ActorId)> {
        let doomed: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, e)| e.config.auto_destroy)
            .map(|(&id, _)| id)
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| self.forget(id).map(|actor| (id, actor)))
            .collect()
    }
}
