//! Frame scheduler and simulation context.
//!
//! The context owns the world backend, the road network, the vehicle
//! registry and the transition log, and drives everything from a single
//! synchronous loop: step the world, run the tick callback, then evaluate
//! triggers in registration order.

use failure::err_msg;
use std::cell::Cell;
use std::io;
use std::rc::Rc;

use crate::output::stamp::{ControlAction, StampLog, StateKind};
use crate::road::coords::{LaneCoord, Transform, Vec3, WorldCoord};
use crate::road::network::RoadNetwork;
use crate::road::spawn::SpawnPlanner;
use crate::AppResult;

use super::registry::{VehicleConfig, VehicleRegistry};
use super::triggers::Predicate;
use super::world::{ActorId, World};
use super::{ControlError, Frame, VehicleId};

/// Callback run when a trigger fires. May mutate the context freely.
pub type Action<W> = Box<dyn FnMut(&mut SimulationContext<W>) -> AppResult<()>>;

/// Per-frame callback, run after the world steps and before triggers.
pub type TickCallback<W> = Box<dyn FnMut(&mut SimulationContext<W>, Frame) -> AppResult<()>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

struct Trigger<W: World> {
    name: String,
    predicate: Predicate<W>,
    action: Action<W>,
    one_shot: bool,
}

pub struct SimulationContext<W: World> {
    pub world: W,
    pub network: RoadNetwork,
    pub vehicles: VehicleRegistry,
    pub log: StampLog,
    frame: Frame,
    state: RunState,
    stop_flag: Rc<Cell<bool>>,
    // Slots so a trigger can be taken out while its action runs against
    // a mutable context. One-shot triggers are not put back.
    triggers: Vec<Option<Trigger<W>>>,
    on_tick: Option<TickCallback<W>>,
}

impl<W: World> SimulationContext<W> {
    pub fn new(world: W, network: RoadNetwork) -> SimulationContext<W> {
        SimulationContext {
            world,
            network,
            vehicles: VehicleRegistry::new(),
            log: StampLog::new(),
            frame: 0,
            state: RunState::Idle,
            stop_flag: Rc::new(Cell::new(false)),
            triggers: Vec::new(),
            on_tick: None,
        }
    }

    pub fn current_frame(&self) -> Frame {
        self.frame
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Shared flag that stops the loop at the end of the current frame.
    pub fn stop_handle(&self) -> Rc<Cell<bool>> {
        self.stop_flag.clone()
    }

    pub fn set_on_tick(&mut self, callback: TickCallback<W>) {
        self.on_tick = Some(callback);
    }

    /// Register a trigger that fires its action on every frame its
    /// predicate holds.
    pub fn register_trigger(&mut self, name: &str, predicate: Predicate<W>, action: Action<W>) {
        self.push_trigger(name, predicate, action, false);
    }

    /// Register a trigger that is removed after it fires once.
    pub fn register_one_shot(&mut self, name: &str, predicate: Predicate<W>, action: Action<W>) {
        self.push_trigger(name, predicate, action, true);
    }

    fn push_trigger(&mut self, name: &str, predicate: Predicate<W>, action: Action<W>, one_shot: bool) {
        debug!("registering trigger '{}' (one_shot: {})", name, one_shot);
        self.triggers.push(Some(Trigger {
            name: name.to_string(),
            predicate,
            action,
            one_shot,
        }));
    }

    /// Number of live triggers.
    pub fn trigger_count(&self) -> usize {
        self.triggers.iter().filter(|t| t.is_some()).count()
    }

    pub fn vehicle_position(&self, vehicle: VehicleId) -> Option<WorldCoord> {
        self.vehicles
            .actor(vehicle)
            .ok()
            .and_then(|a| self.world.actor_transform(a))
            .map(|t| t.position)
    }

    pub fn vehicle_transform(&self, vehicle: VehicleId) -> Result<Transform, ControlError> {
        let actor = self.vehicles.actor(vehicle)?;
        self.world
            .actor_transform(actor)
            .ok_or(ControlError::UnknownVehicle(vehicle))
    }

    pub fn vehicle_velocity(&self, vehicle: VehicleId) -> Result<Vec3, ControlError> {
        let actor = self.vehicles.actor(vehicle)?;
        self.world
            .actor_velocity(actor)
            .ok_or(ControlError::UnknownVehicle(vehicle))
    }

    pub fn vehicle_speed(&self, vehicle: VehicleId) -> Result<f64, ControlError> {
        Ok(self.vehicle_velocity(vehicle)?.magnitude())
    }

    /// Spawn a backend actor and register it for control. The initial state
    /// transition is logged.
    pub fn spawn_vehicle(
        &mut self,
        blueprint: &str,
        at: &Transform,
        config: VehicleConfig,
    ) -> AppResult<(ActorId, VehicleId)> {
        let actor = self.world.spawn_actor(blueprint, at)?;
        let vehicle = self.vehicles.register_vehicle(actor, config);
        info!("spawned '{}' as vehicle {} (actor {})", blueprint, vehicle, actor);
        self.log
            .record(self.frame, vehicle, StateKind::Idle, None, Some(at.position), None);
        Ok((actor, vehicle))
    }

    /// Spawn on a lane, deriving the transform from the road network.
    pub fn spawn_vehicle_from_lane(
        &mut self,
        blueprint: &str,
        lane: &LaneCoord,
        config: VehicleConfig,
    ) -> AppResult<(ActorId, VehicleId)> {
        let at = SpawnPlanner::new(&self.network).get_spawn_transform_from_lane(lane)?;
        self.spawn_vehicle(blueprint, &at, config)
    }

    /// Remove a vehicle and its backend actor. Returns false when the
    /// handle is unknown, without failing.
    pub fn destroy_vehicle(&mut self, vehicle: VehicleId) -> bool {
        match self.vehicles.forget(vehicle) {
            Some(actor) => {
                info!("destroying vehicle {} (actor {})", vehicle, actor);
                self.world.destroy_actor(actor)
            }
            None => false,
        }
    }

    /// Run the frame loop until `total_frames` frames have elapsed, the
    /// stop flag is raised, or a callback fails. The context enters
    /// `Stopped` in all cases and cannot be restarted.
    pub fn run_simulation(&mut self, total_frames: Frame) -> AppResult<()> {
        if self.state == RunState::Stopped {
            return Err(err_msg("simulation already stopped"));
        }
        self.state = RunState::Running;
        info!("running simulation for {} frames", total_frames);
        while self.frame < total_frames && !self.stop_flag.get() {
            if let Err(e) = self.tick() {
                self.state = RunState::Stopped;
                return Err(e);
            }
        }
        self.state = RunState::Stopped;
        Ok(())
    }

    fn tick(&mut self) -> AppResult<()> {
        self.world.advance_by_one_fixed_step()?;
        self.frame += 1;

        if let Some(mut callback) = self.on_tick.take() {
            let frame = self.frame;
            let result = callback(&mut *self, frame);
            if self.on_tick.is_none() {
                self.on_tick = Some(callback);
            }
            result?;
        }

        // Evaluate only the triggers present at frame start; actions may
        // register new triggers, which begin on the next frame.
        let evaluated = self.triggers.len();
        for i in 0..evaluated {
            if let Some(mut trigger) = self.triggers[i].take() {
                let fired = (trigger.predicate)(&*self);
                if !fired {
                    self.triggers[i] = Some(trigger);
                    continue;
                }
                debug!("trigger '{}' fired at frame {}", trigger.name, self.frame);
                let result = (trigger.action)(&mut *self);
                if !trigger.one_shot {
                    self.triggers[i] = Some(trigger);
                }
                result?;
            }
        }
        self.triggers.retain(|t| t.is_some());
        Ok(())
    }

    /// Tear down vehicles marked for automatic destruction and write the
    /// transition log.
    pub fn finalize<Out: io::Write>(&mut self, out: &mut Out) -> AppResult<()> {
        for (vehicle, actor) in self.vehicles.drain_auto_destroy() {
            info!("finalize: destroying vehicle {} (actor {})", vehicle, actor);
            self.world.destroy_actor(actor);
        }
        crate::output::stamp::write_json(&self.log, out)?;
        Ok(())
    }
}

impl<W: World> SimulationContext<W> {
    /// Record a control-layer transition for a vehicle, stamping the current
    /// frame and whatever position and velocity the world reports.
    pub(crate) fn log_transition(
        &mut self,
        frame: Frame,
        vehicle: VehicleId,
        to_state: StateKind,
        action: Option<ControlAction>,
    ) {
        let location = self.vehicle_position(vehicle);
        let velocity = self
            .vehicles
            .actor(vehicle)
            .ok()
            .and_then(|a| self.world.actor_velocity(a));
        self.log.record(frame, vehicle, to_state, action, location, velocity);
    }
}
