//! State transition log for controlled vehicles.
//!
//! Every state change driven by the control layer is recorded as a
//! transition event with the frame it happened on, the action that caused
//! it, and where the vehicle was. The log can be written out as JSON for
//! offline analysis.

use std::collections::HashMap;
use std::io;

use crate::road::coords::{Vec3, WorldCoord};
use crate::sim::{Frame, VehicleId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Driving,
    LaneChanging,
    Following,
    Stopping,
    Stopped,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::Driving => "driving",
            StateKind::LaneChanging => "lane_changing",
            StateKind::Following => "following",
            StateKind::Stopping => "stopping",
            StateKind::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Accelerate,
    Brake,
    LaneChangeLeft,
    LaneChangeRight,
    CutIn,
    Follow,
    Stop,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Accelerate => "accelerate",
            ControlAction::Brake => "brake",
            ControlAction::LaneChangeLeft => "lane_change_left",
            ControlAction::LaneChangeRight => "lane_change_right",
            ControlAction::CutIn => "cut_in",
            ControlAction::Follow => "follow",
            ControlAction::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StampEvent {
    pub frame: Frame,
    pub vehicle: VehicleId,
    pub from_state: StateKind,
    pub to_state: StateKind,
    pub control_action: Option<ControlAction>,
    pub location: Option<WorldCoord>,
    pub velocity: Option<Vec3>,
}

#[derive(Debug, Default)]
pub struct StampLog {
    events: Vec<StampEvent>,
    states: HashMap<VehicleId, StateKind>,
}

impl StampLog {
    pub fn new() -> StampLog {
        StampLog {
            events: Vec::new(),
            states: HashMap::new(),
        }
    }

    /// Record a transition into `to_state`. The previous state comes from
    /// the last recorded transition of the same vehicle, `Idle` for a
    /// vehicle never seen before.
    pub fn record(
        &mut self,
        frame: Frame,
        vehicle: VehicleId,
        to_state: StateKind,
        control_action: Option<ControlAction>,
        location: Option<WorldCoord>,
        velocity: Option<Vec3>,
    ) {
        let from_state = *self.states.get(&vehicle).unwrap_or(&StateKind::Idle);
        self.events.push(StampEvent {
            frame,
            vehicle,
            from_state,
            to_state,
            control_action,
            location,
            velocity,
        });
        self.states.insert(vehicle, to_state);
    }

    pub fn vehicle_state(&self, vehicle: VehicleId) -> StateKind {
        *self.states.get(&vehicle).unwrap_or(&StateKind::Idle)
    }

    pub fn events(&self) -> &[StampEvent] {
        &self.events
    }

    pub fn events_for(&self, vehicle: VehicleId) -> Vec<&StampEvent> {
        self.events.iter().filter(|e| e.vehicle == vehicle).collect()
    }
}

/// Write the log as a JSON document with a `transitions` array and a final
/// `states` map.
pub fn write_json<W: io::Write>(log: &StampLog, f: &mut W) -> io::Result<()> {
    write!(f, "{{\n  \"transitions\": [")?;
    for (i, ev) in log.events().iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(
            f,
            "\n    {{ \"frame\": {}, \"vehicle\": {}, \"from\": \"{}\", \"to\": \"{}\"",
            ev.frame,
            ev.vehicle,
            ev.from_state.as_str(),
            ev.to_state.as_str()
        )?;
        match ev.control_action {
            Some(a) => write!(f, ", \"action\": \"{}\"", a.as_str())?,
            None => write!(f, ", \"action\": null")?,
        }
        match ev.location {
            Some(loc) => write!(
                f,
                ", \"location\": {{ \"x\": {:.3}, \"y\": {:.3}, \"z\": {:.3} }}",
                loc.x, loc.y, loc.z
            )?,
            None => write!(f, ", \"location\": null")?,
        }
        match ev.velocity {
            Some(v) => write!(
                f,
                ", \"velocity\": {{ \"x\": {:.3}, \"y\": {:.3}, \"z\": {:.3} }}",
                v.x, v.y, v.z
            )?,
            None => write!(f, ", \"velocity\": null")?,
        }
        write!(f, " }}")?;
    }
    write!(f, "\n  ],\n  \"states\": {{")?;
    let mut states: Vec<(VehicleId, StateKind)> =
        log.states.iter().map(|(&v, &s)| (v, s)).collect();
    states.sort_by_key(|&(v, _)| v);
    for (i, (vehicle, state)) in states.into_iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "\n    \"{}\": \"{}\"", vehicle, state.as_str())?;
    }
    write!(f, "\n  }}\n}}\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_transition_starts_from_idle() {
        let mut log = StampLog::new();
        log.record(1, 1, StateKind::Driving, Some(ControlAction::Accelerate), None, None);
        log.record(5, 1, StateKind::Stopped, Some(ControlAction::Brake), None, None);
        let events = log.events_for(1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from_state, StateKind::Idle);
        assert_eq!(events[1].from_state, StateKind::Driving);
        assert_eq!(log.vehicle_state(1), StateKind::Stopped);
        assert_eq!(log.vehicle_state(2), StateKind::Idle);
    }

    #[test]
    fn json_output_is_well_formed() {
        let mut log = StampLog::new();
        log.record(
            3,
            1,
            StateKind::Driving,
            None,
            Some(WorldCoord::new(1.0, 2.0, 0.5)),
            Some(Vec3::new(5.0, 0.0, 0.0)),
        );
        let mut buf = Vec::new();
        write_json(&log, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"transitions\""));
        assert!(text.contains("\"from\": \"idle\""));
        assert!(text.contains("\"to\": \"driving\""));
        assert!(text.contains("\"1\": \"driving\""));
        assert_eq!(text.matches('{').count(), text.matches('}').count());
    }
}
