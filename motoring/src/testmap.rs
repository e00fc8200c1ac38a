//! Hand-built networks and a scripted world backend for tests.

use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::road::coords::{Transform, Vec3};
use crate::road::network::{
    Connection, ContactPoint, Geometry, GeometryKind, Junction, Lane, LaneSection, LinkTarget,
    ModelError, Orientation, Road, RoadLink, RoadNetwork, TrafficSignal, WidthRecord,
};
use crate::road::{LaneId, RoadId};
use crate::sim::world::{ActorId, World, WorldError};

fn fixed_width(width: f64) -> Vec<WidthRecord> {
    vec![WidthRecord { s_offset: 0.0, a: width, b: 0.0, c: 0.0, d: 0.0 }]
}

fn lane(id: LaneId, lane_type: &str, width: f64) -> Lane {
    Lane {
        id,
        lane_type: lane_type.to_string(),
        widths: if id == 0 { Vec::new() } else { fixed_width(width) },
    }
}

fn section(s_start: f64, lanes: Vec<Lane>) -> LaneSection {
    let mut map = BTreeMap::new();
    for l in lanes {
        map.insert(l.id, l);
    }
    LaneSection { s_start, lanes: map }
}

/// A straight road along +x starting at `(x0, y0)`.
fn straight(id: RoadId, x0: f64, y0: f64, length: f64, lane_ids: &[LaneId]) -> Road {
    let lanes = lane_ids
        .iter()
        .map(|&l| lane(l, "driving", 3.5))
        .chain(std::iter::once(lane(0, "none", 0.0)))
        .collect();
    Road {
        id,
        name: format!("road{}", id),
        length,
        junction: None,
        link: RoadLink::default(),
        plan_view: vec![Geometry {
            s: 0.0,
            x: x0,
            y: y0,
            hdg: 0.0,
            length,
            kind: GeometryKind::Line,
        }],
        elevation: Vec::new(),
        sections: vec![section(0.0, lanes)],
    }
}

/// Road 10: 100 m straight with driving lanes 1, -1 and -2 (3.5 m each).
pub fn straight_road() -> RoadNetwork {
    let road = straight(10, 0.0, 0.0, 100.0, &[1, -1, -2]);
    RoadNetwork::assemble(vec![road], vec![], vec![]).unwrap()
}

/// Road 5: quarter circle of radius 50 m with lanes 1 and -1.
pub fn curved_road() -> RoadNetwork {
    let length = 25.0 * std::f64::consts::PI;
    let lanes = vec![lane(1, "driving", 3.5), lane(0, "none", 0.0), lane(-1, "driving", 3.5)];
    let road = Road {
        id: 5,
        name: "curve".to_string(),
        length,
        junction: None,
        link: RoadLink::default(),
        plan_view: vec![Geometry {
            s: 0.0,
            x: 0.0,
            y: 0.0,
            hdg: 0.0,
            length,
            kind: GeometryKind::Arc { curvature: 1.0 / 50.0 },
        }],
        elevation: Vec::new(),
        sections: vec![section(0.0, lanes)],
    };
    RoadNetwork::assemble(vec![road], vec![], vec![]).unwrap()
}

/// Road 40: 100 m straight with two lane sections. Lanes 1, -1 and -2 up
/// to s=60; from there lane -2 ends and lane -1 widens to 4.0 m.
pub fn two_section_road() -> RoadNetwork {
    let first = section(
        0.0,
        vec![
            lane(1, "driving", 3.5),
            lane(0, "none", 0.0),
            lane(-1, "driving", 3.5),
            lane(-2, "driving", 3.5),
        ],
    );
    let second = section(
        60.0,
        vec![lane(1, "driving", 3.5), lane(0, "none", 0.0), lane(-1, "driving", 4.0)],
    );
    let road = Road {
        id: 40,
        name: "two-section".to_string(),
        length: 100.0,
        junction: None,
        link: RoadLink::default(),
        plan_view: vec![Geometry {
            s: 0.0,
            x: 0.0,
            y: 0.0,
            hdg: 0.0,
            length: 100.0,
            kind: GeometryKind::Line,
        }],
        elevation: Vec::new(),
        sections: vec![first, second],
    };
    RoadNetwork::assemble(vec![road], vec![], vec![]).unwrap()
}

/// Roads 1 (100 m) and 2 (50 m) joined end to start, lanes 1 and -1.
pub fn two_road_chain() -> RoadNetwork {
    let mut a = straight(1, 0.0, 0.0, 100.0, &[1, -1]);
    let mut b = straight(2, 100.0, 0.0, 50.0, &[1, -1]);
    a.link.successor = Some(LinkTarget::Road { id: 2, contact: ContactPoint::Start });
    b.link.predecessor = Some(LinkTarget::Road { id: 1, contact: ContactPoint::End });
    RoadNetwork::assemble(vec![a, b], vec![], vec![]).unwrap()
}

/// Road 10 into junction 1 via connecting road 20, out on road 30.
pub fn junction_map() -> RoadNetwork {
    let mut incoming = straight(10, 0.0, 0.0, 100.0, &[1, -1]);
    let mut connecting = straight(20, 100.0, 0.0, 30.0, &[-1]);
    let mut outgoing = straight(30, 130.0, 0.0, 100.0, &[1, -1]);

    incoming.link.successor = Some(LinkTarget::Junction { id: 1 });
    connecting.junction = Some(1);
    connecting.link.predecessor = Some(LinkTarget::Road { id: 10, contact: ContactPoint::End });
    connecting.link.successor = Some(LinkTarget::Road { id: 30, contact: ContactPoint::Start });
    outgoing.link.predecessor = Some(LinkTarget::Junction { id: 1 });

    let mut lane_links = SmallVec::new();
    lane_links.push((-1, -1));
    let junction = Junction {
        id: 1,
        name: "junction1".to_string(),
        connections: vec![Connection {
            id: 0,
            incoming_road: 10,
            connecting_road: 20,
            contact: ContactPoint::Start,
            lane_links,
        }],
    };
    RoadNetwork::assemble(vec![incoming, connecting, outgoing], vec![junction], vec![]).unwrap()
}

/// Like `junction_map` but road 30 is laid out in reverse: it starts at
/// x=230 heading back toward the junction, so its End is the junction
/// boundary at x=130 and its successor link points into the junction.
pub fn junction_map_reversed() -> RoadNetwork {
    let mut incoming = straight(10, 0.0, 0.0, 100.0, &[1, -1]);
    let mut connecting = straight(20, 100.0, 0.0, 30.0, &[-1]);
    let mut outgoing = straight(30, 0.0, 0.0, 100.0, &[1, -1]);
    outgoing.plan_view[0].x = 230.0;
    outgoing.plan_view[0].hdg = std::f64::consts::PI;

    incoming.link.successor = Some(LinkTarget::Junction { id: 1 });
    connecting.junction = Some(1);
    connecting.link.predecessor = Some(LinkTarget::Road { id: 10, contact: ContactPoint::End });
    connecting.link.successor = Some(LinkTarget::Road { id: 30, contact: ContactPoint::End });
    outgoing.link.successor = Some(LinkTarget::Junction { id: 1 });

    let mut lane_links = SmallVec::new();
    lane_links.push((-1, -1));
    let junction = Junction {
        id: 1,
        name: "junction1".to_string(),
        connections: vec![Connection {
            id: 0,
            incoming_road: 10,
            connecting_road: 20,
            contact: ContactPoint::Start,
            lane_links,
        }],
    };
    RoadNetwork::assemble(vec![incoming, connecting, outgoing], vec![junction], vec![]).unwrap()
}

/// Like `junction_map` but the junction references a road that does not
/// exist, for validation tests.
pub fn broken_junction_map() -> Result<RoadNetwork, ModelError> {
    let road = straight(10, 0.0, 0.0, 100.0, &[-1]);
    let mut lane_links = SmallVec::new();
    lane_links.push((-1, -1));
    let junction = Junction {
        id: 1,
        name: "junction1".to_string(),
        connections: vec![Connection {
            id: 0,
            incoming_road: 10,
            connecting_road: 77,
            contact: ContactPoint::Start,
            lane_links,
        }],
    };
    RoadNetwork::assemble(vec![road], vec![junction], vec![])
}

/// `straight_road` plus signal "sig1" at s=80 facing positive traffic.
pub fn signal_road() -> RoadNetwork {
    let road = straight(10, 0.0, 0.0, 100.0, &[1, -1, -2]);
    let signal = TrafficSignal {
        id: "sig1".to_string(),
        road_id: 10,
        s: 80.0,
        t: -8.0,
        orientation: Orientation::Positive,
        signal_type: "1000001".to_string(),
        subtype: "".to_string(),
        dynamic: true,
    };
    RoadNetwork::assemble(vec![road], vec![], vec![signal]).unwrap()
}

#[derive(Debug)]
struct ScriptedActor {
    transform: Transform,
    velocity: Vec3,
}

/// Deterministic in-memory world: actors sit where they were spawned and
/// integrate their scripted velocity each step.
#[derive(Debug)]
pub struct ScriptedWorld {
    dt: f64,
    actors: BTreeMap<ActorId, ScriptedActor>,
    next: ActorId,
    pub steps: u64,
    /// When set, stepping fails once this many steps have run.
    pub fail_after: Option<u64>,
}

impl ScriptedWorld {
    pub fn new(dt: f64) -> ScriptedWorld {
        ScriptedWorld {
            dt,
            actors: BTreeMap::new(),
            next: 1,
            steps: 0,
            fail_after: None,
        }
    }

    pub fn set_velocity(&mut self, actor: ActorId, velocity: Vec3) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.velocity = velocity;
        }
    }

    pub fn place(&mut self, actor: ActorId, at: Transform) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.transform = at;
        }
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }
}

impl World for ScriptedWorld {
    fn advance_by_one_fixed_step(&mut self) -> Result<(), WorldError> {
        if let Some(limit) = self.fail_after {
            if self.steps >= limit {
                return Err(WorldError::StepFailed("scripted failure".to_string()));
            }
        }
        for actor in self.actors.values_mut() {
            actor.transform.position.x += actor.velocity.x * self.dt;
            actor.transform.position.y += actor.velocity.y * self.dt;
            actor.transform.position.z += actor.velocity.z * self.dt;
        }
        self.steps += 1;
        Ok(())
    }

    fn fixed_timestep(&self) -> f64 {
        self.dt
    }

    fn spawn_actor(&mut self, _blueprint: &str, at: &Transform) -> Result<ActorId, WorldError> {
        let id = self.next;
        self.next += 1;
        self.actors.insert(
            id,
            ScriptedActor { transform: *at, velocity: Vec3::zero() },
        );
        Ok(id)
    }

    fn destroy_actor(&mut self, actor: ActorId) -> bool {
        self.actors.remove(&actor).is_some()
    }

    fn actor_transform(&self, actor: ActorId) -> Option<Transform> {
        self.actors.get(&actor).map(|a| a.transform)
    }

    fn actor_velocity(&self, actor: ActorId) -> Option<Vec3> {
        self.actors.get(&actor).map(|a| a.velocity)
    }
}
