// The agent: pose, known world, and the action scheduler.
//
// `Bot` owns a flat queue of actions and runs exactly one action step per
// `tick()`. The head action is popped, the agent turns toward its focus
// point, the action is stepped, and whatever it hands back is spliced in at
// the head (see `action.rs` for the `Step` contract). A step that fails is
// logged and the failing action discarded; the rest of the queue is left
// untouched.
//
// Every tick, whether or not an action ran, the pose is normalized (stance
// clamped to the legal band above the feet, angles wrapped into [0, 360))
// and sent to the server. The server treats a silent client as gone, so the
// pose packet doubles as the heartbeat.
//
// `Bot` has no clock and no socket. The session loop in the client crate
// decides when to call `tick()` and supplies the packet sink.
//
// See also: `action.rs` for the actions, `world.rs` and `entity.rs` for the
// state the actions read, `outbound.rs` for the sink abstraction.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{trace, warn};

use crate::action::{Action, ActionContext, Step};
use crate::config::AgentConfig;
use crate::entity::Entities;
use crate::error::OutboundError;
use crate::outbound::{Outbound, PacketSink};
use crate::types::{Vector, wrap_degrees};
use crate::world::World;

/// Lowest legal stance above the feet.
pub const STANCE_MIN: f64 = 0.1;
/// Highest legal stance above the feet.
pub const STANCE_MAX: f64 = 1.65;

/// Where the agent is and where it is looking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pose {
    /// Feet position.
    pub position: Vector,
    /// Absolute height of the collision box top.
    pub stance: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub on_ground: bool,
}

impl Pose {
    /// Standing at `position`, looking along +Z.
    pub fn at(position: Vector) -> Self {
        Self {
            position,
            stance: position.y + 1.62,
            yaw: 0.0,
            pitch: 0.0,
            on_ground: true,
        }
    }

    /// Move feet and stance together.
    pub fn translate(&mut self, delta: Vector) {
        self.position += delta;
        self.stance += delta.y;
    }

    pub fn eye(&self, eye_height: f64) -> Vector {
        self.position + Vector::new(0.0, eye_height, 0.0)
    }

    /// Turn to look at `target` from the eye. Looking at the eye itself
    /// keeps the current heading.
    pub fn face(&mut self, target: Vector, eye_height: f64) {
        let direction = target - self.eye(eye_height);
        if direction.length() > 0.0 {
            (self.yaw, self.pitch) = direction.to_angles();
        }
    }

    pub fn normalize(&mut self) {
        let y = self.position.y;
        self.stance = self.stance.clamp(y + STANCE_MIN, y + STANCE_MAX);
        self.yaw = wrap_degrees(self.yaw);
        self.pitch = wrap_degrees(self.pitch);
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::at(Vector::ZERO)
    }
}

/// Who the agent is on the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    /// Assigned at login; 0 until then.
    pub entity_id: i32,
}

pub struct Bot {
    pub pose: Pose,
    pub world: World,
    pub entities: Entities,
    queue: VecDeque<Action>,
    out: Outbound,
    config: AgentConfig,
    identity: Identity,
    ticks: u64,
}

impl Bot {
    pub fn new(username: &str, config: AgentConfig, sink: impl PacketSink + 'static) -> Self {
        Self {
            pose: Pose::default(),
            world: World::new(config.allow_flight),
            entities: Entities::new(),
            queue: VecDeque::new(),
            out: Outbound::new(sink),
            config,
            identity: Identity {
                username: username.to_owned(),
                entity_id: 0,
            },
            ticks: 0,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn set_entity_id(&mut self, id: i32) {
        self.identity.entity_id = id;
    }

    /// Direct access to the outbound surface, for replies outside any action.
    pub fn outbound(&mut self) -> &mut Outbound {
        &mut self.out
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Names of the queued actions, head first.
    pub fn queued(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.queue.iter().map(Action::name)
    }

    pub fn enqueue_front(&mut self, action: Action) {
        self.queue.push_front(action);
    }

    /// Put `group` ahead of the current head, keeping the group's order.
    pub fn enqueue_front_group(&mut self, group: Vec<Action>) {
        for action in group.into_iter().rev() {
            self.queue.push_front(action);
        }
    }

    pub fn enqueue_back(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Run one scheduler tick. Only a failure to send the pose is returned;
    /// action failures are logged and absorbed.
    pub fn tick(&mut self) -> Result<(), OutboundError> {
        self.ticks += 1;
        if let Some(action) = self.queue.pop_front() {
            self.run_step(action);
        }
        self.pose.normalize();
        self.out.pose(&self.pose)
    }

    fn run_step(&mut self, action: Action) {
        if let Some(target) = action.focus(self.config.eye_height) {
            self.pose.face(target, self.config.eye_height);
        }
        let name = action.name();
        let mut ctx = ActionContext {
            pose: &mut self.pose,
            world: &mut self.world,
            entities: &self.entities,
            out: &mut self.out,
            config: &self.config,
            identity: &self.identity,
        };
        match action.step(&mut ctx) {
            Ok(Step::Finished) => trace!(tick = self.ticks, action = name, "finished"),
            Ok(Step::Again(next)) => self.queue.push_front(next),
            Ok(Step::Then(group)) => {
                trace!(tick = self.ticks, action = name, queued = group.len(), "splicing group");
                self.enqueue_front_group(group);
            }
            Err(e) => warn!(tick = self.ticks, action = name, error = %e, "action failed; discarding"),
        }
    }
}
