// Resumable agent actions.
//
// An `Action` is a small state machine. Each scheduler tick the head action
// is taken off the queue and stepped exactly once; the returned `Step` says
// what happens next:
//
// - `Finished`: the action is done and is dropped.
// - `Again(next)`: `next` (usually the same action in a later stage) goes
//   back at the head and is stepped on the following tick.
// - `Then(group)`: the group is spliced at the head in order. Actions that
//   need a prerequisite (walk there first, then dig) return the
//   prerequisite followed by themselves.
//
// The action set is closed: idle, say, teleport, move-to, navigate, dig,
// build, plus `Functor` for one-off closures. Step state lives inside the
// variant, so an action carries its own progress through the queue.
//
// Actions never hold references into the bot; everything they touch comes
// in through `ActionContext` for the duration of one step.
//
// See also: `bot.rs` for the scheduler that drives `step`, `pathfinding.rs`
// for the route search behind `Navigate`, `outbound.rs` for the emitted
// messages.

use std::fmt;

use blockbot_protocol::ItemStack;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::bot::{Identity, Pose};
use crate::config::AgentConfig;
use crate::entity::Entities;
use crate::error::{ActionError, WorldError};
use crate::outbound::{DigStatus, Outbound};
use crate::pathfinding::find_path;
use crate::types::{BlockPos, Face, Vector};
use crate::world::World;

/// Times a dig will walk toward an out-of-reach block before giving up.
const MAX_APPROACHES: u32 = 3;

/// Everything an action may read or change during one step.
pub struct ActionContext<'a> {
    pub pose: &'a mut Pose,
    pub world: &'a mut World,
    pub entities: &'a Entities,
    pub out: &'a mut Outbound,
    pub config: &'a AgentConfig,
    pub identity: &'a Identity,
}

impl ActionContext<'_> {
    pub fn eye(&self) -> Vector {
        self.pose.eye(self.config.eye_height)
    }
}

/// Outcome of stepping an action once.
#[derive(Debug)]
pub enum Step {
    Finished,
    Again(Action),
    Then(Vec<Action>),
}

pub type StepResult = Result<Step, ActionError>;

type BoxedFunctor = Box<dyn FnOnce(&mut ActionContext<'_>) -> StepResult>;

pub enum Action {
    /// Do nothing for this many ticks.
    Idle { ticks: u32 },
    Say { message: String },
    /// Ask the server to move us to a player.
    Teleport { target: String },
    /// Walk in a straight line toward a point.
    MoveTo { goal: Vector },
    Navigate(Navigate),
    Dig(Dig),
    Build(Build),
    Functor(BoxedFunctor),
}

impl Action {
    pub fn idle(ticks: u32) -> Self {
        Action::Idle { ticks }
    }

    pub fn say(message: impl Into<String>) -> Self {
        Action::Say {
            message: message.into(),
        }
    }

    pub fn teleport(target: impl Into<String>) -> Self {
        Action::Teleport {
            target: target.into(),
        }
    }

    pub fn move_to(goal: Vector) -> Self {
        Action::MoveTo { goal }
    }

    pub fn navigate(goal: BlockPos, mode: NavMode) -> Self {
        Action::Navigate(Navigate {
            goal,
            mode,
            replans: 0,
        })
    }

    pub fn dig(pos: BlockPos) -> Self {
        Action::Dig(Dig {
            pos,
            stage: DigStage::Look,
            face: None,
            waited: 0,
            approaches: 0,
        })
    }

    pub fn build(pos: BlockPos, kind: u8) -> Self {
        Action::Build(Build {
            pos,
            kind,
            stage: BuildStage::Equip,
        })
    }

    pub fn functor(f: impl FnOnce(&mut ActionContext<'_>) -> StepResult + 'static) -> Self {
        Action::Functor(Box::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Idle { .. } => "idle",
            Action::Say { .. } => "say",
            Action::Teleport { .. } => "teleport",
            Action::MoveTo { .. } => "move-to",
            Action::Navigate(_) => "navigate",
            Action::Dig(_) => "dig",
            Action::Build(_) => "build",
            Action::Functor(_) => "functor",
        }
    }

    /// The point the agent should look at while this action runs, if any.
    pub fn focus(&self, eye_height: f64) -> Option<Vector> {
        match self {
            Action::MoveTo { goal } => Some(*goal + Vector::new(0.0, eye_height, 0.0)),
            Action::Navigate(nav) => Some(nav.goal.center()),
            Action::Dig(dig) => Some(match dig.face {
                Some(face) => dig.pos.corner() + face.anchor(),
                None => dig.pos.center(),
            }),
            Action::Build(build) => Some(build.pos.center()),
            Action::Idle { .. } | Action::Say { .. } | Action::Teleport { .. } => None,
            Action::Functor(_) => None,
        }
    }

    /// Advance by one tick.
    pub fn step(self, ctx: &mut ActionContext<'_>) -> StepResult {
        match self {
            Action::Idle { ticks } => {
                let ticks = ticks.saturating_sub(1);
                if ticks > 0 {
                    Ok(Step::Again(Action::Idle { ticks }))
                } else {
                    Ok(Step::Finished)
                }
            }
            Action::Say { message } => {
                ctx.out.chat(&message)?;
                Ok(Step::Finished)
            }
            Action::Teleport { target } => {
                ctx.out.teleport_request(&ctx.identity.username, &target)?;
                Ok(Step::Then(vec![Action::idle(ctx.config.settle_ticks)]))
            }
            Action::MoveTo { goal } => Ok(move_toward(ctx, goal)),
            Action::Navigate(nav) => nav.step(ctx),
            Action::Dig(dig) => dig.step(ctx),
            Action::Build(build) => build.step(ctx),
            Action::Functor(f) => f(ctx),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Idle { ticks } => f.debug_struct("Idle").field("ticks", ticks).finish(),
            Action::Say { message } => f.debug_struct("Say").field("message", message).finish(),
            Action::Teleport { target } => {
                f.debug_struct("Teleport").field("target", target).finish()
            }
            Action::MoveTo { goal } => f.debug_struct("MoveTo").field("goal", goal).finish(),
            Action::Navigate(nav) => fmt::Debug::fmt(nav, f),
            Action::Dig(dig) => fmt::Debug::fmt(dig, f),
            Action::Build(build) => fmt::Debug::fmt(build, f),
            Action::Functor(_) => f.write_str("Functor(..)"),
        }
    }
}

fn move_toward(ctx: &mut ActionContext<'_>, goal: Vector) -> Step {
    let delta = goal - ctx.pose.position;
    let step = ctx.config.walk_step;
    if delta.length() <= step {
        ctx.pose.translate(delta);
        Step::Finished
    } else {
        ctx.pose.translate(delta.normalize() * step);
        Step::Again(Action::MoveTo { goal })
    }
}

// ---------------------------------------------------------------------------
// Navigate
// ---------------------------------------------------------------------------

/// What counts as arriving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavMode {
    /// Stand in the goal cell.
    Exact,
    /// Stand anywhere next to the goal cell, close enough to touch it.
    Adjacent,
}

#[derive(Debug)]
pub struct Navigate {
    goal: BlockPos,
    mode: NavMode,
    replans: u32,
}

impl Navigate {
    pub fn goal(&self) -> BlockPos {
        self.goal
    }

    /// Cells that satisfy this navigation.
    pub fn goals(&self) -> SmallVec<[BlockPos; 16]> {
        let mut goals = SmallVec::new();
        match self.mode {
            NavMode::Exact => goals.push(self.goal),
            NavMode::Adjacent => {
                for dy in [0, -1, 1] {
                    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                        goals.push(self.goal.offset(dx, dy, dz));
                    }
                }
                goals.push(self.goal.up());
                goals.push(self.goal.offset(0, -2, 0));
            }
        }
        goals
    }

    fn step(mut self, ctx: &mut ActionContext<'_>) -> StepResult {
        let here = ctx.pose.position.to_cell();
        let goals = self.goals();
        if goals.contains(&here) {
            return Ok(Step::Finished);
        }
        if self.replans >= ctx.config.max_replans {
            warn!(goal = %self.goal, replans = self.replans, "giving up on navigation");
            return Ok(Step::Finished);
        }
        match find_path(&mut *ctx.world, here, &goals, ctx.config.max_path_radius) {
            Ok(Some(path)) => {
                self.replans += 1;
                debug!(from = %here, goal = %self.goal, steps = path.len(), "route found");
                let mut group: Vec<Action> = path
                    .iter()
                    .take(ctx.config.replan_interval.max(1))
                    .map(|cell| Action::move_to(cell.standing_point()))
                    .collect();
                group.push(Action::Navigate(self));
                Ok(Step::Then(group))
            }
            Ok(None) => {
                info!(from = %here, goal = %self.goal, "no route to goal");
                Ok(Step::Finished)
            }
            Err(WorldError::ChunkNotLoaded(pos)) => {
                warn!(goal = %self.goal, %pos, "navigation goal is in an unloaded chunk");
                Ok(Step::Finished)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Dig
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DigStage {
    Look,
    Start,
    Mining(u32),
    Destroy,
    Finish,
}

#[derive(Debug)]
pub struct Dig {
    pos: BlockPos,
    stage: DigStage,
    face: Option<Face>,
    /// Ticks spent waiting for the target's chunk.
    waited: u32,
    approaches: u32,
}

impl Dig {
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    fn again(self) -> StepResult {
        Ok(Step::Again(Action::Dig(self)))
    }

    fn step(mut self, ctx: &mut ActionContext<'_>) -> StepResult {
        match self.stage {
            DigStage::Look => {
                if ctx.eye().distance(self.pos.center()) <= ctx.config.reach {
                    self.stage = DigStage::Start;
                    return self.again();
                }
                if self.approaches >= MAX_APPROACHES {
                    warn!(target = %self.pos, "block stays out of reach; giving up");
                    return Ok(Step::Finished);
                }
                self.approaches += 1;
                let approach = Action::navigate(self.pos, NavMode::Adjacent);
                Ok(Step::Then(vec![approach, Action::Dig(self)]))
            }
            DigStage::Start => {
                let block = match ctx.world.get_block(self.pos) {
                    Ok(block) => block,
                    Err(WorldError::ChunkNotLoaded(_)) => {
                        self.waited += 1;
                        if self.waited > ctx.config.max_stuck_ticks {
                            warn!(target = %self.pos, "chunk never arrived; giving up dig");
                            return Ok(Step::Finished);
                        }
                        return self.again();
                    }
                    Err(e) => return Err(e.into()),
                };
                if block.is_air() {
                    debug!(target = %self.pos, "nothing to dig");
                    return Ok(Step::Finished);
                }
                let eye = ctx.eye();
                self.face = Some(choose_face(ctx.world, &block, eye));
                let ticks = block.dig_ticks(ctx.config.dig_tick_rate);
                debug!(
                    target = %self.pos,
                    block = block.name(),
                    ticks,
                    measured = block.mining_time_is_measured(),
                    "digging"
                );
                ctx.out.held_item(0, block.preferred_tool() as i16)?;
                ctx.out.dig(DigStatus::Started, self.pos, self.face)?;
                self.stage = if ticks == 0 {
                    DigStage::Destroy
                } else {
                    DigStage::Mining(ticks)
                };
                self.again()
            }
            DigStage::Mining(remaining) => {
                ctx.out.dig(DigStatus::Digging, self.pos, self.face)?;
                let remaining = remaining - 1;
                self.stage = if remaining == 0 {
                    DigStage::Destroy
                } else {
                    DigStage::Mining(remaining)
                };
                self.again()
            }
            DigStage::Destroy => {
                ctx.out.dig(DigStatus::Broken, self.pos, self.face)?;
                ctx.out.held_item(0, 0)?;
                self.stage = DigStage::Finish;
                self.again()
            }
            DigStage::Finish => {
                ctx.out.dig(DigStatus::Stopped, self.pos, self.face)?;
                Ok(Step::Finished)
            }
        }
    }
}

/// The nearest face the eye can see. Failing that, the nearest face whose
/// neighbouring cell is open, and the nearest face overall if every side is
/// covered.
fn choose_face(world: &mut World, block: &Block, eye: Vector) -> Face {
    let faces = block.faces(eye);
    let mut exposed = None;
    for (face, anchor) in faces {
        let open = world
            .get_block(face.neighbor_of(block.pos))
            .is_ok_and(|b| !b.is_solid());
        if !open {
            continue;
        }
        if world.has_line_of_sight(eye, anchor, block.pos) {
            return face;
        }
        exposed.get_or_insert(face);
    }
    exposed.unwrap_or(faces[0].0)
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuildStage {
    Equip,
    Place,
}

#[derive(Debug)]
pub struct Build {
    pos: BlockPos,
    kind: u8,
    stage: BuildStage,
}

impl Build {
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    fn step(mut self, ctx: &mut ActionContext<'_>) -> StepResult {
        match self.stage {
            BuildStage::Equip => {
                ctx.out.held_item(0, i16::from(self.kind))?;
                ctx.out.arm_animation(ctx.identity.entity_id, true)?;
                self.stage = BuildStage::Place;
                Ok(Step::Again(Action::Build(self)))
            }
            BuildStage::Place => {
                if ctx.world.get_block(self.pos).is_ok_and(|b| b.is_solid()) {
                    debug!(target = %self.pos, "cell already filled");
                    return Ok(Step::Finished);
                }
                let (against, face) = support_for(ctx.world, self.pos);
                let item = ItemStack {
                    id: i16::from(self.kind),
                    count: 1,
                    damage: 0,
                };
                ctx.out.place(Some(item), against, Some(face))?;
                Ok(Step::Finished)
            }
        }
    }
}

/// A solid neighbour of `pos` to click, with the face of it that touches
/// `pos`. Falls back to the top of the cell below.
fn support_for(world: &mut World, pos: BlockPos) -> (BlockPos, Face) {
    Face::ALL
        .into_iter()
        .map(|face| (face.neighbor_of(pos), face.opposite()))
        .find(|(neighbor, _)| world.get_block(*neighbor).is_ok_and(|b| b.is_solid()))
        .unwrap_or((pos.down(), Face::Top))
}
