//! # HRVO Simulator
//!
//! Owns every agent on the field and advances them one fixed time step at a
//! time. Each control tick the caller:
//!
//! 1. `reconcile`s the population with the latest world snapshot,
//! 2. `apply_command`s the newest command set to the friendly agents,
//! 3. `step`s once and reads back the friendly velocities.
//!
//! ## Step Phases
//!
//! `step` runs three passes over the whole population, each finishing before
//! the next one starts:
//!
//! 1. **Radius**: every agent inflates its radius from its current speed.
//! 2. **Velocity**: every agent picks its next velocity. This pass only reads:
//!    results go into a buffer and are committed after every agent is done,
//!    so a neighbor's preferred velocity is always the one from the last tick.
//! 3. **Integrate**: every agent accelerates toward its chosen velocity and
//!    moves.
//!
//! The k-d tree is rebuilt from the positions before phase 1. Within a phase
//! agents are independent, so with the `parallel` feature each phase runs on
//! rayon; the result is identical to the sequential run.
//!
//! ## Agent Handles
//!
//! Agents live in a dense `Vec` (the order the k-d tree indexes) and are
//! addressed from outside by `AgentId`, which stays valid while the robot is
//! on the field and is never handed out twice.

use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::agent::{Agent, AgentKind, AgentLimits, AvoidanceParams, VelocityUpdate};
use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::kd_tree::KdTree;
use crate::path::{AgentPath, PathPoint};
use crate::structs::{
    CommandSet, KinematicState, MovePrimitive, Point, Primitive, RobotId, RobotObservation,
    TeamSide, Vector2D, WorldSnapshot,
};
use crate::visualization::HrvoVisualization;

/// Stable handle to an agent in a `Simulator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u64);

#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    time_step: f64,
    global_time: f64,
    agents: Vec<Agent>,
    ids: Vec<AgentId>,
    slots: HashMap<AgentId, usize>,
    next_id: u64,
    kd_tree: KdTree,
    commands: CommandSet,
    has_snapshot: bool,
}

impl Simulator {
    pub fn new(time_step: f64, config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;
        if !(time_step >= 0.0) {
            return Err(SimulatorError::InvalidConfig("time step must not be negative"));
        }

        Ok(Simulator {
            config,
            time_step,
            global_time: 0.0,
            agents: Vec::new(),
            ids: Vec::new(),
            slots: HashMap::new(),
            next_id: 0,
            kd_tree: KdTree::new(),
            commands: CommandSet::new(),
            has_snapshot: false,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Handles in population order.
    pub fn agent_ids(&self) -> &[AgentId] {
        &self.ids
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.slots.get(&id).map(|&slot| &self.agents[slot])
    }

    pub fn agent_for(&self, side: TeamSide, robot_id: RobotId) -> Option<AgentId> {
        self.slot_for(side, robot_id).map(|slot| self.ids[slot])
    }

    pub fn friendly_agent(&self, robot_id: RobotId) -> Option<AgentId> {
        self.agent_for(TeamSide::Friendly, robot_id)
    }

    pub fn position(&self, id: AgentId) -> Option<Point> {
        self.agent(id).map(Agent::position)
    }

    pub fn velocity(&self, id: AgentId) -> Option<Vector2D> {
        self.agent(id).map(Agent::velocity)
    }

    pub fn preferred_velocity(&self, id: AgentId) -> Option<Vector2D> {
        self.agent(id).map(Agent::preferred_velocity)
    }

    pub fn radius(&self, id: AgentId) -> Option<f64> {
        self.agent(id).map(Agent::radius)
    }

    pub fn max_accel(&self, id: AgentId) -> Option<f64> {
        self.agent(id).map(Agent::max_accel)
    }

    pub fn has_reached_goal(&self, id: AgentId) -> Option<bool> {
        self.agent(id).map(Agent::has_reached_goal)
    }

    /// Velocity of the friendly robot, zero if it is not simulated.
    pub fn robot_velocity(&self, robot_id: RobotId) -> Vector2D {
        match self.slot_for(TeamSide::Friendly, robot_id) {
            Some(slot) => self.agents[slot].velocity(),
            None => {
                warn!(robot_id, "velocity requested for robot not in simulator");
                Vector2D::zero()
            }
        }
    }

    /// Overrides the velocity of a friendly robot with external feedback.
    pub fn update_robot_velocity(&mut self, robot_id: RobotId, velocity: Vector2D) {
        match self.slot_for(TeamSide::Friendly, robot_id) {
            Some(slot) => self.agents[slot].set_velocity(velocity),
            None => warn!(robot_id, "velocity update for robot not in simulator"),
        }
    }

    /// Obstacles and agent footprints as seen by the friendly robot.
    pub fn visualize(&self, robot_id: RobotId) -> Option<HrvoVisualization> {
        self.slot_for(TeamSide::Friendly, robot_id)
            .map(|slot| HrvoVisualization::capture(slot, &self.agents))
    }

    fn slot_for(&self, side: TeamSide, robot_id: RobotId) -> Option<usize> {
        self.agents
            .iter()
            .position(|agent| agent.side() == side && agent.robot_id() == robot_id)
    }

    /// Brings the population in line with `snapshot`.
    ///
    /// Robots gone from the snapshot lose their agent. Known friendly robots
    /// take the observed position only: their velocity is the simulator's own
    /// output. Known enemies take position and velocity. New robots get a new
    /// agent at the end of the population, friendly robots first.
    pub fn reconcile(&mut self, snapshot: &WorldSnapshot) {
        let mut slot = 0;
        while slot < self.agents.len() {
            let agent = &self.agents[slot];
            if snapshot.contains(agent.side(), agent.robot_id()) {
                slot += 1;
                continue;
            }
            debug!(robot_id = agent.robot_id(), side = ?agent.side(), "removing agent");
            self.agents.remove(slot);
            self.ids.remove(slot);
        }

        for side in [TeamSide::Friendly, TeamSide::Enemy] {
            for observation in snapshot.team(side) {
                match self.slot_for(side, observation.id) {
                    Some(slot) => {
                        let agent = &mut self.agents[slot];
                        agent.set_position(observation.position);
                        if side == TeamSide::Enemy {
                            agent.set_velocity(observation.velocity);
                        }
                    }
                    None => {
                        let agent = match side {
                            TeamSide::Friendly => self.friendly_agent_from(observation),
                            TeamSide::Enemy => self.enemy_agent_from(observation),
                        };
                        debug!(robot_id = observation.id, ?side, "adding agent");
                        self.agents.push(agent);
                        self.ids.push(AgentId(self.next_id));
                        self.next_id += 1;
                    }
                }
            }
        }

        self.slots = self.ids.iter().enumerate().map(|(slot, &id)| (id, slot)).collect();
        self.has_snapshot = true;
    }

    fn friendly_agent_from(&self, observation: &RobotObservation) -> Agent {
        let config = &self.config;
        let (mut max_speed, max_accel, velocity) = if observation.can_move {
            (
                config.robot_max_speed,
                config.robot_max_acceleration,
                observation.velocity,
            )
        } else {
            (config.immobile_limit, config.immobile_limit, Vector2D::zero())
        };

        let path = match self.commands.get(&observation.id) {
            Some(Primitive::Move(primitive)) => {
                max_speed = primitive.max_speed;
                self.path_for_move(primitive)
            }
            Some(Primitive::Stop) | None => {
                AgentPath::hold(observation.position, config.path_radius(max_speed, self.time_step))
            }
        };

        Agent::new(
            observation.id,
            TeamSide::Friendly,
            AgentKind::Reciprocal(AvoidanceParams::from(config)),
            KinematicState::new(observation.position, velocity.clamp_magnitude(max_speed)),
            path,
            AgentLimits::new(
                config.robot_radius,
                config.friendly_radius_inflation,
                max_speed,
                max_accel,
            ),
        )
    }

    /// Enemies are assumed to hold their observed velocity, so their goal is
    /// the extrapolated position a few seconds out.
    fn enemy_agent_from(&self, observation: &RobotObservation) -> Agent {
        let config = &self.config;
        let destination =
            observation.position + observation.velocity * config.enemy_extrapolation_horizon;
        let max_speed = config.robot_max_speed;

        Agent::new(
            observation.id,
            TeamSide::Enemy,
            AgentKind::NonReciprocal,
            KinematicState::new(observation.position, observation.velocity),
            AgentPath::new(
                vec![PathPoint::new(destination, 0.0)],
                config.path_radius(max_speed, self.time_step),
            ),
            AgentLimits::new(
                config.robot_radius,
                config.enemy_radius_inflation,
                max_speed,
                config.enemy_max_acceleration,
            ),
        )
    }

    /// The first path point is where the robot started; the agent drives
    /// through the rest at the speed cap, except the last.
    fn path_for_move(&self, primitive: &MovePrimitive) -> AgentPath {
        let waypoints = primitive.path.get(1..).unwrap_or_default();
        let last = waypoints.len().saturating_sub(1);
        let points = waypoints
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let speed = if i == last { primitive.final_speed } else { primitive.max_speed };
                PathPoint::new(position, speed)
            })
            .collect();

        AgentPath::new(points, self.config.path_radius(primitive.max_speed, self.time_step))
    }

    /// Stores `commands` and replaces the path of every commanded friendly
    /// agent. Nothing changes if any move primitive is malformed or carries
    /// a negative or non-finite speed.
    pub fn apply_command(&mut self, commands: &CommandSet) -> Result<(), SimulatorError> {
        for (&robot_id, primitive) in commands {
            if let Primitive::Move(primitive) = primitive {
                if primitive.path.len() < 2 {
                    return Err(SimulatorError::MalformedPath {
                        robot_id,
                        points: primitive.path.len(),
                    });
                }
                let valid_speed = |speed: f64| speed.is_finite() && speed >= 0.0;
                if !valid_speed(primitive.max_speed) || !valid_speed(primitive.final_speed) {
                    return Err(SimulatorError::InvalidSpeed {
                        robot_id,
                        max_speed: primitive.max_speed,
                        final_speed: primitive.final_speed,
                    });
                }
            }
        }

        self.commands = commands.clone();
        if !self.has_snapshot {
            return Ok(());
        }

        for (&robot_id, primitive) in commands {
            let Some(slot) = self.slot_for(TeamSide::Friendly, robot_id) else {
                continue;
            };
            let path = match primitive {
                Primitive::Move(primitive) => {
                    self.agents[slot].set_max_speed(primitive.max_speed);
                    self.path_for_move(primitive)
                }
                Primitive::Stop => {
                    let agent = &self.agents[slot];
                    AgentPath::hold(
                        agent.position(),
                        self.config.path_radius(agent.max_speed(), self.time_step),
                    )
                }
            };
            debug!(robot_id, points = path.points().len(), "replacing path");
            self.agents[slot].set_path(path);
        }

        Ok(())
    }

    /// Advances every agent by one time step.
    pub fn step(&mut self) -> Result<(), SimulatorError> {
        if self.time_step == 0.0 {
            return Err(SimulatorError::ZeroTimeStep);
        }
        if self.agents.is_empty() {
            return Ok(());
        }

        let positions: Vec<Point> = self.agents.iter().map(Agent::position).collect();
        self.kd_tree.rebuild(&positions);

        for_each_agent(&mut self.agents, Agent::update_radius);

        let updates = compute_velocities(&self.agents, &self.kd_tree);
        for (agent, update) in self.agents.iter_mut().zip(updates) {
            agent.commit_velocity(update);
        }

        let time_step = self.time_step;
        for_each_agent(&mut self.agents, |agent| agent.update(time_step));

        self.global_time += time_step;
        trace!(global_time = self.global_time, agents = self.agents.len(), "stepped");
        Ok(())
    }
}

impl From<&SimulatorConfig> for AvoidanceParams {
    fn from(config: &SimulatorConfig) -> Self {
        AvoidanceParams {
            max_neighbor_search_dist: config.max_neighbor_search_dist,
            max_neighbors: config.max_neighbors,
            reciprocity: config.reciprocity,
        }
    }
}

fn for_each_agent<F>(agents: &mut [Agent], f: F)
where
    F: Fn(&mut Agent) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    agents.par_iter_mut().for_each(f);

    #[cfg(not(feature = "parallel"))]
    agents.iter_mut().for_each(f);
}

fn compute_velocities(agents: &[Agent], kd_tree: &KdTree) -> Vec<VelocityUpdate> {
    #[cfg(feature = "parallel")]
    {
        agents
            .par_iter()
            .enumerate()
            .map(|(index, agent)| agent.compute_new_velocity(index, agents, kd_tree))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        agents
            .iter()
            .enumerate()
            .map(|(index, agent)| agent.compute_new_velocity(index, agents, kd_tree))
            .collect()
    }
}
