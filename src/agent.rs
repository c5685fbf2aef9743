//! # Agents
//!
//! One agent per robot on the field. All agents share the same state (pose,
//! limits, path, speed-dependent radius) and differ only in how they pick
//! their next velocity:
//!
//! - **Reciprocal**: builds a hybrid reciprocal velocity obstacle against each
//!   nearby agent and picks the velocity closest to its preferred one that
//!   lies outside all of them. Used for friendly robots, which all run this
//!   same planner.
//! - **NonReciprocal**: drives straight at its destination and ignores its
//!   neighbors. Used for robots whose avoidance behavior can not be assumed.
//!
//! Within a tick the simulator calls `update_radius`, then
//! `compute_new_velocity`, then `update`, each over the whole population
//! before moving on.

use crate::kd_tree::KdTree;
use crate::path::AgentPath;
use crate::structs::{KinematicState, Point, RobotId, TeamSide, Vector2D};
use crate::velocity_obstacle::{select_velocity, VelocityObstacle};

/// Closer than this to the target, the preferred velocity is zero.
const GOAL_EPSILON: f64 = 1e-9;

/// Neighbor search policy of a reciprocal agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceParams {
    pub max_neighbor_search_dist: f64,
    pub max_neighbors: usize,
    /// Share of the avoidance this agent takes on itself.
    pub reciprocity: f64,
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        AvoidanceParams {
            max_neighbor_search_dist: 2.5,
            max_neighbors: 15,
            reciprocity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentKind {
    Reciprocal(AvoidanceParams),
    NonReciprocal,
}

/// Physical limits of an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentLimits {
    pub min_radius: f64,
    /// Extra radius at full speed.
    pub radius_inflation: f64,
    pub max_speed: f64,
    pub max_accel: f64,
}

impl AgentLimits {
    pub fn new(min_radius: f64, radius_inflation: f64, max_speed: f64, max_accel: f64) -> Self {
        AgentLimits {
            min_radius,
            radius_inflation,
            max_speed,
            max_accel,
        }
    }
}

/// Result of the velocity phase, committed once every agent has computed its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityUpdate {
    pub preferred_velocity: Vector2D,
    pub new_velocity: Vector2D,
}

#[derive(Debug, Clone)]
pub struct Agent {
    robot_id: RobotId,
    side: TeamSide,
    kind: AgentKind,
    state: KinematicState,
    limits: AgentLimits,
    radius: f64,
    path: AgentPath,
    preferred_velocity: Vector2D,
    new_velocity: Vector2D,
}

impl Agent {
    pub fn new(
        robot_id: RobotId,
        side: TeamSide,
        kind: AgentKind,
        state: KinematicState,
        path: AgentPath,
        limits: AgentLimits,
    ) -> Self {
        Agent {
            robot_id,
            side,
            kind,
            state,
            limits,
            radius: limits.min_radius,
            path,
            preferred_velocity: Vector2D::zero(),
            new_velocity: state.velocity,
        }
    }

    pub fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    pub fn side(&self) -> TeamSide {
        self.side
    }

    pub fn kind(&self) -> &AgentKind {
        &self.kind
    }

    pub fn state(&self) -> KinematicState {
        self.state
    }

    pub fn position(&self) -> Point {
        self.state.position
    }

    pub fn velocity(&self) -> Vector2D {
        self.state.velocity
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn max_speed(&self) -> f64 {
        self.limits.max_speed
    }

    pub fn max_accel(&self) -> f64 {
        self.limits.max_accel
    }

    pub fn path(&self) -> &AgentPath {
        &self.path
    }

    /// Preferred velocity committed in the last velocity phase.
    pub fn preferred_velocity(&self) -> Vector2D {
        self.preferred_velocity
    }

    /// Velocity chosen in the last velocity phase, before acceleration limits.
    pub fn new_velocity(&self) -> Vector2D {
        self.new_velocity
    }

    pub fn set_position(&mut self, position: Point) {
        self.state = self.state.with_position(position);
    }

    pub fn set_velocity(&mut self, velocity: Vector2D) {
        self.state = self.state.with_velocity(velocity);
    }

    pub fn set_path(&mut self, path: AgentPath) {
        self.path = path;
    }

    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.limits.max_speed = max_speed;
    }

    #[cfg(test)]
    pub(crate) fn set_preferred_velocity(&mut self, velocity: Vector2D) {
        self.preferred_velocity = velocity;
    }

    /// Grows the radius linearly with speed, from the minimum radius at rest
    /// to minimum plus inflation at max speed.
    pub fn update_radius(&mut self) {
        let speed_ratio = if self.limits.max_speed > 0.0 {
            (self.state.speed() / self.limits.max_speed).min(1.0)
        } else {
            0.0
        };
        self.radius = self.limits.min_radius + self.limits.radius_inflation * speed_ratio;
    }

    /// Velocity toward the current path point.
    ///
    /// Full max speed far away; close to the point the speed follows the
    /// braking curve `v^2 = v_point^2 + 2 a d` so the agent arrives at the
    /// speed the point asks for.
    pub fn compute_preferred_velocity(&self) -> Vector2D {
        let Some(path_point) = self.path.current_path_point() else {
            return Vector2D::zero();
        };

        let to_goal = path_point.position() - self.position();
        let distance = to_goal.magnitude();
        if distance < GOAL_EPSILON {
            return Vector2D::zero();
        }

        let max_speed = self.limits.max_speed;
        let speed = if self.limits.max_accel > 0.0 {
            let speed_at_point = path_point.speed().max(0.0).min(max_speed);
            (speed_at_point * speed_at_point + 2.0 * self.limits.max_accel * distance)
                .sqrt()
                .min(max_speed)
        } else {
            max_speed
        };

        to_goal.with_magnitude(speed)
    }

    /// Indices of the neighbors this agent avoids, nearest first.
    pub fn neighbors(&self, index: usize, kd_tree: &KdTree) -> Vec<usize> {
        match self.kind {
            AgentKind::Reciprocal(params) => kd_tree.query_nearest(
                self.position(),
                params.max_neighbor_search_dist,
                params.max_neighbors,
                Some(index),
            ),
            AgentKind::NonReciprocal => Vec::new(),
        }
    }

    /// Obstacles this agent builds against its neighbors. `index` is this
    /// agent's position in `agents`; `kd_tree` must be built over `agents`.
    pub fn velocity_obstacles(
        &self,
        index: usize,
        preferred_velocity: Vector2D,
        agents: &[Agent],
        kd_tree: &KdTree,
    ) -> Vec<VelocityObstacle> {
        match self.kind {
            AgentKind::Reciprocal(params) => self
                .neighbors(index, kd_tree)
                .into_iter()
                .map(|i| {
                    let other = &agents[i];
                    VelocityObstacle::hybrid(self, preferred_velocity, other, params.reciprocity)
                })
                .collect(),
            AgentKind::NonReciprocal => Vec::new(),
        }
    }

    /// Picks this tick's velocity from the state every agent committed at the
    /// end of the previous tick. Does not modify anything.
    pub fn compute_new_velocity(
        &self,
        index: usize,
        agents: &[Agent],
        kd_tree: &KdTree,
    ) -> VelocityUpdate {
        let preferred_velocity = self.compute_preferred_velocity();

        let new_velocity = match self.kind {
            AgentKind::Reciprocal(_) => {
                let obstacles = self.velocity_obstacles(index, preferred_velocity, agents, kd_tree);
                select_velocity(preferred_velocity, self.limits.max_speed, &obstacles)
            }
            AgentKind::NonReciprocal => preferred_velocity,
        };

        VelocityUpdate {
            preferred_velocity,
            new_velocity,
        }
    }

    pub fn commit_velocity(&mut self, update: VelocityUpdate) {
        self.preferred_velocity = update.preferred_velocity;
        self.new_velocity = update.new_velocity;
    }

    /// Moves toward the chosen velocity within the acceleration limit, then
    /// integrates position and advances the path if its target is captured.
    pub fn update(&mut self, time_step: f64) {
        let target = self.new_velocity.clamp_magnitude(self.limits.max_speed);
        let current = self.state.velocity;

        let dv = target - current;
        let max_dv = self.limits.max_accel * time_step;
        let dv_magnitude = dv.magnitude();
        let velocity = if dv_magnitude < max_dv || dv_magnitude == 0.0 {
            target
        } else {
            current + dv.with_magnitude(max_dv)
        };

        let position = self.state.position + velocity * time_step;
        self.state = KinematicState {
            position,
            velocity,
            ..self.state
        };

        let destination = self
            .path
            .current_path_point()
            .map_or(position, |point| point.position());
        let path_radius = self.path.path_radius();
        if destination.distance_squared(&position) < path_radius * path_radius
            && !self.path.is_at_final_point()
        {
            self.path.advance();
        }
    }

    /// Whether the agent is on its final path point and within capture radius of it.
    pub fn has_reached_goal(&self) -> bool {
        if !self.path.is_at_final_point() {
            return false;
        }
        match self.path.final_point() {
            Some(point) => point.position().distance(&self.position()) < self.path.path_radius(),
            None => true,
        }
    }
}
