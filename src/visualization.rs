//! Debug export of what one robot is avoiding.

use crate::agent::Agent;
use crate::kd_tree::KdTree;
use crate::structs::{Point, RobotId};
use crate::velocity_obstacle::VelocityObstacle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

/// Velocity obstacles of one friendly robot plus the footprint of every agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvoVisualization {
    pub robot_id: RobotId,
    pub velocity_obstacles: Vec<VelocityObstacle>,
    pub robots: Vec<Circle>,
}

impl HrvoVisualization {
    /// Recomputes the obstacles `agents[index]` would see from the committed
    /// state. Builds its own tree so it never depends on a stale one.
    pub(crate) fn capture(index: usize, agents: &[Agent]) -> Self {
        let positions: Vec<Point> = agents.iter().map(Agent::position).collect();
        let kd_tree = KdTree::build(&positions);
        let agent = &agents[index];

        let preferred_velocity = agent.compute_preferred_velocity();
        let velocity_obstacles =
            agent.velocity_obstacles(index, preferred_velocity, agents, &kd_tree);

        HrvoVisualization {
            robot_id: agent.robot_id(),
            velocity_obstacles,
            robots: agents
                .iter()
                .map(|other| Circle {
                    center: other.position(),
                    radius: other.radius(),
                })
                .collect(),
        }
    }
}
