//! # HRVO - Hybrid Reciprocal Velocity Obstacles
//!
//! Velocity-space avoidance from "The Hybrid Reciprocal Velocity Obstacle"
//! (Snape, van den Berg, Guy, Manocha; IEEE T-RO 2011).
//!
//! ## Velocity Obstacles
//!
//! For an agent A and a neighbor B the velocity obstacle is a cone in velocity
//! space. Its legs are tangent to the disc of combined radius around B, so its
//! half-angle is `asin(combined_radius / distance)`. Any velocity inside the
//! cone eventually brings the two discs into contact.
//!
//! Where the cone's apex sits decides who does the avoiding:
//!
//! - **VO**: apex at B's velocity. A does all the work.
//! - **RVO**: apex at the blend `B.v + w (A.v - B.v)`, `w = 1/2` by default.
//!   Each agent assumes the other takes half of the avoidance.
//! - **HRVO**: the RVO apex is slid along one leg onto the VO's other leg,
//!   depending on which side A prefers to pass. Passing on the
//!   preferred side keeps the reciprocal share, while crossing over to the
//!   other side costs the full VO. This removes the reciprocal dance where
//!   both agents keep picking the same side.
//!
//! When the discs already overlap the cone degenerates: the half-angle is
//! clamped to a right angle, turning the obstacle into the half-plane of
//! velocities that move A further into B.
//!
//! ## Velocity Selection
//!
//! The best velocity lies on the preferred velocity itself or on the boundary
//! of the union of obstacles, so a finite candidate set suffices:
//!
//! 1. the preferred velocity, clipped to the max-speed disc
//! 2. projections of the preferred velocity onto every obstacle leg
//! 3. intersections of every leg with the max-speed circle
//! 4. pairwise intersections of legs from different obstacles
//!
//! Candidates are ranked by distance to the preferred velocity (stable, so
//! generation order breaks ties) and the first one outside every obstacle
//! wins. Obstacles are ordered nearest neighbor first, so if every candidate
//! is blocked, the one whose first blocking obstacle has the highest index is
//! taken: it clears the most of the nearest neighbors.

use crate::agent::Agent;
use crate::structs::Vector2D;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Cone in velocity space. A velocity `v` collides iff it lies
/// strictly between the two legs: `det(side2, v - apex) < 0` and
/// `det(side1, v - apex) > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityObstacle {
    /// Tip of the cone
    pub apex: Vector2D,
    /// Unit direction of the right (clockwise) leg
    pub side1: Vector2D,
    /// Unit direction of the left (counter-clockwise) leg
    pub side2: Vector2D,
}

impl VelocityObstacle {
    pub fn new(apex: Vector2D, side1: Vector2D, side2: Vector2D) -> Self {
        VelocityObstacle { apex, side1, side2 }
    }

    /// Builds the hybrid reciprocal obstacle `other` induces on `agent`.
    ///
    /// `preferred_velocity` is the agent's own preferred velocity for this
    /// tick; the neighbor's is read from its committed state. `reciprocity`
    /// is the share of the avoidance `agent` takes on itself.
    pub fn hybrid(
        agent: &Agent,
        preferred_velocity: Vector2D,
        other: &Agent,
        reciprocity: f64,
    ) -> Self {
        let relative_position = other.position() - agent.position();
        let combined_radius = agent.radius() + other.radius();
        let distance_squared = relative_position.magnitude_squared();

        let relative_velocity = agent.velocity() - other.velocity();

        if distance_squared > combined_radius * combined_radius {
            let to_other = relative_position.normalize();
            let opening_angle = (combined_radius / distance_squared.sqrt()).asin();
            let side1 = to_other.rotate(-opening_angle);
            let side2 = to_other.rotate(opening_angle);

            // det(side1, side2)
            let d = 2.0 * opening_angle.sin() * opening_angle.cos();

            // Apex where one reciprocal leg meets the opposite plain VO leg
            let preferred_difference = preferred_velocity - other.preferred_velocity();
            let apex = if relative_position.det(&preferred_difference) > 0.0 {
                let s = reciprocity * relative_velocity.det(&side2) / d;
                other.velocity() + s * side1
            } else {
                let s = -reciprocity * relative_velocity.det(&side1) / d;
                other.velocity() + s * side2
            };

            VelocityObstacle::new(apex, side1, side2)
        } else {
            // Overlapping: half-angle clamps to a right angle
            let to_other = if distance_squared > 0.0 {
                relative_position.normalize()
            } else {
                Vector2D::new(1.0, 0.0)
            };
            let apex = other.velocity() + reciprocity * relative_velocity;

            VelocityObstacle::new(apex, to_other.rotate(-FRAC_PI_2), to_other.rotate(FRAC_PI_2))
        }
    }

    pub fn contains(&self, velocity: Vector2D) -> bool {
        let from_apex = velocity - self.apex;
        self.side2.det(&from_apex) < 0.0 && self.side1.det(&from_apex) > 0.0
    }

    fn legs(&self) -> [Vector2D; 2] {
        [self.side1, self.side2]
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    velocity: Vector2D,
    /// Obstacles whose boundary produced this candidate; exempt from its check
    sources: [Option<usize>; 2],
}

impl Candidate {
    fn new(velocity: Vector2D, first: Option<usize>, second: Option<usize>) -> Self {
        Candidate {
            velocity,
            sources: [first, second],
        }
    }

    fn is_from(&self, obstacle: usize) -> bool {
        self.sources.contains(&Some(obstacle))
    }
}

/// Picks the velocity closest to `preferred_velocity` that lies inside the
/// max-speed disc and outside every obstacle.
pub fn select_velocity(
    preferred_velocity: Vector2D,
    max_speed: f64,
    obstacles: &[VelocityObstacle],
) -> Vector2D {
    let candidates = generate_candidates(preferred_velocity, max_speed, obstacles);

    let mut ranked: Vec<(OrderedFloat<f64>, Candidate)> = candidates
        .into_iter()
        .map(|c| (OrderedFloat((preferred_velocity - c.velocity).magnitude_squared()), c))
        .collect();
    // Stable: equal distances keep generation order
    ranked.sort_by_key(|&(distance, _)| distance);

    let mut fallback: Option<(usize, Vector2D)> = None;

    for (_, candidate) in &ranked {
        let blocking = obstacles
            .iter()
            .enumerate()
            .find(|&(j, obstacle)| !candidate.is_from(j) && obstacle.contains(candidate.velocity))
            .map(|(j, _)| j);

        match blocking {
            None => return candidate.velocity,
            Some(j) => {
                if fallback.map_or(true, |(best, _)| j > best) {
                    fallback = Some((j, candidate.velocity));
                }
            }
        }
    }

    fallback.map_or_else(|| preferred_velocity.clamp_magnitude(max_speed), |(_, velocity)| velocity)
}

fn generate_candidates(
    preferred_velocity: Vector2D,
    max_speed: f64,
    obstacles: &[VelocityObstacle],
) -> Vec<Candidate> {
    let max_speed_squared = max_speed * max_speed;
    let count = obstacles.len();
    let mut candidates = Vec::with_capacity(1 + count * 8 + count * count * 2);

    candidates.push(Candidate::new(preferred_velocity.clamp_magnitude(max_speed), None, None));

    // Projections of the preferred velocity onto each leg
    for (i, obstacle) in obstacles.iter().enumerate() {
        let apex_to_preferred = preferred_velocity - obstacle.apex;

        let dot1 = apex_to_preferred.dot(&obstacle.side1);
        if dot1 > 0.0 && obstacle.side1.det(&apex_to_preferred) > 0.0 {
            let velocity = obstacle.apex + dot1 * obstacle.side1;
            if velocity.magnitude_squared() < max_speed_squared {
                candidates.push(Candidate::new(velocity, Some(i), None));
            }
        }

        let dot2 = apex_to_preferred.dot(&obstacle.side2);
        if dot2 > 0.0 && obstacle.side2.det(&apex_to_preferred) < 0.0 {
            let velocity = obstacle.apex + dot2 * obstacle.side2;
            if velocity.magnitude_squared() < max_speed_squared {
                candidates.push(Candidate::new(velocity, Some(i), None));
            }
        }
    }

    // Legs against the max-speed circle
    for (j, obstacle) in obstacles.iter().enumerate() {
        for leg in obstacle.legs() {
            let discriminant = max_speed_squared - obstacle.apex.det(&leg).powi(2);
            if discriminant <= 0.0 {
                continue;
            }
            let along = -obstacle.apex.dot(&leg);
            let root = discriminant.sqrt();
            for t in [along + root, along - root] {
                if t >= 0.0 {
                    candidates.push(Candidate::new(obstacle.apex + t * leg, Some(j), Some(j)));
                }
            }
        }
    }

    // Legs against each other
    for i in 0..obstacles.len() {
        for j in (i + 1)..obstacles.len() {
            for leg_i in obstacles[i].legs() {
                for leg_j in obstacles[j].legs() {
                    let crossing = intersect_legs(&obstacles[i], leg_i, &obstacles[j], leg_j);
                    if let Some(velocity) = crossing {
                        if velocity.magnitude_squared() < max_speed_squared {
                            candidates.push(Candidate::new(velocity, Some(i), Some(j)));
                        }
                    }
                }
            }
        }
    }

    candidates
}

/// Intersection of the rays `a.apex + s * leg_a` and `b.apex + t * leg_b`.
fn intersect_legs(
    a: &VelocityObstacle,
    leg_a: Vector2D,
    b: &VelocityObstacle,
    leg_b: Vector2D,
) -> Option<Vector2D> {
    let d = leg_a.det(&leg_b);
    if d == 0.0 {
        return None;
    }

    let between_apexes = b.apex - a.apex;
    let s = between_apexes.det(&leg_b) / d;
    let t = between_apexes.det(&leg_a) / d;

    if s >= 0.0 && t >= 0.0 {
        Some(a.apex + s * leg_a)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentKind, AgentLimits, AvoidanceParams};
    use crate::path::AgentPath;
    use crate::structs::{KinematicState, Point, TeamSide};
    use approx::assert_abs_diff_eq;

    const EPSILON: f64 = 1e-9;

    /// `contains` with a margin, so velocities exactly on a leg count as outside
    fn strictly_inside(obstacle: &VelocityObstacle, velocity: Vector2D) -> bool {
        let from_apex = velocity - obstacle.apex;
        obstacle.side2.det(&from_apex) < -EPSILON && obstacle.side1.det(&from_apex) > EPSILON
    }

    fn agent_at(position: Point, velocity: Vector2D, preferred: Vector2D, radius: f64) -> Agent {
        let mut agent = Agent::new(
            0,
            TeamSide::Friendly,
            AgentKind::Reciprocal(AvoidanceParams::default()),
            KinematicState::new(position, velocity),
            AgentPath::hold(position, 0.1),
            AgentLimits::new(radius, 0.0, 2.0, 4.0),
        );
        agent.set_preferred_velocity(preferred);
        agent
    }

    #[test]
    fn test_no_obstacles_returns_preferred() {
        let preferred = Vector2D::new(1.0, 0.5);
        let result = select_velocity(preferred, 2.0, &[]);
        assert_abs_diff_eq!((result - preferred).magnitude(), 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_no_obstacles_clips_to_max_speed() {
        let result = select_velocity(Vector2D::new(3.0, 4.0), 1.0, &[]);
        assert_abs_diff_eq!(result.magnitude(), 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(result.x, 0.6, epsilon = EPSILON);
    }

    #[test]
    fn test_contains_cone_interior_only() {
        let obstacle = VelocityObstacle::new(
            Vector2D::zero(),
            Vector2D::new(1.0, -1.0).normalize(),
            Vector2D::new(1.0, 1.0).normalize(),
        );
        assert!(obstacle.contains(Vector2D::new(1.0, 0.0)), "Straight ahead is inside the cone");
        assert!(!obstacle.contains(Vector2D::new(-1.0, 0.0)), "Backwards is outside");
        assert!(!obstacle.contains(Vector2D::new(0.0, 1.0)), "Sideways is outside");
        assert!(!obstacle.contains(Vector2D::new(1.0, 1.0)), "The leg itself is not inside");
    }

    #[test]
    fn test_half_angle_matches_asin() {
        let agent = agent_at(Point::new(0.0, 0.0), Vector2D::zero(), Vector2D::zero(), 0.5);
        let other = agent_at(Point::new(2.0, 0.0), Vector2D::zero(), Vector2D::zero(), 0.5);

        let obstacle = VelocityObstacle::hybrid(&agent, Vector2D::zero(), &other, 0.5);
        let expected = (1.0f64 / 2.0).asin();
        assert_abs_diff_eq!(obstacle.side1.orientation(), -expected, epsilon = EPSILON);
        assert_abs_diff_eq!(obstacle.side2.orientation(), expected, epsilon = EPSILON);
        // Both agents at rest: apex at the origin
        assert_abs_diff_eq!(obstacle.apex.magnitude(), 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_overlap_clamps_to_right_angle() {
        let agent = agent_at(Point::new(0.0, 0.0), Vector2D::new(1.0, 0.0), Vector2D::zero(), 0.5);
        let other = agent_at(Point::new(0.0, 0.6), Vector2D::new(0.0, 1.0), Vector2D::zero(), 0.5);

        let obstacle = VelocityObstacle::hybrid(&agent, Vector2D::zero(), &other, 0.5);
        assert_abs_diff_eq!(obstacle.side1.x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(obstacle.side2.x, -1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(obstacle.apex.x, 0.5, epsilon = EPSILON);
        assert_abs_diff_eq!(obstacle.apex.y, 0.5, epsilon = EPSILON);

        // Moving straight into the other agent is blocked, moving away is not
        assert!(obstacle.contains(Vector2D::new(0.5, 2.0)));
        assert!(!obstacle.contains(Vector2D::new(0.5, -1.0)));
    }

    #[test]
    fn test_identical_positions_do_not_produce_nan() {
        let agent = agent_at(Point::new(1.0, 1.0), Vector2D::zero(), Vector2D::zero(), 0.1);
        let other = agent_at(Point::new(1.0, 1.0), Vector2D::zero(), Vector2D::zero(), 0.1);

        let obstacle = VelocityObstacle::hybrid(&agent, Vector2D::new(1.0, 0.0), &other, 0.5);
        assert!(obstacle.apex.x.is_finite() && obstacle.apex.y.is_finite());
        assert!(obstacle.side1.x.is_finite() && obstacle.side1.y.is_finite());
        assert_abs_diff_eq!(obstacle.side1.dot(&obstacle.side2), -1.0, epsilon = EPSILON);

        let velocity = select_velocity(Vector2D::new(1.0, 0.0), 2.0, &[obstacle]);
        assert!(velocity.x.is_finite() && velocity.y.is_finite());
        assert!(!strictly_inside(&obstacle, velocity));
    }

    #[test]
    fn test_head_on_chooses_velocity_outside_obstacle() {
        let forward = Vector2D::new(1.0, 0.0);
        let agent = agent_at(Point::new(0.0, 0.0), forward, forward, 0.5);
        let other = agent_at(Point::new(3.0, 0.0), -forward, -forward, 0.5);

        let obstacle = VelocityObstacle::hybrid(&agent, agent.preferred_velocity(), &other, 0.5);
        assert!(obstacle.contains(Vector2D::new(1.0, 0.0)), "Current course collides");

        let result = select_velocity(Vector2D::new(1.0, 0.0), 2.0, &[obstacle]);
        assert!(
            !strictly_inside(&obstacle, result),
            "Chosen velocity must leave the obstacle: {:?}",
            result
        );
        assert!(result.y.abs() > 0.001, "Expected lateral movement, got: {:?}", result);
        assert!(result.magnitude() <= 2.0 + EPSILON);
    }

    #[test]
    fn test_head_on_agents_pass_on_opposite_sides() {
        let forward = Vector2D::new(1.0, 0.0);
        let a = agent_at(Point::new(0.0, 0.0), forward, forward, 0.5);
        let b = agent_at(Point::new(4.0, 0.1), -forward, -forward, 0.5);

        let vo_a = VelocityObstacle::hybrid(&a, a.preferred_velocity(), &b, 0.5);
        let vo_b = VelocityObstacle::hybrid(&b, b.preferred_velocity(), &a, 0.5);
        let result_a = select_velocity(a.preferred_velocity(), 1.0, &[vo_a]);
        let result_b = select_velocity(b.preferred_velocity(), 1.0, &[vo_b]);

        // A sees B slightly to its left and swerves right, B mirrors it
        assert!(result_a.y < 0.0, "A should dodge right, got {:?}", result_a);
        assert!(result_b.y > 0.0, "B should dodge left, got {:?}", result_b);
    }

    #[test]
    fn test_unobstructed_preferred_velocity_is_kept() {
        let agent = agent_at(Point::new(0.0, 0.0), Vector2D::zero(), Vector2D::new(1.0, 0.0), 0.5);
        // Neighbor behind the agent, both moving away from each other
        let other =
            agent_at(Point::new(-3.0, 0.0), Vector2D::zero(), Vector2D::new(-1.0, 0.0), 0.5);

        let obstacle = VelocityObstacle::hybrid(&agent, Vector2D::new(1.0, 0.0), &other, 0.5);
        let result = select_velocity(Vector2D::new(1.0, 0.0), 2.0, &[obstacle]);
        assert_abs_diff_eq!(result.x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(result.y, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_reciprocity_moves_apex() {
        let agent = agent_at(Point::new(0.0, 0.0), Vector2D::new(1.0, 0.0), Vector2D::zero(), 0.3);
        let other = agent_at(Point::new(0.0, 0.5), Vector2D::new(-1.0, 0.0), Vector2D::zero(), 0.3);

        // Overlapping, so the apex is the plain blend of velocities
        let full = VelocityObstacle::hybrid(&agent, Vector2D::zero(), &other, 1.0);
        let none = VelocityObstacle::hybrid(&agent, Vector2D::zero(), &other, 0.0);
        assert_abs_diff_eq!(full.apex.x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(none.apex.x, -1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_surrounded_agent_falls_back_within_max_speed() {
        // Three neighbours closing in from every side
        let obstacles: Vec<VelocityObstacle> = (0..3)
            .map(|i| {
                let angle = i as f64 * 2.0 * std::f64::consts::PI / 3.0;
                let direction = Vector2D::new(1.0, 0.0).rotate(angle);
                VelocityObstacle::new(
                    -direction * 0.2,
                    direction.rotate(-1.4),
                    direction.rotate(1.4),
                )
            })
            .collect();

        let result = select_velocity(Vector2D::new(1.0, 0.0), 1.0, &obstacles);
        assert!(
            result.magnitude() <= 1.0 + EPSILON,
            "Fallback must respect max speed: {:?}",
            result
        );
    }

    #[test]
    fn test_intersect_legs_parallel_is_none() {
        let right = Vector2D::new(1.0, 0.0);
        let up = Vector2D::new(0.0, 1.0);
        let a = VelocityObstacle::new(Vector2D::zero(), right, up);
        let b = VelocityObstacle::new(up, right, up);
        assert!(intersect_legs(&a, a.side1, &b, b.side1).is_none());
    }

    #[test]
    fn test_intersect_legs_crossing() {
        let up = Vector2D::new(0.0, 1.0);
        let a = VelocityObstacle::new(Vector2D::zero(), Vector2D::new(1.0, 1.0).normalize(), up);
        let b = VelocityObstacle::new(
            Vector2D::new(2.0, 0.0),
            Vector2D::new(-1.0, 1.0).normalize(),
            up,
        );
        let point = intersect_legs(&a, a.side1, &b, b.side1).unwrap();
        assert_abs_diff_eq!(point.x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(point.y, 1.0, epsilon = EPSILON);
    }
}
