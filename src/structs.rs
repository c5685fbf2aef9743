//! # Core Data Structures
//!
//! Value types shared by every other module:
//!
//! - **Point**: 2D position on the field (meters)
//! - **Vector2D**: 2D velocity/direction vector with arithmetic operations
//! - **KinematicState**: pose and velocity of one agent, replaced wholesale on update
//! - **TeamSide / RobotId**: identity of the robot an agent stands for
//! - **RobotObservation / WorldSnapshot**: the observed field fed to the simulator
//! - **Primitive / MovePrimitive / CommandSet**: the commands fed to friendly agents

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Mul, Neg, Sub};

/// External robot identifier, unique within one team side.
pub type RobotId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn origin() -> Self {
        Point::new(0.0, 0.0)
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (*other - *self).magnitude()
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        (*other - *self).magnitude_squared()
    }
}

impl Sub for Point {
    type Output = Vector2D;

    fn sub(self, other: Point) -> Vector2D {
        Vector2D {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Add<Vector2D> for Point {
    type Output = Point;

    fn add(self, other: Vector2D) -> Point {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn zero() -> Self {
        Vector2D::new(0.0, 0.0)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Unit vector in the same direction; the zero vector normalizes to zero.
    pub fn normalize(&self) -> Vector2D {
        let mag = self.magnitude();
        if mag > 0.0 {
            Vector2D {
                x: self.x / mag,
                y: self.y / mag,
            }
        } else {
            Vector2D::zero()
        }
    }

    /// Same direction, given length. Zero stays zero.
    pub fn with_magnitude(&self, length: f64) -> Vector2D {
        self.normalize() * length
    }

    /// Shortens the vector to `max_length` if it is longer.
    pub fn clamp_magnitude(&self, max_length: f64) -> Vector2D {
        if self.magnitude_squared() > max_length * max_length {
            self.with_magnitude(max_length)
        } else {
            *self
        }
    }

    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (determinant of `[self, other]`).
    pub fn det(&self, other: &Vector2D) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Counter-clockwise rotation by `angle` radians.
    pub fn rotate(&self, angle: f64) -> Vector2D {
        (Rotation2::new(angle) * Vector2::from(*self)).into()
    }

    /// Angle of the vector from the +x axis, in `(-pi, pi]`.
    pub fn orientation(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl From<Vector2<f64>> for Vector2D {
    fn from(v: Vector2<f64>) -> Self {
        Vector2D::new(v.x, v.y)
    }
}

impl From<Vector2D> for Vector2<f64> {
    fn from(v: Vector2D) -> Self {
        Vector2::new(v.x, v.y)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        Vector2D {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Mul<Vector2D> for f64 {
    type Output = Vector2D;

    fn mul(self, vector: Vector2D) -> Vector2D {
        vector * self
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Pose and velocity of one agent.
///
/// Never mutated field by field: every update builds a new value so a
/// half-updated state can not be observed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: Point,
    pub velocity: Vector2D,
    pub orientation: f64,
    pub angular_velocity: f64,
}

impl KinematicState {
    pub fn new(position: Point, velocity: Vector2D) -> Self {
        KinematicState {
            position,
            velocity,
            orientation: 0.0,
            angular_velocity: 0.0,
        }
    }

    pub fn with_position(&self, position: Point) -> Self {
        KinematicState { position, ..*self }
    }

    pub fn with_velocity(&self, velocity: Vector2D) -> Self {
        KinematicState { velocity, ..*self }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }
}

/// Which team an agent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamSide {
    /// Controllable robots; full command authority.
    Friendly,
    /// Externally observed robots; state estimated only.
    Enemy,
}

/// One robot as seen in a world snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotObservation {
    pub id: RobotId,
    pub position: Point,
    pub velocity: Vector2D,
    /// False when the robot has lost its ability to drive.
    #[serde(default = "default_can_move")]
    pub can_move: bool,
}

fn default_can_move() -> bool {
    true
}

impl RobotObservation {
    pub fn new(id: RobotId, position: Point, velocity: Vector2D) -> Self {
        RobotObservation {
            id,
            position,
            velocity,
            can_move: true,
        }
    }

    pub fn immobile(mut self) -> Self {
        self.can_move = false;
        self
    }
}

/// Every robot on the field at one instant, grouped by team side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub friendly: Vec<RobotObservation>,
    #[serde(default)]
    pub enemy: Vec<RobotObservation>,
}

impl WorldSnapshot {
    pub fn new(friendly: Vec<RobotObservation>, enemy: Vec<RobotObservation>) -> Self {
        WorldSnapshot { friendly, enemy }
    }

    pub fn team(&self, side: TeamSide) -> &[RobotObservation] {
        match side {
            TeamSide::Friendly => &self.friendly,
            TeamSide::Enemy => &self.enemy,
        }
    }

    pub fn contains(&self, side: TeamSide, robot_id: RobotId) -> bool {
        self.team(side).iter().any(|robot| robot.id == robot_id)
    }
}

/// Drive along `path` (first point is the start position), arriving at the
/// last point with `final_speed` and never exceeding `max_speed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePrimitive {
    pub path: Vec<Point>,
    pub final_speed: f64,
    pub max_speed: f64,
}

impl MovePrimitive {
    pub fn new(path: Vec<Point>, final_speed: f64, max_speed: f64) -> Self {
        MovePrimitive {
            path,
            final_speed,
            max_speed,
        }
    }

    /// Straight move from `start` to `destination`.
    pub fn to(start: Point, destination: Point, final_speed: f64, max_speed: f64) -> Self {
        MovePrimitive::new(vec![start, destination], final_speed, max_speed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Move(MovePrimitive),
    /// Hold the current position.
    Stop,
}

/// Latest primitive for each friendly robot.
pub type CommandSet = BTreeMap<RobotId, Primitive>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    // ==================== Point Tests ====================

    #[test]
    fn test_point_distance_diagonal() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(3.0, 4.0);
        assert_eq!(p1.distance(&p2), 5.0); // 3-4-5 triangle
        assert_eq!(p1.distance_squared(&p2), 25.0);
    }

    #[test]
    fn test_point_sub_operator() {
        let p1 = Point::new(5.0, 7.0);
        let p2 = Point::new(2.0, 3.0);
        let v = p1 - p2;
        assert_eq!(v.x, 3.0);
        assert_eq!(v.y, 4.0);
    }

    #[test]
    fn test_point_add_vector_operator() {
        let p = Point::new(1.0, 2.0);
        let v = Vector2D::new(3.0, 4.0);
        let result = p + v;
        assert_eq!(result.x, 4.0);
        assert_eq!(result.y, 6.0);
    }

    // ==================== Vector2D Tests ====================

    #[test]
    fn test_vector_normalize_zero_is_zero() {
        let v = Vector2D::zero().normalize();
        assert_eq!(v, Vector2D::zero(), "Zero vector should normalize to zero, not NaN");
    }

    #[test]
    fn test_vector_with_magnitude() {
        let v = Vector2D::new(3.0, 4.0).with_magnitude(10.0);
        assert_abs_diff_eq!(v.x, 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_clamp_magnitude() {
        let long = Vector2D::new(6.0, 8.0).clamp_magnitude(5.0);
        assert_abs_diff_eq!(long.magnitude(), 5.0, epsilon = 1e-12);

        let short = Vector2D::new(1.0, 1.0);
        assert_eq!(short.clamp_magnitude(5.0), short, "Short vectors are left untouched");
    }

    #[test]
    fn test_vector_det_sign() {
        let x = Vector2D::new(1.0, 0.0);
        let y = Vector2D::new(0.0, 1.0);
        assert_eq!(x.det(&y), 1.0);
        assert_eq!(y.det(&x), -1.0);
        assert_eq!(x.det(&x), 0.0);
    }

    #[test]
    fn test_vector_rotate_quarter_turn() {
        let v = Vector2D::new(1.0, 0.0).rotate(FRAC_PI_2);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, 1.0, epsilon = 1e-12);

        let back = v.rotate(-FRAC_PI_2);
        assert_abs_diff_eq!(back.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_nalgebra_round_trip() {
        let v = Vector2D::new(-2.5, 7.0);
        let n: Vector2<f64> = v.into();
        assert_eq!(Vector2D::from(n), v);
    }

    #[test]
    fn test_scalar_times_vector() {
        let v = 2.0 * Vector2D::new(1.0, -1.0);
        assert_eq!(v, Vector2D::new(2.0, -2.0));
        assert_eq!(-v, Vector2D::new(-2.0, 2.0));
    }

    // ==================== KinematicState Tests ====================

    #[test]
    fn test_kinematic_state_replaced_wholesale() {
        let state = KinematicState {
            position: Point::new(1.0, 1.0),
            velocity: Vector2D::new(0.5, 0.0),
            orientation: 0.3,
            angular_velocity: 0.1,
        };
        let moved = state.with_position(Point::new(2.0, 1.0));

        assert_eq!(moved.position, Point::new(2.0, 1.0));
        assert_eq!(moved.velocity, state.velocity);
        assert_eq!(moved.orientation, 0.3);
        assert_eq!(state.position, Point::new(1.0, 1.0), "Original state is untouched");
    }

    // ==================== Snapshot Tests ====================

    #[test]
    fn test_snapshot_contains_by_side() {
        let snapshot = WorldSnapshot::new(
            vec![RobotObservation::new(1, Point::origin(), Vector2D::zero())],
            vec![RobotObservation::new(2, Point::origin(), Vector2D::zero())],
        );
        assert!(snapshot.contains(TeamSide::Friendly, 1));
        assert!(!snapshot.contains(TeamSide::Friendly, 2));
        assert!(snapshot.contains(TeamSide::Enemy, 2));
    }

    #[test]
    fn test_observation_can_move_defaults_true() {
        let json = r#"{
            "id": 4,
            "position": {"x": 1.0, "y": 2.0},
            "velocity": {"x": 0.0, "y": 0.0}
        }"#;
        let robot: RobotObservation = serde_json::from_str(json).unwrap();
        assert_eq!(robot.id, 4);
        assert!(robot.can_move);
    }
}
