//! # HRVO Core
//!
//! Local collision avoidance for a robot team sharing the field with robots it
//! does not control.
//!
//! Once per control tick the `Simulator` takes a snapshot of every robot and
//! the latest move commands, and produces a collision-free velocity for every
//! friendly robot using Hybrid Reciprocal Velocity Obstacles (HRVO).
//!
//! ## Modules
//!
//! - **structs**: geometry, kinematic state, world snapshot and command types
//! - **path**: waypoint paths followed by agents
//! - **kd_tree**: neighbor queries, rebuilt every tick
//! - **velocity_obstacle**: HRVO construction and velocity selection
//! - **agent**: per-robot state and the reciprocal / non-reciprocal behaviors
//! - **simulator**: population management and the fixed-step update
//!
//! Python bindings are behind the `python` feature; the `parallel` feature
//! runs each step phase on rayon.

pub mod agent;
pub mod config;
pub mod error;
pub mod kd_tree;
pub mod path;
#[cfg(feature = "python")]
mod python;
pub mod simulator;
pub mod structs;
pub mod velocity_obstacle;
pub mod visualization;

pub use agent::{Agent, AgentKind, AgentLimits, AvoidanceParams, VelocityUpdate};
pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use path::{AgentPath, PathPoint};
pub use simulator::{AgentId, Simulator};
pub use structs::{
    CommandSet, KinematicState, MovePrimitive, Point, Primitive, RobotId, RobotObservation,
    TeamSide, Vector2D, WorldSnapshot,
};
pub use velocity_obstacle::VelocityObstacle;
pub use visualization::{Circle, HrvoVisualization};
