use crate::structs::RobotId;
use thiserror::Error;

/// Contract violations by the caller or the upstream command source.
///
/// A rejected call leaves the simulator untouched.
#[derive(Debug, Error, PartialEq)]
pub enum SimulatorError {
    /// The simulator was created with a zero time step.
    #[error("time step not set when attempting to do step")]
    ZeroTimeStep,

    /// A move primitive carried fewer than two path points.
    #[error("malformed path for robot {robot_id}: {points} point(s), at least 2 required")]
    MalformedPath { robot_id: RobotId, points: usize },

    /// A move primitive carried a negative or non-finite speed.
    #[error("invalid speed for robot {robot_id}: max {max_speed}, final {final_speed}")]
    InvalidSpeed {
        robot_id: RobotId,
        max_speed: f64,
        final_speed: f64,
    },

    /// Configuration values that can not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
