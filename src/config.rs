//! # Simulator Configuration
//!
//! Robot constants and avoidance policy knobs. Every value here is a tunable,
//! not a correctness requirement; the defaults suit small-size league robots.

use crate::error::SimulatorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Physical robot radius, the minimum agent radius (m).
    pub robot_radius: f64,
    /// Radius added to friendly agents at full speed (m).
    pub friendly_radius_inflation: f64,
    /// Radius added to enemy agents at full speed (m).
    pub enemy_radius_inflation: f64,
    /// Speed cap before any command arrives (m/s).
    pub robot_max_speed: f64,
    /// Friendly acceleration limit (m/s^2).
    pub robot_max_acceleration: f64,
    /// Enemy acceleration limit. Zero keeps enemies at their observed velocity.
    pub enemy_max_acceleration: f64,
    /// Speed and acceleration given to robots that can not move.
    pub immobile_limit: f64,
    /// Neighbors farther than this are ignored (m).
    pub max_neighbor_search_dist: f64,
    /// Upper bound on neighbors considered per agent.
    pub max_neighbors: usize,
    /// Share of the avoidance an agent takes on itself; 0.5 is symmetric.
    pub reciprocity: f64,
    /// How far ahead a newly seen enemy's velocity is extrapolated (s).
    pub enemy_extrapolation_horizon: f64,
    /// Capture radius as a fraction of the distance covered in one tick.
    pub path_radius_scale: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            robot_radius: 0.09,
            friendly_radius_inflation: 0.05,
            enemy_radius_inflation: 0.06,
            robot_max_speed: 3.0,
            robot_max_acceleration: 3.0,
            enemy_max_acceleration: 0.0,
            immobile_limit: 1e-4,
            max_neighbor_search_dist: 2.5,
            max_neighbors: 15,
            reciprocity: 0.5,
            enemy_extrapolation_horizon: 5.0,
            path_radius_scale: 0.5,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if !(self.robot_radius > 0.0) {
            return Err(SimulatorError::InvalidConfig("robot_radius must be positive"));
        }
        if self.friendly_radius_inflation < 0.0 || self.enemy_radius_inflation < 0.0 {
            return Err(SimulatorError::InvalidConfig("radius inflation must not be negative"));
        }
        if self.robot_max_speed < 0.0
            || self.robot_max_acceleration < 0.0
            || self.enemy_max_acceleration < 0.0
            || self.immobile_limit < 0.0
        {
            return Err(SimulatorError::InvalidConfig(
                "speed and acceleration limits must not be negative",
            ));
        }
        if self.max_neighbor_search_dist < 0.0 {
            return Err(SimulatorError::InvalidConfig(
                "max_neighbor_search_dist must not be negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.reciprocity) {
            return Err(SimulatorError::InvalidConfig("reciprocity must lie in [0, 1]"));
        }
        if self.enemy_extrapolation_horizon < 0.0 {
            return Err(SimulatorError::InvalidConfig(
                "enemy_extrapolation_horizon must not be negative",
            ));
        }
        if !(self.path_radius_scale > 0.0) {
            return Err(SimulatorError::InvalidConfig("path_radius_scale must be positive"));
        }
        Ok(())
    }

    /// Capture radius for a robot capped at `max_speed`.
    pub fn path_radius(&self, max_speed: f64, time_step: f64) -> f64 {
        max_speed * time_step * self.path_radius_scale
    }
}
