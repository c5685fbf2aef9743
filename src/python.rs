//! # Python Bindings
//!
//! `hrvo_core.Simulator` wraps the Rust simulator for the Python side of the
//! stack. Points and vectors cross the boundary as `(x, y)` tuples.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeMap;

use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::simulator::Simulator;
use crate::structs::{
    CommandSet, MovePrimitive, Point, Primitive, RobotId, RobotObservation, Vector2D,
    WorldSnapshot,
};

/// `(id, (x, y), (vx, vy), can_move)`
type PyObservation = (RobotId, (f64, f64), (f64, f64), bool);

impl From<SimulatorError> for PyErr {
    fn from(error: SimulatorError) -> Self {
        match error {
            SimulatorError::ZeroTimeStep => PyRuntimeError::new_err(error.to_string()),
            _ => PyValueError::new_err(error.to_string()),
        }
    }
}

fn observations(robots: Vec<PyObservation>) -> Vec<RobotObservation> {
    robots
        .into_iter()
        .map(|(id, (x, y), (vx, vy), can_move)| RobotObservation {
            id,
            position: Point::new(x, y),
            velocity: Vector2D::new(vx, vy),
            can_move,
        })
        .collect()
}

#[pyclass(name = "Simulator")]
pub struct PySimulator {
    inner: Simulator,
}

#[pymethods]
impl PySimulator {
    #[new]
    #[pyo3(signature = (time_step, max_neighbors=None, reciprocity=None))]
    fn new(
        time_step: f64,
        max_neighbors: Option<usize>,
        reciprocity: Option<f64>,
    ) -> PyResult<Self> {
        let defaults = SimulatorConfig::default();
        let config = SimulatorConfig {
            max_neighbors: max_neighbors.unwrap_or(defaults.max_neighbors),
            reciprocity: reciprocity.unwrap_or(defaults.reciprocity),
            ..defaults
        };
        Ok(PySimulator {
            inner: Simulator::new(time_step, config)?,
        })
    }

    fn reconcile(&mut self, friendly: Vec<PyObservation>, enemy: Vec<PyObservation>) {
        self.inner
            .reconcile(&WorldSnapshot::new(observations(friendly), observations(enemy)));
    }

    /// `moves` maps robot id to `(path, final_speed, max_speed)`.
    #[pyo3(signature = (moves, stops=Vec::new()))]
    fn apply_command(
        &mut self,
        moves: BTreeMap<RobotId, (Vec<(f64, f64)>, f64, f64)>,
        stops: Vec<RobotId>,
    ) -> PyResult<()> {
        let mut commands: CommandSet = moves
            .into_iter()
            .map(|(robot_id, (path, final_speed, max_speed))| {
                let path = path.into_iter().map(|(x, y)| Point::new(x, y)).collect();
                (robot_id, Primitive::Move(MovePrimitive::new(path, final_speed, max_speed)))
            })
            .collect();
        commands.extend(stops.into_iter().map(|robot_id| (robot_id, Primitive::Stop)));

        Ok(self.inner.apply_command(&commands)?)
    }

    fn step(&mut self) -> PyResult<()> {
        Ok(self.inner.step()?)
    }

    fn robot_velocity(&self, robot_id: RobotId) -> (f64, f64) {
        let velocity = self.inner.robot_velocity(robot_id);
        (velocity.x, velocity.y)
    }

    fn update_robot_velocity(&mut self, robot_id: RobotId, velocity: (f64, f64)) {
        self.inner
            .update_robot_velocity(robot_id, Vector2D::new(velocity.0, velocity.1));
    }

    fn robot_position(&self, robot_id: RobotId) -> Option<(f64, f64)> {
        let id = self.inner.friendly_agent(robot_id)?;
        self.inner.position(id).map(|p| (p.x, p.y))
    }

    fn has_reached_goal(&self, robot_id: RobotId) -> Option<bool> {
        let id = self.inner.friendly_agent(robot_id)?;
        self.inner.has_reached_goal(id)
    }

    #[getter]
    fn global_time(&self) -> f64 {
        self.inner.global_time()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

#[pymodule]
fn hrvo_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySimulator>()?;
    Ok(())
}
