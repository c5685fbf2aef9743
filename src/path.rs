//! # Agent Paths
//!
//! An agent follows an ordered list of waypoints. A waypoint counts as reached
//! once the agent is within the path's capture radius of it, after which the
//! cursor moves to the next one. The cursor never moves backwards and never
//! moves past the final point.

use crate::structs::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    position: Point,
    speed: f64,
}

impl PathPoint {
    pub fn new(position: Point, speed: f64) -> Self {
        PathPoint { position, speed }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Speed the agent should hold when passing through this point.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentPath {
    points: Vec<PathPoint>,
    path_radius: f64,
    index: usize,
}

impl AgentPath {
    pub fn new(points: Vec<PathPoint>, path_radius: f64) -> Self {
        AgentPath {
            points,
            path_radius,
            index: 0,
        }
    }

    /// Single-point path that holds `position`.
    pub fn hold(position: Point, path_radius: f64) -> Self {
        AgentPath::new(vec![PathPoint::new(position, 0.0)], path_radius)
    }

    /// The point the agent is currently heading to, if any.
    pub fn current_path_point(&self) -> Option<&PathPoint> {
        self.points.get(self.index)
    }

    pub fn is_at_final_point(&self) -> bool {
        self.index + 1 >= self.points.len()
    }

    /// Moves to the next point. Does nothing once at the final point.
    pub fn advance(&mut self) {
        if !self.is_at_final_point() {
            self.index += 1;
        }
    }

    pub fn path_radius(&self) -> f64 {
        self.path_radius
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn final_point(&self) -> Option<&PathPoint> {
        self.points.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_point_path() -> AgentPath {
        AgentPath::new(
            vec![
                PathPoint::new(Point::new(1.0, 0.0), 2.0),
                PathPoint::new(Point::new(2.0, 0.0), 2.0),
                PathPoint::new(Point::new(3.0, 0.0), 0.0),
            ],
            0.1,
        )
    }

    #[test]
    fn test_path_starts_at_first_point() {
        let path = three_point_path();
        assert_eq!(path.index(), 0);
        assert_eq!(path.current_path_point().unwrap().position(), Point::new(1.0, 0.0));
        assert!(!path.is_at_final_point());
    }

    #[test]
    fn test_advance_stops_at_final_point() {
        let mut path = three_point_path();
        path.advance();
        path.advance();
        assert!(path.is_at_final_point());
        assert_eq!(path.index(), 2);

        // Advancing past the end is a no-op, the path never loops
        path.advance();
        path.advance();
        assert_eq!(path.index(), 2, "Cursor should not move past the final point");
        assert_eq!(path.current_path_point().unwrap().speed(), 0.0);
    }

    #[test]
    fn test_single_point_path_is_final() {
        let path = AgentPath::hold(Point::new(4.0, 4.0), 0.05);
        assert!(path.is_at_final_point());
        assert_eq!(path.path_radius(), 0.05);
        assert_eq!(path.final_point().unwrap().position(), Point::new(4.0, 4.0));
    }

    #[test]
    fn test_empty_path_has_no_current_point() {
        let mut path = AgentPath::new(Vec::new(), 0.1);
        assert!(path.current_path_point().is_none());
        assert!(path.is_at_final_point());
        path.advance();
        assert_eq!(path.index(), 0);
    }
}
