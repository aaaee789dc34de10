//! Robot footprint polygon math: parsing, padding, radii and world-frame
//! transforms.

use glam::Vec2;

use crate::types::{CostmapError, Pose2};

/// Robot footprint polygon in the robot frame (meters), ordered vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    points: Vec<Vec2>,
}

impl Footprint {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// A polygon needs at least three vertices.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Parse a bracketed point list like `[[0.16, 0.16], [0.16, -0.16], ...]`.
    ///
    /// Fails on malformed syntax, fewer than three points, or non-finite
    /// coordinates.
    pub fn parse(s: &str) -> Result<Self, CostmapError> {
        let malformed = || CostmapError::Config(format!("malformed footprint string: {s:?}"));

        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(malformed)?;

        let mut points = Vec::new();
        let mut rest = inner.trim_start();
        while !rest.is_empty() {
            let after_open = rest.strip_prefix('[').ok_or_else(malformed)?;
            let close = after_open.find(']').ok_or_else(malformed)?;
            let mut coords = after_open[..close].split(',');
            let x = parse_coordinate(coords.next(), s)?;
            let y = parse_coordinate(coords.next(), s)?;
            if coords.next().is_some() {
                return Err(malformed());
            }
            points.push(Vec2::new(x, y));

            rest = after_open[close + 1..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        if points.len() < 3 {
            return Err(CostmapError::Config(format!(
                "footprint needs at least three points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Expand every vertex away from the origin by `padding`, component-wise.
    /// A zero coordinate is left alone.
    ///
    /// Assumes the polygon is simple and roughly centered on the origin, as
    /// typical robot shapes are; padding such a polygon keeps it simple.
    pub fn padded(&self, padding: f32) -> Footprint {
        let pad = |v: f32| {
            if v > 0.0 {
                v + padding
            } else if v < 0.0 {
                v - padding
            } else {
                v
            }
        };
        Footprint {
            points: self
                .points
                .iter()
                .map(|p| Vec2::new(pad(p.x), pad(p.y)))
                .collect(),
        }
    }

    /// Rotate by the pose yaw, then translate to the pose position.
    pub fn transform(&self, pose: Pose2) -> Footprint {
        let rotation = Vec2::from_angle(pose.yaw);
        Footprint {
            points: self
                .points
                .iter()
                .map(|p| rotation.rotate(*p) + pose.position)
                .collect(),
        }
    }

    /// Shortest distance from the origin to any edge of the polygon. Inside
    /// this radius the robot collides regardless of orientation.
    pub fn inscribed_radius(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let mut min = f32::INFINITY;
        for (i, &a) in self.points.iter().enumerate() {
            let b = self.points[(i + 1) % self.points.len()];
            min = min.min(distance_to_segment(Vec2::ZERO, a, b));
        }
        min
    }

    /// Distance from the origin to the furthest vertex.
    pub fn circumscribed_radius(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.length())
            .fold(0.0, f32::max)
    }
}

fn parse_coordinate(token: Option<&str>, source: &str) -> Result<f32, CostmapError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CostmapError::Config(format!("malformed footprint string: {source:?}")))?;
    let value: f32 = token.parse().map_err(|_| {
        CostmapError::Config(format!("bad footprint coordinate {token:?} in {source:?}"))
    })?;
    if !value.is_finite() {
        return Err(CostmapError::Config(format!(
            "non-finite footprint coordinate {token:?} in {source:?}"
        )));
    }
    Ok(value)
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
