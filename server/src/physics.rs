use crate::constants::{GALAXY_EDGE, GALAXY_QUADRANTS, QUADRANT_SIZE};
use serde::{Deserialize, Serialize};
use shared::NetPoint;

///Represents a vector in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector3 {
    ///Value along the x-axis. Positive direction is east.
    pub x: f64,
    ///Value along the y-axis. Positive direction is south.
    pub y: f64,
    ///Value along the z-axis. Positive direction is up.
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    ///Returns the squared magnitude of the vector.
    pub fn magnitude_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vector3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector3::default()
        } else {
            self.scale(1.0 / mag)
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector3 {
        Vector3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    ///Returns `self - other`.
    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn distance_sq(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude_sq()
    }

    pub fn to_net(&self) -> NetPoint {
        NetPoint::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

/// Integer quadrant address, each axis in [1, 10].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quadrant {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Quadrant {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Quadrant { x, y, z }
    }

    pub fn is_valid(&self) -> bool {
        let ok = |v: i32| (1..=GALAXY_QUADRANTS).contains(&v);
        ok(self.x) && ok(self.y) && ok(self.z)
    }

    pub fn as_array(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Galactic coordinates of the quadrant origin.
    pub fn origin(&self) -> Vector3 {
        Vector3::new(
            (self.x - 1) as f64 * QUADRANT_SIZE,
            (self.y - 1) as f64 * QUADRANT_SIZE,
            (self.z - 1) as f64 * QUADRANT_SIZE,
        )
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

///Converts a quadrant and sector pair into absolute galactic coordinates.
pub fn to_galactic(quadrant: Quadrant, sector: Vector3) -> Vector3 {
    quadrant.origin().add(&sector)
}

///Splits absolute galactic coordinates back into quadrant and sector.
pub fn from_galactic(position: Vector3) -> (Quadrant, Vector3) {
    let axis = |v: f64| ((v / QUADRANT_SIZE).floor() as i32 + 1).clamp(1, GALAXY_QUADRANTS);
    let quadrant = Quadrant::new(axis(position.x), axis(position.y), axis(position.z));
    (quadrant, position.sub(&quadrant.origin()))
}

///Clamps galactic coordinates into the galaxy. Returns whether any axis was clamped.
pub fn clamp_galactic(position: Vector3) -> (Vector3, bool) {
    let clamped = Vector3::new(
        position.x.clamp(0.0, GALAXY_EDGE),
        position.y.clamp(0.0, GALAXY_EDGE),
        position.z.clamp(0.0, GALAXY_EDGE),
    );
    (clamped, clamped != position)
}

///Unit travel vector for a compass heading (0 = north, clockwise) and an
///elevation mark, both in degrees.
pub fn direction(heading: f64, mark: f64) -> Vector3 {
    let h = heading.to_radians();
    let m = mark.to_radians();
    Vector3::new(m.cos() * h.sin(), m.cos() * -h.cos(), m.sin())
}

///Heading and mark in degrees that point along `delta`. A zero vector gives (0, 0).
pub fn heading_mark(delta: Vector3) -> (f64, f64) {
    let dist = delta.magnitude();
    if dist < 1e-9 {
        return (0.0, 0.0);
    }
    let mut heading = delta.x.atan2(-delta.y).to_degrees();
    if heading < 0.0 {
        heading += 360.0;
    }
    let mark = (delta.z / dist).clamp(-1.0, 1.0).asin().to_degrees();
    (heading, mark)
}
