//! Venue footprint and point containment.
//!
//! The venue is a simple quadrilateral given by four corners. Containment splits it into
//! two triangles along an interior diagonal and runs a same-side (cross product sign) test
//! on each, then double-checks the corner bounding box.
//!
//! ## Edge policy
//!
//! The footprint is a closed set: a point exactly on an edge, a corner, or the shared
//! diagonal is inside. Both triangles use the same non-strict test, so there are no
//! gaps along the diagonal.

use crate::components::Vec3;
use crate::config::BoundaryCorners;
use crate::error::BoundaryError;
use bevy_ecs::prelude::*;
use rand::Rng;

/// Smallest triangle area (in square world units) accepted for either half of the quad.
const MIN_TRIANGLE_AREA: f32 = 1e-4;

/// Signed doubled area of the triangle (o, a, b) in the ground plane.
#[inline]
fn cross(o: Vec3, a: Vec3, b: Vec3) -> f32 {
    (a.x - o.x) * (b.z - o.z) - (a.z - o.z) * (b.x - o.x)
}

/// Closed point-in-triangle test. Winding order does not matter.
#[inline]
fn in_triangle(tri: &[Vec3; 3], p: Vec3) -> bool {
    let d1 = cross(tri[0], tri[1], p);
    let d2 = cross(tri[1], tri[2], p);
    let d3 = cross(tri[2], tri[0], p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Whether segments (a, b) and (c, d) cross at a single interior point.
fn segments_cross(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// The venue footprint.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct AreaBoundary {
    corners: BoundaryCorners,
    /// The two halves, split along whichever diagonal lies inside the quad.
    triangles: [[Vec3; 3]; 2],
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
}

impl AreaBoundary {
    /// Build a boundary from its corners, rejecting shapes that would break containment.
    pub fn new(
        front_left: Vec3,
        front_right: Vec3,
        back_left: Vec3,
        back_right: Vec3,
    ) -> Result<Self, BoundaryError> {
        Self::from_corners(BoundaryCorners {
            front_left,
            front_right,
            back_left,
            back_right,
        })
    }

    pub fn from_corners(corners: BoundaryCorners) -> Result<Self, BoundaryError> {
        let BoundaryCorners {
            front_left: fl,
            front_right: fr,
            back_left: bl,
            back_right: br,
        } = corners;

        if ![fl, fr, bl, br].iter().all(Vec3::is_finite) {
            return Err(BoundaryError::NonFinite);
        }

        // Perimeter runs fl -> fr -> br -> bl -> fl.
        if segments_cross(fl, fr, br, bl) || segments_cross(fr, br, bl, fl) {
            return Err(BoundaryError::SelfIntersecting);
        }

        let triangles = if cross(fl, br, fr) * cross(fl, br, bl) < 0.0 {
            [[fl, bl, br], [fl, fr, br]]
        } else if cross(fr, bl, fl) * cross(fr, bl, br) < 0.0 {
            [[fr, br, bl], [fr, bl, fl]]
        } else {
            return Err(BoundaryError::Degenerate);
        };

        for tri in &triangles {
            if cross(tri[0], tri[1], tri[2]).abs() * 0.5 < MIN_TRIANGLE_AREA {
                return Err(BoundaryError::Degenerate);
            }
        }

        let xs = [fl.x, fr.x, bl.x, br.x];
        let zs = [fl.z, fr.z, bl.z, br.z];
        Ok(Self {
            corners,
            triangles,
            min_x: xs.iter().copied().fold(f32::INFINITY, f32::min),
            max_x: xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            min_z: zs.iter().copied().fold(f32::INFINITY, f32::min),
            max_z: zs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        })
    }

    /// Axis-aligned rectangle from `(min_x, min_z)` to `(max_x, max_z)`.
    pub fn rectangle(min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> Result<Self, BoundaryError> {
        Self::new(
            Vec3::new(min_x, 0.0, min_z),
            Vec3::new(max_x, 0.0, min_z),
            Vec3::new(min_x, 0.0, max_z),
            Vec3::new(max_x, 0.0, max_z),
        )
    }

    pub fn corners(&self) -> BoundaryCorners {
        self.corners
    }

    /// Whether a ground position lies on the venue footprint. The y coordinate is ignored.
    pub fn contains(&self, point: Vec3) -> bool {
        let in_bounds = point.x >= self.min_x
            && point.x <= self.max_x
            && point.z >= self.min_z
            && point.z <= self.max_z;
        in_bounds && self.triangles.iter().any(|tri| in_triangle(tri, point))
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Vec3 {
        let c = &self.corners;
        Vec3::new(
            (c.front_left.x + c.front_right.x + c.back_left.x + c.back_right.x) * 0.25,
            0.0,
            (c.front_left.z + c.front_right.z + c.back_left.z + c.back_right.z) * 0.25,
        )
    }

    /// A point strictly inside the footprint, whatever its shape.
    pub fn interior_point(&self) -> Vec3 {
        let [a, b, c] = self.triangles[0];
        Vec3::new((a.x + b.x + c.x) / 3.0, 0.0, (a.z + b.z + c.z) / 3.0)
    }

    /// `(min_x, max_x, min_z, max_z)` of the corners.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (self.min_x, self.max_x, self.min_z, self.max_z)
    }

    /// Uniform sample from the bounding box at height `y`. May land outside the footprint.
    pub fn sample_in_bounds<R: Rng + ?Sized>(&self, rng: &mut R, y: f32) -> Vec3 {
        let x = if self.max_x > self.min_x {
            rng.gen_range(self.min_x..self.max_x)
        } else {
            self.min_x
        };
        let z = if self.max_z > self.min_z {
            rng.gen_range(self.min_z..self.max_z)
        } else {
            self.min_z
        };
        Vec3::new(x, y, z)
    }

    /// Point just beyond the venue edge on the agent's side, `offset` past the bounding box.
    ///
    /// Measured from the bounding box centre, so the point is outside the box's
    /// circumscribed circle and therefore outside the venue.
    pub fn outward_point(&self, from: Vec3, offset: f32) -> Vec3 {
        let center = Vec3::new(
            (self.min_x + self.max_x) * 0.5,
            0.0,
            (self.min_z + self.max_z) * 0.5,
        );
        let mut dx = from.x - center.x;
        let mut dz = from.z - center.z;
        let len = (dx * dx + dz * dz).sqrt();
        if len < 1e-4 {
            dx = 0.0;
            dz = -1.0;
        } else {
            dx /= len;
            dz /= len;
        }
        let half_diag = {
            let w = self.max_x - self.min_x;
            let h = self.max_z - self.min_z;
            (w * w + h * h).sqrt() * 0.5
        };
        let reach = half_diag + offset;
        Vec3::new(center.x + dx * reach, from.y, center.z + dz * reach)
    }
}

impl Default for AreaBoundary {
    fn default() -> Self {
        let c = BoundaryCorners::default();
        // The default corners form a plain square, so the split is known up front.
        let (fl, fr, bl, br) = (c.front_left, c.front_right, c.back_left, c.back_right);
        Self {
            corners: c,
            triangles: [[fl, bl, br], [fl, fr, br]],
            min_x: fl.x,
            max_x: fr.x,
            min_z: fl.z,
            max_z: bl.z,
        }
    }
}
