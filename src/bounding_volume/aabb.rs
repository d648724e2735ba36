//! Axis Aligned Bounding Box.

use crate::bounding_volume::{BoundingVolume, Plane};
use crate::math::{Point, Real, Vector, DEFAULT_EPSILON, DIM};
use num::Bounded;

/// An Axis-Aligned Bounding Box (AABB).
///
/// An AABB is the simplest bounding volume, defined by its minimum and maximum corners.
/// It's called "axis-aligned" because its edges are always parallel to the coordinate
/// axes, making it very fast to test and compute.
///
/// The invariant `mins[i] <= maxs[i]` is expected to hold for valid boxes. The inverted
/// box returned by [`Aabb::new_invalid`] is the one deliberate exception: it acts as the
/// neutral element for merging, and every operation on this type tolerates it.
///
/// # Example
///
/// ```rust
/// # #[cfg(all(feature = "dim3", feature = "f32"))] {
/// use thicket3d::bounding_volume::Aabb;
/// use nalgebra::Point3;
///
/// let aabb = Aabb::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
/// assert!(aabb.contains_local_point(&Point3::origin()));
/// assert_eq!(aabb.center(), Point3::origin());
/// # }
/// ```
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct Aabb {
    /// The point with the smallest coordinates on each axis.
    pub mins: Point<Real>,
    /// The point with the greatest coordinates on each axis.
    pub maxs: Point<Real>,
}

impl Aabb {
    /// Creates a new AABB.
    ///
    /// `mins` must be smaller than `maxs` on every axis for the box to be valid.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Aabb {
        Aabb { mins, maxs }
    }

    /// Creates an invalid AABB with inverted bounds.
    ///
    /// The resulting AABB has `mins` set to maximum values and `maxs` set to minimum
    /// values. This is useful as an initial value for AABB merging algorithms (similar
    /// to starting a min operation with infinity).
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::max_value()).into(),
            Vector::repeat(-Real::max_value()).into(),
        )
    }

    /// Creates a new AABB from its center and half-extents.
    #[inline]
    pub fn from_half_extents(center: Point<Real>, half_extents: Vector<Real>) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Returns the center point of this AABB.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    /// Returns the half-extents of this AABB.
    #[inline]
    pub fn half_extents(&self) -> Vector<Real> {
        let half: Real = na::convert::<f64, Real>(0.5);
        (self.maxs - self.mins) * half
    }

    /// The extents of this AABB.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// Returns the volume of this AABB.
    ///
    /// - **2D**: Returns the area (width × height)
    /// - **3D**: Returns the volume (width × height × depth)
    #[inline]
    pub fn volume(&self) -> Real {
        let extents = self.extents();
        #[cfg(feature = "dim2")]
        return extents.x * extents.y;
        #[cfg(feature = "dim3")]
        return extents.x * extents.y * extents.z;
    }

    /// In 3D, returns the half-area. In 2D returns the half-perimeter of the AABB.
    ///
    /// This is the surface-area heuristic used to pick insertion siblings in a BVH.
    pub fn half_area_or_perimeter(&self) -> Real {
        #[cfg(feature = "dim2")]
        return self.half_perimeter();
        #[cfg(feature = "dim3")]
        return self.half_area();
    }

    /// The half perimeter of this AABB.
    #[cfg(feature = "dim2")]
    pub fn half_perimeter(&self) -> Real {
        let extents = self.extents();
        extents.x + extents.y
    }

    /// The half area of this AABB.
    #[cfg(feature = "dim3")]
    pub fn half_area(&self) -> Real {
        let extents = self.extents();
        extents.x * (extents.y + extents.z) + extents.y * extents.z
    }

    /// Does this AABB contain a point expressed in the same coordinate frame as `self`?
    #[inline]
    pub fn contains_local_point(&self, point: &Point<Real>) -> bool {
        for i in 0..DIM {
            if point[i] < self.mins[i] || point[i] > self.maxs[i] {
                return false;
            }
        }

        true
    }

    /// Does the segment from `from` to `to` intersect this AABB?
    ///
    /// This is a slab test clipping the segment parameter interval `[0, 1]` against
    /// every axis. Axis-parallel segments and degenerate (flat) boxes are handled.
    pub fn intersects_segment(&self, from: &Point<Real>, to: &Point<Real>) -> bool {
        let dir = to - from;
        let mut tmin: Real = 0.0;
        let mut tmax: Real = 1.0;

        for i in 0..DIM {
            if dir[i].abs() < DEFAULT_EPSILON {
                // The segment is parallel to this slab: it must start inside of it.
                if from[i] < self.mins[i] || from[i] > self.maxs[i] {
                    return false;
                }
            } else {
                let inv = 1.0 / dir[i];
                let mut t1 = (self.mins[i] - from[i]) * inv;
                let mut t2 = (self.maxs[i] - from[i]) * inv;

                if t1 > t2 {
                    core::mem::swap(&mut t1, &mut t2);
                }

                tmin = tmin.max(t1);
                tmax = tmax.min(t2);

                if tmin > tmax {
                    return false;
                }
            }
        }

        true
    }

    /// Does this AABB intersect the convex region delimited by the given planes?
    ///
    /// The planes must have outward normals: a point is inside the region when its
    /// signed distance to every plane is negative or zero. The test is conservative,
    /// i.e. a box overlapping no plane boundary but fully outside is always rejected,
    /// while a box near a corner of the region may be accepted even though it only
    /// touches the planes, not the region itself.
    pub fn intersects_planes(&self, planes: &[Plane]) -> bool {
        for plane in planes {
            // The box vertex that goes deepest inside the half-space.
            let mut support = self.mins;
            for i in 0..DIM {
                if plane.normal[i] > 0.0 {
                    support[i] = self.mins[i];
                } else {
                    support[i] = self.maxs[i];
                }
            }

            if plane.signed_distance(&support) > 0.0 {
                return false;
            }
        }

        true
    }
}

impl BoundingVolume for Aabb {
    #[inline]
    fn center(&self) -> Point<Real> {
        self.center()
    }

    #[inline]
    fn intersects(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    #[inline]
    fn contains(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.mins) && na::partial_ge(&self.maxs, &other.maxs)
    }

    #[inline]
    fn merge(&mut self, other: &Aabb) {
        self.mins = self.mins.inf(&other.mins);
        self.maxs = self.maxs.sup(&other.maxs);
    }

    #[inline]
    fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    #[inline]
    fn loosen(&mut self, amount: Real) {
        assert!(amount >= 0.0, "The loosening margin must be positive.");
        self.mins += Vector::repeat(-amount);
        self.maxs += Vector::repeat(amount);
    }

    #[inline]
    fn loosened(&self, amount: Real) -> Aabb {
        assert!(amount >= 0.0, "The loosening margin must be positive.");
        Aabb {
            mins: self.mins + Vector::repeat(-amount),
            maxs: self.maxs + Vector::repeat(amount),
        }
    }

    #[inline]
    fn measure(&self) -> Real {
        self.half_area_or_perimeter()
    }
}
