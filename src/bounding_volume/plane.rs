//! Half-space used by convex culling queries.

use crate::math::{Point, Real, Vector};

/// A plane (half-space boundary) described by its outward normal and its bias.
///
/// The plane is the set of points `p` such that `normal · p == bias`. Points with a
/// positive [`Plane::signed_distance`] lie on the outside (the side the normal points
/// to). A convex culling region is described by a slice of such planes, all with
/// outward normals.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Plane {
    /// The outward normal of the plane.
    ///
    /// This is not required to be a unit vector, but signed distances are only
    /// meaningful as distances when it is.
    pub normal: Vector<Real>,
    /// The plane bias, i.e. `normal · p` for any point `p` on the plane.
    pub bias: Real,
}

impl Plane {
    /// Creates a plane from its outward normal and bias.
    #[inline]
    pub fn new(normal: Vector<Real>, bias: Real) -> Self {
        Self { normal, bias }
    }

    /// Creates a plane from its outward normal and a point lying on the plane.
    #[inline]
    pub fn from_point(normal: Vector<Real>, point: &Point<Real>) -> Self {
        Self {
            normal,
            bias: normal.dot(&point.coords),
        }
    }

    /// The signed distance between the given point and this plane.
    ///
    /// The result is positive when the point is on the side the normal points to.
    #[inline]
    pub fn signed_distance(&self, point: &Point<Real>) -> Real {
        self.normal.dot(&point.coords) - self.bias
    }
}
