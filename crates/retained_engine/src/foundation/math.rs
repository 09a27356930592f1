//! Math types and spatial primitives
//!
//! Wraps nalgebra behind engine-local aliases and provides the bounding
//! volume and frustum types used by the spatial index and render culling.

/// 3D vector type
pub type Vec3 = nalgebra::Vector3<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// 4x4 matrix type
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Axis-aligned bounding box used as the bounding hull throughout the engine
///
/// An empty hull is represented with inverted bounds (`min > max`), so that
/// enclosing anything into an empty hull yields that thing's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl BoundingBox {
    /// The empty hull: union identity, contains nothing
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a bounding box centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Check whether this hull is empty
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents of the bounding box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Smallest hull enclosing both `self` and `other`
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BoundingBox {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Grow this hull in place to enclose `other`
    pub fn enclose(&mut self, other: &BoundingBox) {
        *self = self.union(other);
    }

    /// Check if this hull fully contains another hull
    ///
    /// The empty hull contains nothing and is contained by everything
    /// non-empty.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Check if this hull contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this hull intersects another hull
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Test ray intersection using the slab method
    ///
    /// Returns the distance to the entry point if the ray intersects,
    /// `None` otherwise.
    pub fn intersect_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let inv_dir = Vec3::new(
            if ray_dir.x != 0.0 { 1.0 / ray_dir.x } else { f32::INFINITY },
            if ray_dir.y != 0.0 { 1.0 / ray_dir.y } else { f32::INFINITY },
            if ray_dir.z != 0.0 { 1.0 / ray_dir.z } else { f32::INFINITY },
        );

        let t1 = (self.min.x - ray_origin.x) * inv_dir.x;
        let t2 = (self.max.x - ray_origin.x) * inv_dir.x;
        let t3 = (self.min.y - ray_origin.y) * inv_dir.y;
        let t4 = (self.max.y - ray_origin.y) * inv_dir.y;
        let t5 = (self.min.z - ray_origin.z) * inv_dir.z;
        let t6 = (self.max.z - ray_origin.z) * inv_dir.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        if tmax >= tmin && tmax >= 0.0 {
            Some(tmin.max(0.0))
        } else {
            None
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// View frustum used for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, top, bottom, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// A frustum whose planes reject nothing (useful when culling is off)
    pub fn unbounded() -> Self {
        let open = Plane {
            normal: Vec3::new(0.0, 0.0, 0.0),
            distance: 0.0,
        };
        Self { planes: [open; 6] }
    }

    /// Build an axis-aligned box frustum enclosing the given region
    ///
    /// Cheap stand-in for a perspective frustum in tests and orthographic
    /// views: an object intersects the frustum iff its bounds intersect
    /// the box.
    pub fn from_box(bounds: &BoundingBox) -> Self {
        let planes = [
            Plane { normal: Vec3::new(1.0, 0.0, 0.0), distance: -bounds.min.x },
            Plane { normal: Vec3::new(-1.0, 0.0, 0.0), distance: bounds.max.x },
            Plane { normal: Vec3::new(0.0, 1.0, 0.0), distance: -bounds.min.y },
            Plane { normal: Vec3::new(0.0, -1.0, 0.0), distance: bounds.max.y },
            Plane { normal: Vec3::new(0.0, 0.0, 1.0), distance: -bounds.min.z },
            Plane { normal: Vec3::new(0.0, 0.0, -1.0), distance: bounds.max.z },
        ];
        Self { planes }
    }

    /// Check if a bounding box is inside or intersects the frustum
    pub fn intersects_bounds(&self, bounds: &BoundingBox) -> bool {
        if bounds.is_empty() {
            return false;
        }
        for plane in &self.planes {
            // Closest AABB corner along the plane normal
            let mut p = bounds.min;
            if plane.normal.x >= 0.0 {
                p.x = bounds.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = bounds.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = bounds.max.z;
            }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(origin: Vec3) -> BoundingBox {
        BoundingBox::new(origin, origin + Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_empty_hull_union_identity() {
        let hull = unit_box_at(Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(BoundingBox::EMPTY.union(&hull), hull);
        assert_eq!(hull.union(&BoundingBox::EMPTY), hull);
        assert!(BoundingBox::EMPTY.is_empty());
    }

    #[test]
    fn test_union_encloses_both() {
        let a = unit_box_at(Vec3::new(0.0, 0.0, 0.0));
        let b = unit_box_at(Vec3::new(5.0, 5.0, 5.0));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn test_containment() {
        let outer = BoundingBox::new(Vec3::new(-2.0, -2.0, -2.0), Vec3::new(2.0, 2.0, 2.0));
        let inner = unit_box_at(Vec3::new(0.0, 0.0, 0.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&BoundingBox::EMPTY));
    }

    #[test]
    fn test_intersect_ray() {
        let hull = unit_box_at(Vec3::new(0.0, 0.0, 0.0));
        let hit = hull.intersect_ray(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert!(hit.is_some());
        let miss = hull.intersect_ray(Vec3::new(-1.0, 5.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert!(miss.is_none());
    }

    #[test]
    fn test_box_frustum_intersection() {
        let frustum = Frustum::from_box(&BoundingBox::new(
            Vec3::new(-10.0, -10.0, -10.0),
            Vec3::new(10.0, 10.0, 10.0),
        ));
        assert!(frustum.intersects_bounds(&unit_box_at(Vec3::new(0.0, 0.0, 0.0))));
        assert!(!frustum.intersects_bounds(&unit_box_at(Vec3::new(50.0, 0.0, 0.0))));
    }
}
