use foundation::math::{Mat4, Vec3};

use crate::components::{Geometry, Position, VectorGeometryKind};
use crate::viewport::Viewport;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub n: [f64; 3],
    pub d: f64,
}

impl Plane {
    pub fn new(n: [f64; 3], d: f64) -> Self {
        Self { n, d }
    }

    pub fn normalize(self) -> Self {
        let l2 = self.n[0] * self.n[0] + self.n[1] * self.n[1] + self.n[2] * self.n[2];
        if l2 <= 0.0 {
            return self;
        }
        let inv = 1.0 / l2.sqrt();
        Self {
            n: [self.n[0] * inv, self.n[1] * inv, self.n[2] * inv],
            d: self.d * inv,
        }
    }

    pub fn distance(&self, p: Vec3) -> f64 {
        Vec3::from(self.n).dot(p) + self.d
    }
}

/// View frustum as an ordered set of clipping planes.
///
/// Convention:
/// - A point `p` is inside iff `plane.distance(p) >= 0` for all planes.
/// - Planes are expected to be in common space.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    planes: Vec<Plane>,
}

impl Frustum {
    pub fn new(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Build a frustum from a row-major view-projection matrix.
    ///
    /// This expects the clip-space convention where visible points satisfy:
    /// - `-w <= x <= w`
    /// - `-w <= y <= w`
    /// - `0 <= z <= w` (z0)
    pub fn from_view_proj_row_major(m: &Mat4) -> Self {
        let [r0, r1, r2, r3] = m.m;
        let plane = |sign: f64, r: [f64; 4]| {
            Plane::new(
                [r3[0] + sign * r[0], r3[1] + sign * r[1], r3[2] + sign * r[2]],
                r3[3] + sign * r[3],
            )
            .normalize()
        };

        // left, right, bottom, top, near (z0), far
        Self::new(vec![
            plane(1.0, r0),
            plane(-1.0, r0),
            plane(1.0, r1),
            plane(-1.0, r1),
            Plane::new([r2[0], r2[1], r2[2]], r2[3]).normalize(),
            plane(-1.0, r2),
        ])
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance(p) >= 0.0)
    }
}

/// Where a geometry's coordinates live, and how to bring them into common space.
#[derive(Debug, Clone, Copy)]
pub enum CommonSpace<'a> {
    /// Tile-local coordinates mapped through the tile's own transform.
    Tile(&'a Mat4),
    /// Geographic coordinates projected directly by the viewport.
    Viewport(&'a dyn Viewport),
}

impl CommonSpace<'_> {
    pub fn apply(&self, p: &Position) -> Vec3 {
        match self {
            CommonSpace::Tile(m) => m.transform_point(Vec3::new(p.0[0], p.0[1], 0.0)),
            CommonSpace::Viewport(vp) => vp.project_position(p.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformedPart {
    pub kind: VectorGeometryKind,
    pub positions: Vec<Vec3>,
}

/// A geometry flattened into simple parts, every vertex in common space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedGeometry {
    pub parts: Vec<TransformedPart>,
}

impl TransformedGeometry {
    pub fn positions(&self) -> impl Iterator<Item = &Vec3> {
        self.parts.iter().flat_map(|p| p.positions.iter())
    }
}

pub fn transform_to_common_space(geometry: &Geometry, space: &CommonSpace<'_>) -> TransformedGeometry {
    let parts = geometry
        .flatten()
        .iter()
        .map(|part| TransformedPart {
            kind: part.kind(),
            positions: part.positions().map(|p| space.apply(p)).collect(),
        })
        .collect();
    TransformedGeometry { parts }
}

/// Conservative containment: true if any vertex is inside every plane.
///
/// Not an exact polygon/frustum intersection; a polygon that covers the whole
/// view with all vertices outside is reported as not inside. Empty geometries
/// are never inside.
pub fn is_geometry_inside_frustum(geometry: &TransformedGeometry, frustum: &Frustum) -> bool {
    geometry.positions().any(|p| frustum.contains_point(*p))
}

/// Same test as [`is_geometry_inside_frustum`], transforming lazily so large
/// geometries stop at the first visible vertex.
pub fn geometry_intersects_frustum(
    geometry: &Geometry,
    space: &CommonSpace<'_>,
    frustum: &Frustum,
) -> bool {
    geometry
        .flatten()
        .iter()
        .any(|part| part.positions().any(|p| frustum.contains_point(space.apply(p))))
}
