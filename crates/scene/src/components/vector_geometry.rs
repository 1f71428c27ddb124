use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

/// A single coordinate pair: `[lng, lat]` for geographic data, `[u, v]` in
/// `[0, 1]` for tile-local data. Extra ordinates (altitude) are ignored.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position(pub [f64; 2]);

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self([x, y])
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<f64>::deserialize(deserializer)?;
        match raw.as_slice() {
            [x, y, ..] => Ok(Position([*x, *y])),
            _ => Err(D::Error::invalid_length(raw.len(), &"at least two ordinates")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VectorGeometryKind {
    Point,
    Line,
    Area,
}

/// GeoJSON-shaped geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

/// One constituent of a possibly multi-part geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleGeometry<'a> {
    Point(&'a Position),
    Line(&'a [Position]),
    Area(&'a [Vec<Position>]),
}

impl SimpleGeometry<'_> {
    pub fn kind(&self) -> VectorGeometryKind {
        match self {
            SimpleGeometry::Point(_) => VectorGeometryKind::Point,
            SimpleGeometry::Line(_) => VectorGeometryKind::Line,
            SimpleGeometry::Area(_) => VectorGeometryKind::Area,
        }
    }

    pub fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            SimpleGeometry::Point(p) => Box::new(std::iter::once(*p)),
            SimpleGeometry::Line(line) => Box::new(line.iter()),
            SimpleGeometry::Area(rings) => Box::new(rings.iter().flatten()),
        }
    }
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point {
            coordinates: Position::new(x, y),
        }
    }

    /// Breaks multi-geometries (and collections, recursively) into simple parts,
    /// preserving coordinate order.
    pub fn flatten(&self) -> Vec<SimpleGeometry<'_>> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<SimpleGeometry<'a>>) {
        match self {
            Geometry::Point { coordinates } => out.push(SimpleGeometry::Point(coordinates)),
            Geometry::MultiPoint { coordinates } => {
                out.extend(coordinates.iter().map(SimpleGeometry::Point))
            }
            Geometry::LineString { coordinates } => out.push(SimpleGeometry::Line(coordinates)),
            Geometry::MultiLineString { coordinates } => {
                out.extend(coordinates.iter().map(|l| SimpleGeometry::Line(l)))
            }
            Geometry::Polygon { coordinates } => out.push(SimpleGeometry::Area(coordinates)),
            Geometry::MultiPolygon { coordinates } => {
                out.extend(coordinates.iter().map(|p| SimpleGeometry::Area(p)))
            }
            Geometry::GeometryCollection { geometries } => {
                for g in geometries {
                    g.flatten_into(out);
                }
            }
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.flatten().iter().map(|g| g.positions().count()).sum()
    }
}
