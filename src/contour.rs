//! Crack-following boundary tracer.
//!
//! Boundaries run along pixel edges, so every vertex sits on an integer
//! lattice point and two regions sharing an edge produce identical vertices.
//! The walk keeps the traced set on its right-hand side, which in y-down
//! canvas coordinates makes outer boundaries clockwise on screen.

use imageproc::region_labelling::Connectivity;

use crate::geometry::{Point, signed_area2};
use crate::region::{Region, RegionMap};
use crate::{VectorizeError, VectorizeResult};

/// Whether a contour bounds a region from outside or a hole from inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourKind {
    Outer,
    Hole,
}

/// Traversal direction on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// Closed lattice boundary. The first point is not repeated at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub kind: ContourKind,
    pub points: Vec<Point>,
}

impl Contour {
    pub fn winding(&self) -> Winding {
        if signed_area2(&self.points) >= 0.0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }

    /// Winding an outer contour or hole of this kind must have.
    pub fn expected_winding(&self) -> Winding {
        match self.kind {
            ContourKind::Outer => Winding::Clockwise,
            ContourKind::Hole => Winding::CounterClockwise,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Outer boundary and hole boundaries of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionContours {
    /// Index of the region in [`RegionMap::regions`].
    pub region: usize,
    pub palette_index: usize,
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    East,
    South,
    West,
    North,
}

impl Heading {
    fn step(self) -> (i64, i64) {
        match self {
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
            Heading::North => (0, -1),
        }
    }

    fn right(self) -> Heading {
        match self {
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
            Heading::North => Heading::East,
        }
    }

    fn left(self) -> Heading {
        match self {
            Heading::East => Heading::North,
            Heading::South => Heading::East,
            Heading::West => Heading::South,
            Heading::North => Heading::West,
        }
    }

    /// Pixels ahead-left and ahead-right of vertex `(vx, vy)`.
    fn ahead(self, vx: i64, vy: i64) -> ((i64, i64), (i64, i64)) {
        match self {
            Heading::East => ((vx, vy - 1), (vx, vy)),
            Heading::South => ((vx, vy), (vx - 1, vy)),
            Heading::West => ((vx - 1, vy), (vx - 1, vy - 1)),
            Heading::North => ((vx - 1, vy - 1), (vx, vy - 1)),
        }
    }
}

/// Walk the boundary of the set described by `inside`, starting on the top edge of
/// `start`, which must be the set's first pixel in raster order.
///
/// With [`Connectivity::Eight`] diagonal neighbours stay on one boundary; with
/// [`Connectivity::Four`] the walk turns away from them. The result is clockwise.
pub fn trace_boundary<F>(
    inside: F,
    start: (i64, i64),
    connectivity: Connectivity,
    max_steps: usize,
) -> VectorizeResult<Vec<(i64, i64)>>
where
    F: Fn(i64, i64) -> bool,
{
    if !inside(start.0, start.1) || inside(start.0, start.1 - 1) {
        return Err(VectorizeError::InvalidGeometry(format!(
            "trace start {start:?} is not on a top boundary edge"
        )));
    }

    let mut vertex = start;
    let mut heading = Heading::East;
    let mut points = vec![start];
    loop {
        let (left, right) = heading.ahead(vertex.0, vertex.1);
        let left_in = inside(left.0, left.1);
        let right_in = inside(right.0, right.1);
        heading = match (left_in, right_in) {
            (true, true) => heading.left(),
            (false, true) => heading,
            (true, false) => match connectivity {
                Connectivity::Eight => heading.left(),
                Connectivity::Four => heading.right(),
            },
            (false, false) => heading.right(),
        };
        if vertex == start && heading == Heading::East && points.len() > 1 {
            break;
        }
        let (dx, dy) = heading.step();
        vertex = (vertex.0 + dx, vertex.1 + dy);
        if vertex != start {
            points.push(vertex);
        }
        if points.len() > max_steps {
            return Err(VectorizeError::InvalidGeometry(format!(
                "boundary starting at {start:?} did not close within {max_steps} steps"
            )));
        }
    }
    Ok(points)
}

fn to_points(lattice: &[(i64, i64)]) -> Vec<Point> {
    lattice
        .iter()
        .map(|&(x, y)| Point::new(x as f64, y as f64))
        .collect()
}

/// Pixel on the left of the lattice edge `a -> b`. The traced set is on the
/// right, so this pixel is always outside it.
pub fn outside_pixel(a: Point, b: Point) -> (i64, i64) {
    let d = b - a;
    let mid = a.lerp(b, 0.5);
    (
        (mid.x + 0.5 * d.y).floor() as i64,
        (mid.y - 0.5 * d.x).floor() as i64,
    )
}

/// Region across each edge of a lattice contour, `None` for background or
/// dropped pixels. Edge `i` runs from point `i` to point `i + 1`.
pub fn edge_neighbours(map: &RegionMap, contour: &Contour) -> Vec<Option<usize>> {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let (x, y) = outside_pixel(contour.points[i], contour.points[(i + 1) % n]);
            map.owner(x, y)
        })
        .collect()
}

/// Trace the outer boundary and every hole boundary of `region`.
///
/// Outer boundaries wind clockwise and holes counter-clockwise; a mismatch is
/// reported as an internal error.
pub fn trace_region(map: &RegionMap, region: &Region) -> VectorizeResult<RegionContours> {
    let start = (region.start.0 as i64, region.start.1 as i64);
    let outer = trace_boundary(
        |x, y| map.contains(region.id, x, y),
        start,
        Connectivity::Eight,
        4 * region.area + 4,
    )?;
    let outer = Contour {
        kind: ContourKind::Outer,
        points: to_points(&outer),
    };

    let mut holes = Vec::with_capacity(region.holes.len());
    for hole in &region.holes {
        let start = (hole.start.0 as i64, hole.start.1 as i64);
        let mut lattice = trace_boundary(
            |x, y| region.hole_contains(hole, x, y),
            start,
            Connectivity::Four,
            4 * hole.area + 4,
        )?;
        // Keep the region, not the hole, on the right-hand side.
        lattice.reverse();
        holes.push(Contour {
            kind: ContourKind::Hole,
            points: to_points(&lattice),
        });
    }

    let contours = RegionContours {
        region: region.id,
        palette_index: region.palette_index,
        outer,
        holes,
    };
    check_winding(&contours)?;
    Ok(contours)
}

/// Verify outer and hole contours wind in opposite directions.
pub fn check_winding(contours: &RegionContours) -> VectorizeResult<()> {
    for contour in std::iter::once(&contours.outer).chain(contours.holes.iter()) {
        if contour.len() < 4 {
            return Err(VectorizeError::InvalidGeometry(format!(
                "region {} has a {:?} contour with only {} points",
                contours.region,
                contour.kind,
                contour.len()
            )));
        }
        if contour.winding() != contour.expected_winding() {
            return Err(VectorizeError::Internal(format!(
                "region {} has a {:?} contour winding {:?}",
                contours.region,
                contour.kind,
                contour.winding()
            )));
        }
    }
    Ok(())
}
