//! Corner detection and Ramer-Douglas-Peucker reduction of closed contours.

use crate::contour::{Contour, ContourKind};
use crate::geometry::{Point, perpendicular_distance};

/// Turn angle, in degrees, at or above which a point is a hard corner.
pub const CORNER_THRESHOLD_DEGREES: f64 = 60.0;

/// Largest neighbourhood, in samples, used to measure turn angles.
const MAX_CORNER_WINDOW: usize = 3;

/// A retained sample of a simplified contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoint {
    /// Index into [`SimplifiedContour::samples`].
    pub index: usize,
    /// Corners never get a curve smoothed across them.
    pub corner: bool,
}

/// A closed contour reduced to key points, keeping every original sample so the
/// fitter can work against the true boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedContour {
    pub kind: ContourKind,
    pub samples: Vec<Point>,
    /// Retained samples in contour order, sorted by index.
    pub keys: Vec<KeyPoint>,
}

impl SimplifiedContour {
    pub fn key_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.keys.iter().map(|k| self.samples[k.index])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Samples from key `i` to key `i + 1`, both ends included, wrapping at the end.
    pub fn span(&self, i: usize) -> Vec<Point> {
        let n = self.samples.len();
        let from = self.keys[i].index;
        let to = match self.keys.get(i + 1) {
            Some(next) => next.index,
            None => self.keys[0].index + n,
        };
        (from..=to).map(|j| self.samples[j % n]).collect()
    }
}

/// Reduce a closed contour, keeping corners and every sample that deviates more
/// than `tolerance` pixels from the simplified outline.
///
/// The anchors that split the loop into open spans do not depend on
/// `tolerance`, so a larger tolerance never keeps more points.
pub fn simplify(contour: &Contour, tolerance: f64) -> SimplifiedContour {
    let samples = contour.points.clone();
    let n = samples.len();
    if n < 3 {
        let keys = (0..n).map(|index| KeyPoint { index, corner: true }).collect();
        return SimplifiedContour {
            kind: contour.kind,
            samples,
            keys,
        };
    }

    let corners = detect_corners(&samples);
    let mut breaks = corners.clone();
    match corners.len() {
        0 => {
            breaks.push(0);
            breaks.push(farthest_from(&samples, 0));
        }
        1 => breaks.push(farthest_from(&samples, corners[0])),
        _ => {}
    }
    breaks.sort_unstable();
    breaks.dedup();

    let mut keep = vec![false; n];
    for (i, &from) in breaks.iter().enumerate() {
        let to = breaks.get(i + 1).copied().unwrap_or(breaks[0] + n);
        keep[from] = true;
        rdp_span(&samples, from, to, tolerance, &mut keep);
    }

    let mut is_corner = vec![false; n];
    for &c in &corners {
        is_corner[c] = true;
    }
    let keys = (0..n)
        .filter(|&i| keep[i])
        .map(|index| KeyPoint {
            index,
            corner: is_corner[index],
        })
        .collect();
    SimplifiedContour {
        kind: contour.kind,
        samples,
        keys,
    }
}

/// Key points of an open chain. Both ends are fixed corners; interior corners
/// are found within the chain only, so the result depends on nothing beyond it.
pub fn simplify_chain(points: &[Point], tolerance: f64) -> Vec<KeyPoint> {
    let n = points.len();
    if n < 3 {
        return (0..n).map(|index| KeyPoint { index, corner: true }).collect();
    }
    let mut is_corner = vec![false; n];
    is_corner[0] = true;
    is_corner[n - 1] = true;
    for c in find_corners(points, false) {
        is_corner[c] = true;
    }

    let mut keep = is_corner.clone();
    let breaks: Vec<usize> = (0..n).filter(|&i| is_corner[i]).collect();
    for pair in breaks.windows(2) {
        rdp_span(points, pair[0], pair[1], tolerance, &mut keep);
    }
    (0..n)
        .filter(|&i| keep[i])
        .map(|index| KeyPoint {
            index,
            corner: is_corner[index],
        })
        .collect()
}

/// Indices of points whose turn angle reaches the corner threshold and is a
/// local maximum within the measuring window.
pub fn detect_corners(points: &[Point]) -> Vec<usize> {
    if points.len() < 3 {
        return (0..points.len()).collect();
    }
    find_corners(points, true)
}

/// Index `d` steps from `i`, wrapping on closed contours and clamping on chains.
fn offset(i: usize, d: isize, n: usize, closed: bool) -> usize {
    let j = i as isize + d;
    if closed {
        j.rem_euclid(n as isize) as usize
    } else {
        j.clamp(0, n as isize - 1) as usize
    }
}

fn find_corners(points: &[Point], closed: bool) -> Vec<usize> {
    let n = points.len();
    let k = ((n - 1) / 2).clamp(1, MAX_CORNER_WINDOW) as isize;
    let at = |i: usize, d: isize| points[offset(i, d, n, closed)];
    let turns: Vec<f64> = (0..n)
        .map(|i| {
            if !closed && (i == 0 || i + 1 == n) {
                return 0.0;
            }
            let (inbound, outbound) = (points[i] - at(i, -1), at(i, 1) - points[i]);
            // Points on a straight run are never corners.
            if inbound.cross(outbound).abs() <= f64::EPSILON && inbound.dot(outbound) > 0.0 {
                return 0.0;
            }
            let before = points[i] - at(i, -k);
            let after = at(i, k) - points[i];
            before.cross(after).atan2(before.dot(after)).abs()
        })
        .collect();
    let threshold = CORNER_THRESHOLD_DEGREES.to_radians();
    (0..n)
        .filter(|&i| {
            turns[i] >= threshold
                && (1..=k).all(|d| {
                    turns[offset(i, d, n, closed)] <= turns[i]
                        && turns[offset(i, -d, n, closed)] <= turns[i]
                })
        })
        .collect()
}

fn farthest_from(points: &[Point], from: usize) -> usize {
    let origin = points[from];
    let mut best = from;
    let mut best_distance = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(origin);
        if d > best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Mark the samples RDP keeps strictly between `from` and `to`. Indices may run
/// past the end of `points` and wrap.
fn rdp_span(points: &[Point], from: usize, to: usize, tolerance: f64, keep: &mut [bool]) {
    let n = points.len();
    let mut stack = vec![(from, to)];
    while let Some((a, b)) = stack.pop() {
        if b <= a + 1 {
            continue;
        }
        let (pa, pb) = (points[a % n], points[b % n]);
        let mut split = a;
        let mut deviation = 0.0;
        for i in a + 1..b {
            let d = perpendicular_distance(points[i % n], pa, pb);
            if d > deviation {
                split = i;
                deviation = d;
            }
        }
        if split != a && deviation > tolerance {
            keep[split % n] = true;
            stack.push((split, b));
            stack.push((a, split));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(points: &[(f64, f64)]) -> Contour {
        Contour {
            kind: ContourKind::Outer,
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    /// Lattice outline of a `w` x `h` rectangle, clockwise from the origin.
    fn rectangle(w: i32, h: i32) -> Contour {
        let mut pts = Vec::new();
        for x in 0..w {
            pts.push((x as f64, 0.0));
        }
        for y in 0..h {
            pts.push((w as f64, y as f64));
        }
        for x in (1..=w).rev() {
            pts.push((x as f64, h as f64));
        }
        for y in (1..=h).rev() {
            pts.push((0.0, y as f64));
        }
        contour(&pts)
    }

    fn circle(radius: f64, n: usize) -> Contour {
        let points = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                Point::new(radius * t.cos(), radius * t.sin())
            })
            .collect();
        Contour {
            kind: ContourKind::Outer,
            points,
        }
    }

    mod unit {
        use super::*;

        #[test]
        fn rectangle_reduces_to_four_corners() {
            let simplified = simplify(&rectangle(8, 5), 0.5);
            let kept: Vec<Point> = simplified.key_points().collect();
            assert_eq!(
                kept,
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(8.0, 0.0),
                    Point::new(8.0, 5.0),
                    Point::new(0.0, 5.0),
                ]
            );
            assert!(simplified.keys.iter().all(|k| k.corner));
        }

        #[test]
        fn unit_square_keeps_every_vertex() {
            let simplified = simplify(&rectangle(1, 1), 1.0);
            assert_eq!(simplified.len(), 4);
        }

        #[test]
        fn zero_tolerance_only_drops_collinear_points() {
            assert_eq!(simplify(&rectangle(8, 5), 0.0).len(), 4);
            let mut bumped = rectangle(8, 5);
            bumped.points[4] = Point::new(4.0, -0.1);
            let kept: Vec<Point> = simplify(&bumped, 0.0).key_points().collect();
            assert!(kept.contains(&Point::new(4.0, -0.1)));
        }

        #[test]
        fn circle_has_no_corners() {
            let c = circle(20.0, 120);
            assert!(detect_corners(&c.points).is_empty());
            let simplified = simplify(&c, 0.5);
            assert!(simplified.len() >= 4);
            assert!(simplified.len() < 120);
            assert!(simplified.keys.iter().all(|k| !k.corner));
        }

        #[test]
        fn span_wraps_to_first_key() {
            let simplified = simplify(&rectangle(2, 2), 0.5);
            let last = simplified.len() - 1;
            let span = simplified.span(last);
            assert_eq!(span.first(), Some(&Point::new(0.0, 2.0)));
            assert_eq!(span.last(), Some(&Point::new(0.0, 0.0)));
            assert_eq!(span.len(), 3);
        }

        #[test]
        fn chain_keeps_ends_and_interior_corner() {
            // An open L: along the top, then down the right side.
            let mut pts: Vec<Point> = (0..=6).map(|x| Point::new(x as f64, 0.0)).collect();
            pts.extend((1..=4).map(|y| Point::new(6.0, y as f64)));
            let keys = simplify_chain(&pts, 0.5);
            let kept: Vec<(usize, bool)> = keys.iter().map(|k| (k.index, k.corner)).collect();
            assert_eq!(kept, vec![(0, true), (6, true), (10, true)]);
        }

        #[test]
        fn short_chain_is_all_ends() {
            let pts = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
            assert_eq!(simplify_chain(&pts, 1.0).len(), 2);
        }

        #[test]
        fn reversed_chain_finds_mirrored_corners() {
            let pts: Vec<Point> = [(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2), (4, 2), (5, 2), (6, 2)]
                .iter()
                .map(|&(x, y)| Point::new(x as f64, y as f64))
                .collect();
            let forward: Vec<usize> = find_corners(&pts, false);
            let mut reversed = pts.clone();
            reversed.reverse();
            let mut backward: Vec<usize> = find_corners(&reversed, false)
                .into_iter()
                .map(|i| pts.len() - 1 - i)
                .collect();
            backward.sort_unstable();
            assert_eq!(forward, backward);
        }

        #[test]
        fn staircase_diagonal_is_not_cornered() {
            // Lattice outline of a right triangle whose hypotenuse is a staircase.
            let mut pts = vec![(0.0, 0.0)];
            for i in 0..8 {
                pts.push((i as f64 + 1.0, i as f64));
                pts.push((i as f64 + 1.0, i as f64 + 1.0));
            }
            for x in (0..8).rev() {
                pts.push((x as f64, 8.0));
            }
            for y in (1..8).rev() {
                pts.push((0.0, y as f64));
            }
            let c = contour(&pts);
            let tips = [Point::new(0.0, 0.0), Point::new(8.0, 8.0), Point::new(0.0, 8.0)];
            for corner in detect_corners(&c.points) {
                let p = c.points[corner];
                assert!(
                    tips.iter().any(|t| t.distance(p) <= 3.0),
                    "corner {p:?} away from the triangle tips"
                );
            }
            assert!(simplify(&c, 1.0).len() <= 6);
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// simplify: a larger tolerance never keeps more points
            #[test]
            fn tolerance_monotonic(
                radii in proptest::collection::vec(5.0f64..20.0, 8..60),
                t1 in 0.0f64..3.0,
                dt in 0.0f64..3.0,
            ) {
                let n = radii.len();
                let points = radii
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        let t = i as f64 / n as f64 * std::f64::consts::TAU;
                        Point::new((r * t.cos()).round(), (r * t.sin()).round())
                    })
                    .collect();
                let c = Contour { kind: ContourKind::Outer, points };
                let fine = simplify(&c, t1);
                let coarse = simplify(&c, t1 + dt);
                prop_assert!(fine.len() >= coarse.len());
                for key in &coarse.keys {
                    prop_assert!(fine.keys.contains(key));
                }
            }

            /// simplify_chain: a larger tolerance never keeps more points
            #[test]
            fn chain_tolerance_monotonic(
                ys in proptest::collection::vec(-3i32..3, 3..40),
                t1 in 0.0f64..3.0,
                dt in 0.0f64..3.0,
            ) {
                let pts: Vec<Point> = ys
                    .iter()
                    .enumerate()
                    .map(|(x, &y)| Point::new(x as f64, y as f64))
                    .collect();
                let fine = simplify_chain(&pts, t1);
                let coarse = simplify_chain(&pts, t1 + dt);
                prop_assert_eq!(fine.first().map(|k| k.index), Some(0));
                prop_assert_eq!(coarse.last().map(|k| k.index), Some(pts.len() - 1));
                for key in &coarse {
                    prop_assert!(fine.contains(key));
                }
            }

            /// simplify: corners always survive
            #[test]
            fn corners_are_kept(w in 1i32..20, h in 1i32..20, t in 0.0f64..5.0) {
                let c = rectangle(w, h);
                let simplified = simplify(&c, t);
                for corner in detect_corners(&c.points) {
                    prop_assert!(simplified.keys.iter().any(|k| k.index == corner));
                }
            }
        }
    }
}
