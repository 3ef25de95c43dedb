//! Least-squares cubic Bezier fitting over simplified spans.

use std::fmt::Write as _;

use crate::geometry::{Bounds, Point, perpendicular_distance};
use crate::simplify::{KeyPoint, SimplifiedContour};
use crate::{VectorizeError, VectorizeResult};

/// Spans whose samples all lie within this distance of the chord stay straight.
pub const STRAIGHT_EPSILON: f64 = 0.05;

/// Samples on each side of a key point used to estimate its tangent.
const TANGENT_WINDOW: usize = 3;

/// One vertex of a closed path. `controls` belong to the segment leaving this
/// anchor; `None` means that segment is a straight line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub point: Point,
    pub controls: Option<[Point; 2]>,
}

/// A closed path of straight and cubic segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FittedPath {
    pub anchors: Vec<Anchor>,
}

impl FittedPath {
    /// Join fitted chains that follow one another around a contour. A path
    /// assembled from several chains starts at its top-left anchor.
    pub fn from_chains(chains: Vec<FittedChain>) -> Self {
        let joined = chains.len() > 1;
        let mut anchors: Vec<Anchor> = chains.into_iter().flat_map(|c| c.anchors).collect();
        if joined {
            let start = anchors
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.point
                        .y
                        .total_cmp(&b.point.y)
                        .then(a.point.x.total_cmp(&b.point.x))
                })
                .map_or(0, |(i, _)| i);
            anchors.rotate_left(start);
        }
        Self { anchors }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn curve_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.controls.is_some()).count()
    }

    /// Bounds of the anchors and control points, which contain the curve.
    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for anchor in &self.anchors {
            bounds.update(anchor.point);
            if let Some([c1, c2]) = anchor.controls {
                bounds.update(c1);
                bounds.update(c2);
            }
        }
        bounds
    }

    /// Render as SVG path data with `precision` decimal places.
    pub fn to_path_data(&self, precision: u8) -> String {
        let mut out = String::new();
        let Some(first) = self.anchors.first() else {
            return out;
        };
        let _ = write!(
            out,
            "M{} {}",
            format_coord(first.point.x, precision),
            format_coord(first.point.y, precision)
        );
        let n = self.anchors.len();
        for (i, anchor) in self.anchors.iter().enumerate() {
            let next = self.anchors[(i + 1) % n].point;
            let closing = i + 1 == n;
            match anchor.controls {
                Some([c1, c2]) => {
                    let _ = write!(
                        out,
                        " C{} {} {} {} {} {}",
                        format_coord(c1.x, precision),
                        format_coord(c1.y, precision),
                        format_coord(c2.x, precision),
                        format_coord(c2.y, precision),
                        format_coord(next.x, precision),
                        format_coord(next.y, precision)
                    );
                }
                // Z draws the closing line.
                None if closing => {}
                None => {
                    let _ = write!(
                        out,
                        " L{} {}",
                        format_coord(next.x, precision),
                        format_coord(next.y, precision)
                    );
                }
            }
        }
        out.push_str(" Z");
        out
    }
}

/// An open run of segments: each anchor starts a segment and `end` closes the
/// last one. A closed contour is a chain whose `end` is its first anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedChain {
    pub anchors: Vec<Anchor>,
    pub end: Point,
}

impl FittedChain {
    /// Treat a closed path as a chain ending where it starts.
    pub fn closed(path: FittedPath) -> Self {
        let end = path.anchors.first().map_or_else(Point::default, |a| a.point);
        Self {
            anchors: path.anchors,
            end,
        }
    }

    /// The same segments walked from `end` back to the first anchor.
    pub fn reversed(&self) -> Self {
        let Some(first) = self.anchors.first() else {
            return self.clone();
        };
        let mut anchors = Vec::with_capacity(self.anchors.len());
        let mut point = self.end;
        for anchor in self.anchors.iter().rev() {
            anchors.push(Anchor {
                point,
                controls: anchor.controls.map(|[c1, c2]| [c2, c1]),
            });
            point = anchor.point;
        }
        Self {
            anchors,
            end: first.point,
        }
    }
}

/// Fixed-precision number with trailing zeros trimmed and no negative zero.
pub fn format_coord(value: f64, precision: u8) -> String {
    let mut s = format!("{:.*}", precision as usize, value);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Fit each span between consecutive key points with a cubic, or a line when
/// the span is straight or `smoothness` is zero.
///
/// Smooth key points share one tangent on both sides; corners take a separate
/// tangent per side so no curve is smoothed across them.
pub fn fit_contour(contour: &SimplifiedContour, smoothness: f64) -> VectorizeResult<FittedPath> {
    let keys = &contour.keys;
    let samples = &contour.samples;
    let n = samples.len();
    if keys.len() < 2 {
        return Err(VectorizeError::InvalidGeometry(format!(
            "cannot fit a closed path through {} key points",
            keys.len()
        )));
    }

    let mut anchors = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let next = keys[(i + 1) % keys.len()];
        let span = contour.span(i);
        let p0 = samples[key.index];
        let controls = if smoothness <= 0.0 || is_straight(&span) {
            None
        } else {
            let leaving = if key.corner {
                forward_tangent(samples, key.index)
            } else {
                central_tangent(samples, key.index)
            };
            let arriving = if next.corner {
                backward_tangent(samples, next.index)
            } else {
                central_tangent(samples, next.index).map(|t| t * -1.0)
            };
            match (leaving, arriving) {
                (Some(t1), Some(t2)) => Some(fit_cubic(&span, t1, t2, smoothness)),
                _ => None,
            }
        };
        anchors.push(checked_anchor(p0, controls, key.index, n)?);
    }
    Ok(FittedPath { anchors })
}

/// Fit an open chain through its key points. The chain's two ends are
/// corners, so tangents there look only along the chain.
pub fn fit_chain(
    samples: &[Point],
    keys: &[KeyPoint],
    smoothness: f64,
) -> VectorizeResult<FittedChain> {
    let (Some(last_key), true) = (keys.last(), keys.len() >= 2) else {
        return Err(VectorizeError::InvalidGeometry(format!(
            "cannot fit a chain through {} key points",
            keys.len()
        )));
    };
    let n = samples.len();
    let last = n - 1;
    let k = window(n);
    let ahead = |i: usize| samples[(i + k).min(last)];
    let behind = |i: usize| samples[i.saturating_sub(k)];

    let mut anchors = Vec::with_capacity(keys.len() - 1);
    for pair in keys.windows(2) {
        let (key, next) = (pair[0], pair[1]);
        let span = &samples[key.index..=next.index];
        let p0 = samples[key.index];
        let controls = if smoothness <= 0.0 || is_straight(span) {
            None
        } else {
            let leaving = if key.corner {
                (ahead(key.index) - p0).normalized()
            } else {
                (ahead(key.index) - behind(key.index)).normalized()
            };
            let arriving = if next.corner {
                (behind(next.index) - samples[next.index]).normalized()
            } else {
                (behind(next.index) - ahead(next.index)).normalized()
            };
            match (leaving, arriving) {
                (Some(t1), Some(t2)) => Some(fit_cubic(span, t1, t2, smoothness)),
                _ => None,
            }
        };
        anchors.push(checked_anchor(p0, controls, key.index, n)?);
    }
    let end = samples[last_key.index];
    if !end.x.is_finite() || !end.y.is_finite() {
        return Err(VectorizeError::InvalidGeometry(format!(
            "non-finite chain end at sample {}",
            last_key.index
        )));
    }
    Ok(FittedChain { anchors, end })
}

fn checked_anchor(
    point: Point,
    controls: Option<[Point; 2]>,
    index: usize,
    samples: usize,
) -> VectorizeResult<Anchor> {
    if let Some([c1, c2]) = controls {
        if ![c1.x, c1.y, c2.x, c2.y].iter().all(|v| v.is_finite()) {
            return Err(VectorizeError::InvalidGeometry(format!(
                "non-finite control point fitting from sample {index} of {samples}"
            )));
        }
    }
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(VectorizeError::InvalidGeometry(format!(
            "non-finite anchor at sample {index}"
        )));
    }
    Ok(Anchor { point, controls })
}

fn is_straight(span: &[Point]) -> bool {
    let (Some(&a), Some(&b)) = (span.first(), span.last()) else {
        return true;
    };
    span.len() <= 2
        || span
            .iter()
            .all(|&p| perpendicular_distance(p, a, b) <= STRAIGHT_EPSILON)
}

fn window(n: usize) -> usize {
    TANGENT_WINDOW.min((n.saturating_sub(1) / 2).max(1))
}

fn central_tangent(samples: &[Point], i: usize) -> Option<Point> {
    let n = samples.len();
    let k = window(n);
    (samples[(i + k) % n] - samples[(i + n - k) % n]).normalized()
}

fn forward_tangent(samples: &[Point], i: usize) -> Option<Point> {
    let n = samples.len();
    (samples[(i + window(n)) % n] - samples[i])
        .normalized()
        .or_else(|| (samples[(i + 1) % n] - samples[i]).normalized())
}

/// Unit tangent at `i` pointing back along the contour.
fn backward_tangent(samples: &[Point], i: usize) -> Option<Point> {
    let n = samples.len();
    (samples[(i + n - window(n)) % n] - samples[i])
        .normalized()
        .or_else(|| (samples[(i + n - 1) % n] - samples[i]).normalized())
}

/// Schneider's least-squares cubic through the span's endpoints with fixed
/// end tangents, blended toward the chord by `smoothness`.
fn fit_cubic(span: &[Point], t1: Point, t2: Point, smoothness: f64) -> [Point; 2] {
    let p0 = span[0];
    let p3 = span[span.len() - 1];
    let chord = p3.distance(p0);
    let params = chord_length_parameters(span);

    let mut c = [[0.0f64; 2]; 2];
    let mut x = [0.0f64; 2];
    for (&d, &u) in span.iter().zip(&params) {
        let (b0, b1, b2, b3) = bernstein(u);
        let a1 = t1 * b1;
        let a2 = t2 * b2;
        c[0][0] += a1.dot(a1);
        c[0][1] += a1.dot(a2);
        c[1][1] += a2.dot(a2);
        let rest = d - (p0 * (b0 + b1) + p3 * (b2 + b3));
        x[0] += rest.dot(a1);
        x[1] += rest.dot(a2);
    }
    c[1][0] = c[0][1];

    let det = c[0][0] * c[1][1] - c[0][1] * c[1][0];
    let fallback = chord / 3.0;
    let (mut alpha1, mut alpha2) = if det.abs() > 1e-12 {
        (
            (x[0] * c[1][1] - x[1] * c[0][1]) / det,
            (c[0][0] * x[1] - c[1][0] * x[0]) / det,
        )
    } else {
        (fallback, fallback)
    };
    let limit = chord * 2.0;
    let epsilon = chord * 1e-6;
    if !(epsilon..=limit).contains(&alpha1) || !(epsilon..=limit).contains(&alpha2) {
        alpha1 = fallback;
        alpha2 = fallback;
    }

    let fitted1 = p0 + t1 * alpha1;
    let fitted2 = p3 + t2 * alpha2;
    let straight1 = p0.lerp(p3, 1.0 / 3.0);
    let straight2 = p0.lerp(p3, 2.0 / 3.0);
    [
        straight1.lerp(fitted1, smoothness),
        straight2.lerp(fitted2, smoothness),
    ]
}

fn bernstein(u: f64) -> (f64, f64, f64, f64) {
    let v = 1.0 - u;
    (v * v * v, 3.0 * u * v * v, 3.0 * u * u * v, u * u * u)
}

fn chord_length_parameters(span: &[Point]) -> Vec<f64> {
    let mut params = Vec::with_capacity(span.len());
    let mut total = 0.0;
    params.push(0.0);
    for pair in span.windows(2) {
        total += pair[1].distance(pair[0]);
        params.push(total);
    }
    if total > 0.0 {
        for u in &mut params {
            *u /= total;
        }
    } else {
        let last = (span.len() - 1).max(1) as f64;
        for (i, u) in params.iter_mut().enumerate() {
            *u = i as f64 / last;
        }
    }
    params
}

/// Evaluate a cubic segment at `u`.
pub fn cubic_point(p0: Point, c1: Point, c2: Point, p3: Point, u: f64) -> Point {
    let (b0, b1, b2, b3) = bernstein(u);
    p0 * b0 + c1 * b1 + c2 * b2 + p3 * b3
}
