//! Anti-alias-aware sub-pixel boundary correction.
//!
//! A lattice boundary point sits on the edge between an inside pixel and an
//! outside pixel. When the outside pixel is background, the pair's combined
//! coverage says where the anti-aliased edge really lies, and the point is
//! moved along the outward normal to that position.

use crate::contour::{Contour, RegionContours, outside_pixel};
use crate::decode::{ALPHA_THRESHOLD, PixelBuffer};
use crate::geometry::Point;
use crate::region::RegionMap;

/// Largest distance a point may move, in pixels.
pub const MAX_OFFSET: f64 = 0.5;

/// Moves contour points toward the alpha midpoint of the edge they trace.
#[derive(Debug, Clone, Copy)]
pub struct Refiner<'a> {
    map: &'a RegionMap,
    buffer: &'a PixelBuffer,
}

impl<'a> Refiner<'a> {
    /// Build a refiner when it can have an effect: refinement is enabled for the
    /// mode and the image carries partial alpha. Binary alpha yields `None`.
    pub fn for_image(map: &'a RegionMap, buffer: &'a PixelBuffer, enabled: bool) -> Option<Self> {
        if !enabled || !buffer.has_partial_alpha() {
            return None;
        }
        Some(Self { map, buffer })
    }

    pub fn refine(&self, contours: &RegionContours) -> RegionContours {
        RegionContours {
            region: contours.region,
            palette_index: contours.palette_index,
            outer: self.refine_contour(contours.region, &contours.outer),
            holes: contours
                .holes
                .iter()
                .map(|hole| self.refine_contour(contours.region, hole))
                .collect(),
        }
    }

    /// `contour` must still be on the lattice. Points touching an edge shared
    /// with another region are pinned so both sides keep the same vertices.
    fn refine_contour(&self, region: usize, contour: &Contour) -> Contour {
        let points = &contour.points;
        let n = points.len();
        let refined = (0..n)
            .map(|i| {
                let prev = points[(i + n - 1) % n];
                let next = points[(i + 1) % n];
                let p = points[i];
                if self.faces_region(prev, p) || self.faces_region(p, next) {
                    return p;
                }
                match outward_normal(prev, next) {
                    Some(normal) => p + normal * self.offset(region, p, normal),
                    None => p,
                }
            })
            .collect();
        Contour {
            kind: contour.kind,
            points: refined,
        }
    }

    /// Signed offset along `normal` for point `p`, positive meaning outward.
    fn offset(&self, region: usize, p: Point, normal: Point) -> f64 {
        let inside = p - normal * 0.5;
        let outside = p + normal * 0.5;
        let (ix, iy) = (inside.x.floor() as i64, inside.y.floor() as i64);
        let (ox, oy) = (outside.x.floor() as i64, outside.y.floor() as i64);
        if !self.map.contains(region, ix, iy) || !self.is_background(ox, oy) {
            return 0.0;
        }
        let coverage = self.buffer.alpha_at(ix, iy) + self.buffer.alpha_at(ox, oy);
        (coverage - 1.0).clamp(-MAX_OFFSET, MAX_OFFSET)
    }

    fn faces_region(&self, a: Point, b: Point) -> bool {
        let (x, y) = outside_pixel(a, b);
        self.map.owner(x, y).is_some()
    }

    fn is_background(&self, x: i64, y: i64) -> bool {
        self.buffer.alpha_at(x, y) < ALPHA_THRESHOLD as f64 / 255.0
    }
}

/// Unit normal pointing away from the region for a contour walked with the
/// region on its right-hand side.
fn outward_normal(prev: Point, next: Point) -> Option<Point> {
    let tangent = next - prev;
    Point::new(tangent.y, -tangent.x).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::trace_region;
    use crate::quantize::quantize;
    use crate::region::extract_regions;
    use image::{Rgba, RgbaImage};

    fn pipeline(img: RgbaImage) -> (PixelBuffer, RegionMap) {
        let buffer = PixelBuffer::from_image(img);
        let (_, labels) = quantize(&buffer, 4);
        let map = extract_regions(&labels, 1);
        (buffer, map)
    }

    mod unit {
        use super::*;

        #[test]
        fn binary_alpha_is_identity() {
            let img = RgbaImage::from_fn(4, 4, |x, _| {
                if x < 2 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 0, 0, 0])
                }
            });
            let (buffer, map) = pipeline(img);
            assert!(Refiner::for_image(&map, &buffer, true).is_none());
        }

        #[test]
        fn disabled_is_identity() {
            let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 200]));
            let (buffer, map) = pipeline(img);
            assert!(Refiner::for_image(&map, &buffer, false).is_none());
        }

        #[test]
        fn faint_fringe_pushes_edge_outward() {
            // Opaque column 0..2, a 25% alpha fringe in column 2.
            let img = RgbaImage::from_fn(4, 4, |x, _| match x {
                0 | 1 => Rgba([255, 0, 0, 255]),
                2 => Rgba([255, 0, 0, 64]),
                _ => Rgba([0, 0, 0, 0]),
            });
            let (buffer, map) = pipeline(img);
            let refiner = Refiner::for_image(&map, &buffer, true).expect("partial alpha");
            let contours = trace_region(&map, &map.regions()[0]).unwrap();
            let refined = refiner.refine(&contours);
            // The right edge at x = 2 moves toward x = 2.25.
            let moved: Vec<Point> = refined
                .outer
                .points
                .iter()
                .zip(&contours.outer.points)
                .filter(|(_, orig)| orig.x == 2.0 && orig.y > 0.0 && orig.y < 4.0)
                .map(|(p, _)| *p)
                .collect();
            assert!(!moved.is_empty());
            for p in moved {
                assert!((p.x - 2.251).abs() < 0.01, "moved to {p:?}");
            }
        }

        #[test]
        fn partially_covered_inside_pulls_edge_inward() {
            let img = RgbaImage::from_fn(3, 3, |x, _| match x {
                0 | 1 => Rgba([0, 0, 255, if x == 1 { 153 } else { 255 }]),
                _ => Rgba([0, 0, 0, 0]),
            });
            let (buffer, map) = pipeline(img);
            let refiner = Refiner::for_image(&map, &buffer, true).expect("partial alpha");
            let contours = trace_region(&map, &map.regions()[0]).unwrap();
            let refined = refiner.refine(&contours);
            let p = refined
                .outer
                .points
                .iter()
                .zip(&contours.outer.points)
                .find(|(_, orig)| **orig == Point::new(2.0, 1.0))
                .map(|(p, _)| *p)
                .expect("edge point");
            assert!((p.x - 1.6).abs() < 0.01, "moved to {p:?}");
        }

        #[test]
        fn shared_edges_between_regions_stay_put() {
            let img = RgbaImage::from_fn(4, 2, |x, _| {
                if x < 2 {
                    Rgba([255, 0, 0, 200])
                } else {
                    Rgba([0, 0, 255, 200])
                }
            });
            let (buffer, map) = pipeline(img);
            let refiner = Refiner::for_image(&map, &buffer, true).expect("partial alpha");
            let contours = trace_region(&map, &map.regions()[0]).unwrap();
            let refined = refiner.refine(&contours);
            for (p, orig) in refined.outer.points.iter().zip(&contours.outer.points) {
                if orig.x == 2.0 && orig.y == 1.0 {
                    assert_eq!(p, orig);
                }
            }
        }

        #[test]
        fn junction_vertices_stay_put() {
            // Red meets blue and the transparent margin at (2, 0) and (2, 2).
            let img = RgbaImage::from_fn(4, 2, |x, _| match x {
                0 | 1 => Rgba([255, 0, 0, 200]),
                2 => Rgba([0, 0, 255, 200]),
                _ => Rgba([0, 0, 0, 0]),
            });
            let (buffer, map) = pipeline(img);
            let refiner = Refiner::for_image(&map, &buffer, true).expect("partial alpha");
            for region in map.regions() {
                let contours = trace_region(&map, region).unwrap();
                let refined = refiner.refine(&contours);
                for (p, orig) in refined.outer.points.iter().zip(&contours.outer.points) {
                    if orig.x == 2.0 {
                        assert_eq!(p, orig);
                    }
                }
            }
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Refiner::refine: vertices on a boundary shared by two regions never move
            #[test]
            fn shared_vertices_pinned(alphas in proptest::collection::vec(0u8..=255, 36)) {
                let img = RgbaImage::from_fn(6, 6, |x, y| {
                    let rgb = if x < 3 { [200, 20, 20] } else { [20, 20, 200] };
                    Rgba([rgb[0], rgb[1], rgb[2], alphas[(y * 6 + x) as usize]])
                });
                let (buffer, map) = pipeline(img);
                if let Some(refiner) = Refiner::for_image(&map, &buffer, true) {
                    for region in map.regions() {
                        let contours = trace_region(&map, region).unwrap();
                        let refined = refiner.refine(&contours);
                        let pts = &contours.outer.points;
                        let n = pts.len();
                        for i in 0..n {
                            let (prev, next) = (pts[(i + n - 1) % n], pts[(i + 1) % n]);
                            let across = [outside_pixel(prev, pts[i]), outside_pixel(pts[i], next)];
                            if across.iter().any(|&(x, y)| map.owner(x, y).is_some()) {
                                prop_assert_eq!(refined.outer.points[i], pts[i]);
                            }
                        }
                    }
                }
            }

            /// Refiner::refine: no point moves further than the offset bound
            #[test]
            fn offsets_are_bounded(alphas in proptest::collection::vec(0u8..=255, 36)) {
                let img = RgbaImage::from_fn(6, 6, |x, y| {
                    Rgba([10, 200, 30, alphas[(y * 6 + x) as usize]])
                });
                let (buffer, map) = pipeline(img);
                if let Some(refiner) = Refiner::for_image(&map, &buffer, true) {
                    for region in map.regions() {
                        let contours = trace_region(&map, region).unwrap();
                        let refined = refiner.refine(&contours);
                        prop_assert_eq!(refined.holes.len(), contours.holes.len());
                        for (p, q) in refined.outer.points.iter().zip(&contours.outer.points) {
                            prop_assert!(p.distance(*q) <= MAX_OFFSET + 1e-9);
                        }
                    }
                }
            }
        }
    }
}
