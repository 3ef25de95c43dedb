//! Boundary chains shared between neighbouring regions.
//!
//! A contour is cut wherever the region across its edges changes. Each cut is
//! a junction and always becomes an anchor. A chain bordering another region
//! is simplified and fitted once, by the region with the lower id, and the
//! neighbour reuses that fit walked backwards, so both sides of a border emit
//! the same curve.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::VectorizeResult;
use crate::cancel::CancelToken;
use crate::contour::{Contour, ContourKind, RegionContours, edge_neighbours};
use crate::document::Shape;
use crate::fit::{FittedChain, FittedPath, fit_chain, fit_contour};
use crate::geometry::Point;
use crate::region::RegionMap;
use crate::simplify::{simplify, simplify_chain};

/// A run of contour samples whose edges all face the same neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub kind: ContourKind,
    /// Region across every edge of the chain, `None` for background.
    pub neighbour: Option<usize>,
    /// Samples from junction to junction, both included. A closed chain is a
    /// whole contour without junctions and does not repeat its first sample.
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Identity of a shared chain, equal when computed from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainKey {
    low: usize,
    high: usize,
    from: (i64, i64),
    via: (i64, i64),
    to: (i64, i64),
    len: usize,
}

fn lattice(p: Point) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

impl Chain {
    /// Whether `region` fits this chain itself instead of reusing its
    /// neighbour's fit.
    pub fn fitted_by(&self, region: usize) -> bool {
        self.neighbour.is_none_or(|other| region < other)
    }

    /// Key of a chain shared with another region, as seen from `region`.
    /// Shared samples are never refined, so they still sit on the lattice.
    pub fn key(&self, region: usize) -> Option<ChainKey> {
        let other = self.neighbour?;
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let (from, via, to) = if self.closed {
            let min = self
                .points
                .iter()
                .map(|&p| lattice(p))
                .min_by_key(|&(x, y)| (y, x))?;
            (min, min, min)
        } else if region < other {
            (
                lattice(self.points[0]),
                lattice(self.points[1]),
                lattice(self.points[n - 1]),
            )
        } else {
            (
                lattice(self.points[n - 1]),
                lattice(self.points[n - 2]),
                lattice(self.points[0]),
            )
        };
        Some(ChainKey {
            low: region.min(other),
            high: region.max(other),
            from,
            via,
            to,
            len: n,
        })
    }

    /// Simplify and fit the chain in its own direction.
    pub fn fit(&self, tolerance: f64, smoothness: f64) -> VectorizeResult<FittedChain> {
        if self.closed {
            let contour = Contour {
                kind: self.kind,
                points: self.points.clone(),
            };
            let path = fit_contour(&simplify(&contour, tolerance), smoothness)?;
            Ok(FittedChain::closed(path))
        } else {
            let keys = simplify_chain(&self.points, tolerance);
            fit_chain(&self.points, &keys, smoothness)
        }
    }
}

/// Cut `contour` at every junction. `neighbours` holds the region across each
/// edge, as returned by [`edge_neighbours`] for the contour's lattice form.
pub fn split_chains(contour: &Contour, neighbours: &[Option<usize>]) -> Vec<Chain> {
    let n = contour.len();
    let junctions: Vec<usize> = (0..n)
        .filter(|&i| neighbours[(i + n - 1) % n] != neighbours[i])
        .collect();
    if junctions.is_empty() {
        return vec![Chain {
            kind: contour.kind,
            neighbour: neighbours.first().copied().flatten(),
            points: contour.points.clone(),
            closed: true,
        }];
    }
    junctions
        .iter()
        .enumerate()
        .map(|(j, &from)| {
            let to = junctions.get(j + 1).copied().unwrap_or(junctions[0] + n);
            Chain {
                kind: contour.kind,
                neighbour: neighbours[from],
                points: (from..=to).map(|i| contour.points[i % n]).collect(),
                closed: false,
            }
        })
        .collect()
}

/// A region's contours cut into chains, outer contour first.
#[derive(Debug, Clone)]
pub struct TracedRegion {
    pub region: usize,
    pub palette_index: usize,
    pub outer: Vec<Chain>,
    pub holes: Vec<Vec<Chain>>,
}

impl TracedRegion {
    /// Junctions come from `lattice`; samples come from `refined`, which has the
    /// same points in the same order.
    pub fn new(map: &RegionMap, lattice: &RegionContours, refined: &RegionContours) -> Self {
        let cut = |lattice: &Contour, refined: &Contour| {
            split_chains(refined, &edge_neighbours(map, lattice))
        };
        Self {
            region: refined.region,
            palette_index: refined.palette_index,
            outer: cut(&lattice.outer, &refined.outer),
            holes: lattice
                .holes
                .iter()
                .zip(&refined.holes)
                .map(|(l, r)| cut(l, r))
                .collect(),
        }
    }

    fn contours(&self) -> impl Iterator<Item = &Vec<Chain>> + '_ {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }
}

type ChainFits = Vec<Vec<Option<FittedChain>>>;

/// Fit every region's chains, sharing each border between its two regions.
///
/// Chains a region does not own are looked up by key and reversed. A chain
/// whose neighbour walked the border differently has no match and is fitted
/// locally.
pub fn fit_shapes(
    traced: &[TracedRegion],
    tolerance: f64,
    smoothness: f64,
    cancel: &CancelToken,
) -> VectorizeResult<Vec<Shape>> {
    let own: Vec<ChainFits> = traced
        .par_iter()
        .map(|t| {
            cancel.check()?;
            t.contours()
                .map(|chains| {
                    chains
                        .iter()
                        .map(|chain| {
                            if chain.fitted_by(t.region) {
                                chain.fit(tolerance, smoothness).map(Some)
                            } else {
                                Ok(None)
                            }
                        })
                        .collect::<VectorizeResult<Vec<_>>>()
                })
                .collect::<VectorizeResult<Vec<_>>>()
        })
        .collect::<VectorizeResult<Vec<_>>>()?;

    let mut shared: HashMap<ChainKey, &FittedChain> = HashMap::new();
    for (t, fits) in traced.iter().zip(&own) {
        for (chains, fits) in t.contours().zip(fits) {
            for (chain, fit) in chains.iter().zip(fits) {
                if let (Some(key), Some(fit)) = (chain.key(t.region), fit) {
                    shared.insert(key, fit);
                }
            }
        }
    }
    tracing::debug!(shared = shared.len(), "fitted shared boundaries");

    traced
        .par_iter()
        .zip(own.par_iter())
        .map(|(t, fits)| {
            cancel.check()?;
            let mut paths = t
                .contours()
                .zip(fits)
                .map(|(chains, fits)| {
                    chains
                        .iter()
                        .zip(fits)
                        .map(|(chain, fit)| match fit {
                            Some(fit) => Ok(fit.clone()),
                            None => match chain.key(t.region).and_then(|key| shared.get(&key)) {
                                Some(fit) => Ok(fit.reversed()),
                                None => chain.fit(tolerance, smoothness),
                            },
                        })
                        .collect::<VectorizeResult<Vec<_>>>()
                        .map(FittedPath::from_chains)
                })
                .collect::<VectorizeResult<Vec<_>>>()?;
            let holes = paths.split_off(1.min(paths.len()));
            let outer = paths.pop().unwrap_or_default();
            Ok(Shape {
                region: t.region,
                palette_index: t.palette_index,
                outer,
                holes,
            })
        })
        .collect()
}
