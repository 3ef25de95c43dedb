//! Grouping of same-label pixels into 8-connected regions with holes.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use rayon::prelude::*;

use crate::quantize::LabelMap;

type HoleGrid = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelBounds {
    fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// A 4-connected pocket of non-region pixels fully enclosed by a region.
#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    /// Index of the enclosing region in [`RegionMap::regions`].
    pub region: usize,
    /// Label of this hole in the enclosing region's hole grid.
    pub label: u32,
    pub area: usize,
    /// First pixel of the hole in raster order, in canvas coordinates.
    pub start: (u32, u32),
}

/// A maximal 8-connected set of pixels sharing one palette index.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: usize,
    pub palette_index: usize,
    pub area: usize,
    pub bounds: PixelBounds,
    /// First pixel of the region in raster order.
    pub start: (u32, u32),
    pub holes: Vec<Hole>,
    /// Hole labels over `bounds` padded by one pixel on every side.
    hole_grid: Option<HoleGrid>,
}

impl Region {
    /// Whether canvas pixel `(x, y)` belongs to `hole`.
    pub fn hole_contains(&self, hole: &Hole, x: i64, y: i64) -> bool {
        let Some(grid) = &self.hole_grid else {
            return false;
        };
        let lx = x - self.bounds.min_x as i64 + 1;
        let ly = y - self.bounds.min_y as i64 + 1;
        if lx < 0 || ly < 0 || lx >= grid.width() as i64 || ly >= grid.height() as i64 {
            return false;
        }
        grid.get_pixel(lx as u32, ly as u32)[0] == hole.label
    }
}

/// Result of region extraction: surviving regions plus the pixel-to-region map.
#[derive(Debug, Clone)]
pub struct RegionMap {
    width: u32,
    height: u32,
    /// Region id + 1 per pixel, 0 for background and dropped regions.
    owners: Vec<u32>,
    regions: Vec<Region>,
    dropped: usize,
}

impl RegionMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of regions discarded for being smaller than the area threshold.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Region id owning `(x, y)`, if any.
    pub fn owner(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        match self.owners[y as usize * self.width as usize + x as usize] {
            0 => None,
            id => Some(id as usize - 1),
        }
    }

    pub fn contains(&self, region: usize, x: i64, y: i64) -> bool {
        self.owner(x, y) == Some(region)
    }
}

struct Accumulator {
    palette_index: usize,
    area: usize,
    bounds: PixelBounds,
    start: (u32, u32),
}

/// Group labelled pixels into 8-connected regions, dropping those below `min_area`.
///
/// Dropped regions are omitted, never merged into a neighbour. Holes smaller than
/// `min_area` are not recorded, so the enclosing region covers them.
pub fn extract_regions(labels: &LabelMap, min_area: usize) -> RegionMap {
    let (width, height) = (labels.width(), labels.height());
    let label_image = GrayImage::from_fn(width, height, |x, y| {
        let value = labels
            .get(x as i64, y as i64)
            .map_or(0, |l| l as u8 + 1);
        Luma([value])
    });
    let components = connected_components(&label_image, Connectivity::Eight, Luma([0u8]));

    // Renumber components by first appearance so ids follow raster order.
    let mut order: Vec<Option<usize>> = Vec::new();
    let mut accumulators: Vec<Accumulator> = Vec::new();
    for (x, y, component) in components.enumerate_pixels() {
        let c = component[0] as usize;
        if c == 0 {
            continue;
        }
        if order.len() <= c {
            order.resize(c + 1, None);
        }
        match order[c] {
            Some(i) => {
                let acc = &mut accumulators[i];
                acc.area += 1;
                acc.bounds.include(x, y);
            }
            None => {
                order[c] = Some(accumulators.len());
                accumulators.push(Accumulator {
                    palette_index: label_image.get_pixel(x, y)[0] as usize - 1,
                    area: 1,
                    bounds: PixelBounds::at(x, y),
                    start: (x, y),
                });
            }
        }
    }

    let mut kept_id: Vec<Option<usize>> = vec![None; accumulators.len()];
    let mut regions = Vec::new();
    for (i, acc) in accumulators.iter().enumerate() {
        if acc.area < min_area {
            continue;
        }
        kept_id[i] = Some(regions.len());
        regions.push(Region {
            id: regions.len(),
            palette_index: acc.palette_index,
            area: acc.area,
            bounds: acc.bounds,
            start: acc.start,
            holes: Vec::new(),
            hole_grid: None,
        });
    }
    let dropped = accumulators.len() - regions.len();

    let owners: Vec<u32> = components
        .pixels()
        .map(|component| {
            let c = component[0] as usize;
            if c == 0 {
                return 0;
            }
            order[c]
                .and_then(|i| kept_id[i])
                .map_or(0, |id| id as u32 + 1)
        })
        .collect();

    let mut map = RegionMap {
        width,
        height,
        owners,
        regions,
        dropped,
    };

    let hole_results: Vec<(Vec<Hole>, Option<HoleGrid>)> = map
        .regions
        .par_iter()
        .map(|region| find_holes(&map, region, min_area))
        .collect();
    for (region, (holes, grid)) in map.regions.iter_mut().zip(hole_results) {
        region.holes = holes;
        region.hole_grid = grid;
    }

    tracing::debug!(
        regions = map.regions.len(),
        dropped = map.dropped,
        holes = map.regions.iter().map(|r| r.holes.len()).sum::<usize>(),
        "region extraction complete"
    );
    map
}

/// Label 4-connected pockets of non-region pixels inside the region's padded bounds.
///
/// The padding ring is always outside the region, so the component touching the
/// corner is the exterior and every other component is enclosed.
fn find_holes(
    map: &RegionMap,
    region: &Region,
    min_area: usize,
) -> (Vec<Hole>, Option<HoleGrid>) {
    let b = region.bounds;
    if b.width() < 3 || b.height() < 3 {
        return (Vec::new(), None);
    }
    let local = GrayImage::from_fn(b.width() + 2, b.height() + 2, |lx, ly| {
        let x = b.min_x as i64 + lx as i64 - 1;
        let y = b.min_y as i64 + ly as i64 - 1;
        if map.contains(region.id, x, y) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });
    let grid = connected_components(&local, Connectivity::Four, Luma([0u8]));
    let exterior = grid.get_pixel(0, 0)[0];

    let mut holes: Vec<Hole> = Vec::new();
    let mut slot: Vec<Option<usize>> = Vec::new();
    for (lx, ly, component) in grid.enumerate_pixels() {
        let label = component[0];
        if label == 0 || label == exterior {
            continue;
        }
        let l = label as usize;
        if slot.len() <= l {
            slot.resize(l + 1, None);
        }
        match slot[l] {
            Some(i) => holes[i].area += 1,
            None => {
                slot[l] = Some(holes.len());
                holes.push(Hole {
                    region: region.id,
                    label,
                    area: 1,
                    start: (b.min_x + lx - 1, b.min_y + ly - 1),
                });
            }
        }
    }
    holes.retain(|h| h.area >= min_area);
    if holes.is_empty() {
        return (holes, None);
    }
    (holes, Some(grid))
}
