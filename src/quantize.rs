//! Median-cut color quantization.
//!
//! Drawn pixels (alpha at or above [`crate::decode::ALPHA_THRESHOLD`]) are
//! reduced to an ordered palette; background pixels carry no label.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::decode::{PixelBuffer, drawn_rgb};

/// One palette entry: an sRGB color plus the strongest alpha seen among its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteColor {
    pub rgb: [u8; 3],
    pub alpha: u8,
}

impl PaletteColor {
    pub const fn opaque(rgb: [u8; 3]) -> Self {
        Self { rgb, alpha: 255 }
    }

    /// Lowercase `rrggbb` hex string.
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.rgb[0], self.rgb[1], self.rgb[2])
    }

    /// Opacity in `[0, 1]`.
    pub fn opacity(&self) -> f64 {
        self.alpha as f64 / 255.0
    }
}

/// Ordered, duplicate-free list of colors; order is first occurrence in raster scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Palette {
    colors: Vec<PaletteColor>,
}

impl Palette {
    /// Build a palette from colors already in their final order.
    pub fn from_colors(colors: Vec<PaletteColor>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[PaletteColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteColor> {
        self.colors.get(index)
    }
}

/// One palette index per pixel; `None` marks background.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<Option<u8>>,
}

impl LabelMap {
    pub fn new(width: u32, height: u32, labels: Vec<Option<u8>>) -> Self {
        debug_assert_eq!(labels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            labels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn labels(&self) -> &[Option<u8>] {
        &self.labels
    }

    /// Label at `(x, y)`; outside the grid is background.
    pub fn get(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.labels[y as usize * self.width as usize + x as usize].map(usize::from)
    }
}

#[derive(Debug, Clone, Copy)]
struct HistEntry {
    rgb: [u8; 3],
    count: u64,
    first: usize,
}

/// Reduce the drawn pixels of `buffer` to at most `max_colors` colors.
pub fn quantize(buffer: &PixelBuffer, max_colors: usize) -> (Palette, LabelMap) {
    let histogram = build_histogram(buffer);
    let candidates: Vec<[u8; 3]> = if histogram.len() <= max_colors {
        histogram.iter().map(|e| e.rgb).collect()
    } else {
        median_cut(histogram, max_colors)
    };
    tracing::debug!(
        candidates = candidates.len(),
        max_colors,
        "palette search complete"
    );

    label_with(buffer, &candidates)
}

/// Label every drawn pixel with its nearest candidate, then number the used
/// candidates by first occurrence.
fn label_with(buffer: &PixelBuffer, candidates: &[[u8; 3]]) -> (Palette, LabelMap) {
    let nearest = assign_nearest(buffer, candidates);
    number_by_first_occurrence(buffer, candidates, nearest)
}

/// Count every distinct drawn color, remembering where each was first seen.
fn build_histogram(buffer: &PixelBuffer) -> Vec<HistEntry> {
    let mut entries: HashMap<[u8; 3], HistEntry> = HashMap::new();
    for (order, rgb) in buffer.image().pixels().filter_map(drawn_rgb).enumerate() {
        entries
            .entry(rgb)
            .and_modify(|e| e.count += 1)
            .or_insert(HistEntry {
                rgb,
                count: 1,
                first: order,
            });
    }

    let mut entries: Vec<HistEntry> = entries.into_values().collect();
    entries.sort_by_key(|e| e.first);
    entries
}

/// A box in RGB space holding a subset of the histogram.
struct ColorBox {
    entries: Vec<HistEntry>,
}

impl ColorBox {
    fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    fn mean(&self) -> [f64; 3] {
        let total = self.total() as f64;
        let mut sum = [0.0; 3];
        for e in &self.entries {
            for (c, s) in sum.iter_mut().enumerate() {
                *s += e.rgb[c] as f64 * e.count as f64;
            }
        }
        sum.map(|s| s / total)
    }

    /// Weighted sum of squared deviations per channel.
    fn channel_sse(&self) -> [f64; 3] {
        let mean = self.mean();
        let mut sse = [0.0; 3];
        for e in &self.entries {
            for (c, s) in sse.iter_mut().enumerate() {
                let d = e.rgb[c] as f64 - mean[c];
                *s += d * d * e.count as f64;
            }
        }
        sse
    }

    fn representative(&self) -> [u8; 3] {
        self.mean().map(|m| m.round().clamp(0.0, 255.0) as u8)
    }

    /// Split at the weighted median of the highest-variance channel.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let sse = self.channel_sse();
        let mut channel = 0;
        for c in 1..3 {
            if sse[c] > sse[channel] {
                channel = c;
            }
        }
        self.entries
            .sort_by_key(|e| (e.rgb[channel], e.first));

        let half = self.total().div_ceil(2);
        let mut cumulative = 0;
        let mut split_at = self.entries.len() - 1;
        for (i, e) in self.entries.iter().enumerate() {
            cumulative += e.count;
            if cumulative >= half {
                split_at = i + 1;
                break;
            }
        }
        let split_at = split_at.clamp(1, self.entries.len() - 1);
        let right = self.entries.split_off(split_at);
        (ColorBox { entries: self.entries }, ColorBox { entries: right })
    }
}

fn median_cut(histogram: Vec<HistEntry>, max_colors: usize) -> Vec<[u8; 3]> {
    let mut boxes = vec![ColorBox { entries: histogram }];
    while boxes.len() < max_colors {
        let mut best: Option<(usize, f64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.entries.len() < 2 {
                continue;
            }
            let score: f64 = b.channel_sse().iter().sum();
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((index, _)) = best else {
            break;
        };
        let (left, right) = boxes.remove(index).split();
        boxes.insert(index, right);
        boxes.insert(index, left);
    }

    let mut colors: Vec<[u8; 3]> = Vec::with_capacity(boxes.len());
    for b in &boxes {
        let rgb = b.representative();
        if !colors.contains(&rgb) {
            colors.push(rgb);
        }
    }
    colors
}

fn distance2(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Index of the nearest color; ties go to the lower index.
pub fn nearest_index(rgb: [u8; 3], colors: &[[u8; 3]]) -> usize {
    nearest_candidate(rgb, colors).0
}

/// Nearest color index plus whether another color is equally near.
fn nearest_candidate(rgb: [u8; 3], colors: &[[u8; 3]]) -> (usize, bool) {
    let mut best = 0;
    let mut best_dist = u32::MAX;
    let mut tied = false;
    for (idx, color) in colors.iter().enumerate() {
        let dist = distance2(rgb, *color);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
            tied = false;
        } else if dist == best_dist {
            tied = true;
        }
    }
    (best, tied)
}

/// Nearest candidate per pixel, flagged when the choice is a tie.
fn assign_nearest(buffer: &PixelBuffer, colors: &[[u8; 3]]) -> Vec<Option<(u8, bool)>> {
    let width = buffer.width() as usize;
    let mut nearest = vec![None; buffer.pixel_count()];
    if width == 0 || colors.is_empty() {
        return nearest;
    }
    let raw = buffer.image().as_raw();
    nearest
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let row_bytes = &raw[y * width * 4..(y + 1) * width * 4];
            for (slot, px) in row.iter_mut().zip(row_bytes.chunks_exact(4)) {
                let pixel = image::Rgba([px[0], px[1], px[2], px[3]]);
                *slot = drawn_rgb(&pixel).map(|rgb| {
                    let (index, tied) = nearest_candidate(rgb, colors);
                    (index as u8, tied)
                });
            }
        });
    nearest
}

/// Among equally near candidates prefer the earliest palette entry, then the
/// lowest candidate index for candidates not yet in the palette.
fn settle_tie(rgb: [u8; 3], candidates: &[[u8; 3]], remap: &[Option<u8>]) -> usize {
    let best = candidates
        .iter()
        .map(|c| distance2(rgb, *c))
        .min()
        .unwrap_or(0);
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| distance2(rgb, **c) == best)
        .map(|(i, _)| i)
        .min_by_key(|&i| (remap[i].is_none(), remap[i], i))
        .unwrap_or(0)
}

/// Renumber candidates by first use in raster order, dropping unused ones.
fn number_by_first_occurrence(
    buffer: &PixelBuffer,
    candidates: &[[u8; 3]],
    nearest: Vec<Option<(u8, bool)>>,
) -> (Palette, LabelMap) {
    let mut remap: Vec<Option<u8>> = vec![None; candidates.len()];
    let mut colors: Vec<PaletteColor> = Vec::new();
    let mut labels: Vec<Option<u8>> = Vec::with_capacity(nearest.len());

    for (nearest, pixel) in nearest.into_iter().zip(buffer.image().pixels()) {
        let Some((candidate, tied)) = nearest else {
            labels.push(None);
            continue;
        };
        let old = if tied {
            settle_tie([pixel[0], pixel[1], pixel[2]], candidates, &remap)
        } else {
            candidate as usize
        };
        let new = match remap[old] {
            Some(new) => new,
            None => {
                let new = colors.len() as u8;
                remap[old] = Some(new);
                colors.push(PaletteColor {
                    rgb: candidates[old],
                    alpha: 0,
                });
                new
            }
        };
        let entry = &mut colors[new as usize];
        entry.alpha = entry.alpha.max(pixel[3]);
        labels.push(Some(new));
    }

    (
        Palette { colors },
        LabelMap::new(buffer.width(), buffer.height(), labels),
    )
}
