//! SVG document assembly.

use std::fmt;

use crate::fit::FittedPath;
use crate::geometry::Bounds;
use crate::quantize::{Palette, PaletteColor};

/// The fitted outline of one region: an outer path plus the holes cut from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Region id the shape was traced from.
    pub region: usize,
    pub palette_index: usize,
    pub outer: FittedPath,
    pub holes: Vec<FittedPath>,
}

impl Shape {
    /// Outer path and holes as one path string; the even-odd rule subtracts the holes.
    pub fn path_data(&self, precision: u8) -> String {
        let mut parts = Vec::with_capacity(1 + self.holes.len());
        parts.push(self.outer.to_path_data(precision));
        parts.extend(self.holes.iter().map(|h| h.to_path_data(precision)));
        parts.join(" ")
    }

    pub fn bounds(&self) -> Bounds {
        self.outer.bounds()
    }
}

/// All shapes filled with one palette color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    pub index: usize,
    pub color: PaletteColor,
    pub shapes: Vec<Shape>,
}

impl ColorGroup {
    /// Stable identifier, `color-{index}-{rrggbb}`.
    pub fn id(&self) -> String {
        format!("color-{}-{}", self.index, self.color.hex())
    }
}

/// A complete vector image. `Display` renders SVG markup.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    width: u32,
    height: u32,
    precision: u8,
    palette: Palette,
    groups: Vec<ColorGroup>,
}

impl VectorDocument {
    /// Group shapes by palette index in palette order. Colors without shapes are
    /// left out; shapes keep their given order within a group.
    pub fn new(width: u32, height: u32, precision: u8, palette: Palette, shapes: Vec<Shape>) -> Self {
        let mut groups: Vec<ColorGroup> = palette
            .colors()
            .iter()
            .enumerate()
            .map(|(index, &color)| ColorGroup {
                index,
                color,
                shapes: Vec::new(),
            })
            .collect();
        for shape in shapes {
            if let Some(group) = groups.get_mut(shape.palette_index) {
                group.shapes.push(shape);
            }
        }
        groups.retain(|g| !g.shapes.is_empty());
        Self {
            width,
            height,
            precision,
            palette,
            groups,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `viewBox` attribute value; the frame equals the (possibly downsampled) canvas.
    pub fn view_box(&self) -> String {
        format!("0 0 {} {}", self.width, self.height)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn groups(&self) -> &[ColorGroup] {
        &self.groups
    }

    pub fn region_count(&self) -> usize {
        self.groups.iter().map(|g| g.shapes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Bounds of every drawn shape, invalid when the document is empty.
    pub fn content_bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for shape in self.groups.iter().flat_map(|g| &g.shapes) {
            bounds.merge(&shape.bounds());
        }
        bounds
    }
}

impl fmt::Display for VectorDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = (self.width, self.height);
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#)?;
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="{}">"#,
            self.view_box()
        )?;
        for group in &self.groups {
            write!(
                f,
                r##"  <g id="{}" fill="#{}" fill-rule="evenodd""##,
                group.id(),
                group.color.hex()
            )?;
            if group.color.alpha < u8::MAX {
                write!(f, r#" fill-opacity="{:.3}""#, group.color.opacity())?;
            }
            writeln!(f, ">")?;
            for shape in &group.shapes {
                writeln!(f, r#"    <path d="{}"/>"#, shape.path_data(self.precision))?;
            }
            writeln!(f, "  </g>")?;
        }
        writeln!(f, "</svg>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::Anchor;
    use crate::geometry::Point;

    fn square(x: f64, y: f64, size: f64) -> FittedPath {
        let corners = [(x, y), (x + size, y), (x + size, y + size), (x, y + size)];
        FittedPath {
            anchors: corners
                .iter()
                .map(|&(x, y)| Anchor {
                    point: Point::new(x, y),
                    controls: None,
                })
                .collect(),
        }
    }

    fn palette(colors: &[PaletteColor]) -> Palette {
        Palette::from_colors(colors.to_vec())
    }

    #[test]
    fn groups_follow_palette_order() {
        let red = PaletteColor::opaque([255, 0, 0]);
        let blue = PaletteColor::opaque([0, 0, 255]);
        let shapes = vec![
            Shape {
                region: 0,
                palette_index: 1,
                outer: square(0.0, 0.0, 2.0),
                holes: vec![],
            },
            Shape {
                region: 1,
                palette_index: 0,
                outer: square(2.0, 0.0, 2.0),
                holes: vec![],
            },
        ];
        let doc = VectorDocument::new(4, 2, 2, palette(&[red, blue]), shapes);
        let ids: Vec<String> = doc.groups().iter().map(ColorGroup::id).collect();
        assert_eq!(ids, vec!["color-0-ff0000", "color-1-0000ff"]);
        assert_eq!(doc.region_count(), 2);
        assert_eq!(doc.view_box(), "0 0 4 2");
    }

    #[test]
    fn renders_evenodd_paths_with_holes() {
        let shape = Shape {
            region: 0,
            palette_index: 0,
            outer: square(0.0, 0.0, 5.0),
            holes: vec![square(1.0, 1.0, 3.0)],
        };
        let doc = VectorDocument::new(
            5,
            5,
            2,
            palette(&[PaletteColor::opaque([0, 128, 0])]),
            vec![shape],
        );
        let svg = doc.to_string();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(r#"viewBox="0 0 5 5""#));
        assert!(svg.contains(r##"<g id="color-0-008000" fill="#008000" fill-rule="evenodd">"##));
        assert!(svg.contains(r#"<path d="M0 0 L5 0 L5 5 L0 5 Z M1 1 L4 1 L4 4 L1 4 Z"/>"#));
        assert!(!svg.contains("fill-opacity"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn translucent_color_sets_opacity() {
        let color = PaletteColor {
            rgb: [10, 20, 30],
            alpha: 128,
        };
        let shape = Shape {
            region: 0,
            palette_index: 0,
            outer: square(0.0, 0.0, 1.0),
            holes: vec![],
        };
        let doc = VectorDocument::new(1, 1, 2, palette(&[color]), vec![shape]);
        assert!(doc.to_string().contains(r#"fill-opacity="0.502""#));
    }

    #[test]
    fn empty_document_has_no_groups() {
        let doc = VectorDocument::new(3, 3, 2, Palette::default(), Vec::new());
        assert!(doc.is_empty());
        assert_eq!(doc.region_count(), 0);
        assert!(!doc.content_bounds().is_valid());
        let svg = doc.to_string();
        assert!(svg.contains(r#"width="3" height="3""#));
        assert!(!svg.contains("<g"));
    }

    #[test]
    fn unused_palette_entries_are_skipped() {
        let colors = [PaletteColor::opaque([1, 2, 3]), PaletteColor::opaque([4, 5, 6])];
        let shape = Shape {
            region: 0,
            palette_index: 1,
            outer: square(0.0, 0.0, 1.0),
            holes: vec![],
        };
        let doc = VectorDocument::new(1, 1, 2, palette(&colors), vec![shape]);
        assert_eq!(doc.groups().len(), 1);
        assert_eq!(doc.groups()[0].id(), "color-1-040506");
        assert_eq!(doc.palette().len(), 2);
    }
}
