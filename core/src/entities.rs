//! Shared data model: bounding boxes in their two coordinate spaces, layout
//! detections, positioned text, and the regions assembled from both.

use serde::{Deserialize, Serialize};

pub type PageIndex = usize;

/// The ten DocLayout-style classes, in the model's declaration order.
pub const CLASS_NAMES: [&str; 10] = [
    "title",
    "plain_text",
    "abandon",
    "figure",
    "figure_caption",
    "table",
    "table_caption",
    "table_footnote",
    "isolate_formula",
    "formula_caption",
];

/// Layout classes whose matched text is eligible for translation.
pub const TRANSLATABLE_CLASSES: [&str; 6] = [
    "title",
    "plain_text",
    "figure_caption",
    "table_caption",
    "table_footnote",
    "formula_caption",
];

pub fn is_translatable_class(class_name: &str) -> bool {
    TRANSLATABLE_CLASSES.contains(&class_name)
}

/// Maps an out-of-range or unknown class id to the fallback class name.
pub fn class_name_for_id(class_id: i32) -> &'static str {
    CLASS_NAMES
        .get(class_id as usize)
        .copied()
        .unwrap_or("plain_text")
}

/// A rectangle in image-pixel space: origin top-left, integer-ish units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageBBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ImageBBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test on the box boundaries.
    #[inline]
    pub fn contains_point(&self, (px, py): (f32, f32)) -> bool {
        px >= self.x
            && px <= self.x + self.width
            && py >= self.y
            && py <= self.y + self.height
    }
}

/// A rectangle in PDF-point space: origin bottom-left, floating-point units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PdfBBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PdfBBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn x1(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn y1(&self) -> f32 {
        self.y + self.height
    }

    /// Expands the box by `margin` points on every side, producing a new value.
    #[inline]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Tight union of a set of PDF-space boxes. Panics on an empty slice;
    /// callers are expected to have already checked for non-empty input.
    pub fn union_all(boxes: &[PdfBBox]) -> Self {
        let first = boxes[0];
        let mut x0 = first.x;
        let mut y0 = first.y;
        let mut x1 = first.x1();
        let mut y1 = first.y1();
        for b in &boxes[1..] {
            x0 = x0.min(b.x);
            y0 = y0.min(b.y);
            x1 = x1.max(b.x1());
            y1 = y1.max(b.y1());
        }
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Strict AABB overlap test (both axes strictly intersect).
    #[inline]
    pub fn overlaps_strict(&self, other: &PdfBBox) -> bool {
        self.x < other.x1() && other.x < self.x1() && self.y < other.y1() && other.y < self.y1()
    }
}

/// One detection out of the layout model.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub bbox: ImageBBox,
    pub class_id: i32,
    pub class_name: &'static str,
    pub confidence: f32,
}

impl LayoutBox {
    pub fn is_translatable(&self) -> bool {
        is_translatable_class(self.class_name)
    }
}

/// One positioned text run harvested from the page's text layer.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_name: String,
}

impl TextBlock {
    pub fn pdf_bbox(&self) -> PdfBBox {
        PdfBBox::new(self.x, self.y, self.width, self.height)
    }
}

/// A layout box paired with the text blocks matched inside it.
#[derive(Debug, Clone)]
pub struct TranslatableRegion {
    pub layout_box: LayoutBox,
    pub text_blocks: Vec<TextBlock>,
    pub full_text: String,
    pub pdf_bbox: PdfBBox,
}

/// A region after translation; erasure is always drawn, glyphs only if non-empty.
#[derive(Debug, Clone)]
pub struct TranslatedRegion {
    pub region: TranslatableRegion,
    pub translated_text: String,
}

/// Per-page regions, in the order pages were processed.
pub type PageRegions = std::collections::BTreeMap<PageIndex, Vec<TranslatedRegion>>;

/// Token/cost accounting for one translator run. Additive across batches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TranslatorUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
}

impl TranslatorUsage {
    pub fn add(&mut self, other: &TranslatorUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_cost += other.total_cost;
    }
}

/// One rasterized page: tightly packed top-left-origin RGB buffer plus the
/// scale bridging image-pixel space back to PDF-point space.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_for_id_in_range() {
        assert_eq!(class_name_for_id(0), "title");
        assert_eq!(class_name_for_id(9), "formula_caption");
    }

    #[test]
    fn class_name_for_id_out_of_range_defaults_to_plain_text() {
        assert_eq!(class_name_for_id(-1), "plain_text");
        assert_eq!(class_name_for_id(42), "plain_text");
    }

    #[test]
    fn translatable_subset_matches_spec() {
        assert!(is_translatable_class("title"));
        assert!(is_translatable_class("plain_text"));
        assert!(!is_translatable_class("abandon"));
        assert!(!is_translatable_class("figure"));
        assert!(!is_translatable_class("table"));
        assert!(!is_translatable_class("isolate_formula"));
    }

    #[test]
    fn pdf_bbox_union_all_tight() {
        let boxes = [
            PdfBBox::new(0.0, 0.0, 10.0, 5.0),
            PdfBBox::new(8.0, -2.0, 4.0, 4.0),
        ];
        let u = PdfBBox::union_all(&boxes);
        assert_eq!(u.x, 0.0);
        assert_eq!(u.y, -2.0);
        assert_eq!(u.x1(), 12.0);
        assert_eq!(u.y1(), 5.0);
    }

    #[test]
    fn pdf_bbox_expanded_grows_symmetrically() {
        let b = PdfBBox::new(10.0, 10.0, 20.0, 10.0).expanded(2.0);
        assert_eq!(b.x, 8.0);
        assert_eq!(b.y, 8.0);
        assert_eq!(b.width, 24.0);
        assert_eq!(b.height, 14.0);
    }

    #[test]
    fn overlaps_strict_requires_both_axes() {
        let a = PdfBBox::new(0.0, 0.0, 10.0, 10.0);
        let touching = PdfBBox::new(10.0, 0.0, 10.0, 10.0);
        let overlapping = PdfBBox::new(5.0, 5.0, 10.0, 10.0);
        assert!(!a.overlaps_strict(&touching));
        assert!(a.overlaps_strict(&overlapping));
    }

    #[test]
    fn image_bbox_contains_point_is_inclusive() {
        let b = ImageBBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains_point((0.0, 0.0)));
        assert!(b.contains_point((10.0, 10.0)));
        assert!(!b.contains_point((10.01, 5.0)));
    }
}
