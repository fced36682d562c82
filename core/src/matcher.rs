//! Component D — Region Matcher.
//!
//! Projects PDF-space text blocks into image-pixel space, assigns each to
//! every translatable layout box whose area contains the block's center,
//! and assembles reading-order region text with a tight PDF-space bbox.

use tracing::instrument;

use crate::entities::{LayoutBox, PdfBBox, TextBlock, TranslatableRegion};

/// Same-line tolerance when a text block's own font size is unavailable.
const DEFAULT_LINE_TOLERANCE: f32 = 10.0;

struct Projected<'a> {
    block: &'a TextBlock,
    center_x: f32,
    center_y: f32,
}

fn project(block: &TextBlock, page_height: f32, scale: f32) -> Projected<'_> {
    let img_x = block.x * scale;
    let img_y = (page_height - block.y - block.height) * scale;
    Projected {
        block,
        center_x: img_x + block.width * scale / 2.0,
        center_y: img_y + block.height * scale / 2.0,
    }
}

fn reading_order_sort(blocks: &mut Vec<&TextBlock>, page_height: f32) {
    blocks.sort_by(|a, b| {
        let a_top_down = page_height - a.y;
        let b_top_down = page_height - b.y;
        let tolerance = if a.font_size > 0.0 {
            a.font_size
        } else {
            DEFAULT_LINE_TOLERANCE
        };
        if (a_top_down - b_top_down).abs() < tolerance {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a_top_down
                .partial_cmp(&b_top_down)
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

/// Builds one region per translatable layout box that captures at least one
/// text block, preserving the order layout boxes were detected in.
#[instrument(skip(layout_boxes, text_blocks))]
pub fn match_regions(
    layout_boxes: &[LayoutBox],
    text_blocks: &[TextBlock],
    page_height: f32,
    scale: f32,
) -> Vec<TranslatableRegion> {
    let projected: Vec<Projected<'_>> = text_blocks
        .iter()
        .map(|b| project(b, page_height, scale))
        .collect();

    let mut regions = Vec::new();
    for layout_box in layout_boxes {
        if !layout_box.is_translatable() {
            continue;
        }

        let mut matched: Vec<&TextBlock> = projected
            .iter()
            .filter(|p| layout_box.bbox.contains_point((p.center_x, p.center_y)))
            .map(|p| p.block)
            .collect();
        if matched.is_empty() {
            continue;
        }

        reading_order_sort(&mut matched, page_height);

        let full_text = matched
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if full_text.trim().is_empty() {
            continue;
        }

        let pdf_boxes: Vec<PdfBBox> = matched.iter().map(|b| b.pdf_bbox()).collect();
        let pdf_bbox = PdfBBox::union_all(&pdf_boxes).expanded(2.0);

        regions.push(TranslatableRegion {
            layout_box: layout_box.clone(),
            text_blocks: matched.into_iter().cloned().collect(),
            full_text,
            pdf_bbox,
        });
    }

    regions
}
