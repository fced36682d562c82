//! Component A — Page Rasterizer.
//!
//! Renders one PDF page to a tightly-packed top-left-origin RGB buffer at a
//! fixed 1024px longest-side budget, and reports the scale bridging
//! PDF-point space back to image-pixel space for that page.

use anyhow::Context;
use pdfium_render::prelude::{PdfPage, PdfRenderConfig};
use tracing::instrument;

use crate::entities::RasterizedPage;

/// Longest-side budget in pixels; matches the layout detector's input size.
pub const RASTER_BUDGET_PX: u32 = 1024;

#[instrument(skip(page))]
pub fn rasterize_page(page: &mut PdfPage, page_number: usize) -> anyhow::Result<RasterizedPage> {
    let pdf_width = page.width().value;
    let pdf_height = page.height().value;
    let scale = RASTER_BUDGET_PX as f32 / pdf_width.max(pdf_height);

    let bitmap = page
        .render_with_config(&PdfRenderConfig::default().scale_page_by_factor(scale))
        .with_context(|| format!("failed to rasterize page {page_number}"))?;
    let image = bitmap.as_image().to_rgb8();

    let width = (pdf_width * scale).floor() as u32;
    let height = (pdf_height * scale).floor() as u32;

    // `as_image` may return dimensions that differ by a pixel from the
    // floor()'d target due to the renderer's own rounding; crop/pad so the
    // tightly-packed buffer always matches the reported width/height.
    let mut rgb = vec![0u8; (width * height * 3) as usize];
    let src_w = image.width();
    let src_h = image.height();
    for y in 0..height.min(src_h) {
        for x in 0..width.min(src_w) {
            let px = image.get_pixel(x, y);
            let dst = ((y * width + x) * 3) as usize;
            rgb[dst] = px[0];
            rgb[dst + 1] = px[1];
            rgb[dst + 2] = px[2];
        }
    }

    Ok(RasterizedPage {
        rgb,
        width,
        height,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_size_law_longest_side() {
        // Pure arithmetic check of the size law without an actual PDF handle:
        // max(width, height) == RASTER_BUDGET_PX and both are floor(dim*scale).
        let (pdf_w, pdf_h) = (612.0_f32, 792.0_f32);
        let scale = RASTER_BUDGET_PX as f32 / pdf_w.max(pdf_h);
        let width = (pdf_w * scale).floor() as u32;
        let height = (pdf_h * scale).floor() as u32;
        assert_eq!(width.max(height), RASTER_BUDGET_PX);
        assert_eq!(width, (pdf_w * scale).floor() as u32);
        assert_eq!(height, (pdf_h * scale).floor() as u32);
    }

    #[test]
    fn raster_size_law_landscape() {
        let (pdf_w, pdf_h) = (1000.0_f32, 400.0_f32);
        let scale = RASTER_BUDGET_PX as f32 / pdf_w.max(pdf_h);
        let width = (pdf_w * scale).floor() as u32;
        let height = (pdf_h * scale).floor() as u32;
        assert_eq!(width.max(height), RASTER_BUDGET_PX);
        assert!(height < width);
    }
}
