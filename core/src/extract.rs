//! Component C — Text Extractor.
//!
//! Reads every native text character on a PDF page and merges adjacent runs
//! sharing a font into positioned [`TextBlock`]s, skipping anything empty
//! after trim.

use anyhow::Context;
use pdfium_render::prelude::{PdfPage, PdfPageTextChar};
use tracing::instrument;

use crate::entities::TextBlock;

/// Width fallback when a character's own tight bounds collapse to zero
/// (can happen for spaces or malformed glyph outlines).
fn fallback_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.5
}

struct PendingRun {
    text: String,
    font_name: String,
    font_size: f32,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl PendingRun {
    fn from_char(ch: &PdfPageTextChar, text: String) -> anyhow::Result<Self> {
        let font_size = ch.unscaled_font_size().value;
        let bounds = ch
            .tight_bounds()
            .or_else(|_| ch.loose_bounds())
            .context("character has no usable bounds")?;
        Ok(Self {
            text,
            font_name: ch.font_name(),
            font_size,
            x0: bounds.left().value,
            y0: bounds.bottom().value,
            x1: bounds.right().value,
            y1: bounds.top().value,
        })
    }

    fn same_run(&self, ch: &PdfPageTextChar) -> bool {
        ch.font_name() == self.font_name
            && (ch.unscaled_font_size().value - self.font_size).abs() < 0.01
    }

    fn extend(&mut self, ch: &PdfPageTextChar, text: &str) {
        self.text.push_str(text);
        if let Ok(bounds) = ch.tight_bounds().or_else(|_| ch.loose_bounds()) {
            self.x0 = self.x0.min(bounds.left().value);
            self.y0 = self.y0.min(bounds.bottom().value);
            self.x1 = self.x1.max(bounds.right().value);
            self.y1 = self.y1.max(bounds.top().value);
        }
    }

    fn into_block(self) -> Option<TextBlock> {
        if self.text.trim().is_empty() {
            return None;
        }
        let mut width = self.x1 - self.x0;
        let mut height = self.y1 - self.y0;
        if width <= 0.0 {
            width = fallback_width(&self.text, self.font_size);
        }
        if height <= 0.0 {
            height = self.font_size;
        }
        Some(TextBlock {
            text: self.text,
            x: self.x0,
            y: self.y0,
            width,
            height,
            font_size: self.font_size,
            font_name: self.font_name,
        })
    }
}

#[instrument(skip(page))]
pub fn extract_text_blocks(page: &PdfPage) -> anyhow::Result<Vec<TextBlock>> {
    let text_page = page.text().context("page has no text layer")?;

    let mut blocks = Vec::new();
    let mut run: Option<PendingRun> = None;

    for ch in text_page.chars().iter() {
        let text = ch.unicode_char().map(|c| c.to_string()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        match &mut run {
            Some(r) if r.same_run(&ch) => r.extend(&ch, &text),
            _ => {
                if let Some(prev) = run.take() {
                    if let Some(block) = prev.into_block() {
                        blocks.push(block);
                    }
                }
                run = PendingRun::from_char(&ch, text).ok();
            }
        }
    }
    if let Some(prev) = run {
        if let Some(block) = prev.into_block() {
            blocks.push(block);
        }
    }

    Ok(blocks.into_iter().filter(|b| !b.text.trim().is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_width_scales_with_length_and_font_size() {
        assert_eq!(fallback_width("abcd", 10.0), 20.0);
        assert_eq!(fallback_width("", 10.0), 0.0);
    }
}
