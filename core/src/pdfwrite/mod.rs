//! Component F — PDF Writer.
//!
//! Reopens the original document, draws an opaque white rectangle plus
//! auto-shrunk translated text over every region, and scrubs `Link`
//! annotations that now overlap translated ink.

mod font;
mod wrap;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::instrument;

use crate::entities::{PageRegions, PdfBBox, TranslatedRegion};
use font::LoadedFont;

const BODY_CLASSES: [&str; 5] = [
    "plain_text",
    "figure_caption",
    "table_caption",
    "table_footnote",
    "formula_caption",
];
const FALLBACK_BODY_SIZE: f32 = 10.0;
const MIN_FONT_SIZE: f32 = 6.0;
const FONT_SHRINK_STEP: f32 = 0.5;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

fn uniform_body_font_size(regions: &[TranslatedRegion]) -> f32 {
    let sizes: Vec<f32> = regions
        .iter()
        .filter(|r| BODY_CLASSES.contains(&r.region.layout_box.class_name))
        .flat_map(|r| r.region.text_blocks.iter().map(|b| b.font_size))
        .collect();
    median(sizes).unwrap_or(FALLBACK_BODY_SIZE)
}

struct RenderedRegion {
    bbox: PdfBBox,
    padding: f32,
    font_size: f32,
    hex_lines: Vec<String>,
    use_bold: bool,
}

fn render_region(region: &TranslatedRegion, regular: &LoadedFont, bold: Option<&LoadedFont>, body_size: f32) -> RenderedRegion {
    let bbox = region.region.pdf_bbox;
    let is_title = region.region.layout_box.class_name == "title";
    let use_bold = is_title && bold.is_some();
    let font = if use_bold { bold.unwrap() } else { regular };

    let target_size = if is_title {
        mean(&region.region.text_blocks.iter().map(|b| b.font_size).collect::<Vec<_>>())
            .unwrap_or(body_size)
    } else {
        body_size
    };

    // Padding is derived once from the target size, before shrinking, and
    // held fixed for the rest of the fit/draw pipeline.
    let padding = (target_size * 0.15).max(2.0);
    let avail_w = (bbox.width - 2.0 * padding).max(1.0);
    let avail_h = (bbox.height - 2.0 * padding).max(1.0);

    let mut font_size = target_size;
    let face = font.face();
    loop {
        let wrapped = wrap::wrap(&region.translated_text, face.as_ref(), font_size, avail_w);
        let total_height = wrapped.lines.len() as f32 * font_size * LINE_HEIGHT_FACTOR;
        if total_height <= avail_h || font_size <= MIN_FONT_SIZE {
            break;
        }
        font_size -= FONT_SHRINK_STEP;
    }
    font_size = font_size.max(MIN_FONT_SIZE);

    let wrapped = wrap::wrap(&region.translated_text, face.as_ref(), font_size, avail_w);
    let hex_lines = wrapped
        .lines
        .iter()
        .map(|line| font.encode_hex(line))
        .collect();

    RenderedRegion {
        bbox,
        padding,
        font_size,
        hex_lines,
        use_bold,
    }
}

fn content_for_page(regions: &[TranslatedRegion], regular: &LoadedFont, bold: Option<&LoadedFont>, body_size: f32) -> String {
    let mut content = String::new();
    content.push_str("q\n");
    content.push_str("1 1 1 rg\n");
    for region in regions {
        let bbox = region.region.pdf_bbox;
        let _ = writeln!(content, "{} {} {} {} re f", bbox.x, bbox.y, bbox.width, bbox.height);
    }
    content.push_str("0 0 0 rg\n");

    for region in regions {
        if region.translated_text.trim().is_empty() {
            continue;
        }
        let rendered = render_region(region, regular, bold, body_size);
        let line_height = rendered.font_size * LINE_HEIGHT_FACTOR;
        let resource_name = if rendered.use_bold {
            bold.map(|b| b.resource_name.as_str()).unwrap_or(regular.resource_name.as_str())
        } else {
            regular.resource_name.as_str()
        };

        for (i, hex) in rendered.hex_lines.iter().enumerate() {
            let baseline = rendered.bbox.y + rendered.bbox.height
                - rendered.padding
                - (i as f32 + 1.0) * line_height
                + (line_height - rendered.font_size);
            if baseline < rendered.bbox.y {
                break;
            }
            content.push_str("BT\n");
            let _ = writeln!(content, "/{} {} Tf", resource_name, rendered.font_size);
            let _ = writeln!(content, "{} {} Td", rendered.bbox.x + rendered.padding, baseline);
            let _ = writeln!(content, "<{hex}> Tj");
            content.push_str("ET\n");
        }
    }
    content.push_str("Q\n");
    content
}

fn append_content(doc: &mut Document, page_id: ObjectId, content: &str) -> anyhow::Result<()> {
    let stream = Stream::new(Dictionary::new(), content.as_bytes().to_vec());
    let stream_id = doc.add_object(Object::Stream(stream));

    let page = doc.get_object_mut(page_id).context("page object missing")?;
    if let Object::Dictionary(dict) = page {
        match dict.get(b"Contents").ok().cloned() {
            Some(Object::Reference(existing)) => {
                dict.set("Contents", Object::Array(vec![Object::Reference(existing), Object::Reference(stream_id)]));
            }
            Some(Object::Array(mut arr)) => {
                arr.push(Object::Reference(stream_id));
                dict.set("Contents", Object::Array(arr));
            }
            _ => dict.set("Contents", Object::Reference(stream_id)),
        }
    }
    Ok(())
}

fn wire_font_resources(doc: &mut Document, page_id: ObjectId, fonts: &[(&str, ObjectId)]) -> anyhow::Result<()> {
    let resources_id = {
        let page = doc.get_object(page_id).context("page object missing")?;
        match page {
            Object::Dictionary(dict) => match dict.get(b"Resources") {
                Ok(Object::Reference(id)) => Some(*id),
                _ => None,
            },
            _ => None,
        }
    };

    let mut font_dict = Dictionary::new();
    for (name, id) in fonts {
        font_dict.set(*name, Object::Reference(*id));
    }

    if let Some(resources_id) = resources_id {
        if let Ok(Object::Dictionary(resources)) = doc.get_object_mut(resources_id) {
            match resources.get(b"Font").ok().cloned() {
                Some(Object::Dictionary(mut existing)) => {
                    for (name, id) in fonts {
                        existing.set(*name, Object::Reference(*id));
                    }
                    resources.set("Font", Object::Dictionary(existing));
                }
                _ => resources.set("Font", Object::Dictionary(font_dict)),
            }
        }
    } else {
        let new_resources = Dictionary::from_iter([("Font", Object::Dictionary(font_dict))]);
        let new_resources_id = doc.add_object(Object::Dictionary(new_resources));
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Resources", Object::Reference(new_resources_id));
        }
    }
    Ok(())
}

fn scrub_link_annotations(doc: &mut Document, page_id: ObjectId, regions: &[TranslatedRegion]) -> anyhow::Result<()> {
    let annots_id = {
        let page = doc.get_object(page_id).context("page object missing")?;
        match page {
            Object::Dictionary(dict) => match dict.get(b"Annots") {
                Ok(Object::Array(_)) => None,
                Ok(Object::Reference(id)) => Some(*id),
                _ => None,
            },
            _ => None,
        }
    };

    let annots_array_owner: Option<ObjectId> = annots_id.or(Some(page_id));
    let annots = {
        let page_or_target = doc.get_object(annots_array_owner.unwrap())?;
        match page_or_target {
            Object::Dictionary(dict) => dict.get(b"Annots").ok().and_then(|o| match o {
                Object::Array(a) => Some(a.clone()),
                _ => None,
            }),
            Object::Array(a) => Some(a.clone()),
            _ => None,
        }
    };
    let Some(mut annots) = annots else {
        return Ok(());
    };

    let mut to_remove = Vec::new();
    for (idx, annot) in annots.iter().enumerate() {
        let Object::Reference(annot_id) = annot else {
            continue;
        };
        let Ok(Object::Dictionary(annot_dict)) = doc.get_object(*annot_id) else {
            continue;
        };
        let is_link = matches!(annot_dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Link");
        if !is_link {
            continue;
        }
        let Ok(Object::Array(rect)) = annot_dict.get(b"Rect") else {
            continue;
        };
        let values: Vec<f32> = rect
            .iter()
            .filter_map(|o| match o {
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r),
                _ => None,
            })
            .collect();
        if values.len() != 4 {
            continue;
        }
        let annot_bbox = PdfBBox::new(values[0], values[1], values[2] - values[0], values[3] - values[1]);
        if regions.iter().any(|r| r.region.pdf_bbox.overlaps_strict(&annot_bbox)) {
            to_remove.push(idx);
        }
    }

    for idx in to_remove.into_iter().rev() {
        annots.remove(idx);
    }

    let page = doc.get_object_mut(page_id)?;
    if let Object::Dictionary(dict) = page {
        if annots.is_empty() {
            dict.remove(b"Annots");
        } else {
            dict.set("Annots", Object::Array(annots));
        }
    }
    Ok(())
}

/// Reopens `input_path`, overlays every translated region for the pages
/// present in `page_regions`, scrubs now-overlapping link annotations, and
/// writes the result to `output_path`.
#[instrument(skip(page_regions))]
pub fn write_translated_pdf(
    input_path: &Path,
    output_path: &Path,
    page_regions: &PageRegions,
    font_regular_path: Option<&Path>,
    font_bold_path: Option<&Path>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    let mut doc = Document::load_mem(&bytes).context("failed to parse PDF")?;

    let regular = font::load_or_fallback(font_regular_path, "FReg");
    let bold = font_bold_path.map(|p| font::load_or_fallback(Some(p), "FBold"));

    let regular_id = font::embed_in_document(&regular, &mut doc, "PDF2ZHRegular")?;
    let bold_id = bold
        .as_ref()
        .map(|b| font::embed_in_document(b, &mut doc, "PDF2ZHBold"))
        .transpose()?;

    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();

    for (&page_index, regions) in page_regions.iter() {
        let lopdf_page_number = page_index as u32 + 1;
        let Some(&page_id) = pages.get(&lopdf_page_number) else {
            continue;
        };
        if regions.is_empty() {
            continue;
        }

        let mut font_refs = vec![(regular.resource_name.as_str(), regular_id)];
        if let (Some(bold_font), Some(bold_font_id)) = (&bold, bold_id) {
            font_refs.push((bold_font.resource_name.as_str(), bold_font_id));
        }
        wire_font_resources(&mut doc, page_id, &font_refs)?;

        let body_size = uniform_body_font_size(regions);
        let content = content_for_page(regions, &regular, bold.as_ref(), body_size);
        append_content(&mut doc, page_id, &content)?;

        scrub_link_annotations(&mut doc, page_id, regions)?;
    }

    let tmp_path = output_path.with_extension("pdf.tmp");
    let mut out = std::fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    doc.save_to(&mut out).context("failed to serialize PDF")?;
    drop(out);
    std::fs::rename(&tmp_path, output_path)
        .with_context(|| format!("failed to move output into place at {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_empty_is_none() {
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(vec![1.0, 3.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }

    #[test]
    fn uniform_body_font_size_falls_back_when_no_body_blocks() {
        assert_eq!(uniform_body_font_size(&[]), FALLBACK_BODY_SIZE);
    }

    fn sample_region(bbox: PdfBBox) -> TranslatedRegion {
        use crate::entities::{ImageBBox, LayoutBox, TranslatableRegion};
        TranslatedRegion {
            region: TranslatableRegion {
                layout_box: LayoutBox {
                    bbox: ImageBBox::new(0.0, 0.0, 10.0, 10.0),
                    class_id: 1,
                    class_name: "plain_text",
                    confidence: 0.9,
                },
                text_blocks: vec![],
                full_text: "hola".to_string(),
                pdf_bbox: bbox,
            },
            translated_text: "hello".to_string(),
        }
    }

    #[test]
    fn scrub_link_annotations_removes_only_overlapping_links() {
        let mut doc = Document::with_version("1.5");
        let overlapping_link = doc.add_object(Object::Dictionary(Dictionary::from_iter([
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "Rect",
                Object::Array(vec![
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(50.0),
                    Object::Real(50.0),
                ]),
            ),
        ])));
        let distant_link = doc.add_object(Object::Dictionary(Dictionary::from_iter([
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "Rect",
                Object::Array(vec![
                    Object::Real(500.0),
                    Object::Real(500.0),
                    Object::Real(550.0),
                    Object::Real(550.0),
                ]),
            ),
        ])));
        let page_id = doc.add_object(Object::Dictionary(Dictionary::from_iter([(
            "Annots",
            Object::Array(vec![
                Object::Reference(overlapping_link),
                Object::Reference(distant_link),
            ]),
        )])));

        let regions = vec![sample_region(PdfBBox::new(10.0, 10.0, 20.0, 20.0))];
        scrub_link_annotations(&mut doc, page_id, &regions).unwrap();

        let Object::Dictionary(page) = doc.get_object(page_id).unwrap() else {
            panic!("page object missing");
        };
        let Object::Array(remaining) = page.get(b"Annots").unwrap() else {
            panic!("Annots missing");
        };
        assert_eq!(remaining, &vec![Object::Reference(distant_link)]);
    }

    #[test]
    fn render_region_auto_shrink_terminates_at_or_above_floor() {
        let regular = font::load_or_fallback(None, "FReg");
        let long_text = "x".repeat(400);
        let region = TranslatedRegion {
            translated_text: long_text,
            ..sample_region(PdfBBox::new(0.0, 0.0, 40.0, 20.0))
        };
        let rendered = render_region(&region, &regular, None, FALLBACK_BODY_SIZE);
        assert!(rendered.font_size >= MIN_FONT_SIZE);
        assert!(!rendered.hex_lines.is_empty());
    }
}
