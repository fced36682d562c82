//! Component G — Orchestrator.
//!
//! Sequences A→B→C→D→E per page, aggregates results into [`PageRegions`],
//! emits progress, honors cooperative cancellation, and invokes F once at
//! the end.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pdfium_render::prelude::Pdfium;
use tracing::{info, instrument};

use crate::config::AppSettings;
use crate::entities::{PageRegions, TranslatedRegion, TranslatorUsage};
use crate::error::{PipelineError, Result};
use crate::{extract, layout, matcher, pdfwrite, raster, translate::Translator};

pub type AbortFlag = Arc<AtomicBool>;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: String,
    pub current_page: usize,
    pub total_pages: usize,
    pub percent: f32,
}

pub struct RunRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub settings: AppSettings,
    pub selected_pages: Option<Vec<usize>>,
    pub custom_prompt: Option<String>,
    pub abort_flag: AbortFlag,
    pub model_path: PathBuf,
    pub font_regular_path: Option<PathBuf>,
    pub font_bold_path: Option<PathBuf>,
}

pub struct RunResult {
    pub usage: TranslatorUsage,
}

fn check_abort(abort_flag: &AbortFlag) -> Result<()> {
    if abort_flag.load(Ordering::SeqCst) {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// `selectedPages` is one-based; values outside `[1..N]` are silently
/// dropped and an empty/omitted selection means every page.
fn resolve_selected_pages(selected: Option<&[usize]>, total_pages: usize) -> Vec<usize> {
    match selected {
        None => (1..=total_pages).collect(),
        Some(pages) if pages.is_empty() => (1..=total_pages).collect(),
        Some(pages) => {
            let mut seen = std::collections::BTreeSet::new();
            pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages && seen.insert(p))
                .collect()
        }
    }
}

#[instrument(skip(request, on_progress))]
pub async fn run(request: RunRequest, on_progress: impl Fn(ProgressEvent)) -> Result<RunResult> {
    check_abort(&request.abort_flag)?;
    on_progress(ProgressEvent {
        stage: "load_model".to_string(),
        current_page: 0,
        total_pages: 0,
        percent: 0.0,
    });
    let session = layout::get_or_init_session(&request.model_path)
        .map_err(|e| PipelineError::InferenceFailed(e.to_string()))?;

    on_progress(ProgressEvent {
        stage: "load_pdf".to_string(),
        current_page: 0,
        total_pages: 0,
        percent: 5.0,
    });
    let bindings = Pdfium::bind_to_statically_linked_library().map_err(|e| PipelineError::AssetMissing {
        path: PathBuf::from(format!("pdfium library ({e})")),
    })?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_file(&request.input_path, None)
        .map_err(|e| PipelineError::RenderFailed {
            page_number: 0,
            cause: e.to_string(),
        })?;
    let total_pages = document.pages().len() as usize;

    let selected = resolve_selected_pages(request.selected_pages.as_deref(), total_pages);
    let n = selected.len().max(1);

    let mut settings = request.settings.clone();
    if let Some(custom) = &request.custom_prompt {
        if !custom.trim().is_empty() {
            settings.custom_prompt = custom.clone();
        }
    }
    let mut translator = Translator::from_settings(&settings);
    let target_language = settings.target_language.0.clone();

    let mut page_regions: PageRegions = PageRegions::new();
    let mut total_usage = TranslatorUsage::default();

    for (i, &page_number) in selected.iter().enumerate() {
        check_abort(&request.abort_flag)?;
        let base = 10.0 + (i as f32 / n as f32) * 85.0;
        let step = 85.0 / n as f32;

        let mut page = document
            .pages()
            .get((page_number - 1) as u16)
            .map_err(|e| PipelineError::RenderFailed {
                page_number,
                cause: e.to_string(),
            })?;

        let rasterized = raster::rasterize_page(&mut page, page_number)
            .map_err(|e| PipelineError::RenderFailed {
                page_number,
                cause: e.to_string(),
            })?;
        on_progress(ProgressEvent {
            stage: "rasterize".to_string(),
            current_page: page_number,
            total_pages: n,
            percent: base,
        });

        let layout_boxes = layout::detect_layout(&session, &rasterized.rgb, rasterized.width, rasterized.height)
            .map_err(|e| PipelineError::InferenceFailed(e.to_string()))?;
        on_progress(ProgressEvent {
            stage: "layout".to_string(),
            current_page: page_number,
            total_pages: n,
            percent: base + 0.2 * step,
        });

        let text_blocks = extract::extract_text_blocks(&page)
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;
        on_progress(ProgressEvent {
            stage: "extract".to_string(),
            current_page: page_number,
            total_pages: n,
            percent: base + 0.4 * step,
        });

        let page_height = page.height().value;
        let regions = matcher::match_regions(&layout_boxes, &text_blocks, page_height, rasterized.scale);
        on_progress(ProgressEvent {
            stage: "match".to_string(),
            current_page: page_number,
            total_pages: n,
            percent: base + 0.6 * step,
        });

        drop(page);

        if regions.is_empty() {
            info!(page_number, "no translatable regions on page");
            continue;
        }

        let texts: Vec<String> = regions.iter().map(|r| r.full_text.clone()).collect();
        let translated_texts = translator
            .translate_batch(&texts, "", &target_language)
            .await
            .map_err(|e| PipelineError::TranslationFailed(e.to_string()))?;
        total_usage.add(&translator.usage());

        let translated_regions: Vec<TranslatedRegion> = regions
            .into_iter()
            .zip(translated_texts)
            .map(|(region, translated_text)| TranslatedRegion {
                region,
                translated_text,
            })
            .collect();
        page_regions.insert(page_number - 1, translated_regions);
    }

    check_abort(&request.abort_flag)?;
    on_progress(ProgressEvent {
        stage: "write_pdf".to_string(),
        current_page: 0,
        total_pages: n,
        percent: 95.0,
    });
    pdfwrite::write_translated_pdf(
        &request.input_path,
        &request.output_path,
        &page_regions,
        request.font_regular_path.as_deref(),
        request.font_bold_path.as_deref(),
    )
    .map_err(|e| PipelineError::WriteFailed(e.to_string()))?;

    on_progress(ProgressEvent {
        stage: "complete".to_string(),
        current_page: n,
        total_pages: n,
        percent: 100.0,
    });

    Ok(RunResult { usage: total_usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_selected_pages_none_means_all() {
        assert_eq!(resolve_selected_pages(None, 3), vec![1, 2, 3]);
    }

    #[test]
    fn resolve_selected_pages_empty_means_all() {
        assert_eq!(resolve_selected_pages(Some(&[]), 3), vec![1, 2, 3]);
    }

    #[test]
    fn resolve_selected_pages_drops_out_of_range_and_dedups() {
        assert_eq!(resolve_selected_pages(Some(&[0, 3, 99, 3]), 5), vec![3]);
    }

    #[test]
    fn check_abort_returns_cancelled_when_set() {
        let flag: AbortFlag = Arc::new(AtomicBool::new(true));
        assert!(matches!(check_abort(&flag), Err(PipelineError::Cancelled)));
    }

    #[test]
    fn check_abort_ok_when_unset() {
        let flag: AbortFlag = Arc::new(AtomicBool::new(false));
        assert!(check_abort(&flag).is_ok());
    }
}
