//! Component B — Layout Detector.
//!
//! Letterbox-preprocesses a rasterized page image, runs a YOLO-family ONNX
//! model, and decodes its output into [`LayoutBox`]es in source-image
//! coordinates. Handles both the post-NMS `[1, N, 6]` export shape and the
//! raw per-class-score head, per §4.B.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use anyhow::Context;
use ndarray::{Array3, Array4, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::entities::{class_name_for_id, ImageBBox, LayoutBox};

/// Required side of the (square) model input.
pub const REQUIRED_SIZE: u32 = 1024;
/// Confidence threshold below which a detection is never produced.
pub const CONF_THRESHOLD: f32 = 0.25;
/// Letterbox padding fill value, matching common YOLO export conventions.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Process-wide, lazily-constructed session cache, keyed by model path.
/// The reference codebase has a single global session; this crate supports
/// more than one model path being opened in the same process (e.g. tests)
/// without re-paying initialization cost for a path already seen.
static SESSIONS: OnceLock<Mutex<HashMap<PathBuf, std::sync::Arc<Session>>>> = OnceLock::new();

fn session_cache() -> &'static Mutex<HashMap<PathBuf, std::sync::Arc<Session>>> {
    SESSIONS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the process-wide session for `model_path`, building it on first
/// use. Subsequent calls with the same path are nearly free.
pub fn get_or_init_session(model_path: &Path) -> anyhow::Result<std::sync::Arc<Session>> {
    let mut cache = session_cache()
        .lock()
        .expect("layout session cache mutex poisoned");
    if let Some(session) = cache.get(model_path) {
        return Ok(session.clone());
    }

    let session = Session::builder()?
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load layout model at {}", model_path.display()))?;
    let session = std::sync::Arc::new(session);
    cache.insert(model_path.to_owned(), session.clone());
    Ok(session)
}

struct Letterbox {
    /// Uniform scale applied to the source image before padding.
    scale: f32,
    pad_x: u32,
    pad_y: u32,
}

fn compute_letterbox(src_w: u32, src_h: u32) -> Letterbox {
    let s = (REQUIRED_SIZE as f32 / src_w as f32).min(REQUIRED_SIZE as f32 / src_h as f32);
    let new_w = (src_w as f32 * s).round() as u32;
    let new_h = (src_h as f32 * s).round() as u32;
    let pad_x = (REQUIRED_SIZE - new_w) / 2;
    let pad_y = (REQUIRED_SIZE - new_h) / 2;
    Letterbox {
        scale: s,
        pad_x,
        pad_y,
    }
}

/// Nearest-neighbor letterbox preprocessing into a `[3,1024,1024]` tensor
/// normalized to `0..1`, channel-first.
fn preprocess(rgb: &[u8], src_w: u32, src_h: u32) -> (Array4<f32>, Letterbox) {
    let lb = compute_letterbox(src_w, src_h);
    let new_w = (src_w as f32 * lb.scale).round() as u32;
    let new_h = (src_h as f32 * lb.scale).round() as u32;

    let mut tensor = Array3::<f32>::from_elem(
        (3, REQUIRED_SIZE as usize, REQUIRED_SIZE as usize),
        PAD_VALUE,
    );

    for y in 0..new_h {
        let src_y = ((y as f32 / lb.scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f32 / lb.scale) as u32).min(src_w - 1);
            let idx = ((src_y * src_w + src_x) * 3) as usize;
            let (r, g, b) = (rgb[idx], rgb[idx + 1], rgb[idx + 2]);
            let ty = (y + lb.pad_y) as usize;
            let tx = (x + lb.pad_x) as usize;
            tensor[[0, ty, tx]] = r as f32 / 255.0;
            tensor[[1, ty, tx]] = g as f32 / 255.0;
            tensor[[2, ty, tx]] = b as f32 / 255.0;
        }
    }

    (tensor.insert_axis(ndarray::Axis(0)), lb)
}

/// Undoes letterbox padding/scaling and clamps to the source image bounds.
fn undo_letterbox(
    x_model: f32,
    y_model: f32,
    w_model: f32,
    h_model: f32,
    lb: &Letterbox,
    src_w: u32,
    src_h: u32,
) -> ImageBBox {
    let x = ((x_model - lb.pad_x as f32) / lb.scale).max(0.0);
    let y = ((y_model - lb.pad_y as f32) / lb.scale).max(0.0);
    let w = (w_model / lb.scale).min(src_w as f32 - x);
    let h = (h_model / lb.scale).min(src_h as f32 - y);
    ImageBBox::new(x, y, w.max(0.0), h.max(0.0))
}

/// Decodes the model's first output tensor, dispatching on its shape.
///
/// - `[1, N, 6]`: already-NMS'd rows `[x1, y1, x2, y2, conf, classId]`.
/// - otherwise: a raw per-class-score head, oriented `[1, F, N]` or
///   `[1, N, F]` depending on the `cols > rows && rows <= 20` heuristic.
#[instrument(skip_all)]
fn decode_output(
    output: ArrayView2<f32>,
    lb: &Letterbox,
    src_w: u32,
    src_h: u32,
) -> Vec<LayoutBox> {
    let (rows, cols) = output.dim();

    // Post-NMS: exactly 6 columns (x1,y1,x2,y2,conf,classId).
    if cols == 6 {
        let mut out = Vec::new();
        for row in output.rows() {
            let conf = row[4];
            if conf < CONF_THRESHOLD {
                continue;
            }
            let class_id = row[5] as i32;
            let bbox = undo_letterbox(row[0], row[1], row[2] - row[0], row[3] - row[1], lb, src_w, src_h);
            out.push(LayoutBox {
                bbox,
                class_id,
                class_name: class_name_for_id(class_id),
                confidence: conf,
            });
        }
        return out;
    }

    // Raw YOLO head: decide orientation via the rows<=20 heuristic, then
    // treat every detection as (cx, cy, w, h, class_scores...).
    let transposed = cols > rows && rows <= 20;
    let (num_detections, num_fields) = if transposed { (cols, rows) } else { (rows, cols) };
    if num_fields < 4 {
        return Vec::new();
    }
    let num_classes = num_fields.saturating_sub(4);

    let mut out = Vec::new();
    for i in 0..num_detections {
        let field = |f: usize| -> f32 {
            if transposed {
                output[[f, i]]
            } else {
                output[[i, f]]
            }
        };
        let (cx, cy, w, h) = (field(0), field(1), field(2), field(3));
        let (mut best_class, mut best_score) = (0usize, f32::MIN);
        for c in 0..num_classes {
            let score = field(4 + c);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < CONF_THRESHOLD {
            continue;
        }
        let x1 = cx - w / 2.0;
        let y1 = cy - h / 2.0;
        let bbox = undo_letterbox(x1, y1, w, h, lb, src_w, src_h);
        let class_id = best_class as i32;
        out.push(LayoutBox {
            bbox,
            class_id,
            class_name: class_name_for_id(class_id),
            confidence: best_score,
        });
    }
    out
}

#[instrument(skip(session, rgb))]
pub fn detect_layout(
    session: &Session,
    rgb: &[u8],
    src_w: u32,
    src_h: u32,
) -> anyhow::Result<Vec<LayoutBox>> {
    let (tensor, lb) = preprocess(rgb, src_w, src_h);
    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .context("layout model has no declared input")?;
    let output_name = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .context("layout model has no declared output")?;

    let outputs = session.run(ort::inputs![input_name.as_str() => tensor]?)?;
    let output_tensor = outputs
        .get(&output_name)
        .context("missing the layout model's first output")?
        .try_extract_tensor::<f32>()?;

    // Shape is [1, rows, cols]; drop the batch dimension.
    let batched = output_tensor
        .into_dimensionality::<ndarray::Ix3>()
        .context("layout model output is not rank 3")?;
    let view = batched.index_axis(ndarray::Axis(0), 0);

    Ok(decode_output(view, &lb, src_w, src_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn letterbox_is_centered_and_invertible_within_one_pixel() {
        let (src_w, src_h) = (1600u32, 1000u32);
        let lb = compute_letterbox(src_w, src_h);
        assert!(lb.pad_x == 0 || lb.pad_y == 0, "one axis should be unpadded");

        // Forward-then-inverse mapping of a point near the image center.
        let (px, py) = (800.0_f32, 500.0_f32);
        let model_x = px * lb.scale + lb.pad_x as f32;
        let model_y = py * lb.scale + lb.pad_y as f32;
        let back_x = (model_x - lb.pad_x as f32) / lb.scale;
        let back_y = (model_y - lb.pad_y as f32) / lb.scale;
        assert!((back_x - px).abs() <= 1.0);
        assert!((back_y - py).abs() <= 1.0);
    }

    #[test]
    fn letterbox_square_has_no_padding() {
        let lb = compute_letterbox(1024, 1024);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 0);
    }

    #[test]
    fn decode_post_nms_filters_low_confidence() {
        let lb = compute_letterbox(1024, 1024);
        let rows = vec![
            // x1,y1,x2,y2,conf,classId
            100.0, 100.0, 200.0, 200.0, 0.9, 0.0,
            300.0, 300.0, 400.0, 400.0, 0.1, 1.0,
        ];
        let arr = Array2::from_shape_vec((2, 6), rows).unwrap();
        let out = decode_output(arr.view(), &lb, 1024, 1024);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_name, "title");
    }

    #[test]
    fn decode_never_emits_low_confidence_or_unknown_class_name() {
        let lb = compute_letterbox(1024, 1024);
        let rows = vec![0.0, 0.0, 10.0, 10.0, 0.05, 0.0];
        let arr = Array2::from_shape_vec((1, 6), rows).unwrap();
        let out = decode_output(arr.view(), &lb, 1024, 1024);
        assert!(out.is_empty());
    }

    #[test]
    fn decode_raw_format_picks_argmax_class() {
        let lb = compute_letterbox(1024, 1024);
        // [1, N, F] layout, non-transposed: N=25 detections (rows > 20 so the
        // transposed heuristic doesn't kick in), F = 4 + 3 classes.
        let n = 25usize;
        let f = 7usize;
        let mut data = vec![0.0f32; n * f];
        let det = 3usize;
        data[det * f] = 512.0; // cx
        data[det * f + 1] = 512.0; // cy
        data[det * f + 2] = 100.0; // w
        data[det * f + 3] = 50.0; // h
        data[det * f + 4] = 0.1;
        data[det * f + 5] = 0.8;
        data[det * f + 6] = 0.05;
        let arr = Array2::from_shape_vec((n, f), data).unwrap();
        let out = decode_output(arr.view(), &lb, 1024, 1024);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 1);
    }

    #[test]
    fn decode_raw_format_too_few_fields_returns_empty() {
        let lb = compute_letterbox(1024, 1024);
        // cols=3 < 4 required fields; must not panic, must return nothing.
        let data = vec![0.0f32; 2 * 3];
        let arr = Array2::from_shape_vec((2, 3), data).unwrap();
        let out = decode_output(arr.view(), &lb, 1024, 1024);
        assert!(out.is_empty());
    }

    #[test]
    fn decode_raw_format_transposed_orientation() {
        let lb = compute_letterbox(1024, 1024);
        // [1, F, N] layout, transposed: rows=F=7 (<=20), cols=N=2 (cols>rows is false here,
        // so use a wider N to trigger the transposed branch).
        let n = 25usize;
        let f = 7usize; // 4 + 3 classes
        let mut data = vec![0.0f32; f * n];
        // Detection index 3 is a strong "class 2" box.
        let det = 3usize;
        data[0 * n + det] = 500.0; // cx
        data[1 * n + det] = 500.0; // cy
        data[2 * n + det] = 80.0; // w
        data[3 * n + det] = 40.0; // h
        data[4 * n + det] = 0.05;
        data[5 * n + det] = 0.1;
        data[6 * n + det] = 0.9;
        let arr = Array2::from_shape_vec((f, n), data).unwrap();
        assert!(arr.dim().1 > arr.dim().0 && arr.dim().0 <= 20);
        let out = decode_output(arr.view(), &lb, 1024, 1024);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 2);
    }
}
