//! Face detection capability and its SCRFD implementation.
//!
//! The monitoring loop only depends on [`FaceDetector`]; [`ScrfdDetector`] runs the
//! SCRFD (Sample and Computation Redistribution for Efficient Face Detection) model
//! through ONNX Runtime with 3-stride anchor decoding and NMS post-processing.

use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (download an SCRFD model from insightface into PROCTOR_MODEL_DIR)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer too short: expected {expected} RGB bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Detects faces in a packed RGB frame.
///
/// Implementations may keep state between frames, hence `&mut self`.
/// An empty result means no face is visible.
pub trait FaceDetector {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError>;
}

impl<T: FaceDetector + ?Sized> FaceDetector for Box<T> {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        (**self).detect(rgb, width, height)
    }
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face detector.
pub struct ScrfdDetector {
    session: Session,
    input_height: usize,
    input_width: usize,
    /// Per-stride output indices for strides [8, 16, 32].
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    /// Load an SCRFD ONNX model (with or without keypoint outputs) from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        // 6 outputs: score/bbox per stride. 9 outputs: plus keypoints, which are ignored.
        if output_names.len() != 6 && output_names.len() != 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 6 or 9 outputs (3 strides × score/bbox[/kps]), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_height: SCRFD_INPUT_SIZE,
            input_width: SCRFD_INPUT_SIZE,
            stride_indices,
        })
    }

    /// Preprocess an RGB frame into a NCHW float tensor with letterbox padding.
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
        let scale_w = self.input_width as f32 / width as f32;
        let scale_h = self.input_height as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = ((width as f32 * scale).round() as usize).min(self.input_width);
        let new_h = ((height as f32 * scale).round() as usize).min(self.input_height);
        let pad_x = (self.input_width - new_w) as f32 / 2.0;
        let pad_y = (self.input_height - new_h) as f32 / 2.0;
        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let resized = resize_rgb_bilinear(rgb, width, height, new_w, new_h);

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        // Zero is the normalized value of SCRFD_MEAN, so padding stays neutral.
        let mut tensor = Array4::<f32>::zeros((1, 3, self.input_height, self.input_width));
        for y in 0..new_h {
            for x in 0..new_w {
                let src = (y * new_w + x) * 3;
                for c in 0..3 {
                    tensor[[0, c, y + pad_y_start, x + pad_x_start]] =
                        (resized[src + c] as f32 - SCRFD_MEAN) / SCRFD_STD;
                }
            }
        }

        (tensor, letterbox)
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        check_frame(rgb, width, height)?;
        let (input, letterbox) = self.preprocess(rgb, width as usize, height as usize);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;

            all_detections.extend(decode_stride(
                scores,
                bboxes,
                stride,
                self.input_width,
                self.input_height,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let faces = nms(all_detections, SCRFD_NMS_THRESHOLD);
        tracing::trace!(faces = faces.len(), "SCRFD detection complete");
        Ok(faces)
    }
}

/// Reject empty frames and buffers shorter than `width * height * 3`.
fn check_frame(rgb: &[u8], width: u32, height: u32) -> Result<(), DetectorError> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() < expected || expected == 0 {
        return Err(DetectorError::InvalidFrame {
            expected,
            actual: rgb.len(),
        });
    }
    Ok(())
}

/// Bilinear resize of a packed RGB buffer.
fn resize_rgb_bilinear(
    rgb: &[u8],
    width: usize,
    height: usize,
    new_w: usize,
    new_h: usize,
) -> Vec<u8> {
    let inv_scale_x = width as f32 / new_w as f32;
    let inv_scale_y = height as f32 / new_h as f32;
    let mut resized = vec![0u8; new_w * new_h * 3];

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * inv_scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * inv_scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..3 {
                let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
                let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
                let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
                let br = rgb[(y1 * width + x1) * 3 + c] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                resized[(y * new_w + x) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    resized
}

/// Map output tensors to stride slots.
///
/// Exports name tensors either "score_8", "bbox_16", ... or with generic numbers.
/// Generic names fall back to the standard positional ordering, which is the same
/// with or without keypoint outputs:
///   [0-2] = scores (strides 8, 16, 32)
///   [3-5] = bboxes (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match named {
        Some(found) => {
            tracing::info!("SCRFD: using name-based output tensor mapping");
            [found[0], found[1], found[2]]
        }
        None => {
            tracing::info!(
                ?names,
                "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
            );
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode detections for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    input_width: usize,
    input_height: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<BoundingBox> {
    let grid_w = input_width / stride;
    let grid_h = input_height / stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid_w) as f32 * step;
        let anchor_cy = (anchor_idx / grid_w) as f32 * step;

        // Distances from the anchor to the left, top, right, bottom edges.
        let x1 = anchor_cx - bboxes[bbox_off] * step;
        let y1 = anchor_cy - bboxes[bbox_off + 1] * step;
        let x2 = anchor_cx + bboxes[bbox_off + 2] * step;
        let y2 = anchor_cy + bboxes[bbox_off + 3] * step;

        let orig_x1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let orig_y1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let orig_x2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let orig_y2 = (y2 - letterbox.pad_y) / letterbox.scale;

        detections.push(BoundingBox {
            x: orig_x1,
            y: orig_y1,
            width: orig_x2 - orig_x1,
            height: orig_y2 - orig_y1,
            confidence: score,
        });
    }

    detections
}

/// Non-Maximum Suppression. Returns the kept boxes sorted by confidence, highest first.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|kept| kept.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
