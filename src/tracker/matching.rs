//! Cost matrices and the bipartite assignment solver.
//!
//! All matrices are tracks x detections with lower-is-better entries;
//! `f32::INFINITY` marks an ineligible pair.

use ndarray::{Array1, Array2};

use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::{CHI2_GATE_4DOF, KalmanFilter};
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;

/// Pad cost standing in for ineligible pairs inside the LAPJV solve. Any
/// genuine match costs at most 1 + fusion terms, so this never wins.
const PAD_COST: f64 = 1e6;

/// IoU distance (1 - IoU). Pairs at or below `iou_floor` overlap are marked
/// infeasible outright rather than given a finite long-range penalty.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect], iou_floor: f32) -> Array2<f32> {
    let mut dists = Array2::zeros((track_boxes.len(), det_boxes.len()));
    for (i, t) in track_boxes.iter().enumerate() {
        for (j, d) in det_boxes.iter().enumerate() {
            let iou = t.iou(d);
            dists[[i, j]] = if iou <= iou_floor {
                f32::INFINITY
            } else {
                1.0 - iou
            };
        }
    }
    dists
}

/// Fold detection confidence into an IoU cost matrix: similarity becomes
/// `iou * score`, so equally-overlapping candidates prefer the higher score.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Detection]) {
    let (rows, cols) = cost_matrix.dim();
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            cost_matrix[[i, j]] = 1.0 - iou_sim * detections[j].score;
        }
    }
}

/// Cosine distance between detection embeddings and each track's smoothed
/// embedding. Pairs where either side lacks a feature are infinite.
pub fn embedding_distance(tracks: &[Track], detections: &[Detection]) -> Array2<f32> {
    let mut dists = Array2::from_elem((tracks.len(), detections.len()), f32::INFINITY);
    for (i, track) in tracks.iter().enumerate() {
        let Some(track_feat) = track.smooth_feat() else {
            continue;
        };
        for (j, det) in detections.iter().enumerate() {
            if let Some(det_feat) = &det.feature {
                dists[[i, j]] = cosine_distance(track_feat, det_feat);
            }
        }
    }
    dists
}

/// Weighted fusion of appearance and IoU costs. Infinite IoU entries stay
/// infinite (overlap remains a hard gate); pairs without embeddings fall
/// back to the IoU term alone.
pub fn fuse_appearance(
    iou_cost: &Array2<f32>,
    emb_cost: &Array2<f32>,
    weight: f32,
) -> Array2<f32> {
    let (rows, cols) = iou_cost.dim();
    let mut fused = Array2::zeros((rows, cols));
    for i in 0..rows {
        for j in 0..cols {
            let iou = iou_cost[[i, j]];
            let emb = emb_cost[[i, j]];
            fused[[i, j]] = if !iou.is_finite() {
                f32::INFINITY
            } else if !emb.is_finite() {
                iou
            } else {
                weight * emb + (1.0 - weight) * iou
            };
        }
    }
    fused
}

/// Mark pairs whose squared Mahalanobis innovation distance exceeds the
/// chi-squared gate as infeasible. Tracks whose gating distance cannot be
/// computed are left unmodified and dealt with at update time.
pub fn gate_cost_matrix(
    kalman_filter: &KalmanFilter,
    cost_matrix: &mut Array2<f32>,
    tracks: &[Track],
    detections: &[Detection],
) {
    let measurements: Vec<[f64; 4]> = detections
        .iter()
        .map(|d| {
            let xyah = d.bbox.to_xyah();
            [
                xyah[0] as f64,
                xyah[1] as f64,
                xyah[2] as f64,
                xyah[3] as f64,
            ]
        })
        .collect();

    for (i, track) in tracks.iter().enumerate() {
        let (Some(mean), Some(cov)) = (track.mean(), track.covariance()) else {
            continue;
        };
        let Ok(distances) = kalman_filter.gating_distance(mean, cov, &measurements) else {
            continue;
        };
        for j in 0..detections.len() {
            if distances[j] > CHI2_GATE_4DOF {
                cost_matrix[[i, j]] = f32::INFINITY;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost bipartite matching with an acceptance threshold.
///
/// Matrix-optimal pairs costing more than `thresh` (or infeasible ones) are
/// demoted to unmatched. Empty inputs short-circuit to all-unmatched. The
/// solve is deterministic: LAPJV scans rows and columns in index order, so
/// ties resolve to the lowest indices.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    // Pad to square; infeasible entries get a large finite cost the solver
    // can route around.
    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PAD_COST);
    for i in 0..num_rows {
        for j in 0..num_cols {
            let c = cost_matrix[[i, j]];
            if c.is_finite() {
                padded[[i, j]] = c as f64;
            }
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate() {
                if row_idx >= num_rows {
                    continue;
                }
                let cost = if col_idx < num_cols {
                    cost_matrix[[row_idx, col_idx]]
                } else {
                    f32::INFINITY
                };
                if cost.is_finite() && cost <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(j, &open)| open.then_some(j))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

fn cosine_distance(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let denom = a.dot(a).sqrt() * b.dot(b).sqrt();
    if denom <= f32::EPSILON {
        return f32::INFINITY;
    }
    (1.0 - a.dot(b) / denom).max(0.0)
}
