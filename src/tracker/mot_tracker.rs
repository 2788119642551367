//! The per-frame tracking orchestrator.
//!
//! Each `update` call runs the full association cascade: predict, match
//! high-confidence detections, recover low-confidence ones, resolve
//! tentative tracks, spawn births, age out the lost. Frames must arrive in
//! increasing order within one instance; call [`MotTracker::re_init`] (or
//! build a fresh instance) before an unrelated sequence.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::tracker::config::{CostMetric, TrackerConfig};
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::track::Track;
use crate::tracker::track_state::TrackState;

/// Per-frame association counters, handed to the optional observer.
#[derive(Debug, Clone, Default)]
pub struct FrameSummary {
    pub frame_id: u32,
    pub detections: usize,
    pub rejected_detections: usize,
    pub matched: usize,
    pub revived: usize,
    pub spawned: usize,
    pub lost: usize,
    pub removed: usize,
    pub confirmed_out: usize,
}

type Observer = Box<dyn FnMut(&FrameSummary) + Send>;

pub struct MotTracker {
    /// Tentative and Confirmed tracks.
    active_tracks: Vec<Track>,
    /// Lost tracks inside the grace window.
    lost_tracks: Vec<Track>,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
    observer: Option<Observer>,
}

impl MotTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = config.max_time_lost();
        Self {
            active_tracks: Vec::new(),
            lost_tracks: Vec::new(),
            frame_id: 0,
            next_id: 0,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
            observer: None,
        }
    }

    /// Discard all track state and restart frame/id numbering. Required
    /// between unrelated video sequences.
    pub fn re_init(&mut self) {
        self.active_tracks.clear();
        self.lost_tracks.clear();
        self.frame_id = 0;
        self.next_id = 0;
    }

    /// Install a per-frame statistics callback. Profiling and progress
    /// reporting hang off this rather than living inside the loop.
    pub fn set_observer(&mut self, observer: impl FnMut(&FrameSummary) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Ingest one frame's detections; returns the confirmed tracks.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<Track> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let mut summary = FrameSummary {
            frame_id,
            detections: detections.len(),
            ..Default::default()
        };

        // Reject malformed detections; the frame itself always proceeds.
        let mut dets_high = Vec::new();
        let mut dets_low = Vec::new();
        for det in detections {
            if !det.is_valid() {
                warn!(frame_id, score = det.score as f64, "dropping malformed detection");
                summary.rejected_detections += 1;
            } else if det.score >= self.config.track_thresh {
                dets_high.push(det);
            } else if det.score > self.config.low_score_floor {
                dets_low.push(det);
            }
        }

        let mut activated: Vec<Track> = Vec::new();
        let mut refound: Vec<Track> = Vec::new();
        let mut newly_lost: Vec<Track> = Vec::new();

        // Split the live set: tentative tracks get their own late stage.
        let mut tentative = Vec::new();
        let mut confirmed = Vec::new();
        for track in self.active_tracks.drain(..) {
            if track.is_confirmed() {
                confirmed.push(track);
            } else {
                tentative.push(track);
            }
        }

        // Stage A: confirmed + lost pool against high-score detections.
        // Lost tracks are predicted in place so their motion state keeps
        // extrapolating across the occlusion gap; predicting only the pool
        // clones would freeze them one step past the loss frame.
        Track::multi_predict(&mut confirmed, &self.kalman_filter);
        Track::multi_predict(&mut self.lost_tracks, &self.kalman_filter);
        let pool = joint_tracks(confirmed, &self.lost_tracks);

        let cost = self.stage_a_costs(&pool, &dets_high);
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&cost, self.config.match_thresh);

        for (itrack, idet) in matches {
            let mut track = pool[itrack].clone();
            let det = &dets_high[idet];
            let was_lost = track.state() == TrackState::Lost;
            let result = if was_lost {
                track.re_activate(
                    det,
                    &self.kalman_filter,
                    frame_id,
                    self.config.revival,
                    self.config.feature_alpha,
                    self.config.feature_history,
                )
            } else {
                track.update(
                    det,
                    &self.kalman_filter,
                    frame_id,
                    self.config.feature_alpha,
                    self.config.feature_history,
                )
            };
            match result {
                Ok(()) => {
                    if was_lost {
                        summary.revived += 1;
                        refound.push(track);
                    } else {
                        summary.matched += 1;
                        activated.push(track);
                    }
                }
                Err(err) => {
                    warn!(frame_id, track_id = track.track_id(), %err, "evicting diverged track");
                    summary.removed += 1;
                }
            }
        }

        // Stage B: leftover confirmed and lost tracks against low-score
        // detections, IoU only and a tighter acceptance threshold.
        let remainder: Vec<Track> = unmatched_tracks
            .iter()
            .map(|&i| pool[i].clone())
            .collect();

        let cost_low = matching::iou_distance(
            &track_boxes(&remainder),
            &det_boxes(&dets_low),
            self.config.iou_floor,
        );
        let AssignmentResult {
            matches: matches_low,
            unmatched_tracks: unmatched_low,
            ..
        } = matching::linear_assignment(&cost_low, self.config.second_match_thresh);

        for (itrack, idet) in matches_low {
            let mut track = remainder[itrack].clone();
            let det = &dets_low[idet];
            let was_lost = track.state() == TrackState::Lost;
            let result = if was_lost {
                track.re_activate(
                    det,
                    &self.kalman_filter,
                    frame_id,
                    self.config.revival,
                    self.config.feature_alpha,
                    self.config.feature_history,
                )
            } else {
                track.update(
                    det,
                    &self.kalman_filter,
                    frame_id,
                    self.config.feature_alpha,
                    self.config.feature_history,
                )
            };
            match result {
                Ok(()) => {
                    if was_lost {
                        summary.revived += 1;
                        refound.push(track);
                    } else {
                        summary.matched += 1;
                        activated.push(track);
                    }
                }
                Err(err) => {
                    warn!(frame_id, track_id = track.track_id(), %err, "evicting diverged track");
                    summary.removed += 1;
                }
            }
        }
        for idx in unmatched_low {
            let mut track = remainder[idx].clone();
            if track.state() != TrackState::Lost {
                track.mark_lost();
                summary.lost += 1;
                newly_lost.push(track);
            }
        }

        // Tentative tracks get one chance against the leftover high-score
        // detections; a miss removes them outright so unconfirmed ghosts
        // never linger in the lost set.
        let leftover: Vec<Detection> = unmatched_detections
            .into_iter()
            .map(|idx| dets_high[idx].clone())
            .collect();

        let mut cost_tent = matching::iou_distance(
            &track_boxes(&tentative),
            &det_boxes(&leftover),
            self.config.iou_floor,
        );
        matching::fuse_score(&mut cost_tent, &leftover);
        let AssignmentResult {
            matches: matches_tent,
            unmatched_tracks: unmatched_tent,
            unmatched_detections: unmatched_new,
        } = matching::linear_assignment(&cost_tent, self.config.unconfirmed_match_thresh);

        for (itrack, idet) in matches_tent {
            match tentative[itrack].update(
                &leftover[idet],
                &self.kalman_filter,
                frame_id,
                self.config.feature_alpha,
                self.config.feature_history,
            ) {
                Ok(()) => {
                    summary.matched += 1;
                    activated.push(tentative[itrack].clone());
                }
                Err(err) => {
                    warn!(
                        frame_id,
                        track_id = tentative[itrack].track_id(),
                        %err,
                        "evicting diverged track"
                    );
                    summary.removed += 1;
                }
            }
        }
        for idx in unmatched_tent {
            tentative[idx].mark_removed();
            summary.removed += 1;
        }

        // Births from unmatched high-score detections above the birth bar.
        for idx in unmatched_new {
            let det = &leftover[idx];
            if det.score < self.config.birth_thresh() {
                continue;
            }
            let id = self.alloc_id();
            let mut track = Track::new(det);
            track.activate(
                &self.kalman_filter,
                frame_id,
                id,
                self.config.feature_alpha,
                self.config.feature_history,
            );
            summary.spawned += 1;
            activated.push(track);
        }

        // Age the lost set; revived identities are dropped from it, the
        // rest are evicted once past the grace window.
        let revived_ids: HashSet<u64> = refound.iter().map(|t| t.track_id()).collect();
        for track in std::mem::take(&mut self.lost_tracks) {
            if revived_ids.contains(&track.track_id()) {
                continue;
            }
            if frame_id - track.end_frame() > self.max_time_lost {
                summary.removed += 1;
            } else {
                newly_lost.push(track);
            }
        }

        self.active_tracks = activated
            .into_iter()
            .chain(refound)
            .filter(|t| t.state() != TrackState::Removed)
            .collect();
        self.lost_tracks = sub_tracks(newly_lost, &self.active_tracks);

        let (active, lost) = remove_duplicate_tracks(&self.active_tracks, &self.lost_tracks);
        self.active_tracks = active;
        self.lost_tracks = lost;

        let output: Vec<Track> = self
            .active_tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .cloned()
            .collect();

        summary.confirmed_out = output.len();
        debug!(
            frame_id,
            matched = summary.matched,
            revived = summary.revived,
            spawned = summary.spawned,
            lost = summary.lost,
            removed = summary.removed,
            out = summary.confirmed_out,
            "frame associated"
        );
        if let Some(observer) = &mut self.observer {
            observer(&summary);
        }

        output
    }

    fn stage_a_costs(&self, pool: &[Track], dets: &[Detection]) -> ndarray::Array2<f32> {
        let mut cost = matching::iou_distance(
            &track_boxes(pool),
            &det_boxes(dets),
            self.config.iou_floor,
        );
        match self.config.cost_metric {
            CostMetric::Iou => {}
            CostMetric::IouFusedScore => matching::fuse_score(&mut cost, dets),
            CostMetric::IouAppearance { weight } => {
                let emb = matching::embedding_distance(pool, dets);
                cost = matching::fuse_appearance(&cost, &emb, weight);
            }
        }
        if self.config.mahalanobis_gate {
            matching::gate_cost_matrix(&self.kalman_filter, &mut cost, pool, dets);
        }
        cost
    }
}

fn track_boxes(tracks: &[Track]) -> Vec<Rect> {
    tracks.iter().map(|t| t.tlwh()).collect()
}

fn det_boxes(dets: &[Detection]) -> Vec<Rect> {
    dets.iter().map(|d| d.bbox).collect()
}

/// Union of two track lists, first occurrence of each id wins.
fn joint_tracks(list_a: Vec<Track>, list_b: &[Track]) -> Vec<Track> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(list_a.len() + list_b.len());
    for track in list_a {
        seen.insert(track.track_id());
        result.push(track);
    }
    for track in list_b {
        if seen.insert(track.track_id()) {
            result.push(track.clone());
        }
    }
    result
}

/// Tracks of `list_a` whose ids do not occur in `list_b`.
fn sub_tracks(list_a: Vec<Track>, list_b: &[Track]) -> Vec<Track> {
    let b_ids: HashSet<u64> = list_b.iter().map(|t| t.track_id()).collect();
    list_a
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id()))
        .collect()
}

/// Suppress active/lost pairs describing the same object (IoU above 0.85);
/// the longer-lived track keeps the identity.
fn remove_duplicate_tracks(active: &[Track], lost: &[Track]) -> (Vec<Track>, Vec<Track>) {
    if active.is_empty() || lost.is_empty() {
        return (active.to_vec(), lost.to_vec());
    }

    let ious = iou_batch(&track_boxes(active), &track_boxes(lost));
    let mut dup_active = vec![false; active.len()];
    let mut dup_lost = vec![false; lost.len()];

    let (rows, cols) = ious.dim();
    for i in 0..rows {
        for j in 0..cols {
            if ious[[i, j]] > 0.85 {
                let age_active = active[i].end_frame() - active[i].start_frame();
                let age_lost = lost[j].end_frame() - lost[j].start_frame();
                if age_active > age_lost {
                    dup_lost[j] = true;
                } else {
                    dup_active[i] = true;
                }
            }
        }
    }

    let keep = |tracks: &[Track], dup: &[bool]| {
        tracks
            .iter()
            .zip(dup)
            .filter(|&(_, &d)| !d)
            .map(|(t, _)| t.clone())
            .collect::<Vec<_>>()
    };
    (keep(active, &dup_active), keep(lost, &dup_lost))
}
