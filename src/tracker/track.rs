//! A single tracked object: lifecycle state machine around a Kalman motion
//! state, plus score and appearance history.

use std::collections::VecDeque;

use ndarray::{Array1, Array2};

use crate::error::Error;
use crate::tracker::config::RevivalPolicy;
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// One hypothesized persistent object.
///
/// All fields are private: the orchestrator exclusively owns and mutates
/// tracks, while collaborators (cost computation, output reporting) go
/// through the read-only accessors.
#[derive(Debug, Clone)]
pub struct Track {
    track_id: u64,
    state: TrackState,
    score: f32,
    class_id: i64,
    frame_id: u32,
    start_frame: u32,
    tracklet_len: u32,
    mean: Option<Array1<f64>>,
    covariance: Option<Array2<f64>>,
    tlwh: Rect,
    features: VecDeque<Array1<f32>>,
    smooth_feat: Option<Array1<f32>>,
    /// Embedding of the spawning detection, folded in at activation.
    birth_feature: Option<Array1<f32>>,
    /// Frame and XYAH box of the most recent *measured* observation, kept
    /// for observation-centric velocity re-estimation after occlusion.
    last_observation: Option<(u32, [f64; 4])>,
}

impl Track {
    pub(crate) fn new(detection: &Detection) -> Self {
        Self {
            track_id: 0,
            state: TrackState::Tentative,
            score: detection.score,
            class_id: detection.class_id,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            tlwh: detection.bbox,
            features: VecDeque::new(),
            smooth_feat: None,
            birth_feature: detection.feature.clone(),
            last_observation: None,
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn class_id(&self) -> i64 {
        self.class_id
    }

    pub fn start_frame(&self) -> u32 {
        self.start_frame
    }

    /// Frame of the last successful match.
    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    /// Consecutive matched frames since the last (re)activation.
    pub fn tracklet_len(&self) -> u32 {
        self.tracklet_len
    }

    /// Current box estimate: the Kalman mean once initiated, the raw
    /// detection box before that.
    pub fn tlwh(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    /// Exponentially smoothed appearance embedding, if any was observed.
    pub fn smooth_feat(&self) -> Option<&Array1<f32>> {
        self.smooth_feat.as_ref()
    }

    pub(crate) fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub(crate) fn covariance(&self) -> Option<&Array2<f64>> {
        self.covariance.as_ref()
    }

    /// Birth: initiate the motion state and take on the given identity.
    /// Tracks born on the very first frame of a sequence are confirmed
    /// outright; later births stay tentative until re-matched.
    pub(crate) fn activate(
        &mut self,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        track_id: u64,
        feature_alpha: f32,
        feature_history: usize,
    ) {
        self.track_id = track_id;

        let xyah = xyah_f64(&self.tlwh);
        let (mean, covariance) = kalman_filter.initiate(xyah);
        self.mean = Some(mean);
        self.covariance = Some(covariance);

        self.state = if frame_id == 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        self.tracklet_len = 0;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
        self.last_observation = Some((frame_id, xyah));
        if let Some(feat) = self.birth_feature.take() {
            self.push_feature_vec(feat, feature_alpha, feature_history);
        }
    }

    /// Revive a lost track from a fresh detection, keeping its identity.
    pub(crate) fn re_activate(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        policy: RevivalPolicy,
        feature_alpha: f32,
        feature_history: usize,
    ) -> Result<(), Error> {
        let xyah = xyah_f64(&detection.bbox);

        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean = mean.clone();
            match policy {
                RevivalPolicy::Blend => {}
                RevivalPolicy::ResetVelocity => {
                    for v in 4..8 {
                        mean[v] = 0.0;
                    }
                }
                RevivalPolicy::ObservationCentric => {
                    if let Some((obs_frame, obs_xyah)) = self.last_observation {
                        let gap = frame_id.saturating_sub(obs_frame);
                        if gap > 0 {
                            for i in 0..4 {
                                mean[4 + i] = (xyah[i] - obs_xyah[i]) / gap as f64;
                            }
                        }
                    }
                }
            }
            let (new_mean, new_cov) = kalman_filter.update(&mean, cov, xyah)?;
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }

        self.state = TrackState::Confirmed;
        self.tracklet_len = 0;
        self.frame_id = frame_id;
        self.score = detection.score;
        self.tlwh = detection.bbox;
        self.last_observation = Some((frame_id, xyah));
        self.push_feature(detection, feature_alpha, feature_history);
        Ok(())
    }

    /// Matched-frame update: Kalman correction with the detection box,
    /// confirmation of tentative tracks, appearance history append.
    pub(crate) fn update(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
        feature_alpha: f32,
        feature_history: usize,
    ) -> Result<(), Error> {
        let xyah = xyah_f64(&detection.bbox);

        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let (new_mean, new_cov) = kalman_filter.update(mean, cov, xyah)?;
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }

        self.state = TrackState::Confirmed;
        self.frame_id = frame_id;
        self.tracklet_len += 1;
        self.score = detection.score;
        self.tlwh = detection.bbox;
        self.last_observation = Some((frame_id, xyah));
        self.push_feature(detection, feature_alpha, feature_history);
        Ok(())
    }

    /// Time step. Lost tracks have their height velocity damped to zero so
    /// the box does not balloon while unobserved.
    pub(crate) fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Confirmed {
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub(crate) fn multi_predict(tracks: &mut [Track], kalman_filter: &KalmanFilter) {
        for track in tracks.iter_mut() {
            track.predict(kalman_filter);
        }
    }

    pub(crate) fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    fn push_feature(&mut self, detection: &Detection, alpha: f32, capacity: usize) {
        if let Some(feat) = &detection.feature {
            self.push_feature_vec(feat.clone(), alpha, capacity);
        }
    }

    pub(crate) fn push_feature_vec(&mut self, feat: Array1<f32>, alpha: f32, capacity: usize) {
        let feat = normalize(feat);
        self.smooth_feat = Some(match self.smooth_feat.take() {
            Some(prev) => normalize(&prev * alpha + &feat * (1.0 - alpha)),
            None => feat.clone(),
        });
        self.features.push_back(feat);
        while self.features.len() > capacity {
            self.features.pop_front();
        }
    }
}

fn xyah_f64(rect: &Rect) -> [f64; 4] {
    let xyah = rect.to_xyah();
    [
        xyah[0] as f64,
        xyah[1] as f64,
        xyah[2] as f64,
        xyah[3] as f64,
    ]
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > f32::EPSILON { v / norm } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn det(x: f32, y: f32, score: f32) -> Detection {
        Detection::from_rect(Rect::new(x, y, 20.0, 40.0), score)
    }

    #[test]
    fn activation_on_first_frame_confirms_immediately() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&det(10.0, 10.0, 0.9));
        track.activate(&kf, 1, 7, 0.9, 30);
        assert_eq!(track.track_id(), 7);
        assert_eq!(track.state(), TrackState::Confirmed);

        let mut later = Track::new(&det(10.0, 10.0, 0.9));
        later.activate(&kf, 5, 8, 0.9, 30);
        assert_eq!(later.state(), TrackState::Tentative);
    }

    #[test]
    fn update_confirms_and_advances_counters() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&det(10.0, 10.0, 0.9));
        track.activate(&kf, 2, 1, 0.9, 30);
        track.predict(&kf);
        track.update(&det(11.0, 11.0, 0.85), &kf, 3, 0.9, 30).unwrap();

        assert_eq!(track.state(), TrackState::Confirmed);
        assert_eq!(track.end_frame(), 3);
        assert_eq!(track.tracklet_len(), 1);
        assert_eq!(track.score(), 0.85);
    }

    #[test]
    fn observation_centric_revival_recovers_more_velocity_than_blend() {
        let kf = KalmanFilter::new();

        // object moves +5px/frame in x but goes unobserved for 4 frames
        let revive = |policy: RevivalPolicy| {
            let mut track = Track::new(&det(0.0, 0.0, 0.9));
            track.activate(&kf, 1, 1, 0.9, 30);
            for _ in 0..4 {
                track.predict(&kf);
            }
            track.mark_lost();
            track
                .re_activate(&det(20.0, 0.0, 0.9), &kf, 5, policy, 0.9, 30)
                .unwrap();
            track
        };

        let oc = revive(RevivalPolicy::ObservationCentric);
        let blend = revive(RevivalPolicy::Blend);

        assert_eq!(oc.state(), TrackState::Confirmed);
        assert_eq!(oc.track_id(), blend.track_id());

        let oc_mean = oc.mean().unwrap();
        let blend_mean = blend.mean().unwrap();
        // both re-anchor the center near the reappearance at cx = 30
        assert!((oc_mean[0] - 30.0).abs() < 2.0);
        // gap velocity (20px / 4 frames) only enters under ObservationCentric
        assert!(oc_mean[4] > blend_mean[4] + 1.0);
        assert!(oc_mean[4] > 4.0);
    }

    #[test]
    fn reset_velocity_revival_drops_the_learned_motion() {
        let kf = KalmanFilter::new();

        // build up velocity with three +10px/frame matches, lose the track,
        // then revive it exactly where the prediction put it so the update
        // innovation is near zero and the prior velocity shows through
        let revive = |policy: RevivalPolicy| {
            let mut track = Track::new(&det(0.0, 0.0, 0.9));
            track.activate(&kf, 1, 1, 0.9, 30);
            for f in 2..=4u32 {
                track.predict(&kf);
                track
                    .update(&det(10.0 * (f - 1) as f32, 0.0, 0.9), &kf, f, 0.9, 30)
                    .unwrap();
            }
            track.predict(&kf);
            track.mark_lost();
            let here = track.tlwh();
            track
                .re_activate(&Detection::from_rect(here, 0.9), &kf, 5, policy, 0.9, 30)
                .unwrap();
            track
        };

        let blend = revive(RevivalPolicy::Blend);
        let reset = revive(RevivalPolicy::ResetVelocity);

        let blend_vel = blend.mean().unwrap()[4];
        let reset_vel = reset.mean().unwrap()[4];
        assert!(blend_vel > 4.0, "blend keeps the learned velocity ({blend_vel})");
        assert!(
            reset_vel.abs() < 1.0,
            "reset re-anchors with zeroed velocity ({reset_vel})"
        );
    }

    #[test]
    fn feature_history_is_bounded_and_smoothed() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&det(0.0, 0.0, 0.9));
        track.activate(&kf, 1, 1, 0.9, 2);

        for i in 0..5 {
            let feat = array![1.0 + i as f32, 0.0, 0.0];
            track.push_feature_vec(feat, 0.9, 2);
        }
        assert_eq!(track.features.len(), 2);
        let smooth = track.smooth_feat().unwrap();
        assert!((smooth.dot(smooth).sqrt() - 1.0).abs() < 1e-5);
    }
}
