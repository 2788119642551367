use std::collections::HashSet;

use ndarray::array;

use mottrack::{
    CostMetric, Detection, MotTracker, Rect, ResultLog, TrackerConfig,
};

fn walking_box(x: f32, y: f32, score: f32) -> Detection {
    Detection::from_rect(Rect::new(x, y, 60.0, 120.0), score)
}

/// A config with a short grace window so eviction tests stay small.
fn short_buffer_config() -> TrackerConfig {
    TrackerConfig {
        track_buffer: 5,
        ..Default::default()
    }
}

#[test]
fn single_object_keeps_one_id_over_linear_motion() {
    let mut tracker = MotTracker::new(TrackerConfig::default());

    let mut ids = HashSet::new();
    let mut last_x = f32::NEG_INFINITY;
    for frame in 0..10u32 {
        let x = 100.0 + 5.0 * frame as f32;
        let tracks = tracker.update(vec![walking_box(x, 200.0, 0.9)]);

        assert_eq!(tracks.len(), 1, "frame {frame}: exactly one confirmed track");
        ids.insert(tracks[0].track_id());
        let est_x = tracks[0].tlwh().x;
        assert!(
            est_x > last_x,
            "frame {frame}: position estimate should advance ({est_x} <= {last_x})"
        );
        last_x = est_x;
    }
    assert_eq!(ids.len(), 1, "one identity across all 10 frames");
}

#[test]
fn low_score_detection_is_recovered_by_second_stage() {
    let mut tracker = MotTracker::new(TrackerConfig::default());

    let t1 = tracker.update(vec![walking_box(100.0, 100.0, 0.9)]);
    assert_eq!(t1.len(), 1);
    let id = t1[0].track_id();

    let t2 = tracker.update(vec![walking_box(105.0, 105.0, 0.9)]);
    assert_eq!(t2[0].track_id(), id);

    // partially occluded: the detector's confidence collapses but the box
    // still overlaps; the IoU-only second stage keeps the identity
    let t3 = tracker.update(vec![walking_box(110.0, 110.0, 0.2)]);
    assert_eq!(t3.len(), 1);
    assert_eq!(t3[0].track_id(), id);
}

#[test]
fn revival_within_grace_window_keeps_the_id() {
    let mut tracker = MotTracker::new(short_buffer_config());
    let max_age = tracker.config().max_time_lost(); // 5

    // 15 px/frame is a quarter box width per frame: if the lost track's
    // motion state stopped extrapolating during the gap, the frozen box
    // would have zero overlap with the reappearance below
    let mut id = 0;
    for frame in 0..5u32 {
        let x = 100.0 + 15.0 * frame as f32;
        let tracks = tracker.update(vec![walking_box(x, 200.0, 0.9)]);
        id = tracks[0].track_id();
    }

    // unseen for max_age frames
    for _ in 0..max_age {
        let tracks = tracker.update(vec![]);
        assert!(tracks.is_empty());
    }

    // reappears at the extrapolated location on miss frame max_age + 1:
    // still inside the grace window, same identity
    let x = 100.0 + 15.0 * (5 + max_age) as f32;
    let tracks = tracker.update(vec![walking_box(x, 200.0, 0.9)]);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].track_id(), id);
    assert!(
        tracks[0].tlwh().x > 200.0,
        "revival re-anchors the box near the reappearance"
    );
}

#[test]
fn reappearance_past_grace_window_gets_a_new_id() {
    let mut tracker = MotTracker::new(short_buffer_config());
    let max_age = tracker.config().max_time_lost();

    let mut id = 0;
    for frame in 0..5u32 {
        let x = 100.0 + 5.0 * frame as f32;
        id = tracker.update(vec![walking_box(x, 200.0, 0.9)])[0].track_id();
    }

    // one empty frame past the window evicts the track
    for _ in 0..max_age + 1 {
        tracker.update(vec![]);
    }

    let x = 100.0 + 5.0 * (6 + max_age) as f32;
    // new identity needs its confirmation frame
    tracker.update(vec![walking_box(x, 200.0, 0.9)]);
    let tracks = tracker.update(vec![walking_box(x + 5.0, 200.0, 0.9)]);
    assert_eq!(tracks.len(), 1);
    assert_ne!(tracks[0].track_id(), id);
}

#[test]
fn track_ids_are_never_reused() {
    let mut tracker = MotTracker::new(short_buffer_config());

    let mut seen_ids: Vec<u64> = Vec::new();
    // three generations of short-lived objects at distinct locations
    for generation in 0..3 {
        let x = 100.0 + 400.0 * generation as f32;
        for frame in 0..3u32 {
            let tracks = tracker.update(vec![walking_box(x + 2.0 * frame as f32, 100.0, 0.9)]);
            for t in &tracks {
                if !seen_ids.contains(&t.track_id()) {
                    seen_ids.push(t.track_id());
                }
            }
        }
        // let the object die off completely
        for _ in 0..tracker.config().max_time_lost() + 2 {
            tracker.update(vec![]);
        }
    }

    assert_eq!(seen_ids.len(), 3);
    let unique: HashSet<u64> = seen_ids.iter().copied().collect();
    assert_eq!(unique.len(), seen_ids.len());
    // monotonically increasing allocation
    assert!(seen_ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn crossing_objects_keep_their_identities() {
    let mut tracker = MotTracker::new(TrackerConfig::default());

    // A walks right from x=0, B walks left from x=300; they cross mid-way
    let det_a = |f: u32| walking_box(20.0 * f as f32, 0.0, 0.9);
    let det_b = |f: u32| walking_box(300.0 - 20.0 * f as f32, 0.0, 0.9);

    let first = tracker.update(vec![det_a(0), det_b(0)]);
    assert_eq!(first.len(), 2);
    let (id_a, id_b) = {
        let mut sorted = first.clone();
        sorted.sort_by(|p, q| p.tlwh().x.total_cmp(&q.tlwh().x));
        (sorted[0].track_id(), sorted[1].track_id())
    };

    for f in 1..16u32 {
        // input order also swaps after the crossing to make sure
        // association follows geometry, not list position
        let dets = if f % 2 == 0 {
            vec![det_a(f), det_b(f)]
        } else {
            vec![det_b(f), det_a(f)]
        };
        let tracks = tracker.update(dets);
        assert_eq!(tracks.len(), 2, "frame {f}");
    }

    // after the crossing A is on the right, B on the left
    let last = tracker.update(vec![det_b(16), det_a(16)]);
    let mut sorted = last.clone();
    sorted.sort_by(|p, q| p.tlwh().x.total_cmp(&q.tlwh().x));
    assert_eq!(sorted[0].track_id(), id_b, "B ended up leftmost");
    assert_eq!(sorted[1].track_id(), id_a, "A ended up rightmost");
}

#[test]
fn appearance_metric_disambiguates_equal_overlap() {
    let config = TrackerConfig {
        cost_metric: CostMetric::IouAppearance { weight: 0.9 },
        ..Default::default()
    };
    let mut tracker = MotTracker::new(config);

    let own_feat = array![1.0f32, 0.0, 0.0, 0.0];
    let other_feat = array![0.0f32, 1.0, 0.0, 0.0];

    let mut id = 0;
    for frame in 0..3u32 {
        let det = walking_box(100.0, 100.0 + 2.0 * frame as f32, 0.9)
            .with_feature(own_feat.clone());
        id = tracker.update(vec![det])[0].track_id();
    }

    // two candidates straddle the prediction with equal overlap; only the
    // embedding tells them apart
    let imposter = walking_box(88.0, 106.0, 0.9).with_feature(other_feat);
    let genuine = walking_box(112.0, 106.0, 0.9).with_feature(own_feat);
    let tracks = tracker.update(vec![imposter, genuine]);

    let kept: Vec<_> = tracks.iter().filter(|t| t.track_id() == id).collect();
    assert_eq!(kept.len(), 1);
    assert!(
        kept[0].tlwh().x > 100.0,
        "identity should follow the matching embedding to the right candidate"
    );
}

#[test]
fn results_log_renders_the_interchange_format() {
    let mut tracker = MotTracker::new(TrackerConfig::default());
    let mut log = ResultLog::new();

    for frame in 1..=3u32 {
        let x = 100.0 + 5.0 * (frame - 1) as f32;
        let tracks = tracker.update(vec![walking_box(x, 200.0, 0.9)]);
        log.record(frame, &tracks);
    }

    let text = log.to_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let cols: Vec<&str> = line.split(',').collect();
        assert_eq!(cols.len(), 10);
        assert_eq!(cols[0], (i + 1).to_string());
        assert_eq!(cols[1], "1");
        assert_eq!(&cols[7..], &["-1", "-1", "-1"]);
        // one decimal for the box, two for the score
        assert_eq!(cols[2].split('.').nth(1).unwrap().len(), 1);
        assert_eq!(cols[6].split('.').nth(1).unwrap().len(), 2);
    }
}

#[test]
fn continuously_matched_track_is_never_evicted() {
    let mut tracker = MotTracker::new(short_buffer_config());

    let mut id = None;
    for frame in 0..100u32 {
        let x = 50.0 + (frame as f32) * 3.0;
        let tracks = tracker.update(vec![walking_box(x, 80.0, 0.8)]);
        assert_eq!(tracks.len(), 1, "frame {frame}");
        match id {
            None => id = Some(tracks[0].track_id()),
            Some(expected) => assert_eq!(tracks[0].track_id(), expected),
        }
    }
}
