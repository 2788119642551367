//! MOT results recording and the text interchange format.
//!
//! One line per (frame, track): `frame,id,x,y,w,h,score,-1,-1,-1`, box
//! values rounded to one decimal and the score to two. Evaluation and
//! visualization tooling parses this format literally, so it is reproduced
//! byte for byte.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use tracing::info;

use crate::error::Error;
use crate::tracker::{Rect, Track};

/// Output-side box filter: tiny boxes and overly wide ("vertical" in the
/// w/h > ratio sense of pedestrian tracking) boxes are withheld from the
/// results file.
#[derive(Debug, Clone, Copy)]
pub struct OutputFilter {
    pub min_box_area: f32,
    pub max_aspect_ratio: f32,
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self {
            min_box_area: 100.0,
            max_aspect_ratio: 1.6,
        }
    }
}

impl OutputFilter {
    pub fn keep(&self, bbox: &Rect) -> bool {
        bbox.area() > self.min_box_area && bbox.aspect_ratio() <= self.max_aspect_ratio
    }
}

#[derive(Debug, Clone)]
struct ResultRow {
    frame_id: u32,
    track_id: u64,
    tlwh: Rect,
    score: f32,
}

/// Accumulates per-frame tracker output for one sequence.
#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    rows: Vec<ResultRow>,
    filter: Option<OutputFilter>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: OutputFilter) -> Self {
        Self {
            rows: Vec::new(),
            filter: Some(filter),
        }
    }

    /// Record one frame's confirmed tracks.
    pub fn record(&mut self, frame_id: u32, tracks: &[Track]) {
        for track in tracks {
            let tlwh = track.tlwh();
            if let Some(filter) = &self.filter {
                if !filter.keep(&tlwh) {
                    continue;
                }
            }
            self.rows.push(ResultRow {
                frame_id,
                track_id: track.track_id(),
                tlwh,
                score: track.score(),
            });
        }
    }

    /// Record a raw row, bypassing the filter. For callers that post-process
    /// boxes themselves.
    pub fn record_raw(&mut self, frame_id: u32, track_id: u64, tlwh: Rect, score: f32) {
        self.rows.push(ResultRow {
            frame_id,
            track_id,
            tlwh,
            score,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Render the score-carrying interchange format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let [x, y, w, h] = row.tlwh.to_tlwh();
            // infallible: writing to a String
            let _ = writeln!(
                out,
                "{},{},{:.1},{:.1},{:.1},{:.1},{:.2},-1,-1,-1",
                row.frame_id, row.track_id, x, y, w, h, row.score
            );
        }
        out
    }

    /// Render the no-score variant (`-1` in the score column).
    pub fn to_text_no_score(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let [x, y, w, h] = row.tlwh.to_tlwh();
            let _ = writeln!(
                out,
                "{},{},{:.1},{:.1},{:.1},{:.1},-1,-1,-1,-1",
                row.frame_id, row.track_id, x, y, w, h
            );
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(self.to_text().as_bytes())?;
        info!(path = %path.display(), rows = self.rows.len(), "saved results");
        Ok(())
    }

    pub fn save_no_score(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(self.to_text_no_score().as_bytes())?;
        info!(path = %path.display(), rows = self.rows.len(), "saved results");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_format_is_literal() {
        let mut log = ResultLog::new();
        log.record_raw(1, 3, Rect::new(100.04, 200.0, 50.55, 120.0), 0.875);
        log.record_raw(2, 3, Rect::new(101.0, 201.0, 50.0, 120.0), 0.9);

        assert_eq!(
            log.to_text(),
            "1,3,100.0,200.0,50.5,120.0,0.88,-1,-1,-1\n2,3,101.0,201.0,50.0,120.0,0.90,-1,-1,-1\n"
        );
        assert_eq!(
            log.to_text_no_score(),
            "1,3,100.0,200.0,50.5,120.0,-1,-1,-1,-1\n2,3,101.0,201.0,50.0,120.0,-1,-1,-1,-1\n"
        );
    }

    #[test]
    fn filter_withholds_small_and_wide_boxes() {
        let filter = OutputFilter::default();
        assert!(filter.keep(&Rect::new(0.0, 0.0, 20.0, 40.0)));
        // 5x10 = 50 < min area
        assert!(!filter.keep(&Rect::new(0.0, 0.0, 5.0, 10.0)));
        // aspect 2.0 > 1.6
        assert!(!filter.keep(&Rect::new(0.0, 0.0, 40.0, 20.0)));
    }

    #[test]
    fn save_writes_the_rendered_text() {
        let mut log = ResultLog::new();
        log.record_raw(1, 1, Rect::new(0.0, 0.0, 10.0, 20.0), 0.5);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.txt");
        log.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, log.to_text());
    }
}
