use crate::detection::Detection;
use crate::utils::assignment::gated_assignment;
use crate::utils::bbox::BoundingBox;
use crate::utils::kalman::KalmanFilter;
use log::debug;
use serde::Serialize;

use self::track::{Track, TrackState};

/// The track structure and its lifecycle
///
pub mod track;

/// IoU gate of the low-confidence rescue pass
pub const LOW_PASS_GATE: f32 = 0.5;

/// IoU gate of the lost-track revival pass
pub const REVIVE_GATE: f32 = 0.7;

/// Tracker tunables.
///
#[derive(Clone, Copy, Debug)]
pub struct ByteTrackerOptions {
    /// Minimal confidence for a detection to participate in the first pass and to spawn tracks
    pub track_thresh: f32,
    /// How many frames a lost track survives without a match
    pub track_buffer: u64,
    /// IoU cost gate of the first association pass
    pub match_thresh: f32,
    /// Detections with a smaller bbox area are discarded
    pub min_box_area: f32,
}

impl Default for ByteTrackerOptions {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            track_buffer: 30,
            match_thresh: 0.8,
            min_box_area: 100.0,
        }
    }
}

/// Tracker counters for observability.
///
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct TrackerStats {
    pub frame_id: u64,
    pub tracked_count: usize,
    pub lost_count: usize,
    pub removed_count: u64,
    pub total_created: u64,
}

/// ByteTrack-style multi-object tracker.
///
/// Associates detections across frames in three passes with progressively relaxed gates:
/// tracked tracks against high-confidence detections, the remainder against low-confidence
/// detections, and lost tracks against still-unclaimed high-confidence detections. Track ids
/// are process-unique, assigned monotonically from 1, and never reused within a session.
///
#[derive(Debug)]
pub struct ByteTracker {
    opts: ByteTrackerOptions,
    filter: KalmanFilter,
    tracked: Vec<Track>,
    lost: Vec<Track>,
    frame_id: u64,
    next_id: u64,
    removed_count: u64,
}

impl ByteTracker {
    pub fn new(opts: ByteTrackerOptions) -> Self {
        Self {
            opts,
            filter: KalmanFilter::default(),
            tracked: Vec::default(),
            lost: Vec::default(),
            frame_id: 0,
            next_id: 0,
            removed_count: 0,
        }
    }

    /// Clears all tracks and resets the frame and id counters.
    ///
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.lost.clear();
        self.frame_id = 0;
        self.next_id = 0;
        self.removed_count = 0;
    }

    fn gen_track_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Runs one tracking step over the detections of the current frame and returns snapshots
    /// of all activated tracks, ascending by track id.
    ///
    /// # Parameters
    /// * `detections` - person detections of the frame, any order
    ///
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        self.frame_id += 1;

        // Candidate tracks from detections that survive the area filter, split by confidence.
        let mut high: Vec<Track> = Vec::default();
        let mut low: Vec<Track> = Vec::default();
        for det in detections {
            if det.bbox.area() < self.opts.min_box_area {
                continue;
            }
            let candidate = Track::from_detection(&self.filter, det);
            if det.score >= self.opts.track_thresh {
                high.push(candidate);
            } else {
                low.push(candidate);
            }
        }

        for t in self.tracked.iter_mut().chain(self.lost.iter_mut()) {
            t.predict(&self.filter);
        }

        // === First association: tracked tracks vs high-confidence detections ===
        let first = gated_assignment(
            self.tracked.len(),
            high.len(),
            |i, j| 1.0 - BoundingBox::iou(self.tracked[i].bbox(), high[j].bbox()),
            self.opts.match_thresh,
        );

        for (ti, di) in &first.matches {
            let measurement = *high[*di].bbox();
            let track = &mut self.tracked[*ti];
            track.apply_measurement(&self.filter, &measurement);
            track.update_with(&high[*di], self.frame_id);
        }

        // === Second association: leftover tracked tracks vs low-confidence detections ===
        let rem_tracked = first.unmatched_rows;
        let second = gated_assignment(
            rem_tracked.len(),
            low.len(),
            |i, j| 1.0 - BoundingBox::iou(self.tracked[rem_tracked[i]].bbox(), low[j].bbox()),
            LOW_PASS_GATE,
        );

        // The low-confidence pass refreshes the observation only; the Kalman state is left
        // to the next prediction.
        for (ri, di) in &second.matches {
            self.tracked[rem_tracked[*ri]].update_with(&low[*di], self.frame_id);
        }

        for ri in &second.unmatched_rows {
            self.tracked[rem_tracked[*ri]].mark_lost();
        }

        let newly_lost = self
            .tracked
            .iter()
            .filter(|t| t.state() == TrackState::Lost)
            .count();
        if newly_lost > 0 {
            debug!(
                "frame={}: {} track(s) lost this step",
                self.frame_id, newly_lost
            );
        }

        let (still_tracked, lost_now): (Vec<Track>, Vec<Track>) = self
            .tracked
            .drain(..)
            .partition(|t| t.state() == TrackState::Tracked);
        self.tracked = still_tracked;
        self.lost.extend(lost_now);

        // === Third association: lost tracks vs still-unclaimed high-confidence detections ===
        let rem_high = first.unmatched_cols;
        let third = gated_assignment(
            self.lost.len(),
            rem_high.len(),
            |i, j| 1.0 - BoundingBox::iou(self.lost[i].bbox(), high[rem_high[j]].bbox()),
            REVIVE_GATE,
        );

        for (li, di) in &third.matches {
            let candidate = &high[rem_high[*di]];
            self.lost[*li].re_activate(candidate, self.frame_id);
            debug!(
                "frame={}: track={} re-activated",
                self.frame_id,
                self.lost[*li].track_id()
            );
        }

        // Revived tracks rejoin the tracked list; lost tracks beyond the buffer expire.
        let frame_id = self.frame_id;
        let track_buffer = self.opts.track_buffer;
        let mut kept_lost = Vec::with_capacity(self.lost.len());
        for mut t in self.lost.drain(..) {
            match t.state() {
                TrackState::Tracked => self.tracked.push(t),
                TrackState::Lost if frame_id - t.frame_id() > track_buffer => {
                    t.mark_removed();
                    self.removed_count += 1;
                    debug!("frame={}: track={} removed", frame_id, t.track_id());
                }
                _ => kept_lost.push(t),
            }
        }
        self.lost = kept_lost;

        // === Spawn new tracks from unclaimed high-confidence detections ===
        let spawn: Vec<usize> = third.unmatched_cols.iter().map(|i| rem_high[*i]).collect();
        for di in spawn {
            let mut candidate = high[di].clone();
            if candidate.score() >= self.opts.track_thresh {
                let track_id = self.gen_track_id();
                candidate.activate(track_id, self.frame_id);
                debug!("frame={}: track={} created", self.frame_id, track_id);
                self.tracked.push(candidate);
            }
        }

        let mut active: Vec<Track> = self
            .tracked
            .iter()
            .filter(|t| t.is_activated())
            .cloned()
            .collect();
        active.sort_by_key(|t| t.track_id());
        active
    }

    /// Assigns a student identity to a live track. The identity is write-once.
    ///
    pub fn assign_student_id(&mut self, track_id: u64, student_id: &str) {
        if let Some(track) = self
            .tracked
            .iter_mut()
            .chain(self.lost.iter_mut())
            .find(|t| t.track_id() == track_id)
        {
            track.set_student_id(student_id);
        }
    }

    pub fn get(&self, track_id: u64) -> Option<&Track> {
        self.tracked
            .iter()
            .chain(self.lost.iter())
            .find(|t| t.track_id() == track_id)
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            frame_id: self.frame_id,
            tracked_count: self.tracked.len(),
            lost_count: self.lost.len(),
            removed_count: self.removed_count,
            total_created: self.next_id,
        }
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{Detection, ObjectClass};
    use crate::trackers::byte::track::TrackState;
    use crate::trackers::byte::{ByteTracker, ByteTrackerOptions};
    use crate::utils::bbox::BoundingBox;

    fn person(left: f32, top: f32, right: f32, bottom: f32, score: f32) -> Detection {
        Detection::new(
            BoundingBox::new(left, top, right, bottom),
            score,
            ObjectClass::Person,
        )
    }

    #[test]
    fn single_stationary_person() {
        let mut t = ByteTracker::default();

        for frame in 1..=30 {
            let active = t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].track_id(), 1);
            assert_eq!(active[0].state(), TrackState::Tracked);
            assert_eq!(active[0].frame_id(), frame);
        }

        let stats = t.stats();
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.tracked_count, 1);
        assert_eq!(stats.lost_count, 0);
    }

    #[test]
    fn area_filter_drops_tiny_boxes() {
        let mut t = ByteTracker::default();
        let active = t.update(&[person(0.0, 0.0, 5.0, 5.0, 0.99)]);
        assert!(active.is_empty());
        assert_eq!(t.stats().total_created, 0);
    }

    #[test]
    fn low_confidence_does_not_spawn() {
        let mut t = ByteTracker::default();
        let active = t.update(&[person(0.0, 0.0, 50.0, 100.0, 0.3)]);
        assert!(active.is_empty());
    }

    #[test]
    fn low_confidence_rescues_existing_track() {
        let mut t = ByteTracker::default();
        t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);

        // The detector wavers but the box stays put: the rescue pass keeps the track alive.
        let active = t.update(&[person(101.0, 101.0, 201.0, 301.0, 0.3)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].track_id(), 1);
        assert_eq!(active[0].state(), TrackState::Tracked);
        assert_eq!(t.stats().total_created, 1);
    }

    #[test]
    fn occlusion_recovery_keeps_identity() {
        let mut t = ByteTracker::default();

        for _ in 1..=10 {
            t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        }
        for frame in 11..=15 {
            let active = t.update(&[]);
            assert!(active.is_empty());
            let stats = t.stats();
            assert_eq!(stats.lost_count, 1, "frame {frame}");
        }

        let active = t.update(&[person(105.0, 102.0, 205.0, 302.0, 0.9)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].track_id(), 1);
        assert_eq!(t.stats().total_created, 1);
    }

    #[test]
    fn expiry_allocates_fresh_id() {
        let mut t = ByteTracker::default();

        for _ in 1..=10 {
            t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        }
        // 35 occluded frames exceed the 30-frame buffer.
        for _ in 11..=45 {
            t.update(&[]);
        }
        let stats = t.stats();
        assert_eq!(stats.lost_count, 0);
        assert_eq!(stats.removed_count, 1);

        let active = t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].track_id(), 2);
        assert_eq!(t.stats().total_created, 2);
    }

    #[test]
    fn two_people_keep_distinct_ids() {
        let mut t = ByteTracker::default();

        for i in 0..20 {
            let dx = i as f32;
            let active = t.update(&[
                person(100.0 + dx, 100.0, 200.0 + dx, 300.0, 0.9),
                person(500.0 - dx, 100.0, 600.0 - dx, 300.0, 0.85),
            ]);
            assert_eq!(active.len(), 2);
            assert_ne!(active[0].track_id(), active[1].track_id());
        }
        assert_eq!(t.stats().total_created, 2);
    }

    #[test]
    fn conservation_of_tracks() {
        let mut t = ByteTracker::default();

        t.update(&[
            person(100.0, 100.0, 200.0, 300.0, 0.9),
            person(500.0, 100.0, 600.0, 300.0, 0.85),
        ]);
        for _ in 0..40 {
            t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        }

        let stats = t.stats();
        assert_eq!(
            stats.tracked_count as u64 + stats.lost_count as u64 + stats.removed_count,
            stats.total_created
        );
    }

    #[test]
    fn reset_restarts_ids() {
        let mut t = ByteTracker::default();
        t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        t.reset();
        assert_eq!(t.frame_id(), 0);
        let active = t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        assert_eq!(active[0].track_id(), 1);
    }

    #[test]
    fn assign_student_id_is_monotone() {
        let mut t = ByteTracker::default();
        t.update(&[person(100.0, 100.0, 200.0, 300.0, 0.9)]);
        t.assign_student_id(1, "s1");
        t.assign_student_id(1, "s2");
        assert_eq!(t.get(1).unwrap().student_id(), Some("s1"));
    }
}
