use crate::detection::{Detection, ObjectClass};
use crate::utils::bbox::BoundingBox;
use crate::utils::kalman::{KalmanFilter, KalmanState};
use serde::Serialize;

/// Lifecycle states of a track.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Created from a detection, not activated yet
    New,
    /// Actively matched against detections
    Tracked,
    /// Unmatched, kept alive within the track buffer
    Lost,
    /// Expired; dropped from the active lists
    Removed,
}

/// A single tracked object.
///
/// Owned exclusively by the tracker; the pipeline refers to tracks by id and receives
/// snapshots from `update`.
///
#[derive(Clone, Debug)]
pub struct Track {
    track_id: u64,
    state: TrackState,
    is_activated: bool,
    bbox: BoundingBox,
    score: f32,
    class: ObjectClass,
    kalman: KalmanState,
    frame_id: u64,
    start_frame: u64,
    tracklet_len: u64,
    student_id: Option<String>,
}

impl Track {
    /// Builds an unactivated candidate track from a detection, with a freshly initiated
    /// Kalman state.
    ///
    pub(crate) fn from_detection(filter: &KalmanFilter, detection: &Detection) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            bbox: detection.bbox,
            score: detection.score,
            class: detection.class,
            kalman: filter.initiate(detection.bbox.as_measurement()),
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            student_id: None,
        }
    }

    /// Activates a new track under its assigned id.
    ///
    pub(crate) fn activate(&mut self, track_id: u64, frame_id: u64) {
        self.track_id = track_id;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.tracklet_len = 0;
    }

    /// Re-activates a lost track from a matched candidate: position, score and motion state
    /// are replaced wholesale.
    ///
    pub(crate) fn re_activate(&mut self, candidate: &Track, frame_id: u64) {
        self.bbox = candidate.bbox;
        self.score = candidate.score;
        self.kalman = candidate.kalman;
        self.frame_id = frame_id;
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
    }

    /// Updates a matched track with the candidate's observation. The Kalman state is
    /// untouched here; `apply_measurement` runs separately for high-confidence matches.
    ///
    pub(crate) fn update_with(&mut self, candidate: &Track, frame_id: u64) {
        self.frame_id = frame_id;
        self.bbox = candidate.bbox;
        self.score = candidate.score;
        self.tracklet_len += 1;
        self.state = TrackState::Tracked;
        self.is_activated = true;
    }

    /// Runs the Kalman prediction and refreshes the bbox from the predicted mean.
    ///
    pub(crate) fn predict(&mut self, filter: &KalmanFilter) {
        self.kalman = filter.predict(&self.kalman);
        self.bbox = self.kalman.bbox();
    }

    pub(crate) fn apply_measurement(&mut self, filter: &KalmanFilter, bbox: &BoundingBox) {
        self.kalman = filter.update(&self.kalman, bbox.as_measurement());
    }

    pub(crate) fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    /// Assigns the student identity. Once set the identity is immutable for the lifetime of
    /// the track; later assignments are ignored.
    ///
    pub(crate) fn set_student_id(&mut self, student_id: &str) {
        if self.student_id.is_none() {
            self.student_id = Some(student_id.to_string());
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_activated(&self) -> bool {
        self.is_activated
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn kalman(&self) -> &KalmanState {
        &self.kalman
    }

    /// Frame of the last update.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn tracklet_len(&self) -> u64 {
        self.tracklet_len
    }

    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }
}
