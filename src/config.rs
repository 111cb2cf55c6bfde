use crate::analysis::AttentionThresholds;
use serde::{Deserialize, Serialize};

/// Pipeline configuration surface.
///
/// Field names match the options recognized by deployments; unknown options are rejected at
/// the deserialization boundary.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Target inference rate, frames per second
    pub target_fps: u32,
    /// Frames wider than this are downscaled before detection
    pub max_frame_width: u32,
    pub max_frame_height: u32,

    /// Detector confidence floor
    pub yolo_conf_threshold: f32,
    /// Face detection score floor for embedding extraction
    pub face_det_threshold: f32,
    /// Similarity bound for identity matches
    pub face_rec_threshold: f32,

    /// Detection confidence splitting the association passes
    pub track_thresh: f32,
    /// IoU cost gate of the first association pass
    pub match_thresh: f32,
    /// Frames a lost track survives unmatched
    pub track_buffer: u64,
    /// Minimal detection bbox area
    pub min_box_area: f32,

    /// Seconds between recognition attempts per track
    pub recognition_interval: f64,

    /// Consecutive frames of phone presence before the event fires
    pub phone_detection_frames: u32,
    pub attention_high_threshold: f32,
    pub attention_low_threshold: f32,

    /// Eye aspect ratio under which a face counts as drowsy
    pub ear_threshold: f32,
    /// Degrees of yaw beyond which gaze counts as distracted
    pub yaw_thresh: f32,
    pub pitch_thresh: f32,

    pub embedding_dimension: usize,

    /// Rolling cap on per-track attention/posture score lists; 0 keeps everything
    pub score_history_limit: usize,
}

impl MonitorConfig {
    /// The attention classifier thresholds for pose/gaze capability implementations.
    ///
    pub fn attention_thresholds(&self) -> AttentionThresholds {
        AttentionThresholds {
            yaw: self.yaw_thresh,
            pitch: self.pitch_thresh,
            ear: self.ear_threshold,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_fps: 8,
            max_frame_width: 1280,
            max_frame_height: 720,
            yolo_conf_threshold: 0.5,
            face_det_threshold: 0.5,
            face_rec_threshold: 0.4,
            track_thresh: 0.5,
            match_thresh: 0.8,
            track_buffer: 30,
            min_box_area: 100.0,
            recognition_interval: 2.0,
            phone_detection_frames: 3,
            attention_high_threshold: 0.7,
            attention_low_threshold: 0.4,
            ear_threshold: 0.2,
            yaw_thresh: 30.0,
            pitch_thresh: 20.0,
            embedding_dimension: 512,
            score_history_limit: 1800,
        }
    }
}
