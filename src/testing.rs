//! Deterministic capability doubles and synthetic data generators.
//!
//! These replace the real detection/face/pose models in tests and demos: each double replays
//! a fixed script, so a pipeline run over synthetic frames is fully reproducible.

use crate::analysis::{AttentionThresholds, GazeReport, PostureReport, TrackAnalysis};
use crate::capabilities::{CapabilityError, Detector, FaceAnalyzer, PoseGaze};
use crate::detection::{Detection, Detections, FaceDetection, ObjectClass};
use crate::distance::{unit_norm, Feature, FromVec};
use crate::frame::{Frame, BYTES_PER_PIXEL};
use crate::utils::bbox::BoundingBox;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;

/// A blank BGR frame of the given size and timestamp.
///
pub fn blank_frame(width: u32, height: u32, timestamp: Duration) -> Frame {
    Frame::new(
        width,
        height,
        vec![0_u8; width as usize * height as usize * BYTES_PER_PIXEL],
        timestamp,
    )
    .unwrap()
}

pub fn person(left: f32, top: f32, right: f32, bottom: f32, score: f32) -> Detection {
    Detection::new(
        BoundingBox::new(left, top, right, bottom),
        score,
        ObjectClass::Person,
    )
}

pub fn phone(left: f32, top: f32, right: f32, bottom: f32, score: f32) -> Detection {
    Detection::new(
        BoundingBox::new(left, top, right, bottom),
        score,
        ObjectClass::Phone,
    )
}

/// A random unit-norm feature of the given dimensionality.
///
pub fn random_feature<R: Rng>(rng: &mut R, dimension: usize) -> Feature {
    let raw: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
    unit_norm(&Feature::from_vec(raw))
}

/// A unit feature pointing along one axis; orthogonal axes make controllable similarities.
///
pub fn axis_feature(axis: usize, dimension: usize) -> Feature {
    let mut raw = vec![0.0_f32; dimension];
    raw[axis] = 1.0;
    Feature::from_vec(raw)
}

/// Detector double replaying a per-frame script. Runs the default detections (empty unless
/// set) once the script is exhausted.
///
#[derive(Default)]
pub struct ScriptedDetector {
    script: VecDeque<Detections>,
    default: Detections,
    pub calls: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Detections>) -> Self {
        Self {
            script: script.into(),
            default: Detections::default(),
            ..Default::default()
        }
    }

    /// The same detections on every frame.
    ///
    pub fn repeating(default: Detections) -> Self {
        Self {
            script: VecDeque::default(),
            default,
            calls: 0,
        }
    }

    pub fn push(&mut self, detections: Detections) {
        self.script.push_back(detections);
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Detections, CapabilityError> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_else(|| self.default.clone()))
    }
}

/// Face capability double: every call sees one face spanning the region, carrying the
/// configured embedding. Without a feature, no face is found.
///
#[derive(Default)]
pub struct ScriptedFaces {
    feature: Option<Feature>,
    score: f32,
    pub calls: usize,
}

impl ScriptedFaces {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_feature(feature: Feature, score: f32) -> Self {
        Self {
            feature: Some(feature),
            score,
            calls: 0,
        }
    }
}

impl FaceAnalyzer for ScriptedFaces {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, CapabilityError> {
        self.calls += 1;
        Ok(match &self.feature {
            Some(feature) => vec![FaceDetection {
                bbox: BoundingBox::new(0.0, 0.0, frame.width() as f32, frame.height() as f32),
                score: self.score,
                landmarks: None,
                feature: Some(feature.clone()),
            }],
            None => Vec::default(),
        })
    }
}

/// Pose/gaze double replaying a per-call script, then a default analysis.
///
pub struct ScriptedPoseGaze {
    script: VecDeque<Option<TrackAnalysis>>,
    default: Option<TrackAnalysis>,
    pub calls: usize,
}

impl ScriptedPoseGaze {
    pub fn repeating(default: Option<TrackAnalysis>) -> Self {
        Self {
            script: VecDeque::default(),
            default,
            calls: 0,
        }
    }

    pub fn scripted(script: Vec<Option<TrackAnalysis>>, default: Option<TrackAnalysis>) -> Self {
        Self {
            script: script.into(),
            default,
            calls: 0,
        }
    }
}

impl PoseGaze for ScriptedPoseGaze {
    fn analyze(
        &mut self,
        _frame: &Frame,
        _bbox: Option<&BoundingBox>,
    ) -> Result<Option<TrackAnalysis>, CapabilityError> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_else(|| self.default.clone()))
    }
}

/// Analysis of a calm, focused person; the yaw is picked so the attention score lands on
/// the requested value under default thresholds.
///
pub fn focused_analysis(score: f32) -> TrackAnalysis {
    // score = 0.6 * (1 - yaw/30) + 0.3 + 0.1  =>  yaw = 30 * (1 - (score - 0.4) / 0.6)
    let yaw = 30.0 * (1.0 - (score - 0.4) / 0.6);
    TrackAnalysis {
        posture: Some(PostureReport::from_angles(0.0, 0.0, 0.0)),
        gaze: Some(GazeReport::from_head_pose(
            yaw,
            0.0,
            0.0,
            0.3,
            &AttentionThresholds::default(),
        )),
    }
}

/// Analysis of a person looking far off to the side.
///
pub fn distracted_analysis() -> TrackAnalysis {
    TrackAnalysis {
        posture: Some(PostureReport::from_angles(0.0, 0.0, 0.0)),
        gaze: Some(GazeReport::from_head_pose(
            45.0,
            0.0,
            0.0,
            0.3,
            &AttentionThresholds::default(),
        )),
    }
}

/// Analysis of a person with closing eyes.
///
pub fn drowsy_analysis() -> TrackAnalysis {
    TrackAnalysis {
        posture: Some(PostureReport::from_angles(0.0, 0.0, 0.0)),
        gaze: Some(GazeReport::from_head_pose(
            0.0,
            0.0,
            0.0,
            0.1,
            &AttentionThresholds::default(),
        )),
    }
}

/// Analysis of a slouching person.
///
pub fn slouching_analysis() -> TrackAnalysis {
    TrackAnalysis {
        posture: Some(PostureReport::from_angles(25.0, 0.0, 0.0)),
        gaze: Some(GazeReport::from_head_pose(
            0.0,
            0.0,
            0.0,
            0.3,
            &AttentionThresholds::default(),
        )),
    }
}
