use serde::{Deserialize, Serialize};

/// Posture classification states.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureState {
    Good,
    Slouching,
    Leaning,
}

impl PostureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureState::Good => "good",
            PostureState::Slouching => "slouching",
            PostureState::Leaning => "leaning",
        }
    }

    pub fn is_poor(&self) -> bool {
        matches!(self, PostureState::Slouching | PostureState::Leaning)
    }
}

/// Attention classification based on gaze.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    /// Looking at the instructor/board
    Focused,
    /// Looking away
    Distracted,
    /// Eyes closing
    Drowsy,
}

impl AttentionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionState::Focused => "focused",
            AttentionState::Distracted => "distracted",
            AttentionState::Drowsy => "drowsy",
        }
    }
}

/// Posture estimation result.
///
#[derive(Clone, Debug, Serialize)]
pub struct PostureReport {
    pub state: PostureState,
    /// 0-1, higher is better
    pub score: f32,
    pub shoulder_angle: f32,
    pub head_tilt: f32,
}

/// Gaze estimation result.
///
#[derive(Clone, Debug, Serialize)]
pub struct GazeReport {
    pub state: AttentionState,
    /// 0-1, higher is more attentive
    pub score: f32,
    /// Horizontal head rotation, degrees
    pub yaw: f32,
    /// Vertical head rotation, degrees
    pub pitch: f32,
    /// Head tilt, degrees
    pub roll: f32,
    /// Proxy for drowsiness; lower values indicate closing eyes
    pub eye_aspect_ratio: f32,
}

/// Combined per-track analysis produced by a pose/gaze capability.
///
#[derive(Clone, Debug, Default)]
pub struct TrackAnalysis {
    pub posture: Option<PostureReport>,
    pub gaze: Option<GazeReport>,
}

/// Thresholds for the attention classifier.
///
#[derive(Clone, Copy, Debug)]
pub struct AttentionThresholds {
    pub yaw: f32,
    pub pitch: f32,
    pub ear: f32,
}

impl Default for AttentionThresholds {
    fn default() -> Self {
        Self {
            yaw: 30.0,
            pitch: 20.0,
            ear: 0.2,
        }
    }
}

/// Classifies posture from body angles (degrees).
///
/// The score starts at 1.0 and is penalized by shoulder tilt, spine lean and head tilt,
/// each capped at its weight; `leaning` when the spine deviates more than 20 degrees from
/// vertical, `slouching` when the shoulders tilt more than 15 degrees or the composite
/// score drops under 0.5.
///
pub fn classify_posture(
    shoulder_angle: f32,
    spine_angle: f32,
    head_tilt: f32,
) -> (PostureState, f32) {
    let mut score = 1.0_f32;
    score -= (shoulder_angle.abs() / 45.0 * 0.3).min(0.3);
    score -= (spine_angle.abs() / 30.0 * 0.4).min(0.4);
    score -= (head_tilt.abs() / 30.0 * 0.3).min(0.3);
    let score = score.max(0.0);

    let state = if spine_angle.abs() > 20.0 {
        PostureState::Leaning
    } else if shoulder_angle.abs() > 15.0 || score < 0.5 {
        PostureState::Slouching
    } else {
        PostureState::Good
    };

    (state, score)
}

/// Classifies attention from head pose (degrees) and the eye aspect ratio.
///
/// Drowsiness wins over gaze direction: under the EAR threshold the score is the ratio of
/// the observed EAR to the threshold. Otherwise the score blends yaw, pitch and eye
/// openness, and the state is `distracted` when either rotation exceeds its threshold.
///
pub fn classify_attention(
    yaw: f32,
    pitch: f32,
    ear: f32,
    thresholds: &AttentionThresholds,
) -> (AttentionState, f32) {
    if ear < thresholds.ear {
        return (AttentionState::Drowsy, ear / thresholds.ear);
    }

    let yaw_score = (1.0 - yaw.abs() / thresholds.yaw).max(0.0);
    let pitch_score = (1.0 - pitch.abs() / thresholds.pitch).max(0.0);
    let score = 0.6 * yaw_score + 0.3 * pitch_score + 0.1 * (ear / 0.3).min(1.0);

    if yaw.abs() > thresholds.yaw || pitch.abs() > thresholds.pitch {
        (AttentionState::Distracted, score)
    } else {
        (AttentionState::Focused, score)
    }
}

impl PostureReport {
    /// Builds the report from raw body angles.
    ///
    pub fn from_angles(shoulder_angle: f32, spine_angle: f32, head_tilt: f32) -> Self {
        let (state, score) = classify_posture(shoulder_angle, spine_angle, head_tilt);
        Self {
            state,
            score,
            shoulder_angle,
            head_tilt,
        }
    }
}

impl GazeReport {
    /// Builds the report from raw head pose angles and the eye aspect ratio.
    ///
    pub fn from_head_pose(
        yaw: f32,
        pitch: f32,
        roll: f32,
        eye_aspect_ratio: f32,
        thresholds: &AttentionThresholds,
    ) -> Self {
        let (state, score) = classify_attention(yaw, pitch, eye_aspect_ratio, thresholds);
        Self {
            state,
            score,
            yaw,
            pitch,
            roll,
            eye_aspect_ratio,
        }
    }
}
