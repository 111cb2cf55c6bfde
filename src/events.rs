use crate::analysis::{AttentionState, GazeReport, PostureReport, PostureState};
use crate::session::TrackMetrics;
use crate::trackers::byte::track::Track;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A domain event synthesized from a track's state transitions.
///
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub track_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub confidence: f32,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event variants with their payloads.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    StudentEntered,
    StudentIdentified {
        similarity: f32,
    },
    AttentionHigh {
        yaw: f32,
        pitch: f32,
    },
    AttentionLow {
        yaw: f32,
        pitch: f32,
    },
    DrowsinessDetected {
        eye_aspect_ratio: f32,
    },
    PosturePoor {
        posture_state: PostureState,
        posture_score: f32,
    },
    PostureGood,
    PhoneDetected,
}

/// Emission categories defining the within-frame event order.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventCategory {
    Entry,
    Attention,
    Posture,
    Phone,
}

impl EventKind {
    pub fn category(&self) -> EventCategory {
        match self {
            EventKind::StudentEntered | EventKind::StudentIdentified { .. } => EventCategory::Entry,
            EventKind::AttentionHigh { .. }
            | EventKind::AttentionLow { .. }
            | EventKind::DrowsinessDetected { .. } => EventCategory::Attention,
            EventKind::PosturePoor { .. } | EventKind::PostureGood => EventCategory::Posture,
            EventKind::PhoneDetected => EventCategory::Phone,
        }
    }
}

/// Per-track finite state machine that turns attention/posture/phone observations into
/// events on state transitions.
///
/// The transition memory lives in [TrackMetrics]; the synthesizer itself is stateless and
/// owned by the pipeline worker.
///
#[derive(Clone, Copy, Debug)]
pub struct EventSynthesizer {
    pub attention_high_threshold: f32,
    pub yaw_thresh: f32,
    pub phone_detection_frames: u32,
}

impl EventSynthesizer {
    const PHONE_CONFIDENCE: f32 = 0.8;

    pub fn new(attention_high_threshold: f32, yaw_thresh: f32, phone_detection_frames: u32) -> Self {
        Self {
            attention_high_threshold,
            yaw_thresh,
            phone_detection_frames,
        }
    }

    fn event(track: &Track, now: DateTime<Utc>, confidence: f32, kind: EventKind) -> Event {
        Event {
            timestamp: now,
            track_id: track.track_id(),
            student_id: track.student_id().map(str::to_string),
            confidence: confidence.clamp(0.0, 1.0),
            kind,
        }
    }

    /// The first observation of a track id.
    ///
    pub fn entered(&self, track: &Track, now: DateTime<Utc>) -> Event {
        Self::event(track, now, track.score(), EventKind::StudentEntered)
    }

    /// A successful identity resolution.
    ///
    pub fn identified(&self, track: &Track, similarity: f32, now: DateTime<Utc>) -> Event {
        Self::event(
            track,
            now,
            similarity,
            EventKind::StudentIdentified { similarity },
        )
    }

    /// Emits at most one event when the attention state changed since the last observation.
    ///
    pub fn check_attention(
        &self,
        track: &Track,
        metrics: &mut TrackMetrics,
        gaze: &GazeReport,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        let transition = metrics.last_attention_state != Some(gaze.state);
        let event = if transition {
            match gaze.state {
                AttentionState::Focused if gaze.score >= self.attention_high_threshold => {
                    Some(Self::event(
                        track,
                        now,
                        gaze.score,
                        EventKind::AttentionHigh {
                            yaw: gaze.yaw,
                            pitch: gaze.pitch,
                        },
                    ))
                }
                AttentionState::Focused => None,
                AttentionState::Distracted => {
                    metrics.distraction_count += 1;
                    if gaze.yaw.abs() > self.yaw_thresh {
                        metrics.looking_away_count += 1;
                    }
                    Some(Self::event(
                        track,
                        now,
                        1.0 - gaze.score,
                        EventKind::AttentionLow {
                            yaw: gaze.yaw,
                            pitch: gaze.pitch,
                        },
                    ))
                }
                AttentionState::Drowsy => Some(Self::event(
                    track,
                    now,
                    1.0 - gaze.eye_aspect_ratio,
                    EventKind::DrowsinessDetected {
                        eye_aspect_ratio: gaze.eye_aspect_ratio,
                    },
                )),
            }
        } else {
            None
        };

        metrics.last_attention_state = Some(gaze.state);
        event
    }

    /// Emits at most one event when the posture state changed since the last observation.
    ///
    pub fn check_posture(
        &self,
        track: &Track,
        metrics: &mut TrackMetrics,
        posture: &PostureReport,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        let previous = metrics.last_posture_state;
        let event = if previous != Some(posture.state) {
            if posture.state.is_poor() {
                Some(Self::event(
                    track,
                    now,
                    1.0 - posture.score,
                    EventKind::PosturePoor {
                        posture_state: posture.state,
                        posture_score: posture.score,
                    },
                ))
            } else if posture.state == PostureState::Good
                && previous.map(|s| s.is_poor()).unwrap_or(false)
            {
                Some(Self::event(track, now, posture.score, EventKind::PostureGood))
            } else {
                None
            }
        } else {
            None
        };

        metrics.last_posture_state = Some(posture.state);
        event
    }

    /// Advances the phone hysteresis counter and fires exactly when it first reaches the
    /// configured frame count. Returns whether the track counts as "phone in hand" this
    /// frame, plus the event if one fired.
    ///
    pub fn check_phone(
        &self,
        track: &Track,
        metrics: &mut TrackMetrics,
        associated: bool,
        now: DateTime<Utc>,
    ) -> (bool, Option<Event>) {
        let mut event = None;
        if associated {
            // Saturates one past the trigger so a short gap cannot re-fire immediately.
            if metrics.phone_detected_frames <= self.phone_detection_frames {
                metrics.phone_detected_frames += 1;
                if metrics.phone_detected_frames == self.phone_detection_frames {
                    metrics.phone_usage_count += 1;
                    event = Some(Self::event(
                        track,
                        now,
                        Self::PHONE_CONFIDENCE,
                        EventKind::PhoneDetected,
                    ));
                }
            }
        } else {
            metrics.phone_detected_frames = metrics.phone_detected_frames.saturating_sub(1);
        }

        (
            metrics.phone_detected_frames >= self.phone_detection_frames,
            event,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AttentionThresholds, GazeReport, PostureReport};
    use crate::detection::{Detection, ObjectClass};
    use crate::events::{EventKind, EventSynthesizer};
    use crate::session::TrackMetrics;
    use crate::trackers::byte::track::Track;
    use crate::trackers::byte::ByteTracker;
    use crate::utils::bbox::BoundingBox;
    use chrono::Utc;

    fn track() -> Track {
        let mut tracker = ByteTracker::default();
        let det = Detection::new(
            BoundingBox::new(10.0, 10.0, 60.0, 110.0),
            0.9,
            ObjectClass::Person,
        );
        tracker.update(&[det]).remove(0)
    }

    fn focused(score_yaw: f32) -> GazeReport {
        GazeReport::from_head_pose(score_yaw, 0.0, 0.0, 0.3, &AttentionThresholds::default())
    }

    fn distracted() -> GazeReport {
        GazeReport::from_head_pose(40.0, 0.0, 0.0, 0.3, &AttentionThresholds::default())
    }

    fn drowsy() -> GazeReport {
        GazeReport::from_head_pose(0.0, 0.0, 0.0, 0.1, &AttentionThresholds::default())
    }

    #[test]
    fn attention_fires_on_transition_only() {
        let s = EventSynthesizer::new(0.7, 30.0, 3);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());
        let now = Utc::now();

        let e = s.check_attention(&t, &mut m, &focused(0.0), now).unwrap();
        assert_eq!(
            e.kind,
            EventKind::AttentionHigh {
                yaw: 0.0,
                pitch: 0.0
            }
        );

        // Same state again: silent.
        assert!(s.check_attention(&t, &mut m, &focused(0.0), now).is_none());

        let e = s.check_attention(&t, &mut m, &distracted(), now).unwrap();
        assert!(matches!(e.kind, EventKind::AttentionLow { .. }));
        assert_eq!(m.distraction_count, 1);
        assert_eq!(m.looking_away_count, 1);

        let e = s.check_attention(&t, &mut m, &drowsy(), now).unwrap();
        assert!(matches!(e.kind, EventKind::DrowsinessDetected { .. }));
        assert!((e.confidence - 0.9).abs() < 1e-5);
    }

    #[test]
    fn weak_focus_is_silent() {
        let s = EventSynthesizer::new(0.7, 30.0, 3);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());

        // Focused but under the high-attention bar: state is recorded, nothing fires.
        let gaze = focused(25.0);
        assert!(gaze.score < 0.7);
        assert!(s.check_attention(&t, &mut m, &gaze, Utc::now()).is_none());
        assert_eq!(m.last_attention_state, Some(gaze.state));
    }

    #[test]
    fn posture_good_needs_prior_poor() {
        let s = EventSynthesizer::new(0.7, 30.0, 3);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());
        let now = Utc::now();

        let good = PostureReport::from_angles(0.0, 0.0, 0.0);
        let poor = PostureReport::from_angles(25.0, 0.0, 0.0);

        // Entering in good posture is not an event.
        assert!(s.check_posture(&t, &mut m, &good, now).is_none());

        let e = s.check_posture(&t, &mut m, &poor, now).unwrap();
        assert!(matches!(e.kind, EventKind::PosturePoor { .. }));

        let e = s.check_posture(&t, &mut m, &good, now).unwrap();
        assert_eq!(e.kind, EventKind::PostureGood);
    }

    #[test]
    fn phone_hysteresis() {
        let s = EventSynthesizer::new(0.7, 30.0, 3);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());
        let now = Utc::now();

        // Phone present on frames 5..=10 out of 1..=20; threshold 3 fires on frame 7.
        let mut fired_at = Vec::new();
        for frame in 1_u64..=20 {
            let associated = (5..=10).contains(&frame);
            let (_, event) = s.check_phone(&t, &mut m, associated, now);
            if event.is_some() {
                fired_at.push(frame);
            }
        }
        assert_eq!(fired_at, vec![7]);
        assert_eq!(m.phone_usage_count, 1);
        assert_eq!(m.phone_detected_frames, 0);
    }

    #[test]
    fn phone_refires_after_full_decay() {
        let s = EventSynthesizer::new(0.7, 30.0, 2);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());
        let now = Utc::now();

        let mut events = 0;
        // First burst.
        for _ in 0..4 {
            if s.check_phone(&t, &mut m, true, now).1.is_some() {
                events += 1;
            }
        }
        // Decay all the way to zero.
        for _ in 0..4 {
            s.check_phone(&t, &mut m, false, now);
        }
        assert_eq!(m.phone_detected_frames, 0);
        // Second burst fires again.
        for _ in 0..4 {
            if s.check_phone(&t, &mut m, true, now).1.is_some() {
                events += 1;
            }
        }
        assert_eq!(events, 2);
        assert_eq!(m.phone_usage_count, 2);
    }

    #[test]
    fn phone_counter_is_bounded() {
        let s = EventSynthesizer::new(0.7, 30.0, 3);
        let t = track();
        let mut m = TrackMetrics::new(t.track_id(), Utc::now());
        let now = Utc::now();

        for _ in 0..50 {
            s.check_phone(&t, &mut m, true, now);
        }
        assert_eq!(m.phone_detected_frames, 4);

        // A one-frame gap does not allow an immediate re-fire.
        s.check_phone(&t, &mut m, false, now);
        let (_, event) = s.check_phone(&t, &mut m, true, now);
        assert!(event.is_none());
        assert_eq!(m.phone_usage_count, 1);
    }
}
