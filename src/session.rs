use crate::analysis::{AttentionState, PostureState};
use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Rolling per-track metrics for one session.
///
/// Created on the first observation of a track id and kept for the whole session, surviving
/// the underlying track's removal. Holds the transition memory the event synthesizer needs.
///
#[derive(Clone, Debug)]
pub struct TrackMetrics {
    pub track_id: u64,
    pub student_id: Option<String>,
    pub student_name: Option<String>,

    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,

    pub attention_scores: VecDeque<f32>,
    pub posture_scores: VecDeque<f32>,

    pub phone_usage_count: u32,
    pub distraction_count: u32,
    pub looking_away_count: u32,

    pub last_attention_state: Option<AttentionState>,
    pub last_posture_state: Option<PostureState>,
    pub phone_detected_frames: u32,
}

impl TrackMetrics {
    pub fn new(track_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            track_id,
            student_id: None,
            student_name: None,
            first_seen: now,
            last_seen: now,
            attention_scores: VecDeque::default(),
            posture_scores: VecDeque::default(),
            phone_usage_count: 0,
            distraction_count: 0,
            looking_away_count: 0,
            last_attention_state: None,
            last_posture_state: None,
            phone_detected_frames: 0,
        }
    }

    pub fn push_attention(&mut self, score: f32, limit: usize) {
        self.attention_scores.push_back(score);
        if limit > 0 && self.attention_scores.len() > limit {
            self.attention_scores.pop_front();
        }
    }

    pub fn push_posture(&mut self, score: f32, limit: usize) {
        self.posture_scores.push_back(score);
        if limit > 0 && self.posture_scores.len() > limit {
            self.posture_scores.pop_front();
        }
    }

    /// Arithmetic mean of the collected attention scores; `None` when nothing was observed.
    ///
    pub fn average_attention(&self) -> Option<f32> {
        if self.attention_scores.is_empty() {
            return None;
        }
        Some(self.attention_scores.iter().sum::<f32>() / self.attention_scores.len() as f32)
    }

    pub fn average_posture(&self) -> Option<f32> {
        if self.posture_scores.is_empty() {
            return None;
        }
        Some(self.posture_scores.iter().sum::<f32>() / self.posture_scores.len() as f32)
    }
}

/// One point of the session-wide attention timeline.
///
#[derive(Clone, Debug, Serialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub average_attention: f32,
    pub track_count: usize,
}

/// Aggregated state of one monitoring session.
///
#[derive(Clone, Debug)]
pub struct SessionMetrics {
    pub session_id: String,
    pub start_time: DateTime<Utc>,

    pub frame_count: u64,
    pub peak_student_count: usize,

    pub attention_timeline: Vec<TimelinePoint>,
    pub track_metrics: HashMap<u64, TrackMetrics>,
}

impl SessionMetrics {
    pub fn new(session_id: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            start_time,
            frame_count: 0,
            peak_student_count: 0,
            attention_timeline: Vec::default(),
            track_metrics: HashMap::default(),
        }
    }

    /// Fetches the metrics record for a track, creating one on first sight. The boolean is
    /// `true` when the track was seen for the first time.
    ///
    pub fn metrics_for(&mut self, track_id: u64, now: DateTime<Utc>) -> (&mut TrackMetrics, bool) {
        let created = !self.track_metrics.contains_key(&track_id);
        let metrics = self
            .track_metrics
            .entry(track_id)
            .or_insert_with(|| TrackMetrics::new(track_id, now));
        (metrics, created)
    }

    /// Appends the per-frame aggregates: one timeline point, the peak and the frame counter.
    ///
    pub fn observe_frame(&mut self, now: DateTime<Utc>, average_attention: f32, active: usize) {
        self.frame_count += 1;
        self.peak_student_count = self.peak_student_count.max(active);
        self.attention_timeline.push(TimelinePoint {
            timestamp: now,
            average_attention,
            track_count: active,
        });
    }

    /// Compiles the final analytics record.
    ///
    pub fn compile_analytics(&self, average_fps: f32) -> SessionAnalytics {
        let student_metrics = self
            .track_metrics
            .values()
            .sorted_by_key(|m| m.track_id)
            .map(|m| StudentReport {
                track_id: m.track_id,
                student_id: m.student_id.clone(),
                student_name: m.student_name.clone(),
                average_attention: m.average_attention(),
                average_posture: m.average_posture(),
                distraction_count: m.distraction_count,
                looking_away_count: m.looking_away_count,
                phone_usage_count: m.phone_usage_count,
                first_seen: m.first_seen,
                last_seen: m.last_seen,
                total_time_present: (m.last_seen - m.first_seen).num_milliseconds() as f64 / 1000.0,
            })
            .collect::<Vec<_>>();

        let all_attention = self
            .track_metrics
            .values()
            .flat_map(|m| m.attention_scores.iter().copied())
            .collect::<Vec<_>>();

        let (min, max) = match all_attention.iter().copied().minmax() {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let average = if all_attention.is_empty() {
            0.0
        } else {
            all_attention.iter().sum::<f32>() / all_attention.len() as f32
        };

        let average_student_count = if self.attention_timeline.is_empty() {
            0.0
        } else {
            self.attention_timeline
                .iter()
                .map(|p| p.track_count as f32)
                .sum::<f32>()
                / self.attention_timeline.len() as f32
        };

        SessionAnalytics {
            session_id: self.session_id.clone(),
            attention: AttentionSummary { average, min, max },
            peak_student_count: self.peak_student_count,
            average_student_count,
            student_metrics,
            total_frames: self.frame_count,
            average_fps,
        }
    }
}

/// Session-wide attention extremes.
///
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AttentionSummary {
    pub average: f32,
    pub min: f32,
    pub max: f32,
}

/// Final per-student analytics.
///
#[derive(Clone, Debug, Serialize)]
pub struct StudentReport {
    pub track_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub average_attention: Option<f32>,
    pub average_posture: Option<f32>,
    pub distraction_count: u32,
    pub looking_away_count: u32,
    pub phone_usage_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Seconds between the first and the last observation
    pub total_time_present: f64,
}

/// The analytics record produced when a session stops.
///
#[derive(Clone, Debug, Serialize)]
pub struct SessionAnalytics {
    pub session_id: String,
    pub attention: AttentionSummary,
    pub peak_student_count: usize,
    pub average_student_count: f32,
    pub student_metrics: Vec<StudentReport>,
    pub total_frames: u64,
    pub average_fps: f32,
}

#[cfg(test)]
mod tests {
    use crate::session::{SessionMetrics, TrackMetrics};
    use chrono::{Duration, Utc};

    #[test]
    fn empty_session_analytics() {
        let s = SessionMetrics::new("s", Utc::now());
        let a = s.compile_analytics(0.0);
        assert_eq!(a.total_frames, 0);
        assert_eq!(a.peak_student_count, 0);
        assert_eq!(a.average_student_count, 0.0);
        assert!(a.student_metrics.is_empty());
        assert_eq!(a.attention.average, 0.0);
    }

    #[test]
    fn timeline_and_peak() {
        let start = Utc::now();
        let mut s = SessionMetrics::new("s", start);
        s.observe_frame(start, 0.5, 1);
        s.observe_frame(start + Duration::milliseconds(125), 0.7, 3);
        s.observe_frame(start + Duration::milliseconds(250), 0.6, 2);

        assert_eq!(s.frame_count, 3);
        assert_eq!(s.peak_student_count, 3);
        assert_eq!(s.attention_timeline.len(), 3);

        let a = s.compile_analytics(8.0);
        assert!((a.average_student_count - 2.0).abs() < 1e-6);
    }

    #[test]
    fn per_student_means() {
        let start = Utc::now();
        let mut s = SessionMetrics::new("s", start);

        let (m, created) = s.metrics_for(1, start);
        assert!(created);
        m.push_attention(0.8, 0);
        m.push_attention(0.6, 0);
        m.last_seen = start + Duration::seconds(10);

        let (_, created) = s.metrics_for(1, start);
        assert!(!created);

        let a = s.compile_analytics(8.0);
        let report = &a.student_metrics[0];
        assert_eq!(report.track_id, 1);
        assert!((report.average_attention.unwrap() - 0.7).abs() < 1e-6);
        assert!((report.total_time_present - 10.0).abs() < 1e-6);
        assert_eq!(a.attention.min, 0.6);
        assert_eq!(a.attention.max, 0.8);
    }

    #[test]
    fn score_history_is_bounded() {
        let mut m = TrackMetrics::new(1, Utc::now());
        for i in 0..100 {
            m.push_attention(i as f32, 10);
        }
        assert_eq!(m.attention_scores.len(), 10);
        assert_eq!(m.attention_scores.front().copied(), Some(90.0));
    }

    #[test]
    fn no_observations_means_no_average() {
        let m = TrackMetrics::new(1, Utc::now());
        assert!(m.average_attention().is_none());
        assert!(m.average_posture().is_none());
    }
}
