use crate::analysis::{GazeReport, PostureReport};
use crate::capabilities::{CapabilityError, Detector, FaceAnalyzer, PoseGaze};
use crate::config::MonitorConfig;
use crate::detection::{phones_near_persons, ObjectClass};
use crate::events::{Event, EventSynthesizer};
use crate::frame::Frame;
use crate::identity::{IdentityResolver, KnownStudent};
use crate::session::{SessionAnalytics, SessionMetrics};
use crate::sinks::{EventSink, FrameSink, NoopEventSink, NoopFrameSink};
use crate::trackers::byte::{ByteTracker, ByteTrackerOptions, TrackerStats};
use crate::utils::bbox::BoundingBox;
use crate::Errors;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

const FPS_WINDOW: usize = 30;
const TRACK_PERSON_IOU: f32 = 0.5;

/// Per-frame summary dispatched to the frame sink.
///
#[derive(Clone, Debug, Serialize)]
pub struct FrameRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub detections: DetectionSummary,
    pub tracks: Vec<TrackRecord>,
    pub metrics: FrameMetrics,
    pub events: Vec<Event>,
    pub processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameRecord {
    fn empty(session_id: &str, timestamp: DateTime<Utc>, error: Option<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp,
            detections: DetectionSummary::default(),
            tracks: Vec::default(),
            metrics: FrameMetrics::default(),
            events: Vec::default(),
            processing_time_ms: 0.0,
            error,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionSummary {
    pub persons: usize,
    pub objects: Vec<ObjectRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ObjectRecord {
    pub class: ObjectClass,
    pub bbox: BoundingBox,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameMetrics {
    pub student_count: usize,
    pub average_attention: f32,
    pub fps: f32,
}

/// One track's slice of a frame record.
///
#[derive(Clone, Debug, Serialize)]
pub struct TrackRecord {
    pub track_id: u64,
    pub bbox: BoundingBox,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub attention: Option<GazeReport>,
    pub posture: Option<PostureReport>,
    pub phone_detected: bool,
    pub events: Vec<Event>,
}

/// What happened to a frame offered to the pipeline.
///
#[derive(Debug)]
pub enum FrameOutcome {
    /// The frame was admitted and ran through the full chain.
    Processed(FrameRecord),
    /// The frame arrived faster than the target inference interval and was dropped.
    Throttled,
    /// The session is paused; nothing was processed and no state changed.
    NotRunning(FrameRecord),
}

/// The pipeline orchestrator.
///
/// Owns the tracker, identity resolver, event synthesizer and session state on a single
/// logical worker. Capabilities are injected at construction and invoked synchronously; the
/// worker blocks until each returns.
///
pub struct Pipeline<D, F, P>
where
    D: Detector,
    F: FaceAnalyzer,
    P: PoseGaze,
{
    config: MonitorConfig,
    detector: D,
    faces: F,
    pose_gaze: P,

    tracker: ByteTracker,
    resolver: IdentityResolver,
    synthesizer: EventSynthesizer,

    event_sink: Box<dyn EventSink>,
    frame_sink: Box<dyn FrameSink>,

    session: Option<SessionMetrics>,
    is_running: bool,
    ready: bool,

    last_admitted: Option<Duration>,
    frame_intervals: VecDeque<f64>,
}

impl<D, F, P> Pipeline<D, F, P>
where
    D: Detector,
    F: FaceAnalyzer,
    P: PoseGaze,
{
    pub fn new(config: MonitorConfig, detector: D, faces: F, pose_gaze: P) -> Self {
        let tracker = ByteTracker::new(ByteTrackerOptions {
            track_thresh: config.track_thresh,
            track_buffer: config.track_buffer,
            match_thresh: config.match_thresh,
            min_box_area: config.min_box_area,
        });
        let resolver = IdentityResolver::new(
            Duration::from_secs_f64(config.recognition_interval),
            config.face_rec_threshold,
            config.face_det_threshold,
        );
        let synthesizer = EventSynthesizer::new(
            config.attention_high_threshold,
            config.yaw_thresh,
            config.phone_detection_frames,
        );

        Self {
            config,
            detector,
            faces,
            pose_gaze,
            tracker,
            resolver,
            synthesizer,
            event_sink: Box::new(NoopEventSink),
            frame_sink: Box::new(NoopFrameSink),
            session: None,
            is_running: false,
            ready: false,
            last_admitted: None,
            frame_intervals: VecDeque::with_capacity(FPS_WINDOW),
        }
    }

    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.frame_sink = sink;
        self
    }

    /// Warms up all capabilities. Readiness is an explicit state: `start_session` refuses to
    /// run before initialization succeeded.
    ///
    pub fn initialize(&mut self) -> Result<(), Errors> {
        self.detector
            .warm_up()
            .map_err(|e| Errors::CapabilityUnavailable("detector", e.to_string()))?;
        self.faces
            .warm_up()
            .map_err(|e| Errors::CapabilityUnavailable("faces", e.to_string()))?;
        self.pose_gaze
            .warm_up()
            .map_err(|e| Errors::CapabilityUnavailable("pose_gaze", e.to_string()))?;
        self.ready = true;
        info!("pipeline capabilities warmed up");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Starts a fresh session: resets the tracker, cooldowns and all session metrics.
    ///
    pub fn start_session(&mut self, session_id: &str) -> Result<(), Errors> {
        if !self.ready {
            return Err(Errors::SessionState(
                "pipeline is not initialized".to_string(),
            ));
        }
        if self.session.is_some() {
            return Err(Errors::SessionState(format!(
                "session {} is still active",
                self.session.as_ref().unwrap().session_id
            )));
        }

        self.tracker.reset();
        self.resolver.reset();
        self.session = Some(SessionMetrics::new(session_id, Utc::now()));
        self.is_running = true;
        self.last_admitted = None;
        self.frame_intervals.clear();
        info!("monitoring session started: {session_id}");
        Ok(())
    }

    /// Suspends frame admission without touching tracker state.
    ///
    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn resume(&mut self) {
        if self.session.is_some() {
            self.is_running = true;
        }
    }

    /// Hard-stops the session and compiles the final analytics.
    ///
    pub fn stop_session(&mut self) -> Result<SessionAnalytics, Errors> {
        let session = self
            .session
            .take()
            .ok_or_else(|| Errors::SessionState("no active session".to_string()))?;
        self.is_running = false;

        let analytics = session.compile_analytics(self.observed_fps());
        info!("monitoring session stopped: {}", session.session_id);
        Ok(analytics)
    }

    /// Replaces the known-student catalog snapshot.
    ///
    pub fn update_known_students(&mut self, students: Vec<KnownStudent>) {
        self.resolver.update_known_students(students);
    }

    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    fn observed_fps(&self) -> f32 {
        if self.frame_intervals.is_empty() {
            return 0.0;
        }
        let mean = self.frame_intervals.iter().sum::<f64>() / self.frame_intervals.len() as f64;
        if mean > 0.0 {
            (1.0 / mean) as f32
        } else {
            0.0
        }
    }

    fn wall_clock(start: DateTime<Utc>, ts: Duration) -> DateTime<Utc> {
        start + chrono::Duration::milliseconds(ts.as_millis() as i64)
    }

    fn fatal(&mut self, capability: &'static str, message: String) -> Errors {
        error!("capability {capability} unavailable, stopping session: {message}");
        self.is_running = false;
        Errors::CapabilityUnavailable(capability, message)
    }

    /// Offers one decoded frame to the pipeline.
    ///
    /// Frames arriving faster than the target inference interval are dropped. Recoverable
    /// capability errors are absorbed: the returned record carries an `error` field and the
    /// tracker does not advance. Only a vanished capability or an invalid session state
    /// surface as `Err`.
    ///
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome, Errors> {
        if self.session.is_none() {
            return Err(Errors::SessionState(
                "process_frame before start_session".to_string(),
            ));
        }

        let ts = frame.timestamp();
        let start_time = self.session.as_ref().unwrap().start_time;
        let now = Self::wall_clock(start_time, ts);

        if !self.is_running {
            let session_id = self.session.as_ref().unwrap().session_id.clone();
            return Ok(FrameOutcome::NotRunning(FrameRecord::empty(
                &session_id,
                now,
                Some("session not running".to_string()),
            )));
        }

        // Rate governance on frame timestamps: the most recent frame supersedes older ones,
        // anything inside the inference interval is dropped.
        let interval = 1.0 / self.config.target_fps as f64;
        if let Some(last) = self.last_admitted {
            if ts <= last {
                warn!("non-monotonic frame timestamp {ts:?} after {last:?}");
                return Ok(FrameOutcome::Throttled);
            }
            if (ts - last).as_secs_f64() < interval {
                return Ok(FrameOutcome::Throttled);
            }
            self.frame_intervals.push_back((ts - last).as_secs_f64());
            if self.frame_intervals.len() > FPS_WINDOW {
                self.frame_intervals.pop_front();
            }
        }
        self.last_admitted = Some(ts);

        let started = Instant::now();
        let session_id = self.session.as_ref().unwrap().session_id.clone();

        let frame = if frame.exceeds(self.config.max_frame_width, self.config.max_frame_height) {
            frame.downscale(self.config.max_frame_width, self.config.max_frame_height)
        } else {
            frame.clone()
        };

        // === Detection ===
        let detections = match self.detector.detect(&frame) {
            Ok(d) => d,
            Err(CapabilityError::Unavailable(msg)) => return Err(self.fatal("detector", msg)),
            Err(e) => {
                warn!("detector failed, frame skipped: {e}");
                let mut record = FrameRecord::empty(&session_id, now, Some(e.to_string()));
                record.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                if let Err(e) = self.frame_sink.emit(&record) {
                    error!("frame sink failed: {e:?}");
                }
                return Ok(FrameOutcome::Processed(record));
            }
        };

        // === Tracking ===
        let active = self.tracker.update(&detections.persons);

        // === Phone association: phone -> person -> track ===
        let phone_pairs = phones_near_persons(&detections.persons, &detections.objects);
        let mut phone_track_ids: HashSet<u64> = HashSet::default();
        for (person_idx, _) in &phone_pairs {
            let person_bbox = &detections.persons[*person_idx].bbox;
            for track in &active {
                if BoundingBox::iou(track.bbox(), person_bbox) > TRACK_PERSON_IOU {
                    phone_track_ids.insert(track.track_id());
                }
            }
        }

        // === Per-track processing, ascending track id ===
        let mut entry_events: Vec<Event> = Vec::default();
        let mut attention_events: Vec<Event> = Vec::default();
        let mut posture_events: Vec<Event> = Vec::default();
        let mut phone_events: Vec<Event> = Vec::default();
        let mut track_records: Vec<TrackRecord> = Vec::with_capacity(active.len());
        let mut attention_sum = 0.0_f32;
        let mut attention_seen = 0_usize;

        for mut track in active {
            let mut per_track: Vec<Event> = Vec::default();

            let session = self.session.as_mut().unwrap();
            let (_, created) = session.metrics_for(track.track_id(), now);
            if created {
                let entered = self.synthesizer.entered(&track, now);
                per_track.push(entered.clone());
                entry_events.push(entered);
            }

            // === Identity resolution, throttled by the per-track cooldown ===
            if track.student_id().is_none() {
                match self
                    .resolver
                    .try_recognize(&mut self.faces, &frame, &track, ts)
                {
                    Ok(Some(matched)) => {
                        self.tracker
                            .assign_student_id(track.track_id(), &matched.student_id);
                        track.set_student_id(&matched.student_id);

                        let session = self.session.as_mut().unwrap();
                        let (metrics, _) = session.metrics_for(track.track_id(), now);
                        metrics.student_id = Some(matched.student_id.clone());
                        metrics.student_name = matched.student_name.clone();

                        let identified =
                            self.synthesizer
                                .identified(&track, matched.similarity, now);
                        per_track.push(identified.clone());
                        entry_events.push(identified);
                    }
                    Ok(None) => {}
                    Err(CapabilityError::Unavailable(msg)) => {
                        return Err(self.fatal("faces", msg))
                    }
                    Err(e) => warn!(
                        "recognition failed for track {}: {e}",
                        track.track_id()
                    ),
                }
            }

            // === Pose and gaze analysis over the cropped region ===
            let analysis = match frame.crop(track.bbox()) {
                Some(roi) => match self.pose_gaze.analyze(&roi, Some(track.bbox())) {
                    Ok(a) => a,
                    Err(CapabilityError::Unavailable(msg)) => {
                        return Err(self.fatal("pose_gaze", msg))
                    }
                    Err(e) => {
                        warn!("pose/gaze failed for track {}: {e}", track.track_id());
                        None
                    }
                },
                None => None,
            };
            let analysis = analysis.unwrap_or_default();

            let session = self.session.as_mut().unwrap();
            let (metrics, _) = session.metrics_for(track.track_id(), now);
            metrics.last_seen = now;

            if let Some(gaze) = &analysis.gaze {
                metrics.push_attention(gaze.score, self.config.score_history_limit);
                attention_sum += gaze.score;
                attention_seen += 1;
                if let Some(event) =
                    self.synthesizer
                        .check_attention(&track, metrics, gaze, now)
                {
                    per_track.push(event.clone());
                    attention_events.push(event);
                }
            }

            if let Some(posture) = &analysis.posture {
                metrics.push_posture(posture.score, self.config.score_history_limit);
                if let Some(event) =
                    self.synthesizer
                        .check_posture(&track, metrics, posture, now)
                {
                    per_track.push(event.clone());
                    posture_events.push(event);
                }
            }

            let associated = phone_track_ids.contains(&track.track_id());
            let (phone_detected, phone_event) =
                self.synthesizer
                    .check_phone(&track, metrics, associated, now);
            if let Some(event) = phone_event {
                per_track.push(event.clone());
                phone_events.push(event);
            }

            track_records.push(TrackRecord {
                track_id: track.track_id(),
                bbox: *track.bbox(),
                score: track.score(),
                student_id: metrics.student_id.clone(),
                student_name: metrics.student_name.clone(),
                attention: analysis.gaze,
                posture: analysis.posture,
                phone_detected,
                events: per_track,
            });
        }

        // Cooldowns of removed tracks would otherwise pile up over a long session.
        let session = self.session.as_mut().unwrap();
        let live: HashSet<u64> = track_records.iter().map(|t| t.track_id).collect();
        self.resolver
            .retain_tracks(|id| live.contains(&id) || self.tracker.get(id).is_some());

        // === Aggregation ===
        let average_attention = if attention_seen > 0 {
            attention_sum / attention_seen as f32
        } else {
            0.0
        };
        session.observe_frame(now, average_attention, track_records.len());

        // === Dispatch: entry, attention, posture, phone; frame order is worker order ===
        let mut events = entry_events;
        events.extend(attention_events);
        events.extend(posture_events);
        events.extend(phone_events);

        for event in &events {
            if let Err(e) = self.event_sink.emit(event) {
                error!("event sink failed: {e:?}");
            }
        }

        let record = FrameRecord {
            session_id,
            timestamp: now,
            detections: DetectionSummary {
                persons: detections.persons.len(),
                objects: detections
                    .objects
                    .iter()
                    .map(|o| ObjectRecord {
                        class: o.class,
                        bbox: o.bbox,
                    })
                    .collect(),
            },
            metrics: FrameMetrics {
                student_count: track_records.len(),
                average_attention,
                fps: self.observed_fps(),
            },
            tracks: track_records,
            events,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            error: None,
        };

        if let Err(e) = self.frame_sink.emit(&record) {
            error!("frame sink failed: {e:?}");
        }

        Ok(FrameOutcome::Processed(record))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}
