pub use crate::analysis::{
    AttentionState, AttentionThresholds, GazeReport, PostureReport, PostureState, TrackAnalysis,
};
pub use crate::capabilities::{CapabilityError, Detector, FaceAnalyzer, PoseGaze};
pub use crate::config::MonitorConfig;
pub use crate::detection::{Detection, Detections, FaceDetection, ObjectClass};
pub use crate::distance::{Feature, FromVec};
pub use crate::events::{Event, EventKind};
pub use crate::frame::{Frame, FrameSource};
pub use crate::identity::{IdentityResolver, KnownStudent};
pub use crate::pipeline::{FrameOutcome, FrameRecord, Pipeline, TrackRecord};
pub use crate::session::{SessionAnalytics, SessionMetrics, TrackMetrics};
pub use crate::sinks::{EventSink, FrameSink, MemoryEventSink, MemoryFrameSink, NoopEventSink, NoopFrameSink};
pub use crate::trackers::byte::track::{Track, TrackState};
pub use crate::trackers::byte::{ByteTracker, ByteTrackerOptions};
pub use crate::utils::bbox::BoundingBox;
