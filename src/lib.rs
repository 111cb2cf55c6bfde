//!
//! # Classwatch
//!
//! The purpose of the crate is to provide the core of a real-time classroom perception pipeline:
//! a single fixed camera observes a room, and at a bounded inference rate the pipeline reports
//! who is present, where every person is, whether they are attentive, and which notable events
//! happened.
//!
//! The crate deliberately owns only the perception core. Transport surfaces (HTTP, WebSocket,
//! image decoding), persistence, enrollment and the underlying detection/embedding/pose models
//! live behind narrow capability traits ([capabilities]) and sink traits ([sinks]); any
//! implementation satisfying the contracts is acceptable, and the bundled [testing] doubles are
//! enough to run the whole pipeline deterministically.
//!
//! The processing chain per admitted frame is: object detection, ByteTrack-style multi-object
//! tracking with Kalman prediction and cascaded association ([trackers::byte]), face identity
//! resolution against a known-embedding catalog ([identity]), posture/attention analysis
//! ([analysis]), per-track event synthesis ([events]) and session-scoped aggregation
//! ([session]), all orchestrated by [pipeline::Pipeline].
//!
//! ## Performance
//!
//! To keep the calculations performant the crate uses:
//! * [rayon](https://docs.rs/rayon/latest/rayon/) - catalog-wide similarity scans are parallelized;
//! * [nalgebra](https://nalgebra.org/) - fast linear algebra library for the Kalman filter.
//!
//! The tracker, event synthesizer and aggregator run on a single logical worker that owns all
//! mutable session state; capabilities are invoked synchronously from that worker.

/// Posture and attention classification: states, reports, and the scoring policy.
///
pub mod analysis;

/// Capability traits the core consumes - detector, face analyzer, pose/gaze - and their error type.
///
pub mod capabilities;

/// Pipeline configuration surface with the recognized options and defaults.
///
pub mod config;

/// Detection records, object classes and phone-to-person association.
///
pub mod detection;

/// Holds auxiliary functions that calculate distances and similarities between two features.
///
pub mod distance;

/// Domain events and the per-track finite state machine that synthesizes them.
///
pub mod events;

/// Decoded frame buffers, cropping/downscaling, and the frame source trait.
///
pub mod frame;

/// Face identity resolution with per-track cooldowns against a known-student catalog.
///
pub mod identity;

/// The orchestrator: rate governance, per-frame flow, dispatch and session control.
///
pub mod pipeline;

pub mod prelude;

/// Per-track and per-session metrics with final analytics compilation.
///
pub mod session;

/// Outbound sink traits, in-memory doubles and the channel-backed dispatcher.
///
pub mod sinks;

/// Deterministic capability doubles and synthetic data generators used in tests and demos.
///
pub mod testing;

/// Multi-object tracker implementations.
///
pub mod trackers;

/// Bounding boxes, the Kalman filter and gated Hungarian assignment.
///
pub mod utils;

use thiserror::Error;

/// Errors
#[derive(Error, Debug, Clone)]
pub enum Errors {
    /// The frame buffer does not describe a valid image.
    #[error("Frame buffer is invalid: {0}.")]
    DecodeError(String),
    /// A capability exceeded the per-frame deadline. The frame is skipped without advancing state.
    ///
    #[error("Capability {0} exceeded the frame deadline.")]
    CapabilityTimeout(&'static str),
    /// A capability reported a recoverable error. The frame is skipped without advancing state.
    ///
    #[error("Capability {0} failed: {1}.")]
    CapabilityFailure(&'static str, String),
    /// A capability is gone for good. Fatal for the session.
    ///
    #[error("Capability {0} is unavailable: {1}.")]
    CapabilityUnavailable(&'static str, String),
    /// The requested operation is not valid for the current session state.
    ///
    #[error("Invalid for the current session state: {0}.")]
    SessionState(String),
}

#[cfg(test)]
const EPS: f32 = 0.00001;
