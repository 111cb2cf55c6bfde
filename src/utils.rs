/// Gated one-to-one assignment over a cost matrix
pub mod assignment;

/// Bounding boxes
pub mod bbox;

/// Kalman filter for bounding box motion
pub mod kalman;
