/// ByteTrack-style tracker with Kalman motion and cascaded association
///
pub mod byte;
