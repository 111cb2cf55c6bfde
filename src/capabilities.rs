use crate::analysis::TrackAnalysis;
use crate::detection::{Detections, FaceDetection};
use crate::distance::Feature;
use crate::frame::Frame;
use crate::utils::bbox::BoundingBox;
use thiserror::Error;

/// Errors a capability may report.
///
/// `Timeout` and `Failed` are recoverable: the current frame is skipped without advancing the
/// tracker. `Unavailable` is fatal for the session.
///
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("deadline exceeded")]
    Timeout,
    #[error("capability failed: {0}")]
    Failed(#[from] anyhow::Error),
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

/// Person/object detector capability.
///
/// Implementations return only the relevant classes (person, phone, laptop, book) and drop
/// scores below their configured confidence threshold. No ordering is guaranteed.
///
pub trait Detector {
    /// Loads whatever the implementation needs ahead of the first frame.
    fn warm_up(&mut self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Detections, CapabilityError>;
}

/// Face detection and embedding extraction capability.
///
pub trait FaceAnalyzer {
    fn warm_up(&mut self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, CapabilityError>;

    /// Embedding of the largest detected face with a score of at least `det_threshold`.
    ///
    fn extract_feature(
        &mut self,
        frame: &Frame,
        det_threshold: f32,
    ) -> Result<Option<Feature>, CapabilityError> {
        let faces = self.detect_faces(frame)?;
        let largest = faces
            .into_iter()
            .filter(|f| f.score >= det_threshold)
            .max_by(|a, b| a.bbox.area().total_cmp(&b.bbox.area()));
        Ok(largest.and_then(|f| f.feature))
    }
}

/// Posture and gaze analysis capability for a cropped person region.
///
pub trait PoseGaze {
    fn warm_up(&mut self) -> Result<(), CapabilityError> {
        Ok(())
    }

    /// Analyzes the given region. `None` when no face or body is visible in the crop.
    ///
    /// # Parameters
    /// * `frame` - the cropped person region
    /// * `bbox` - the region's position within the full frame, when known
    ///
    fn analyze(
        &mut self,
        frame: &Frame,
        bbox: Option<&BoundingBox>,
    ) -> Result<Option<TrackAnalysis>, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use crate::capabilities::{CapabilityError, FaceAnalyzer};
    use crate::detection::FaceDetection;
    use crate::distance::{Feature, FromVec};
    use crate::frame::{Frame, BYTES_PER_PIXEL};
    use crate::utils::bbox::BoundingBox;
    use std::time::Duration;

    struct TwoFaces;

    impl FaceAnalyzer for TwoFaces {
        fn detect_faces(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceDetection>, CapabilityError> {
            Ok(vec![
                FaceDetection {
                    bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                    score: 0.9,
                    landmarks: None,
                    feature: Some(Feature::from_vec(vec![1.0_f32, 0.0])),
                },
                FaceDetection {
                    bbox: BoundingBox::new(20.0, 0.0, 60.0, 40.0),
                    score: 0.8,
                    landmarks: None,
                    feature: Some(Feature::from_vec(vec![0.0_f32, 1.0])),
                },
            ])
        }
    }

    #[test]
    fn extract_feature_prefers_largest_face() {
        let mut faces = TwoFaces;
        let frame = Frame::new(
            64,
            64,
            vec![0_u8; 64 * 64 * BYTES_PER_PIXEL],
            Duration::ZERO,
        )
        .unwrap();

        let feature = faces.extract_feature(&frame, 0.5).unwrap().unwrap();
        let as_vec: Vec<f32> = Vec::from_vec(&feature);
        assert_eq!(as_vec[1], 1.0);
    }

    #[test]
    fn extract_feature_respects_det_threshold() {
        let mut faces = TwoFaces;
        let frame = Frame::new(
            64,
            64,
            vec![0_u8; 64 * 64 * BYTES_PER_PIXEL],
            Duration::ZERO,
        )
        .unwrap();

        // Only the small high-score face passes the threshold.
        let feature = faces.extract_feature(&frame, 0.85).unwrap().unwrap();
        let as_vec: Vec<f32> = Vec::from_vec(&feature);
        assert_eq!(as_vec[0], 1.0);

        assert!(faces.extract_feature(&frame, 0.95).unwrap().is_none());
    }
}
