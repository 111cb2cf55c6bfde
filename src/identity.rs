use crate::capabilities::{CapabilityError, FaceAnalyzer};
use crate::distance::{similarity, Feature};
use crate::frame::Frame;
use crate::trackers::byte::track::Track;
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A catalog entry: one enrolled student with a unit-norm face embedding.
///
#[derive(Clone, Debug)]
pub struct KnownStudent {
    pub student_id: String,
    pub student_name: Option<String>,
    pub feature: Feature,
}

/// A successful catalog match.
///
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityMatch {
    pub student_id: String,
    pub student_name: Option<String>,
    pub similarity: f32,
}

/// Finds the catalog entry with the highest similarity strictly above `threshold`.
///
/// The scan runs in parallel; equal similarities resolve to the earliest catalog entry.
///
pub fn match_feature(
    query: &Feature,
    catalog: &[KnownStudent],
    threshold: f32,
) -> Option<IdentityMatch> {
    catalog
        .par_iter()
        .enumerate()
        .map(|(idx, known)| (idx, similarity(query, &known.feature)))
        .filter(|(_, sim)| *sim > threshold)
        .reduce_with(|best, candidate| {
            let (best_idx, best_sim) = best;
            let (idx, sim) = candidate;
            if sim > best_sim || (sim == best_sim && idx < best_idx) {
                candidate
            } else {
                best
            }
        })
        .map(|(idx, sim)| IdentityMatch {
            student_id: catalog[idx].student_id.clone(),
            student_name: catalog[idx].student_name.clone(),
            similarity: sim,
        })
}

/// Resolves track identities by matching face embeddings from tracked regions against the
/// known-student catalog, throttled per track by a recognition cooldown.
///
/// The catalog is an immutable snapshot swapped wholesale by `update_known_students`; the
/// resolver never mutates entries. Cooldowns use frame timestamps, so a replayed stream
/// resolves identically.
///
#[derive(Debug)]
pub struct IdentityResolver {
    catalog: Arc<Vec<KnownStudent>>,
    cooldown_until: HashMap<u64, Duration>,
    recognition_interval: Duration,
    rec_threshold: f32,
    det_threshold: f32,
}

impl IdentityResolver {
    pub fn new(recognition_interval: Duration, rec_threshold: f32, det_threshold: f32) -> Self {
        Self {
            catalog: Arc::new(Vec::default()),
            cooldown_until: HashMap::default(),
            recognition_interval,
            rec_threshold,
            det_threshold,
        }
    }

    /// Replaces the catalog snapshot.
    ///
    pub fn update_known_students(&mut self, students: Vec<KnownStudent>) {
        debug!("known-student catalog updated: {} entries", students.len());
        self.catalog = Arc::new(students);
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    /// Clears all per-track cooldowns (on session start).
    ///
    pub fn reset(&mut self) {
        self.cooldown_until.clear();
    }

    /// Drops cooldowns of tracks that no longer exist.
    ///
    pub fn retain_tracks(&mut self, alive: impl Fn(u64) -> bool) {
        self.cooldown_until.retain(|track_id, _| alive(*track_id));
    }

    /// Attempts to recognize the person behind `track` from the face visible in its region.
    ///
    /// Skips silently when the track already carries an identity or its cooldown has not
    /// elapsed. Every attempt, successful or not, re-arms the cooldown.
    ///
    /// # Parameters
    /// * `faces` - the face capability to run on the cropped region
    /// * `frame` - the full frame the track lives in
    /// * `track` - the track to resolve
    /// * `now` - the frame timestamp
    ///
    pub fn try_recognize<F: FaceAnalyzer>(
        &mut self,
        faces: &mut F,
        frame: &Frame,
        track: &Track,
        now: Duration,
    ) -> Result<Option<IdentityMatch>, CapabilityError> {
        if track.student_id().is_some() {
            return Ok(None);
        }

        if let Some(until) = self.cooldown_until.get(&track.track_id()) {
            if now < *until {
                return Ok(None);
            }
        }
        self.cooldown_until
            .insert(track.track_id(), now + self.recognition_interval);

        if self.catalog.is_empty() {
            return Ok(None);
        }

        let roi = match frame.crop(track.bbox()) {
            Some(roi) => roi,
            None => return Ok(None),
        };

        let feature = match faces.extract_feature(&roi, self.det_threshold)? {
            Some(feature) => feature,
            None => return Ok(None),
        };

        let matched = match_feature(&feature, &self.catalog, self.rec_threshold);
        if let Some(m) = &matched {
            debug!(
                "track={} recognized as {} (similarity {:.3})",
                track.track_id(),
                m.student_id,
                m.similarity
            );
        }
        Ok(matched)
    }
}
