//! Nearest-neighbour matching of a live descriptor against enrolled records.

use crate::types::{Descriptor, DimensionMismatch, UserRecord};

/// Default maximum Euclidean distance for a positive identification.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

/// Result of matching a probe descriptor against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Gallery index of the accepted record (if any).
    pub index: Option<usize>,
    /// Distance of the accepted record, or of the closest record when
    /// nothing was accepted. `None` for an empty gallery.
    pub distance: Option<f32>,
}

impl MatchResult {
    fn no_match(closest: Option<f32>) -> Self {
        Self {
            matched: false,
            index: None,
            distance: closest,
        }
    }
}

/// Strategy for comparing a probe descriptor against a gallery of enrolled users.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Descriptor,
        gallery: &[UserRecord],
        threshold: f32,
    ) -> Result<MatchResult, DimensionMismatch>;
}

/// Linear-scan Euclidean matcher.
///
/// A candidate replaces the current best only when its distance is strictly
/// below both the best distance so far and the threshold, so equal distances
/// keep the earliest record and a distance equal to the threshold never
/// matches.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Descriptor,
        gallery: &[UserRecord],
        threshold: f32,
    ) -> Result<MatchResult, DimensionMismatch> {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;
        let mut closest: Option<f32> = None;

        for (i, record) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(&record.descriptor)?;

            if closest.map_or(true, |c| dist < c) {
                closest = Some(dist);
            }
            if dist < best_dist && dist < threshold {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        Ok(match best_idx {
            Some(idx) => MatchResult {
                matched: true,
                index: Some(idx),
                distance: Some(best_dist),
            },
            None => MatchResult::no_match(closest),
        })
    }
}
