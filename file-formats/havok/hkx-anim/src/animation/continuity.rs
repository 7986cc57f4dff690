//! Quaternion sign continuity for sampled rotation tracks
//!
//! `q` and `-q` describe the same orientation, but a keyframe interpolator
//! working component-wise takes the long way round when consecutive samples
//! have opposite signs. Each track is walked once and every rotation whose
//! dot product with the previously accepted rotation is negative is negated.

use super::basis::{BasisSample, BoneBasisTrack};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Make the rotation sign continuous within each bone track
///
/// Tracks are corrected independently of one another. Returns the total
/// number of negated samples.
pub fn correct_continuity(tracks: &mut [BoneBasisTrack]) -> usize {
    #[cfg(feature = "parallel")]
    let flipped: usize = tracks
        .par_iter_mut()
        .map(|track| correct_track(&mut track.samples))
        .sum();
    #[cfg(not(feature = "parallel"))]
    let flipped: usize = tracks
        .iter_mut()
        .map(|track| correct_track(&mut track.samples))
        .sum();

    log::debug!(
        "Negated {} rotation samples across {} tracks",
        flipped,
        tracks.len()
    );
    flipped
}

/// Make the rotation sign continuous within a single sequence of samples
///
/// Returns the number of negated samples.
pub fn correct_track(samples: &mut [BasisSample]) -> usize {
    let mut flipped = 0;
    let Some((first, rest)) = samples.split_first_mut() else {
        return 0;
    };

    let mut previous = first.rotation;
    for sample in rest {
        if previous.dot(sample.rotation) < 0.0 {
            sample.rotation = -sample.rotation;
            flipped += 1;
        }
        previous = sample.rotation;
    }
    flipped
}

/// Check that no two consecutive rotations have a negative dot product
pub fn is_continuous(samples: &[BasisSample]) -> bool {
    samples
        .windows(2)
        .all(|pair| pair[0].rotation.dot(pair[1].rotation) >= 0.0)
}
