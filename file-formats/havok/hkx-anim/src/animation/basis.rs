//! Hierarchy resolution from armature-space tracks to per-bone basis samples
//!
//! A basis sample is what a pose bone's local transform must be so that,
//! applied on top of its rest pose and its parent's current transform, the
//! bone lands on the armature-space transform of the track:
//!
//! ```text
//! bone_armature = parent_armature * rest_local * basis
//! basis         = rest_local^-1 * parent_armature^-1 * bone_armature
//! ```

use crate::clip::AnimationClip;
use crate::error::{AnimError, Result};
use crate::skeleton::{BindPoseCache, Skeleton};
use crate::transform::Transform;
use glam::Mat4;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Bone transform relative to its rest pose and its parent's current transform
pub type BasisSample = Transform;

/// Basis samples of one bone, one per animation sample
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneBasisTrack {
    /// Bone name
    pub bone: String,
    /// One basis sample per animation sample
    pub samples: Vec<BasisSample>,
}

/// Where a parent bone gets its current armature transform from
#[derive(Debug, Clone, Copy)]
enum ParentSource {
    /// Nearest animated ancestor's track, followed by the rest chain below it
    Animated { track: usize, chain: Mat4 },
    /// No animated ancestor: the parent's rest armature transform
    Rest(Mat4),
}

impl ParentSource {
    fn armature(&self, clip: &AnimationClip, sample: usize) -> Mat4 {
        match *self {
            Self::Animated { track, chain } => {
                clip.tracks()[track].samples[sample].matrix() * chain
            }
            Self::Rest(matrix) => matrix,
        }
    }
}

/// Check that every track of a clip names a skeleton bone
///
/// Returns the skeleton index of each track in track order.
pub fn validate_track_bones(skeleton: &Skeleton, clip: &AnimationClip) -> Result<Vec<usize>> {
    clip.tracks()
        .iter()
        .map(|track| {
            skeleton
                .index_of(&track.bone)
                .ok_or_else(|| AnimError::MissingBone {
                    bone: track.bone.clone(),
                })
        })
        .collect()
}

/// Compute basis samples for every animated bone of a clip
///
/// All track names are checked before any sample is resolved; a name missing
/// from the skeleton fails with [`AnimError::MissingBone`]. Output tracks are
/// ordered by skeleton bone index.
pub fn resolve_basis_samples(
    skeleton: &Skeleton,
    clip: &AnimationClip,
) -> Result<Vec<BoneBasisTrack>> {
    let track_bones = validate_track_bones(skeleton, clip)?;

    let mut track_of_bone = vec![None; skeleton.len()];
    for (track_index, &bone_index) in track_bones.iter().enumerate() {
        track_of_bone[bone_index] = Some(track_index);
    }

    let cache = skeleton.bind_pose_cache();

    let mut jobs: Vec<(usize, usize)> = track_bones
        .iter()
        .enumerate()
        .map(|(track_index, &bone_index)| (bone_index, track_index))
        .collect();
    jobs.sort_by_key(|&(bone_index, _)| bone_index);

    // Siblings share their parent's inverse armature transform for each sample
    let mut parents: Vec<usize> = jobs
        .iter()
        .filter_map(|&(bone_index, _)| skeleton.bones()[bone_index].parent)
        .collect();
    parents.sort_unstable();
    parents.dedup();

    log::debug!(
        "Resolving {} bone tracks ({} parents) x {} samples for clip '{}'",
        jobs.len(),
        parents.len(),
        clip.sample_count(),
        clip.name()
    );

    let invert = |&parent: &usize| {
        let source = parent_source(&cache, &track_of_bone, parent);
        let inverses: Vec<Mat4> = (0..clip.sample_count())
            .map(|sample| source.armature(clip, sample).inverse())
            .collect();
        (parent, inverses)
    };

    #[cfg(feature = "parallel")]
    let parent_inverses: HashMap<usize, Vec<Mat4>> = parents.par_iter().map(invert).collect();
    #[cfg(not(feature = "parallel"))]
    let parent_inverses: HashMap<usize, Vec<Mat4>> = parents.iter().map(invert).collect();

    let resolve = |&(bone_index, track_index): &(usize, usize)| {
        let parent_inv = skeleton.bones()[bone_index]
            .parent
            .and_then(|parent| parent_inverses.get(&parent))
            .map(Vec::as_slice);
        resolve_bone(&cache, clip, bone_index, track_index, parent_inv)
    };

    #[cfg(feature = "parallel")]
    let tracks: Vec<BoneBasisTrack> = jobs.par_iter().map(resolve).collect();
    #[cfg(not(feature = "parallel"))]
    let tracks: Vec<BoneBasisTrack> = jobs.iter().map(resolve).collect();

    Ok(tracks)
}

fn parent_source(
    cache: &BindPoseCache<'_>,
    track_of_bone: &[Option<usize>],
    parent: usize,
) -> ParentSource {
    let skeleton = cache.skeleton();

    // Unanimated bones sit at rest relative to their parent, so the parent's
    // current transform is the nearest animated ancestor times the rest chain
    let mut chain = Mat4::IDENTITY;
    let mut current = parent;
    loop {
        if let Some(track) = track_of_bone[current] {
            return ParentSource::Animated { track, chain };
        }
        chain = cache.rest_local(current) * chain;
        match skeleton.bones()[current].parent {
            Some(next) => current = next,
            None => return ParentSource::Rest(cache.rest_armature(parent)),
        }
    }
}

fn resolve_bone(
    cache: &BindPoseCache<'_>,
    clip: &AnimationClip,
    bone_index: usize,
    track_index: usize,
    parent_inverses: Option<&[Mat4]>,
) -> BoneBasisTrack {
    let track = &clip.tracks()[track_index];
    let rest_local_inv = cache.rest_local_inv(bone_index);

    let samples = track
        .samples
        .iter()
        .enumerate()
        .map(|(sample, armature)| {
            let parent_inv = parent_inverses.map_or(Mat4::IDENTITY, |inverses| inverses[sample]);
            Transform::from_matrix(rest_local_inv * parent_inv * armature.matrix())
        })
        .collect();

    BoneBasisTrack {
        bone: track.bone.clone(),
        samples,
    }
}

/// Rebuild armature-space transforms from basis samples
///
/// This is the inverse of [`resolve_basis_samples`]: each bone's armature
/// transform is `parent_armature * rest_local * basis`, with unanimated bones
/// held at rest. Output tracks follow the order of `tracks`.
pub fn reconstruct_armature(
    skeleton: &Skeleton,
    tracks: &[BoneBasisTrack],
) -> Result<Vec<BoneBasisTrack>> {
    let mut track_of_bone = vec![None; skeleton.len()];
    for (track_index, track) in tracks.iter().enumerate() {
        let bone_index = skeleton
            .index_of(&track.bone)
            .ok_or_else(|| AnimError::MissingBone {
                bone: track.bone.clone(),
            })?;
        track_of_bone[bone_index] = Some(track_index);
    }

    let sample_count = tracks.first().map_or(0, |t| t.samples.len());
    let cache = skeleton.bind_pose_cache();
    let mut armature = vec![Mat4::IDENTITY; skeleton.len()];
    let mut output: Vec<BoneBasisTrack> = tracks
        .iter()
        .map(|t| BoneBasisTrack {
            bone: t.bone.clone(),
            samples: Vec::with_capacity(sample_count),
        })
        .collect();

    for sample in 0..sample_count {
        for &bone_index in skeleton.topological_order() {
            let parent = match skeleton.bones()[bone_index].parent {
                Some(parent) => armature[parent],
                None => Mat4::IDENTITY,
            };
            let local = cache.rest_local(bone_index);
            armature[bone_index] = match track_of_bone[bone_index] {
                Some(track_index) => {
                    let basis = tracks[track_index]
                        .samples
                        .get(sample)
                        .map_or(Mat4::IDENTITY, Transform::matrix);
                    let matrix = parent * local * basis;
                    output[track_index]
                        .samples
                        .push(Transform::from_matrix(matrix));
                    matrix
                }
                None => parent * local,
            };
        }
    }

    Ok(output)
}
