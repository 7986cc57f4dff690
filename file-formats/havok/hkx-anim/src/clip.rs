//! Decoded animation clips
//!
//! An [`AnimationClip`] holds one armature-space [`Track`] per animated bone,
//! all with the same sample count, plus optional root motion that may be
//! sampled at a different rate.
//!
//! Decoded game animations store parent-relative transforms, often as
//! compressed spline curves. Expanding splines to per-frame samples is the
//! decode layer's job; anything that exposes already-expanded frames through
//! [`SampledAnimation`] can be turned into an armature-space clip with
//! [`AnimationClip::from_sampled`].

use crate::coordinate::CoordinateTransformer;
use crate::error::{AnimError, Result};
use crate::skeleton::Skeleton;
use crate::transform::Transform;
use glam::{Mat4, Vec3};
use std::collections::HashSet;

/// Armature-space samples of one bone
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    /// Name of the animated bone
    pub bone: String,
    /// One armature-space transform per sample
    pub samples: Vec<Transform>,
}

impl Track {
    /// Create a track
    pub fn new(bone: impl Into<String>, samples: Vec<Transform>) -> Self {
        Self {
            bone: bone.into(),
            samples,
        }
    }
}

/// A named animation with aligned bone tracks and optional root motion
///
/// Deserialization goes through [`AnimationClip::new`], so a clip read from
/// disk is validated the same way as one built in code.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawAnimationClip", into = "RawAnimationClip")
)]
pub struct AnimationClip {
    name: String,
    tracks: Vec<Track>,
    root_motion: Option<Vec<Vec3>>,
    sample_count: usize,
}

/// Unvalidated serialized form of [`AnimationClip`]
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawAnimationClip {
    name: String,
    tracks: Vec<Track>,
    root_motion: Option<Vec<Vec3>>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawAnimationClip> for AnimationClip {
    type Error = AnimError;

    fn try_from(raw: RawAnimationClip) -> Result<Self> {
        Self::new(raw.name, raw.tracks, raw.root_motion)
    }
}

#[cfg(feature = "serde")]
impl From<AnimationClip> for RawAnimationClip {
    fn from(clip: AnimationClip) -> Self {
        Self {
            name: clip.name,
            tracks: clip.tracks,
            root_motion: clip.root_motion,
        }
    }
}

impl AnimationClip {
    /// Create a clip, validating that it has samples and that all tracks align
    pub fn new(
        name: impl Into<String>,
        tracks: Vec<Track>,
        root_motion: Option<Vec<Vec3>>,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| AnimError::InvalidClip {
            clip: name.clone(),
            reason,
        };

        let Some(first) = tracks.first() else {
            return Err(invalid("clip has no bone tracks".to_string()));
        };
        let sample_count = first.samples.len();
        if sample_count == 0 {
            return Err(invalid("clip has no samples".to_string()));
        }

        let mut seen = HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if track.samples.len() != sample_count {
                return Err(invalid(format!(
                    "track '{}' has {} samples, expected {}",
                    track.bone,
                    track.samples.len(),
                    sample_count
                )));
            }
            if !seen.insert(track.bone.as_str()) {
                return Err(invalid(format!("duplicate track for bone '{}'", track.bone)));
            }
        }

        Ok(Self {
            name,
            tracks,
            root_motion,
            sample_count,
        })
    }

    /// Build an armature-space clip from parent-relative frames
    ///
    /// `local_frames[f][t]` is the transform of `track_bone_names[t]` relative
    /// to its parent at frame `f`. Skeleton bones without a track keep their
    /// rest transform relative to their parent.
    pub fn from_local_frames(
        skeleton: &Skeleton,
        name: impl Into<String>,
        track_bone_names: &[String],
        local_frames: &[Vec<Transform>],
        root_motion: Option<Vec<Vec3>>,
    ) -> Result<Self> {
        let name = name.into();

        let mut track_of_bone = vec![None; skeleton.len()];
        for (track_index, bone_name) in track_bone_names.iter().enumerate() {
            let bone_index = skeleton
                .index_of(bone_name)
                .ok_or_else(|| AnimError::MissingBone {
                    bone: bone_name.clone(),
                })?;
            track_of_bone[bone_index] = Some(track_index);
        }

        let mut samples: Vec<Vec<Transform>> = track_bone_names
            .iter()
            .map(|_| Vec::with_capacity(local_frames.len()))
            .collect();
        let mut armature = vec![Mat4::IDENTITY; skeleton.len()];

        for (frame_index, frame) in local_frames.iter().enumerate() {
            if frame.len() != track_bone_names.len() {
                return Err(AnimError::InvalidClip {
                    clip: name,
                    reason: format!(
                        "frame {frame_index} has {} transforms, expected {}",
                        frame.len(),
                        track_bone_names.len()
                    ),
                });
            }

            for &bone_index in skeleton.topological_order() {
                let bone = &skeleton.bones()[bone_index];
                let local = match track_of_bone[bone_index] {
                    Some(track_index) => frame[track_index].matrix(),
                    None => bone.rest_local.matrix(),
                };
                armature[bone_index] = match bone.parent {
                    Some(parent) => armature[parent] * local,
                    None => local,
                };
                if let Some(track_index) = track_of_bone[bone_index] {
                    samples[track_index].push(Transform::from_matrix(armature[bone_index]));
                }
            }
        }

        let tracks = track_bone_names
            .iter()
            .zip(samples)
            .map(|(bone, samples)| Track::new(bone.clone(), samples))
            .collect();

        Self::new(name, tracks, root_motion)
    }

    /// Build an armature-space clip from any expanded animation source
    pub fn from_sampled<A: SampledAnimation + ?Sized>(
        skeleton: &Skeleton,
        animation: &A,
    ) -> Result<Self> {
        let frames: Vec<Vec<Transform>> = (0..animation.frame_count())
            .map(|frame| animation.local_frame(frame))
            .collect();
        Self::from_local_frames(
            skeleton,
            animation.animation_name(),
            animation.track_bone_names(),
            &frames,
            animation.root_motion(),
        )
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bone tracks in declaration order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track for the given bone
    pub fn track(&self, bone: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    /// Names of all animated bones
    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.bone.as_str())
    }

    /// Number of bone samples (N)
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Root motion translations, if any
    pub fn root_motion(&self) -> Option<&[Vec3]> {
        self.root_motion.as_deref()
    }

    /// Number of root motion samples (M), if the clip has root motion
    pub fn root_motion_sample_count(&self) -> Option<usize> {
        self.root_motion.as_ref().map(Vec::len)
    }

    /// Re-express every sample in another coordinate system
    pub fn converted(&self, transformer: &CoordinateTransformer) -> Self {
        if transformer.is_identity() {
            return self.clone();
        }
        Self {
            name: self.name.clone(),
            tracks: self
                .tracks
                .iter()
                .map(|t| Track::new(t.bone.clone(), transformer.transform_trs_slice(&t.samples)))
                .collect(),
            root_motion: self
                .root_motion
                .as_ref()
                .map(|rm| transformer.transform_positions(rm)),
            sample_count: self.sample_count,
        }
    }
}

/// A decoded animation already expanded to one parent-relative transform per
/// track per frame
pub trait SampledAnimation {
    /// Animation name
    fn animation_name(&self) -> &str;

    /// Bone name of each track, in track order
    fn track_bone_names(&self) -> &[String];

    /// Number of frames
    fn frame_count(&self) -> usize;

    /// Parent-relative transforms of every track at one frame, in track order
    fn local_frame(&self, frame: usize) -> Vec<Transform>;

    /// Root motion translations, if the animation has any
    fn root_motion(&self) -> Option<Vec<Vec3>> {
        None
    }
}

/// Frame-major interleaved transforms, as produced by expanding spline-compressed data
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterleavedAnimation {
    /// Animation name
    pub name: String,
    /// Bone name of each track
    pub track_bone_names: Vec<String>,
    /// `frame_count * track_count` transforms, one frame after another
    pub transforms: Vec<Transform>,
    /// Optional root motion translations
    pub root_motion: Option<Vec<Vec3>>,
}

impl SampledAnimation for InterleavedAnimation {
    fn animation_name(&self) -> &str {
        &self.name
    }

    fn track_bone_names(&self) -> &[String] {
        &self.track_bone_names
    }

    fn frame_count(&self) -> usize {
        if self.track_bone_names.is_empty() {
            0
        } else {
            self.transforms.len() / self.track_bone_names.len()
        }
    }

    fn local_frame(&self, frame: usize) -> Vec<Transform> {
        let tracks = self.track_bone_names.len();
        self.transforms
            .get(frame * tracks..(frame + 1) * tracks)
            .map(<[Transform]>::to_vec)
            .unwrap_or_default()
    }

    fn root_motion(&self) -> Option<Vec<Vec3>> {
        self.root_motion.clone()
    }
}
