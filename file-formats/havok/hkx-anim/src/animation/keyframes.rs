//! Batch keyframe construction
//!
//! Every bone gets ten scalar channels (location x/y/z, rotation w/x/y/z,
//! scale x/y/z) and root motion gets three location channels. Each channel
//! receives one explicit `(frame, value)` keyframe per input sample, since
//! stretched root motion cannot be represented as a uniform step.

use super::basis::BoneBasisTrack;
use super::resample::FrameScales;
use crate::error::{AnimError, Result};
use glam::Vec3;
use std::collections::HashSet;

/// Number of scalar channels emitted per animated bone
pub const CHANNELS_PER_BONE: usize = 10;

/// Number of scalar channels emitted for root motion
pub const ROOT_MOTION_CHANNELS: usize = 3;

/// Animated property a channel drives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelTarget {
    /// Armature object location (root motion)
    RootLocation,
    /// Pose bone location
    BoneLocation(String),
    /// Pose bone rotation quaternion (index 0 is W)
    BoneRotation(String),
    /// Pose bone scale
    BoneScale(String),
}

impl ChannelTarget {
    /// Blender F-curve data path for this target
    pub fn data_path(&self) -> String {
        match self {
            Self::RootLocation => "location".to_string(),
            Self::BoneLocation(bone) => format!("pose.bones[\"{bone}\"].location"),
            Self::BoneRotation(bone) => format!("pose.bones[\"{bone}\"].rotation_quaternion"),
            Self::BoneScale(bone) => format!("pose.bones[\"{bone}\"].scale"),
        }
    }

    /// Bone this target animates, if any
    pub fn bone(&self) -> Option<&str> {
        match self {
            Self::RootLocation => None,
            Self::BoneLocation(bone) | Self::BoneRotation(bone) | Self::BoneScale(bone) => {
                Some(bone)
            }
        }
    }
}

/// Behavior of a channel outside its authored frame range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Extrapolation {
    /// Hold the first/last value
    Constant,
    /// Repeat the authored range
    #[default]
    Cyclic,
}

/// A single keyframe point
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyframe {
    pub frame: f32,
    pub value: f32,
}

/// One scalar animation curve
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    /// Animated property
    pub target: ChannelTarget,
    /// Component index within the property
    pub index: usize,
    /// Keyframes in increasing frame order
    pub keyframes: Vec<Keyframe>,
    /// Extrapolation beyond the authored range
    pub extrapolation: Extrapolation,
}

impl Channel {
    fn with_capacity(target: ChannelTarget, index: usize, capacity: usize) -> Self {
        Self {
            target,
            index,
            keyframes: Vec::with_capacity(capacity),
            extrapolation: Extrapolation::Cyclic,
        }
    }

    /// Blender F-curve data path of this channel
    pub fn data_path(&self) -> String {
        self.target.data_path()
    }

    /// Frame of the last keyframe
    pub fn last_frame(&self) -> Option<f32> {
        self.keyframes.last().map(|k| k.frame)
    }

    /// Frames of all keyframes
    pub fn frames(&self) -> Vec<f32> {
        self.keyframes.iter().map(|k| k.frame).collect()
    }

    /// Values of all keyframes
    pub fn values(&self) -> Vec<f32> {
        self.keyframes.iter().map(|k| k.value).collect()
    }
}

/// A fully built animation clip ready to hand to the host
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputClip {
    /// Clip name
    pub name: String,
    /// All channels, root motion first
    pub channels: Vec<Channel>,
    /// Playable range `[0, last frame]`
    pub frame_range: (f32, f32),
}

impl OutputClip {
    /// Channels that animate the given bone
    pub fn bone_channels<'a>(&'a self, bone: &'a str) -> impl Iterator<Item = &'a Channel> + 'a {
        self.channels
            .iter()
            .filter(move |c| c.target.bone() == Some(bone))
    }

    /// Root motion channels
    pub fn root_motion_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels
            .iter()
            .filter(|c| c.target == ChannelTarget::RootLocation)
    }

    /// Channel for a target component
    pub fn channel(&self, target: &ChannelTarget, index: usize) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| &c.target == target && c.index == index)
    }
}

/// Build the channels of one clip
///
/// * `bone_tracks` - continuity-corrected basis samples
/// * `root_motion` - optional root motion translations
/// * `scales` - frame spacing for bone and root motion samples
///
/// Fails with [`AnimError::Build`] if the clip name is empty, a bone track is
/// empty or duplicated, or a sample is not finite. Nothing is returned on
/// failure; the partially populated clip is dropped.
pub fn build_clip(
    name: &str,
    bone_tracks: &[BoneBasisTrack],
    root_motion: Option<&[Vec3]>,
    scales: FrameScales,
) -> Result<OutputClip> {
    if name.is_empty() {
        return Err(AnimError::Build("clip name is empty".to_string()));
    }

    let bone_channel_count = bone_tracks.len() * CHANNELS_PER_BONE;
    let root_channel_count = if root_motion.is_some() {
        ROOT_MOTION_CHANNELS
    } else {
        0
    };
    let mut channels = Vec::with_capacity(root_channel_count + bone_channel_count);

    if let Some(root_motion) = root_motion {
        for axis in 0..ROOT_MOTION_CHANNELS {
            let mut channel =
                Channel::with_capacity(ChannelTarget::RootLocation, axis, root_motion.len());
            for (index, translation) in root_motion.iter().enumerate() {
                let value = translation[axis];
                if !value.is_finite() {
                    return Err(AnimError::Build(format!(
                        "root motion sample {index} has non-finite component {axis}"
                    )));
                }
                channel.keyframes.push(Keyframe {
                    frame: scales.root_motion_frame(index),
                    value,
                });
            }
            channels.push(channel);
        }
    }

    let mut seen = HashSet::with_capacity(bone_tracks.len());
    for track in bone_tracks {
        if !seen.insert(track.bone.as_str()) {
            return Err(AnimError::Build(format!(
                "duplicate basis track for bone '{}'",
                track.bone
            )));
        }
        if track.samples.is_empty() {
            return Err(AnimError::Build(format!(
                "basis track for bone '{}' has no samples",
                track.bone
            )));
        }
        channels.extend(bone_channels(track, scales)?);
    }

    let last_frame = channels
        .iter()
        .filter_map(Channel::last_frame)
        .fold(0.0_f32, f32::max);

    log::debug!(
        "Built clip '{}': {} channels, frames 0..={}",
        name,
        channels.len(),
        last_frame
    );

    Ok(OutputClip {
        name: name.to_string(),
        channels,
        frame_range: (0.0, last_frame),
    })
}

fn bone_channels(
    track: &BoneBasisTrack,
    scales: FrameScales,
) -> Result<[Channel; CHANNELS_PER_BONE]> {
    let bone = &track.bone;
    let count = track.samples.len();
    let mut channels: [Channel; CHANNELS_PER_BONE] = std::array::from_fn(|i| {
        let (target, index) = match i {
            0..=2 => (ChannelTarget::BoneLocation(bone.clone()), i),
            3..=6 => (ChannelTarget::BoneRotation(bone.clone()), i - 3),
            _ => (ChannelTarget::BoneScale(bone.clone()), i - 7),
        };
        Channel::with_capacity(target, index, count)
    });

    for (index, sample) in track.samples.iter().enumerate() {
        let t = sample.translation;
        let r = sample.rotation;
        let s = sample.scale;
        let values = [t.x, t.y, t.z, r.w, r.x, r.y, r.z, s.x, s.y, s.z];

        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnimError::Build(format!(
                "bone '{bone}' sample {index} is not finite"
            )));
        }

        let frame = scales.bone_frame(index);
        for (channel, value) in channels.iter_mut().zip(values) {
            channel.keyframes.push(Keyframe { frame, value });
        }
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::resample::compute_frame_scales;
    use crate::transform::Transform;
    use glam::Quat;
    use pretty_assertions::assert_eq;

    fn basis_track(bone: &str, count: usize) -> BoneBasisTrack {
        BoneBasisTrack {
            bone: bone.to_string(),
            samples: (0..count)
                .map(|i| {
                    Transform::new(
                        Vec3::new(i as f32, 0.0, 0.0),
                        Quat::from_rotation_z(i as f32 * 0.1),
                        Vec3::ONE,
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_ten_channels_per_bone() {
        let tracks = vec![basis_track("child", 4)];
        let scales = compute_frame_scales(2.0, 4, 4);
        let clip = build_clip("c1000|a00_0000", &tracks, None, scales).unwrap();

        assert_eq!(clip.channels.len(), 10);
        assert_eq!(clip.bone_channels("child").count(), 10);
        for channel in &clip.channels {
            assert_eq!(channel.frames(), vec![0.0, 2.0, 4.0, 6.0]);
            assert_eq!(channel.extrapolation, Extrapolation::Cyclic);
        }
        assert_eq!(clip.frame_range, (0.0, 6.0));
    }

    #[test]
    fn test_channel_layout() {
        let tracks = vec![basis_track("b", 2)];
        let clip = build_clip("clip", &tracks, None, compute_frame_scales(1.0, 2, 2)).unwrap();

        let layout: Vec<(String, usize)> = clip
            .channels
            .iter()
            .map(|c| (c.data_path(), c.index))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("pose.bones[\"b\"].location".to_string(), 0),
                ("pose.bones[\"b\"].location".to_string(), 1),
                ("pose.bones[\"b\"].location".to_string(), 2),
                ("pose.bones[\"b\"].rotation_quaternion".to_string(), 0),
                ("pose.bones[\"b\"].rotation_quaternion".to_string(), 1),
                ("pose.bones[\"b\"].rotation_quaternion".to_string(), 2),
                ("pose.bones[\"b\"].rotation_quaternion".to_string(), 3),
                ("pose.bones[\"b\"].scale".to_string(), 0),
                ("pose.bones[\"b\"].scale".to_string(), 1),
                ("pose.bones[\"b\"].scale".to_string(), 2),
            ]
        );

        // Rotation index 0 is W
        let w = clip
            .channel(&ChannelTarget::BoneRotation("b".to_string()), 0)
            .unwrap();
        assert_eq!(w.keyframes[0].value, 1.0);
    }

    #[test]
    fn test_root_motion_channels_come_first_and_stretch() {
        let tracks = vec![basis_track("root", 5)];
        let root_motion = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 2.0)];
        let scales = compute_frame_scales(2.0, 5, root_motion.len());
        let clip = build_clip("clip", &tracks, Some(&root_motion), scales).unwrap();

        assert_eq!(clip.channels.len(), 13);
        let root: Vec<&Channel> = clip.root_motion_channels().collect();
        assert_eq!(root.len(), 3);
        assert_eq!(clip.channels[0].target, ChannelTarget::RootLocation);
        assert_eq!(root[0].frames(), vec![0.0, 8.0]);
        assert_eq!(root[2].values(), vec![0.0, 2.0]);
        assert_eq!(clip.frame_range, (0.0, 8.0));
    }

    #[test]
    fn test_range_uses_longest_channel() {
        let tracks = vec![basis_track("root", 3)];
        let root_motion = vec![Vec3::ZERO; 5];
        // Unstretched scales put root motion beyond the last bone frame
        let scales = FrameScales {
            bone: 1.0,
            root_motion: 1.0,
        };
        let clip = build_clip("clip", &tracks, Some(&root_motion), scales).unwrap();
        assert_eq!(clip.frame_range, (0.0, 4.0));
    }

    #[test]
    fn test_build_errors() {
        let scales = compute_frame_scales(1.0, 2, 2);
        assert!(matches!(
            build_clip("", &[basis_track("a", 2)], None, scales),
            Err(AnimError::Build(_))
        ));
        assert!(matches!(
            build_clip("clip", &[basis_track("a", 0)], None, scales),
            Err(AnimError::Build(_))
        ));
        assert!(matches!(
            build_clip("clip", &[basis_track("a", 2), basis_track("a", 2)], None, scales),
            Err(AnimError::Build(_))
        ));

        let mut bad = basis_track("a", 2);
        bad.samples[1].translation.x = f32::NAN;
        assert!(matches!(
            build_clip("clip", &[bad], None, scales),
            Err(AnimError::Build(_))
        ));

        let root_motion = vec![Vec3::new(f32::INFINITY, 0.0, 0.0)];
        assert!(matches!(
            build_clip("clip", &[basis_track("a", 2)], Some(&root_motion), scales),
            Err(AnimError::Build(_))
        ));
    }
}
