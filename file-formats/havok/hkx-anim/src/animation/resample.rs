//! Frame rate conversion for bone and root motion samples
//!
//! Samples are not interpolated. Instead each sample index `i` is assigned a
//! real-valued output frame `i * scale`. Bone tracks and root motion get
//! separate scales because root motion may be stored at a different sample
//! count; its timeline is stretched so that its first and last samples land
//! on the first and last bone frames.

use crate::clip::AnimationClip;

/// Frame spacing of 30 FPS source data played back at 60 FPS
pub const TO_60_FPS_SCALE: f32 = 2.0;

/// Output frame spacing for bone samples and root motion samples
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameScales {
    /// Frames between consecutive bone samples
    pub bone: f32,
    /// Frames between consecutive root motion samples
    pub root_motion: f32,
}

impl FrameScales {
    /// Scales for a clip, treating a clip without root motion as M = N
    pub fn for_clip(bone_frame_scale: f32, clip: &AnimationClip) -> Self {
        let n = clip.sample_count();
        let m = clip.root_motion_sample_count().unwrap_or(n);
        compute_frame_scales(bone_frame_scale, n, m)
    }

    /// Output frame of bone sample `index`
    pub fn bone_frame(&self, index: usize) -> f32 {
        index as f32 * self.bone
    }

    /// Output frame of root motion sample `index`
    pub fn root_motion_frame(&self, index: usize) -> f32 {
        index as f32 * self.root_motion
    }
}

/// Compute bone and root motion frame scales
///
/// * `bone_frame_scale` - frames between bone samples (e.g. 2.0 for 30 to 60 FPS)
/// * `n` - bone sample count
/// * `m` - root motion sample count
///
/// When `m` differs from `n` and `m > 1`, root motion is stretched by
/// `(n - 1) / (m - 1)`. With zero or one root motion sample nothing is
/// stretched and a single sample sits at frame 0.
pub fn compute_frame_scales(bone_frame_scale: f32, n: usize, m: usize) -> FrameScales {
    let root_motion = if m == n || m <= 1 {
        bone_frame_scale
    } else {
        bone_frame_scale * (n.saturating_sub(1)) as f32 / (m - 1) as f32
    };

    FrameScales {
        bone: bone_frame_scale,
        root_motion,
    }
}
