//! Resampling and retargeting of decoded Havok skeletal animations
//!
//! Decoded HKX animations store per-bone transforms relative to a skeleton
//! hierarchy, at the game's frame rate and in the game's coordinate system.
//! This crate converts them into dense per-frame, per-bone keyframe clips
//! for a host animation system such as Blender's actions and F-curves,
//! including root motion stretching and quaternion continuity correction.
//!
//! Binary container parsing is out of scope; data enters as a [`Skeleton`]
//! and [`AnimationClip`]s and leaves through an [`AnimationHost`].

pub mod animation;
pub mod clip;
pub mod coordinate;
pub mod error;
pub mod host;
pub mod skeleton;
pub mod transform;

// Re-export common types
pub use animation::{
    AnimationImporter, BatchReport, ImportOptions, OutputClip, build_clip, compute_frame_scales,
    correct_continuity, resolve_basis_samples,
};
pub use clip::{AnimationClip, InterleavedAnimation, SampledAnimation, Track};
pub use coordinate::{CoordinateSystem, CoordinateTransformer};
pub use error::{AnimError, Result};
pub use host::{AnimationHost, MemoryHost};
pub use skeleton::{Bone, ParentRef, Skeleton, SkeletonBuilder};
pub use transform::Transform;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
