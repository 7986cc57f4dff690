//! Animation import pipeline
//!
//! This module turns decoded armature-space clips into host keyframe clips:
//! - Hierarchy resolution into per-bone basis samples
//! - Quaternion sign continuity correction
//! - Frame rate conversion with stretched root motion
//! - Batch keyframe construction
//! - Import orchestration with all-or-nothing commits and batch reporting
//! - Selection between bundled animation entries
//!
//! # Example
//!
//! ```rust
//! use hkx_anim::animation::{AnimationImporter, ImportOptions};
//! use hkx_anim::{AnimationClip, MemoryHost, SkeletonBuilder, Track, Transform};
//! use glam::Vec3;
//!
//! let skeleton = SkeletonBuilder::new()
//!     .root("root", Transform::IDENTITY)
//!     .child_of("child", "root", Transform::from_translation(Vec3::Y))
//!     .build()?;
//! let clip = AnimationClip::new(
//!     "a00_0000",
//!     vec![Track::new("child", vec![Transform::from_translation(Vec3::Y); 4])],
//!     None,
//! )?;
//!
//! let importer = AnimationImporter::new(ImportOptions::new("c1000"));
//! let mut host = MemoryHost::new();
//! let imported = importer.import_clip(&mut host, &skeleton, clip)?;
//! assert_eq!(imported.action, "c1000|a00_0000");
//! assert_eq!(imported.frame_range, (0.0, 6.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod basis;
pub mod continuity;
pub mod importer;
pub mod keyframes;
pub mod resample;
pub mod selection;

pub use basis::{
    BasisSample, BoneBasisTrack, reconstruct_armature, resolve_basis_samples,
    validate_track_bones,
};
pub use continuity::{correct_continuity, correct_track, is_continuous};
pub use importer::{
    AnimationImporter, BatchReport, CancelFlag, ClipImport, ClipImportError, ImportOptions,
    ImportStage, ImportedClip,
};
pub use keyframes::{
    CHANNELS_PER_BONE, Channel, ChannelTarget, Extrapolation, Keyframe, OutputClip,
    ROOT_MOTION_CHANNELS, build_clip,
};
pub use resample::{FrameScales, TO_60_FPS_SCALE, compute_frame_scales};
pub use selection::{ClipCandidate, animation_name_from_entry, select_candidates};
