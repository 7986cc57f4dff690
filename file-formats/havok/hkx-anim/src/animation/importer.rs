//! Import orchestration
//!
//! Each clip moves through a fixed sequence of stages:
//!
//! ```text
//! Idle -> SkeletonResolved -> TracksCollected -> BasisComputed
//!      -> ContinuityCorrected -> Resampled -> Emitted
//! ```
//!
//! Any failure moves the clip to `Failed`. Everything up to `Resampled` is
//! pure computation on owned data and may run on worker threads; only the
//! final commit touches the host, and it either installs the whole clip or
//! leaves the host as it was.

use super::basis::{BoneBasisTrack, resolve_basis_samples, validate_track_bones};
use super::continuity::correct_continuity;
use super::keyframes::{OutputClip, build_clip};
use super::resample::{FrameScales, TO_60_FPS_SCALE};
use crate::clip::AnimationClip;
use crate::coordinate::{CoordinateSystem, CoordinateTransformer};
use crate::error::AnimError;
use crate::host::{AnimationHost, action_name, commit_clip};
use crate::skeleton::Skeleton;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Import configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportOptions {
    /// Output frames between consecutive bone samples
    pub bone_frame_scale: f32,
    /// Load every bundled animation instead of asking for one
    pub import_all_animations: bool,
    /// Model the animations belong to, used to name actions
    pub model_name: String,
    /// Coordinate system of the host
    pub coordinate_system: CoordinateSystem,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            bone_frame_scale: TO_60_FPS_SCALE,
            import_all_animations: false,
            model_name: String::new(),
            coordinate_system: CoordinateSystem::Game,
        }
    }
}

impl ImportOptions {
    /// Default options for a model
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Space samples two frames apart (30 to 60 FPS) or one frame apart
    pub fn to_60_fps(mut self, enabled: bool) -> Self {
        self.bone_frame_scale = if enabled { TO_60_FPS_SCALE } else { 1.0 };
        self
    }

    /// Set the bone frame scale directly
    pub fn with_bone_frame_scale(mut self, scale: f32) -> Self {
        self.bone_frame_scale = scale;
        self
    }

    /// Load all bundled animations
    pub fn with_import_all_animations(mut self, import_all: bool) -> Self {
        self.import_all_animations = import_all;
        self
    }

    /// Convert into the given coordinate system
    pub fn with_coordinate_system(mut self, system: CoordinateSystem) -> Self {
        self.coordinate_system = system;
        self
    }
}

/// Progress of a single clip import
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImportStage {
    Idle,
    SkeletonResolved,
    TracksCollected,
    BasisComputed,
    ContinuityCorrected,
    Resampled,
    Emitted,
    Failed,
}

impl ImportStage {
    /// Check if the stage is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Emitted | Self::Failed)
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SkeletonResolved => "skeleton resolved",
            Self::TracksCollected => "tracks collected",
            Self::BasisComputed => "basis computed",
            Self::ContinuityCorrected => "continuity corrected",
            Self::Resampled => "resampled",
            Self::Emitted => "emitted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A clip that could not be imported
///
/// `stage` is the last stage the clip reached before failing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot import animation '{clip}' (after stage: {stage}): {source}")]
pub struct ClipImportError {
    pub clip: String,
    pub stage: ImportStage,
    pub source: AnimError,
}

/// Summary of a successfully installed clip
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedClip {
    /// Clip name
    pub clip: String,
    /// Host action the clip was installed as
    pub action: String,
    /// Number of channels written
    pub channel_count: usize,
    /// Playable frame range
    pub frame_range: (f32, f32),
    /// Rotation samples negated by continuity correction
    pub flipped_rotations: usize,
}

/// Outcome of a batch import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Clips installed in the host, in input order
    pub imported: Vec<ImportedClip>,
    /// Clips that failed, in input order
    pub failed: Vec<ClipImportError>,
    /// The batch stopped early because the cancel flag was raised
    pub cancelled: bool,
}

impl BatchReport {
    /// Check if every attempted clip was imported
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shared flag that stops a batch between clips
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous request
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// One clip on its way through the import stages
///
/// The skeleton must already be in the target coordinate system, see
/// [`AnimationImporter::target_skeleton`].
#[derive(Debug)]
pub struct ClipImport<'a> {
    skeleton: &'a Skeleton,
    options: &'a ImportOptions,
    clip: AnimationClip,
    stage: ImportStage,
    basis: Vec<BoneBasisTrack>,
    flipped_rotations: usize,
    staged: Option<OutputClip>,
}

impl<'a> ClipImport<'a> {
    pub fn new(skeleton: &'a Skeleton, clip: AnimationClip, options: &'a ImportOptions) -> Self {
        Self {
            skeleton,
            options,
            clip,
            stage: ImportStage::Idle,
            basis: Vec::new(),
            flipped_rotations: 0,
            staged: None,
        }
    }

    /// Current stage
    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    /// Name of the clip being imported
    pub fn clip_name(&self) -> &str {
        self.clip.name()
    }

    /// Built output waiting to be committed, once the clip is resampled
    pub fn staged_output(&self) -> Option<&OutputClip> {
        self.staged.as_ref()
    }

    /// Run every stage up to and including `Resampled`
    ///
    /// The built output is kept in a private staging value; the host is not
    /// touched.
    pub fn prepare(&mut self) -> Result<(), ClipImportError> {
        if self.stage != ImportStage::Idle {
            return Err(self.fail(AnimError::Build(format!(
                "clip cannot be prepared from stage '{}'",
                self.stage
            ))));
        }

        if let Err(e) = validate_track_bones(self.skeleton, &self.clip) {
            return Err(self.fail(e));
        }
        self.advance(ImportStage::SkeletonResolved);

        let transformer = CoordinateTransformer::new(self.options.coordinate_system);
        if !transformer.is_identity() {
            self.clip = self.clip.converted(&transformer);
        }
        self.advance(ImportStage::TracksCollected);

        match resolve_basis_samples(self.skeleton, &self.clip) {
            Ok(basis) => self.basis = basis,
            Err(e) => return Err(self.fail(e)),
        }
        self.advance(ImportStage::BasisComputed);

        self.flipped_rotations = correct_continuity(&mut self.basis);
        self.advance(ImportStage::ContinuityCorrected);

        let scales = FrameScales::for_clip(self.options.bone_frame_scale, &self.clip);
        let basis = std::mem::take(&mut self.basis);
        match build_clip(self.clip.name(), &basis, self.clip.root_motion(), scales) {
            Ok(output) => self.staged = Some(output),
            Err(e) => return Err(self.fail(e)),
        }
        self.advance(ImportStage::Resampled);
        Ok(())
    }

    /// Commit the staged output to the host
    pub fn emit<H: AnimationHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<ImportedClip, ClipImportError> {
        let Some(output) = self.staged.take() else {
            return Err(self.fail(AnimError::Build(format!(
                "clip has no staged output at stage '{}'",
                self.stage
            ))));
        };

        let action = action_name(&self.options.model_name, self.clip.name());
        if let Err(e) = commit_clip(host, &action, &output) {
            return Err(self.fail(e));
        }
        self.advance(ImportStage::Emitted);

        Ok(ImportedClip {
            clip: self.clip.name().to_string(),
            action,
            channel_count: output.channels.len(),
            frame_range: output.frame_range,
            flipped_rotations: self.flipped_rotations,
        })
    }

    fn advance(&mut self, next: ImportStage) {
        log::debug!("Clip '{}': {} -> {}", self.clip.name(), self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, source: AnimError) -> ClipImportError {
        let stage = self.stage;
        self.stage = ImportStage::Failed;
        self.basis.clear();
        self.staged = None;
        ClipImportError {
            clip: self.clip.name().to_string(),
            stage,
            source,
        }
    }
}

/// Imports decoded animation clips into an [`AnimationHost`]
#[derive(Debug, Clone, Default)]
pub struct AnimationImporter {
    options: ImportOptions,
    cancel: CancelFlag,
}

impl AnimationImporter {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Handle that stops [`import_batch`](Self::import_batch) between clips
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Skeleton expressed in the configured coordinate system
    pub fn target_skeleton<'s>(&self, skeleton: &'s Skeleton) -> Cow<'s, Skeleton> {
        let transformer = CoordinateTransformer::new(self.options.coordinate_system);
        if transformer.is_identity() {
            Cow::Borrowed(skeleton)
        } else {
            Cow::Owned(skeleton.converted(&transformer))
        }
    }

    /// Import a single clip
    ///
    /// Either the whole clip is installed as a new action or the host is
    /// left unchanged.
    pub fn import_clip<H: AnimationHost + ?Sized>(
        &self,
        host: &mut H,
        skeleton: &Skeleton,
        clip: AnimationClip,
    ) -> Result<ImportedClip, ClipImportError> {
        let skeleton = self.target_skeleton(skeleton);
        let start = Instant::now();

        let mut import = ClipImport::new(&skeleton, clip, &self.options);
        log::info!("Importing animation '{}'", import.clip_name());
        import.prepare()?;
        log::info!(
            "Built animation '{}' in {:?}",
            import.clip_name(),
            start.elapsed()
        );

        let imported = import.emit(host)?;
        log::info!("Created action '{}' in {:?}", imported.action, start.elapsed());
        Ok(imported)
    }

    /// Import several clips with per-clip failure isolation
    ///
    /// A failed clip is reported and skipped; clips imported before it stay
    /// installed. The cancel flag is checked before each clip is committed.
    pub fn import_batch<H: AnimationHost + ?Sized>(
        &self,
        host: &mut H,
        skeleton: &Skeleton,
        clips: Vec<AnimationClip>,
    ) -> BatchReport {
        let skeleton = self.target_skeleton(skeleton);
        let skeleton: &Skeleton = &skeleton;
        let total = clips.len();
        let start = Instant::now();
        let mut report = BatchReport::default();

        log::info!("Importing {} animations", total);

        let prepare = |clip: AnimationClip| {
            let mut import = ClipImport::new(skeleton, clip, &self.options);
            import.prepare().map(|()| import)
        };

        #[cfg(feature = "parallel")]
        let mut pending = {
            let prepared: Vec<_> = clips.into_par_iter().map(prepare).collect();
            prepared.into_iter()
        };
        #[cfg(not(feature = "parallel"))]
        let mut pending = clips.into_iter().map(prepare);

        let mut remaining = total;
        while remaining > 0 {
            if self.cancel.is_cancelled() {
                log::info!("Batch cancelled with {} animations left", remaining);
                report.cancelled = true;
                break;
            }
            let Some(prepared) = pending.next() else {
                break;
            };
            remaining -= 1;

            let result = match prepared {
                Ok(mut import) => import.emit(host),
                Err(e) => Err(e),
            };
            match result {
                Ok(imported) => report.imported.push(imported),
                Err(e) => {
                    log::warn!("{}", e);
                    report.failed.push(e);
                }
            }
        }

        log::info!(
            "Imported {} of {} animations ({} failed) in {:?}",
            report.imported.len(),
            total,
            report.failed.len(),
            start.elapsed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Track;
    use crate::host::MemoryHost;
    use crate::skeleton::SkeletonBuilder;
    use crate::transform::Transform;
    use glam::{Quat, Vec3};

    fn skeleton() -> Skeleton {
        SkeletonBuilder::new()
            .root("root", Transform::IDENTITY)
            .child_of(
                "child",
                "root",
                Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            )
            .build()
            .unwrap()
    }

    fn clip(name: &str, bones: &[&str]) -> AnimationClip {
        let tracks = bones
            .iter()
            .map(|bone| {
                Track::new(
                    *bone,
                    (0..3)
                        .map(|i| Transform::from_rotation(Quat::from_rotation_y(i as f32 * 0.2)))
                        .collect(),
                )
            })
            .collect();
        AnimationClip::new(name, tracks, None).unwrap()
    }

    #[test]
    fn test_options() {
        let options = ImportOptions::default();
        assert_eq!(options.bone_frame_scale, 2.0);
        assert!(!options.import_all_animations);
        assert_eq!(options.coordinate_system, CoordinateSystem::Game);

        let options = ImportOptions::new("c1000").to_60_fps(false);
        assert_eq!(options.model_name, "c1000");
        assert_eq!(options.bone_frame_scale, 1.0);
    }

    #[test]
    fn test_stages_advance() {
        let skeleton = skeleton();
        let options = ImportOptions::new("c1000");
        let mut import = ClipImport::new(&skeleton, clip("a00_0000", &["root"]), &options);
        assert_eq!(import.stage(), ImportStage::Idle);

        import.prepare().unwrap();
        assert_eq!(import.stage(), ImportStage::Resampled);
        assert_eq!(import.staged_output().unwrap().channels.len(), 10);

        let mut host = MemoryHost::new();
        let imported = import.emit(&mut host).unwrap();
        assert_eq!(import.stage(), ImportStage::Emitted);
        assert_eq!(imported.action, "c1000|a00_0000");
        assert!(host.has_action("c1000|a00_0000"));
    }

    #[test]
    fn test_missing_bone_fails_before_resolution() {
        let skeleton = skeleton();
        let options = ImportOptions::default();
        let mut import = ClipImport::new(&skeleton, clip("a00_0001", &["nope"]), &options);

        let err = import.prepare().unwrap_err();
        assert_eq!(err.stage, ImportStage::Idle);
        assert_eq!(
            err.source,
            AnimError::MissingBone {
                bone: "nope".to_string()
            }
        );
        assert_eq!(import.stage(), ImportStage::Failed);
        assert!(import.staged_output().is_none());
        assert!(err.to_string().contains("a00_0001"));
    }

    #[test]
    fn test_emit_requires_prepare() {
        let skeleton = skeleton();
        let options = ImportOptions::default();
        let mut import = ClipImport::new(&skeleton, clip("a00_0002", &["root"]), &options);
        let mut host = MemoryHost::new();

        let err = import.emit(&mut host).unwrap_err();
        assert!(matches!(err.source, AnimError::Build(_)));
        assert!(host.actions().is_empty());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let importer = AnimationImporter::default();
        let flag = importer.cancel_flag();
        assert!(!importer.cancel.is_cancelled());
        flag.cancel();
        assert!(importer.cancel.is_cancelled());
        flag.reset();
        assert!(!importer.cancel.is_cancelled());
    }

    #[test]
    fn test_stage_order() {
        assert!(ImportStage::Idle < ImportStage::Resampled);
        assert!(ImportStage::Emitted.is_terminal());
        assert!(ImportStage::Failed.is_terminal());
        assert!(!ImportStage::BasisComputed.is_terminal());
        assert_eq!(ImportStage::ContinuityCorrected.to_string(), "continuity corrected");
    }
}
