//! Choosing which bundled animations to load
//!
//! A model's animation archive usually bundles many animation entries.
//! Callers describe each entry as a [`ClipCandidate`] with a deferred loader;
//! [`select_candidates`] decides which loaders run, asking a synchronous
//! selector when more than one entry is available and not all of them are
//! wanted.

use super::importer::ImportOptions;
use crate::clip::AnimationClip;
use crate::error::{AnimError, Result};
use std::fmt;

type Loader<'a> = Box<dyn FnOnce(&str) -> Result<AnimationClip> + 'a>;

/// An animation entry that has not been loaded yet
pub struct ClipCandidate<'a> {
    entry_name: String,
    loader: Loader<'a>,
}

impl<'a> ClipCandidate<'a> {
    /// Create a candidate
    ///
    /// The loader receives the animation name derived from the entry name.
    pub fn new(
        entry_name: impl Into<String>,
        loader: impl FnOnce(&str) -> Result<AnimationClip> + 'a,
    ) -> Self {
        Self {
            entry_name: entry_name.into(),
            loader: Box::new(loader),
        }
    }

    /// Archive entry name, e.g. `a00_3000.hkx`
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Animation name derived from the entry name
    pub fn animation_name(&self) -> &str {
        animation_name_from_entry(&self.entry_name)
    }

    /// Run the loader
    pub fn load(self) -> Result<AnimationClip> {
        let name = animation_name_from_entry(&self.entry_name).to_string();
        (self.loader)(&name)
    }

    fn load_or_warn(self) -> Option<AnimationClip> {
        let entry = self.entry_name.clone();
        match self.load() {
            Ok(clip) => Some(clip),
            Err(e) => {
                log::warn!("Error occurred while reading animation entry '{}': {}", entry, e);
                None
            }
        }
    }
}

impl fmt::Debug for ClipCandidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipCandidate")
            .field("entry_name", &self.entry_name)
            .finish_non_exhaustive()
    }
}

/// Animation name of an archive entry: everything before the first `.`
///
/// ```
/// use hkx_anim::animation::selection::animation_name_from_entry;
///
/// assert_eq!(animation_name_from_entry("a00_3000.hkx.dcx"), "a00_3000");
/// assert_eq!(animation_name_from_entry("a00_3000"), "a00_3000");
/// ```
pub fn animation_name_from_entry(entry_name: &str) -> &str {
    entry_name
        .split_once('.')
        .map_or(entry_name, |(stem, _)| stem)
}

/// Load the candidates that should be imported
///
/// - a single candidate is loaded;
/// - with several candidates and `import_all_animations` set, all are loaded;
/// - otherwise `selector` gets the entry names and picks one index, or `None`
///   to load nothing.
///
/// Loader failures are logged as warnings and skipped. An index outside the
/// candidate list fails with [`AnimError::InvalidSelection`].
pub fn select_candidates<F>(
    candidates: Vec<ClipCandidate<'_>>,
    options: &ImportOptions,
    selector: F,
) -> Result<Vec<AnimationClip>>
where
    F: FnOnce(&[&str]) -> Option<usize>,
{
    if candidates.len() <= 1 || options.import_all_animations {
        log::debug!("Loading {} animation entries", candidates.len());
        return Ok(candidates
            .into_iter()
            .filter_map(ClipCandidate::load_or_warn)
            .collect());
    }

    let names: Vec<&str> = candidates.iter().map(ClipCandidate::entry_name).collect();
    let Some(index) = selector(&names) else {
        log::info!("No animation entry selected");
        return Ok(Vec::new());
    };

    let count = candidates.len();
    let chosen = candidates
        .into_iter()
        .nth(index)
        .ok_or(AnimError::InvalidSelection { index, count })?;

    log::debug!("Selected animation entry '{}'", chosen.entry_name());
    Ok(chosen.load_or_warn().into_iter().collect())
}
