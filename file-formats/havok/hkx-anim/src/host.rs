//! Host animation system interface
//!
//! Built clips are installed through [`AnimationHost`], a small set of
//! mutations modelled on what an armature object in Blender exposes: an
//! object location, an active action, named actions holding F-curves, and a
//! scene timeline. [`commit_clip`] applies them all-or-nothing.

use crate::animation::keyframes::{Channel, ChannelTarget, OutputClip};
use crate::error::{AnimError, Result};
use glam::Vec3;
use std::collections::BTreeMap;

/// Mutations an animation host must support
pub trait AnimationHost {
    /// Current armature object location
    fn armature_location(&self) -> Vec3;

    /// Set the armature object location
    fn set_armature_location(&mut self, location: Vec3);

    /// Name of the active action, if any
    fn active_action(&self) -> Option<String>;

    /// Make an existing action active, or clear the active action
    fn set_active_action(&mut self, name: Option<&str>) -> Result<()>;

    /// Check whether an action exists
    fn has_action(&self, name: &str) -> bool;

    /// Create an empty action
    ///
    /// Fails if an action with the same name already exists.
    fn new_action(&mut self, name: &str) -> Result<()>;

    /// Add a channel (F-curve) to an action
    fn add_channel(&mut self, action: &str, channel: &Channel) -> Result<()>;

    /// Delete an action and everything in it
    fn remove_action(&mut self, name: &str);

    /// Keep the action alive when nothing uses it
    fn set_fake_user(&mut self, action: &str, fake_user: bool) -> Result<()>;

    /// Set the scene timeline range
    fn set_frame_range(&mut self, start: i32, end: i32);

    /// Jump the scene timeline to a frame
    fn set_current_frame(&mut self, frame: i32);
}

/// Action name for a clip imported onto a model
///
/// Returns `"{model}|{clip}"`, or just the clip name when the model name is empty.
pub fn action_name(model_name: &str, clip_name: &str) -> String {
    if model_name.is_empty() {
        clip_name.to_string()
    } else {
        format!("{model_name}|{clip_name}")
    }
}

/// Host state captured before a commit
#[derive(Debug, Clone, PartialEq)]
struct HostSnapshot {
    location: Vec3,
    active_action: Option<String>,
}

impl HostSnapshot {
    fn capture<H: AnimationHost + ?Sized>(host: &H) -> Self {
        Self {
            location: host.armature_location(),
            active_action: host.active_action(),
        }
    }

    fn restore<H: AnimationHost + ?Sized>(&self, host: &mut H) {
        if let Err(e) = host.set_active_action(self.active_action.as_deref()) {
            log::warn!("Could not restore active action {:?}: {}", self.active_action, e);
        }
        host.set_armature_location(self.location);
    }
}

/// Install a built clip as a new host action
///
/// On success the action is active, kept with a fake user, and the timeline
/// spans the clip range with the current frame at its start. On any failure
/// the action is removed, the previous active action and armature location are
/// restored, and [`AnimError::Build`] is returned.
pub fn commit_clip<H: AnimationHost + ?Sized>(
    host: &mut H,
    action: &str,
    clip: &OutputClip,
) -> Result<()> {
    let snapshot = HostSnapshot::capture(host);

    if let Err(e) = host.new_action(action) {
        // Nothing was created, so an existing action of that name stays intact
        return Err(AnimError::Build(format!(
            "cannot create action '{action}': {e}"
        )));
    }

    let populated = populate(host, action, clip);
    if let Err(e) = populated {
        log::warn!("Rolling back action '{}': {}", action, e);
        host.remove_action(action);
        snapshot.restore(host);
        return Err(match e {
            AnimError::Build(_) => e,
            other => AnimError::Build(format!("action '{action}': {other}")),
        });
    }

    let (start, end) = clip.frame_range;
    host.set_frame_range(start as i32, end as i32);
    host.set_current_frame(start as i32);

    log::debug!(
        "Committed action '{}' with {} channels, frames {}..={}",
        action,
        clip.channels.len(),
        start as i32,
        end as i32
    );
    Ok(())
}

fn populate<H: AnimationHost + ?Sized>(
    host: &mut H,
    action: &str,
    clip: &OutputClip,
) -> Result<()> {
    host.set_active_action(Some(action))?;
    for channel in &clip.channels {
        host.add_channel(action, channel)?;
    }
    host.set_fake_user(action, true)
}

/// An action stored by [`MemoryHost`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostAction {
    /// F-curves in insertion order
    pub channels: Vec<Channel>,
    /// Kept alive without users
    pub fake_user: bool,
}

impl HostAction {
    /// Find a channel by data path and component index
    pub fn channel(&self, data_path: &str, index: usize) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.index == index && c.data_path() == data_path)
    }
}

/// In-memory [`AnimationHost`]
///
/// Root location channels move the armature location to their last keyframe,
/// the way the evaluated object sits after playing through root motion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryHost {
    location: Vec3,
    active_action: Option<String>,
    actions: BTreeMap<String, HostAction>,
    frame_range: (i32, i32),
    current_frame: i32,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// All actions by name
    pub fn actions(&self) -> &BTreeMap<String, HostAction> {
        &self.actions
    }

    /// Look up an action
    pub fn action(&self, name: &str) -> Option<&HostAction> {
        self.actions.get(name)
    }

    /// Timeline range
    pub fn frame_range(&self) -> (i32, i32) {
        self.frame_range
    }

    /// Timeline position
    pub fn current_frame(&self) -> i32 {
        self.current_frame
    }
}

impl AnimationHost for MemoryHost {
    fn armature_location(&self) -> Vec3 {
        self.location
    }

    fn set_armature_location(&mut self, location: Vec3) {
        self.location = location;
    }

    fn active_action(&self) -> Option<String> {
        self.active_action.clone()
    }

    fn set_active_action(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) if !self.actions.contains_key(name) => {
                Err(AnimError::Host(format!("no action named '{name}'")))
            }
            _ => {
                self.active_action = name.map(str::to_string);
                Ok(())
            }
        }
    }

    fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    fn new_action(&mut self, name: &str) -> Result<()> {
        if self.actions.contains_key(name) {
            return Err(AnimError::Host(format!("action '{name}' already exists")));
        }
        self.actions.insert(name.to_string(), HostAction::default());
        Ok(())
    }

    fn add_channel(&mut self, action: &str, channel: &Channel) -> Result<()> {
        let entry = self
            .actions
            .get_mut(action)
            .ok_or_else(|| AnimError::Host(format!("no action named '{action}'")))?;

        if entry
            .channels
            .iter()
            .any(|c| c.target == channel.target && c.index == channel.index)
        {
            return Err(AnimError::Host(format!(
                "action '{action}' already has F-curve {}[{}]",
                channel.data_path(),
                channel.index
            )));
        }
        entry.channels.push(channel.clone());

        if channel.target == ChannelTarget::RootLocation
            && channel.index < 3
            && let Some(last) = channel.keyframes.last()
        {
            self.location[channel.index] = last.value;
        }
        Ok(())
    }

    fn remove_action(&mut self, name: &str) {
        self.actions.remove(name);
        if self.active_action.as_deref() == Some(name) {
            self.active_action = None;
        }
    }

    fn set_fake_user(&mut self, action: &str, fake_user: bool) -> Result<()> {
        let entry = self
            .actions
            .get_mut(action)
            .ok_or_else(|| AnimError::Host(format!("no action named '{action}'")))?;
        entry.fake_user = fake_user;
        Ok(())
    }

    fn set_frame_range(&mut self, start: i32, end: i32) {
        self.frame_range = (start, end);
    }

    fn set_current_frame(&mut self, frame: i32) {
        self.current_frame = frame;
    }
}
