//! Coordinate system transformations for FromSoftware animation data
//!
//! Havok data in these games uses a left-handed, Y-up coordinate system:
//! - X-axis: right
//! - Y-axis: up
//! - Z-axis: forward
//!
//! Blender uses a right-handed, Z-up system. Converting between the two is a
//! swap of the Y and Z axes, which is a reflection: positions and scales swap
//! components, and a rotation's axis (a pseudovector) swaps and negates its
//! components while its angle is unchanged.
//!
//! # Examples
//!
//! ```rust
//! use hkx_anim::coordinate::{CoordinateSystem, transform_position};
//! use glam::Vec3;
//!
//! let game_pos = Vec3::new(1.0, 2.0, 3.0); // 2 units up, 3 forward
//! let blender_pos = transform_position(game_pos, CoordinateSystem::Blender);
//! assert_eq!(blender_pos, Vec3::new(1.0, 3.0, 2.0));
//! ```

use crate::transform::Transform;
use glam::{Quat, Vec3};

/// Coordinate systems that decoded animation data can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateSystem {
    /// Game (Havok) coordinates, left-handed: Right=X+, Up=Y+, Forward=Z+
    #[default]
    Game,
    /// Blender coordinate system, right-handed: Right=X+, Forward=Y+, Up=Z+
    Blender,
}

/// Transform a position (or translation) from game coordinates to the target system
pub fn transform_position(game_pos: Vec3, target: CoordinateSystem) -> Vec3 {
    match target {
        CoordinateSystem::Game => game_pos,
        CoordinateSystem::Blender => Vec3::new(game_pos.x, game_pos.z, game_pos.y),
    }
}

/// Transform a rotation from game coordinates to the target system
///
/// ```rust
/// use hkx_anim::coordinate::{CoordinateSystem, transform_quaternion};
/// use glam::Quat;
///
/// let game_rot = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
/// let blender_rot = transform_quaternion(game_rot, CoordinateSystem::Blender);
/// assert_eq!(blender_rot, Quat::from_xyzw(-0.1, -0.3, -0.2, 0.9));
/// ```
pub fn transform_quaternion(game_quat: Quat, target: CoordinateSystem) -> Quat {
    match target {
        CoordinateSystem::Game => game_quat,
        CoordinateSystem::Blender => Quat::from_xyzw(
            -game_quat.x, // game X -> Blender -X
            -game_quat.z, // game Z -> Blender -Y
            -game_quat.y, // game Y -> Blender -Z
            game_quat.w,  // W component unchanged
        ),
    }
}

/// Transform a per-axis scale from game coordinates to the target system
pub fn transform_scale(game_scale: Vec3, target: CoordinateSystem) -> Vec3 {
    // Scale is a diagonal matrix; it permutes like a position without sign changes
    transform_position(game_scale, target)
}

/// Transform a full TRS transform from game coordinates to the target system
pub fn transform_trs(game: &Transform, target: CoordinateSystem) -> Transform {
    Transform::new(
        transform_position(game.translation, target),
        transform_quaternion(game.rotation, target),
        transform_scale(game.scale, target),
    )
}

/// A coordinate transformer that converts every value of a clip or skeleton
/// with the same target system
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransformer {
    target: CoordinateSystem,
}

impl CoordinateTransformer {
    /// Create a new coordinate transformer for the target system
    pub fn new(target: CoordinateSystem) -> Self {
        Self { target }
    }

    /// Target coordinate system
    pub fn target(&self) -> CoordinateSystem {
        self.target
    }

    /// Whether this transformer leaves values unchanged
    pub fn is_identity(&self) -> bool {
        self.target == CoordinateSystem::Game
    }

    /// Transform a single position
    pub fn transform_position(&self, game_pos: Vec3) -> Vec3 {
        transform_position(game_pos, self.target)
    }

    /// Transform a single TRS transform
    pub fn transform_trs(&self, game: &Transform) -> Transform {
        transform_trs(game, self.target)
    }

    /// Transform multiple positions
    pub fn transform_positions(&self, positions: &[Vec3]) -> Vec<Vec3> {
        positions
            .iter()
            .map(|&pos| self.transform_position(pos))
            .collect()
    }

    /// Transform multiple TRS transforms
    pub fn transform_trs_slice(&self, transforms: &[Transform]) -> Vec<Transform> {
        transforms.iter().map(|t| self.transform_trs(t)).collect()
    }
}

/// Utility functions for working with transformation matrices
pub mod matrix {
    use super::CoordinateSystem;
    use glam::{Mat4, Vec4};

    /// Get the change-of-basis matrix from game coordinates to the target system
    pub fn get_transform_matrix(target: CoordinateSystem) -> Mat4 {
        match target {
            CoordinateSystem::Game => Mat4::IDENTITY,
            CoordinateSystem::Blender => Mat4::from_cols(
                Vec4::new(1.0, 0.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 1.0, 0.0),
                Vec4::new(0.0, 1.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 0.0, 1.0),
            ),
        }
    }

    /// Re-express a game-space affine matrix in the target system
    ///
    /// The swap matrix is its own inverse, so this is `P * m * P`.
    pub fn transform_matrix(m: Mat4, target: CoordinateSystem) -> Mat4 {
        let p = get_transform_matrix(target);
        p * m * p
    }
}
