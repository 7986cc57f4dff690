use thiserror::Error;

/// Error types for animation resolution, keyframe building and import
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    /// An animation track references a bone that the skeleton does not have
    #[error("Missing bone: animation track '{bone}' has no matching skeleton bone")]
    MissingBone { bone: String },

    /// Matrix decomposition produced a degenerate or non-finite rotation
    #[error("Degenerate transform: {0}")]
    DegenerateTransform(String),

    /// Failure while populating an output clip
    #[error("Build error: {0}")]
    Build(String),

    /// Skeleton failed validation (duplicate names, dangling parents, cycles)
    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    /// Animation clip failed validation (no samples, misaligned tracks)
    #[error("Invalid clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },

    /// The host animation system rejected a mutation
    #[error("Host error: {0}")]
    Host(String),

    /// A candidate selection callback picked an index that does not exist
    #[error("Invalid selection: index {index} out of {count} candidates")]
    InvalidSelection { index: usize, count: usize },
}

/// Result type using AnimError
pub type Result<T> = std::result::Result<T, AnimError>;
