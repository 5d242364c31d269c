//! Renderer lifecycle errors.

/// Errors returned by [`SkeletonMeshRenderer`][crate::renderer::SkeletonMeshRenderer].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer has not been initialized with a skeleton.
    #[error("renderer used before `initialize`")]
    NotInitialized,
    /// The renderer has been disposed.
    #[error("renderer used after `dispose`")]
    Disposed,
    /// A slot named in the renderer options does not exist.
    #[error("no slot named `{0}` in the skeleton")]
    UnknownSlot(String),
}
