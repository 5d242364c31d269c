//! Typed, copyable identifiers for renderer-owned resources.

use std::marker::PhantomData;

use ulid::Ulid;

/// Marker type for material handles.
///
/// Materials are opaque to the mesh pipeline. Two materials are the same exactly when their handles
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material;

/// A typed handle to a resource owned by the host renderer.
#[repr(C)]
pub struct Handle<T> {
    /// The runtime ID of the resource.
    pub id: Ulid,
    phantom: PhantomData<*const T>,
}

// Manually implement these traits we normally derive because the derive assumes that `T` must also
// implement these traits.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::from_ulid(Ulid::nil())
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("id", &self.id).finish()
    }
}

// The handle never dereferences `T`, it only tags the id.
unsafe impl<T> Send for Handle<T> {}
unsafe impl<T> Sync for Handle<T> {}

impl<T> Handle<T> {
    /// Create a handle with a freshly generated id.
    pub fn new() -> Self {
        Self::from_ulid(Ulid::new())
    }

    /// Create a handle wrapping an existing id.
    pub fn from_ulid(id: Ulid) -> Self {
        Self {
            id,
            phantom: PhantomData,
        }
    }

    /// Whether this is the default, nil handle.
    pub fn is_nil(&self) -> bool {
        self.id.is_nil()
    }
}

#[cfg(feature = "serde")]
impl<T> serde::Serialize for Handle<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for Handle<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ulid::deserialize(deserializer).map(Self::from_ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_id() {
        let a = Handle::<Material>::new();
        let b = Handle::<Material>::new();
        let a2 = Handle::<Material>::from_ulid(a.id);

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert!(Handle::<Material>::default().is_nil());
        assert!(!a.is_nil());
    }
}
