//! Opaque handles issued to the UI engine
//!
//! Textures and render targets live in per-device arenas. The engine only ever
//! sees these generational keys; a key outlives its slot safely because a reused
//! slot carries a new generation.

use slotmap::{new_key_type, Key, KeyData};

new_key_type! {
    /// Handle to a texture owned by a render device
    pub struct TextureId;

    /// Handle to a render target owned by a render device
    pub struct RenderTargetId;
}

/// Conversion between a handle and the 64-bit value carried on the wire
pub trait WireHandle: Key {
    /// Raw value for the wire; `0` is reserved for "no handle"
    fn to_wire(self) -> u64 {
        if self.is_null() {
            0
        } else {
            self.data().as_ffi()
        }
    }

    /// Handle for a raw wire value, `None` for `0`
    fn from_wire(raw: u64) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        let key = Self::from(KeyData::from_ffi(raw));
        (!key.is_null()).then_some(key)
    }
}

impl WireHandle for TextureId {}
impl WireHandle for RenderTargetId {}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn zero_is_no_handle() {
        assert_eq!(TextureId::from_wire(0), None);
        assert_eq!(TextureId::null().to_wire(), 0);
    }

    #[test]
    fn wire_value_identifies_slot() {
        let mut arena: SlotMap<TextureId, u32> = SlotMap::with_key();
        let a = arena.insert(1);
        let b = arena.insert(2);

        assert_ne!(a.to_wire(), 0);
        assert_eq!(TextureId::from_wire(a.to_wire()), Some(a));
        assert_eq!(TextureId::from_wire(b.to_wire()), Some(b));
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut arena: SlotMap<TextureId, u32> = SlotMap::with_key();
        let old = arena.insert(1);
        arena.remove(old);
        let new = arena.insert(2);

        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
    }
}
