//! Memory object model (C3): one record per abstract memory object
//! (stack/heap/global/function/constant/dummy), its size, field-sensitivity
//! flag, and max-field-offset.

use derive_more::Display;

use crate::pta::field::Type;
use crate::pta::ids::NodeId;

/// Mirrors SVF's `MemObj` flag set (`include/MemoryModel/SVFVariables.h`).
/// A hand-rolled bitset rather than a `bitflags!`-style macro: the set is
/// small and fixed, and nothing else in this crate needs the macro.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjFlags(u32);

impl ObjFlags {
    pub const FUNCTION: ObjFlags = ObjFlags(1 << 0);
    pub const GLOBAL: ObjFlags = ObjFlags(1 << 1);
    pub const STATIC: ObjFlags = ObjFlags(1 << 2);
    pub const STACK: ObjFlags = ObjFlags(1 << 3);
    pub const HEAP: ObjFlags = ObjFlags(1 << 4);
    pub const VAR_STRUCT: ObjFlags = ObjFlags(1 << 5);
    pub const VAR_ARRAY: ObjFlags = ObjFlags(1 << 6);
    pub const CONST_STRUCT: ObjFlags = ObjFlags(1 << 7);
    pub const CONST_ARRAY: ObjFlags = ObjFlags(1 << 8);
    pub const CONST_GLOBAL: ObjFlags = ObjFlags(1 << 9);
    pub const CONST_DATA: ObjFlags = ObjFlags(1 << 10);
    pub const HAS_PTR: ObjFlags = ObjFlags(1 << 11);

    pub const fn empty() -> ObjFlags {
        ObjFlags(0)
    }

    pub fn contains(self, other: ObjFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ObjFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for ObjFlags {
    type Output = ObjFlags;
    fn bitor(self, rhs: ObjFlags) -> ObjFlags {
        ObjFlags(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "obj({id}, {ty:?})")]
pub struct MemObj {
    pub id: NodeId,
    pub ty: Type,
    pub flags: ObjFlags,
    max_field_offset_limit: u32,
    configured_field_limit: u32,
    pub num_elements: u32,
    /// Set when `retype` has already recorded one bitcast. SVF's heuristic
    /// keeps the *most recent* cast as the object's "true" type, which is
    /// unsound in general; spec.md §9 asks us to preserve the heuristic but
    /// surface a warning when it fires more than once.
    retyped_once: bool,
}

impl MemObj {
    pub fn new(id: NodeId, ty: Type, flags: ObjFlags, configured_field_limit: u32) -> MemObj {
        // conservative default; callers that know the real flattened
        // element count should overwrite it via `set_num_elements`.
        let num_elements = 1;
        let mut flags = flags;
        if flags.contains(ObjFlags::HEAP) || flags.contains(ObjFlags::STATIC) {
            // spec.md §3: heap and static objects are conservatively
            // modeled as pointer-bearing.
            flags.insert(ObjFlags::HAS_PTR);
        }
        MemObj {
            id,
            ty,
            flags,
            max_field_offset_limit: configured_field_limit,
            configured_field_limit,
            num_elements,
            retyped_once: false,
        }
    }

    pub fn set_num_elements(&mut self, n: u32) {
        self.num_elements = n;
    }

    pub fn max_field_offset_limit(&self) -> u32 {
        self.max_field_offset_limit
    }

    pub fn is_field_insensitive(&self) -> bool {
        self.max_field_offset_limit == 0
    }

    /// Idempotent. Triggered by the solver on a variant-gep flow or a
    /// non-zero-offset gep edge inside a PWC SCC (spec.md §4.3, §4.7).
    pub fn set_field_insensitive(&mut self) {
        self.max_field_offset_limit = 0;
    }

    /// Restores the object's configured field limit. Monotonic transition
    /// is enforced by the solver, not by this method -- `MemObj` itself is
    /// a plain data record and does not know about solver state.
    pub fn set_field_sensitive(&mut self) {
        self.max_field_offset_limit = self.configured_field_limit;
    }

    pub fn has_flag(&self, f: ObjFlags) -> bool {
        self.flags.contains(f)
    }

    pub fn is_function(&self) -> bool {
        self.has_flag(ObjFlags::FUNCTION)
    }

    pub fn is_heap(&self) -> bool {
        self.has_flag(ObjFlags::HEAP)
    }

    pub fn is_static(&self) -> bool {
        self.has_flag(ObjFlags::STATIC)
    }

    /// True if any flattened field is pointer-typed; conservatively true
    /// for heap/static objects regardless of their declared type (spec.md
    /// §3).
    pub fn has_ptr_obj(&self) -> bool {
        self.flags.contains(ObjFlags::HAS_PTR)
    }

    /// Records a bitcast observed after allocation as this object's "true"
    /// type. SVF keeps only the most recent cast; multiple casts are a
    /// heuristic, not an invariant, so the second and later calls return
    /// `true` to tell the caller to log a warning.
    pub fn retype(&mut self, ty: Type) -> bool {
        let warn = self.retyped_once;
        self.ty = ty;
        self.retyped_once = true;
        warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(flags: ObjFlags) -> MemObj {
        MemObj::new(NodeId(100), Type::Simple("i32".into()), flags, 4)
    }

    #[test]
    fn field_insensitive_iff_limit_zero() {
        let mut o = obj(ObjFlags::STACK);
        assert!(!o.is_field_insensitive());
        o.set_field_insensitive();
        assert!(o.is_field_insensitive());
        assert_eq!(o.max_field_offset_limit(), 0);
        o.set_field_sensitive();
        assert!(!o.is_field_insensitive());
        assert_eq!(o.max_field_offset_limit(), 4);
    }

    #[test]
    fn heap_and_static_are_conservatively_pointer_bearing() {
        let heap = obj(ObjFlags::HEAP);
        assert!(heap.has_ptr_obj());
        let stack = obj(ObjFlags::STACK);
        assert!(!stack.has_ptr_obj());
    }

    #[test]
    fn retype_warns_from_the_second_cast_onward() {
        let mut o = obj(ObjFlags::HEAP);
        assert!(!o.retype(Type::Simple("i64".into())));
        assert!(o.retype(Type::Simple("i8".into())));
    }
}
