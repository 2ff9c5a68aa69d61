//! Node-id allocation.
//!
//! The symbol table hands out `NodeId`s from kind-tagged disjoint ranges
//! so that "what kind is this id" is a constant-time bit test, per the
//! id-allocation contract in spec.md C1.

use derive_more::{Display, From, Into};

const KIND_BITS: u32 = 4;
const INDEX_BITS: u32 = 32 - KIND_BITS;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Fallback stride for `gep_object_id` when a base carries no usable
/// field limit (limit `0`, meaning "field-insensitive" — callers are not
/// expected to mint more than one live gep-object id per base in that
/// case, but the allocator still needs *some* stride to stay injective).
pub const GEP_FIELD_CAP: u32 = 1 << 16;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdKind {
    Reserved = 0,
    Value = 1,
    Obj = 2,
    GepVal = 3,
    GepObj = 4,
    FiObj = 5,
    Ret = 6,
    Vararg = 7,
    DummyVal = 8,
    DummyObj = 9,
    CloneGepObj = 10,
    CloneFiObj = 11,
    CloneDummyObj = 12,
}

/// A stable, process-wide unique node identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[display(fmt = "{}", _0)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn kind_tag(self) -> IdKind {
        match self.0 >> INDEX_BITS {
            0 => IdKind::Reserved,
            1 => IdKind::Value,
            2 => IdKind::Obj,
            3 => IdKind::GepVal,
            4 => IdKind::GepObj,
            5 => IdKind::FiObj,
            6 => IdKind::Ret,
            7 => IdKind::Vararg,
            8 => IdKind::DummyVal,
            9 => IdKind::DummyObj,
            10 => IdKind::CloneGepObj,
            11 => IdKind::CloneFiObj,
            12 => IdKind::CloneDummyObj,
            other => unreachable!("corrupt node id tag {other}"),
        }
    }

    pub fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    fn make(kind: IdKind, index: u32) -> NodeId {
        debug_assert!(index <= INDEX_MASK, "id index overflowed its reserved range");
        NodeId(((kind as u32) << INDEX_BITS) | index)
    }
}

pub const NULL_PTR: NodeId = NodeId(0);
pub const BLK_PTR: NodeId = NodeId(1);
pub const CONSTANT_OBJ: NodeId = NodeId(2);
pub const BLACK_HOLE: NodeId = NodeId(3);
const FIRST_RESERVED_FREE: u32 = 4;

impl NodeId {
    pub fn is_null(self) -> bool {
        self == NULL_PTR
    }

    pub fn is_blackhole(self) -> bool {
        self == BLACK_HOLE
    }

    pub fn is_constant_obj(self) -> bool {
        self == CONSTANT_OBJ
    }

    pub fn is_blk_or_const_obj(self) -> bool {
        self == BLK_PTR || self == CONSTANT_OBJ
    }
}

/// Bump allocator, one counter per id kind. Deterministic: the same
/// sequence of allocation calls over two runs produces identical ids
/// (spec.md §8, "Deterministic ids").
#[derive(Debug)]
pub struct IdAllocator {
    next_value: u32,
    next_obj: u32,
    next_gep_val: u32,
    next_ret: u32,
    next_vararg: u32,
    next_dummy_val: u32,
    next_dummy_obj: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator {
            next_value: FIRST_RESERVED_FREE,
            next_obj: 0,
            next_gep_val: 0,
            next_ret: 0,
            next_vararg: 0,
            next_dummy_val: 0,
            next_dummy_obj: 0,
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_value(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::Value, self.next_value);
        self.next_value += 1;
        id
    }

    pub fn alloc_obj(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::Obj, self.next_obj);
        self.next_obj += 1;
        id
    }

    pub fn alloc_gep_val(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::GepVal, self.next_gep_val);
        self.next_gep_val += 1;
        id
    }

    pub fn alloc_ret(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::Ret, self.next_ret);
        self.next_ret += 1;
        id
    }

    pub fn alloc_vararg(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::Vararg, self.next_vararg);
        self.next_vararg += 1;
        id
    }

    pub fn alloc_dummy_val(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::DummyVal, self.next_dummy_val);
        self.next_dummy_val += 1;
        id
    }

    pub fn alloc_dummy_obj(&mut self) -> NodeId {
        let id = NodeId::make(IdKind::DummyObj, self.next_dummy_obj);
        self.next_dummy_obj += 1;
        id
    }

    /// Deterministic: depends only on `(base, field_index, max_field_limit)`,
    /// never on allocation order, per the id-allocation contract in
    /// spec.md §4.1's `allocate_gep_object_id(base, field_index,
    /// max_field_limit)`.
    ///
    /// `max_field_limit` sets the per-base stride: a base with a small
    /// configured field limit (the common case -- most structs have a
    /// handful of fields) packs densely, so the 28-bit index space holds
    /// many more distinct bases than a fixed 2^16 stride would allow.
    /// `field_index` must already be reduced modulo the limit by the
    /// caller (`field::modulus_offset`); this function only asserts that
    /// invariant, it does not enforce it.
    pub fn gep_object_id(
        &self,
        base: NodeId,
        field_index: u32,
        max_field_limit: u32,
        clone: bool,
    ) -> NodeId {
        let stride = if max_field_limit == 0 { GEP_FIELD_CAP } else { max_field_limit } as u64;
        debug_assert!(
            (field_index as u64) < stride,
            "field index exceeds the base's configured field limit"
        );
        let index64 = base.index() as u64 * stride + field_index as u64;
        debug_assert!(
            index64 <= INDEX_MASK as u64,
            "gep object id index overflowed its reserved range; base has too many allocated \
             objects for its configured field limit"
        );
        let index = (index64 & INDEX_MASK as u64) as u32;
        let kind = if clone { IdKind::CloneGepObj } else { IdKind::GepObj };
        NodeId::make(kind, index)
    }

    /// Deterministic: depends only on `base`.
    pub fn fi_object_id(&self, base: NodeId, clone: bool) -> NodeId {
        let kind = if clone { IdKind::CloneFiObj } else { IdKind::FiObj };
        NodeId::make(kind, base.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_stable() {
        assert_eq!(NULL_PTR.0, 0);
        assert_eq!(BLK_PTR.0, 1);
        assert_eq!(CONSTANT_OBJ.0, 2);
        assert_eq!(BLACK_HOLE.0, 3);
        assert!(BLK_PTR.is_blk_or_const_obj());
        assert!(CONSTANT_OBJ.is_blk_or_const_obj());
        assert!(!NULL_PTR.is_blk_or_const_obj());
    }

    #[test]
    fn kind_tag_roundtrips() {
        let mut alloc = IdAllocator::new();
        let v = alloc.alloc_value();
        let o = alloc.alloc_obj();
        assert_eq!(v.kind_tag(), IdKind::Value);
        assert_eq!(o.kind_tag(), IdKind::Obj);
    }

    #[test]
    fn gep_object_id_is_deterministic_in_base_and_field() {
        let alloc = IdAllocator::new();
        let base = NodeId::make(IdKind::Obj, 7);
        let a = alloc.gep_object_id(base, 3, 8, false);
        let b = alloc.gep_object_id(base, 3, 8, false);
        assert_eq!(a, b);
        let c = alloc.gep_object_id(base, 4, 8, false);
        assert_ne!(a, c);
    }

    #[test]
    fn gep_object_id_does_not_collide_across_distant_bases_with_a_small_limit() {
        let alloc = IdAllocator::new();
        // A realistic field limit (4) keeps the per-base stride small, so
        // bases far apart in index space still map to distinct, in-range
        // gep-object ids instead of overflowing `u32` arithmetic.
        let base_a = NodeId::make(IdKind::Obj, 1_000_000);
        let base_b = NodeId::make(IdKind::Obj, 1_000_001);
        let a = alloc.gep_object_id(base_a, 3, 4, false);
        let b = alloc.gep_object_id(base_b, 3, 4, false);
        assert_ne!(a, b);
    }
}
