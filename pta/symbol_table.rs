//! Symbol table (C1): interns IR values/objects, allocates ids, answers
//! `value -> id` and `id -> object` queries.
//!
//! Re-architected per spec.md §9's "Singleton symbol table" note: this is
//! an explicit owned context threaded through every caller, not a
//! process-wide singleton.

use std::collections::BTreeMap as Map;

use log::debug;

use crate::pta::error::{PtaError, Result};
use crate::pta::field::Type;
use crate::pta::ids::{IdAllocator, NodeId, BLACK_HOLE, BLK_PTR, CONSTANT_OBJ, NULL_PTR};
use crate::pta::mem_obj::{MemObj, ObjFlags};

/// Opaque correlation id for whatever IR value produced a node. The core
/// does not know or care what a front end's value representation looks
/// like (spec.md §1: the IR front end is an external collaborator); it
/// only needs a stable key to dedupe interning calls and a back-pointer
/// to hand back to callers that ask "what value made this node".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrValueRef(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymKind {
    Value,
    Object,
    Return,
    Vararg,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    alloc: IdAllocator,
    value_ids: Map<IrValueRef, NodeId>,
    object_ids: Map<IrValueRef, NodeId>,
    return_ids: Map<IrValueRef, NodeId>,
    vararg_ids: Map<IrValueRef, NodeId>,
    sym_of: Map<NodeId, SymKind>,
    ir_value_of: Map<NodeId, IrValueRef>,
    objects: Map<NodeId, MemObj>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_null(&self, id: NodeId) -> bool {
        id.is_null()
    }

    pub fn is_blackhole(&self, id: NodeId) -> bool {
        id.is_blackhole()
    }

    pub fn is_constant_obj(&self, id: NodeId) -> bool {
        id.is_constant_obj()
    }

    pub fn is_blk_or_const_obj(&self, id: NodeId) -> bool {
        id.is_blk_or_const_obj()
    }

    /// Interns `v` as a top-level pointer-typed value. Idempotent.
    /// Fails with `InvalidSymbol` if `v` denotes a compile-time-null
    /// constant (those are represented by the reserved `NULL_PTR` id,
    /// never by a fresh value id).
    pub fn intern_value(&mut self, v: IrValueRef, is_null_constant: bool) -> Result<NodeId> {
        if is_null_constant {
            return Err(PtaError::InvalidSymbol(NULL_PTR));
        }
        if let Some(&id) = self.value_ids.get(&v) {
            return Ok(id);
        }
        let id = self.alloc.alloc_value();
        self.value_ids.insert(v, id);
        self.sym_of.insert(id, SymKind::Value);
        self.ir_value_of.insert(id, v);
        debug!("interned value {v:?} as {id}");
        Ok(id)
    }

    /// Interns `v`'s address-taken abstract memory object. Idempotent.
    pub fn intern_object(
        &mut self,
        v: IrValueRef,
        ty: Type,
        flags: ObjFlags,
        field_limit: u32,
    ) -> NodeId {
        if let Some(&id) = self.object_ids.get(&v) {
            return id;
        }
        let id = self.alloc.alloc_obj();
        self.object_ids.insert(v, id);
        self.sym_of.insert(id, SymKind::Object);
        self.ir_value_of.insert(id, v);
        self.objects.insert(id, MemObj::new(id, ty, flags, field_limit));
        debug!("interned object {v:?} as {id}");
        id
    }

    pub fn intern_return(&mut self, f: IrValueRef) -> NodeId {
        if let Some(&id) = self.return_ids.get(&f) {
            return id;
        }
        let id = self.alloc.alloc_ret();
        self.return_ids.insert(f, id);
        self.sym_of.insert(id, SymKind::Return);
        self.ir_value_of.insert(id, f);
        id
    }

    pub fn intern_vararg(&mut self, f: IrValueRef) -> NodeId {
        if let Some(&id) = self.vararg_ids.get(&f) {
            return id;
        }
        let id = self.alloc.alloc_vararg();
        self.vararg_ids.insert(f, id);
        self.sym_of.insert(id, SymKind::Vararg);
        self.ir_value_of.insert(id, f);
        id
    }

    /// Allocates a fresh dummy object with no backing IR value (used for
    /// external-function abstractions and analysis bottoms).
    pub fn create_dummy_obj(&mut self, ty: Type, flags: ObjFlags, field_limit: u32) -> NodeId {
        let id = self.alloc.alloc_dummy_obj();
        self.objects.insert(id, MemObj::new(id, ty, flags, field_limit));
        id
    }

    pub fn sym_of(&self, id: NodeId) -> Option<SymKind> {
        self.sym_of.get(&id).copied()
    }

    pub fn ir_value_of(&self, id: NodeId) -> Result<IrValueRef> {
        self.ir_value_of.get(&id).copied().ok_or(PtaError::NoValue(id))
    }

    pub fn object(&self, id: NodeId) -> Option<&MemObj> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: NodeId) -> Option<&mut MemObj> {
        self.objects.get_mut(&id)
    }

    pub fn register_synthetic_object(&mut self, id: NodeId, obj: MemObj) {
        self.objects.insert(id, obj);
    }

    pub fn has_object(&self, id: NodeId) -> bool {
        self.objects.contains_key(&id) || id.is_blk_or_const_obj()
    }

    pub fn alloc(&self) -> &IdAllocator {
        &self.alloc
    }

    pub fn alloc_mut(&mut self) -> &mut IdAllocator {
        &mut self.alloc
    }

    pub fn stats(&self) -> SymbolTableStats {
        SymbolTableStats {
            values: self.value_ids.len(),
            objects: self.objects.len(),
            returns: self.return_ids.len(),
            varargs: self.vararg_ids.len(),
        }
    }

    /// Reserved-id sentinels; present so `has_object`/`sym_of` callers
    /// never need a special case for them.
    pub fn reserved_ids() -> [NodeId; 3] {
        [BLK_PTR, CONSTANT_OBJ, BLACK_HOLE]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolTableStats {
    pub values: usize,
    pub objects: usize,
    pub returns: usize,
    pub varargs: usize,
}
