//! Statement graph / IR (C4): nodes are variables, edges are typed
//! statements, indexed per edge kind for bounded-time incident-edge
//! access.
//!
//! Re-architected per spec.md §9: a tagged variant with a small common
//! header rather than a deep node-subclass hierarchy, and an arena of
//! edges addressed by index rather than raw pointers between nodes.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use crate::pta::error::{PtaError, Result};
use crate::pta::field::AccessPath;
use crate::pta::ids::{IdAllocator, NodeId, BLACK_HOLE};
use crate::pta::symbol_table::IrValueRef;

/// The five solver-relevant statement kinds plus the "for completeness"
/// ones spec.md §4.4 lists alongside them. `Gep`'s variant-vs-normal
/// distinction and access path live in [`StmtLabel::Gep`], not in the
/// kind tag -- a gep is one statement shape with an attribute, per
/// spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StmtKind {
    Addr,
    Copy,
    Gep,
    Load,
    Store,
    Phi,
    Select,
    Cmp,
    BinaryOp,
    UnaryOp,
    Branch,
    Call,
    Ret,
    ThreadFork,
    ThreadJoin,
}

impl StmtKind {
    pub const ALL: [StmtKind; 15] = [
        StmtKind::Addr,
        StmtKind::Copy,
        StmtKind::Gep,
        StmtKind::Load,
        StmtKind::Store,
        StmtKind::Phi,
        StmtKind::Select,
        StmtKind::Cmp,
        StmtKind::BinaryOp,
        StmtKind::UnaryOp,
        StmtKind::Branch,
        StmtKind::Call,
        StmtKind::Ret,
        StmtKind::ThreadFork,
        StmtKind::ThreadJoin,
    ];
}

/// Disambiguates otherwise-equal `(src, dst, kind)` triples (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StmtLabel {
    None,
    /// Call-site id shared by `Call`/`Ret`/`ThreadFork`/`ThreadJoin`.
    CallSite(u32),
    /// ICFG node disambiguating e.g. two `Store`s with the same operands
    /// at different program points.
    IcfgNode(u32),
    Gep { ap: AccessPath, is_variant: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Statement {
    pub src: NodeId,
    pub dst: NodeId,
    pub kind: StmtKind,
    pub label: StmtLabel,
}

pub type EdgeId = usize;

/// Tagged variant in place of a node-subclass hierarchy (spec.md §9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Val,
    Obj,
    GepVal { base: NodeId, ap: AccessPath },
    GepObj { base: NodeId, field_index: u32 },
    FiObj { base: NodeId },
    Ret,
    Vararg,
    DummyVal,
    DummyObj,
    CloneGepObj { base: NodeId, field_index: u32 },
    CloneFiObj { base: NodeId },
    CloneDummyObj { base: NodeId },
}

impl NodeKind {
    pub fn is_dummy(&self) -> bool {
        matches!(
            self,
            NodeKind::DummyVal | NodeKind::DummyObj | NodeKind::CloneDummyObj { .. }
        )
    }

    pub fn base_of_gep_obj(&self) -> Option<NodeId> {
        match self {
            NodeKind::GepObj { base, .. } | NodeKind::CloneGepObj { base, .. } => Some(*base),
            _ => None,
        }
    }

    pub fn base_of_fi_obj(&self) -> Option<NodeId> {
        match self {
            NodeKind::FiObj { base } | NodeKind::CloneFiObj { base } => Some(*base),
            _ => None,
        }
    }

    pub fn field_index(&self) -> Option<u32> {
        match self {
            NodeKind::GepObj { field_index, .. } | NodeKind::CloneGepObj { field_index, .. } => {
                Some(*field_index)
            }
            _ => None,
        }
    }

    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            NodeKind::Obj
                | NodeKind::GepObj { .. }
                | NodeKind::FiObj { .. }
                | NodeKind::DummyObj
                | NodeKind::CloneGepObj { .. }
                | NodeKind::CloneFiObj { .. }
                | NodeKind::CloneDummyObj { .. }
        )
    }
}

#[derive(Clone, Debug)]
pub struct VarNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub is_top_level_ptr: bool,
    pub is_address_taken_ptr: bool,
    incoming: Map<StmtKind, Set<EdgeId>>,
    outgoing: Map<StmtKind, Set<EdgeId>>,
}

impl VarNode {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        let is_address_taken_ptr = kind.is_object_like();
        let is_top_level_ptr = !is_address_taken_ptr;
        VarNode {
            id,
            kind,
            is_top_level_ptr,
            is_address_taken_ptr,
            incoming: Map::new(),
            outgoing: Map::new(),
        }
    }

    pub fn incoming(&self, kind: StmtKind) -> impl Iterator<Item = EdgeId> + '_ {
        self.incoming.get(&kind).into_iter().flatten().copied()
    }

    pub fn outgoing(&self, kind: StmtKind) -> impl Iterator<Item = EdgeId> + '_ {
        self.outgoing.get(&kind).into_iter().flatten().copied()
    }
}

/// The statement graph (C4): an arena of statements plus per-node,
/// per-kind incident-edge indices, and the gep/fi node caches spec.md
/// §4.4 requires.
#[derive(Debug, Default)]
pub struct StmtGraph {
    nodes: Map<NodeId, VarNode>,
    edges: Vec<Statement>,
    edge_lookup: Map<Statement, EdgeId>,
    gep_val_cache: Map<(u32, NodeId, AccessPath), NodeId>,
    gep_obj_cache: Map<(NodeId, u32), NodeId>,
    fi_obj_cache: Map<NodeId, NodeId>,
    ir_value_of: Map<NodeId, IrValueRef>,
    /// spec.md §4.4: "adding an incoming edge to BLACK_HOLE fails with
    /// InvalidEdge unless the client opted into black-hole modeling."
    pub allow_blackhole_incoming: bool,
}

impl StmtGraph {
    pub fn new(allow_blackhole_incoming: bool) -> Self {
        StmtGraph { allow_blackhole_incoming, ..Default::default() }
    }

    pub fn ensure_node(&mut self, id: NodeId, kind: NodeKind) -> &VarNode {
        self.nodes.entry(id).or_insert_with(|| VarNode::new(id, kind));
        &self.nodes[&id]
    }

    pub fn ensure_node_with_value(&mut self, id: NodeId, kind: NodeKind, v: IrValueRef) -> &VarNode {
        self.ir_value_of.insert(id, v);
        self.ensure_node(id, kind)
    }

    pub fn node(&self, id: NodeId) -> Option<&VarNode> {
        self.nodes.get(&id)
    }

    pub fn ir_value_of(&self, id: NodeId) -> Result<IrValueRef> {
        self.ir_value_of.get(&id).copied().ok_or(PtaError::NoValue(id))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edge(&self, e: EdgeId) -> &Statement {
        &self.edges[e]
    }

    pub fn get_incoming(&self, node: NodeId, kind: StmtKind) -> Vec<EdgeId> {
        self.nodes
            .get(&node)
            .map(|n| n.incoming(kind).collect())
            .unwrap_or_default()
    }

    pub fn get_outgoing(&self, node: NodeId, kind: StmtKind) -> Vec<EdgeId> {
        self.nodes
            .get(&node)
            .map(|n| n.outgoing(kind).collect())
            .unwrap_or_default()
    }

    /// Idempotent: a structurally equal `(src, dst, kind, label)` add
    /// returns the existing edge id rather than duplicating it.
    fn add_stmt(&mut self, stmt: Statement) -> Result<EdgeId> {
        if stmt.dst == BLACK_HOLE && !self.allow_blackhole_incoming {
            return Err(PtaError::InvalidEdge(format!(
                "incoming {:?} edge to BLACK_HOLE requires handle_blackhole",
                stmt.kind
            )));
        }
        if let Some(&id) = self.edge_lookup.get(&stmt) {
            return Ok(id);
        }
        let id = self.edges.len();
        self.nodes.entry(stmt.src).or_insert_with(|| VarNode::new(stmt.src, NodeKind::DummyVal));
        self.nodes.entry(stmt.dst).or_insert_with(|| VarNode::new(stmt.dst, NodeKind::DummyVal));
        self.nodes.get_mut(&stmt.src).unwrap().outgoing.entry(stmt.kind).or_default().insert(id);
        self.nodes.get_mut(&stmt.dst).unwrap().incoming.entry(stmt.kind).or_default().insert(id);
        self.edge_lookup.insert(stmt.clone(), id);
        self.edges.push(stmt);
        Ok(id)
    }

    pub fn add_addr(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Addr, label: StmtLabel::None })
    }

    pub fn add_copy(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Copy, label: StmtLabel::None })
    }

    pub fn add_load(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Load, label: StmtLabel::None })
    }

    pub fn add_store(&mut self, rhs: NodeId, lhs: NodeId, label: u32) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: rhs,
            dst: lhs,
            kind: StmtKind::Store,
            label: StmtLabel::IcfgNode(label),
        })
    }

    pub fn add_normal_gep(&mut self, rhs: NodeId, lhs: NodeId, ap: AccessPath) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: rhs,
            dst: lhs,
            kind: StmtKind::Gep,
            label: StmtLabel::Gep { ap, is_variant: false },
        })
    }

    pub fn add_variant_gep(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: rhs,
            dst: lhs,
            kind: StmtKind::Gep,
            label: StmtLabel::Gep { ap: AccessPath::zero(), is_variant: true },
        })
    }

    /// Dispatches to [`Self::add_normal_gep`] or [`Self::add_variant_gep`]
    /// depending on `is_constant_gep`, for API parity with spec.md §4.4's
    /// generic `add_gep`.
    pub fn add_gep(
        &mut self,
        rhs: NodeId,
        lhs: NodeId,
        ap: AccessPath,
        is_constant_gep: bool,
    ) -> Result<EdgeId> {
        if is_constant_gep {
            self.add_normal_gep(rhs, lhs, ap)
        } else {
            self.add_variant_gep(rhs, lhs)
        }
    }

    pub fn add_call(&mut self, arg: NodeId, formal: NodeId, callsite: u32) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: arg,
            dst: formal,
            kind: StmtKind::Call,
            label: StmtLabel::CallSite(callsite),
        })
    }

    pub fn add_ret(&mut self, formalret: NodeId, actualret: NodeId, callsite: u32) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: formalret,
            dst: actualret,
            kind: StmtKind::Ret,
            label: StmtLabel::CallSite(callsite),
        })
    }

    pub fn add_thread_fork(&mut self, routine_arg: NodeId, formal: NodeId, forksite: u32) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: routine_arg,
            dst: formal,
            kind: StmtKind::ThreadFork,
            label: StmtLabel::CallSite(forksite),
        })
    }

    pub fn add_thread_join(&mut self, formalret: NodeId, actualret: NodeId, joinsite: u32) -> Result<EdgeId> {
        self.add_stmt(Statement {
            src: formalret,
            dst: actualret,
            kind: StmtKind::ThreadJoin,
            label: StmtLabel::CallSite(joinsite),
        })
    }

    pub fn add_phi(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Phi, label: StmtLabel::None })
    }

    pub fn add_select(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Select, label: StmtLabel::None })
    }

    pub fn add_cmp(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Cmp, label: StmtLabel::None })
    }

    pub fn add_binary_op(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::BinaryOp, label: StmtLabel::None })
    }

    pub fn add_unary_op(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::UnaryOp, label: StmtLabel::None })
    }

    pub fn add_branch(&mut self, rhs: NodeId, lhs: NodeId) -> Result<EdgeId> {
        self.add_stmt(Statement { src: rhs, dst: lhs, kind: StmtKind::Branch, label: StmtLabel::None })
    }

    /// Allocates or reuses a `GepVal` keyed by `(context_inst, base, ap)`,
    /// deduplicating temporaries generated for e.g. memcpy-like lowerings
    /// (spec.md §4.4).
    pub fn get_gep_val_node(
        &mut self,
        alloc: &mut IdAllocator,
        context_inst: u32,
        base_val: NodeId,
        ap: AccessPath,
    ) -> NodeId {
        let key = (context_inst, base_val, ap);
        if let Some(&id) = self.gep_val_cache.get(&key) {
            return id;
        }
        let id = alloc.alloc_gep_val();
        self.gep_val_cache.insert(key, id);
        self.ensure_node(id, NodeKind::GepVal { base: base_val, ap });
        id
    }

    /// Allocates or reuses a `GepObj` keyed by `(base, modulus_offset(base, ap))`.
    pub fn get_gep_obj_node(
        &mut self,
        alloc: &IdAllocator,
        base: NodeId,
        field_index: u32,
        max_field_limit: u32,
    ) -> NodeId {
        let key = (base, field_index);
        if let Some(&id) = self.gep_obj_cache.get(&key) {
            return id;
        }
        let id = alloc.gep_object_id(base, field_index, max_field_limit, false);
        self.gep_obj_cache.insert(key, id);
        self.ensure_node(id, NodeKind::GepObj { base, field_index });
        id
    }

    /// Returns/creates the single field-insensitive child of `base`.
    pub fn get_fi_obj_node(&mut self, alloc: &IdAllocator, base: NodeId) -> NodeId {
        if let Some(&id) = self.fi_obj_cache.get(&base) {
            return id;
        }
        let id = alloc.fi_object_id(base, false);
        self.fi_obj_cache.insert(base, id);
        self.ensure_node(id, NodeKind::FiObj { base });
        id
    }

    pub fn edges_of_kind(&self, kind: StmtKind) -> impl Iterator<Item = (EdgeId, &Statement)> {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.kind == kind)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_the_same_edge_twice_is_idempotent() {
        let mut g = StmtGraph::new(false);
        let a = NodeId(10);
        let b = NodeId(11);
        let e1 = g.add_copy(a, b).unwrap();
        let e2 = g.add_copy(a, b).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn edges_are_indexed_by_kind_on_both_endpoints() {
        let mut g = StmtGraph::new(false);
        let a = NodeId(1);
        let b = NodeId(2);
        g.add_addr(a, b).unwrap();
        g.add_copy(a, b).unwrap();
        assert_eq!(g.get_outgoing(a, StmtKind::Addr).len(), 1);
        assert_eq!(g.get_outgoing(a, StmtKind::Copy).len(), 1);
        assert_eq!(g.get_incoming(b, StmtKind::Addr).len(), 1);
        assert!(g.get_outgoing(a, StmtKind::Load).is_empty());
    }

    #[test]
    fn store_label_disambiguates_equal_operand_pairs() {
        let mut g = StmtGraph::new(false);
        let a = NodeId(1);
        let b = NodeId(2);
        let e1 = g.add_store(a, b, 0).unwrap();
        let e2 = g.add_store(a, b, 1).unwrap();
        assert_ne!(e1, e2);
        assert_eq!(g.get_outgoing(a, StmtKind::Store).len(), 2);
    }

    #[test]
    fn blackhole_incoming_edge_requires_opt_in() {
        let mut g = StmtGraph::new(false);
        let err = g.add_copy(NodeId(1), BLACK_HOLE).unwrap_err();
        assert!(matches!(err, PtaError::InvalidEdge(_)));

        let mut g2 = StmtGraph::new(true);
        assert!(g2.add_copy(NodeId(1), BLACK_HOLE).is_ok());
    }

    #[test]
    fn gep_obj_node_is_reused_for_the_same_base_and_field() {
        let mut g = StmtGraph::new(false);
        let alloc = IdAllocator::new();
        let base = NodeId(1000);
        let a = g.get_gep_obj_node(&alloc, base, 2, 4);
        let b = g.get_gep_obj_node(&alloc, base, 2, 4);
        assert_eq!(a, b);
        let c = g.get_gep_obj_node(&alloc, base, 3, 4);
        assert_ne!(a, c);
    }
}
