//! Solver core (C7): worklist-driven Andersen-style fixed point over the
//! constraint graph, with on-the-fly SCC merging and positive-weight-cycle
//! collapse to field-insensitivity (spec.md §4.7).

use std::collections::{BTreeMap as Map, BTreeSet as Set, VecDeque};

use log::{debug, trace, warn};

use crate::pta::cg::{ConstraintEdge, ConstraintGraph, ConstraintKind};
use crate::pta::config::{Config, PtsBacking};
use crate::pta::error::{PtaError, Result};
use crate::pta::field::{modulus_offset, FieldModel};
use crate::pta::ids::{IdKind, NodeId};
use crate::pta::ir::StmtGraph;
use crate::pta::mem_obj::ObjFlags;
use crate::pta::pts::{Pts, PtsCache};
use crate::pta::symbol_table::SymbolTable;

/// Value-flow edge kinds the SCC/PWC pass walks. Load/Store are excluded:
/// they are resolved dynamically against runtime points-to sets, not part
/// of the static value-flow skeleton a cycle collapse operates over
/// (spec.md §4.7).
const VALUE_FLOW_KINDS: [ConstraintKind; 3] =
    [ConstraintKind::Copy, ConstraintKind::NormalGep, ConstraintKind::VariantGep];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub steps: u64,
    pub sccs_merged: u64,
    pub pwc_collapses: u64,
}

pub struct Solver {
    pub symtab: SymbolTable,
    pub field_model: FieldModel,
    pub cg: ConstraintGraph,
    config: Config,
    pts_cache: Option<PtsCache>,
    pts: Map<NodeId, Pts>,
    /// Last-propagated snapshot per node, used to compute the diff under
    /// `Config::diff_propagation` (spec.md §4.7, "diff propagation").
    propagated: Map<NodeId, Pts>,
    worklist: VecDeque<NodeId>,
    in_worklist: Set<NodeId>,
    /// Base object a dynamically created `GepObj`/`FiObj` node was
    /// derived from; `ir::StmtGraph` owns the forward cache, this is the
    /// solver's own reverse lookup for PWC collapse.
    gep_obj_base: Map<NodeId, (NodeId, u32)>,
    fi_obj_of: Map<NodeId, NodeId>,
    stats: SolverStats,
}

impl Solver {
    pub fn new(config: Config) -> Self {
        let pts_cache = match config.pts_backing {
            PtsBacking::Mutable => None,
            PtsBacking::Persistent => Some(PtsCache::new()),
        };
        Solver {
            symtab: SymbolTable::new(),
            field_model: FieldModel::new(),
            cg: ConstraintGraph::new(),
            config,
            pts_cache,
            pts: Map::new(),
            propagated: Map::new(),
            worklist: VecDeque::new(),
            in_worklist: Set::new(),
            gep_obj_base: Map::new(),
            fi_obj_of: Map::new(),
            stats: SolverStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    fn new_pts(&self) -> Pts {
        match &self.pts_cache {
            Some(cache) => Pts::new_persistent(cache),
            None => Pts::new_mutable(),
        }
    }

    pub fn pts_of(&self, n: NodeId) -> Pts {
        self.pts.get(&self.cg.scc_rep_id(n)).cloned().unwrap_or_else(|| self.new_pts())
    }

    fn pts_entry(&mut self, n: NodeId) -> &mut Pts {
        let rep = self.cg.scc_rep_id(n);
        if !self.pts.contains_key(&rep) {
            let fresh = self.new_pts();
            self.pts.insert(rep, fresh);
        }
        self.pts.get_mut(&rep).unwrap()
    }

    fn push(&mut self, n: NodeId) {
        let rep = self.cg.scc_rep_id(n);
        if self.in_worklist.insert(rep) {
            self.worklist.push_back(rep);
        }
    }

    /// Adds `o` to `n`'s points-to set, enqueueing `n` if it grew.
    fn add_pt(&mut self, n: NodeId, o: NodeId) {
        let grew = self.pts_entry(n).test_and_set(o);
        if grew {
            self.push(n);
        }
    }

    /// Unions `src`'s full points-to set into `dst`, enqueueing `dst` if
    /// it grew. Used both by ordinary `Copy` propagation and when a
    /// dynamic `Load`/`Store` edge is created for the first time, since a
    /// brand-new edge must pick up everything already accumulated on its
    /// source, not just future growth.
    fn union_into(&mut self, src: NodeId, dst: NodeId) {
        let src_pts = self.pts_of(src);
        let grew = self.pts_entry(dst).union_with(&src_pts);
        if grew {
            self.push(dst);
        }
    }

    /// Same contract as the private `union_into`, exposed for callers
    /// outside this module (the call-graph bridge, C8) that dynamically
    /// add a `Copy` edge and must carry the source's already-accumulated
    /// points-to set across it immediately, not just react to future
    /// growth (spec.md §4.6).
    pub(crate) fn union_into_pub(&mut self, src: NodeId, dst: NodeId) {
        self.union_into(src, dst);
    }

    /// Projects `g`'s `{Addr, Copy, Gep, Load, Store}` statements into
    /// constraint edges. `Load`/`Store` are stored pointer-first in the
    /// constraint graph regardless of the IR's `rhs`/`lhs` convention, so
    /// the solver always reacts to the pointer operand's points-to growth
    /// (spec.md §4.2).
    pub fn build_from_stmt_graph(&mut self, g: &StmtGraph) -> Result<()> {
        use crate::pta::ir::{StmtKind, StmtLabel};

        for (_, stmt) in g.edges_of_kind(StmtKind::Addr) {
            self.cg.add_addr_edge(stmt.src, stmt.dst);
        }
        for (_, stmt) in g.edges_of_kind(StmtKind::Copy) {
            self.cg.add_copy_edge(stmt.src, stmt.dst);
        }
        for (_, stmt) in g.edges_of_kind(StmtKind::Gep) {
            match &stmt.label {
                StmtLabel::Gep { ap, is_variant: false } => {
                    self.cg.add_normal_gep_edge(stmt.src, stmt.dst, *ap);
                }
                StmtLabel::Gep { is_variant: true, .. } => {
                    self.cg.add_variant_gep_edge(stmt.src, stmt.dst);
                }
                other => {
                    return Err(PtaError::InvalidEdge(format!(
                        "gep statement carries non-gep label {other:?}"
                    )))
                }
            }
        }
        for (_, stmt) in g.edges_of_kind(StmtKind::Load) {
            self.cg.add_load_edge(stmt.src, stmt.dst);
        }
        for (_, stmt) in g.edges_of_kind(StmtKind::Store) {
            // ir::Statement{src: value, dst: ptr} -> cg edge keyed by
            // pointer first.
            self.cg.add_store_edge(stmt.dst, stmt.src);
        }
        Ok(())
    }

    /// First solver phase: every `Addr` edge unconditionally contributes
    /// its object to its pointer's points-to set (spec.md §4.7 step 1).
    pub fn process_all_addr(&mut self) {
        for e in self.cg.edges_of(ConstraintKind::Addr) {
            self.add_pt(e.dst, e.src);
        }
    }

    /// Runs the worklist to closure. `budget`, if set, bounds the number
    /// of node-processing steps before giving up with `OutOfBudget`.
    pub fn solve(&mut self, budget: Option<u64>) -> Result<SolverStats> {
        self.process_all_addr();
        loop {
            while let Some(n) = self.worklist.pop_front() {
                self.in_worklist.remove(&n);
                if let Some(b) = budget {
                    if self.stats.steps >= b {
                        return Err(PtaError::OutOfBudget(self.stats.steps));
                    }
                }
                self.stats.steps += 1;
                self.process_node(n)?;
            }
            if !self.detect_and_collapse_sccs()? {
                break;
            }
        }
        debug!(
            "solver closure reached after {} steps, {} scc merges, {} pwc collapses",
            self.stats.steps, self.stats.sccs_merged, self.stats.pwc_collapses
        );
        Ok(self.stats)
    }

    fn process_node(&mut self, n: NodeId) -> Result<()> {
        let rep = self.cg.scc_rep_id(n);
        let full = self.pts_of(rep);
        let diff = if self.config.diff_propagation {
            let prior = self.propagated.get(&rep).cloned().unwrap_or_else(|| self.new_pts());
            let mut d = full.clone();
            d.diff(&prior);
            d
        } else {
            full.clone()
        };
        if diff.is_empty() {
            return Ok(());
        }
        trace!("processing {rep} with {} new points-to members", diff.count());
        self.handle_copy_gep(rep, &diff)?;
        self.handle_load_store(rep, &diff);
        if self.config.diff_propagation {
            self.propagated.insert(rep, full);
        }
        Ok(())
    }

    fn handle_copy_gep(&mut self, n: NodeId, diff: &Pts) -> Result<()> {
        for e in self.cg.outgoing(n, ConstraintKind::Copy) {
            self.pts_entry_union_diff(e.dst, diff);
        }
        // VariantGep before NormalGep: a variant gep collapses its base
        // to field-insensitive, and `normal_gep_target` checks that flag
        // before computing a fresh per-field id. Running variant first
        // means a base discovered in the same diff batch never gets a
        // distinct per-field object that should have been the FI object
        // all along (spec.md §4.3's scenario 4).
        for e in self.cg.outgoing(n, ConstraintKind::VariantGep) {
            let objs: Vec<NodeId> = diff.iter().collect();
            for o in objs {
                let target = self.fi_target(o);
                self.add_pt(e.dst, target);
            }
        }
        for e in self.cg.outgoing(n, ConstraintKind::NormalGep) {
            let objs: Vec<NodeId> = diff.iter().collect();
            for o in objs {
                // A type/offset mismatch is a per-contribution error
                // (spec.md §7): discard this one object rather than
                // failing the whole solve over one bad gep target.
                match self.normal_gep_target(o, e.ap.field_index) {
                    Ok(target) => self.add_pt(e.dst, target),
                    Err(err) => warn!("discarding gep contribution from {o}: {err}"),
                }
            }
        }
        Ok(())
    }

    fn pts_entry_union_diff(&mut self, dst: NodeId, diff: &Pts) {
        let grew = self.pts_entry(dst).union_with(diff);
        if grew {
            self.push(dst);
        }
    }

    /// Resolves (creating if necessary) the field sub-object of `base` at
    /// `field_index`, honoring `first_field_eq_base` and the base
    /// object's configured field limit (spec.md §4.3). Returns
    /// `PtaError::FieldOutOfRange`/`TypeMismatch` when the flattened type
    /// cannot account for `field_index` rather than silently substituting
    /// `base`'s own type; per spec.md §7 the caller discards that single
    /// contribution instead of failing the whole solve.
    fn normal_gep_target(&mut self, base: NodeId, field_index: i64) -> Result<NodeId> {
        if self.symtab.object(base).map(|o| o.is_field_insensitive()).unwrap_or(true) {
            return Ok(self.fi_target(base));
        }
        let limit = self.symtab.object(base).unwrap().max_field_offset_limit();
        let fidx = modulus_offset(field_index, limit.max(1));
        if fidx == 0 && self.config.first_field_eq_base {
            return Ok(base);
        }
        // `gep_object_id` is a pure function of `(base, fidx, limit)`, so
        // the existing-object check below already gives this lookup its
        // idempotence -- no separate cache needed.
        let id = self.symtab.alloc().gep_object_id(base, fidx, limit, false);
        if !self.symtab.has_object(id) {
            let base_obj = self.symtab.object(base).unwrap();
            let ty = self.field_model.flattened_element_type(&base_obj.ty.clone(), fidx).map_err(
                |_| PtaError::TypeMismatch(base, format!("field {fidx} has no flattened type")),
            )?;
            let flags = base_obj.flags;
            let obj = crate::pta::mem_obj::MemObj::new(id, ty, flags, 0);
            self.symtab.register_synthetic_object(id, obj);
        }
        self.gep_obj_base.insert(id, (base, fidx));
        Ok(id)
    }

    /// Resolves (creating if necessary) `base`'s field-insensitive
    /// representative, and marks `base` field-insensitive -- a variant
    /// gep means the offset could not be resolved statically, so every
    /// flow through it must be conservative from here on (spec.md §4.3).
    fn fi_target(&mut self, base: NodeId) -> NodeId {
        if let Some(obj) = self.symtab.object_mut(base) {
            obj.set_field_insensitive();
        }
        if let Some(&id) = self.fi_obj_of.get(&base) {
            return id;
        }
        let id = self.symtab.alloc().fi_object_id(base, false);
        if !self.symtab.has_object(id) {
            if let Some(base_obj) = self.symtab.object(base) {
                let obj = crate::pta::mem_obj::MemObj::new(id, base_obj.ty.clone(), base_obj.flags, 0);
                self.symtab.register_synthetic_object(id, obj);
            } else {
                self.symtab.register_synthetic_object(
                    id,
                    crate::pta::mem_obj::MemObj::new(
                        id,
                        crate::pta::field::Type::Simple("unknown".into()),
                        ObjFlags::empty(),
                        0,
                    ),
                );
            }
        }
        self.fi_obj_of.insert(base, id);
        id
    }

    /// Resolves `Load`/`Store` statements against `n`'s newly discovered
    /// points-to members: `p = *n` copies every such object's set into
    /// `p`; `*n = v` copies `v`'s set into every such object (spec.md
    /// §4.2).
    fn handle_load_store(&mut self, n: NodeId, diff: &Pts) {
        for e in self.cg.outgoing(n, ConstraintKind::Load) {
            let result = e.dst;
            for o in diff.iter() {
                if self.cg.add_copy_edge(o, result) {
                    self.union_into(o, result);
                }
            }
        }
        for e in self.cg.outgoing(n, ConstraintKind::Store) {
            let value = e.dst;
            for o in diff.iter() {
                if self.cg.add_copy_edge(value, o) {
                    self.union_into(value, o);
                }
            }
        }
    }

    /// Runs Tarjan's SCC algorithm over the current value-flow subgraph
    /// and merges every nontrivial SCC into one representative, folding
    /// points-to sets together and collapsing backing objects to
    /// field-insensitive wherever the merge closed a positive-weight
    /// cycle. Returns `true` if any merge happened (the caller must keep
    /// draining the worklist, since a merge can re-enqueue work).
    fn detect_and_collapse_sccs(&mut self) -> Result<bool> {
        let sccs = self.tarjan_sccs();
        let mut any = false;
        for scc in sccs {
            if scc.len() < 2 {
                continue;
            }
            any = true;
            let rep = *scc.iter().min().unwrap();
            let mut pwc = false;
            for &member in &scc {
                if member == rep {
                    continue;
                }
                if self.cg.merge_into_rep(member, rep) {
                    pwc = true;
                }
                let member_pts = self.pts.remove(&member);
                self.propagated.remove(&member);
                if let Some(mp) = member_pts {
                    let grew = self.pts_entry(rep).union_with(&mp);
                    if grew {
                        self.push(rep);
                    }
                }
                self.in_worklist.remove(&member);
            }
            self.stats.sccs_merged += 1;
            if pwc {
                self.cg.set_pwc(rep);
                if self.config.merge_pwc {
                    self.collapse_pwc(rep)?;
                }
            }
        }
        Ok(any)
    }

    /// Forces every object currently in `rep`'s points-to set to its
    /// field-insensitive representative (spec.md §4.7: a non-zero-offset
    /// gep inside a cycle means the offset cannot be soundly attributed
    /// to any single field, ever, for objects flowing through it).
    fn collapse_pwc(&mut self, rep: NodeId) -> Result<()> {
        let members: Vec<NodeId> = self.pts_of(rep).iter().collect();
        let mut replaced = false;
        for o in members {
            let base = self.gep_obj_base.get(&o).map(|(b, _)| *b).unwrap_or(o);
            let fi = self.fi_target(base);
            if fi != o {
                self.pts_entry(rep).set(fi);
                replaced = true;
            }
        }
        if replaced {
            self.stats.pwc_collapses += 1;
            self.push(rep);
        }
        Ok(())
    }

    fn tarjan_sccs(&self) -> Vec<Vec<NodeId>> {
        struct TarjanState {
            index: Map<NodeId, u32>,
            lowlink: Map<NodeId, u32>,
            on_stack: Set<NodeId>,
            stack: Vec<NodeId>,
            next_index: u32,
            sccs: Vec<Vec<NodeId>>,
        }

        fn strongconnect(
            v: NodeId,
            adj: &Map<NodeId, Vec<NodeId>>,
            st: &mut TarjanState,
        ) {
            st.index.insert(v, st.next_index);
            st.lowlink.insert(v, st.next_index);
            st.next_index += 1;
            st.stack.push(v);
            st.on_stack.insert(v);

            if let Some(succs) = adj.get(&v) {
                for &w in succs {
                    if !st.index.contains_key(&w) {
                        strongconnect(w, adj, st);
                        let w_low = st.lowlink[&w];
                        let v_low = st.lowlink[&v];
                        st.lowlink.insert(v, v_low.min(w_low));
                    } else if st.on_stack.contains(&w) {
                        let w_idx = st.index[&w];
                        let v_low = st.lowlink[&v];
                        st.lowlink.insert(v, v_low.min(w_idx));
                    }
                }
            }

            if st.lowlink[&v] == st.index[&v] {
                let mut scc = Vec::new();
                loop {
                    let w = st.stack.pop().unwrap();
                    st.on_stack.remove(&w);
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                st.sccs.push(scc);
            }
        }

        let mut adj: Map<NodeId, Vec<NodeId>> = Map::new();
        for kind in VALUE_FLOW_KINDS {
            for e in self.cg.edges_of(kind) {
                adj.entry(e.src).or_default().push(e.dst);
            }
        }
        let nodes = self.cg.nodes();
        let mut st = TarjanState {
            index: Map::new(),
            lowlink: Map::new(),
            on_stack: Set::new(),
            stack: Vec::new(),
            next_index: 0,
            sccs: Vec::new(),
        };
        for n in nodes {
            if !st.index.contains_key(&n) {
                strongconnect(n, &adj, &mut st);
            }
        }
        st.sccs
    }

    pub fn pts_snapshot(&self) -> Map<NodeId, Pts> {
        self.pts.clone()
    }

    pub fn warn_if_retyped(&self, id: NodeId, warned: bool) {
        if warned {
            warn!("object {id} retyped more than once; keeping most recent cast");
        }
    }

    /// FI-expansion (spec.md §4.5): augments `pts` with the field-ids of
    /// every member that is itself a base object (never a synthesized
    /// `GepObj`/`FiObj`) or is already field-insensitive, so that a query
    /// against a field-insensitive pointer and one against a specific
    /// field of the same base see each other in the result. Used by
    /// `alias`.
    pub fn expand_fi(&self, pts: &Pts) -> Pts {
        let mut out = pts.clone();
        for b in pts.iter() {
            let is_base_object = !matches!(
                b.kind_tag(),
                IdKind::GepObj | IdKind::FiObj | IdKind::CloneGepObj | IdKind::CloneFiObj
            );
            let is_field_insensitive =
                self.symtab.object(b).map(|o| o.is_field_insensitive()).unwrap_or(false);
            if !is_base_object && !is_field_insensitive {
                continue;
            }
            for (&sub, &(base, _)) in self.gep_obj_base.iter() {
                if base == b {
                    out.set(sub);
                }
            }
            if let Some(&fi) = self.fi_obj_of.get(&b) {
                out.set(fi);
            }
        }
        out
    }

    /// Points-to-based alias query (spec.md §6). Both sides are
    /// FI-expanded first so that a field-insensitive base and one of its
    /// own fields are treated as the same storage. Empty on either side
    /// means nothing is known, which this analysis treats conservatively
    /// as `NoAlias` rather than `MayAlias`, mirroring `pts_of`'s "absent
    /// means empty, not unknown" convention.
    pub fn alias(&self, id1: NodeId, id2: NodeId) -> AliasResult {
        let p1 = self.expand_fi(&self.pts_of(id1));
        let p2 = self.expand_fi(&self.pts_of(id2));
        if p1.is_empty() || p2.is_empty() {
            return AliasResult::NoAlias;
        }
        if p1.count() == 1 && p2.count() == 1 && p1.equal(&p2) {
            return AliasResult::MustAlias;
        }
        if p1.intersects(&p2) {
            AliasResult::MayAlias
        } else {
            AliasResult::NoAlias
        }
    }
}

/// Outcome of a points-to-based `alias` query (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasResult {
    NoAlias,
    MayAlias,
    MustAlias,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pta::field::Type;
    use crate::pta::mem_obj::MemObj;

    fn mk_solver() -> Solver {
        Solver::new(Config::default())
    }

    #[test]
    fn straight_line_copy_propagates_addr_target() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let obj = NodeId(1000);
        s.symtab.register_synthetic_object(
            obj,
            MemObj::new(obj, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let p = NodeId(2000);
        let q = NodeId(2001);
        g.add_addr(obj, p).unwrap();
        g.add_copy(p, q).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();
        assert!(s.pts_of(q).test(obj));
    }

    #[test]
    fn load_store_through_pointer_connects_objects() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let a = NodeId(1000);
        let b = NodeId(1001);
        for o in [a, b] {
            s.symtab.register_synthetic_object(
                o,
                MemObj::new(o, Type::Simple("i32".into()), ObjFlags::STACK, 4),
            );
        }
        let pp = NodeId(2000); // pointer to a pointer
        let p = NodeId(2001); // pointer value stored through pp
        let q = NodeId(2002); // result of loading through pp

        g.add_addr(b, p).unwrap(); // p = &b
        g.add_addr(a, pp).unwrap(); // pp = &a, seeds pp's points-to set
        s.build_from_stmt_graph(&g).unwrap();
        // wire store/load directly on the constraint graph: *pp = p; q = *pp
        s.cg.add_store_edge(pp, p);
        s.cg.add_load_edge(pp, q);
        s.solve(None).unwrap();
        assert!(s.pts_of(q).test(b));
    }

    #[test]
    fn field_sensitive_struct_gep_targets_distinct_fields() {
        let mut s = mk_solver();
        let base = NodeId(3000);
        s.symtab.register_synthetic_object(
            base,
            MemObj::new(
                base,
                Type::Struct {
                    name: "Pair".into(),
                    fields: vec![Type::Simple("i32".into()), Type::Simple("i32".into())],
                },
                ObjFlags::STACK,
                2,
            ),
        );
        let t0 = s.normal_gep_target(base, 0).unwrap();
        let t1 = s.normal_gep_target(base, 1).unwrap();
        assert_ne!(t0, t1);
    }

    #[test]
    fn first_field_eq_base_aliases_field_zero_with_the_base_object() {
        let mut s = Solver::new(Config { first_field_eq_base: true, ..Config::default() });
        let base = NodeId(3100);
        s.symtab.register_synthetic_object(
            base,
            MemObj::new(
                base,
                Type::Struct {
                    name: "Pair".into(),
                    fields: vec![Type::Simple("i32".into()), Type::Simple("i32".into())],
                },
                ObjFlags::STACK,
                2,
            ),
        );
        let t0 = s.normal_gep_target(base, 0).unwrap();
        assert_eq!(t0, base);
    }

    #[test]
    fn variant_gep_collapses_base_to_field_insensitive() {
        let mut s = mk_solver();
        let base = NodeId(4000);
        s.symtab.register_synthetic_object(
            base,
            MemObj::new(base, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let fi = s.fi_target(base);
        assert!(s.symtab.object(base).unwrap().is_field_insensitive());
        let fi2 = s.fi_target(base);
        assert_eq!(fi, fi2);
    }

    #[test]
    fn cycle_through_copy_edges_merges_into_one_scc() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let obj = NodeId(5000);
        s.symtab.register_synthetic_object(
            obj,
            MemObj::new(obj, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let a = NodeId(6000);
        let b = NodeId(6001);
        let c = NodeId(6002);
        g.add_addr(obj, a).unwrap();
        g.add_copy(a, b).unwrap();
        g.add_copy(b, c).unwrap();
        g.add_copy(c, a).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();
        let rep_a = s.cg.scc_rep_id(a);
        let rep_b = s.cg.scc_rep_id(b);
        let rep_c = s.cg.scc_rep_id(c);
        assert_eq!(rep_a, rep_b);
        assert_eq!(rep_b, rep_c);
        assert!(s.pts_of(a).test(obj));
    }

    #[test]
    fn out_of_budget_is_reported() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let obj = NodeId(7000);
        s.symtab.register_synthetic_object(
            obj,
            MemObj::new(obj, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let p = NodeId(8000);
        g.add_addr(obj, p).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        let err = s.solve(Some(0)).unwrap_err();
        assert!(matches!(err, PtaError::OutOfBudget(_)));
    }

    #[test]
    fn expand_fi_pulls_in_known_fields_of_a_base_already_in_the_set() {
        let mut s = mk_solver();
        let base = NodeId(9000);
        s.symtab.register_synthetic_object(
            base,
            MemObj::new(
                base,
                Type::Struct {
                    name: "Pair".into(),
                    fields: vec![Type::Simple("i32".into()), Type::Simple("i32".into())],
                },
                ObjFlags::STACK,
                2,
            ),
        );
        let f0 = s.normal_gep_target(base, 0).unwrap();
        let f1 = s.normal_gep_target(base, 1).unwrap();

        let mut pts = s.new_pts();
        pts.set(base);
        let expanded = s.expand_fi(&pts);
        assert!(expanded.test(base));
        assert!(expanded.test(f0));
        assert!(expanded.test(f1));
    }

    #[test]
    fn expand_fi_pulls_in_the_fi_object_of_a_field_insensitive_base() {
        let mut s = mk_solver();
        let base = NodeId(9100);
        s.symtab.register_synthetic_object(
            base,
            MemObj::new(base, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let fi = s.fi_target(base);

        let mut pts = s.new_pts();
        pts.set(base);
        let expanded = s.expand_fi(&pts);
        assert!(expanded.test(fi));
    }

    #[test]
    fn alias_reports_must_alias_for_identical_singleton_points_to_sets() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let obj = NodeId(9200);
        s.symtab.register_synthetic_object(
            obj,
            MemObj::new(obj, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let p = NodeId(9201);
        let q = NodeId(9202);
        g.add_addr(obj, p).unwrap();
        g.add_addr(obj, q).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();
        assert_eq!(s.alias(p, q), AliasResult::MustAlias);
    }

    #[test]
    fn alias_reports_may_alias_for_overlapping_but_unequal_points_to_sets() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let shared = NodeId(9300);
        let only_p = NodeId(9301);
        for o in [shared, only_p] {
            s.symtab.register_synthetic_object(
                o,
                MemObj::new(o, Type::Simple("i32".into()), ObjFlags::STACK, 4),
            );
        }
        let p = NodeId(9302);
        let q = NodeId(9303);
        g.add_addr(shared, p).unwrap();
        g.add_addr(only_p, p).unwrap();
        g.add_addr(shared, q).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();
        assert_eq!(s.alias(p, q), AliasResult::MayAlias);
    }

    #[test]
    fn alias_reports_no_alias_for_disjoint_points_to_sets() {
        let mut s = mk_solver();
        let mut g = StmtGraph::new(false);
        let a = NodeId(9400);
        let b = NodeId(9401);
        for o in [a, b] {
            s.symtab.register_synthetic_object(
                o,
                MemObj::new(o, Type::Simple("i32".into()), ObjFlags::STACK, 4),
            );
        }
        let p = NodeId(9402);
        let q = NodeId(9403);
        g.add_addr(a, p).unwrap();
        g.add_addr(b, q).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();
        assert_eq!(s.alias(p, q), AliasResult::NoAlias);
    }

    #[test]
    fn alias_reports_no_alias_when_either_side_is_unconstrained() {
        let s = mk_solver();
        let p = NodeId(9500);
        let q = NodeId(9501);
        assert_eq!(s.alias(p, q), AliasResult::NoAlias);
    }
}
