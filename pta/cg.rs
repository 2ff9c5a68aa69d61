//! Constraint graph (C6): the solver's working graph, projected from the
//! statement graph's `{Addr, Copy, Gep, Load, Store}` statements into
//! constraint edges, plus the per-node SCC/PWC bookkeeping the solver
//! threads through merges.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use crate::pta::field::AccessPath;
use crate::pta::ids::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKind {
    Addr,
    Copy,
    NormalGep,
    VariantGep,
    Load,
    Store,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 6] = [
        ConstraintKind::Addr,
        ConstraintKind::Copy,
        ConstraintKind::NormalGep,
        ConstraintKind::VariantGep,
        ConstraintKind::Load,
        ConstraintKind::Store,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintEdge {
    pub src: NodeId,
    pub dst: NodeId,
    pub kind: ConstraintKind,
    /// Only meaningful for `NormalGep`; zero otherwise.
    pub ap: AccessPath,
}

/// Per-node solver bookkeeping: SCC representative, the set of nodes an
/// SCC merge folded into this one, and whether this node sits on a
/// positive-weight cycle (a gep edge with nonzero/variant offset inside
/// a cycle), per spec.md §4.7.
#[derive(Clone, Debug, Default)]
pub struct NodeMeta {
    pub scc_rep: Option<NodeId>,
    pub scc_sub_set: Set<NodeId>,
    pub is_pwc: bool,
}

/// The constraint graph (C6). Edges are stored per-kind so the solver can
/// iterate `Copy`/`Gep` edges without scanning `Load`/`Store`, matching
/// the access pattern spec.md §4.7's worklist loop describes.
#[derive(Debug, Default)]
pub struct ConstraintGraph {
    edges: Map<ConstraintKind, Set<ConstraintEdge>>,
    incoming: Map<NodeId, Map<ConstraintKind, Set<ConstraintEdge>>>,
    outgoing: Map<NodeId, Map<ConstraintKind, Set<ConstraintEdge>>>,
    meta: Map<NodeId, NodeMeta>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn meta_mut(&mut self, id: NodeId) -> &mut NodeMeta {
        self.meta.entry(id).or_default()
    }

    pub fn meta(&self, id: NodeId) -> NodeMeta {
        self.meta.get(&id).cloned().unwrap_or_default()
    }

    /// Follows `scc_rep` chains to the ultimate representative. Chains
    /// are short in practice (re-merges retarget directly at the new
    /// representative) but this guards against staleness regardless.
    pub fn scc_rep_id(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        let mut seen = Set::new();
        while let Some(meta) = self.meta.get(&cur) {
            if let Some(rep) = meta.scc_rep {
                if rep == cur || !seen.insert(cur) {
                    break;
                }
                cur = rep;
            } else {
                break;
            }
        }
        cur
    }

    pub fn scc_sub_set(&self, rep: NodeId) -> Set<NodeId> {
        self.meta.get(&rep).map(|m| m.scc_sub_set.clone()).unwrap_or_default()
    }

    pub fn is_pwc(&self, id: NodeId) -> bool {
        self.meta.get(&id).map(|m| m.is_pwc).unwrap_or(false)
    }

    pub fn set_pwc(&mut self, id: NodeId) {
        self.meta_mut(id).is_pwc = true;
    }

    fn insert_edge(&mut self, e: ConstraintEdge) -> bool {
        let fresh = self.edges.entry(e.kind).or_default().insert(e);
        if fresh {
            self.outgoing.entry(e.src).or_default().entry(e.kind).or_default().insert(e);
            self.incoming.entry(e.dst).or_default().entry(e.kind).or_default().insert(e);
        }
        fresh
    }

    pub fn add_addr_edge(&mut self, src: NodeId, dst: NodeId) -> bool {
        self.insert_edge(ConstraintEdge { src, dst, kind: ConstraintKind::Addr, ap: AccessPath::zero() })
    }

    pub fn add_copy_edge(&mut self, src: NodeId, dst: NodeId) -> bool {
        self.insert_edge(ConstraintEdge { src, dst, kind: ConstraintKind::Copy, ap: AccessPath::zero() })
    }

    pub fn add_normal_gep_edge(&mut self, src: NodeId, dst: NodeId, ap: AccessPath) -> bool {
        self.insert_edge(ConstraintEdge { src, dst, kind: ConstraintKind::NormalGep, ap })
    }

    pub fn add_variant_gep_edge(&mut self, src: NodeId, dst: NodeId) -> bool {
        self.insert_edge(ConstraintEdge {
            src,
            dst,
            kind: ConstraintKind::VariantGep,
            ap: AccessPath::zero(),
        })
    }

    pub fn add_load_edge(&mut self, src: NodeId, dst: NodeId) -> bool {
        self.insert_edge(ConstraintEdge { src, dst, kind: ConstraintKind::Load, ap: AccessPath::zero() })
    }

    pub fn add_store_edge(&mut self, src: NodeId, dst: NodeId) -> bool {
        self.insert_edge(ConstraintEdge { src, dst, kind: ConstraintKind::Store, ap: AccessPath::zero() })
    }

    pub fn remove_edge(&mut self, e: ConstraintEdge) -> bool {
        let removed = self.edges.get_mut(&e.kind).map(|s| s.remove(&e)).unwrap_or(false);
        if removed {
            if let Some(m) = self.outgoing.get_mut(&e.src) {
                if let Some(s) = m.get_mut(&e.kind) {
                    s.remove(&e);
                }
            }
            if let Some(m) = self.incoming.get_mut(&e.dst) {
                if let Some(s) = m.get_mut(&e.kind) {
                    s.remove(&e);
                }
            }
        }
        removed
    }

    pub fn edges_of(&self, kind: ConstraintKind) -> impl Iterator<Item = ConstraintEdge> + '_ {
        self.edges.get(&kind).into_iter().flatten().copied()
    }

    pub fn outgoing(&self, node: NodeId, kind: ConstraintKind) -> Vec<ConstraintEdge> {
        self.outgoing
            .get(&node)
            .and_then(|m| m.get(&kind))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn incoming(&self, node: NodeId, kind: ConstraintKind) -> Vec<ConstraintEdge> {
        self.incoming
            .get(&node)
            .and_then(|m| m.get(&kind))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> Set<NodeId> {
        let mut all = Set::new();
        for kind_edges in self.edges.values() {
            for e in kind_edges {
                all.insert(e.src);
                all.insert(e.dst);
            }
        }
        all
    }

    /// Retargets every edge with `src == from` or `dst == from` so it
    /// instead points at `rep`, and records `from` in `rep`'s SCC subset.
    /// Returns `true` if doing so collapsed a gep edge with a nonzero or
    /// variant offset into a self-loop on `rep` -- a positive-weight
    /// cycle, which the caller (the solver) must react to by forcing
    /// `rep`'s backing object field-insensitive (spec.md §4.7).
    pub fn merge_into_rep(&mut self, from: NodeId, rep: NodeId) -> bool {
        if from == rep {
            return false;
        }
        let is_nonzero_gep = |kind: ConstraintKind, ap: AccessPath| {
            matches!(kind, ConstraintKind::VariantGep)
                || (kind == ConstraintKind::NormalGep && (ap.byte_offset != 0 || ap.field_index != 0))
        };

        let mut pwc = false;
        for kind in ConstraintKind::ALL {
            for e in self.outgoing(from, kind) {
                self.remove_edge(e);
                let new_dst = if e.dst == from { rep } else { e.dst };
                if new_dst == rep && is_nonzero_gep(kind, e.ap) {
                    pwc = true;
                }
                self.insert_edge(ConstraintEdge { src: rep, dst: new_dst, kind, ap: e.ap });
            }
            for e in self.incoming(from, kind) {
                self.remove_edge(e);
                let new_src = if e.src == from { rep } else { e.src };
                if new_src == rep && is_nonzero_gep(kind, e.ap) {
                    pwc = true;
                }
                self.insert_edge(ConstraintEdge { src: new_src, dst: rep, kind, ap: e.ap });
            }
        }

        let mut sub = self.meta.get(&from).map(|m| m.scc_sub_set.clone()).unwrap_or_default();
        sub.insert(from);
        let rep_meta = self.meta_mut(rep);
        rep_meta.scc_sub_set.extend(sub.iter().copied());
        if pwc {
            rep_meta.is_pwc = true;
        }
        self.meta_mut(from).scc_rep = Some(rep);
        pwc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_edges_do_not_double_insert() {
        let mut g = ConstraintGraph::new();
        let a = NodeId(1);
        let b = NodeId(2);
        assert!(g.add_copy_edge(a, b));
        assert!(!g.add_copy_edge(a, b));
        assert_eq!(g.outgoing(a, ConstraintKind::Copy).len(), 1);
    }

    #[test]
    fn merging_a_self_loop_gep_sets_pwc() {
        let mut g = ConstraintGraph::new();
        let a = NodeId(1);
        let b = NodeId(2);
        g.add_normal_gep_edge(a, b, AccessPath::field(1, 1));
        let pwc = g.merge_into_rep(a, b);
        assert!(pwc);
        assert!(g.is_pwc(b) || pwc);
    }

    #[test]
    fn merging_a_copy_self_loop_is_not_pwc() {
        let mut g = ConstraintGraph::new();
        let a = NodeId(1);
        let b = NodeId(2);
        g.add_copy_edge(a, b);
        let pwc = g.merge_into_rep(a, b);
        assert!(!pwc);
    }

    #[test]
    fn scc_rep_id_follows_chains() {
        let mut g = ConstraintGraph::new();
        let a = NodeId(1);
        let b = NodeId(2);
        let c = NodeId(3);
        g.merge_into_rep(a, b);
        g.merge_into_rep(b, c);
        assert_eq!(g.scc_rep_id(a), c);
    }
}
