//! Call-graph bridge (C8): materializes indirect-call edges from a
//! pointer's resolved points-to set and wires caller/callee formal and
//! actual parameter/return edges into the constraint graph.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use log::debug;

use crate::pta::ids::{NodeId, BLACK_HOLE, NULL_PTR};
use crate::pta::solver::Solver;

/// Coarse int-vs-pointer classification of a formal/actual parameter,
/// used only to detect the mismatched-arity-by-type case spec.md §4.6
/// calls out (a caller passing an integer where the callee expects a
/// pointer, or vice versa, typically from an unchecked cast through a
/// function-pointer type mismatch).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    Pointer,
    Int,
}

impl Default for ArgKind {
    fn default() -> Self {
        ArgKind::Pointer
    }
}

/// One indirect call site: the pointer being called, its actual
/// arguments (positional) with their kinds, an optional actual return
/// destination, and the varargs tail beyond the callee's declared fixed
/// parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSite {
    pub id: u32,
    pub callee_ptr: NodeId,
    pub actual_args: Vec<NodeId>,
    /// Parallel to `actual_args`; a shorter (or empty) vector treats the
    /// missing trailing actuals as `Pointer`, the common case.
    pub actual_arg_kinds: Vec<ArgKind>,
    pub actual_ret: Option<NodeId>,
    pub actual_varargs: Vec<NodeId>,
}

/// A resolvable callee's signature, keyed by the function object id that
/// can appear in a `callee_ptr`'s points-to set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionSig {
    pub formal_args: Vec<NodeId>,
    /// Parallel to `formal_args`; see `CallSite::actual_arg_kinds`.
    pub formal_arg_kinds: Vec<ArgKind>,
    pub formal_ret: Option<NodeId>,
    pub formal_vararg: Option<NodeId>,
    pub is_vararg: bool,
}

fn arg_kind_at(kinds: &[ArgKind], i: usize) -> ArgKind {
    kinds.get(i).copied().unwrap_or_default()
}

/// Connects resolved call sites into the constraint graph. Keeps a set
/// of `(callsite, callee)` pairs already wired so repeated `update`
/// calls across worklist iterations only add edges for newly discovered
/// targets (spec.md §4.6).
#[derive(Debug, Default)]
pub struct CallGraph {
    functions: Map<NodeId, FunctionSig>,
    wired: Set<(u32, NodeId)>,
    edges: Set<(NodeId, NodeId)>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, func_obj: NodeId, sig: FunctionSig) {
        self.functions.insert(func_obj, sig);
    }

    pub fn callers_of(&self, callee: NodeId) -> Vec<NodeId> {
        self.edges.iter().filter(|(_, c)| *c == callee).map(|(caller, _)| *caller).collect()
    }

    pub fn callees_of(&self, caller: NodeId) -> Vec<NodeId> {
        self.edges.iter().filter(|(c, _)| *c == caller).map(|(_, callee)| *callee).collect()
    }

    /// Re-resolves every call site's pointer against the solver's current
    /// points-to sets and wires any newly discovered callee. Returns the
    /// number of new caller/callee edges added, so a driver can decide
    /// whether another `solve` pass is warranted.
    pub fn update(&mut self, solver: &mut Solver, call_sites: &[CallSite]) -> usize {
        let handle_blackhole = solver.config().handle_blackhole;
        let mut added = 0;
        for cs in call_sites {
            let targets = solver.pts_of(cs.callee_ptr);
            for callee in targets.iter() {
                if callee == NULL_PTR {
                    continue;
                }
                if callee == BLACK_HOLE && !handle_blackhole {
                    continue;
                }
                let Some(sig) = self.functions.get(&callee).cloned() else {
                    continue;
                };
                if !self.wired.insert((cs.id, callee)) {
                    continue;
                }
                self.connect_caller_to_callee(solver, cs, &sig);
                self.edges.insert((cs.callee_ptr, callee));
                added += 1;
                debug!("call site {} resolved to function {callee}", cs.id);
            }
        }
        added
    }

    /// Wires one call site's actual parameters/return/varargs to one
    /// resolved callee's formals via ordinary `Copy` edges (spec.md
    /// §4.6). Mismatched arity degrades gracefully: extra actuals beyond
    /// the callee's fixed formals feed the vararg tail if the callee is
    /// variadic, and are otherwise dropped. A mismatched int/pointer pair
    /// (one side `Pointer`, the other `Int`) cannot be soundly copied, so
    /// it instead flows `BLACK_HOLE` into the formal when the caller
    /// opted into `handle_blackhole`, or otherwise a no-op edge from
    /// `NULL_PTR` -- the conservative "no known target" choice.
    ///
    /// Every edge wired here is brand new by construction (`update`
    /// already dedups per `(callsite, callee)`), so whenever
    /// `add_copy_edge` reports a fresh edge its source's already-settled
    /// points-to set is carried across immediately via `union_into_pub`;
    /// otherwise a stable source's contents would only reach the formal
    /// on some future growth that may never come (spec.md §4.7's diff
    /// propagation only reacts forward from the point an edge exists).
    fn connect_caller_to_callee(&self, solver: &mut Solver, cs: &CallSite, sig: &FunctionSig) {
        for (i, (&actual, &formal)) in cs.actual_args.iter().zip(sig.formal_args.iter()).enumerate() {
            let actual_kind = arg_kind_at(&cs.actual_arg_kinds, i);
            let formal_kind = arg_kind_at(&sig.formal_arg_kinds, i);
            if actual_kind != formal_kind {
                self.connect_mismatched_arg(solver, formal);
                continue;
            }
            if solver.cg.add_copy_edge(actual, formal) {
                solver.union_into_pub(actual, formal);
            }
        }
        if cs.actual_args.len() > sig.formal_args.len() {
            let tail = &cs.actual_args[sig.formal_args.len()..];
            self.connect_vararg_tail(solver, tail, sig);
        }
        if !cs.actual_varargs.is_empty() {
            self.connect_vararg_tail(solver, &cs.actual_varargs, sig);
        }
        if let (Some(actual_ret), Some(formal_ret)) = (cs.actual_ret, sig.formal_ret) {
            if solver.cg.add_copy_edge(formal_ret, actual_ret) {
                solver.union_into_pub(formal_ret, actual_ret);
            }
        }
    }

    /// A formal whose actual argument disagrees on int-vs-pointer kind
    /// gets no information from the actual at all; it either absorbs
    /// `BLACK_HOLE` (opted-in conservative "could be anything") or is
    /// left pointing at nothing (`NULL_PTR`, whose points-to set is
    /// always empty, so no propagation is needed).
    fn connect_mismatched_arg(&self, solver: &mut Solver, formal: NodeId) {
        if solver.config().handle_blackhole {
            // Picked up by the next `solve()` call's unconditional
            // `process_all_addr` sweep -- no manual propagation needed.
            solver.cg.add_addr_edge(BLACK_HOLE, formal);
        } else {
            solver.cg.add_copy_edge(NULL_PTR, formal);
        }
    }

    fn connect_vararg_tail(&self, solver: &mut Solver, tail: &[NodeId], sig: &FunctionSig) {
        if !sig.is_vararg {
            return;
        }
        if let Some(vararg_node) = sig.formal_vararg {
            for &actual in tail {
                if solver.cg.add_copy_edge(actual, vararg_node) {
                    solver.union_into_pub(actual, vararg_node);
                }
            }
        }
    }
}
