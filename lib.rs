//! Whole-program, inclusion-based (Andersen-style) pointer/value-flow
//! analysis over an externally supplied statement graph.
//!
//! The IR front end, analysis clients, and driver binary are not part of
//! this crate -- a caller builds a [`pta::ir::StmtGraph`] via its `add_*`
//! methods, hands it to a [`pta::solver::Solver`], and reads back
//! points-to sets once `solve` returns.

pub mod pta;
