//! Analysis configuration (spec.md §6): the knobs a driver sets before
//! running the solver, serialized alongside results so a run's output
//! records how it was produced.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtsBacking {
    Mutable,
    Persistent,
}

impl Default for PtsBacking {
    fn default() -> Self {
        PtsBacking::Mutable
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-object cap on distinct field ids before the object collapses
    /// to field-insensitive. Zero means "always field-insensitive".
    pub max_field_limit: u32,
    pub pts_backing: PtsBacking,
    /// Use differential (delta-only) points-to propagation rather than
    /// re-propagating full sets every worklist iteration.
    pub diff_propagation: bool,
    /// Collapse positive-weight-cycle SCCs to field-insensitive rather
    /// than leaving them field-sensitive-but-unsound.
    pub merge_pwc: bool,
    /// SVF's "first field equals base" convention: a gep to field 0 of
    /// an object is represented by the base object id itself rather
    /// than a distinct `GepObj` node.
    pub first_field_eq_base: bool,
    /// Allow edges that target `BLACK_HOLE` (conservative modeling of
    /// values the front end could not resolve) instead of rejecting
    /// them with `InvalidEdge`.
    pub handle_blackhole: bool,
    /// Model integer constants as possible pointer values flowing
    /// through `BinaryOp`/`Cmp` edges, rather than ignoring them.
    pub model_constants: bool,
    pub anderson_input_file: Option<String>,
    pub anderson_output_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            // 0 selects fully field-insensitive (spec.md §6); a client
            // raises this to opt into field sensitivity.
            max_field_limit: 0,
            pts_backing: PtsBacking::default(),
            diff_propagation: true,
            merge_pwc: true,
            first_field_eq_base: false,
            // off by default -- a client must opt in before black-hole
            // edges are accepted rather than rejected.
            handle_blackhole: false,
            model_constants: false,
            anderson_input_file: None,
            anderson_output_file: None,
        }
    }
}
