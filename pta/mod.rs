pub mod callgraph;
pub mod cg;
pub mod config;
pub mod error;
pub mod field;
pub mod ids;
pub mod ir;
pub mod mem_obj;
pub mod pts;
pub mod serialize;
pub mod solver;
pub mod symbol_table;
