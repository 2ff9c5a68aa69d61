//! Text serialization (ambient): a line-oriented dump/load format for a
//! solved analysis, mirroring `Andersen::writeToFile`/`readFromFile`.
//!
//! The format is intentionally simple: one directive per line, blank
//! lines and `#`-prefixed lines ignored. A dump can contain more than one
//! `INSENSITIVE` section (the source writer sometimes emits one mid-run
//! and a final one at convergence); per spec.md §9, only the *last*
//! section read is authoritative -- earlier ones are parsed (to stay
//! forward-compatible with files that have them) and then discarded.

use std::collections::{BTreeMap as Map, BTreeSet as Set};
use std::fmt::Write as _;

use crate::pta::cg::ConstraintKind;
use crate::pta::error::{PtaError, Result};
use crate::pta::ids::NodeId;
use crate::pta::solver::Solver;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dump {
    pub edges: Vec<(ConstraintKind, NodeId, NodeId, i64, i64)>,
    pub pts: Map<NodeId, Set<NodeId>>,
    pub insensitive: Set<NodeId>,
}

fn kind_tag(kind: ConstraintKind) -> &'static str {
    match kind {
        ConstraintKind::Addr => "addr",
        ConstraintKind::Copy => "copy",
        ConstraintKind::NormalGep => "ngep",
        ConstraintKind::VariantGep => "vgep",
        ConstraintKind::Load => "load",
        ConstraintKind::Store => "store",
    }
}

fn kind_from_tag(tag: &str) -> Option<ConstraintKind> {
    Some(match tag {
        "addr" => ConstraintKind::Addr,
        "copy" => ConstraintKind::Copy,
        "ngep" => ConstraintKind::NormalGep,
        "vgep" => ConstraintKind::VariantGep,
        "load" => ConstraintKind::Load,
        "store" => ConstraintKind::Store,
        _ => return None,
    })
}

/// Dumps `solver`'s constraint edges, points-to sets, and the final set
/// of field-insensitive objects to the line-oriented text format.
pub fn dump(solver: &Solver) -> String {
    let mut out = String::new();
    writeln!(out, "# vflow-pta dump v1").unwrap();
    for kind in ConstraintKind::ALL {
        for e in solver.cg.edges_of(kind) {
            writeln!(
                out,
                "edge {} {} {} {} {}",
                kind_tag(kind),
                e.src,
                e.dst,
                e.ap.byte_offset,
                e.ap.field_index
            )
            .unwrap();
        }
    }
    for (node, pts) in solver.pts_snapshot() {
        let members: Vec<String> = pts.iter().map(|o| o.0.to_string()).collect();
        writeln!(out, "pts {} {}", node, members.join(",")).unwrap();
    }
    writeln!(out, "insensitive").unwrap();
    for node in insensitive_objects(solver) {
        writeln!(out, "{node}").unwrap();
    }
    writeln!(out, "end").unwrap();
    out
}

fn insensitive_objects(solver: &Solver) -> Vec<NodeId> {
    let mut ids = Set::new();
    for (_, pts) in solver.pts_snapshot() {
        for o in pts.iter() {
            if solver.symtab.object(o).map(|m| m.is_field_insensitive()).unwrap_or(false) {
                ids.insert(o);
            }
        }
    }
    ids.into_iter().collect()
}

/// Parses the line-oriented dump format back into a [`Dump`]. Does not
/// reconstruct a live `Solver` -- the dump is a snapshot for diffing,
/// auditing, or feeding into an external consumer, not a resumable
/// checkpoint (spec.md §6 describes it as an output format, not an
/// input format for the solver itself).
pub fn load(text: &str) -> Result<Dump> {
    let mut dump = Dump::default();
    let mut in_insensitive = false;
    let mut pending_insensitive = Set::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "insensitive" {
            in_insensitive = true;
            pending_insensitive = Set::new();
            continue;
        }
        if line == "end" {
            in_insensitive = false;
            // last section wins, per spec.md §9.
            dump.insensitive = std::mem::take(&mut pending_insensitive);
            continue;
        }
        if in_insensitive {
            let id: u32 = line
                .parse()
                .map_err(|_| PtaError::Io(format!("line {}: bad node id {line:?}", lineno + 1)))?;
            pending_insensitive.insert(NodeId(id));
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("edge") => {
                let tag = parts.next().ok_or_else(|| malformed(lineno, raw))?;
                let kind = kind_from_tag(tag).ok_or_else(|| malformed(lineno, raw))?;
                let src = parse_node(parts.next(), lineno, raw)?;
                let dst = parse_node(parts.next(), lineno, raw)?;
                let byte_offset = parse_i64(parts.next(), lineno, raw)?;
                let field_index = parse_i64(parts.next(), lineno, raw)?;
                dump.edges.push((kind, src, dst, byte_offset, field_index));
            }
            Some("pts") => {
                let node = parse_node(parts.next(), lineno, raw)?;
                let rest: Vec<&str> = parts.collect();
                let members_str = rest.join(" ");
                let set: Result<Set<NodeId>> = members_str
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.trim()
                            .parse::<u32>()
                            .map(NodeId)
                            .map_err(|_| malformed(lineno, raw))
                    })
                    .collect();
                dump.pts.insert(node, set?);
            }
            _ => return Err(malformed(lineno, raw)),
        }
    }
    Ok(dump)
}

fn malformed(lineno: usize, raw: &str) -> PtaError {
    PtaError::Io(format!("line {}: malformed dump line {raw:?}", lineno + 1))
}

fn parse_node(tok: Option<&str>, lineno: usize, raw: &str) -> Result<NodeId> {
    tok.and_then(|s| s.parse::<u32>().ok())
        .map(NodeId)
        .ok_or_else(|| malformed(lineno, raw))
}

fn parse_i64(tok: Option<&str>, lineno: usize, raw: &str) -> Result<i64> {
    tok.and_then(|s| s.parse::<i64>().ok()).ok_or_else(|| malformed(lineno, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pta::config::Config;
    use crate::pta::field::Type;
    use crate::pta::ir::StmtGraph;
    use crate::pta::mem_obj::{MemObj, ObjFlags};

    #[test]
    fn round_trips_edges_and_pts() {
        let mut s = Solver::new(Config::default());
        let mut g = StmtGraph::new(false);
        let obj = NodeId(9000);
        s.symtab.register_synthetic_object(
            obj,
            MemObj::new(obj, Type::Simple("i32".into()), ObjFlags::STACK, 4),
        );
        let p = NodeId(9100);
        g.add_addr(obj, p).unwrap();
        s.build_from_stmt_graph(&g).unwrap();
        s.solve(None).unwrap();

        let text = dump(&s);
        let parsed = load(&text).unwrap();
        assert!(parsed.edges.iter().any(|(k, src, dst, _, _)| {
            *k == ConstraintKind::Addr && *src == obj && *dst == p
        }));
        assert!(parsed.pts.get(&p).map(|set| set.contains(&obj)).unwrap_or(false));
    }

    #[test]
    fn only_the_last_insensitive_section_survives() {
        let text = "insensitive\n1\n2\nend\ninsensitive\n3\nend\n";
        let parsed = load(text).unwrap();
        assert_eq!(parsed.insensitive, [NodeId(3)].into_iter().collect());
    }

    #[test]
    fn malformed_line_reports_io_error() {
        let err = load("edge bogus\n").unwrap_err();
        assert!(matches!(err, PtaError::Io(_)));
    }
}
