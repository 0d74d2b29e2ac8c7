/*
GraphML export: turns the clause buffer into an undirected graph where nodes
are variables (numbered to match DIMACS) and edges join variables that
co-occur in some clause. The weighted variant additionally records, per
edge, how many clause siblings contributed to it and a normalized weight so
that the weights of all edges generated from one clause sum to 1 -- direct
port of the reference writer's edge-cardinality bookkeeping.
*/

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::cnf::Cnf;
use crate::literal::variable_id;
use crate::variables::NamedVariables;

fn write_header(out: &mut impl Write, weighted: bool) -> io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
    )?;
    writeln!(out, r#"<graph id="CNF" edgedefault="undirected">"#)?;
    writeln!(out, r#"<key id="n_variable_name" for="node" attr.name="variable_name" attr.type="string"/>"#)?;
    writeln!(out, r#"<key id="n_variable_index" for="node" attr.name="variable_index" attr.type="int"/>"#)?;
    writeln!(out, r#"<key id="n_variable_id" for="node" attr.name="variable_id" attr.type="int"/>"#)?;
    writeln!(out, r#"<key id="n_label" for="node" attr.name="label" attr.type="string"/>"#)?;
    if weighted {
        writeln!(out, r#"<key id="e_cardinality" for="edge" attr.name="cardinality" attr.type="int"/>"#)?;
        writeln!(out, r#"<key id="e_weight" for="edge" attr.name="weight" attr.type="double"/>"#)?;
    }
    Ok(())
}

fn write_footer(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "</graph>")?;
    writeln!(out, "</graphml>")
}

fn write_variable(out: &mut impl Write, variable: u32, name: Option<(&str, usize)>) -> io::Result<()> {
    writeln!(out, r#"<node id="v{variable}">"#)?;
    writeln!(out, r#"<data key="n_variable_id">{variable}</data>"#)?;
    if let Some((name, index)) = name {
        writeln!(out, r#"<data key="n_variable_name">{name}</data>"#)?;
        writeln!(out, r#"<data key="n_variable_index">{index}</data>"#)?;
    }
    write!(out, r#"<data key="n_label">"#)?;
    if let Some((name, index)) = name {
        write!(out, "{name}[{index}]({variable})")?;
    } else {
        write!(out, "{variable}")?;
    }
    writeln!(out, "</data>")?;
    writeln!(out, "</node>")
}

/// Writes a node per variable. Variables that are the first occurrence of a
/// named sequence entry get that name and index as labels; every other
/// variable (including later entries of the same name, matching the
/// reference writer's "first named occurrence wins" rule) falls back to its
/// bare numeric id.
fn write_variables(out: &mut impl Write, cnf: &Cnf, named: &NamedVariables) -> io::Result<()> {
    let mut labels: BTreeMap<u32, (String, usize)> = BTreeMap::new();
    for (name, index, literal) in named.iter() {
        if crate::variables::is_variable_reference(literal) {
            labels
                .entry(variable_id(literal))
                .or_insert_with(|| (name.to_string(), index));
        }
    }
    for variable in 0..cnf.variables_size() {
        let label = labels.get(&variable).map(|(name, index)| (name.as_str(), *index));
        write_variable(out, variable, label)?;
    }
    Ok(())
}

fn edge_key(a: u32, b: u32) -> u64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    ((high as u64) << 32) | low as u64
}

fn write_clauses_unweighted(out: &mut impl Write, cnf: &Cnf) -> io::Result<()> {
    let mut existing_edges = std::collections::BTreeSet::new();
    for offset in cnf.sorted_clause_offsets() {
        let record = cnf.clause_at(offset);
        let literals = &record[1..];
        for i in 0..literals.len() {
            for j in (i + 1)..literals.len() {
                let source = variable_id(literals[i]);
                let target = variable_id(literals[j]);
                let key = edge_key(source, target);
                if existing_edges.insert(key) {
                    writeln!(out, r#"<edge source="v{source}" target="v{target}"/>"#)?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Default)]
struct EdgeData {
    cardinality: u32,
    weight: f64,
}

fn write_clauses_weighted(out: &mut impl Write, cnf: &Cnf) -> io::Result<()> {
    let mut existing_edges: BTreeMap<u64, EdgeData> = BTreeMap::new();
    for offset in cnf.sorted_clause_offsets() {
        let record = cnf.clause_at(offset);
        let header = record[0];
        let size = crate::clause::header_size(header);
        let literals = &record[1..];
        if literals.len() < 2 {
            continue;
        }
        // matches the reference writer: only widths 1..=3 pull a sibling
        // count out of the aggregation flags; width 4 and above count as 1
        let cardinality = if size < 4 {
            crate::clause::cardinality(crate::clause::header_flags(header))
        } else {
            1
        };
        let weight = 2.0 * cardinality as f64 / (literals.len() as f64 * (literals.len() as f64 - 1.0));

        for i in 0..literals.len() {
            for j in (i + 1)..literals.len() {
                let source = variable_id(literals[i]);
                let target = variable_id(literals[j]);
                let key = edge_key(source, target);
                let entry = existing_edges.entry(key).or_default();
                entry.cardinality += cardinality;
                entry.weight += weight;
            }
        }
    }
    for (key, data) in existing_edges {
        let source = (key & 0xFFFF_FFFF) as u32;
        let target = (key >> 32) as u32;
        writeln!(out, r#"<edge source="v{source}" target="v{target}">"#)?;
        writeln!(out, r#"<data key="e_cardinality">{}</data>"#, data.cardinality)?;
        writeln!(out, r#"<data key="e_weight">{}</data>"#, data.weight)?;
        writeln!(out, "</edge>")?;
    }
    Ok(())
}

/// Writes `cnf` as GraphML to `out`. `named` supplies optional node labels;
/// pass `&NamedVariables::new()` for none. `weighted` selects the
/// cardinality/weight-annotated edge variant.
pub fn write(out: &mut impl Write, cnf: &Cnf, named: &NamedVariables, weighted: bool) -> io::Result<()> {
    write_header(out, weighted)?;
    write_variables(out, cnf, named)?;
    if weighted {
        write_clauses_weighted(out, cnf)?;
    } else {
        write_clauses_unweighted(out, cnf)?;
    }
    write_footer(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::make_literal;

    fn sample_cnf() -> Cnf {
        let mut cnf = Cnf::new();
        cnf.initialize(3, 2);
        cnf.append_clause(&[make_literal(0, false), make_literal(1, false)]);
        cnf.append_clause(&[make_literal(1, false), make_literal(2, true)]);
        cnf
    }

    #[test]
    fn unweighted_output_contains_one_edge_per_pair() {
        let cnf = sample_cnf();
        let mut buffer = Vec::new();
        write(&mut buffer, &cnf, &NamedVariables::new(), false).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains(r#"<node id="v0">"#));
        assert!(text.contains(r#"source="v0" target="v1""#));
        assert!(text.contains(r#"source="v1" target="v2""#));
        assert!(!text.contains("e_weight"));
    }

    #[test]
    fn weighted_output_includes_cardinality_and_weight_keys() {
        let cnf = sample_cnf();
        let mut buffer = Vec::new();
        write(&mut buffer, &cnf, &NamedVariables::new(), true).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("e_cardinality"));
        assert!(text.contains("e_weight"));
    }

    #[test]
    fn named_variable_relabels_its_node() {
        let cnf = sample_cnf();
        let mut named = NamedVariables::new();
        named.insert("x", vec![make_literal(0, false)]);
        let mut buffer = Vec::new();
        write(&mut buffer, &cnf, &named, false).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("x[0](0)"));
    }
}
