/*
Named-variable bookkeeping, the `Formula` base the original keeps separate
from the CNF store proper. A name (e.g. an encoder's "x" or "carry") can map
to more than one variable when it names a multi-bit sequence, hence a
multimap rather than a plain map; GraphML labeling (graphml.rs) is the only
core-adjacent consumer.
*/

use multimap::MultiMap;

use crate::literal::{is_negated, variable_id, Literal, VariableId};

/// Maps a human-readable name to the literals that make it up, in bit order
/// (least significant first, matching the original's big-endian-on-output,
/// little-endian-in-memory convention).
#[derive(Debug, Clone, Default)]
pub struct NamedVariables {
    entries: MultiMap<String, Literal>,
}

impl NamedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, literals: impl IntoIterator<Item = Literal>) {
        let name = name.into();
        for literal in literals {
            self.entries.insert(name.clone(), literal);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, index_within_sequence, literal)` triples in
    /// insertion order within each name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, Literal)> {
        self.entries.iter_all().flat_map(|(name, literals)| {
            literals
                .iter()
                .enumerate()
                .map(move |(index, &literal)| (name.as_str(), index, literal))
        })
    }

    /// First variable id bound to `name`, if any, ignoring sign.
    pub fn first_variable(&self, name: &str) -> Option<VariableId> {
        self.entries
            .get_vec(name)
            .and_then(|literals| literals.first())
            .map(|&literal| variable_id(literal))
    }
}

/// True when `literal` is in its "variable" (positive, unsigned) form, the
/// only form meaningful as a named-variable reference.
pub fn is_variable_reference(literal: Literal) -> bool {
    !is_negated(literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::make_literal;

    #[test]
    fn tracks_multi_bit_sequences_in_order() {
        let mut named = NamedVariables::new();
        named.insert("x", vec![make_literal(0, false), make_literal(1, false), make_literal(2, false)]);
        let collected: Vec<(String, usize, Literal)> = named
            .iter()
            .map(|(name, index, literal)| (name.to_string(), index, literal))
            .collect();
        assert_eq!(
            collected,
            vec![
                ("x".to_string(), 0, make_literal(0, false)),
                ("x".to_string(), 1, make_literal(1, false)),
                ("x".to_string(), 2, make_literal(2, false)),
            ]
        );
    }

    #[test]
    fn first_variable_ignores_sign() {
        let mut named = NamedVariables::new();
        named.insert("carry", vec![make_literal(7, true)]);
        assert_eq!(named.first_variable("carry"), Some(7));
        assert_eq!(named.first_variable("missing"), None);
    }
}
