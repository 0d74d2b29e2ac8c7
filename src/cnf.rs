/*
CNF store (C5): owns the clause buffer and the per-leading-variable AVL
index, and implements the append/normalize/aggregate/merge algorithm that is
the reason this crate exists. Everything below it (container.rs,
container_index.rs, avl_index.rs, literal.rs, clause.rs) is a load-bearing
but otherwise uninteresting layer; this is where the interesting invariants
(I1-I6 in the data model) are actually enforced.
*/

use std::cmp::Ordering;

use tracing::trace;

use crate::avl_index::{AvlTreesIndex, InsertionPoint};
use crate::clause::{
    compare_clauses, header_flags, header_size, is_aggregated, normalize_clause, pack_header, set_header_flags,
};
use crate::container::{GrowableBuffer, CONTAINER_END};
use crate::literal::{variable_id, Literal, VariableGenerator, VariableId};

/// Words reserved per clause when `initialize` preallocates the buffer: one
/// header word plus an assumed average of 3 literals.
const WORDS_PER_CLAUSE_HINT: u32 = 4;

/// Running counters exposed for diagnostics/logging, not consulted by the
/// append algorithm itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub clauses_appended: u64,
    pub clauses_merged: u64,
    pub clauses_split: u64,
    pub tautologies_discarded: u64,
    pub rollbacks: u64,
}

/// The append-only, self-indexing CNF clause store.
#[derive(Debug, Clone)]
pub struct Cnf {
    clauses: GrowableBuffer<u32>,
    l0_index: AvlTreesIndex,
    variables: VariableGenerator,
    /// Buffer size at `transaction_begin`; 0 when no transaction is open.
    immutable_offset: u32,
    stats: Stats,
}

impl Default for Cnf {
    fn default() -> Self {
        let mut cnf = Self {
            clauses: GrowableBuffer::new(),
            l0_index: AvlTreesIndex::new(),
            variables: VariableGenerator::new(),
            immutable_offset: 0,
            stats: Stats::default(),
        };
        cnf.initialize(0, 0);
        cnf
    }
}

impl Cnf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the store to `variables_size` known variables and preallocates
    /// room for roughly `clause_count_hint` clauses.
    pub fn initialize(&mut self, variables_size: VariableId, clause_count_hint: u32) {
        assert_eq!(self.immutable_offset, 0, "cannot initialize while a transaction is open");
        self.clauses.reset(clause_count_hint * WORDS_PER_CLAUSE_HINT);
        self.l0_index.reset(variables_size, 0);
        self.variables.reset(variables_size);
        self.stats = Stats::default();
    }

    pub fn variable_generator(&mut self) -> &mut VariableGenerator {
        &mut self.variables
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn variables_size(&self) -> VariableId {
        self.variables.size()
    }

    /// Allocates a fresh variable id and grows the index's instance table to
    /// match, so the new variable is addressable as a leading-variable key.
    pub fn new_variable(&mut self) -> VariableId {
        let id = self.variables.next();
        self.l0_index.reset_instances_size(self.variables.size());
        id
    }

    /// Appends a clause given as an unsorted, possibly redundant literal
    /// list. Tautologies and pure duplicate literals are silently dropped by
    /// normalization; everything else is merged into or added alongside the
    /// existing index.
    pub fn append_clause(&mut self, literals: &[Literal]) {
        assert!(!literals.is_empty(), "append_clause requires a non-empty clause");
        assert!(
            literals.len() as u32 <= crate::clause::MAX_CLAUSE_SIZE,
            "clause exceeds the maximum representable width"
        );

        let mut tentative: Vec<u32> = Vec::with_capacity(literals.len() + 1);
        tentative.push(pack_header(literals.len() as u16, 0));
        tentative.extend_from_slice(literals);

        let normalized_size = normalize_clause(&mut tentative[1..]);
        if normalized_size == 0 {
            self.stats.tautologies_discarded += 1;
            trace!("discarding tautological clause");
            return;
        }
        tentative.truncate(1 + normalized_size as usize);
        tentative[0] = pack_header(normalized_size, 0);

        self.append_clause_record(&mut tentative, false, InsertionPoint::uninitialized());
    }

    /// Convenience wrapper for a clause given as a fixed-size array, the
    /// idiomatic stand-in for the variadic `append_clause(...)` overload.
    pub fn append_clause_l<const N: usize>(&mut self, literals: [Literal; N]) {
        self.append_clause(&literals);
    }

    /// The core append algorithm (`__append_clause<avoid_merging>` in the
    /// original naming). `tentative` is the header word followed by sorted,
    /// duplicate- and tautology-free literal words; it has not been
    /// committed to `self.clauses` yet.
    fn append_clause_record(&mut self, tentative: &mut [u32], avoid_merging: bool, mut insertion_point: InsertionPoint) {
        let literals_size = header_size(tentative[0]);
        assert_ne!(literals_size, 0);
        debug_assert!(
            tentative[1..].windows(2).all(|pair| pair[0] < pair[1]),
            "tentative record is not strictly ascending"
        );

        if is_aggregated(literals_size) && header_flags(tentative[0]) == 0 {
            let bitmap = crate::clause::aggregate_in_place(&mut tentative[1..]);
            tentative[0] = pack_header(literals_size, 1u16 << bitmap);
        }

        let leading_variable = variable_id(tentative[1]);
        if !self.l0_index.is_valid_insertion_point(&insertion_point) {
            insertion_point = {
                let clauses = &self.clauses;
                let tentative_ref = &*tentative;
                self.l0_index.find(leading_variable, |candidate| {
                    compare_clauses(tentative_ref, &clauses.as_slice()[candidate as usize..])
                })
            };
        }

        let existing_offset = insertion_point.container_offset;
        let mut is_split = false;

        if is_aggregated(literals_size)
            && ((avoid_merging && existing_offset != CONTAINER_END) || existing_offset < self.immutable_offset)
        {
            let existing_header = *self.clauses.get(existing_offset);
            let merged_flags = header_flags(tentative[0]) | header_flags(existing_header);
            tentative[0] = set_header_flags(tentative[0], merged_flags);
            is_split = true;
        }

        if existing_offset == CONTAINER_END || is_split {
            let new_offset = self.clauses.len();
            self.l0_index.append(&insertion_point, new_offset);
            self.clauses.extend_from_slice(tentative);
            self.stats.clauses_appended += 1;
            if is_split {
                self.stats.clauses_split += 1;
                trace!(offset = new_offset, shadowed = existing_offset, "split: shadowing an immutable aggregated record");
            }
        } else if is_aggregated(literals_size) {
            let merged_flags = header_flags(*self.clauses.get(existing_offset)) | header_flags(tentative[0]);
            let existing = self.clauses.get_mut(existing_offset);
            *existing = set_header_flags(*existing, merged_flags);
            self.stats.clauses_merged += 1;
            trace!(offset = existing_offset, "merged into existing aggregated record");
        } else {
            panic!(
                "duplicate of an existing non-aggregated clause at offset {existing_offset}: caller emitted the same derived clause twice"
            );
        }
    }

    /// Number of clauses, optionally restricted to `width` literals
    /// (`width == 0` means "all widths"). When `aggregated` is false (the
    /// default), each aggregated record is counted once per concrete sibling
    /// it stands for rather than once per record.
    pub fn clauses_size(&self, width: u16, aggregated: bool) -> u32 {
        let mut count = 0u32;
        self.for_each_record(|header, _literals| {
            let size = header_size(header);
            if width == 0 || width == size {
                count += if !aggregated && is_aggregated(size) {
                    crate::clause::cardinality(header_flags(header))
                } else {
                    1
                };
            }
        });
        count
    }

    /// Total literal-word count across all clauses, with the same
    /// concrete-sibling expansion rule as `clauses_size` when `aggregated`
    /// is false.
    pub fn literals_size(&self, aggregated: bool) -> u32 {
        let mut count = 0u32;
        self.for_each_record(|header, _literals| {
            let size = header_size(header);
            count += if !aggregated && is_aggregated(size) {
                crate::clause::cardinality(header_flags(header)) * size as u32
            } else {
                size as u32
            };
        });
        count
    }

    fn for_each_record(&self, mut visit: impl FnMut(u32, &[u32])) {
        let buf = self.clauses.as_slice();
        let mut offset = 0usize;
        while offset < buf.len() {
            let header = buf[offset];
            let size = header_size(header) as usize;
            visit(header, &buf[offset + 1..offset + 1 + size]);
            offset += size + 1;
        }
    }

    /// The raw words of the record at `offset`: header word followed by its
    /// literal words.
    pub fn clause_at(&self, offset: u32) -> &[u32] {
        let buf = self.clauses.as_slice();
        let size = header_size(buf[offset as usize]) as usize;
        &buf[offset as usize..offset as usize + 1 + size]
    }

    /// Human-readable dump of the record at `offset`, one concrete sibling
    /// clause per line of `(lit, lit, ...)`, matching `print_clause` from the
    /// original tool's debug output. Used by tracing events and tests, not by
    /// the append algorithm itself.
    pub fn format_clause(&self, offset: u32) -> String {
        self.expand_clause(offset)
            .iter()
            .map(|sibling| {
                let rendered: Vec<String> = sibling
                    .iter()
                    .map(|&literal| {
                        let variable = variable_id(literal);
                        if crate::literal::is_negated(literal) {
                            format!("-{variable}")
                        } else {
                            format!("{variable}")
                        }
                    })
                    .collect();
                format!("({})", rendered.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Expands the record at `offset` into its concrete sibling clauses: one
    /// `Vec<Literal>` per set bit of its flags field, or the single literal
    /// sequence as-is for non-aggregated records.
    pub fn expand_clause(&self, offset: u32) -> Vec<Vec<Literal>> {
        let record = self.clause_at(offset);
        let header = record[0];
        let size = header_size(header);
        let literals = &record[1..];
        if !is_aggregated(size) {
            return vec![literals.to_vec()];
        }
        let flags = header_flags(header);
        let mut siblings = Vec::with_capacity(flags.count_ones() as usize);
        for pattern in 0..crate::clause::flags_bit_width(size) as u16 {
            if flags & (1 << pattern) == 0 {
                continue;
            }
            let sibling: Vec<Literal> = literals
                .iter()
                .enumerate()
                .map(|(position, &canonical)| crate::clause::expand_aggregated_literal(canonical, position, pattern))
                .collect();
            siblings.push(sibling);
        }
        siblings
    }

    /// Clause offsets in index order: non-decreasing under the clause
    /// comparator within each leading variable's instance, variables visited
    /// in ascending id order.
    pub fn sorted_clause_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.l0_index.in_order_iter()
    }

    /// Clause offsets whose first literal's variable is `variable`, in
    /// comparator order.
    pub fn variable_clause_offsets(&self, variable: VariableId) -> impl Iterator<Item = u32> + '_ {
        self.l0_index.instance_iter(variable)
    }

    pub fn is_clause_immutable(&self, offset: u32) -> bool {
        offset < self.immutable_offset
    }

    /// Whether a transaction is currently open. `immutable_offset == 0` is
    /// ambiguous on its own (it also means "store was empty at begin"), so
    /// this defers to the index's own transaction bookkeeping, which is
    /// unambiguous regardless of how many clauses existed at `begin`.
    pub fn is_transaction_open(&self) -> bool {
        self.l0_index.is_transaction_open()
    }

    /// Opens a transaction; not nestable.
    pub fn transaction_begin(&mut self) {
        self.l0_index.transaction_begin(self.clauses.len());
        self.immutable_offset = self.clauses.len();
    }

    pub fn transaction_commit(&mut self) {
        self.l0_index.transaction_commit();
        self.immutable_offset = 0;
    }

    /// Rolls back to the pre-`transaction_begin` state. Because a split may
    /// have retargeted an index node to an offset that rollback is about to
    /// truncate away, this does not trust the index's own truncate-rollback:
    /// it truncates the buffer, discards the index outright, and re-inserts
    /// every surviving record from scratch.
    pub fn transaction_rollback(&mut self) {
        assert!(
            self.clauses.is_empty() || (self.immutable_offset > 0 && self.immutable_offset <= self.clauses.len()),
            "rollback with no open transaction"
        );
        let target_size = self.immutable_offset;
        let snapshot = self.l0_index.transaction_rollback_snapshot();
        self.clauses.truncate(target_size);
        self.l0_index.reset(snapshot.instances_size, 0);

        let mut offset = 0u32;
        while offset < self.clauses.len() {
            let header = *self.clauses.get(offset);
            let size = header_size(header);
            let record_len = size as u32 + 1;
            let leading_variable = variable_id(*self.clauses.get(offset + 1));

            let point = {
                let clauses = &self.clauses;
                self.l0_index.find(leading_variable, |candidate| {
                    compare_clauses(&clauses.as_slice()[offset as usize..], &clauses.as_slice()[candidate as usize..])
                })
            };
            assert_eq!(
                point.container_offset, CONTAINER_END,
                "rebuild found two records at the same offset {offset} - buffer is corrupt"
            );
            self.l0_index.append(&point, offset);

            offset += record_len;
        }

        self.immutable_offset = 0;
        self.stats.rollbacks += 1;
        trace!(restored_size = target_size, "transaction rolled back, index rebuilt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::make_literal;

    fn lit(variable: VariableId, negated: bool) -> Literal {
        make_literal(variable, negated)
    }

    #[test]
    fn aggregates_two_clauses_sharing_a_variable_set() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        // literal words 3 = lit(1, true), 5 = lit(2, true)
        cnf.append_clause(&[3, 5]);
        cnf.append_clause(&[5, 3]);
        assert_eq!(cnf.clauses_size(0, true), 1, "single aggregated record");
        assert_eq!(cnf.clauses_size(0, false), 1, "one concrete sibling so far");
    }

    #[test]
    fn merges_complementary_sign_pattern_into_existing_aggregate() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        cnf.append_clause(&[3, 5]); // v1 neg, v2 neg
        cnf.append_clause(&[2, 4]); // v1 pos, v2 pos
        assert_eq!(cnf.clauses_size(0, true), 1);
        assert_eq!(cnf.clauses_size(0, false), 2);

        let offset = cnf.sorted_clause_offsets().next().unwrap();
        let header = cnf.clause_at(offset)[0];
        assert_eq!(header_flags(header), 9);
    }

    #[test]
    fn discards_tautologies() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        cnf.append_clause(&[3, 2]); // v1 and not v1
        assert_eq!(cnf.clauses_size(0, false), 0);
        assert_eq!(cnf.literals_size(false), 0);
    }

    #[test]
    fn two_records_share_a_leading_variable_tree() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 8);
        cnf.append_clause(&[3, 5]);
        cnf.append_clause(&[5, 3]);
        cnf.append_clause(&[3, 7]); // width-2 clause leading on variable 1 too, distinct variable set
        let leading: Vec<VariableId> = cnf
            .sorted_clause_offsets()
            .map(|offset| variable_id(cnf.clause_at(offset)[1]))
            .collect();
        assert_eq!(leading.iter().filter(|&&v| v == 1).count(), 2);
    }

    #[test]
    fn rollback_restores_empty_store_and_allows_reappending() {
        let mut cnf = Cnf::new();
        cnf.initialize(20, 10);
        cnf.transaction_begin();
        for i in 0..10u32 {
            let a = lit(i * 2, false);
            let b = lit(i * 2 + 1, false);
            let c = lit(i * 2 + 2, true);
            cnf.append_clause(&[a, b, c]);
        }
        assert!(cnf.clauses_size(0, true) > 0);
        cnf.transaction_rollback();
        assert_eq!(cnf.clauses_size(0, true), 0);
        assert_eq!(cnf.literals_size(true), 0);

        // re-appending the same clauses must not hit the duplicate-fatal path
        for i in 0..10u32 {
            let a = lit(i * 2, false);
            let b = lit(i * 2 + 1, false);
            let c = lit(i * 2 + 2, true);
            cnf.append_clause(&[a, b, c]);
        }
        assert_eq!(cnf.clauses_size(0, true), 10);
    }

    #[test]
    #[should_panic(expected = "duplicate of an existing non-aggregated clause")]
    fn duplicate_wide_clause_is_fatal() {
        let mut cnf = Cnf::new();
        cnf.initialize(10, 4);
        let wide: Vec<Literal> = (0..5).map(|v| lit(v, false)).collect();
        cnf.append_clause(&wide);
        cnf.append_clause(&wide);
    }

    #[test]
    fn transaction_shadows_an_immutable_aggregated_record() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        cnf.append_clause(&[3, 5]); // pre-transaction, immutable once begin() is called
        let offset_before = cnf.sorted_clause_offsets().next().unwrap();

        cnf.transaction_begin();
        assert!(cnf.is_clause_immutable(offset_before));
        cnf.append_clause(&[2, 4]); // same variable set, must split rather than mutate in place
        let offsets_during: Vec<u32> = cnf.sorted_clause_offsets().collect();
        assert_eq!(offsets_during.len(), 1, "index points only at the new shadowing record");
        assert_ne!(offsets_during[0], offset_before);
        cnf.transaction_commit();
    }

    #[test]
    fn clauses_size_counts_aggregated_siblings() {
        let mut cnf = Cnf::new();
        cnf.initialize(6, 4);
        cnf.append_clause(&[lit(1, false), lit(2, false)]);
        cnf.append_clause(&[lit(1, true), lit(2, true)]);
        cnf.append_clause(&[lit(1, false), lit(2, true)]);
        assert_eq!(cnf.clauses_size(2, true), 1);
        assert_eq!(cnf.clauses_size(2, false), 3);
        assert_eq!(cnf.literals_size(false), 6);
    }

    #[test]
    fn format_clause_renders_signed_variable_ids() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        cnf.append_clause(&[lit(1, true), lit(2, false)]);
        let offset = cnf.sorted_clause_offsets().next().unwrap();
        assert_eq!(cnf.format_clause(offset), "(-1, 2)");
    }

    #[test]
    fn expand_clause_recovers_concrete_siblings() {
        let mut cnf = Cnf::new();
        cnf.initialize(4, 4);
        cnf.append_clause(&[lit(1, true), lit(2, true)]);
        cnf.append_clause(&[lit(1, false), lit(2, false)]);
        let offset = cnf.sorted_clause_offsets().next().unwrap();
        let mut siblings = cnf.expand_clause(offset);
        for sibling in siblings.iter_mut() {
            sibling.sort_unstable();
        }
        siblings.sort();
        let mut expected = vec![
            vec![lit(1, true), lit(2, true)],
            vec![lit(1, false), lit(2, false)],
        ];
        expected.sort();
        assert_eq!(siblings, expected);
    }
}
