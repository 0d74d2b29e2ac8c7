/*
DIMACS CNF text adapter: reads the standard "p cnf <variables> <clauses>"
format and feeds each parsed clause into `cnf::Cnf::append_clause`. Out of
scope for the core per the system specification; this is glue, kept
deliberately small.
*/

use std::io::BufRead;

use regex::Regex;

use crate::cnf::Cnf;
use crate::error::DimacsError;
use crate::literal::make_literal;

/// Reads DIMACS CNF text from `reader` into a freshly initialized `Cnf`.
/// Comment lines (`c ...`) and blank lines are skipped; the problem line
/// sets the variable count used to validate each literal and sizes the
/// clause-count hint passed to `Cnf::initialize`.
pub fn read(reader: impl BufRead) -> Result<Cnf, DimacsError> {
    // tolerant of extra whitespace between the three problem-line fields
    let problem_line = Regex::new(r"^p\s+cnf\s+(\d+)\s+(\d+)\s*$").unwrap();

    let mut cnf = Cnf::new();
    let mut declared_variables: Option<u32> = None;
    let mut pending_literals: Vec<i64> = Vec::new();
    let mut last_line_number = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        last_line_number = line_number;
        let line = line.map_err(DimacsError::Io)?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }

        if trimmed.starts_with('p') {
            let captures = problem_line
                .captures(trimmed)
                .ok_or_else(|| DimacsError::MalformedProblemLine { line: line_number, text: trimmed.to_string() })?;
            let variables: u32 = captures[1]
                .parse()
                .map_err(|_| DimacsError::MalformedProblemLine { line: line_number, text: trimmed.to_string() })?;
            let clauses: u32 = captures[2]
                .parse()
                .map_err(|_| DimacsError::MalformedProblemLine { line: line_number, text: trimmed.to_string() })?;
            cnf.initialize(variables, clauses);
            declared_variables = Some(variables);
            continue;
        }

        let declared_variables = declared_variables.ok_or(DimacsError::MissingProblemLine { line: line_number })?;

        for token in trimmed.split_whitespace() {
            let value: i64 = token
                .parse()
                .map_err(|_| DimacsError::MalformedProblemLine { line: line_number, text: trimmed.to_string() })?;
            if value == 0 {
                append_pending_clause(&mut cnf, &mut pending_literals, declared_variables, line_number)?;
            } else {
                pending_literals.push(value);
            }
        }
    }

    if !pending_literals.is_empty() {
        return Err(DimacsError::UnterminatedClause { line: last_line_number });
    }

    Ok(cnf)
}

fn append_pending_clause(
    cnf: &mut Cnf,
    pending_literals: &mut Vec<i64>,
    declared_variables: u32,
    line_number: usize,
) -> Result<(), DimacsError> {
    let mut literals = Vec::with_capacity(pending_literals.len());
    for &value in pending_literals.iter() {
        let variable = value.unsigned_abs() as u32 - 1;
        if variable >= declared_variables {
            return Err(DimacsError::VariableOutOfRange {
                line: line_number,
                literal: value,
                variable,
                declared: declared_variables,
            });
        }
        literals.push(make_literal(variable, value < 0));
    }
    cnf.append_clause(&literals);
    pending_literals.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_a_small_formula() {
        let text = "c a comment\np cnf 3 2\n1 -2 0\n2 3 0\n";
        let cnf = read(Cursor::new(text)).unwrap();
        assert_eq!(cnf.variables_size(), 3);
        assert_eq!(cnf.clauses_size(0, false), 2);
    }

    #[test]
    fn rejects_clause_before_problem_line() {
        let text = "1 2 0\n";
        let error = read(Cursor::new(text)).unwrap_err();
        assert!(matches!(error, DimacsError::MissingProblemLine { line: 1 }));
    }

    #[test]
    fn rejects_out_of_range_variable() {
        let text = "p cnf 2 1\n1 3 0\n";
        let error = read(Cursor::new(text)).unwrap_err();
        assert!(matches!(error, DimacsError::VariableOutOfRange { .. }));
    }

    #[test]
    fn tolerates_extra_whitespace_in_problem_line() {
        let text = "p  cnf   2   1\n1 2 0\n";
        let cnf = read(Cursor::new(text)).unwrap();
        assert_eq!(cnf.variables_size(), 2);
    }
}
