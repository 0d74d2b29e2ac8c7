/*
Adapter-layer errors. The core store treats data-structure invariant
violations as fatal (see `cnf::Cnf`, which panics on them per the library's
own contract) but the DIMACS/GraphML/CLI adapters sit at a real I/O and
text-parsing boundary, so they get ordinary `Result`-returning errors instead.
*/

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DimacsError {
    #[error("failed to read DIMACS input: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: no 'p cnf <variables> <clauses>' problem line before the first clause")]
    MissingProblemLine { line: usize },

    #[error("line {line}: malformed problem line {text:?}")]
    MalformedProblemLine { line: usize, text: String },

    #[error("line {line}: clause does not end with a trailing 0")]
    UnterminatedClause { line: usize },

    #[error("line {line}: literal {literal} references variable {variable}, outside the declared range of {declared} variables")]
    VariableOutOfRange {
        line: usize,
        literal: i64,
        variable: u32,
        declared: u32,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Dimacs(#[from] DimacsError),

    #[error("failed to write GraphML output: {0}")]
    Io(#[from] io::Error),

    #[error("usage: cgraph [-w] <input.cnf> [<output.graphml>]")]
    Usage,
}
