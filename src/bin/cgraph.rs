/*
The reference CLI: `cgraph [-w] <input.cnf> [<output.graphml>]`.

Reads a DIMACS CNF file into a `Cnf` store, then writes a GraphML graph of
variable co-occurrence to `<output.graphml>` (defaulting to `<input>.graphml`
when omitted). `-w` selects the weighted writer. This is glue over the core
library, kept deliberately small, matching the original tool's `main.cpp`.
*/

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bal::error::CliError;
use bal::variables::NamedVariables;
use bal::{dimacs, graphml};

struct Args {
    weighted: bool,
    input: PathBuf,
    output: PathBuf,
}

fn parse_args() -> Result<Args, CliError> {
    let mut weighted = false;
    let mut positionals = Vec::new();

    for arg in std::env::args().skip(1) {
        if arg == "-w" {
            weighted = true;
        } else {
            positionals.push(arg);
        }
    }

    let input = positionals.first().ok_or(CliError::Usage)?;
    let input = PathBuf::from(input);
    let output = match positionals.get(1) {
        Some(path) => PathBuf::from(path),
        None => default_output_path(&input),
    };

    Ok(Args { weighted, input, output })
}

fn default_output_path(input: &Path) -> PathBuf {
    let mut output = input.to_path_buf();
    output.set_extension("graphml");
    output
}

fn run() -> Result<(), CliError> {
    let args = parse_args()?;

    let input_file = File::open(&args.input).map_err(CliError::Io)?;
    let cnf = dimacs::read(BufReader::new(input_file))?;
    info!(
        variables = cnf.variables_size(),
        clauses = cnf.clauses_size(0, false),
        literals = cnf.literals_size(false),
        stats = ?cnf.stats(),
        "parsed DIMACS input"
    );

    let output_file = File::create(&args.output).map_err(CliError::Io)?;
    let mut writer = BufWriter::new(output_file);
    graphml::write(&mut writer, &cnf, &NamedVariables::new(), args.weighted)?;
    info!(output = %args.output.display(), weighted = args.weighted, "wrote GraphML output");

    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage) => {
            eprintln!("{}", CliError::Usage);
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("cgraph: {error}");
            ExitCode::FAILURE
        }
    }
}
