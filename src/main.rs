use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snipeq::compare::{CompareConfig, SmtBlockComparator, StructuralComparator, Verdict};
use snipeq::error::CompareError;
use snipeq::ir::Function;
use snipeq::parser::{parse_function_file, ParseError};
use snipeq::semantics::smt::SolverConfig;
use snipeq::semantics::{Side, SmtScript, SnippetEncoder};

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "snipeq")]
#[command(about = "snipeq - SMT-based equivalence of divergent basic blocks")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// CLI side selection for variable prefixes
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum CliSide {
    /// Prefix variables with L_
    #[default]
    Left,
    /// Prefix variables with R_
    Right,
}

impl From<CliSide> for Side {
    fn from(cli: CliSide) -> Self {
        match cli {
            CliSide::Left => Side::Left,
            CliSide::Right => Side::Right,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two single-block functions
    Compare {
        /// Old version of the function
        left: PathBuf,
        /// New version of the function
        right: PathBuf,
        /// Solver time budget in seconds (0 or negative means unlimited)
        #[arg(long, default_value = "30", allow_negative_numbers = true)]
        smt_timeout: i64,
        /// Compare structurally only
        #[arg(long)]
        no_smt: bool,
        /// Print every SMT query
        #[arg(long)]
        dump_smt: bool,
        /// Enable verbose output
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the SMT-LIB2 encoding of a function's instructions
    Encode {
        /// Function to encode
        file: PathBuf,
        /// Which side's variable prefix to use
        #[arg(long, value_enum, default_value = "left")]
        side: CliSide,
    },
}

// Exit codes
const EXIT_EQUAL: u8 = 0;
const EXIT_NOT_EQUAL: u8 = 1;
const EXIT_UNSUPPORTED: u8 = 2;
const EXIT_TIMEOUT: u8 = 3;
const EXIT_INPUT: u8 = 4;

fn init_logging(verbose: bool, dump_smt: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if dump_smt {
        builder.filter_module("snipeq", LevelFilter::Info);
    }
    builder.format_timestamp(None).init();
}

fn load(path: &Path) -> Result<Function, ParseError> {
    parse_function_file(path)
}

fn error_exit_code(err: &CompareError) -> u8 {
    match err {
        CompareError::OutOfTime => EXIT_TIMEOUT,
        CompareError::NoSynchronizationPoint | CompareError::UnsupportedOperation(_) => {
            EXIT_UNSUPPORTED
        }
    }
}

fn run_compare(
    left: &Path,
    right: &Path,
    smt_timeout: i64,
    no_smt: bool,
    dump_smt: bool,
    verbose: bool,
) -> u8 {
    let (left_fn, right_fn) = match (load(left), load(right)) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) => {
            eprintln!("Error parsing {}: {}", left.display(), e);
            return EXIT_INPUT;
        }
        (_, Err(e)) => {
            eprintln!("Error parsing {}: {}", right.display(), e);
            return EXIT_INPUT;
        }
    };

    let config = CompareConfig {
        solver: SolverConfig::from_timeout_secs(smt_timeout),
        dump_smt,
    };
    let mut smt = (!no_smt).then(|| SmtBlockComparator::new(config));
    let mut structural = StructuralComparator::new();

    let result = structural.compare_functions(&left_fn, &right_fn, smt.as_mut());
    if verbose {
        if let Some(smt) = &smt {
            eprintln!("{}", smt.statistics());
        }
    }

    match result {
        Ok(verdict) => {
            println!("{}", verdict);
            match verdict {
                Verdict::Equivalent => EXIT_EQUAL,
                Verdict::NotEquivalent => EXIT_NOT_EQUAL,
            }
        }
        Err(err) => {
            println!("UNKNOWN ({}): {}", err.category(), err);
            error_exit_code(&err)
        }
    }
}

fn run_encode(file: &Path, side: Side) -> u8 {
    let function = match load(file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error parsing {}: {}", file.display(), e);
            return EXIT_INPUT;
        }
    };

    let mut script = SmtScript::new();
    let mut encoder = SnippetEncoder::new(&mut script);
    for inst in function.block.instructions.iter().filter(|i| !i.is_terminator()) {
        if let Err(err) = encoder.encode_instruction(side, inst) {
            eprintln!("Cannot encode `{}`: {}", inst, err);
            return error_exit_code(&err);
        }
    }
    print!("{}", script.to_smtlib());
    EXIT_EQUAL
}

// --- Main Function ---
fn main() -> ExitCode {
    let args = Args::parse();

    let code = match args.command {
        Commands::Compare {
            left,
            right,
            smt_timeout,
            no_smt,
            dump_smt,
            verbose,
        } => {
            init_logging(verbose, dump_smt);
            run_compare(&left, &right, smt_timeout, no_smt, dump_smt, verbose)
        }
        Commands::Encode { file, side } => {
            init_logging(false, false);
            run_encode(&file, side.into())
        }
    };
    ExitCode::from(code)
}
