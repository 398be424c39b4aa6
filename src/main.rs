use clap::Parser as ArgParser;
use hdlsim::{
    run_tests, FileReader, HdlProvider, SignalMap, Simulator, DEFAULT_MAX_ITERATIONS,
};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Simulates combinational HDL chips and checks them against test vectors.
#[derive(ArgParser)]
#[clap(version)]
struct Cli {
    /// HDL file containing the chip to simulate
    chip: PathBuf,

    /// Test vector file (`a,b;out` header, then `0,1;1` lines)
    vectors: Option<PathBuf>,

    /// Prints the chip's truth table
    #[clap(short, long, action)]
    table: bool,

    /// Prints results as JSON
    #[clap(short, long, action)]
    json: bool,

    /// Passes over a chip's parts before giving up on it settling
    #[clap(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Logs chip loading and scheduling
    #[clap(short, long, action)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the process exit code: 0 when every vector passes, 1 otherwise.
fn run(cli: &Cli) -> Result<i32, Box<dyn Error>> {
    let base_path = match cli.chip.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let provider: Rc<dyn HdlProvider> = Rc::new(FileReader::new(&base_path));
    let mut simulator = Simulator::new(provider).with_max_iterations(cli.max_iterations);

    if let Some(vectors) = &cli.vectors {
        let report = run_tests(&mut simulator, &cli.chip, vectors)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", report);
        }
        return Ok(if report.all_passed() { 0 } else { 1 });
    }

    let chip = simulator.parse_file(&cli.chip)?;

    if cli.table {
        let table = simulator.truth_table(&chip)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&table)?);
        } else {
            print!("{}", table);
        }
        return Ok(0);
    }

    // No vectors and no table: simulate with every input at 0 to surface
    // resolution and pin errors.
    let outputs = simulator.simulate(&chip, &SignalMap::new())?;
    if cli.json {
        println!("{}", serde_json::to_string(&outputs)?);
    } else {
        println!("{}: {}", chip.name, outputs);
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}
