// Thin CLI: read a JSON AST dump, run the analyzer, write a JSON report.

use clap::Parser;
use std::io::Write as _;

/// Command-line arguments.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the input JSON AST dump.
    input_file: String,
    /// Path to write the JSON report to.
    output_file: String,
    /// Log level passed through to `env_logger` (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

pub fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level)).init();

    let input = std::fs::read_to_string(&args.input_file)
        .unwrap_or_else(|_| panic!("could not read the input file {}", args.input_file));

    let report = flowtutor::analyze_source(&input);

    let output = serde_json::to_string_pretty(&report).expect("report serialization cannot fail");

    let mut w = std::fs::File::create(&args.output_file)
        .unwrap_or_else(|_| panic!("could not create the output file {}", args.output_file));
    w.write_all(output.as_bytes())
        .unwrap_or_else(|_| panic!("failed to write the report to {}", args.output_file));
}
