//! Command-line tool for measuring model response times.
//!
//! Every model answers the same question a few times in a row.  The first answer
//! usually includes loading the model into memory, so the report also shows how much
//! faster the second answer was.
//!
//! # Usage
//!
//! ```bash
//! # Benchmark the default model list
//! klatsch-bench
//!
//! # Benchmark specific models with three runs each
//! klatsch-bench --runs 3 llama3 mistral
//!
//! # Ask something else and get JSON output
//! klatsch-bench --prompt "Warum ist der Himmel blau?" --format json gemma3:1b
//! ```

use std::time::Duration;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use klatsch::Ollama;
use klatsch::benchmark::{
    BenchmarkReport, DEFAULT_MODELS, DEFAULT_PROMPT, DEFAULT_RUNS, RunTiming, benchmark_models,
};

/// Output format for displaying benchmark results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum OutputFormat {
    /// Plain text format (default) - human-readable output.
    #[default]
    Text,
    /// JSON format - structured output suitable for parsing.
    Json,
    /// YAML format - structured output in YAML format.
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    /// Accepts "text", "json", "yaml", or "yml" (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Invalid output format: {s}. Valid options: text, json, yaml"
            )),
        }
    }
}

/// Command-line arguments for the klatsch-bench tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
struct Args {
    /// Output format for results (text, json, yaml).
    #[arrrg(optional, "Output format: text, json, yaml", "FORMAT")]
    format: Option<String>,

    /// Question asked of every model.
    #[arrrg(optional, "Prompt sent to every model", "PROMPT")]
    prompt: Option<String>,

    /// Requests per model.
    #[arrrg(optional, "Runs per model (default: 2)", "N")]
    runs: Option<usize>,

    /// Address of the model server.
    #[arrrg(optional, "Model server address (default: $OLLAMA_HOST or localhost:11434)", "URL")]
    host: Option<String>,

    /// Per-request timeout.
    #[arrrg(optional, "Timeout in seconds (default: 60)", "SECS")]
    timeout_secs: Option<u64>,
}

/// Main entry point for the klatsch-bench command-line tool.
///
/// Models are taken from the free arguments; without any, a default list of common
/// models is benchmarked.  Models that are not installed show up as failed runs.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, models) = Args::from_command_line_relaxed("klatsch-bench [OPTIONS] [MODELS]...");

    let output_format = if let Some(format_str) = args.format {
        format_str
            .parse()
            .map_err(|e| format!("Invalid format: {e}"))?
    } else {
        OutputFormat::Text
    };
    let models: Vec<String> = if models.is_empty() {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        models
    };
    let prompt = args.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    let runs = args.runs.unwrap_or(DEFAULT_RUNS);
    let client = Ollama::with_options(args.host, args.timeout_secs.map(Duration::from_secs))?;

    eprintln!(
        "Benchmarking {} models at {} with: {prompt:?}",
        models.len(),
        client.base_url()
    );
    let report = benchmark_models(&client, models.as_slice(), &prompt, runs).await;

    match output_format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
    }

    Ok(())
}

fn print_text(report: &BenchmarkReport) {
    println!("=== Benchmark results ===");
    for result in &report.results {
        println!("Model: {}", result.model);
        if result.runs.iter().all(|run| run.seconds().is_none()) {
            println!("  Failed or model not installed.");
        }
        for (i, run) in result.runs.iter().enumerate() {
            match run {
                RunTiming::Completed { seconds } => {
                    println!("  Run {}: {seconds:.4} seconds", i + 1);
                }
                RunTiming::Failed { error } => {
                    println!("  Run {}: failed ({error})", i + 1);
                }
            }
        }
        if let Some(improvement) = result.improvement_percent() {
            println!("  Improvement (run 2 vs. run 1): {improvement:.2}%");
        }
    }
}
