use clap::{Parser, Subcommand};
use skip_markers::{EvaluationContext, Evaluator, IntoMarker, Registry, RunOptions, SourceLocation};
use tracing::Level;

/// Evaluate test skip markers against this machine.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run destructive tests. These tests can include adding or removing users
    /// from your system for example.
    #[arg(long, global = true)]
    run_destructive: bool,
    /// Run expensive tests. These tests usually involve costs like for example
    /// bootstrapping a cloud VM.
    #[arg(long, global = true)]
    run_expensive: bool,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a test carrying these markers would run.
    Eval {
        /// Marker expressions, e.g. `skip_on_windows` or `skip_on_env("CI", eq="1")`
        #[arg(required = true)]
        markers: Vec<String>,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the registered markers.
    Markers {
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // CLI flags only ever switch the opt-ins on.
    let env_opts = RunOptions::from_env();
    let opts = env_opts
        .with_destructive(env_opts.run_destructive || args.run_destructive)
        .with_expensive(env_opts.run_expensive || args.run_expensive);
    let evaluator = Evaluator::new(Registry::with_builtins(), EvaluationContext::system(opts));

    let code = match args.command {
        Command::Eval { markers, json } => eval(&evaluator, &markers, json),
        Command::Markers { json } => list(evaluator.registry(), json),
    };
    std::process::exit(code);
}

/// Exit status: 0 runs, 1 skips, 2 on marker errors.
fn eval(evaluator: &Evaluator, markers: &[String], json: bool) -> i32 {
    let location = SourceLocation::new("<command line>", 0, 0);
    let parsed = markers
        .iter()
        .map(IntoMarker::into_marker)
        .collect::<skip_markers::Result<Vec<_>>>();
    let decision = match parsed.and_then(|m| evaluator.evaluate_at(&m, location)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return 2;
        }
    };
    if json {
        match serde_json::to_string_pretty(&decision) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: {e}");
                return 2;
            }
        }
    } else {
        println!("{decision}");
    }
    i32::from(decision.skip)
}

fn list(registry: &Registry, json: bool) -> i32 {
    let specs = registry.specs();
    if json {
        return match serde_json::to_string_pretty(&specs) {
            Ok(out) => {
                println!("{out}");
                0
            }
            Err(e) => {
                eprintln!("error: {e}");
                2
            }
        };
    }
    for spec in specs {
        println!("{}: {}", spec.signature(), spec.help);
    }
    0
}
