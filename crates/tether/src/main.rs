#![allow(unsafe_code)] // `Tracked` is an unsafe trait

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::pin::pin;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tether_core::argsort::argsort_by;
use tether_core::backtrace::Backtrace;
use tether_core::demangle::{demangled_string, short_type_name, symbol_language};
use tether_core::fs::realpath;
use tether_core::numcomp::{numcomp, AccuracyLevel, FailureAction};
use tether_core::{
    set_violation_action, Subscribable, SubscriptionError, SubscriptionPointer, TetherResult, Tracked,
    ViolationAction, CHECKED,
};
use tether_utils::{
    LogFormat, LogLevel, LoggingError, LoggingGuard, debug, info, init_logging, init_logging_to_dir,
    init_logging_with_level,
};

/// Tracked non-owning references and small diagnostic helpers.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Tracked non-owning references and small diagnostic helpers", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (pretty or json); overrides TETHER_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Write logs to a dated file in this directory instead of the console
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Demangle Rust symbols, or shorten type names
    Demangle
    {
        /// Symbols to demangle
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Treat the inputs as type names and strip their module paths
        #[arg(long, default_value_t = false)]
        short: bool,
    },
    /// Print the canonical absolute form of paths
    Realpath
    {
        /// Paths to resolve
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the indices that would sort the given numbers
    Argsort
    {
        /// Numbers to sort
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<f64>,
        /// Sort from largest to smallest
        #[arg(long, default_value_t = false)]
        descending: bool,
    },
    /// Compare two numbers within a tolerance
    Compare
    {
        #[arg(allow_hyphen_values = true)]
        lhs: f64,
        #[arg(allow_hyphen_values = true)]
        rhs: f64,
        /// Explicit tolerance (takes precedence over --accuracy)
        #[arg(long)]
        tolerance: Option<f64>,
        /// Named accuracy level
        #[arg(long, value_enum, default_value_t = Accuracy::Default)]
        accuracy: Accuracy,
        /// Exit with an error if the numbers differ
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Print the current call stack, or parse a saved backtrace
    Backtrace
    {
        /// Resolve file and line information
        #[arg(long, default_value_t = false)]
        locations: bool,
        /// Parse this file instead of capturing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Walk through a subscription scenario and print the registry state
    Demo
    {
        /// Also destroy an object that is still observed
        #[arg(long, default_value_t = false)]
        still_used: bool,
    },
}

/// Command line names of the accuracy levels
#[derive(ValueEnum, Debug, Clone, Copy)]
enum Accuracy
{
    Extreme,
    Higher,
    Default,
    Lower,
    Sloppy,
    SuperSloppy,
}

impl From<Accuracy> for AccuracyLevel
{
    fn from(accuracy: Accuracy) -> Self
    {
        match accuracy {
            Accuracy::Extreme => AccuracyLevel::Extreme,
            Accuracy::Higher => AccuracyLevel::Higher,
            Accuracy::Default => AccuracyLevel::Default,
            Accuracy::Lower => AccuracyLevel::Lower,
            Accuracy::Sloppy => AccuracyLevel::Sloppy,
            Accuracy::SuperSloppy => AccuracyLevel::SuperSloppy,
        }
    }
}

/// Demo target for the `demo` command
#[derive(Default)]
struct Loan
{
    amount: u32,
    subscribable: Subscribable,
}

// SAFETY: the subscribable is a plain field and `Loan` is not `Unpin`.
unsafe impl Tracked for Loan
{
    fn subscribable(&self) -> &Subscribable
    {
        &self.subscribable
    }
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn setup_logging(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    if let Some(dir) = &cli.log_dir {
        let (path, guard) = init_logging_to_dir(dir, cli.log_level)?;
        debug!(path = %path.display(), "Logging to file");
        return Ok(guard);
    }

    match (cli.log_level, cli.log_format) {
        (None, None) => init_logging(),
        (level, format) => init_logging_with_level(level.unwrap_or(LogLevel::Warn), format.unwrap_or_default()),
    }
}

fn run_command(command: Commands) -> TetherResult<()>
{
    match command {
        Commands::Demangle { symbols, short } => {
            for symbol in symbols {
                if short {
                    println!("{}", short_type_name(&symbol));
                } else {
                    println!("{}\t{}", demangled_string(&symbol), symbol_language(&symbol));
                }
            }
            Ok(())
        }
        Commands::Realpath { paths } => {
            for path in paths {
                println!("{}", realpath(&path)?.display());
            }
            Ok(())
        }
        Commands::Argsort { values, descending } => {
            let order = if descending {
                argsort_by(&values, |a, b| b.total_cmp(a))
            } else {
                argsort_by(&values, f64::total_cmp)
            };
            let rendered: Vec<String> = order.iter().map(ToString::to_string).collect();
            println!("{}", rendered.join(" "));
            Ok(())
        }
        Commands::Compare {
            lhs,
            rhs,
            tolerance,
            accuracy,
            strict,
        } => {
            let action = if strict { FailureAction::Error } else { FailureAction::Return };
            let mut comparison = numcomp(lhs).accuracy(accuracy.into()).failure_action(action);
            if let Some(tolerance) = tolerance {
                comparison = comparison.tolerance(tolerance);
            }
            debug!(lhs, rhs, tolerance = comparison.tolerance_value(), "comparing");

            let verdict = if comparison.check(rhs)? { "equal" } else { "different" };
            println!("{verdict}");
            Ok(())
        }
        Commands::Backtrace { locations, file } => {
            let trace = match file {
                Some(path) => Backtrace::parse(&std::fs::read_to_string(path)?, locations),
                None => Backtrace::capture(locations),
            };
            print!("{trace}");
            Ok(())
        }
        Commands::Demo { still_used } => {
            run_demo(still_used);
            Ok(())
        }
    }
}

fn print_state(step: &str, loan: &Loan)
{
    println!(
        "{step:<24} count={} labels={:?}",
        loan.subscribable().subscriber_count(),
        loan.subscribable().subscriber_labels()
    );
}

fn run_demo(still_used: bool)
{
    info!(checked = CHECKED, "running subscription demo");
    if !CHECKED {
        println!("registry disabled in this build: counts stay at 0");
    }

    let loan = pin!(Loan {
        amount: 250,
        ..Loan::default()
    });
    print_state("created", &loan);

    let mut first = SubscriptionPointer::bound("loanA", loan.as_ref());
    print_state("bound loanA", &loan);

    let second = SubscriptionPointer::bound("loanB", loan.as_ref());
    print_state("bound loanB", &loan);
    println!("{:<24} amount={}", "read through loanB", second.amount);

    first.reset();
    print_state("reset loanA", &loan);

    drop(second);
    print_state("dropped loanB", &loan);

    if still_used && CHECKED {
        demo_still_used();
    }
}

/// Drop an observed object with violations turned into panics, and report
/// what was raised.
fn demo_still_used()
{
    set_violation_action(ViolationAction::Panic);
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));

    let loan = Box::pin(Loan::default());
    let observer = SubscriptionPointer::bound("x", loan.as_ref());
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || drop(loan)));

    panic::set_hook(default_hook);
    match outcome.map_err(|payload| payload.downcast::<SubscriptionError>()) {
        Err(Ok(error)) => println!("{:<24} {error}", "dropped observed loan"),
        Err(Err(_)) => println!("{:<24} unexpected panic", "dropped observed loan"),
        Ok(()) => println!("{:<24} nothing raised", "dropped observed loan"),
    }

    // The target is gone; only unsubscribing is still allowed
    drop(observer);
}
