use anyhow::{Error, Result};
use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::time::Duration;
use termcolor::ColorChoice;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ownersed::input::FileOrStdin;
use ownersed::resolver::{API_KEY_ENV, DEFAULT_ENDPOINT};
use ownersed::{
    FieldExtractor, Ip2Location, LineAnnotator, OwnershipCache, OwnershipResolver, Pipeline,
};

/// Environment variable holding the log filter, in `tracing-subscriber` syntax.
const LOG_ENV: &str = "OWNERSED_LOG";

/// A closed downstream pipe (`ownersed ... | head`) ends the run quietly.
fn is_broken_pipe(err: &Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Display only lines containing interactions (lines with "IDs:")
    #[clap(short, long)]
    interactions: bool,

    /// JSON file used to cache IP owners between runs
    #[clap(
        short,
        long,
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath,
        default_value = "cache.json"
    )]
    cache: Utf8PathBuf,

    /// Use markers to highlight dates, addresses, owners, targets and tokens
    #[clap(short = 'C', long, value_enum, default_value_t = ArgsColorChoice::Auto)]
    color: ArgsColorChoice,

    /// API key for the ip2location.io lookup service
    #[clap(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the lookup service
    #[clap(long, value_name = "URL", env = "IP2LOCATION_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Give up on a single lookup after this many seconds
    #[clap(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Input file(s) to process. Leave empty or use "-" to read from stdin
    #[clap(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Vec<Utf8PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsColorChoice {
    Always,
    Never,
    Auto,
}

fn main() -> ExitCode {
    match run_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(&err) => ExitCode::SUCCESS,
        Err(err) => {
            let backtrace = std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1");
            let mut stderr = io::stderr().lock();
            let _ = if backtrace {
                writeln!(stderr, "ownersed: {:?}", err)
            } else {
                writeln!(stderr, "ownersed: {:#}", err)
            };
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr log subscriber. `OWNERSED_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // the credential is checked before any input is read
    let api_key = args.api_key.ok_or(ownersed::Error::MissingApiKey)?;
    let service = Ip2Location::new(api_key)?
        .with_endpoint(args.endpoint)
        .with_timeout(Duration::from_secs(args.timeout));

    // a missing cache file is an empty cache; a broken one is only a warning
    let mut cache = OwnershipCache::new();
    match cache.load(&args.cache) {
        Ok(entries) => info!(path = %args.cache, entries, "loaded cache"),
        Err(err) => warn!("{:#}", Error::from(err)),
    }

    // determine appropriate colormode. auto simply
    // tests if stdout is a tty (if so, then yes color)
    // or otherwise don't color if it's to a file or another pipe
    let colormode = match args.color {
        ArgsColorChoice::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        ArgsColorChoice::Always => ColorChoice::Always,
        ArgsColorChoice::Never => ColorChoice::Never,
    };

    // if no files specified, read stdin
    let sources: Vec<FileOrStdin> = if args.input.is_empty() {
        vec![FileOrStdin::Stdin]
    } else {
        args.input.into_iter().map(FileOrStdin::from_path).collect()
    };

    let pipeline = Pipeline::new(
        FieldExtractor::new()?,
        LineAnnotator::new(colormode),
        OwnershipResolver::new(&mut cache, service),
    )
    .only_interactions(args.interactions);

    let mut out = io::BufWriter::with_capacity(65536, io::stdout().lock());
    pipeline.run(&sources, &mut out, &args.cache)?;
    Ok(())
}
