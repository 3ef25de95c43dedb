mod utils;

use png2svg::{VectorizeOptions, VectorizeResult, Vectorizer};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

use self::utils::write_output;

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Validate the options, convert the input and write the document.
pub fn run(cli: Cli) -> VectorizeResult<()> {
    let options: VectorizeOptions = (&cli.vectorize).into();
    if cli.global.debug {
        eprintln!("{options:#?}");
        if let Some(threads) = cli.global.threads {
            eprintln!("threads: {threads}");
        }
    }
    options.validate()?;

    let document = Vectorizer::new(options)
        .with_threads(cli.global.threads)
        .vectorize_file(&cli.input)?;
    tracing::debug!(
        input = %cli.input.display(),
        regions = document.region_count(),
        "converted"
    );
    write_output(cli.output.as_deref(), &document.to_string())
}
