use tracing::info;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing output for the engine
///
/// With `ansi_colors == false` logs go to stderr in a minimal format, which
/// keeps stdout clean for callers that parse the search result.
pub fn init_with_logger(ansi_colors: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if !ansi_colors {
        fmt::Subscriber::builder()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .try_init()
    } else {
        fmt::Subscriber::builder()
            .with_ansi(true)
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    if let Err(e) = result {
        // Already installed by the embedding application
        eprintln!("Warning: Logger initialization failed: {}", e);
        return Ok(());
    }

    info!("Initializing graph-rl-search v{}", crate::version());
    Ok(())
}

/// Log a failing result with context and source location, then return it
#[macro_export]
macro_rules! track_error {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::error!("{}: {} (at {}:{})", $context, err, file!(), line!());
                Err(err)
            }
        }
    };
}
