/// Search a TIND catalog and write every matching record, as MARC XML, into
/// a single file. Give it either a search expression or a complete search
/// URL copied from the browser address bar, e.g.
///
///   download_marc_records "https://caltech.tind.io/search?ln=en&p=856%3A%27ebrary%27"
///
/// Quote the search string so the shell leaves `?` and `&` alone.
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tind_marc::config::{BASE_SEARCH_URL, RECORDS_PER_GET, USER_AGENT};
use tind_marc::local::{default_output_path, file_in_use, rename_existing};
use tind_marc::{
  Config, Downloader, Error as DownloadError, Outcome, Progress, ReqwestTransport, TerminalProgress,
};

#[derive(Parser)]
#[command(name = "download_marc_records", version)]
#[command(about = "Search a TIND catalog and download the matching MARC records")]
struct Args {
  /// Search expression or complete search URL
  search: Option<String>,

  /// Write results to this file (default: output.xml on the desktop)
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Start with the Nth record
  #[arg(short, long, default_value_t = 1)]
  start_at: u64,

  /// Stop after record number M (default: all)
  #[arg(short, long)]
  total: Option<u64>,

  /// Do not color-code terminal output
  #[arg(short = 'C', long)]
  no_color: bool,

  /// Turn on debug logging
  #[arg(short = 'Z', long)]
  debug: bool,

  /// Search endpoint of the catalog
  #[arg(long, env = "TIND_MARC_BASE_URL", default_value = BASE_SEARCH_URL)]
  base_url: String,

  /// PEM file with additional trusted certificates
  #[arg(long, env = "TIND_MARC_CA_BUNDLE")]
  ca_bundle: Option<PathBuf>,

  /// Per-request timeout in seconds; 0 waits forever
  #[arg(long, env = "TIND_MARC_TIMEOUT", default_value_t = 120)]
  timeout: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();
  init_logging(args.debug);

  let progress = Arc::new(TerminalProgress::new(!args.no_color));
  progress.start("Performing initial checks");
  let Some(search) = args.search.as_deref().filter(|s| !s.is_empty()) else {
    progress.stop("No search query string given. Quitting.");
    return Err("no search query string given".into());
  };

  let config = Config {
    base_url: args.base_url,
    page_size: RECORDS_PER_GET,
    user_agent: USER_AGENT.to_string(),
    ca_bundle: args.ca_bundle,
    timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
  };
  config.validate()?;
  let transport = ReqwestTransport::new(&config)?;
  if !transport.network_available(&config.base_url) {
    progress.stop("No network connection.");
    return Err("no network connection".into());
  }

  let output = args.output.unwrap_or_else(default_output_path);
  if file_in_use(&output) {
    warn!("{} appears to be open in another program", output.display());
    progress.update("Cannot write output file -- is it still open?");
  }
  if let Some(backup) = rename_existing(&output)? {
    progress.update(&format!(
      "Renamed existing {} to {}",
      output.display(),
      backup.display()
    ));
  }

  let downloader = Arc::new(Downloader::new(config, transport, progress.clone()));
  watch_for_ctrl_c(Arc::clone(&downloader));

  match downloader.download(search, &output, args.start_at, args.total) {
    Ok(report) => match report.outcome {
      Outcome::NothingToDo => progress.stop("Nothing to do."),
      Outcome::Completed if report.available == 0 => progress.stop("Done."),
      Outcome::Completed => {
        progress.stop(&format!("Done. Output is in {}", output.display()))
      }
      Outcome::Stopped => progress.stop(&format!(
        "Stopped after record {}. Output is in {}",
        report.written,
        output.display()
      )),
    },
    Err(err @ DownloadError::ServiceFailure(_)) => {
      progress.stop("Stopping due to a problem connecting to services");
      return Err(err.into());
    }
    Err(err) => {
      progress.stop("Stopping due to error");
      return Err(err.into());
    }
  }
  Ok(())
}

fn init_logging(debug: bool) {
  let default_filter = if debug {
    "tind_marc=debug,download_marc_records=debug"
  } else {
    "tind_marc=warn"
  };
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

// Ctrl-C stops the download between pages, so the output file still gets
// its closing tag. A second Ctrl-C exits at once.
fn watch_for_ctrl_c(downloader: Arc<Downloader<ReqwestTransport>>) {
  thread::spawn(move || {
    let runtime = match tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
    {
      Ok(runtime) => runtime,
      Err(err) => {
        debug!("no ctrl-c handler: {}", err);
        return;
      }
    };
    escalate_interrupts(
      || runtime.block_on(tokio::signal::ctrl_c()).is_ok(),
      move || downloader.interrupt(),
      || {
        std::process::exit(130);
      },
    );
  });
}

// The first signal runs `stop` on its own thread, since it blocks until the
// loop is idle; a second signal while that is pending calls `exit`.
fn escalate_interrupts<W, S, X>(mut wait_for_signal: W, stop: S, exit: X)
where
  W: FnMut() -> bool,
  S: FnOnce() + Send + 'static,
  X: FnOnce(),
{
  if !wait_for_signal() {
    return;
  }
  debug!("interrupt received");
  thread::spawn(stop);
  if wait_for_signal() {
    debug!("second interrupt received, exiting");
    exit();
  }
}
