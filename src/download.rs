//! The paginated download loop.
//!
//! A download first asks the service for the size of the result set, then
//! hands off to a dedicated worker thread that fetches pages of
//! [`Config::page_size`] records one at a time and splices them into the
//! output document. The caller's thread blocks until the worker is done.
//! [`Downloader::interrupt`] may be called from any other thread to stop the
//! worker between pages.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use indicatif::HumanCount;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputDocument;
use crate::count::count_records;
use crate::progress::Progress;
use crate::query::{normalize, NormalizedQuery};
use crate::remote::{fetch_page, HttpGet};

/// Cooperative cancellation token shared between a downloader and whoever
/// may want to stop it. Once requested, a stop stays requested.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
  pub fn new() -> Self {
    StopFlag::default()
  }

  pub fn request(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_requested(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// The search string was empty
  NothingToDo,
  /// Every requested page was written (or the search matched nothing)
  Completed,
  /// A stop was requested before all pages were written
  Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
  /// End offset of the last page written. Approximates the number of
  /// records written; it is not a count of `<record>` elements.
  pub written: u64,
  /// Number of records the service reported for the search
  pub available: u64,
  pub outcome: Outcome,
}

impl DownloadReport {
  fn empty(outcome: Outcome) -> Self {
    DownloadReport {
      written: 0,
      available: 0,
      outcome,
    }
  }
}

struct Session {
  query: NormalizedQuery,
  start_at: u64,
  // last record offset to fetch
  target: u64,
  available: u64,
}

#[derive(Default)]
struct WorkerState {
  active: Mutex<bool>,
  finished: Condvar,
}

impl WorkerState {
  fn lock(&self) -> MutexGuard<'_, bool> {
    self.active.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn set_active(&self, active: bool) {
    *self.lock() = active;
    if !active {
      self.finished.notify_all();
    }
  }

  fn wait_until_idle(&self) {
    let mut active = self.lock();
    while *active {
      active = self
        .finished
        .wait(active)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }
}

// Marks the worker idle when the loop exits, including by panic.
struct ActiveGuard<'a>(&'a WorkerState);

impl Drop for ActiveGuard<'_> {
  fn drop(&mut self) {
    self.0.set_active(false);
  }
}

pub struct Downloader<T> {
  config: Config,
  transport: T,
  progress: Arc<dyn Progress>,
  stop: StopFlag,
  worker: WorkerState,
}

impl<T: HttpGet> Downloader<T> {
  pub fn new(config: Config, transport: T, progress: Arc<dyn Progress>) -> Self {
    Downloader {
      config,
      transport,
      progress,
      stop: StopFlag::new(),
      worker: WorkerState::default(),
    }
  }

  /// Use an existing stop flag, e.g. one shared with a signal handler.
  pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
    self.stop = stop;
    self
  }

  pub fn stop_flag(&self) -> StopFlag {
    self.stop.clone()
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// Search with `search` and write every matching record to `output`,
  /// starting at record `start_at`. `total` bounds the offset of the last
  /// record fetched; `None` means all available records.
  ///
  /// Empty searches and searches without results return early without
  /// creating `output`. Once `output` has been created it is always left
  /// with its closing `</collection>` tag, whether the loop completes, is
  /// interrupted or fails.
  pub fn download(
    &self,
    search: &str,
    output: &Path,
    start_at: u64,
    total: Option<u64>,
  ) -> Result<DownloadReport> {
    self.config.validate()?;
    if start_at == 0 {
      return Err(Error::Config("record numbers start at 1".to_string()));
    }
    let query = match normalize(search) {
      Ok(query) => query,
      Err(empty) => {
        self.progress.update(&format!("Given an {}", empty));
        return Ok(DownloadReport::empty(Outcome::NothingToDo));
      }
    };

    self.progress.update(&format!(
      "Asking {} how many records to expect",
      self.config.host()?
    ));
    let available = count_records(&self.transport, &self.config, &query)?;
    if available == 0 {
      self.progress.update("This search produced 0 records");
      return Ok(DownloadReport::empty(Outcome::Completed));
    }
    self.progress.update(&format!(
      "This search will produce {} records",
      HumanCount(available)
    ));

    let session = Session {
      query,
      start_at,
      target: total.map_or(available, |total| total.min(available)),
      available,
    };
    let joined = thread::scope(|scope| {
      self.worker.set_active(true);
      debug!("starting downloader thread");
      let handle = scope.spawn(|| {
        let _guard = ActiveGuard(&self.worker);
        self.run_loop(&session, output)
      });
      debug!("waiting on downloader thread");
      let joined = handle.join();
      debug!("downloader thread has returned");
      joined
    });
    let (outcome, written) = joined.map_err(|_| Error::WorkerPanicked)??;
    Ok(DownloadReport {
      written,
      available,
      outcome,
    })
  }

  /// Ask the download loop to stop and wait until it has. Calling this
  /// before a download starts makes that download stop before its first
  /// page; calling it after a download finished does nothing.
  ///
  /// Must not be called from the worker itself (e.g. inside a
  /// [`Progress`] callback), since it waits for the worker to exit.
  pub fn interrupt(&self) {
    debug!("setting the stop flag");
    self.stop.request();
    self.worker.wait_until_idle();
    debug!("download loop is idle");
  }

  fn run_loop(&self, session: &Session, output: &Path) -> Result<(Outcome, u64)> {
    let mut doc = OutputDocument::create(output)?;
    let filled = self.fill(&mut doc, session);
    if self.stop.is_requested() {
      debug!("closing output due to interruption");
    }
    let closed = doc.close();
    let result = filled?;
    closed?;
    Ok(result)
  }

  fn fill(&self, doc: &mut OutputDocument, session: &Session) -> Result<(Outcome, u64)> {
    let page_size = self.config.page_size;
    let mut start_at = session.start_at;
    let mut written = 0;
    loop {
      if self.stop.is_requested() {
        return Ok((Outcome::Stopped, written));
      }
      if start_at > session.target {
        return Ok((Outcome::Completed, written));
      }
      // end_at is only reported, never requested.
      let end_at = start_at.saturating_add(page_size - 1).min(session.available);
      self
        .progress
        .update(&format!("Getting records {} to {}", start_at, end_at));

      let page = fetch_page(&self.transport, &self.config, &session.query, start_at)
        .map_err(|err| self.abandon(err))?;
      if self.stop.is_requested() {
        debug!(start_at, "discarding page fetched after stop request");
        return Ok((Outcome::Stopped, written));
      }
      doc.append_page(&page).map_err(|err| self.abandon(err))?;

      written = end_at;
      start_at = match start_at.checked_add(page_size) {
        Some(next) => next,
        None => return Ok((Outcome::Completed, written)),
      };
    }
  }

  fn abandon(&self, err: Error) -> Error {
    warn!("download loop failed: {}", err);
    self.progress.update("Stopping download due to problem");
    err
  }
}
