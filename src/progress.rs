//! Progress narration for a download. The download loop only talks to the
//! [`Progress`] trait; front ends decide how messages are shown.

use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub trait Progress: Send + Sync {
  fn start(&self, message: &str);
  fn update(&self, message: &str);
  fn stop(&self, message: &str);
}

/// Sends every message to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
  fn start(&self, message: &str) {
    info!("{}", message);
  }

  fn update(&self, message: &str) {
    info!("{}", message);
  }

  fn stop(&self, message: &str) {
    info!("{}", message);
  }
}

/// Terminal narration: a spinner per step when colour is on, plain lines otherwise.
pub struct TerminalProgress {
  use_color: bool,
  current: Mutex<Option<(ProgressBar, String)>>,
}

impl TerminalProgress {
  pub fn new(use_color: bool) -> Self {
    TerminalProgress {
      use_color,
      current: Mutex::new(None),
    }
  }

  fn spin(&self, message: &str) {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
      spinner.set_style(spinner_style);
    }
    spinner.set_message(style(message).cyan().to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    *self.lock() = Some((spinner, message.to_string()));
  }

  // Mark the running step as done.
  fn succeed(&self) {
    if let Some((spinner, message)) = self.lock().take() {
      spinner.finish_and_clear();
      eprintln!("{} {}", style("✔").green(), style(message).cyan());
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Option<(ProgressBar, String)>> {
    self
      .current
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

impl Progress for TerminalProgress {
  fn start(&self, message: &str) {
    if self.use_color {
      self.spin(message);
    } else {
      eprintln!("{}", message);
    }
  }

  fn update(&self, message: &str) {
    if self.use_color {
      self.succeed();
      self.spin(message);
    } else {
      eprintln!("{}", message);
    }
  }

  fn stop(&self, message: &str) {
    if self.use_color {
      self.succeed();
      eprintln!("{} {}", style("✔").green(), style(message).cyan());
    } else {
      eprintln!("{}", message);
    }
  }
}
