use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// URL fragment common to all search + download calls.
pub const BASE_SEARCH_URL: &str = "https://caltech.tind.io/search?ln=en";

/// Number of records requested per page. TIND silently caps larger
/// requests at 200.
pub const RECORDS_PER_GET: u64 = 200;

pub const USER_AGENT: &str = concat!("tind-marc/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct Config {
  /// Search endpoint, including the leading `ln=` parameter
  pub base_url: String,
  /// Records per page request, at most [`RECORDS_PER_GET`]
  pub page_size: u64,
  pub user_agent: String,
  /// PEM bundle added to the trusted roots of the page transport
  pub ca_bundle: Option<PathBuf>,
  /// Per-request timeout; `None` waits forever
  pub timeout: Option<Duration>,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      base_url: BASE_SEARCH_URL.to_string(),
      page_size: RECORDS_PER_GET,
      user_agent: USER_AGENT.to_string(),
      ca_bundle: None,
      timeout: Some(DEFAULT_TIMEOUT),
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<()> {
    if self.page_size == 0 || self.page_size > RECORDS_PER_GET {
      return Err(Error::Config(format!(
        "page size must be between 1 and {}, got {}",
        RECORDS_PER_GET, self.page_size
      )));
    }
    self.host()?;
    Ok(())
  }

  /// Host name of the catalog service, used in progress messages.
  pub fn host(&self) -> Result<String> {
    let url = Url::parse(&self.base_url)
      .map_err(|e| Error::Config(format!("invalid base url {}: {}", self.base_url, e)))?;
    url
      .host_str()
      .map(str::to_string)
      .ok_or_else(|| Error::Config(format!("base url {} has no host", self.base_url)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.host().unwrap(), "caltech.tind.io");
  }

  #[test]
  fn rejects_page_size_above_service_cap() {
    let config = Config {
      page_size: 201,
      ..Config::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn rejects_unparsable_base_url() {
    let config = Config {
      base_url: "not a url".to_string(),
      ..Config::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }
}
