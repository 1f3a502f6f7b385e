use std::fs;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result, TransportError};
use crate::query::NormalizedQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

/// The one HTTP operation the downloader needs: a GET returning status and body.
pub trait HttpGet: Send + Sync {
  fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
  /// The regular HTML results page
  Html,
  /// MARC21 XML (`of=xm`)
  MarcXml,
}

/// Build a search request url. Parameter order matters to the service:
/// collections, then query, start record, page size and output format.
pub fn search_url(
  base_url: &str,
  query: &NormalizedQuery,
  start_at: u64,
  page_size: u64,
  format: OutputFormat,
) -> String {
  let mut url = String::from(base_url);
  for collection in &query.collections {
    url.push_str("&c=");
    url.push_str(&quote(collection));
  }
  url.push_str("&p=");
  url.push_str(&quote(&query.query_token));
  url.push_str(&format!("&jrec={}&rg={}", start_at, page_size));
  if format == OutputFormat::MarcXml {
    url.push_str("&of=xm");
  }
  url
}

// Percent-encode everything but unreserved characters, leaving '/' alone.
fn quote(value: &str) -> String {
  urlencoding::encode(value).replace("%2F", "/")
}

/// Fetch one page of MARC XML records starting at record `start_at`.
/// Transport failures are returned as-is; they end the session.
pub fn fetch_page<T: HttpGet + ?Sized>(
  transport: &T,
  config: &Config,
  query: &NormalizedQuery,
  start_at: u64,
) -> Result<Vec<u8>> {
  let url = search_url(
    &config.base_url,
    query,
    start_at,
    config.page_size,
    OutputFormat::MarcXml,
  );
  debug!(%url, "fetching page");
  let response = transport.get(&url)?;
  if response.status >= 300 {
    return Err(Error::ServiceFailure(format!(
      "{} answered with HTTP status {}",
      url, response.status
    )));
  }
  Ok(response.body)
}

const NETWORK_CHECK_ATTEMPTS: u32 = 3;
const NETWORK_CHECK_PAUSE: Duration = Duration::from_secs(1);

/// Blocking reqwest client configured from [`Config`].
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new(config: &Config) -> Result<Self> {
    let mut builder = Client::builder()
      .user_agent(config.user_agent.as_str())
      .timeout(config.timeout);
    if let Some(bundle_path) = &config.ca_bundle {
      let pem = fs::read(bundle_path).map_err(|e| Error::io(bundle_path, e))?;
      let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
        Error::Config(format!(
          "could not load certificates from {}: {}",
          bundle_path.display(),
          e
        ))
      })?;
      builder = builder.add_root_certificate(certificate);
    }
    let client = builder
      .build()
      .map_err(|e| Error::Config(format!("could not build http client: {}", e)))?;
    Ok(ReqwestTransport { client })
  }

  /// Check that `url` answers at all. Any HTTP status counts as reachable;
  /// only transport failures are retried.
  pub fn network_available(&self, url: &str) -> bool {
    for retry in 0..NETWORK_CHECK_ATTEMPTS {
      match self.client.head(url).send() {
        Ok(_) => return true,
        Err(err) => {
          debug!(%url, retry, "network check failed: {}", err);
          if retry + 1 < NETWORK_CHECK_ATTEMPTS {
            thread::sleep(NETWORK_CHECK_PAUSE);
          }
        }
      }
    }
    false
  }
}

impl HttpGet for ReqwestTransport {
  fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
    let response = self.client.get(url).send().map_err(|e| classify(url, e))?;
    let status = response.status().as_u16();
    let body = response.bytes().map_err(|e| classify(url, e))?;
    Ok(HttpResponse {
      status,
      body: body.to_vec(),
    })
  }
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
  if err.is_connect() || err.is_timeout() {
    TransportError::Connect {
      url: url.to_string(),
      message: err.to_string(),
    }
  } else {
    TransportError::Request {
      url: url.to_string(),
      message: err.to_string(),
    }
  }
}
