//! TIND offers no way to learn the size of a result set when asking for
//! MARC XML, so the count comes from a regular one-record HTML search: the
//! "N records found" headers on its results page.

use lazy_static::lazy_static;
use libxml::parser::Parser;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::query::NormalizedQuery;
use crate::remote::{search_url, HttpGet, OutputFormat};

lazy_static! {
  static ref RECORDS_FOUND_REGEX: Regex = Regex::new(r"(\d[\d,]*)\s+records?\s+found").unwrap();
}

const RESULTS_HEADER_XPATH: &str =
  "//*[contains(concat(' ', normalize-space(@class), ' '), ' searchresultsboxheader ')]";

/// Ask the service how many records the query matches, summed over collections.
pub fn count_records<T: HttpGet + ?Sized>(
  transport: &T,
  config: &Config,
  query: &NormalizedQuery,
) -> Result<u64> {
  let url = search_url(&config.base_url, query, 1, 1, OutputFormat::Html);
  debug!(%url, "probing result count");
  let response = transport.get(&url).map_err(|err| {
    if err.is_connect() {
      Error::ServiceFailure(err.to_string())
    } else {
      Error::RequestError(err.to_string())
    }
  })?;
  if response.status >= 300 {
    return Err(Error::ServiceFailure(format!(
      "{} answered with HTTP status {}",
      url, response.status
    )));
  }
  parse_record_count(&response.body)
}

/// Sum the record counts of all results headers in an HTML results page.
/// A page without any header means the search matched nothing.
pub fn parse_record_count(html: &[u8]) -> Result<u64> {
  let headers = results_headers(html)?;
  if headers.is_empty() {
    return Ok(0);
  }

  let mut total: u64 = 0;
  let mut counted = 0;
  for text in &headers {
    if let Some(cap) = RECORDS_FOUND_REGEX.captures(text) {
      let digits = cap[1].replace(',', "");
      let count: u64 = digits.parse().map_err(|_| {
        Error::InternalError(format!("could not read record count from {:?}", text.trim()))
      })?;
      total = total.checked_add(count).ok_or_else(|| {
        Error::InternalError("record counts on the results page overflow".to_string())
      })?;
      counted += 1;
    }
  }
  if counted == 0 {
    return Err(Error::InternalError(
      "results page was not in the expected format: no record count found".to_string(),
    ));
  }
  debug!(headers = headers.len(), counted, total, "parsed results page");
  Ok(total)
}

fn results_headers(html: &[u8]) -> Result<Vec<String>> {
  if html.is_empty() {
    return Ok(Vec::new());
  }
  let parser = Parser::default_html();
  let doc = parser
    .parse_string(html)
    .map_err(|e| Error::InternalError(format!("could not parse results page: {:?}", e)))?;
  let mut texts = Vec::new();
  if let Some(root) = doc.get_root_readonly() {
    for node in root
      .findnodes(RESULTS_HEADER_XPATH, &doc)
      .unwrap_or_default()
    {
      texts.push(node.get_content());
    }
  }
  Ok(texts)
}
