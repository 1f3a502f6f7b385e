//! Turns what the user typed (a bare search expression, or a search URL
//! copied from the browser address bar) into the query token and the list of
//! collections the download should cover.

use thiserror::Error;
use url::form_urlencoded;

/// The input carried no search expression; there is nothing to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("empty search string -- nothing to do")]
pub struct EmptyQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
  /// Decoded search expression, sent as the `p=` parameter
  pub query_token: String,
  /// `c=` collections in order of appearance; empty means all collections
  pub collections: Vec<String>,
}

pub fn normalize(search: &str) -> Result<NormalizedQuery, EmptyQuery> {
  if search.is_empty() {
    return Err(EmptyQuery);
  }
  if !search.starts_with("http") {
    return Ok(NormalizedQuery {
      query_token: search.to_string(),
      collections: Vec::new(),
    });
  }

  // A full search url: pick out the p= and c= parameters.
  let without_fragment = search.split('#').next().unwrap_or_default();
  let params = match without_fragment.split_once('?') {
    Some((_, params)) => params,
    None => without_fragment,
  };
  let mut query_token = String::new();
  let mut collections = Vec::new();
  for (key, value) in form_urlencoded::parse(params.as_bytes()) {
    match key.as_ref() {
      "p" if query_token.is_empty() => query_token = value.into_owned(),
      "c" if !value.is_empty() => collections.push(value.into_owned()),
      _ => {}
    }
  }
  if query_token.is_empty() {
    return Err(EmptyQuery);
  }
  Ok(NormalizedQuery {
    query_token,
    collections,
  })
}
