//! Every MARC XML page arrives as a complete document. The records are cut
//! out of the page by byte offsets, dropping the page's own declaration and
//! `<collection>` wrapper, so pages can be concatenated into one document
//! without an XML parse.

use crate::error::{Error, Result};

pub const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
pub const COLLECTION_OPEN: &[u8] = b"<collection xmlns=\"http://www.loc.gov/MARC21/slim\">";
pub const COLLECTION_CLOSE: &[u8] = b"</collection>";

/// Return the bytes strictly between the first opening and the last closing
/// collection tag of a page.
pub fn records_interior(page: &[u8]) -> Result<&[u8]> {
  let open = find_subslice(page, COLLECTION_OPEN)
    .ok_or_else(|| Error::InternalError("page has no opening <collection> tag".to_string()))?;
  let start = open + COLLECTION_OPEN.len();
  let end = rfind_subslice(page, COLLECTION_CLOSE)
    .ok_or_else(|| Error::InternalError("page has no closing </collection> tag".to_string()))?;
  if end < start {
    return Err(Error::InternalError(
      "page closes its <collection> before opening it".to_string(),
    ));
  }
  Ok(&page[start..end])
}

fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
  if needle.is_empty() || hay.len() < needle.len() {
    return None;
  }
  hay.windows(needle.len()).position(|w| w == needle)
}

fn rfind_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
  if needle.is_empty() || hay.len() < needle.len() {
    return None;
  }
  hay.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_declaration_and_wrapper() {
    let page = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
      <collection xmlns=\"http://www.loc.gov/MARC21/slim\">\n<record>A</record>\n</collection>\n";
    assert_eq!(records_interior(page).unwrap(), b"\n<record>A</record>\n");
  }

  #[test]
  fn uses_last_closing_tag() {
    let page = b"<collection xmlns=\"http://www.loc.gov/MARC21/slim\"><x></collection></collection>";
    assert_eq!(records_interior(page).unwrap(), b"<x></collection>");
  }

  #[test]
  fn empty_page_has_empty_interior() {
    let page = b"<collection xmlns=\"http://www.loc.gov/MARC21/slim\"></collection>";
    assert!(records_interior(page).unwrap().is_empty());
  }

  #[test]
  fn missing_tags_are_internal_errors() {
    assert!(matches!(
      records_interior(b"<html>Server error</html>"),
      Err(Error::InternalError(_))
    ));
    assert!(matches!(
      records_interior(b"<collection xmlns=\"http://www.loc.gov/MARC21/slim\"><record>"),
      Err(Error::InternalError(_))
    ));
    assert!(matches!(
      records_interior(b"</collection><collection xmlns=\"http://www.loc.gov/MARC21/slim\">"),
      Err(Error::InternalError(_))
    ));
  }
}
