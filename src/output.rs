use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::splice::{records_interior, COLLECTION_CLOSE, COLLECTION_OPEN, XML_DECLARATION};

/// The MARC XML file being written.
///
/// Creating it writes the declaration and the opening `<collection>` tag;
/// [`close`](OutputDocument::close) writes the closing tag. If the document
/// is dropped without being closed the closing tag is still written, so the
/// file on disk is always a complete document.
pub struct OutputDocument {
  path: PathBuf,
  writer: Option<BufWriter<File>>,
}

impl OutputDocument {
  pub fn create(path: &Path) -> Result<Self> {
    debug!(path = %path.display(), "opening output file");
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
      .write_all(XML_DECLARATION)
      .and_then(|_| writer.write_all(COLLECTION_OPEN))
      .and_then(|_| writer.write_all(b"\n"))
      .map_err(|e| Error::io(path, e))?;
    Ok(OutputDocument {
      path: path.to_path_buf(),
      writer: Some(writer),
    })
  }

  /// Splice the records out of one fetched page and append them.
  pub fn append_page(&mut self, page: &[u8]) -> Result<()> {
    let records = records_interior(page)?;
    let writer = self
      .writer
      .as_mut()
      .ok_or_else(|| Error::io(&self.path, std::io::ErrorKind::BrokenPipe.into()))?;
    writer.write_all(records).map_err(|e| Error::io(&self.path, e))
  }

  /// Write the closing tag and flush. Further calls do nothing.
  pub fn close(&mut self) -> Result<()> {
    let Some(mut writer) = self.writer.take() else {
      return Ok(());
    };
    debug!(path = %self.path.display(), "closing output file");
    writer
      .write_all(COLLECTION_CLOSE)
      .and_then(|_| writer.write_all(b"\n"))
      .and_then(|_| writer.flush())
      .map_err(|e| Error::io(&self.path, e))
  }
}

impl Drop for OutputDocument {
  fn drop(&mut self) {
    if let Err(err) = self.close() {
      warn!("could not close output document: {}", err);
    }
  }
}
