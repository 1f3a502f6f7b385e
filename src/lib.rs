//! Search a TIND library catalog and download every matching record into a
//! single MARC21 XML file.

pub mod config;
pub mod count;
pub mod download;
pub mod error;
pub mod local;
pub mod output;
pub mod progress;
pub mod query;
pub mod remote;
pub mod splice;

pub use config::Config;
pub use download::{DownloadReport, Downloader, Outcome, StopFlag};
pub use error::{Error, Result, TransportError};
pub use progress::{Progress, TerminalProgress, TracingProgress};
pub use remote::{HttpGet, HttpResponse, ReqwestTransport};
