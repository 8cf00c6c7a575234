//! Client library for the Cairn record-management service.
//!
//! Provides record CRUD, bulk CSV ingestion, and a composable boolean query
//! language over the service's HTTP API:
//!
//! - [`Query`] — field conditions combinable with AND/OR/XOR/NOT, serialized
//!   with minimal nesting depth.
//! - [`Client`] — the request engine: bearer-token injection with
//!   transparent re-login on expiry, plus every service operation.
//! - [`Pages`]/[`Records`] — lazy cursor-following pagination.
//! - [`CsvUpload`] — one request per row of a delimited source, outcomes
//!   streamed as they happen.
//!
//! ```no_run
//! use cairn::{Client, Config, Query, Select};
//!
//! # async fn run() -> cairn::Result<()> {
//! let config = Config::from_env()?;
//! let client = Client::new(config);
//!
//! let query = Query::field("site", "bham")
//!     .and(&Query::field("published_date__range", serde_json::json!([
//!         "2023-01-01",
//!         "2023-01-02",
//!     ])))?;
//! let mut records = client.query("project", Some(&query), &Select::default())?;
//! while let Some(record) = records.next_record().await {
//!     println!("{}", record?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod pages;
pub mod query;
pub mod response;
pub mod rows;
pub mod transport;
pub mod upload;

pub use client::{Client, CsvOptions, Registration, Select, ANALYSIS_ID_FIELD, RECORD_ID_FIELD};
pub use config::Config;
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use pages::{Pages, Records};
pub use query::Query;
pub use response::ApiResponse;
pub use rows::{Row, RowReader, DEFAULT_DELIMITER, TAB_DELIMITER};
pub use transport::{HttpTransport, Transport, TransportCall};
pub use upload::{CsvUpload, UploadKind};
