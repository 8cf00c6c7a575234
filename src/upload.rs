use std::collections::VecDeque;
use std::io::Read;

use futures_util::{stream, StreamExt};
use reqwest::Method;
use serde_json::Value;

use crate::client::{Client, RECORD_ID_FIELD};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::response::ApiResponse;
use crate::rows::{Row, RowReader};
use crate::transport::Transport;

/// Which write operation a bulk upload performs. Update and delete target a
/// specific record, so each row must carry the record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Create,
    Update,
    Delete,
}

impl UploadKind {
    fn method(self) -> Method {
        match self {
            UploadKind::Create => Method::POST,
            UploadKind::Update => Method::PATCH,
            UploadKind::Delete => Method::DELETE,
        }
    }

    fn requires_id(self) -> bool {
        matches!(self, UploadKind::Update | UploadKind::Delete)
    }
}

/// Bulk row uploader: one request per row, outcomes yielded as they happen.
///
/// Construction reads up to two rows ahead to reject the cases that must
/// never reach the wire: an empty source, and a multi-row source without
/// multiline mode. Rows then flow in source order — the peeked rows first.
/// A row that fails its own validation (a missing identifier) yields an
/// error for that row and the stream continues; aggregate accounting is the
/// consumer's job.
pub struct CsvUpload<'a, T: Transport, R: Read> {
    client: &'a Client<T>,
    kind: UploadKind,
    project: String,
    overrides: Option<Row>,
    multiline: bool,
    test: bool,
    pending: VecDeque<Row>,
    rows: RowReader<R>,
}

impl<'a, T: Transport, R: Read> CsvUpload<'a, T, R> {
    pub(crate) fn new(
        client: &'a Client<T>,
        kind: UploadKind,
        project: &str,
        mut rows: RowReader<R>,
        overrides: Option<Row>,
        multiline: bool,
        test: bool,
    ) -> Result<Self> {
        let mut pending = VecDeque::new();
        match rows.next_row() {
            None => {
                return Err(Error::Validation(
                    "file must contain at least one record".to_string(),
                ))
            }
            Some(first) => pending.push_back(first?),
        }
        if let Some(second) = rows.next_row() {
            let second = second?;
            if !multiline {
                return Err(Error::Validation(
                    "file contains multiple records but this is not allowed; \
                     to upload multiple records, enable multiline mode"
                        .to_string(),
                ));
            }
            pending.push_back(second);
        }

        Ok(CsvUpload {
            client,
            kind,
            project: project.to_string(),
            overrides,
            multiline,
            test,
            pending,
            rows,
        })
    }

    /// Upload the next row and return its outcome, or `None` once the source
    /// is drained.
    pub async fn next_outcome(&mut self) -> Option<Result<ApiResponse>> {
        let row = match self.pending.pop_front() {
            Some(row) => row,
            None => match self.rows.next_row()? {
                Ok(row) => row,
                Err(error) => return Some(Err(error)),
            },
        };
        Some(self.upload_row(row).await)
    }

    async fn upload_row(&self, mut row: Row) -> Result<ApiResponse> {
        if let Some(overrides) = &self.overrides {
            for (field, value) in overrides {
                row.insert(field.clone(), value.clone());
            }
        }

        let url = if self.kind.requires_id() {
            let id = match row.remove(RECORD_ID_FIELD) {
                Some(value) => crate::query::scalar_text(&value),
                None => String::new(),
            };
            if id.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "record requires a '{RECORD_ID_FIELD}' for upload"
                )));
            }
            match self.kind {
                UploadKind::Update => Endpoint::Update {
                    project: &self.project,
                    cairn_id: &id,
                    test: self.test,
                }
                .url(self.client.domain())?,
                _ => Endpoint::Delete {
                    project: &self.project,
                    cairn_id: &id,
                }
                .url(self.client.domain())?,
            }
        } else {
            Endpoint::Create {
                project: &self.project,
                test: self.test,
            }
            .url(self.client.domain())?
        };

        self.client
            .request(self.kind.method(), url, Vec::new(), Some(Value::Object(row)))
            .await
    }

    /// Collect for single-row mode: exactly one outcome, coerced to success,
    /// with its `data` payload extracted.
    pub async fn collect_single(mut self) -> Result<Value> {
        match self.next_outcome().await {
            None => Err(Error::Validation(
                "upload must produce at least one outcome".to_string(),
            )),
            Some(outcome) => outcome?.into_data(),
        }
    }

    /// Collect for multiline mode: every outcome in source order, failing at
    /// the first unsuccessful one.
    pub async fn collect_multiline(mut self) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        while let Some(outcome) = self.next_outcome().await {
            results.push(outcome?.into_data()?);
        }
        Ok(results)
    }

    /// Collect according to the mode this upload was built with: a single
    /// `data` object, or an array of them under multiline.
    pub async fn finish(self) -> Result<Value> {
        if self.multiline {
            Ok(Value::Array(self.collect_multiline().await?))
        } else {
            self.collect_single().await
        }
    }

    /// Upload every remaining row through a fixed pool of concurrent
    /// requests. Only record creation supports this, and only when the
    /// session password came from the environment: concurrent rows share the
    /// token-refresh path, which must not race against an interactive
    /// credential prompt. Outcomes arrive in completion order, not source
    /// order.
    pub async fn run_concurrent(mut self, workers: usize) -> Result<Vec<Result<ApiResponse>>> {
        if self.kind != UploadKind::Create {
            return Err(Error::Validation(
                "concurrent upload is only supported for record creation".to_string(),
            ));
        }
        if !self.client.config().has_env_password() {
            return Err(Error::Validation(
                "concurrent upload requires credentials sourced from the environment".to_string(),
            ));
        }

        let mut rows: Vec<Row> = self.pending.drain(..).collect();
        while let Some(row) = self.rows.next_row() {
            rows.push(row?);
        }

        let outcomes = stream::iter(rows)
            .map(|row| self.upload_row(row))
            .buffer_unordered(workers.max(1))
            .collect::<Vec<_>>()
            .await;
        Ok(outcomes)
    }
}
