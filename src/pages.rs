use std::collections::VecDeque;

use reqwest::Method;
use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::response::ApiResponse;
use crate::transport::Transport;

/// Lazy sequence of response pages, following the continuation URL the
/// service embeds in each successful body.
///
/// Query parameters ride on the first request only; the service encodes all
/// filter state into the continuation URL itself. A request body, when
/// present, is resent with every page. The sequence is finite and
/// non-restartable: it ends when a page carries no continuation URL, or
/// immediately after yielding an unsuccessful page. Dropping the value
/// cancels the sequence; nothing is held across suspensions beyond the
/// cursor.
pub struct Pages<'a, T: Transport> {
    client: &'a Client<T>,
    method: Method,
    next: Option<String>,
    params: Option<Vec<(String, String)>>,
    body: Option<Value>,
}

impl<'a, T: Transport> Pages<'a, T> {
    pub(crate) fn new(
        client: &'a Client<T>,
        method: Method,
        url: String,
        params: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Self {
        Pages {
            client,
            method,
            next: Some(url),
            params: Some(params),
            body,
        }
    }

    /// Fetch the next page, or `None` once the sequence is exhausted.
    pub async fn next_page(&mut self) -> Option<Result<ApiResponse>> {
        let url = self.next.take()?;
        let params = self.params.take().unwrap_or_default();
        let result = self
            .client
            .request(self.method.clone(), url, params, self.body.clone())
            .await;
        if let Ok(response) = &result {
            if response.ok() {
                self.next = response.next_url();
            }
        }
        Some(result)
    }
}

/// Per-record view over [`Pages`]: coerces each page to success and drains
/// its `data` array one record at a time. An unsuccessful page surfaces as
/// an error at the point it is consumed and ends the sequence.
pub struct Records<'a, T: Transport> {
    pages: Pages<'a, T>,
    buffered: VecDeque<Value>,
    done: bool,
}

impl<'a, T: Transport> Records<'a, T> {
    pub(crate) fn new(pages: Pages<'a, T>) -> Self {
        Records {
            pages,
            buffered: VecDeque::new(),
            done: false,
        }
    }

    pub async fn next_record(&mut self) -> Option<Result<Value>> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            match self.pages.next_page().await {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }
                Some(Ok(response)) => match response.into_data() {
                    Err(error) => {
                        self.done = true;
                        return Some(Err(error));
                    }
                    Ok(Value::Array(records)) => self.buffered.extend(records),
                    Ok(other) => {
                        self.done = true;
                        return Some(Err(Error::Internal(format!(
                            "expected a list of records in the 'data' payload, found: {other}"
                        ))));
                    }
                },
            }
        }
    }

    /// Drain the remaining records into a vector, failing on the first
    /// error.
    pub async fn try_collect(mut self) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await {
            records.push(record?);
        }
        Ok(records)
    }
}
