use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{Error, Result};

/// A service response: status plus the body, both raw and parsed.
///
/// The body is parsed once at construction; unparseable bodies leave `json()`
/// as `Value::Null` with the raw text still available through `text()`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    text: String,
    json: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, text: String) -> Self {
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        ApiResponse { status, text, json }
    }

    /// Build a response directly from a JSON value. Used by transports that
    /// already hold a parsed body (and by scripted test transports).
    pub fn from_json(status: StatusCode, json: Value) -> Self {
        let text = json.to_string();
        ApiResponse { status, text, json }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    /// The continuation URL for paginated responses, if the body holds one.
    pub fn next_url(&self) -> Option<String> {
        self.json
            .get("next")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Coerce an unsuccessful status into the matching error kind: 4xx into
    /// `Error::Request`, 5xx into `Error::Server`.
    pub fn into_result(self) -> Result<ApiResponse> {
        if self.ok() {
            Ok(self)
        } else if self.status.is_server_error() {
            Err(Error::Server { response: self })
        } else {
            Err(Error::Request { response: self })
        }
    }

    /// Coerce to success and extract the body's `data` payload.
    pub fn into_data(self) -> Result<Value> {
        let checked = self.into_result()?;
        match checked.json.get("data") {
            Some(data) => Ok(data.clone()),
            None => Err(Error::Internal(
                "successful response is missing the 'data' payload".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_body() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"data": [1, 2]}"#.to_string());
        assert!(response.ok());
        assert_eq!(response.json()["data"], json!([1, 2]));
    }

    #[test]
    fn unparseable_body_leaves_text() {
        let response = ApiResponse::new(StatusCode::OK, "<html>".to_string());
        assert_eq!(response.json(), &Value::Null);
        assert_eq!(response.text(), "<html>");
    }

    #[test]
    fn next_url_absent_or_null() {
        let with = ApiResponse::from_json(StatusCode::OK, json!({"next": "http://x/page2"}));
        assert_eq!(with.next_url(), Some("http://x/page2".to_string()));

        let null = ApiResponse::from_json(StatusCode::OK, json!({"next": null}));
        assert_eq!(null.next_url(), None);

        let absent = ApiResponse::from_json(StatusCode::OK, json!({}));
        assert_eq!(absent.next_url(), None);
    }

    #[test]
    fn into_result_maps_status_families() {
        let ok = ApiResponse::from_json(StatusCode::OK, json!({}));
        assert!(ok.into_result().is_ok());

        let bad = ApiResponse::from_json(StatusCode::NOT_FOUND, json!({}));
        assert!(matches!(bad.into_result(), Err(Error::Request { .. })));

        let broken = ApiResponse::from_json(StatusCode::INTERNAL_SERVER_ERROR, json!({}));
        assert!(matches!(broken.into_result(), Err(Error::Server { .. })));
    }

    #[test]
    fn into_data_requires_payload() {
        let response = ApiResponse::from_json(StatusCode::OK, json!({"status": "success"}));
        assert!(matches!(response.into_data(), Err(Error::Internal(_))));
    }
}
