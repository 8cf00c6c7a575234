use std::io::Read;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::pages::{Pages, Records};
use crate::query::{scalar_text, Query};
use crate::response::ApiResponse;
use crate::rows::{Row, RowReader, DEFAULT_DELIMITER};
use crate::transport::{HttpTransport, Transport, TransportCall};
use crate::upload::{CsvUpload, UploadKind};

/// Field that uniquely identifies a record within a project.
pub const RECORD_ID_FIELD: &str = "cairn_id";
/// Field that uniquely identifies an analysis within a project.
pub const ANALYSIS_ID_FIELD: &str = "analysis_id";

/// Upper bound on authentication-refresh retries for a single request. The
/// bound exists to keep a misbehaving service (401 after 401 despite a
/// successful re-login) from looping forever; hitting it is a defect, not an
/// expected outcome.
const REQUEST_RETRIES: u32 = 3;

/// Output shaping shared by read operations: fields to include or exclude,
/// and fields to summarise into value-frequency counts.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub summarise: Vec<String>,
}

impl Select {
    fn selection_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for field in &self.include {
            params.push(("include".to_string(), field.clone()));
        }
        for field in &self.exclude {
            params.push(("exclude".to_string(), field.clone()));
        }
        params
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = self.selection_params();
        for field in &self.summarise {
            params.push(("summarise".to_string(), field.clone()));
        }
        params
    }
}

/// Options for CSV-driven create and update uploads.
#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    /// Extra fields merged into every row; these win on key collision.
    pub overrides: Option<Row>,
    /// Cell delimiter; defaults to comma.
    pub delimiter: Option<u8>,
    /// Allow sources holding more than one record.
    pub multiline: bool,
    /// Route to the dry-run endpoint.
    pub test: bool,
}

/// Details for registering a new user.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub site: String,
    pub password: String,
}

#[derive(Debug)]
struct AuthState {
    token: Option<String>,
}

/// Client for the Cairn record-management service.
///
/// One client is one logical session: the underlying transport pools
/// connections for reuse across requests and releases them when the client
/// is dropped. Every request transparently renews the session token when the
/// service rejects it, provided the config holds login credentials.
pub struct Client<T: Transport = HttpTransport> {
    config: Config,
    auth: Mutex<AuthState>,
    transport: T,
}

impl Client<HttpTransport> {
    pub fn new(config: Config) -> Self {
        Client::with_transport(config, HttpTransport::new())
    }

    /// Register a new user. No session or token is required.
    pub async fn register(domain: &str, registration: &Registration) -> Result<Value> {
        let url = Endpoint::Register.url(domain)?;
        let mut call = TransportCall::new(Method::POST, url);
        call.body = Some(
            serde_json::to_value(registration)
                .map_err(|e| Error::Internal(format!("failed to serialize registration: {e}")))?,
        );
        HttpTransport::new().send(call).await?.into_data()
    }
}

impl<T: Transport> Client<T> {
    /// Build a client over a custom transport implementation.
    pub fn with_transport(config: Config, transport: T) -> Self {
        let token = config.token.clone();
        Client {
            config,
            auth: Mutex::new(AuthState { token }),
            transport,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transport this client sends through. Mainly useful for test
    /// doubles that record their calls.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn domain(&self) -> &str {
        &self.config.domain
    }

    /// The session token currently in use, if any.
    pub async fn token(&self) -> Option<String> {
        self.auth.lock().await.token.clone()
    }

    /// Issue one request with transparent token renewal.
    ///
    /// A 401 response, when the config holds login credentials, triggers a
    /// re-login and a repeat of the original request, bounded by
    /// [`REQUEST_RETRIES`]. Every other status is returned as-is; callers
    /// decide where success is demanded. Only transport-level faults are
    /// errors here.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: String,
        params: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        let mut retries_left = REQUEST_RETRIES;
        loop {
            if retries_left == 0 {
                return Err(Error::Internal(
                    "request retry limit reached: the service kept rejecting a freshly \
                     renewed token"
                        .to_string(),
                ));
            }

            let token = self.auth.lock().await.token.clone();
            let mut call = TransportCall::new(method.clone(), url.clone());
            call.token = token.clone();
            call.params = params.clone();
            call.body = body.clone();
            let response = self.transport.send(call).await?;

            if response.status() == StatusCode::UNAUTHORIZED && self.config.has_credentials() {
                self.renew_token(token).await?;
                retries_left -= 1;
                continue;
            }
            return Ok(response);
        }
    }

    /// Re-login and store the fresh token. Holding the auth lock across the
    /// login call serializes concurrent refreshes; if another request
    /// already renewed the token while we waited, skip the duplicate login.
    async fn renew_token(&self, stale: Option<String>) -> Result<()> {
        let mut auth = self.auth.lock().await;
        if auth.token != stale {
            return Ok(());
        }
        let response = self.send_login().await?.into_result()?;
        auth.token = Some(extract_token(&response)?);
        Ok(())
    }

    async fn send_login(&self) -> Result<ApiResponse> {
        let url = Endpoint::Login.url(self.domain())?;
        let mut call = TransportCall::new(Method::POST, url);
        call.basic_auth = match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };
        self.transport.send(call).await
    }

    async fn fetch(
        &self,
        method: Method,
        endpoint: Endpoint<'_>,
        params: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = endpoint.url(self.domain())?;
        self.request(method, url, params, body).await?.into_data()
    }

    // ---- metadata ----

    /// Projects the user can act on.
    pub async fn projects(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Projects, Vec::new(), None)
            .await
    }

    /// Field types the service understands.
    pub async fn types(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Types, Vec::new(), None)
            .await
    }

    /// Lookups usable as field-name suffixes.
    pub async fn lookups(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Lookups, Vec::new(), None)
            .await
    }

    pub async fn fields(&self, project: &str) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Fields { project }, Vec::new(), None)
            .await
    }

    pub async fn choices(&self, project: &str, field: &str) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::Choices { project, field },
            Vec::new(),
            None,
        )
        .await
    }

    // ---- records ----

    /// Get one record by its identifier.
    pub async fn get(&self, project: &str, cairn_id: &str, select: &Select) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::Get { project, cairn_id },
            select.selection_params(),
            None,
        )
        .await
    }

    /// Get one record by a set of field filters that uniquely identify it.
    /// Zero or several matches is an error.
    pub async fn find(&self, project: &str, fields: &Row, select: &Select) -> Result<Value> {
        if fields.is_empty() {
            return Err(Error::Validation(format!(
                "must provide either a '{RECORD_ID_FIELD}' or a set of fields"
            )));
        }
        let pages = self.filter_pages(project, fields, &id_only(RECORD_ID_FIELD))?;
        let id = self.resolve_unique_id(pages, "record", RECORD_ID_FIELD).await?;
        self.get(project, &id, select).await
    }

    /// Raw page sequence for a field-filtered listing.
    pub fn filter_pages<'a>(
        &'a self,
        project: &str,
        fields: &Row,
        select: &Select,
    ) -> Result<Pages<'a, T>> {
        let url = Endpoint::Filter { project }.url(self.domain())?;
        let mut params = filter_params(fields);
        params.extend(select.params());
        Ok(Pages::new(self, Method::GET, url, params, None))
    }

    /// Lazily stream records matching a set of field filters.
    pub fn filter<'a>(
        &'a self,
        project: &str,
        fields: &Row,
        select: &Select,
    ) -> Result<Records<'a, T>> {
        Ok(Records::new(self.filter_pages(project, fields, select)?))
    }

    /// Raw page sequence for an expression query. The serialized expression
    /// is the request body and is resent with every page.
    pub fn query_pages<'a>(
        &'a self,
        project: &str,
        query: Option<&Query>,
        select: &Select,
    ) -> Result<Pages<'a, T>> {
        let url = Endpoint::Query { project }.url(self.domain())?;
        let body = query.map(Query::to_value);
        Ok(Pages::new(self, Method::POST, url, select.params(), body))
    }

    /// Lazily stream records matching a boolean query expression.
    pub fn query<'a>(
        &'a self,
        project: &str,
        query: Option<&Query>,
        select: &Select,
    ) -> Result<Records<'a, T>> {
        Ok(Records::new(self.query_pages(project, query, select)?))
    }

    pub async fn create(&self, project: &str, fields: &Row, test: bool) -> Result<Value> {
        self.fetch(
            Method::POST,
            Endpoint::Create { project, test },
            Vec::new(),
            Some(Value::Object(fields.clone())),
        )
        .await
    }

    pub async fn update(
        &self,
        project: &str,
        cairn_id: &str,
        fields: &Row,
        test: bool,
    ) -> Result<Value> {
        self.fetch(
            Method::PATCH,
            Endpoint::Update {
                project,
                cairn_id,
                test,
            },
            Vec::new(),
            Some(Value::Object(fields.clone())),
        )
        .await
    }

    pub async fn delete(&self, project: &str, cairn_id: &str) -> Result<Value> {
        self.fetch(
            Method::DELETE,
            Endpoint::Delete { project, cairn_id },
            Vec::new(),
            None,
        )
        .await
    }

    /// History of changes made to a record.
    pub async fn history(&self, project: &str, cairn_id: &str) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::History { project, cairn_id },
            Vec::new(),
            None,
        )
        .await
    }

    /// Anonymised identifier for a value on a field.
    pub async fn identify(
        &self,
        project: &str,
        field: &str,
        value: &str,
        site: Option<&str>,
    ) -> Result<Value> {
        let mut body = json!({ "value": value });
        if let Some(site) = site {
            body["site"] = json!(site);
        }
        self.fetch(
            Method::POST,
            Endpoint::Identify { project, field },
            Vec::new(),
            Some(body),
        )
        .await
    }

    // ---- bulk CSV ----

    /// Create one record per row of a delimited source.
    pub fn csv_create<'a, R: Read>(
        &'a self,
        project: &str,
        source: R,
        options: CsvOptions,
    ) -> Result<CsvUpload<'a, T, R>> {
        self.csv_upload(UploadKind::Create, project, source, options)
    }

    /// Update one record per row; each row must carry the record identifier.
    pub fn csv_update<'a, R: Read>(
        &'a self,
        project: &str,
        source: R,
        options: CsvOptions,
    ) -> Result<CsvUpload<'a, T, R>> {
        self.csv_upload(UploadKind::Update, project, source, options)
    }

    /// Delete one record per row; each row must carry the record identifier.
    pub fn csv_delete<'a, R: Read>(
        &'a self,
        project: &str,
        source: R,
        delimiter: Option<u8>,
        multiline: bool,
    ) -> Result<CsvUpload<'a, T, R>> {
        self.csv_upload(
            UploadKind::Delete,
            project,
            source,
            CsvOptions {
                delimiter,
                multiline,
                ..CsvOptions::default()
            },
        )
    }

    fn csv_upload<'a, R: Read>(
        &'a self,
        kind: UploadKind,
        project: &str,
        source: R,
        options: CsvOptions,
    ) -> Result<CsvUpload<'a, T, R>> {
        let rows = RowReader::new(source, options.delimiter.unwrap_or(DEFAULT_DELIMITER))?;
        CsvUpload::new(
            self,
            kind,
            project,
            rows,
            options.overrides,
            options.multiline,
            options.test,
        )
    }

    // ---- analyses ----

    pub async fn analysis_fields(&self, project: &str) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::AnalysisFields { project },
            Vec::new(),
            None,
        )
        .await
    }

    pub async fn analysis_choices(&self, project: &str, field: &str) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::AnalysisChoices { project, field },
            Vec::new(),
            None,
        )
        .await
    }

    pub async fn get_analysis(
        &self,
        project: &str,
        analysis_id: &str,
        select: &Select,
    ) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::AnalysisGet {
                project,
                analysis_id,
            },
            select.selection_params(),
            None,
        )
        .await
    }

    /// Get one analysis by a set of field filters that uniquely identify it.
    pub async fn find_analysis(
        &self,
        project: &str,
        fields: &Row,
        select: &Select,
    ) -> Result<Value> {
        if fields.is_empty() {
            return Err(Error::Validation(format!(
                "must provide either an '{ANALYSIS_ID_FIELD}' or a set of fields"
            )));
        }
        let pages = self.filter_analysis_pages(project, fields, &id_only(ANALYSIS_ID_FIELD))?;
        let id = self
            .resolve_unique_id(pages, "analysis", ANALYSIS_ID_FIELD)
            .await?;
        self.get_analysis(project, &id, select).await
    }

    pub fn filter_analysis_pages<'a>(
        &'a self,
        project: &str,
        fields: &Row,
        select: &Select,
    ) -> Result<Pages<'a, T>> {
        let url = Endpoint::AnalysisFilter { project }.url(self.domain())?;
        let mut params = filter_params(fields);
        params.extend(select.params());
        Ok(Pages::new(self, Method::GET, url, params, None))
    }

    /// Lazily stream analyses matching a set of field filters.
    pub fn filter_analysis<'a>(
        &'a self,
        project: &str,
        fields: &Row,
        select: &Select,
    ) -> Result<Records<'a, T>> {
        Ok(Records::new(self.filter_analysis_pages(project, fields, select)?))
    }

    pub async fn create_analysis(&self, project: &str, fields: &Row, test: bool) -> Result<Value> {
        self.fetch(
            Method::POST,
            Endpoint::AnalysisCreate { project, test },
            Vec::new(),
            Some(Value::Object(fields.clone())),
        )
        .await
    }

    pub async fn update_analysis(
        &self,
        project: &str,
        analysis_id: &str,
        fields: &Row,
        test: bool,
    ) -> Result<Value> {
        self.fetch(
            Method::PATCH,
            Endpoint::AnalysisUpdate {
                project,
                analysis_id,
                test,
            },
            Vec::new(),
            Some(Value::Object(fields.clone())),
        )
        .await
    }

    pub async fn delete_analysis(&self, project: &str, analysis_id: &str) -> Result<Value> {
        self.fetch(
            Method::DELETE,
            Endpoint::AnalysisDelete {
                project,
                analysis_id,
            },
            Vec::new(),
            None,
        )
        .await
    }

    pub async fn analysis_history(&self, project: &str, analysis_id: &str) -> Result<Value> {
        self.fetch(
            Method::GET,
            Endpoint::AnalysisHistory {
                project,
                analysis_id,
            },
            Vec::new(),
            None,
        )
        .await
    }

    // ---- accounts ----

    /// Log in with the configured credentials and store the returned token
    /// for subsequent requests.
    pub async fn login(&self) -> Result<Value> {
        let response = self.send_login().await?;
        if response.ok() {
            let token = extract_token(&response)?;
            self.auth.lock().await.token = Some(token);
        }
        response.into_data()
    }

    /// Invalidate the current session token.
    pub async fn logout(&self) -> Result<()> {
        let url = Endpoint::Logout.url(self.domain())?;
        let response = self.request(Method::POST, url, Vec::new(), None).await?;
        response.into_result()?;
        self.auth.lock().await.token = None;
        Ok(())
    }

    /// Invalidate every session token the user holds.
    pub async fn logout_all(&self) -> Result<()> {
        let url = Endpoint::LogoutAll.url(self.domain())?;
        let response = self.request(Method::POST, url, Vec::new(), None).await?;
        response.into_result()?;
        self.auth.lock().await.token = None;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Profile, Vec::new(), None)
            .await
    }

    /// The user's latest request activity.
    pub async fn activity(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Activity, Vec::new(), None)
            .await
    }

    /// Approve another user (site authority required).
    pub async fn approve(&self, username: &str) -> Result<Value> {
        self.fetch(
            Method::PATCH,
            Endpoint::Approve { username },
            Vec::new(),
            None,
        )
        .await
    }

    /// Users waiting for approval.
    pub async fn waiting(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::Waiting, Vec::new(), None)
            .await
    }

    /// Users within the requesting user's site.
    pub async fn site_users(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::SiteUsers, Vec::new(), None)
            .await
    }

    pub async fn all_users(&self) -> Result<Value> {
        self.fetch(Method::GET, Endpoint::AllUsers, Vec::new(), None)
            .await
    }

    // ---- shared helpers ----

    /// Read the first page of a filtered listing and require exactly one
    /// match, returning its identifier.
    async fn resolve_unique_id(
        &self,
        mut pages: Pages<'_, T>,
        object_name: &str,
        id_field: &str,
    ) -> Result<String> {
        let first = match pages.next_page().await {
            Some(page) => page?,
            None => {
                return Err(Error::Validation(format!(
                    "expected one {object_name} to be returned but received no response"
                )))
            }
        };
        let data = first.into_data()?;
        let matches = data.as_array().ok_or_else(|| {
            Error::Internal("expected a list of records in the 'data' payload".to_string())
        })?;
        if matches.len() != 1 {
            return Err(Error::Validation(format!(
                "expected one {object_name} to be returned but received: {}",
                matches.len()
            )));
        }
        matches[0]
            .get(id_field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Internal(format!("matched {object_name} is missing '{id_field}'")))
    }
}

/// Render a filter-field mapping as query parameters: arrays comma-join
/// (null elements as empty strings), bare nulls become empty strings.
fn filter_params(fields: &Row) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(field, value)| {
            let rendered = match value {
                Value::Array(items) => items
                    .iter()
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(","),
                other => scalar_text(other),
            };
            (field.clone(), rendered)
        })
        .collect()
}

fn id_only(id_field: &str) -> Select {
    Select {
        include: vec![id_field.to_string()],
        ..Select::default()
    }
}

fn extract_token(response: &ApiResponse) -> Result<String> {
    response
        .json()
        .get("data")
        .and_then(|data| data.get("token"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Internal("login response is missing a token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_params_render_multi_values() {
        let mut fields = Row::new();
        fields.insert("sample_id".to_string(), json!("s-1"));
        fields.insert(
            "published_date__range".to_string(),
            json!(["2023-01-01", "2023-01-02"]),
        );
        fields.insert("field__in".to_string(), json!([null, "y"]));
        fields.insert("scrubbed".to_string(), Value::Null);

        let params = filter_params(&fields);
        assert_eq!(
            params,
            vec![
                ("sample_id".to_string(), "s-1".to_string()),
                (
                    "published_date__range".to_string(),
                    "2023-01-01,2023-01-02".to_string()
                ),
                ("field__in".to_string(), ",y".to_string()),
                ("scrubbed".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn select_params_repeat_keys() {
        let select = Select {
            include: vec!["a".to_string(), "b".to_string()],
            exclude: vec!["c".to_string()],
            summarise: vec!["d".to_string()],
        };
        assert_eq!(
            select.params(),
            vec![
                ("include".to_string(), "a".to_string()),
                ("include".to_string(), "b".to_string()),
                ("exclude".to_string(), "c".to_string()),
                ("summarise".to_string(), "d".to_string()),
            ]
        );
    }

    #[test]
    fn extract_token_requires_token_field() {
        let good = ApiResponse::from_json(
            StatusCode::OK,
            json!({"data": {"token": "tok-1", "expiry": "2024-01-01T00:00:00Z"}}),
        );
        assert_eq!(extract_token(&good).unwrap(), "tok-1");

        let bad = ApiResponse::from_json(StatusCode::OK, json!({"data": {}}));
        assert!(matches!(extract_token(&bad), Err(Error::Internal(_))));
    }
}
