//! HTTP endpoint handlers
//!
//! Implements handlers for /generate, /headers, /groups and /health. Store
//! and engine work runs on the blocking pool while holding the store lock,
//! so one ingestion or grouping run touches the table at a time.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use fuzzgroup_core::grouping::{GroupingEngine, GroupingRequest, DEFAULT_PAGE_LIMIT};
use fuzzgroup_core::storage::RowStore;
use fuzzgroup_core::{CancelFlag, GroupError};
use fuzzgroup_sqlite::SqliteRowStore;
use http::{Response, StatusCode};
use http_body_util::Full;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::logging::prefix;

/// Handler result: a ready response or an error for the router to render
pub type ApiResult = Result<Response<Full<Bytes>>, ApiError>;

/// Handler context providing access to the store and engine
pub struct HandlerContext {
    store: Arc<Mutex<SqliteRowStore>>,
    engine: Arc<GroupingEngine>,
}

/// Parameters for one `/groups` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupsQuery {
    pub request: GroupingRequest,
    pub offset: usize,
    pub limit: usize,
}

/// JSON body accepted by `/groups`: a bare column list or a full request
#[derive(Deserialize)]
#[serde(untagged)]
enum GroupsBody {
    Columns(Vec<String>),
    Request(GroupingRequest),
}

fn push_list(target: &mut Vec<String>, raw: &str) {
    target.extend(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("'{}' must be a non-negative integer", key)))
}

impl GroupsQuery {
    /// Build from the query string and optional JSON body.
    ///
    /// Columns may repeat (`?reference_columns=a&reference_columns=b`) or be
    /// comma separated. Query columns win over body columns.
    pub fn parse(query: Option<&str>, body: &[u8]) -> Result<Self, ApiError> {
        let mut request = GroupingRequest::default();
        let mut offset = 0;
        let mut limit = DEFAULT_PAGE_LIMIT;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "reference_columns" => push_list(&mut request.reference_columns, &value),
                "name_columns" => push_list(&mut request.name_columns, &value),
                "offset" => offset = parse_count("offset", &value)?,
                "limit" => limit = parse_count("limit", &value)?,
                _ => {}
            }
        }

        if request.reference_columns.is_empty() && !body.iter().all(u8::is_ascii_whitespace) {
            let parsed: GroupsBody = serde_json::from_slice(body)
                .map_err(|e| ApiError::InvalidRequest(format!("invalid JSON body: {}", e)))?;
            match parsed {
                GroupsBody::Columns(columns) => request.reference_columns = columns,
                GroupsBody::Request(body) => {
                    request.reference_columns = body.reference_columns;
                    if request.name_columns.is_empty() {
                        request.name_columns = body.name_columns;
                    }
                }
            }
        }

        if request.reference_columns.is_empty() {
            return Err(ApiError::InvalidRequest(
                "missing 'reference_columns'".to_string(),
            ));
        }

        Ok(Self {
            request,
            offset,
            limit,
        })
    }
}

impl HandlerContext {
    pub fn new(store: SqliteRowStore, engine: GroupingEngine) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            engine: Arc::new(engine),
        }
    }

    /// Handle POST /generate - Load one or more CSV files into the table
    pub async fn handle_generate(&self, content_type: Option<&str>, body: Bytes) -> ApiResult {
        let files = match content_type.and_then(|ct| multer::parse_boundary(ct).ok()) {
            Some(boundary) => read_multipart(body, boundary).await?,
            None if body.is_empty() => {
                return Err(ApiError::InvalidRequest("no file uploaded".to_string()))
            }
            None => vec![body],
        };

        let count = files.len();
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.lock().ingest(&files)).await?;

        let rows = result.map_err(|e| {
            error!("{} Ingestion of {} file(s) failed: {}", prefix::DB, count, e);
            ApiError::from(e)
        })?;
        info!("{} Ingested {} rows from {} file(s)", prefix::DB, rows, count);

        #[derive(Serialize)]
        struct GenerateResponse {
            message: &'static str,
            rows: usize,
        }

        json_response(
            StatusCode::OK,
            &GenerateResponse {
                message: "Database has been successfully generated",
                rows,
            },
        )
    }

    /// Handle GET /headers - List the table's data columns
    pub async fn handle_headers(&self) -> ApiResult {
        let store = Arc::clone(&self.store);
        let columns = tokio::task::spawn_blocking(move || store.lock().list_columns())
            .await?
            .map_err(|e| {
                warn!("Column listing failed: {}", e);
                ApiError::from(e)
            })?;

        let headers: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        json_response(
            StatusCode::OK,
            &serde_json::json!({ "headers": headers, "columns": columns }),
        )
    }

    /// Handle GET /groups - Run grouping and return the first page
    ///
    /// Dropping this future (client disconnect) cancels the run; the engine
    /// stops at its next checkpoint, at the latest after the row being
    /// compared, without writing group ids.
    pub async fn handle_groups(&self, query: Option<&str>, body: Bytes) -> ApiResult {
        let GroupsQuery {
            request,
            offset,
            limit,
        } = GroupsQuery::parse(query, &body)?;

        let cancel = CancelFlag::new();
        let guard = cancel.drop_guard();
        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);

        let result = tokio::task::spawn_blocking(move || {
            let mut store = store.lock();
            let outcome = engine.run(&mut *store, &request, &cancel)?;
            outcome.read_page(&*store, offset, limit)
        })
        .await;
        guard.disarm();

        let page = result?.map_err(|e| {
            match &e {
                GroupError::Computation(_) => {}
                GroupError::Cancelled => info!("Grouping run cancelled"),
                GroupError::Schema(msg) => warn!("Grouping rejected: {}", msg),
            }
            ApiError::from(e)
        })?;

        json_response(StatusCode::OK, &page)
    }

    /// Handle GET /health - Liveness probe
    pub async fn handle_health(&self) -> ApiResult {
        json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            }),
        )
    }
}

/// Collect every file part of a multipart body, in order.
///
/// Parts named `files` or `file`, or carrying a file name, are taken as CSV
/// files; other form fields are ignored.
async fn read_multipart(body: Bytes, boundary: String) -> Result<Vec<Bytes>, ApiError> {
    let stream = tokio_stream::once(Ok::<Bytes, Infallible>(body));
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.file_name().is_some()
            || matches!(field.name(), Some("files") | Some("file"));
        if is_file {
            files.push(field.bytes().await?);
        }
    }

    if files.is_empty() {
        return Err(ApiError::InvalidRequest("no file uploaded".to_string()));
    }
    Ok(files)
}

/// Helper to create JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, data: &T) -> ApiResult {
    let body = serde_json::to_vec(data)
        .map_err(|e| ApiError::Task(format!("failed to serialize response: {}", e)))?;

    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| ApiError::Task(e.to_string()))
}
