//! Request routing, body limits and CORS

use std::sync::Arc;

use bytes::Bytes;
use fuzzgroup_core::GroupError;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use tracing::{debug, error};

use crate::config::{CorsPolicy, Settings};
use crate::error::ApiError;
use crate::handlers::{json_response, HandlerContext};

const ROUTES: &[&str] = &["/generate", "/headers", "/groups", "/health"];

/// The fuzzgroup HTTP service
pub struct FuzzService {
    handlers: Arc<HandlerContext>,
    root: String,
    cors: CorsPolicy,
    max_body: usize,
}

impl FuzzService {
    pub fn new(handlers: HandlerContext, root: impl Into<String>, cors: CorsPolicy, max_body: usize) -> Self {
        Self {
            handlers: Arc::new(handlers),
            root: root.into(),
            cors,
            max_body,
        }
    }

    pub fn from_settings(handlers: HandlerContext, settings: &Settings) -> Self {
        Self::new(
            handlers,
            settings.root_path(),
            settings.cors(),
            settings.max_upload_bytes,
        )
    }

    /// Route one request. Never fails: errors become JSON error responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let origin = req.headers().get(header::ORIGIN).cloned();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("{} {}", method, path);

        let mut response = if method == Method::OPTIONS {
            empty(StatusCode::NO_CONTENT)
        } else {
            match self.dispatch(req).await {
                Ok(response) => response,
                Err(err) => {
                    match &err {
                        // Logged by the engine at critical severity
                        ApiError::Group(GroupError::Computation(_)) => {}
                        ApiError::Task(_) => error!("{} {} failed: {}", method, path, err),
                        _ => debug!("{} {} -> {}: {}", method, path, err.status(), err),
                    }
                    error_response(&err)
                }
            }
        };

        self.apply_cors(origin.as_ref(), response.headers_mut());
        response
    }

    async fn dispatch<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, ApiError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let full_path = req.uri().path().to_string();
        let not_found = || ApiError::NotFound {
            method: method.to_string(),
            path: full_path.clone(),
        };

        let path = match full_path.strip_prefix(self.root.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => return Err(not_found()),
        };
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        let query = req.uri().query().map(str::to_string);
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Route to handler
        match (&method, path) {
            (&Method::POST, "/generate") => {
                let body = self.read_body(req).await?;
                self.handlers
                    .handle_generate(content_type.as_deref(), body)
                    .await
            }
            (&Method::GET, "/headers") => self.handlers.handle_headers().await,
            (&Method::GET, "/groups") => {
                let body = self.read_body(req).await?;
                self.handlers.handle_groups(query.as_deref(), body).await
            }
            (&Method::GET, "/health") => self.handlers.handle_health().await,
            (_, p) if ROUTES.contains(&p) => Err(ApiError::MethodNotAllowed {
                method: method.to_string(),
                path: full_path.clone(),
            }),
            _ => Err(not_found()),
        }
    }

    /// Collect the request body, enforcing the upload limit.
    async fn read_body<B>(&self, req: Request<B>) -> Result<Bytes, ApiError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match Limited::new(req.into_body(), self.max_body).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                Err(ApiError::PayloadTooLarge {
                    limit: self.max_body,
                })
            }
            Err(err) => Err(ApiError::InvalidRequest(format!("failed to read body: {}", err))),
        }
    }

    fn apply_cors(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        let any_origin = self.cors.allow_origins.iter().any(|o| o == "*");

        let allowed = match origin {
            // A wildcard cannot be combined with credentials, so echo the caller
            Some(origin) if any_origin && self.cors.allow_credentials => Some(origin.clone()),
            _ if any_origin => Some(HeaderValue::from_static("*")),
            Some(origin) => self
                .cors
                .allow_origins
                .iter()
                .any(|o| origin.as_bytes() == o.as_bytes())
                .then(|| origin.clone()),
            None => None,
        };

        let Some(allowed) = allowed else {
            return;
        };
        if allowed != "*" {
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);

        if let Ok(methods) = HeaderValue::from_str(&self.cors.allow_methods.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        if let Ok(allow) = HeaderValue::from_str(&self.cors.allow_headers.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow);
        }
        if self.cors.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "detail": err.detail() });
    json_response(err.status(), &body).unwrap_or_else(|_| empty(err.status()))
}
