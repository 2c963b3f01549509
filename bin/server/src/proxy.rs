//! Tenant database proxy.
//!
//! Authorized `/db/*` requests are rewritten to the caller's tenant
//! database, named by (cookie identity, request origin), and forwarded
//! verbatim to the upstream document database. The tenant database is
//! provisioned lazily and idempotently on first access: created, then
//! secured so only the tenant identity is listed as a member.
//!
//! Authorization happens before any of this runs; an unauthenticated
//! request is rejected at the extractor and never reaches the upstream.

use crate::auth::{middleware::origin_from_headers, AppState, RequireAuth};
use crate::config::TenantConfig;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use keygate_core::{Identity, TenantId};
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Pipeline stage a provisioning failure happened in.
///
/// The stage reaches the operator log and the error body tag, but never
/// any upstream detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Creating,
    Securing,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Securing => write!(f, "securing"),
        }
    }
}

/// A failed attempt to provision a tenant database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionError {
    /// The stage that failed.
    pub stage: ProvisionStage,
    /// Upstream detail, for logs only.
    pub details: String,
}

impl ProvisionError {
    /// Stable tag surfaced in the error response body.
    #[must_use]
    pub fn reason_tag(&self) -> &'static str {
        match self.stage {
            ProvisionStage::Creating => "error_creating_database",
            ProvisionStage::Securing => "error_securing_database",
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tenant database failed: {}", self.stage, self.details)
    }
}

impl std::error::Error for ProvisionError {}

/// Errors from forwarding a request upstream.
#[derive(Debug)]
pub enum ProxyError {
    /// The HTTP client could not be constructed.
    Client { details: String },
    /// The upstream call failed.
    Upstream { details: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { details } => {
                write!(f, "proxy client error: {details}")
            }
            Self::Upstream { details } => {
                write!(f, "tenant database upstream error: {details}")
            }
        }
    }
}

impl std::error::Error for ProxyError {}

/// Forwards tenant requests and provisions tenant databases.
pub struct TenantProxy {
    client: reqwest::Client,
    upstream_url: String,
    prefix: String,
    admin: Option<(String, String)>,
    /// Names already provisioned by this process; repeat PUTs are
    /// harmless but pointless.
    provisioned: Mutex<HashSet<String>>,
}

impl TenantProxy {
    /// Creates a proxy from tenant configuration.
    pub fn new(config: &TenantConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProxyError::Client {
                details: e.to_string(),
            })?;

        let admin = match (&config.admin_username, &config.admin_password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            upstream_url: config.upstream_url.clone(),
            prefix: config.prefix.clone(),
            admin,
            provisioned: Mutex::new(HashSet::new()),
        })
    }

    /// Returns the backing database name for a tenant.
    #[must_use]
    pub fn database_name(&self, tenant: &TenantId) -> String {
        tenant.database_name(&self.prefix)
    }

    fn with_admin(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.admin {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    /// Ensures the tenant database exists and is secured.
    ///
    /// Idempotent: an "already exists" answer from the create step is
    /// success, and the security document is simply re-put.
    pub async fn ensure_database(
        &self,
        name: &str,
        identity: &Identity,
    ) -> Result<(), ProvisionError> {
        if self
            .provisioned
            .lock()
            .expect("provisioned set mutex poisoned")
            .contains(name)
        {
            return Ok(());
        }

        let db_url = format!("{}{name}", self.upstream_url);
        let response = self
            .with_admin(self.client.put(&db_url))
            .send()
            .await
            .map_err(|e| ProvisionError {
                stage: ProvisionStage::Creating,
                details: e.to_string(),
            })?;
        match response.status().as_u16() {
            201 | 202 | 412 => {}
            status => {
                return Err(ProvisionError {
                    stage: ProvisionStage::Creating,
                    details: format!("unexpected status {status}"),
                });
            }
        }

        let security = json!({
            "admins": {"names": [], "roles": []},
            "members": {"names": [identity.as_str()], "roles": []},
        });
        let response = self
            .with_admin(self.client.put(format!("{db_url}/_security")))
            .json(&security)
            .send()
            .await
            .map_err(|e| ProvisionError {
                stage: ProvisionStage::Securing,
                details: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ProvisionError {
                stage: ProvisionStage::Securing,
                details: format!("unexpected status {}", response.status().as_u16()),
            });
        }

        self.provisioned
            .lock()
            .expect("provisioned set mutex poisoned")
            .insert(name.to_string());
        tracing::info!(database = name, "tenant database provisioned");
        Ok(())
    }

    /// Forwards a request verbatim to the tenant's database.
    ///
    /// Method, headers, and body pass through; only the path prefix is
    /// rewritten from `/db/` to the tenant database name. The client's
    /// authorization header is replaced by the gateway's own upstream
    /// credentials; tenant access control is the gateway's cookie gate,
    /// not upstream auth.
    pub async fn forward(&self, name: &str, req: Request) -> Result<Response, ProxyError> {
        let tail = req
            .uri()
            .path()
            .strip_prefix("/db")
            .unwrap_or("")
            .trim_start_matches('/');
        let query = req
            .uri()
            .query()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        let url = format!("{}{name}/{tail}{query}", self.upstream_url);

        let (parts, body) = req.into_parts();
        let mut upstream = self
            .client
            .request(parts.method, &url)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()));
        for (header_name, value) in &parts.headers {
            if skip_request_header(header_name) {
                continue;
            }
            upstream = upstream.header(header_name, value);
        }
        upstream = self.with_admin(upstream);

        let response = upstream.send().await.map_err(|e| ProxyError::Upstream {
            details: e.to_string(),
        })?;

        let mut builder = Response::builder().status(response.status());
        for (header_name, value) in response.headers() {
            if skip_response_header(header_name) {
                continue;
            }
            builder = builder.header(header_name, value);
        }
        builder
            .body(Body::from_stream(response.bytes_stream()))
            .map_err(|e| ProxyError::Upstream {
                details: e.to_string(),
            })
    }
}

fn skip_request_header(name: &HeaderName) -> bool {
    name == header::HOST
        || name == header::CONTENT_LENGTH
        || name == header::CONNECTION
        || name == header::AUTHORIZATION
        || name == header::COOKIE
}

fn skip_response_header(name: &HeaderName) -> bool {
    name == header::CONTENT_LENGTH
        || name == header::TRANSFER_ENCODING
        || name == header::CONNECTION
}

/// `/db/*` handler: gate, rewrite, provision, forward.
pub async fn tenant_db(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    req: Request,
) -> Response {
    let origin = origin_from_headers(req.headers());
    let tenant = TenantId::derive(&identity, &origin);
    let name = state.proxy.database_name(&tenant);

    if let Err(e) = state.proxy.ensure_database(&name, &identity).await {
        tracing::error!(error = %e, database = name, "tenant provisioning failed");
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": true, "reason": e.reason_tag()})),
        )
            .into_response();
    }

    match state.proxy.forward(&name, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, database = name, "tenant proxy failed");
            (StatusCode::BAD_GATEWAY, Json(json!({"error": true}))).into_response()
        }
    }
}
