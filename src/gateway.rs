//! HTTP status endpoints.
//!
//! A gateway serves `GET /<base path>` (fleet list) and `GET /<base path>/<app id>`
//! for hosts matching its base route. Several gateways can share one listener:
//! requests for other hosts fall through to the next gateway in the chain.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::error::ErrorKind;
use crate::route::Route;
use crate::status::StatusAggregator;
use crate::supervisor::SupervisorLink;

pub struct GatewayApi {
    base: Route,
    aggregator: Arc<StatusAggregator>,
    link: Arc<SupervisorLink>,
}

#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    List,
    App(&'a str),
}

impl GatewayApi {
    pub fn new(base: Route, aggregator: Arc<StatusAggregator>, link: Arc<SupervisorLink>) -> Self {
        Self {
            base,
            aggregator,
            link,
        }
    }

    fn match_path<'a>(&self, path: &'a str) -> Option<Target<'a>> {
        let path = path.trim_matches('/');
        let rest = if self.base.path.is_empty() {
            path
        } else {
            let rest = path.strip_prefix(self.base.path.as_str())?;
            if rest.is_empty() {
                return Some(Target::List);
            }
            rest.strip_prefix('/')?
        };

        match rest {
            "" => Some(Target::List),
            id if !id.contains('/') => Some(Target::App(id)),
            _ => None,
        }
    }

    async fn answer(&self, target: Target<'_>) -> Response {
        match target {
            Target::List => self.list().await,
            Target::App(id) => self.single(id).await,
        }
    }

    async fn list(&self) -> Response {
        match self.aggregator.list_statuses().await {
            Ok(apps) => Json(json!({ "apps": apps })).into_response(),
            Err(e) => {
                log::error!("Failed to list app statuses: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed while getting the status of running applications",
                        "message": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }

    async fn single(&self, id: &str) -> Response {
        match self.aggregator.get_status(id).await {
            Ok(status) => Json(status).into_response(),
            Err(e) if e.kind() == ErrorKind::AppNotFound => {
                log::warn!("Status requested for unknown app {}", id);
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": format!("The application '{}' does not exist.", id) })),
                )
                    .into_response()
            }
            Err(e) => {
                log::error!("Failed to get status of app {}: {}", id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "message": format!("Failed while getting the status of the application '{}'.", id),
                        "err": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Router serving a chain of gateways, tried in order.
pub fn router(gateways: Vec<GatewayApi>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(Arc::new(gateways))
}

async fn dispatch(
    State(chain): State<Arc<Vec<GatewayApi>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method == Method::GET {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| uri.authority().map(|authority| authority.as_str()))
            .unwrap_or_default();

        for gateway in chain.iter() {
            let Some(target) = gateway.match_path(uri.path()) else {
                continue;
            };
            if !gateway.link.is_ready() {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "isInitialized": false })),
                )
                    .into_response();
            }
            if !gateway.base.matches_host(host) {
                continue;
            }
            return gateway.answer(target).await;
        }
    }

    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}
