//! HTTP handler functions for the Data Coyote API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use data_coyote_server_models::{ApiError, ApiHealth, ApiRoot, CrimeQueryParams};

use crate::AppState;
use crate::proxy::{CrimeQuery, ProxyError, fetch_incidents};

/// `GET /`
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(ApiRoot {
        name: "Data Coyote API".to_string(),
        status: "ok".to_string(),
    })
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        ok: true,
        message: "pong".to_string(),
    })
}

/// `GET /crime`
///
/// Returns recent incidents from the upstream dataset, newest first.
pub async fn crime(
    state: web::Data<AppState>,
    params: web::Query<CrimeQueryParams>,
) -> HttpResponse {
    let query = match CrimeQuery::parse(params.days.as_deref(), params.limit.as_deref()) {
        Ok(query) => query,
        Err(e) => return error_response(&e),
    };

    if let Some(cached) = state.cache.get(query) {
        log::debug!("Cache hit for {query:?}");
        return HttpResponse::Ok().json(cached.as_slice());
    }

    match fetch_incidents(state.upstream.as_ref(), &state.fields, query).await {
        Ok(incidents) => {
            let incidents = Arc::new(incidents);
            state.cache.insert(query, Arc::clone(&incidents));
            HttpResponse::Ok().json(incidents.as_slice())
        }
        Err(e) => {
            log::error!("Failed to fetch incidents: {e}");
            error_response(&e)
        }
    }
}

fn error_response(error: &ProxyError) -> HttpResponse {
    match error {
        ProxyError::InvalidParam(message) => {
            HttpResponse::BadRequest().json(ApiError::message(message.clone()))
        }
        ProxyError::Status { status, body } => HttpResponse::BadGateway().json(ApiError {
            error: "Upstream returned an error".to_string(),
            status: Some(*status),
            body: Some(body.clone()),
        }),
        ProxyError::Transport(_) | ProxyError::Decode(_) => {
            HttpResponse::BadGateway().json(ApiError {
                error: "Upstream request failed".to_string(),
                status: None,
                body: Some(error.to_string()),
            })
        }
    }
}
