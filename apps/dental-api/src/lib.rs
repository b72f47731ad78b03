//! Dental API - servidor HTTP da clínica odontológica
//!
//! Rotas REST sobre os repositórios do `dental-db`, com autenticação por
//! token JWT e controle de acesso por papel.

use anyhow::{Context, Result};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
mod routes;
pub mod state;

pub use config::{Cli, HttpConfig};
pub use state::AppState;

/// Metadados de build gerados pelo `built`
pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Monta o roteador completo com as camadas HTTP
pub fn app(state: AppState, http: &HttpConfig) -> Result<Router> {
    let mut router: Router = routes::router()
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(GlobalConcurrencyLimitLayer::new(http.concurrency_limit))
        .layer(TraceLayer::new_for_http());

    if !http.cors_origins.is_empty() {
        let origins = http
            .cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Origem CORS inválida: {}", origin))
            })
            .collect::<Result<Vec<_>>>()?;
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
        router = router.layer(cors);
    }

    Ok(router)
}
