//! HTTP server for the ACDL registry.
//!
//! Exposes registration, discovery, and matching as JSON over HTTP.
//!
//! # Endpoints
//!
//! - `GET  /health`         — Liveness probe
//! - `POST /acdl/register`  — Register an agent manifest
//! - `POST /acdl/discover`  — Multi-criteria agent discovery
//! - `POST /acdl/match`     — Task/requirement matching

pub mod routes;

pub use routes::{app_router, AppState};
