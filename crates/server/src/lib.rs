//! HTTP control surface for the presale engine.
//!
//! Exposes intent management, routine control, scheduler and clock status,
//! plus Prometheus metrics. The binary in `main.rs` wires the core
//! components together and serves [`api::create_router`].

pub mod api;
pub mod metrics;
pub mod state;
