//! services/api/src/lib.rs
//!
//! The HTTP service around `study_planner_core`: configuration, adapters for
//! PostgreSQL and the counsellor model, and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
