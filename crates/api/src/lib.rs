//! `arcana-api` — HTTP surface for the prediction workflow.

pub mod app;
pub mod config;
