//! Tribe scoring, eligibility, and ranking workflows for campus event
//! dashboards backed by the SBO PHP routes.

pub mod carousel;
pub mod config;
pub mod error;
pub mod gateway;
pub mod rankings;
pub mod roster;
pub mod scoring;
pub mod telemetry;
