//! Turnstile - Rate-Limited HTTP Lookup Service
//!
//! This crate implements a small HTTP lookup service gated by a
//! distributed sliding-window rate limiter. Per-client request counters
//! live in a shared Redis store (or in process memory for single-instance
//! deployments) and are updated through a single atomic
//! increment-and-check primitive, so concurrent requests across all
//! instances cannot jointly exceed the limit.

pub mod config;
pub mod dataset;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
