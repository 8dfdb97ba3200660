pub mod api_model;
pub mod client;
pub mod queries;

pub use client::{OverpassClient, OverpassError, RetryPolicy};
