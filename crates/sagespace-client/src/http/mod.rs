/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: Normalized API responses and typed results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod admin;
pub mod client;
pub mod collections;
pub mod error;
pub mod feed;
pub mod marketplace;
pub mod notifications;
pub mod sages;
pub mod users;

pub use error::{ApiError, DEMO_MODE_MESSAGE, Result};

pub use client::{ClientConfig, RequestOptions, SageClient, StaticToken, TokenSource};
pub(crate) use client::segment;
