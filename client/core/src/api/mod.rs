//! Agent Service API
//!
//! [`ChatBackend`] is the seam between the chat driver and the service;
//! [`HttpBackend`] implements it over reqwest and adds the account calls
//! (sign-in, sign-up, token refresh) that only the real service needs.

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{ApiError, ByteStream, ChatBackend, StreamRequest};
