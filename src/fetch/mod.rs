//! Fetch Module
//!
//! Request/response model, the network transport seam and the cache-first
//! interceptor.

mod interceptor;
mod request;
mod response;
mod transport;

pub use interceptor::{FetchInterceptor, FetchOutcome, InterceptorStats, ResponseSource};
pub use request::{Destination, FetchRequest};
pub use response::{FetchResponse, ResponseType};
pub use transport::{HttpTransport, Transport};
