pub mod metrics;
pub mod principal;
pub mod tracing;

pub use principal::Principal;
pub use tracing::{REQUEST_ID_HEADER, RequestId};
