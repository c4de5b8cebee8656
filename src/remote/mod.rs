pub mod factory;
pub mod http;
pub mod provider;

pub use factory::create_api;
pub use http::{HttpRevisionApi, RetryPolicy};
pub use provider::RevisionApi;
