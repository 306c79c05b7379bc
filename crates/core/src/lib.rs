pub mod application;
pub mod compose;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod ports;
pub mod retrieval;
pub mod session;
pub mod utils;

pub use application::{Answer, InsightService};
pub use domain::Record;
pub use error::InsightError;
