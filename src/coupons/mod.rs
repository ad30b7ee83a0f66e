pub mod models;
pub mod error;
pub mod conditions;
pub mod validity;
pub mod pipeline;
pub mod discount_calculator;
pub mod metrics;
pub mod repository;
pub mod service;

pub use models::*;
pub use error::*;
pub use conditions::*;
pub use validity::*;
pub use pipeline::*;
pub use discount_calculator::*;
pub use metrics::*;
pub use repository::*;
pub use service::*;
