pub mod aggregator;
pub mod duty;
pub mod engine;
pub mod fees;
pub mod resolver;
pub mod sourcing;
pub mod tables;

pub use crate::domain::model::{
    CalculationRequest, CalculationResult, HtsRecord, ProductSpec, SortKey, SourcingReport,
};
pub use crate::domain::ports::ReferenceSource;
pub use crate::utils::error::Result;
