pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::CsvReferenceSource;
pub use config::TariffConfig;
pub use core::{
    engine::{EngineSettings, TariffEngine},
    tables::TariffTables,
};
pub use domain::model::{
    CalculationRequest, CalculationResult, HtsRecord, MessageMetadata, ProductSpec, SortKey,
    SourcingOption, SourcingReport,
};
pub use utils::error::{Result, TariffError};
