// Adapters layer: concrete implementations for external systems (reference data files).

pub mod csv_source;

pub use csv_source::CsvReferenceSource;
