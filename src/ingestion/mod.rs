pub mod ingestion_errors;
pub mod ingestion_model;
pub mod ingestion_service;
pub mod ingestion_traits;


pub use ingestion_errors::SourceError;
pub use ingestion_model::{
    IngestionSummary, RawDividend, RawPayTransaction, RawRecord, RawSubTransfer, RawTransfer,
    SourceKind,
};
pub use ingestion_service::IngestionService;
pub use ingestion_traits::TransactionSource;
