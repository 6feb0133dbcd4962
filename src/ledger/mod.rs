pub mod ledger_errors;
pub mod ledger_model;
pub mod ledger_repository;
pub mod ledger_traits;

pub use ledger_errors::LedgerError;
pub use ledger_model::{
    CashflowEvent, EventDirection, EventKind, LedgerEntry, ModificationRecord,
    ProcessingCheckpoint, RebalanceRecord, RebalanceStatus,
};
pub use ledger_repository::LedgerRepository;
pub use ledger_traits::LedgerRepositoryTrait;
