//! Bookkeeping engine for Self-Help Group (SHG) ledgers.
//!
//! The engine owns the database and exposes group-scoped operations:
//! recording ledger entries, the loan lifecycle, derived balances,
//! reports, bulk spreadsheet import and backup/restore. Callers identify
//! the acting user and group through an explicit [`GroupCtx`].

pub use balances::BalanceSheet;
pub use commands::{
    DisburseCmd, ExpenseCmd, GeneralSavingCmd, MeetingCmd, MemberCmd, MemberPatch, RepaymentCmd,
    SavingCmd,
};
pub use error::EngineError;
pub use groups::{Group, GroupCtx};
pub use loans::{Loan, LoanStatus, LoanType, RepaymentOutcome};
pub use meetings::Meeting;
pub use members::{Member, normalize_mobile, normalize_name};
pub use money::Money;
pub use ops::{
    BackupBundle, CollectionDiff, DeleteGroupReport, Engine, EngineBuilder, GroupTotals,
    ImportSummary, LoanBookFilter, LoanBookReport, LoanCategoryTotals, LoanRecord, MeetingRecord,
    MemberRecord, MemberTotal, RestorePreview, RestoreReport, SheetRow, SkippedRow,
    TransactionRecord, TransactionListFilter, read_sheet,
};
pub use transactions::{Entry, EntryDetail, EntryDraft, TransactionKind};
pub use watch::LedgerSnapshot;

mod balances;
mod commands;
mod error;
mod groups;
mod loans;
mod meetings;
mod members;
mod money;
mod ops;
mod transactions;
mod watch;

pub type ResultEngine<T> = Result<T, EngineError>;
