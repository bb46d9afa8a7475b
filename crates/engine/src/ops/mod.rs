use chrono::{NaiveDate, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, PaginatorTrait, QueryFilter, prelude::*};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    BalanceSheet, EngineError, Entry, Group, GroupCtx, LedgerSnapshot, LoanStatus, Money,
    ResultEngine, watch::SnapshotHub,
};

mod backup;
mod balances;
mod groups;
mod import;
mod loans;
mod meetings;
mod members;
mod reports;
mod transactions;

pub use backup::{
    BackupBundle, CollectionDiff, LoanRecord, MeetingRecord, MemberRecord, RestorePreview,
    RestoreReport, TransactionRecord,
};
pub use groups::DeleteGroupReport;
pub use import::{ImportSummary, SheetRow, SkippedRow, read_sheet};
pub use reports::{
    GroupTotals, LoanBookFilter, LoanBookReport, LoanCategoryTotals, MemberTotal,
};
pub use transactions::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    snapshots: SnapshotHub,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Subscribes to the group's ledger snapshots.
    ///
    /// The receiver always holds the latest published [`LedgerSnapshot`];
    /// every mutating operation on the group republishes. A fresh channel
    /// starts at revision 0 with empty state until the first mutation.
    pub async fn subscribe(
        &self,
        ctx: &GroupCtx,
    ) -> ResultEngine<watch::Receiver<LedgerSnapshot>> {
        self.require_group(&self.database, ctx).await?;
        Ok(self.snapshots.subscribe(&ctx.channel_key()))
    }

    /// Loads the group row, enforcing that `ctx.user_id` owns it.
    pub(super) async fn require_group<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
    ) -> ResultEngine<Group> {
        let model = crate::groups::Entity::find_by_id(ctx.group_id.clone())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound("group".to_string()))?;
        if model.user_id != ctx.user_id {
            return Err(EngineError::NotFound("group".to_string()));
        }
        Ok(Group::from(model))
    }

    /// Loads every ledger entry of the group.
    pub(super) async fn load_entries<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
    ) -> ResultEngine<Vec<Entry>> {
        let models = crate::transactions::Entity::find()
            .filter(crate::transactions::Column::GroupId.eq(ctx.group_id.clone()))
            .all(conn)
            .await?;
        let mut entries = Vec::with_capacity(models.len());
        for model in models {
            entries.push(Entry::try_from(model)?);
        }
        Ok(entries)
    }

    /// Recomputes and publishes the group's snapshot.
    ///
    /// Called after every committed mutation. A failure here must not fail
    /// the already-committed operation, so callers go through [`notify`].
    ///
    /// [`notify`]: Engine::notify
    async fn publish_snapshot(&self, ctx: &GroupCtx) -> ResultEngine<()> {
        let entries = self.load_entries(&self.database, ctx).await?;
        let mut sheet = BalanceSheet::from_entries(&entries);

        let loan_models = crate::loans::Entity::find()
            .filter(crate::loans::Column::GroupId.eq(ctx.group_id.clone()))
            .all(&self.database)
            .await?;
        let outstanding: i64 = loan_models
            .iter()
            .filter(|l| l.status == LoanStatus::Active.as_str())
            .map(|l| l.outstanding_minor)
            .sum();
        sheet.outstanding_loans = Money::new(outstanding);

        let members = crate::members::Entity::find()
            .filter(crate::members::Column::GroupId.eq(ctx.group_id.clone()))
            .count(&self.database)
            .await?;
        let meetings = crate::meetings::Entity::find()
            .filter(crate::meetings::Column::GroupId.eq(ctx.group_id.clone()))
            .count(&self.database)
            .await?;

        self.snapshots.publish(
            &ctx.channel_key(),
            LedgerSnapshot {
                revision: 0,
                balances: sheet,
                members,
                transactions: entries.len() as u64,
                loans: loan_models.len() as u64,
                meetings,
            },
        );
        Ok(())
    }

    pub(super) async fn notify(&self, ctx: &GroupCtx) {
        if let Err(err) = self.publish_snapshot(ctx).await {
            tracing::warn!(group_id = %ctx.group_id, error = %err, "snapshot publish failed");
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            snapshots: SnapshotHub::default(),
        })
    }
}
