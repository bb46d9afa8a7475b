use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Entry, EntryDraft, ExpenseCmd, GeneralSavingCmd, GroupCtx, ResultEngine,
    SavingCmd, TransactionKind, transactions,
};

use super::{Engine, new_id, normalize_optional_text, today, with_tx};

const DEFAULT_EXPENSE_CATEGORY: &str = "Other";

/// Filters for listing ledger entries.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`).
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// If present, only entries recorded for this member.
    pub member_id: Option<String>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<TransactionKind>>,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::Validation(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::Date.lt(to));
        }
        if let Some(member_id) = &filter.member_id {
            self = self.filter(transactions::Column::MemberId.eq(member_id.clone()));
        }
        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
            self = self.filter(transactions::Column::Kind.is_in(kinds));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    created_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }
}

/// An entry is owned by the loan book when editing it behind the loan's
/// back would desync `outstanding`/`total_repaid`.
fn is_loan_linked(entry: &Entry) -> bool {
    match &entry.detail {
        crate::EntryDetail::LoanDisbursed { .. } => true,
        crate::EntryDetail::LoanRepayment { loan_id, .. }
        | crate::EntryDetail::BankLoanRepayment { loan_id, .. } => loan_id.is_some(),
        _ => false,
    }
}

fn reject_loan_kinds(draft: &EntryDraft) -> ResultEngine<()> {
    match draft.kind {
        Some(TransactionKind::LoanDisbursed) => Err(EngineError::Validation(
            "disbursal entries are created by disburse_loan".to_string(),
        )),
        Some(kind) if kind.is_repayment() && draft.loan_id.is_some() => {
            Err(EngineError::Validation(
                "repayments against a loan go through apply_repayment".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

impl Engine {
    /// Records one ledger entry from a normalized draft.
    ///
    /// Loan-lifecycle entries are not accepted here: disbursals come from
    /// [`disburse_loan`] and loan-linked repayments from
    /// [`apply_repayment`], which keep the loan book in step. Repayment
    /// drafts are only accepted unlinked (`allow_unlinked`), the form bulk
    /// import uses for rows that match no open loan.
    ///
    /// [`disburse_loan`]: Engine::disburse_loan
    /// [`apply_repayment`]: Engine::apply_repayment
    pub async fn record_entry(&self, ctx: &GroupCtx, draft: EntryDraft) -> ResultEngine<Entry> {
        reject_loan_kinds(&draft)?;

        let entry = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            if let Some(member_id) = &draft.member_id {
                self.require_member(&db_tx, ctx, member_id).await?;
            }
            let entry = draft.normalize(new_id(), &ctx.group_id, &ctx.user_id, today())?;
            transactions::ActiveModel::from(&entry).insert(&db_tx).await?;
            Ok(entry)
        })?;

        self.notify(ctx).await;
        Ok(entry)
    }

    /// Records a member's saving deposit.
    ///
    /// A saving type of `Fine` records the entry as a fine, matching how
    /// the collection sheets label penalty collections.
    pub async fn record_saving(&self, ctx: &GroupCtx, cmd: SavingCmd) -> ResultEngine<Entry> {
        let saving_type = normalize_optional_text(cmd.saving_type.as_deref()).ok_or_else(|| {
            EngineError::Validation("saving type is required".to_string())
        })?;

        let kind = if saving_type.eq_ignore_ascii_case("fine") {
            TransactionKind::Fine
        } else {
            TransactionKind::Saving
        };
        let draft = EntryDraft {
            kind: Some(kind),
            member_id: Some(cmd.member_id),
            date: cmd.date,
            amount: Some(cmd.amount),
            saving_type: (kind == TransactionKind::Saving).then_some(saving_type),
            description: normalize_optional_text(cmd.description.as_deref()),
            ..Default::default()
        };
        self.record_entry(ctx, draft).await
    }

    pub async fn record_general_saving(
        &self,
        ctx: &GroupCtx,
        cmd: GeneralSavingCmd,
    ) -> ResultEngine<Entry> {
        let draft = EntryDraft {
            kind: Some(TransactionKind::GeneralSaving),
            member_id: cmd.member_id,
            date: cmd.date,
            amount: Some(cmd.amount),
            source: normalize_optional_text(cmd.source.as_deref()),
            description: normalize_optional_text(cmd.description.as_deref()),
            ..Default::default()
        };
        self.record_entry(ctx, draft).await
    }

    pub async fn record_expense(&self, ctx: &GroupCtx, cmd: ExpenseCmd) -> ResultEngine<Entry> {
        let draft = EntryDraft {
            kind: Some(TransactionKind::Expense),
            date: cmd.date,
            amount: Some(cmd.amount),
            category: Some(
                normalize_optional_text(cmd.category.as_deref())
                    .unwrap_or_else(|| DEFAULT_EXPENSE_CATEGORY.to_string()),
            ),
            description: normalize_optional_text(cmd.description.as_deref()),
            ..Default::default()
        };
        self.record_entry(ctx, draft).await
    }

    pub async fn transaction(&self, ctx: &GroupCtx, transaction_id: &str) -> ResultEngine<Entry> {
        self.require_group(&self.database, ctx).await?;
        self.require_entry(&self.database, ctx, transaction_id).await
    }

    /// Replaces an entry's content, re-normalizing through the same
    /// boundary as [`record_entry`]. A missing draft kind keeps the
    /// entry's current kind. Loan-linked entries cannot be edited.
    ///
    /// [`record_entry`]: Engine::record_entry
    pub async fn update_transaction(
        &self,
        ctx: &GroupCtx,
        transaction_id: &str,
        mut draft: EntryDraft,
    ) -> ResultEngine<Entry> {
        let entry = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let existing = self.require_entry(&db_tx, ctx, transaction_id).await?;
            if is_loan_linked(&existing) {
                return Err(EngineError::Validation(
                    "loan-linked entries cannot be edited".to_string(),
                ));
            }
            draft.kind = draft.kind.or(Some(existing.detail.kind()));
            reject_loan_kinds(&draft)?;
            if let Some(member_id) = &draft.member_id {
                self.require_member(&db_tx, ctx, member_id).await?;
            }

            let mut entry =
                draft.normalize(existing.id.clone(), &ctx.group_id, &existing.recorded_by, today())?;
            entry.created_at = existing.created_at;
            transactions::ActiveModel::from(&entry).update(&db_tx).await?;
            Ok(entry)
        })?;

        self.notify(ctx).await;
        Ok(entry)
    }

    /// Deletes an entry. Loan-linked entries cannot be deleted.
    pub async fn delete_transaction(
        &self,
        ctx: &GroupCtx,
        transaction_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let existing = self.require_entry(&db_tx, ctx, transaction_id).await?;
            if is_loan_linked(&existing) {
                return Err(EngineError::Validation(
                    "loan-linked entries cannot be deleted".to_string(),
                ));
            }
            transactions::Entity::delete_by_id(transaction_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;

        self.notify(ctx).await;
        Ok(())
    }

    /// Lists ledger entries, newest first, with cursor-based pagination by
    /// `(created_at DESC, id DESC)`.
    pub async fn list_transactions(
        &self,
        ctx: &GroupCtx,
        filter: &TransactionListFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Entry>, Option<String>)> {
        self.require_group(&self.database, ctx).await?;
        validate_list_filter(filter)?;

        let limit_plus_one = limit.saturating_add(1);
        let mut query = transactions::Entity::find()
            .filter(transactions::Column::GroupId.eq(ctx.group_id.clone()))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit_plus_one);

        if let Some(cursor) = cursor {
            let cursor = TransactionsCursor::decode(cursor)?;
            query = query.filter(
                Condition::any()
                    .add(transactions::Column::CreatedAt.lt(cursor.created_at))
                    .add(
                        Condition::all()
                            .add(transactions::Column::CreatedAt.eq(cursor.created_at))
                            .add(transactions::Column::Id.lt(cursor.transaction_id)),
                    ),
            );
        }
        query = query.apply_tx_filters(filter);

        let rows = query.all(&self.database).await?;
        let has_more = rows.len() > limit as usize;

        let mut out: Vec<Entry> = Vec::with_capacity(rows.len().min(limit as usize));
        for model in rows.into_iter().take(limit as usize) {
            out.push(Entry::try_from(model)?);
        }

        let next_cursor = out.last().map(|entry| TransactionsCursor {
            created_at: entry.created_at,
            transaction_id: entry.id.clone(),
        });
        let next_cursor = if has_more {
            next_cursor.map(|c| c.encode()).transpose()?
        } else {
            None
        };

        Ok((out, next_cursor))
    }

    pub(super) async fn require_entry<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
        transaction_id: &str,
    ) -> ResultEngine<Entry> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .filter(transactions::Column::GroupId.eq(ctx.group_id.clone()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction".to_string()))?;
        Entry::try_from(model)
    }
}
