use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Entry, EntryDetail, GroupCtx, Loan, LoanStatus, LoanType, Meeting, Member,
    Money, ResultEngine, loans, meetings, members, members::normalize_name, transactions,
};

use super::{Engine, with_tx};

/// Writes per committed merge batch, matching the import batch size.
const MERGE_BATCH: usize = 450;

/// One member, without its group binding, so a bundle can be restored
/// into any group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub designation: String,
    pub joining_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub member_id: Option<String>,
    pub date: NaiveDate,
    pub amount: Money,
    pub detail: EntryDetail,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub recorded_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    pub id: String,
    pub member_id: String,
    pub loan_type: LoanType,
    pub principal_minor: i64,
    pub outstanding_minor: i64,
    pub total_repaid_minor: i64,
    pub interest_rate_bps: Option<i32>,
    pub term_months: Option<i32>,
    pub status: LoanStatus,
    pub date: NaiveDate,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub recorded_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: String,
    pub date: NaiveDate,
    pub agenda: String,
    pub notes: Option<String>,
    pub attendees: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A full export of one group's books.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBundle {
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub loans: Vec<LoanRecord>,
    pub meetings: Vec<MeetingRecord>,
}

/// Id overlap between a bundle collection and the stored one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CollectionDiff {
    pub total: u64,
    pub new: u64,
    pub existing: u64,
}

/// Per-collection merge preview; no writes performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RestorePreview {
    pub members: CollectionDiff,
    pub transactions: CollectionDiff,
    pub loans: CollectionDiff,
    pub meetings: CollectionDiff,
}

/// Per-collection counts actually written by a merge (`new` inserted,
/// `existing` overwritten).
pub type RestoreReport = RestorePreview;

impl From<Member> for MemberRecord {
    fn from(m: Member) -> Self {
        Self {
            id: m.id,
            name: m.name,
            mobile: m.mobile,
            email: m.email,
            address: m.address,
            designation: m.designation,
            joining_date: m.joining_date,
            created_at: m.created_at,
        }
    }
}

impl From<Entry> for TransactionRecord {
    fn from(e: Entry) -> Self {
        Self {
            id: e.id,
            member_id: e.member_id,
            date: e.date,
            amount: e.amount,
            detail: e.detail,
            description: e.description,
            created_at: e.created_at,
            recorded_by: e.recorded_by,
        }
    }
}

impl From<Loan> for LoanRecord {
    fn from(l: Loan) -> Self {
        Self {
            id: l.id,
            member_id: l.member_id,
            loan_type: l.loan_type,
            principal_minor: l.principal_minor,
            outstanding_minor: l.outstanding_minor,
            total_repaid_minor: l.total_repaid_minor,
            interest_rate_bps: l.interest_rate_bps,
            term_months: l.term_months,
            status: l.status,
            date: l.date,
            description: l.description,
            created_at: l.created_at,
            recorded_by: l.recorded_by,
        }
    }
}

impl From<Meeting> for MeetingRecord {
    fn from(m: Meeting) -> Self {
        Self {
            id: m.id,
            date: m.date,
            agenda: m.agenda,
            notes: m.notes,
            attendees: m.attendees,
            created_at: m.created_at,
        }
    }
}

fn member_from_record(record: MemberRecord, group_id: &str) -> Member {
    Member {
        id: record.id,
        group_id: group_id.to_string(),
        name_norm: normalize_name(&record.name),
        name: record.name,
        mobile: record.mobile,
        email: record.email,
        address: record.address,
        designation: record.designation,
        joining_date: record.joining_date,
        created_at: record.created_at,
    }
}

fn entry_from_record(record: TransactionRecord, group_id: &str) -> Entry {
    Entry {
        id: record.id,
        group_id: group_id.to_string(),
        member_id: record.member_id,
        date: record.date,
        amount: record.amount,
        detail: record.detail,
        description: record.description,
        created_at: record.created_at,
        recorded_by: record.recorded_by,
    }
}

fn loan_from_record(record: LoanRecord, group_id: &str) -> Loan {
    Loan {
        id: record.id,
        group_id: group_id.to_string(),
        member_id: record.member_id,
        loan_type: record.loan_type,
        principal_minor: record.principal_minor,
        outstanding_minor: record.outstanding_minor,
        total_repaid_minor: record.total_repaid_minor,
        interest_rate_bps: record.interest_rate_bps,
        term_months: record.term_months,
        status: record.status,
        date: record.date,
        description: record.description,
        created_at: record.created_at,
        recorded_by: record.recorded_by,
    }
}

fn meeting_from_record(record: MeetingRecord, group_id: &str) -> Meeting {
    Meeting {
        id: record.id,
        group_id: group_id.to_string(),
        date: record.date,
        agenda: record.agenda,
        notes: record.notes,
        attendees: record.attendees,
        created_at: record.created_at,
    }
}

/// Plain decimal rupees for CSV cells (no symbol, no grouping).
fn csv_amount(amount: Money) -> String {
    let paise = amount.paise();
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

impl Engine {
    /// Exports the group's four collections as one serializable bundle.
    pub async fn export_backup(&self, ctx: &GroupCtx) -> ResultEngine<BackupBundle> {
        self.require_group(&self.database, ctx).await?;

        let members = self.list_members(ctx).await?;
        let entries = self.load_entries(&self.database, ctx).await?;
        let loans = self.list_loans(ctx, true).await?;
        let meetings = self.list_meetings(ctx).await?;

        Ok(BackupBundle {
            created_at: Utc::now(),
            members: members.into_iter().map(MemberRecord::from).collect(),
            transactions: entries.into_iter().map(TransactionRecord::from).collect(),
            loans: loans.into_iter().map(LoanRecord::from).collect(),
            meetings: meetings.into_iter().map(MeetingRecord::from).collect(),
        })
    }

    /// Writes the flat transaction export.
    pub async fn write_transactions_csv<W: Write>(
        &self,
        ctx: &GroupCtx,
        writer: W,
    ) -> ResultEngine<()> {
        self.require_group(&self.database, ctx).await?;

        let members = self.list_members(ctx).await?;
        let names: std::collections::HashMap<String, String> =
            members.into_iter().map(|m| (m.id, m.name)).collect();

        let models = transactions::Entity::find()
            .filter(transactions::Column::GroupId.eq(ctx.group_id.clone()))
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut wtr = csv::Writer::from_writer(writer);
        let csv_err = |err: csv::Error| EngineError::Validation(format!("csv write: {err}"));
        wtr.write_record([
            "ID",
            "Date",
            "Date (Local)",
            "Type",
            "Category",
            "MemberID",
            "MemberName",
            "Amount",
            "Principal Repaid",
            "Interest Repaid",
            "Description",
            "Recorded By",
            "Created At",
        ])
        .map_err(csv_err)?;

        for model in models {
            let entry = Entry::try_from(model)?;
            let (category, principal, interest) = match &entry.detail {
                EntryDetail::Saving { saving_type } => {
                    (saving_type.clone().unwrap_or_default(), None, None)
                }
                EntryDetail::GeneralSaving { source } => {
                    (source.clone().unwrap_or_default(), None, None)
                }
                EntryDetail::Fine => (String::new(), None, None),
                EntryDetail::Expense { category } => {
                    (category.clone().unwrap_or_default(), None, None)
                }
                EntryDetail::LoanDisbursed { loan_type, .. } => {
                    (loan_type.as_str().to_string(), None, None)
                }
                EntryDetail::LoanRepayment {
                    loan_type,
                    principal,
                    interest,
                    ..
                }
                | EntryDetail::BankLoanRepayment {
                    loan_type,
                    principal,
                    interest,
                    ..
                } => (
                    loan_type
                        .as_ref()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    Some(*principal),
                    Some(*interest),
                ),
            };
            let member_id = entry.member_id.clone().unwrap_or_default();
            let member_name = entry
                .member_id
                .as_ref()
                .and_then(|id| names.get(id).cloned())
                .unwrap_or_default();

            wtr.write_record([
                entry.id.as_str(),
                &entry.date.format("%Y-%m-%d").to_string(),
                &entry.date.format("%d/%m/%Y").to_string(),
                entry.detail.kind().as_str(),
                &category,
                &member_id,
                &member_name,
                &csv_amount(entry.amount),
                &principal.map(csv_amount).unwrap_or_default(),
                &interest.map(csv_amount).unwrap_or_default(),
                &entry.description,
                &entry.recorded_by,
                &entry.created_at.to_rfc3339(),
            ])
            .map_err(csv_err)?;
        }
        wtr.flush()
            .map_err(|err| EngineError::Validation(format!("csv write: {err}")))?;
        Ok(())
    }

    /// Diffs a bundle against the stored collections by id. No writes.
    pub async fn restore_preview(
        &self,
        ctx: &GroupCtx,
        bundle: &BackupBundle,
    ) -> ResultEngine<RestorePreview> {
        self.require_group(&self.database, ctx).await?;

        let member_ids = self.stored_ids::<members::Entity>(ctx, members::Column::GroupId, members::Column::Id).await?;
        let tx_ids = self
            .stored_ids::<transactions::Entity>(ctx, transactions::Column::GroupId, transactions::Column::Id)
            .await?;
        let loan_ids = self.stored_ids::<loans::Entity>(ctx, loans::Column::GroupId, loans::Column::Id).await?;
        let meeting_ids = self
            .stored_ids::<meetings::Entity>(ctx, meetings::Column::GroupId, meetings::Column::Id)
            .await?;

        Ok(RestorePreview {
            members: diff(bundle.members.iter().map(|r| r.id.as_str()), &member_ids),
            transactions: diff(bundle.transactions.iter().map(|r| r.id.as_str()), &tx_ids),
            loans: diff(bundle.loans.iter().map(|r| r.id.as_str()), &loan_ids),
            meetings: diff(bundle.meetings.iter().map(|r| r.id.as_str()), &meeting_ids),
        })
    }

    /// Merges a bundle into the group: known ids are overwritten, new ids
    /// inserted. Writes are committed in batches like bulk import.
    pub async fn restore_merge(
        &self,
        ctx: &GroupCtx,
        bundle: BackupBundle,
    ) -> ResultEngine<RestoreReport> {
        let preview = self.restore_preview(ctx, &bundle).await?;

        let member_ids = self.stored_ids::<members::Entity>(ctx, members::Column::GroupId, members::Column::Id).await?;
        let tx_ids = self
            .stored_ids::<transactions::Entity>(ctx, transactions::Column::GroupId, transactions::Column::Id)
            .await?;
        let loan_ids = self.stored_ids::<loans::Entity>(ctx, loans::Column::GroupId, loans::Column::Id).await?;
        let meeting_ids = self
            .stored_ids::<meetings::Entity>(ctx, meetings::Column::GroupId, meetings::Column::Id)
            .await?;

        for chunk in bundle.members.chunks(MERGE_BATCH) {
            with_tx!(self, |db_tx| {
                for record in chunk {
                    let model = members::ActiveModel::from(&member_from_record(
                        record.clone(),
                        &ctx.group_id,
                    ));
                    if member_ids.contains(&record.id) {
                        model.update(&db_tx).await?;
                    } else {
                        model.insert(&db_tx).await?;
                    }
                }
                Ok(())
            })?;
        }
        for chunk in bundle.transactions.chunks(MERGE_BATCH) {
            with_tx!(self, |db_tx| {
                for record in chunk {
                    let model = transactions::ActiveModel::from(&entry_from_record(
                        record.clone(),
                        &ctx.group_id,
                    ));
                    if tx_ids.contains(&record.id) {
                        model.update(&db_tx).await?;
                    } else {
                        model.insert(&db_tx).await?;
                    }
                }
                Ok(())
            })?;
        }
        for chunk in bundle.loans.chunks(MERGE_BATCH) {
            with_tx!(self, |db_tx| {
                for record in chunk {
                    let model =
                        loans::ActiveModel::from(&loan_from_record(record.clone(), &ctx.group_id));
                    if loan_ids.contains(&record.id) {
                        model.update(&db_tx).await?;
                    } else {
                        model.insert(&db_tx).await?;
                    }
                }
                Ok(())
            })?;
        }
        for chunk in bundle.meetings.chunks(MERGE_BATCH) {
            with_tx!(self, |db_tx| {
                for record in chunk {
                    let model = meetings::ActiveModel::try_from(&meeting_from_record(
                        record.clone(),
                        &ctx.group_id,
                    ))?;
                    if meeting_ids.contains(&record.id) {
                        model.update(&db_tx).await?;
                    } else {
                        model.insert(&db_tx).await?;
                    }
                }
                Ok(())
            })?;
        }

        self.notify(ctx).await;
        Ok(preview)
    }

    async fn stored_ids<E>(
        &self,
        ctx: &GroupCtx,
        group_col: impl ColumnTrait,
        id_col: impl ColumnTrait,
    ) -> ResultEngine<HashSet<String>>
    where
        E: EntityTrait,
    {
        let ids: Vec<String> = E::find()
            .select_only()
            .column(id_col)
            .filter(group_col.eq(ctx.group_id.clone()))
            .into_tuple()
            .all(&self.database)
            .await?;
        Ok(ids.into_iter().collect())
    }
}

fn diff<'a>(bundle_ids: impl Iterator<Item = &'a str>, stored: &HashSet<String>) -> CollectionDiff {
    let mut out = CollectionDiff::default();
    for id in bundle_ids {
        out.total += 1;
        if stored.contains(id) {
            out.existing += 1;
        } else {
            out.new += 1;
        }
    }
    out
}
