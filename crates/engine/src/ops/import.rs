use std::collections::HashMap;
use std::io::Read;

use chrono::{Duration, NaiveDate};
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use serde::Deserialize;

use crate::{
    EngineError, Entry, EntryDraft, GroupCtx, Loan, LoanStatus, LoanType, Money, ResultEngine,
    TransactionKind, loans, members::normalize_name, transactions,
};

use super::{Engine, new_id, today, with_tx};

/// Maximum logical writes per committed batch.
const MAX_BATCH_WRITES: usize = 450;

/// One spreadsheet row, as exported by the collection sheets.
///
/// Every field is read as text; parsing and normalization happen during
/// [`Engine::import_rows`], so a malformed cell skips one row instead of
/// failing the file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "Type", alias = "type", default)]
    pub entry_type: String,
    #[serde(rename = "MemberName", alias = "Member Name", alias = "memberName", default)]
    pub member_name: String,
    #[serde(rename = "Date", alias = "date", default)]
    pub date: String,
    #[serde(rename = "Amount", alias = "amount", default)]
    pub amount: String,
    #[serde(rename = "Loan Type", alias = "LoanType", alias = "loanType", default)]
    pub loan_type: String,
    #[serde(
        rename = "Principal Repaid",
        alias = "PrincipalRepaid",
        alias = "Principal Repayment",
        default
    )]
    pub principal: String,
    #[serde(rename = "Interest Repaid", alias = "InterestRepaid", default)]
    pub interest: String,
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,
}

/// A row the import refused, with the 1-based data row number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Outcome of a bulk import.
///
/// The import is best-effort: committed batches stay committed. A batch
/// that fails to commit stops the run and surfaces in `failure`;
/// `imported_rows` then tells how far the run got, and rerunning the
/// remainder is safe.
#[derive(Clone, Debug, Default)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported_rows: usize,
    pub skipped: Vec<SkippedRow>,
    pub warnings: Vec<String>,
    pub failure: Option<String>,
}

/// Parses spreadsheet rows from CSV with alias-tolerant headers.
pub fn read_sheet<R: Read>(reader: R) -> ResultEngine<Vec<SheetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.deserialize::<SheetRow>() {
        let row =
            record.map_err(|err| EngineError::Validation(format!("invalid sheet row: {err}")))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Resolves a spreadsheet date cell to a calendar date.
///
/// Accepted forms, in order: spreadsheet serial number (days since
/// 1899-12-30, minus one for serials >= 60 to absorb the 1900 leap-year
/// bug), ISO `YYYY-MM-DD`, `D/M/YYYY`, `D-M-YYYY`. Anything else,
/// including an empty cell, falls back to `today`.
fn normalize_sheet_date(raw: &str, today: NaiveDate) -> NaiveDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return today;
    }

    if let Ok(serial) = raw.parse::<i64>() {
        if serial > 0
            && let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30)
        {
            let adjust = i64::from(serial >= 60);
            if let Some(delta) = Duration::try_days(serial - adjust)
                && let Some(date) = epoch.checked_add_signed(delta)
            {
                return date;
            }
        }
        return today;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date;
    }

    for sep in ['/', '-'] {
        let mut parts = raw.split(sep);
        if let (Some(d), Some(m), Some(y), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
            && let (Ok(d), Ok(m), Ok(y)) = (d.parse::<u32>(), m.parse::<u32>(), y.parse::<i32>())
            && let Some(date) = NaiveDate::from_ymd_opt(y, m, d)
        {
            return date;
        }
    }

    today
}

fn parse_cell_amount(raw: &str, label: &str, row: usize) -> Result<Money, SkippedRow> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Money::ZERO);
    }
    let amount = raw.parse::<Money>().map_err(|err| SkippedRow {
        row,
        reason: format!("invalid {label}: {err}"),
    })?;
    if amount.is_negative() {
        return Err(SkippedRow {
            row,
            reason: format!("negative {label}: {raw}"),
        });
    }
    Ok(amount)
}

/// Loan-side effect of a row, applied to the open-loan simulation only
/// after the row's entry draft has validated. A skipped row must leave
/// the simulation untouched.
enum LoanEffect {
    Disburse(Loan),
    Repay {
        key: (String, String),
        principal_minor: i64,
        interest_minor: i64,
    },
}

enum WriteOp {
    Entry(Entry),
    Loan(Loan),
    LoanUpdate {
        id: String,
        outstanding_minor: i64,
        total_repaid_minor: i64,
        status: LoanStatus,
    },
}

fn loan_key(member_id: &str, loan_type: LoanType) -> (String, String) {
    (member_id.to_string(), loan_type.as_str().to_lowercase())
}

impl Engine {
    /// Imports spreadsheet rows into the group's ledger.
    ///
    /// Rows are simulated sequentially so later rows observe the effects
    /// of earlier ones: a disbursal seeds the open-loan lookup, and a
    /// repayment that closes a loan removes it. The open-loan lookup is
    /// keyed by `(member, loan type)`; when several open loans share a
    /// key, the most recently disbursed wins. Unknown member names and
    /// malformed cells skip their row; a repayment matching no open loan
    /// is kept as a cash-only entry with a warning.
    ///
    /// Writes are committed in batches of at most [`MAX_BATCH_WRITES`]
    /// logical writes; a row's writes never straddle a batch boundary.
    pub async fn import_rows(
        &self,
        ctx: &GroupCtx,
        rows: Vec<SheetRow>,
    ) -> ResultEngine<ImportSummary> {
        self.require_group(&self.database, ctx).await?;
        let today = today();

        let members = self.list_members(ctx).await?;
        let members_by_norm: HashMap<String, (String, String)> = members
            .into_iter()
            .map(|m| (m.name_norm.clone(), (m.id, m.name)))
            .collect();

        // Open loans, latest disbursed last so it wins the key.
        let mut loan_models = loans::Entity::find()
            .filter(loans::Column::GroupId.eq(ctx.group_id.clone()))
            .filter(loans::Column::Status.eq(LoanStatus::Active.as_str()))
            .all(&self.database)
            .await?;
        loan_models.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut open_loans: HashMap<(String, String), Loan> = HashMap::new();
        for model in loan_models {
            let loan = Loan::try_from(model)?;
            if !loan.is_open() {
                continue;
            }
            open_loans.insert(loan_key(&loan.member_id, loan.loan_type), loan);
        }

        let mut summary = ImportSummary {
            total_rows: rows.len(),
            ..Default::default()
        };
        let mut batch: Vec<WriteOp> = Vec::new();
        let mut batch_rows = 0usize;

        for (index, row) in rows.into_iter().enumerate() {
            let row_no = index + 1;

            let ops = match self.plan_row(
                ctx,
                &row,
                row_no,
                today,
                &members_by_norm,
                &mut open_loans,
                &mut summary.warnings,
            ) {
                Ok(ops) => ops,
                Err(skipped) => {
                    tracing::warn!(
                        group_id = %ctx.group_id,
                        row = skipped.row,
                        reason = %skipped.reason,
                        "import row skipped"
                    );
                    summary.skipped.push(skipped);
                    continue;
                }
            };

            if !batch.is_empty() && batch.len() + ops.len() > MAX_BATCH_WRITES {
                if let Err(err) = self.commit_batch(&batch).await {
                    summary.failure = Some(err.to_string());
                    self.notify(ctx).await;
                    return Ok(summary);
                }
                summary.imported_rows += batch_rows;
                batch.clear();
                batch_rows = 0;
            }
            batch.extend(ops);
            batch_rows += 1;
        }

        if !batch.is_empty() {
            match self.commit_batch(&batch).await {
                Ok(()) => summary.imported_rows += batch_rows,
                Err(err) => summary.failure = Some(err.to_string()),
            }
        }

        self.notify(ctx).await;
        Ok(summary)
    }

    /// Turns one row into its write ops, updating the simulation state.
    #[allow(clippy::too_many_arguments)]
    fn plan_row(
        &self,
        ctx: &GroupCtx,
        row: &SheetRow,
        row_no: usize,
        today: NaiveDate,
        members_by_norm: &HashMap<String, (String, String)>,
        open_loans: &mut HashMap<(String, String), Loan>,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<WriteOp>, SkippedRow> {
        let kind = TransactionKind::from_label(&row.entry_type).map_err(|err| SkippedRow {
            row: row_no,
            reason: err.to_string(),
        })?;

        let member_name = row.member_name.trim();
        let member = if member_name.is_empty() {
            None
        } else {
            match members_by_norm.get(&normalize_name(member_name)) {
                Some((id, name)) => Some((id.clone(), name.clone())),
                None => {
                    return Err(SkippedRow {
                        row: row_no,
                        reason: format!("unknown member: {member_name}"),
                    });
                }
            }
        };
        let needs_member = matches!(
            kind,
            TransactionKind::Saving | TransactionKind::Fine | TransactionKind::LoanDisbursed
        ) || kind.is_repayment();
        if needs_member && member.is_none() {
            return Err(SkippedRow {
                row: row_no,
                reason: format!("{} row without a member name", kind.as_str()),
            });
        }

        let date = normalize_sheet_date(&row.date, today);
        let amount = parse_cell_amount(&row.amount, "amount", row_no)?;
        let principal = parse_cell_amount(&row.principal, "principal", row_no)?;
        let interest = parse_cell_amount(&row.interest, "interest", row_no)?;
        let description = super::normalize_optional_text(Some(&row.description));
        let member_id = member.map(|(id, _)| id);

        let mut draft = EntryDraft {
            kind: Some(kind),
            member_id: member_id.clone(),
            date: Some(date),
            amount: (!amount.is_zero()).then_some(amount),
            description,
            ..Default::default()
        };

        let mut effect: Option<LoanEffect> = None;
        let mut unmatched: Option<String> = None;
        match kind {
            TransactionKind::Saving
            | TransactionKind::GeneralSaving
            | TransactionKind::Fine
            | TransactionKind::Expense => {}
            TransactionKind::LoanDisbursed => {
                let loan_type = LoanType::from_label(&row.loan_type);
                let member_id = member_id.clone().ok_or_else(|| SkippedRow {
                    row: row_no,
                    reason: "disbursal without a member".to_string(),
                })?;
                if !amount.is_positive() {
                    return Err(SkippedRow {
                        row: row_no,
                        reason: "disbursal amount must be > 0".to_string(),
                    });
                }
                let loan = Loan {
                    id: new_id(),
                    group_id: ctx.group_id.clone(),
                    member_id,
                    loan_type,
                    principal_minor: amount.paise(),
                    outstanding_minor: amount.paise(),
                    total_repaid_minor: 0,
                    interest_rate_bps: None,
                    term_months: None,
                    status: LoanStatus::Active,
                    date,
                    description: draft.description.clone().unwrap_or_default(),
                    created_at: chrono::Utc::now(),
                    recorded_by: ctx.user_id.clone(),
                };
                draft.loan_id = Some(loan.id.clone());
                draft.loan_type = Some(loan_type);
                effect = Some(LoanEffect::Disburse(loan));
            }
            TransactionKind::LoanRepayment | TransactionKind::BankLoanRepayment => {
                draft.principal = Some(principal);
                draft.interest = Some(interest);

                let member_id = member_id.clone().ok_or_else(|| SkippedRow {
                    row: row_no,
                    reason: "repayment without a member".to_string(),
                })?;
                // A blank loan-type cell falls back to the row's kind.
                let loan_type = if row.loan_type.trim().is_empty() {
                    if kind == TransactionKind::BankLoanRepayment {
                        LoanType::Bank
                    } else {
                        LoanType::Book
                    }
                } else {
                    LoanType::from_label(&row.loan_type)
                };
                let key = loan_key(&member_id, loan_type);
                if let Some(open) = open_loans.get(&key) {
                    draft.loan_id = Some(open.id.clone());
                    draft.loan_type = Some(open.loan_type);
                    effect = Some(LoanEffect::Repay {
                        key,
                        principal_minor: principal.paise(),
                        interest_minor: interest.paise(),
                    });
                } else {
                    draft.loan_type = Some(loan_type);
                    draft.allow_unlinked = true;
                    unmatched = Some(format!(
                        "row {row_no}: no open {} for this member; recorded without loan effect",
                        loan_type.as_str()
                    ));
                }
            }
        }

        let entry = draft
            .normalize(new_id(), &ctx.group_id, &ctx.user_id, today)
            .map_err(|err| SkippedRow {
                row: row_no,
                reason: err.to_string(),
            })?;
        if let Some(warning) = unmatched {
            warnings.push(warning);
        }

        let mut ops = Vec::with_capacity(2);
        match effect {
            Some(LoanEffect::Disburse(loan)) => {
                open_loans.insert(loan_key(&loan.member_id, loan.loan_type), loan.clone());
                ops.push(WriteOp::Loan(loan));
            }
            Some(LoanEffect::Repay {
                key,
                principal_minor,
                interest_minor,
            }) => {
                if let Some(open) = open_loans.get_mut(&key) {
                    let outcome = open.preview_repayment(principal_minor, interest_minor);
                    open.outstanding_minor = outcome.outstanding_minor;
                    open.total_repaid_minor = outcome.total_repaid_minor;
                    open.status = outcome.status;
                    ops.push(WriteOp::LoanUpdate {
                        id: open.id.clone(),
                        outstanding_minor: outcome.outstanding_minor,
                        total_repaid_minor: outcome.total_repaid_minor,
                        status: outcome.status,
                    });
                    if outcome.status == LoanStatus::Closed {
                        open_loans.remove(&key);
                    }
                }
            }
            None => {}
        }
        ops.push(WriteOp::Entry(entry));
        Ok(ops)
    }

    async fn commit_batch(&self, ops: &[WriteOp]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            for op in ops {
                match op {
                    WriteOp::Entry(entry) => {
                        transactions::ActiveModel::from(entry).insert(&db_tx).await?;
                    }
                    WriteOp::Loan(loan) => {
                        loans::ActiveModel::from(loan).insert(&db_tx).await?;
                    }
                    WriteOp::LoanUpdate {
                        id,
                        outstanding_minor,
                        total_repaid_minor,
                        status,
                    } => {
                        let update = loans::ActiveModel {
                            id: ActiveValue::Set(id.clone()),
                            outstanding_minor: ActiveValue::Set(*outstanding_minor),
                            total_repaid_minor: ActiveValue::Set(*total_repaid_minor),
                            status: ActiveValue::Set(status.as_str().to_string()),
                            ..Default::default()
                        };
                        update.update(&db_tx).await?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn serial_dates_use_sheet_epoch() {
        // 1900-02-27 both before and at the phantom leap day.
        let expected = NaiveDate::from_ymd_opt(1900, 2, 27).unwrap();
        assert_eq!(normalize_sheet_date("59", base()), expected);
        assert_eq!(normalize_sheet_date("60", base()), expected);
        // The collection sheets' own converter maps 45443 to 2024-05-30;
        // historical re-imports must agree with it.
        assert_eq!(
            normalize_sheet_date("45443", base()),
            NaiveDate::from_ymd_opt(2024, 5, 30).unwrap()
        );
    }

    #[test]
    fn out_of_range_serials_fall_back_to_today() {
        assert_eq!(normalize_sheet_date("99999999999", base()), base());
        assert_eq!(normalize_sheet_date("9223372036854775807", base()), base());
        assert_eq!(normalize_sheet_date("-5", base()), base());
    }

    #[test]
    fn negative_cells_are_rejected() {
        let err = parse_cell_amount("-100", "principal", 3).unwrap_err();
        assert_eq!(err.row, 3);
        assert!(err.reason.contains("negative principal"));
    }

    #[test]
    fn literal_dates_parse_day_first() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(normalize_sheet_date("5/3/2024", base()), expected);
        assert_eq!(normalize_sheet_date("5-3-2024", base()), expected);
        assert_eq!(normalize_sheet_date("2024-03-05", base()), expected);
    }

    #[test]
    fn unparseable_dates_fall_back_to_today() {
        assert_eq!(normalize_sheet_date("", base()), base());
        assert_eq!(normalize_sheet_date("soon", base()), base());
        assert_eq!(normalize_sheet_date("13/13/2024", base()), base());
    }

    #[test]
    fn read_sheet_accepts_alias_headers() {
        let csv = "\
Type,Member Name,Date,Amount,LoanType,Principal Repaid,Interest Repaid,Description
Saving,Lakshmi Devi,5/3/2024,500,,,,monthly
Loan Repayment,Lakshmi Devi,5/3/2024,,Book Loan,400,50,
";
        let rows = read_sheet(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry_type, "Saving");
        assert_eq!(rows[0].member_name, "Lakshmi Devi");
        assert_eq!(rows[1].principal, "400");
        assert_eq!(rows[1].interest, "50");
    }
}
