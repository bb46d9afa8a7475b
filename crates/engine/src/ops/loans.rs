use chrono::Utc;
use sea_orm::{
    ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, Value, prelude::*,
    sea_query::Expr,
};

use crate::{
    DisburseCmd, EngineError, Entry, EntryDetail, GroupCtx, Loan, LoanStatus, Money,
    RepaymentCmd, ResultEngine, loans, transactions,
};

use super::{Engine, new_id, normalize_optional_text, today, with_tx};

impl Engine {
    /// Disburses a loan: creates the loan row (`outstanding = principal`,
    /// active) and its `Loan Disbursed` ledger entry in one DB transaction,
    /// so the pair either exists completely or not at all.
    pub async fn disburse_loan(&self, ctx: &GroupCtx, cmd: DisburseCmd) -> ResultEngine<Loan> {
        if !cmd.principal.is_positive() {
            return Err(EngineError::InvalidAmount(
                "loan principal must be > 0".to_string(),
            ));
        }

        let loan = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            self.require_member(&db_tx, ctx, &cmd.member_id).await?;

            let date = cmd.date.unwrap_or_else(today);
            let description = normalize_optional_text(cmd.description.as_deref())
                .unwrap_or_else(|| format!("{} disbursed", cmd.loan_type.as_str()));

            let loan = Loan {
                id: new_id(),
                group_id: ctx.group_id.clone(),
                member_id: cmd.member_id.clone(),
                loan_type: cmd.loan_type,
                principal_minor: cmd.principal.paise(),
                outstanding_minor: cmd.principal.paise(),
                total_repaid_minor: 0,
                interest_rate_bps: cmd.interest_rate_bps,
                term_months: cmd.term_months,
                status: LoanStatus::Active,
                date,
                description: description.clone(),
                created_at: Utc::now(),
                recorded_by: ctx.user_id.clone(),
            };
            loans::ActiveModel::from(&loan).insert(&db_tx).await?;

            let entry = Entry {
                id: new_id(),
                group_id: ctx.group_id.clone(),
                member_id: Some(cmd.member_id.clone()),
                date,
                amount: cmd.principal,
                detail: EntryDetail::LoanDisbursed {
                    loan_id: loan.id.clone(),
                    loan_type: cmd.loan_type,
                },
                description,
                created_at: Utc::now(),
                recorded_by: ctx.user_id.clone(),
            };
            transactions::ActiveModel::from(&entry).insert(&db_tx).await?;

            Ok(loan)
        })?;

        self.notify(ctx).await;
        Ok(loan)
    }

    /// Applies a repayment to a loan.
    ///
    /// The loan columns are updated with a single SQL statement over the
    /// stored values (`outstanding = MAX(0, outstanding - principal)`,
    /// `total_repaid += principal + interest`, status recomputed from the
    /// new outstanding), so concurrent repayments never lose updates to a
    /// stale read. Excess principal is absorbed. The matching repayment
    /// ledger entry is written in the same DB transaction.
    pub async fn apply_repayment(&self, ctx: &GroupCtx, cmd: RepaymentCmd) -> ResultEngine<Loan> {
        if cmd.principal.is_negative() || cmd.interest.is_negative() {
            return Err(EngineError::InvalidAmount(
                "principal and interest must be >= 0".to_string(),
            ));
        }
        let total = cmd.principal + cmd.interest;
        if !total.is_positive() {
            return Err(EngineError::InvalidAmount(
                "repayment must be > 0".to_string(),
            ));
        }

        let loan = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let loan = self.require_loan(&db_tx, ctx, &cmd.loan_id).await?;

            let principal = cmd.principal.paise();
            loans::Entity::update_many()
                .col_expr(
                    loans::Column::OutstandingMinor,
                    Expr::cust_with_values("MAX(0, outstanding_minor - ?)", [principal]),
                )
                .col_expr(
                    loans::Column::TotalRepaidMinor,
                    Expr::cust_with_values("total_repaid_minor + ?", [total.paise()]),
                )
                .col_expr(
                    loans::Column::Status,
                    Expr::cust_with_values(
                        "CASE WHEN MAX(0, outstanding_minor - ?) = 0 THEN ? ELSE ? END",
                        [
                            Value::from(principal),
                            Value::from(LoanStatus::Closed.as_str()),
                            Value::from(LoanStatus::Active.as_str()),
                        ],
                    ),
                )
                .filter(loans::Column::Id.eq(cmd.loan_id.clone()))
                .exec(&db_tx)
                .await?;

            let entry = Entry {
                id: new_id(),
                group_id: ctx.group_id.clone(),
                member_id: Some(loan.member_id.clone()),
                date: cmd.date.unwrap_or_else(today),
                amount: total,
                detail: EntryDetail::LoanRepayment {
                    loan_id: Some(loan.id.clone()),
                    loan_type: Some(loan.loan_type),
                    principal: cmd.principal,
                    interest: cmd.interest,
                },
                description: normalize_optional_text(cmd.description.as_deref())
                    .unwrap_or_else(|| format!("Repayment for {}", loan.loan_type.as_str())),
                created_at: Utc::now(),
                recorded_by: ctx.user_id.clone(),
            };
            transactions::ActiveModel::from(&entry).insert(&db_tx).await?;

            self.require_loan(&db_tx, ctx, &cmd.loan_id).await
        })?;

        if loan.status == LoanStatus::Closed {
            tracing::info!(group_id = %ctx.group_id, loan_id = %loan.id, "loan closed");
        }
        self.notify(ctx).await;
        Ok(loan)
    }

    pub async fn loan(&self, ctx: &GroupCtx, loan_id: &str) -> ResultEngine<Loan> {
        self.require_group(&self.database, ctx).await?;
        self.require_loan(&self.database, ctx, loan_id).await
    }

    /// Lists the group's loans, most recently disbursed first.
    pub async fn list_loans(&self, ctx: &GroupCtx, include_closed: bool) -> ResultEngine<Vec<Loan>> {
        self.require_group(&self.database, ctx).await?;
        let mut query = loans::Entity::find()
            .filter(loans::Column::GroupId.eq(ctx.group_id.clone()))
            .order_by_desc(loans::Column::CreatedAt);
        if !include_closed {
            query = query.filter(loans::Column::Status.eq(LoanStatus::Active.as_str()));
        }
        let models = query.all(&self.database).await?;
        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(Loan::try_from(model)?);
        }
        Ok(out)
    }

    /// Sum of outstanding principal over the group's active loans.
    pub async fn outstanding_total(&self, ctx: &GroupCtx) -> ResultEngine<Money> {
        let loans = self.list_loans(ctx, false).await?;
        Ok(Money::new(loans.iter().map(|l| l.outstanding_minor).sum()))
    }

    pub(super) async fn require_loan<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
        loan_id: &str,
    ) -> ResultEngine<Loan> {
        let model = loans::Entity::find_by_id(loan_id.to_string())
            .filter(loans::Column::GroupId.eq(ctx.group_id.clone()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound("loan".to_string()))?;
        Loan::try_from(model)
    }
}
