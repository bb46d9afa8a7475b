use std::collections::BTreeMap;

use sea_orm::{QueryFilter, prelude::*};
use serde::Serialize;

use crate::{
    EntryDetail, GroupCtx, Loan, LoanType, Member, Money, ResultEngine, members,
};

use super::Engine;

const UNKNOWN_MEMBER: &str = "Unknown";

/// Aggregate ledger totals, optionally restricted to one member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GroupTotals {
    pub savings: Money,
    pub general_savings: Money,
    pub fines: Money,
    pub expenses: Money,
    pub loans_disbursed: Money,
    pub loans_repaid: Money,
}

/// A per-member aggregate, keyed by resolved member name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberTotal {
    pub member_id: Option<String>,
    pub name: String,
    pub total: Money,
}

/// Restricts [`Engine::loan_book`] to one loan category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoanBookFilter {
    #[default]
    All,
    Book,
    Bank,
}

impl LoanBookFilter {
    fn matches(self, loan_type: LoanType) -> bool {
        match self {
            Self::All => true,
            Self::Book => loan_type == LoanType::Book,
            Self::Bank => loan_type == LoanType::Bank,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoanCategoryTotals {
    pub count: u64,
    pub outstanding: Money,
    pub total_repaid: Money,
}

impl LoanCategoryTotals {
    fn add(&mut self, loan: &Loan) {
        self.count += 1;
        self.outstanding += Money::new(loan.outstanding_minor);
        self.total_repaid += Money::new(loan.total_repaid_minor);
    }
}

/// The loan book with per-category totals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoanBookReport {
    pub loans: Vec<Loan>,
    pub book: LoanCategoryTotals,
    pub bank: LoanCategoryTotals,
}

impl Engine {
    /// Ledger totals per kind, optionally for a single member.
    pub async fn group_totals(
        &self,
        ctx: &GroupCtx,
        member_id: Option<&str>,
    ) -> ResultEngine<GroupTotals> {
        self.require_group(&self.database, ctx).await?;
        if let Some(member_id) = member_id {
            self.require_member(&self.database, ctx, member_id).await?;
        }

        let entries = self.load_entries(&self.database, ctx).await?;
        let mut totals = GroupTotals::default();
        for entry in &entries {
            if member_id.is_some() && entry.member_id.as_deref() != member_id {
                continue;
            }
            match &entry.detail {
                EntryDetail::Saving { .. } => totals.savings += entry.amount,
                EntryDetail::GeneralSaving { .. } => totals.general_savings += entry.amount,
                EntryDetail::Fine => totals.fines += entry.amount,
                EntryDetail::Expense { .. } => totals.expenses += entry.amount,
                EntryDetail::LoanDisbursed { .. } => totals.loans_disbursed += entry.amount,
                EntryDetail::LoanRepayment {
                    principal, interest, ..
                }
                | EntryDetail::BankLoanRepayment {
                    principal, interest, ..
                } => totals.loans_repaid += *principal + *interest,
            }
        }
        Ok(totals)
    }

    /// Savings totals grouped by member, alphabetical by resolved name.
    pub async fn savings_by_member(&self, ctx: &GroupCtx) -> ResultEngine<Vec<MemberTotal>> {
        self.member_totals(ctx, |detail| {
            matches!(detail, EntryDetail::Saving { .. }).then_some(None)
        })
        .await
    }

    /// Repayment totals (principal + interest) grouped by member.
    pub async fn repayments_by_member(&self, ctx: &GroupCtx) -> ResultEngine<Vec<MemberTotal>> {
        self.member_totals(ctx, |detail| match detail {
            EntryDetail::LoanRepayment {
                principal, interest, ..
            }
            | EntryDetail::BankLoanRepayment {
                principal, interest, ..
            } => Some(Some(*principal + *interest)),
            _ => None,
        })
        .await
    }

    /// Shared per-member fold. `select` returns `None` to skip an entry,
    /// `Some(None)` to count its amount, `Some(Some(m))` to count `m`.
    async fn member_totals(
        &self,
        ctx: &GroupCtx,
        select: impl Fn(&EntryDetail) -> Option<Option<Money>>,
    ) -> ResultEngine<Vec<MemberTotal>> {
        self.require_group(&self.database, ctx).await?;

        let member_models = members::Entity::find()
            .filter(members::Column::GroupId.eq(ctx.group_id.clone()))
            .all(&self.database)
            .await?;
        let names: BTreeMap<String, String> = member_models
            .into_iter()
            .map(Member::from)
            .map(|m| (m.id, m.name))
            .collect();

        let entries = self.load_entries(&self.database, ctx).await?;
        let mut totals: BTreeMap<String, (Option<String>, Money)> = BTreeMap::new();
        for entry in &entries {
            let Some(amount) = select(&entry.detail) else {
                continue;
            };
            let amount = amount.unwrap_or(entry.amount);
            let (name, id) = match entry.member_id.as_ref() {
                Some(id) => match names.get(id) {
                    Some(name) => (name.clone(), Some(id.clone())),
                    None => (UNKNOWN_MEMBER.to_string(), Some(id.clone())),
                },
                None => (UNKNOWN_MEMBER.to_string(), None),
            };
            let slot = totals.entry(name).or_insert((id, Money::ZERO));
            slot.1 += amount;
        }

        Ok(totals
            .into_iter()
            .map(|(name, (member_id, total))| MemberTotal {
                member_id,
                name,
                total,
            })
            .collect())
    }

    /// The loan book with per-category counts and totals.
    ///
    /// `include_closed` is a display filter only; totals always reflect
    /// the loans actually listed.
    pub async fn loan_book(
        &self,
        ctx: &GroupCtx,
        filter: LoanBookFilter,
        include_closed: bool,
    ) -> ResultEngine<LoanBookReport> {
        let loans = self.list_loans(ctx, include_closed).await?;

        let mut report = LoanBookReport::default();
        for loan in loans {
            if !filter.matches(loan.loan_type) {
                continue;
            }
            match loan.loan_type {
                LoanType::Book => report.book.add(&loan),
                LoanType::Bank => report.bank.add(&loan),
            }
            report.loans.push(loan);
        }
        Ok(report)
    }
}
