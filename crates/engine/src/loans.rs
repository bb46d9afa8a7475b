//! Loan records and the pure repayment arithmetic.
//!
//! A loan is created together with its `Loan Disbursed` ledger entry and is
//! mutated only by repayment application. `outstanding_minor` never goes
//! below zero and `status` is derived: closed iff outstanding is zero.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// The two loan books the group keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Book,
    Bank,
}

impl LoanType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "Book Loan",
            Self::Bank => "Bank Loan",
        }
    }

    /// Forgiving label mapping: anything mentioning "bank" is a bank loan,
    /// everything else falls back to the internal book.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().contains("bank") {
            Self::Bank
        } else {
            Self::Book
        }
    }

    #[must_use]
    pub fn is_bank(self) -> bool {
        matches!(self, Self::Bank)
    }
}

impl TryFrom<&str> for LoanType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Book Loan" => Ok(Self::Book),
            "Bank Loan" => Ok(Self::Bank),
            other => Err(EngineError::Validation(format!(
                "invalid loan type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Closed,
}

impl LoanStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl TryFrom<&str> for LoanStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::Validation(format!(
                "invalid loan status: {other}"
            ))),
        }
    }
}

/// Result of applying a repayment to a loan, before persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepaymentOutcome {
    pub outstanding_minor: i64,
    pub total_repaid_minor: i64,
    pub status: LoanStatus,
}

/// A loan disbursed to a member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub group_id: String,
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

impl Loan {
    /// Computes the loan state after a repayment of `principal_minor` +
    /// `interest_minor`.
    ///
    /// Excess principal is absorbed: outstanding floors at zero instead of
    /// rejecting the repayment. Closure is purely a function of the new
    /// outstanding amount.
    #[must_use]
    pub fn preview_repayment(&self, principal_minor: i64, interest_minor: i64) -> RepaymentOutcome {
        let outstanding = (self.outstanding_minor - principal_minor).max(0);
        RepaymentOutcome {
            outstanding_minor: outstanding,
            total_repaid_minor: self.total_repaid_minor + principal_minor + interest_minor,
            status: if outstanding == 0 {
                LoanStatus::Closed
            } else {
                LoanStatus::Active
            },
        }
    }

    /// An open loan can still receive repayments with a loan-side effect.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Active && self.outstanding_minor > 0
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub member_id: String,
    pub loan_type: String,
    pub principal_minor: i64,
    pub outstanding_minor: i64,
    pub total_repaid_minor: i64,
    pub interest_rate_bps: Option<i32>,
    pub term_months: Option<i32>,
    pub status: String,
    pub date: Date,
    pub description: String,
    pub created_at: DateTimeUtc,
    pub recorded_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Group,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Loan> for ActiveModel {
    fn from(value: &Loan) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            group_id: ActiveValue::Set(value.group_id.clone()),
            member_id: ActiveValue::Set(value.member_id.clone()),
            loan_type: ActiveValue::Set(value.loan_type.as_str().to_string()),
            principal_minor: ActiveValue::Set(value.principal_minor),
            outstanding_minor: ActiveValue::Set(value.outstanding_minor),
            total_repaid_minor: ActiveValue::Set(value.total_repaid_minor),
            interest_rate_bps: ActiveValue::Set(value.interest_rate_bps),
            term_months: ActiveValue::Set(value.term_months),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            date: ActiveValue::Set(value.date),
            description: ActiveValue::Set(value.description.clone()),
            created_at: ActiveValue::Set(value.created_at),
            recorded_by: ActiveValue::Set(value.recorded_by.clone()),
        }
    }
}

impl TryFrom<Model> for Loan {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            member_id: model.member_id,
            loan_type: LoanType::try_from(model.loan_type.as_str())?,
            principal_minor: model.principal_minor,
            outstanding_minor: model.outstanding_minor,
            total_repaid_minor: model.total_repaid_minor,
            interest_rate_bps: model.interest_rate_bps,
            term_months: model.term_months,
            status: LoanStatus::try_from(model.status.as_str())?,
            date: model.date,
            description: model.description,
            created_at: model.created_at,
            recorded_by: model.recorded_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(outstanding: i64, repaid: i64) -> Loan {
        Loan {
            id: "l1".to_string(),
            group_id: "g1".to_string(),
            member_id: "m1".to_string(),
            loan_type: LoanType::Book,
            principal_minor: 10_000_00,
            outstanding_minor: outstanding,
            total_repaid_minor: repaid,
            interest_rate_bps: None,
            term_months: None,
            status: LoanStatus::Active,
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            description: String::new(),
            created_at: Utc::now(),
            recorded_by: "tester".to_string(),
        }
    }

    #[test]
    fn partial_repayment_stays_active() {
        let outcome = loan(10_000_00, 0).preview_repayment(4_000_00, 500_00);
        assert_eq!(outcome.outstanding_minor, 6_000_00);
        assert_eq!(outcome.total_repaid_minor, 4_500_00);
        assert_eq!(outcome.status, LoanStatus::Active);
    }

    #[test]
    fn full_repayment_closes() {
        let outcome = loan(6_000_00, 4_500_00).preview_repayment(6_000_00, 300_00);
        assert_eq!(outcome.outstanding_minor, 0);
        assert_eq!(outcome.total_repaid_minor, 10_800_00);
        assert_eq!(outcome.status, LoanStatus::Closed);
    }

    #[test]
    fn excess_principal_floors_at_zero() {
        let outcome = loan(1_000_00, 0).preview_repayment(5_000_00, 0);
        assert_eq!(outcome.outstanding_minor, 0);
        assert_eq!(outcome.status, LoanStatus::Closed);
    }

    #[test]
    fn labels_map_leniently() {
        assert_eq!(LoanType::from_label("Bank Loan"), LoanType::Bank);
        assert_eq!(LoanType::from_label("SBI bank overdraft"), LoanType::Bank);
        assert_eq!(LoanType::from_label("Book Loan"), LoanType::Book);
        assert_eq!(LoanType::from_label(""), LoanType::Book);
    }
}
