//! Ledger entry primitives.
//!
//! An [`Entry`] is one immutable row in a group's ledger. Its
//! [`EntryDetail`] is a tagged union over the transaction kinds, so code
//! deriving balances or reports matches exhaustively instead of probing
//! optional columns.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, LoanType, Money, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Saving,
    GeneralSaving,
    Fine,
    Expense,
    LoanDisbursed,
    LoanRepayment,
    BankLoanRepayment,
}

impl TransactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saving => "Saving",
            Self::GeneralSaving => "General Saving",
            Self::Fine => "Fine",
            Self::Expense => "Expense",
            Self::LoanDisbursed => "Loan Disbursed",
            Self::LoanRepayment => "Loan Repayment",
            Self::BankLoanRepayment => "Bank Loan Repayment",
        }
    }

    /// Case-insensitive label mapping for spreadsheet and user input.
    pub fn from_label(label: &str) -> ResultEngine<Self> {
        match label.trim().to_lowercase().as_str() {
            "saving" => Ok(Self::Saving),
            "general saving" => Ok(Self::GeneralSaving),
            "fine" => Ok(Self::Fine),
            "expense" => Ok(Self::Expense),
            "loan disbursed" => Ok(Self::LoanDisbursed),
            "loan repayment" => Ok(Self::LoanRepayment),
            "bank loan repayment" => Ok(Self::BankLoanRepayment),
            other => Err(EngineError::Validation(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }

    #[must_use]
    pub fn is_repayment(self) -> bool {
        matches!(self, Self::LoanRepayment | Self::BankLoanRepayment)
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Saving" => Ok(Self::Saving),
            "General Saving" => Ok(Self::GeneralSaving),
            "Fine" => Ok(Self::Fine),
            "Expense" => Ok(Self::Expense),
            "Loan Disbursed" => Ok(Self::LoanDisbursed),
            "Loan Repayment" => Ok(Self::LoanRepayment),
            "Bank Loan Repayment" => Ok(Self::BankLoanRepayment),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Kind-specific payload of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryDetail {
    Saving {
        saving_type: Option<String>,
    },
    GeneralSaving {
        source: Option<String>,
    },
    Fine,
    Expense {
        category: Option<String>,
    },
    LoanDisbursed {
        loan_id: String,
        loan_type: LoanType,
    },
    /// A repayment against the savings-bank side of the books.
    ///
    /// `loan_id` is `None` only for imported rows where no open loan could
    /// be matched; such entries still move the cash balances but have no
    /// loan-side effect.
    LoanRepayment {
        loan_id: Option<String>,
        loan_type: Option<LoanType>,
        principal: Money,
        interest: Money,
    },
    /// Same shape as [`LoanRepayment`] but credited to the bank overdraft
    /// account.
    ///
    /// [`LoanRepayment`]: EntryDetail::LoanRepayment
    BankLoanRepayment {
        loan_id: Option<String>,
        loan_type: Option<LoanType>,
        principal: Money,
        interest: Money,
    },
}

impl EntryDetail {
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Saving { .. } => TransactionKind::Saving,
            Self::GeneralSaving { .. } => TransactionKind::GeneralSaving,
            Self::Fine => TransactionKind::Fine,
            Self::Expense { .. } => TransactionKind::Expense,
            Self::LoanDisbursed { .. } => TransactionKind::LoanDisbursed,
            Self::LoanRepayment { .. } => TransactionKind::LoanRepayment,
            Self::BankLoanRepayment { .. } => TransactionKind::BankLoanRepayment,
        }
    }

    /// Whether a repayment entry credits the bank overdraft account rather
    /// than the savings-bank account.
    ///
    /// Explicit `Bank Loan Repayment` entries always do; a plain repayment
    /// does when the loan it repays is a bank loan.
    #[must_use]
    pub fn credits_overdraft(&self) -> bool {
        match self {
            Self::BankLoanRepayment { .. } => true,
            Self::LoanRepayment { loan_type, .. } => {
                loan_type.is_some_and(LoanType::is_bank)
            }
            _ => false,
        }
    }
}

/// One immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub group_id: String,
    pub member_id: Option<String>,
    pub date: NaiveDate,
    pub amount: Money,
    pub detail: EntryDetail,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub recorded_by: String,
}

/// Unvalidated entry input, as it arrives from a caller or a spreadsheet
/// row.
///
/// [`normalize`] turns a draft into a well-formed [`Entry`], applying the
/// boundary rules once so every write path shares them:
///
/// - `date` defaults to today
/// - repayment amounts default to `principal + interest`
/// - amounts must come out strictly positive
/// - a repayment must name a loan unless `allow_unlinked` is set (bulk
///   import keeps unmatched repayments as cash-only entries)
///
/// [`normalize`]: EntryDraft::normalize
#[derive(Clone, Debug, Default)]
pub struct EntryDraft {
    pub kind: Option<TransactionKind>,
    pub member_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
    pub saving_type: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub loan_id: Option<String>,
    pub loan_type: Option<LoanType>,
    pub principal: Option<Money>,
    pub interest: Option<Money>,
    pub description: Option<String>,
    pub allow_unlinked: bool,
}

impl EntryDraft {
    pub fn normalize(
        self,
        id: String,
        group_id: &str,
        recorded_by: &str,
        today: NaiveDate,
    ) -> ResultEngine<Entry> {
        let kind = self
            .kind
            .ok_or_else(|| EngineError::Validation("transaction type is required".to_string()))?;

        let principal = self.principal.unwrap_or(Money::ZERO);
        let interest = self.interest.unwrap_or(Money::ZERO);

        let amount = match self.amount {
            Some(amount) => amount,
            None if kind.is_repayment() => principal + interest,
            None => Money::ZERO,
        };
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "{} amount must be > 0",
                kind.as_str()
            )));
        }
        if principal.is_negative() || interest.is_negative() {
            return Err(EngineError::InvalidAmount(
                "principal and interest must be >= 0".to_string(),
            ));
        }

        let detail = match kind {
            TransactionKind::Saving => EntryDetail::Saving {
                saving_type: self.saving_type,
            },
            TransactionKind::GeneralSaving => EntryDetail::GeneralSaving {
                source: self.source,
            },
            TransactionKind::Fine => EntryDetail::Fine,
            TransactionKind::Expense => EntryDetail::Expense {
                category: self.category,
            },
            TransactionKind::LoanDisbursed => {
                let loan_id = self.loan_id.ok_or_else(|| {
                    EngineError::Validation(
                        "a disbursal entry must reference its loan".to_string(),
                    )
                })?;
                let loan_type = self.loan_type.ok_or_else(|| {
                    EngineError::Validation(
                        "a disbursal entry must carry a loan type".to_string(),
                    )
                })?;
                EntryDetail::LoanDisbursed { loan_id, loan_type }
            }
            TransactionKind::LoanRepayment | TransactionKind::BankLoanRepayment => {
                if self.loan_id.is_none() && !self.allow_unlinked {
                    return Err(EngineError::Validation(
                        "a repayment must reference a loan".to_string(),
                    ));
                }
                if kind == TransactionKind::BankLoanRepayment {
                    EntryDetail::BankLoanRepayment {
                        loan_id: self.loan_id,
                        loan_type: self.loan_type,
                        principal,
                        interest,
                    }
                } else {
                    EntryDetail::LoanRepayment {
                        loan_id: self.loan_id,
                        loan_type: self.loan_type,
                        principal,
                        interest,
                    }
                }
            }
        };

        if kind == TransactionKind::Saving && self.member_id.is_none() {
            return Err(EngineError::Validation(
                "a saving entry must name a member".to_string(),
            ));
        }

        Ok(Entry {
            id,
            group_id: group_id.to_string(),
            member_id: self.member_id,
            date: self.date.unwrap_or(today),
            amount,
            detail,
            description: self.description.unwrap_or_default(),
            created_at: Utc::now(),
            recorded_by: recorded_by.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub member_id: Option<String>,
    pub kind: String,
    pub date: Date,
    pub amount_minor: i64,
    pub saving_type: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub loan_id: Option<String>,
    pub loan_type: Option<String>,
    pub principal_minor: Option<i64>,
    pub interest_minor: Option<i64>,
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

impl From<&Entry> for ActiveModel {
    fn from(entry: &Entry) -> Self {
        let (saving_type, source, category, loan_id, loan_type, principal, interest) =
            match &entry.detail {
                EntryDetail::Saving { saving_type } => {
                    (saving_type.clone(), None, None, None, None, None, None)
                }
                EntryDetail::GeneralSaving { source } => {
                    (None, source.clone(), None, None, None, None, None)
                }
                EntryDetail::Fine => (None, None, None, None, None, None, None),
                EntryDetail::Expense { category } => {
                    (None, None, category.clone(), None, None, None, None)
                }
                EntryDetail::LoanDisbursed { loan_id, loan_type } => (
                    None,
                    None,
                    None,
                    Some(loan_id.clone()),
                    Some(loan_type.as_str().to_string()),
                    None,
                    None,
                ),
                EntryDetail::LoanRepayment {
                    loan_id,
                    loan_type,
                    principal,
                    interest,
                }
                | EntryDetail::BankLoanRepayment {
                    loan_id,
                    loan_type,
                    principal,
                    interest,
                } => (
                    None,
                    None,
                    None,
                    loan_id.clone(),
                    loan_type.map(|t| t.as_str().to_string()),
                    Some(principal.paise()),
                    Some(interest.paise()),
                ),
            };

        Self {
            id: ActiveValue::Set(entry.id.clone()),
            group_id: ActiveValue::Set(entry.group_id.clone()),
            member_id: ActiveValue::Set(entry.member_id.clone()),
            kind: ActiveValue::Set(entry.detail.kind().as_str().to_string()),
            date: ActiveValue::Set(entry.date),
            amount_minor: ActiveValue::Set(entry.amount.paise()),
            saving_type: ActiveValue::Set(saving_type),
            source: ActiveValue::Set(source),
            category: ActiveValue::Set(category),
            loan_id: ActiveValue::Set(loan_id),
            loan_type: ActiveValue::Set(loan_type),
            principal_minor: ActiveValue::Set(principal),
            interest_minor: ActiveValue::Set(interest),
            description: ActiveValue::Set(entry.description.clone()),
            created_at: ActiveValue::Set(entry.created_at),
            recorded_by: ActiveValue::Set(entry.recorded_by.clone()),
        }
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let kind = TransactionKind::try_from(model.kind.as_str())?;
        let loan_type = model
            .loan_type
            .as_deref()
            .map(LoanType::try_from)
            .transpose()?;
        let principal = Money::new(model.principal_minor.unwrap_or(0));
        let interest = Money::new(model.interest_minor.unwrap_or(0));

        let detail = match kind {
            TransactionKind::Saving => EntryDetail::Saving {
                saving_type: model.saving_type,
            },
            TransactionKind::GeneralSaving => EntryDetail::GeneralSaving {
                source: model.source,
            },
            TransactionKind::Fine => EntryDetail::Fine,
            TransactionKind::Expense => EntryDetail::Expense {
                category: model.category,
            },
            TransactionKind::LoanDisbursed => EntryDetail::LoanDisbursed {
                loan_id: model.loan_id.ok_or_else(|| {
                    EngineError::Validation(format!(
                        "disbursal entry {} has no loan reference",
                        model.id
                    ))
                })?,
                loan_type: loan_type.ok_or_else(|| {
                    EngineError::Validation(format!(
                        "disbursal entry {} has no loan type",
                        model.id
                    ))
                })?,
            },
            TransactionKind::LoanRepayment => EntryDetail::LoanRepayment {
                loan_id: model.loan_id,
                loan_type,
                principal,
                interest,
            },
            TransactionKind::BankLoanRepayment => EntryDetail::BankLoanRepayment {
                loan_id: model.loan_id,
                loan_type,
                principal,
                interest,
            },
        };

        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            member_id: model.member_id,
            date: model.date,
            amount: Money::new(model.amount_minor),
            detail,
            description: model.description,
            created_at: model.created_at,
            recorded_by: model.recorded_by,
        })
    }
}
