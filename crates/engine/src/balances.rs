//! Derivation of the group's cash position from its ledger.
//!
//! Balances are never stored. They are a pure fold over the entries, so
//! the result is independent of entry order and there is no stored total
//! to drift out of sync.

use serde::{Deserialize, Serialize};

use crate::{Entry, EntryDetail, Money};

/// The group's derived cash position.
///
/// `savings` is the savings-bank (SB) account, `overdraft` the bank
/// overdraft (OD) account repayments of bank loans are credited to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub savings: Money,
    pub overdraft: Money,
    /// Sum of `outstanding_minor` over active loans.
    pub outstanding_loans: Money,
}

impl BalanceSheet {
    #[must_use]
    pub fn combined(&self) -> Money {
        self.savings + self.overdraft
    }

    /// Folds ledger entries into the SB/OD position.
    ///
    /// Savings, general savings and fines credit SB; expenses and loan
    /// disbursals debit it. A repayment credits principal plus interest to
    /// OD when it repays a bank loan and to SB otherwise.
    /// `outstanding_loans` is left at zero; it comes from the loan book,
    /// not the ledger.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut sheet = Self::default();
        for entry in entries {
            match &entry.detail {
                EntryDetail::Saving { .. } | EntryDetail::GeneralSaving { .. } | EntryDetail::Fine => {
                    sheet.savings += entry.amount;
                }
                EntryDetail::Expense { .. } | EntryDetail::LoanDisbursed { .. } => {
                    sheet.savings -= entry.amount;
                }
                EntryDetail::LoanRepayment {
                    principal, interest, ..
                }
                | EntryDetail::BankLoanRepayment {
                    principal, interest, ..
                } => {
                    let credit = *principal + *interest;
                    if entry.detail.credits_overdraft() {
                        sheet.overdraft += credit;
                    } else {
                        sheet.savings += credit;
                    }
                }
            }
        }
        sheet
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::{LoanType, TransactionKind};

    fn entry(detail: EntryDetail, amount: i64) -> Entry {
        Entry {
            id: Uuid::new_v4().to_string(),
            group_id: "g1".to_string(),
            member_id: Some("m1".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            amount: Money::new(amount),
            detail,
            description: String::new(),
            created_at: Utc::now(),
            recorded_by: "tester".to_string(),
        }
    }

    fn repayment(kind: TransactionKind, loan_type: LoanType, p: i64, i: i64) -> Entry {
        let detail = if kind == TransactionKind::BankLoanRepayment {
            EntryDetail::BankLoanRepayment {
                loan_id: Some("l1".to_string()),
                loan_type: Some(loan_type),
                principal: Money::new(p),
                interest: Money::new(i),
            }
        } else {
            EntryDetail::LoanRepayment {
                loan_id: Some("l1".to_string()),
                loan_type: Some(loan_type),
                principal: Money::new(p),
                interest: Money::new(i),
            }
        };
        entry(detail, p + i)
    }

    #[test]
    fn sb_and_od_split() {
        let entries = vec![
            entry(EntryDetail::Saving { saving_type: None }, 500_00),
            entry(EntryDetail::Fine, 100_00),
            entry(EntryDetail::GeneralSaving { source: None }, 200_00),
            entry(
                EntryDetail::Expense {
                    category: Some("stationery".to_string()),
                },
                200_00,
            ),
            repayment(TransactionKind::BankLoanRepayment, LoanType::Bank, 1_000_00, 100_00),
        ];
        let sheet = BalanceSheet::from_entries(&entries);
        assert_eq!(sheet.savings, Money::new(600_00));
        assert_eq!(sheet.overdraft, Money::new(1_100_00));
        assert_eq!(sheet.combined(), Money::new(1_700_00));
    }

    #[test]
    fn book_repayment_credits_sb() {
        let entries = vec![repayment(
            TransactionKind::LoanRepayment,
            LoanType::Book,
            4_000_00,
            500_00,
        )];
        let sheet = BalanceSheet::from_entries(&entries);
        assert_eq!(sheet.savings, Money::new(4_500_00));
        assert_eq!(sheet.overdraft, Money::ZERO);
    }

    #[test]
    fn bank_loan_repayment_via_plain_kind_credits_od() {
        let entries = vec![repayment(
            TransactionKind::LoanRepayment,
            LoanType::Bank,
            1_000_00,
            0,
        )];
        let sheet = BalanceSheet::from_entries(&entries);
        assert_eq!(sheet.savings, Money::ZERO);
        assert_eq!(sheet.overdraft, Money::new(1_000_00));
    }

    #[test]
    fn fold_is_order_independent() {
        let mut entries = vec![
            entry(EntryDetail::Saving { saving_type: None }, 500_00),
            entry(
                EntryDetail::Expense {
                    category: None,
                },
                200_00,
            ),
            repayment(TransactionKind::LoanRepayment, LoanType::Book, 300_00, 30_00),
        ];
        let forward = BalanceSheet::from_entries(&entries);
        entries.reverse();
        let backward = BalanceSheet::from_entries(&entries);
        assert_eq!(forward, backward);
    }
}
