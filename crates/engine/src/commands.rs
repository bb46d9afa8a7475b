//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use chrono::NaiveDate;

use crate::{LoanType, Money};

/// Record a member's saving deposit.
#[derive(Clone, Debug)]
pub struct SavingCmd {
    pub member_id: String,
    pub amount: Money,
    /// Free-form label ("Monthly Saving", "Fine", ...). A value of `Fine`
    /// records the entry as a fine rather than a saving.
    pub saving_type: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl SavingCmd {
    #[must_use]
    pub fn new(member_id: impl Into<String>, amount: Money) -> Self {
        Self {
            member_id: member_id.into(),
            amount,
            saving_type: None,
            date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn saving_type(mut self, saving_type: impl Into<String>) -> Self {
        self.saving_type = Some(saving_type.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Record a group-level income that is nobody's personal saving
/// (donations, grants, interest credited by the bank).
#[derive(Clone, Debug)]
pub struct GeneralSavingCmd {
    pub amount: Money,
    pub member_id: Option<String>,
    pub source: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl GeneralSavingCmd {
    #[must_use]
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            member_id: None,
            source: None,
            date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn member_id(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Record a group expense.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub amount: Money,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            category: None,
            date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Disburse a new loan to a member.
#[derive(Clone, Debug)]
pub struct DisburseCmd {
    pub member_id: String,
    pub loan_type: LoanType,
    pub principal: Money,
    pub interest_rate_bps: Option<i32>,
    pub term_months: Option<i32>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl DisburseCmd {
    #[must_use]
    pub fn new(member_id: impl Into<String>, loan_type: LoanType, principal: Money) -> Self {
        Self {
            member_id: member_id.into(),
            loan_type,
            principal,
            interest_rate_bps: None,
            term_months: None,
            date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn interest_rate_bps(mut self, bps: i32) -> Self {
        self.interest_rate_bps = Some(bps);
        self
    }

    #[must_use]
    pub fn term_months(mut self, months: i32) -> Self {
        self.term_months = Some(months);
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Apply a repayment against an existing loan.
#[derive(Clone, Debug)]
pub struct RepaymentCmd {
    pub loan_id: String,
    pub principal: Money,
    pub interest: Money,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl RepaymentCmd {
    #[must_use]
    pub fn new(loan_id: impl Into<String>, principal: Money, interest: Money) -> Self {
        Self {
            loan_id: loan_id.into(),
            principal,
            interest,
            date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Add a member to a group.
#[derive(Clone, Debug)]
pub struct MemberCmd {
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub designation: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

impl MemberCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, mobile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mobile: mobile.into(),
            email: None,
            address: None,
            designation: None,
            joining_date: None,
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn designation(mut self, designation: impl Into<String>) -> Self {
        self.designation = Some(designation.into());
        self
    }

    #[must_use]
    pub fn joining_date(mut self, date: NaiveDate) -> Self {
        self.joining_date = Some(date);
        self
    }
}

/// Partial update for an existing member; `None` fields are left as-is.
#[derive(Clone, Debug, Default)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub designation: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

/// Record meeting minutes.
#[derive(Clone, Debug)]
pub struct MeetingCmd {
    pub date: NaiveDate,
    pub agenda: String,
    pub notes: Option<String>,
    /// Member ids of the attendees.
    pub attendees: Vec<String>,
}

impl MeetingCmd {
    #[must_use]
    pub fn new(date: NaiveDate, agenda: impl Into<String>) -> Self {
        Self {
            date,
            agenda: agenda.into(),
            notes: None,
            attendees: Vec::new(),
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }
}
