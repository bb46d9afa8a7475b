use sea_orm::{QueryFilter, prelude::*};

use crate::{BalanceSheet, GroupCtx, LoanStatus, Money, ResultEngine, loans};

use super::Engine;

impl Engine {
    /// Derives the group's cash position by folding the full ledger.
    ///
    /// Nothing is read from stored totals; rerunning this is idempotent
    /// and independent of entry order.
    pub async fn balance_sheet(&self, ctx: &GroupCtx) -> ResultEngine<BalanceSheet> {
        self.require_group(&self.database, ctx).await?;

        let entries = self.load_entries(&self.database, ctx).await?;
        let mut sheet = BalanceSheet::from_entries(&entries);

        let outstanding: i64 = loans::Entity::find()
            .filter(loans::Column::GroupId.eq(ctx.group_id.clone()))
            .filter(loans::Column::Status.eq(LoanStatus::Active.as_str()))
            .all(&self.database)
            .await?
            .iter()
            .map(|l| l.outstanding_minor)
            .sum();
        sheet.outstanding_loans = Money::new(outstanding);

        Ok(sheet)
    }
}
