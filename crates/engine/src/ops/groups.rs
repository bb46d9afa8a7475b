use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;

use crate::{EngineError, Group, GroupCtx, ResultEngine, groups};

use super::{Engine, normalize_required_name, with_tx};

/// Per-collection delete counts reported by [`Engine::delete_group`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeleteGroupReport {
    pub members: u64,
    pub transactions: u64,
    pub loans: u64,
    pub meetings: u64,
}

impl Engine {
    /// Creates a group owned by `user_id`.
    ///
    /// Group names are unique per owner.
    pub async fn create_group(&self, user_id: &str, name: &str) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group")?;
        let existing = groups::Entity::find()
            .filter(groups::Column::UserId.eq(user_id.to_string()))
            .filter(groups::Column::Name.eq(name.clone()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(name));
        }

        let group = Group::new(name, user_id);
        groups::ActiveModel::from(&group).insert(&self.database).await?;
        Ok(group)
    }

    /// Returns the owner's group of that name, creating it if absent.
    pub async fn ensure_group(&self, user_id: &str, name: &str) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group")?;
        let existing = groups::Entity::find()
            .filter(groups::Column::UserId.eq(user_id.to_string()))
            .filter(groups::Column::Name.eq(name.clone()))
            .one(&self.database)
            .await?;
        if let Some(model) = existing {
            return Ok(Group::from(model));
        }
        self.create_group(user_id, &name).await
    }

    pub async fn group(&self, ctx: &GroupCtx) -> ResultEngine<Group> {
        self.require_group(&self.database, ctx).await
    }

    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        let models = groups::Entity::find()
            .filter(groups::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(groups::Column::Name)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Group::from).collect())
    }

    pub async fn rename_group(&self, ctx: &GroupCtx, new_name: &str) -> ResultEngine<Group> {
        let new_name = normalize_required_name(new_name, "group")?;
        with_tx!(self, |db_tx| {
            let mut group = self.require_group(&db_tx, ctx).await?;
            let taken = groups::Entity::find()
                .filter(groups::Column::UserId.eq(ctx.user_id.clone()))
                .filter(groups::Column::Name.eq(new_name.clone()))
                .filter(groups::Column::Id.ne(ctx.group_id.clone()))
                .one(&db_tx)
                .await?;
            if taken.is_some() {
                return Err(EngineError::ExistingKey(new_name));
            }

            group.name = new_name;
            groups::ActiveModel::from(&group).update(&db_tx).await?;
            Ok(group)
        })
    }

    /// Deletes the group and everything it owns.
    ///
    /// Children go first so a failure part-way leaves the group row (and a
    /// rerunnable delete) rather than orphaned rows.
    pub async fn delete_group(&self, ctx: &GroupCtx) -> ResultEngine<DeleteGroupReport> {
        let report = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;

            let transactions = crate::transactions::Entity::delete_many()
                .filter(crate::transactions::Column::GroupId.eq(ctx.group_id.clone()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let loans = crate::loans::Entity::delete_many()
                .filter(crate::loans::Column::GroupId.eq(ctx.group_id.clone()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let meetings = crate::meetings::Entity::delete_many()
                .filter(crate::meetings::Column::GroupId.eq(ctx.group_id.clone()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let members = crate::members::Entity::delete_many()
                .filter(crate::members::Column::GroupId.eq(ctx.group_id.clone()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            groups::Entity::delete_by_id(ctx.group_id.clone())
                .exec(&db_tx)
                .await?;

            Ok(DeleteGroupReport {
                members,
                transactions,
                loans,
                meetings,
            })
        })?;

        tracing::info!(
            group_id = %ctx.group_id,
            members = report.members,
            transactions = report.transactions,
            loans = report.loans,
            meetings = report.meetings,
            "group deleted"
        );
        Ok(report)
    }
}
