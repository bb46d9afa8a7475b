use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, GroupCtx, Member, MemberCmd, MemberPatch, ResultEngine, members,
    members::{normalize_mobile, normalize_name},
};

use super::{Engine, new_id, normalize_optional_text, today, with_tx};

const DEFAULT_DESIGNATION: &str = "member";

impl Engine {
    pub async fn add_member(&self, ctx: &GroupCtx, cmd: MemberCmd) -> ResultEngine<Member> {
        let name = super::normalize_required_name(&cmd.name, "member")?;
        let mobile = normalize_mobile(&cmd.mobile)?;

        let member = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;

            let member = Member {
                id: new_id(),
                group_id: ctx.group_id.clone(),
                name_norm: normalize_name(&name),
                name,
                mobile,
                email: normalize_optional_text(cmd.email.as_deref()),
                address: normalize_optional_text(cmd.address.as_deref()),
                designation: normalize_optional_text(cmd.designation.as_deref())
                    .unwrap_or_else(|| DEFAULT_DESIGNATION.to_string()),
                joining_date: cmd.joining_date.unwrap_or_else(today),
                created_at: Utc::now(),
            };
            members::ActiveModel::from(&member).insert(&db_tx).await?;
            Ok(member)
        })?;

        self.notify(ctx).await;
        Ok(member)
    }

    pub async fn member(&self, ctx: &GroupCtx, member_id: &str) -> ResultEngine<Member> {
        self.require_group(&self.database, ctx).await?;
        self.require_member(&self.database, ctx, member_id).await
    }

    pub async fn list_members(&self, ctx: &GroupCtx) -> ResultEngine<Vec<Member>> {
        self.require_group(&self.database, ctx).await?;
        let models = members::Entity::find()
            .filter(members::Column::GroupId.eq(ctx.group_id.clone()))
            .order_by_asc(members::Column::Name)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Member::from).collect())
    }

    pub async fn update_member(
        &self,
        ctx: &GroupCtx,
        member_id: &str,
        patch: MemberPatch,
    ) -> ResultEngine<Member> {
        let member = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let mut member = self.require_member(&db_tx, ctx, member_id).await?;

            if let Some(name) = patch.name {
                member.name = super::normalize_required_name(&name, "member")?;
                member.name_norm = normalize_name(&member.name);
            }
            if let Some(mobile) = patch.mobile {
                member.mobile = normalize_mobile(&mobile)?;
            }
            if let Some(email) = patch.email {
                member.email = normalize_optional_text(Some(&email));
            }
            if let Some(address) = patch.address {
                member.address = normalize_optional_text(Some(&address));
            }
            if let Some(designation) = patch.designation {
                member.designation = normalize_optional_text(Some(&designation))
                    .unwrap_or_else(|| DEFAULT_DESIGNATION.to_string());
            }
            if let Some(joining_date) = patch.joining_date {
                member.joining_date = joining_date;
            }

            members::ActiveModel::from(&member).update(&db_tx).await?;
            Ok(member)
        })?;

        self.notify(ctx).await;
        Ok(member)
    }

    /// Hard-deletes a member together with their ledger entries and loans.
    pub async fn delete_member(&self, ctx: &GroupCtx, member_id: &str) -> ResultEngine<()> {
        let (transactions, loans) = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            self.require_member(&db_tx, ctx, member_id).await?;

            let transactions = crate::transactions::Entity::delete_many()
                .filter(crate::transactions::Column::GroupId.eq(ctx.group_id.clone()))
                .filter(crate::transactions::Column::MemberId.eq(member_id.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let loans = crate::loans::Entity::delete_many()
                .filter(crate::loans::Column::GroupId.eq(ctx.group_id.clone()))
                .filter(crate::loans::Column::MemberId.eq(member_id.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            members::Entity::delete_by_id(member_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok((transactions, loans))
        })?;

        tracing::info!(
            group_id = %ctx.group_id,
            member_id,
            transactions,
            loans,
            "member deleted"
        );
        self.notify(ctx).await;
        Ok(())
    }

    pub(super) async fn require_member<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
        member_id: &str,
    ) -> ResultEngine<Member> {
        let model = members::Entity::find_by_id(member_id.to_string())
            .filter(members::Column::GroupId.eq(ctx.group_id.clone()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound("member".to_string()))?;
        Ok(Member::from(model))
    }
}
