use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, GroupCtx, Meeting, MeetingCmd, ResultEngine, meetings, members,
};

use super::{Engine, new_id, normalize_optional_text, normalize_required_name, with_tx};

impl Engine {
    /// Records meeting minutes. Every attendee must be a member of the
    /// group.
    pub async fn add_meeting(&self, ctx: &GroupCtx, cmd: MeetingCmd) -> ResultEngine<Meeting> {
        let meeting = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;

            let agenda = normalize_required_name(&cmd.agenda, "agenda")?;
            let attendees = self.checked_attendees(&db_tx, ctx, cmd.attendees).await?;

            let meeting = Meeting {
                id: new_id(),
                group_id: ctx.group_id.clone(),
                date: cmd.date,
                agenda,
                notes: normalize_optional_text(cmd.notes.as_deref()),
                attendees,
                created_at: Utc::now(),
            };
            meetings::ActiveModel::try_from(&meeting)?.insert(&db_tx).await?;
            Ok(meeting)
        })?;

        self.notify(ctx).await;
        Ok(meeting)
    }

    pub async fn meeting(&self, ctx: &GroupCtx, meeting_id: &str) -> ResultEngine<Meeting> {
        self.require_group(&self.database, ctx).await?;
        self.require_meeting(&self.database, ctx, meeting_id).await
    }

    /// Lists meetings, most recent date first.
    pub async fn list_meetings(&self, ctx: &GroupCtx) -> ResultEngine<Vec<Meeting>> {
        self.require_group(&self.database, ctx).await?;
        let models = meetings::Entity::find()
            .filter(meetings::Column::GroupId.eq(ctx.group_id.clone()))
            .order_by_desc(meetings::Column::Date)
            .order_by_desc(meetings::Column::CreatedAt)
            .all(&self.database)
            .await?;
        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(Meeting::try_from(model)?);
        }
        Ok(out)
    }

    /// Replaces a meeting's details. `created_at` is preserved.
    pub async fn update_meeting(
        &self,
        ctx: &GroupCtx,
        meeting_id: &str,
        cmd: MeetingCmd,
    ) -> ResultEngine<Meeting> {
        let meeting = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let existing = self.require_meeting(&db_tx, ctx, meeting_id).await?;

            let agenda = normalize_required_name(&cmd.agenda, "agenda")?;
            let attendees = self.checked_attendees(&db_tx, ctx, cmd.attendees).await?;

            let meeting = Meeting {
                id: existing.id,
                group_id: existing.group_id,
                date: cmd.date,
                agenda,
                notes: normalize_optional_text(cmd.notes.as_deref()),
                attendees,
                created_at: existing.created_at,
            };
            meetings::ActiveModel::try_from(&meeting)?.update(&db_tx).await?;
            Ok(meeting)
        })?;

        self.notify(ctx).await;
        Ok(meeting)
    }

    pub async fn delete_meeting(&self, ctx: &GroupCtx, meeting_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, ctx).await?;
            let meeting = self.require_meeting(&db_tx, ctx, meeting_id).await?;
            meetings::Entity::delete_by_id(meeting.id).exec(&db_tx).await?;
            Ok(())
        })?;

        self.notify(ctx).await;
        Ok(())
    }

    async fn checked_attendees<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
        attendees: Vec<String>,
    ) -> ResultEngine<Vec<String>> {
        if attendees.is_empty() {
            return Ok(attendees);
        }
        let known: HashSet<String> = members::Entity::find()
            .filter(members::Column::GroupId.eq(ctx.group_id.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(attendees.len());
        for id in attendees {
            if !known.contains(&id) {
                return Err(EngineError::Validation(format!(
                    "attendee is not a member: {id}"
                )));
            }
            if seen.insert(id.clone()) {
                out.push(id);
            }
        }
        Ok(out)
    }

    async fn require_meeting<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: &GroupCtx,
        meeting_id: &str,
    ) -> ResultEngine<Meeting> {
        let model = meetings::Entity::find_by_id(meeting_id.to_string())
            .filter(meetings::Column::GroupId.eq(ctx.group_id.clone()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound("meeting".to_string()))?;
        Meeting::try_from(model)
    }
}
