//! Meeting minutes: date, agenda and the list of attending members.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub group_id: String,
    pub date: NaiveDate,
    pub agenda: String,
    pub notes: Option<String>,
    /// Member ids of the attendees.
    pub attendees: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "meetings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub date: Date,
    pub agenda: String,
    pub notes: Option<String>,
    /// JSON array of member ids.
    pub attendees: String,
    pub created_at: DateTimeUtc,
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

impl TryFrom<&Meeting> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Meeting) -> ResultEngine<Self> {
        let attendees = serde_json::to_string(&value.attendees)
            .map_err(|err| EngineError::Validation(format!("invalid attendees: {err}")))?;
        Ok(Self {
            id: ActiveValue::Set(value.id.clone()),
            group_id: ActiveValue::Set(value.group_id.clone()),
            date: ActiveValue::Set(value.date),
            agenda: ActiveValue::Set(value.agenda.clone()),
            notes: ActiveValue::Set(value.notes.clone()),
            attendees: ActiveValue::Set(attendees),
            created_at: ActiveValue::Set(value.created_at),
        })
    }
}

impl TryFrom<Model> for Meeting {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let attendees: Vec<String> = serde_json::from_str(&model.attendees)
            .map_err(|err| EngineError::Validation(format!("invalid attendees: {err}")))?;
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            date: model.date,
            agenda: model.agenda,
            notes: model.notes,
            attendees,
            created_at: model.created_at,
        })
    }
}
