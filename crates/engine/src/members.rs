//! Member records and the normalization rules applied at the boundary.
//!
//! Mobile numbers are persisted as `+91` followed by exactly ten digits;
//! names additionally carry a normalized form (`name_norm`) used for
//! case-insensitive matching during bulk import.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

pub(crate) const MOBILE_PREFIX: &str = "+91";

/// NFKC-normalize, trim and lowercase a member name for matching.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().nfkc().collect::<String>().to_lowercase()
}

/// Normalizes a raw mobile input to `+91` plus ten local digits.
///
/// Accepts anything carrying at least ten digits (`+91 91234 56789`,
/// `09123456789`, pasted strings); the last ten digits win.
pub fn normalize_mobile(raw: &str) -> ResultEngine<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return Err(EngineError::Validation(
            "mobile number must contain at least 10 digits".to_string(),
        ));
    }
    let ten = &digits[digits.len() - 10..];
    Ok(format!("{MOBILE_PREFIX}{ten}"))
}

/// A group member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub name_norm: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub designation: String,
    pub joining_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub name_norm: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub designation: String,
    pub joining_date: Date,
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

impl From<&Member> for ActiveModel {
    fn from(value: &Member) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            group_id: ActiveValue::Set(value.group_id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            name_norm: ActiveValue::Set(value.name_norm.clone()),
            mobile: ActiveValue::Set(value.mobile.clone()),
            email: ActiveValue::Set(value.email.clone()),
            address: ActiveValue::Set(value.address.clone()),
            designation: ActiveValue::Set(value.designation.clone()),
            joining_date: ActiveValue::Set(value.joining_date),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl From<Model> for Member {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            group_id: model.group_id,
            name: model.name,
            name_norm: model.name_norm,
            mobile: model.mobile,
            email: model.email,
            address: model.address,
            designation: model.designation,
            joining_date: model.joining_date,
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_takes_last_ten_digits() {
        assert_eq!(normalize_mobile("9123456789").unwrap(), "+919123456789");
        assert_eq!(normalize_mobile("+91 91234 56789").unwrap(), "+919123456789");
        assert_eq!(normalize_mobile("09123456789").unwrap(), "+919123456789");
        assert_eq!(normalize_mobile("919123456789").unwrap(), "+919123456789");
    }

    #[test]
    fn mobile_rejects_short_numbers() {
        assert!(normalize_mobile("12345").is_err());
        assert!(normalize_mobile("").is_err());
        assert!(normalize_mobile("abc").is_err());
    }

    #[test]
    fn name_norm_is_case_insensitive() {
        assert_eq!(normalize_name("  Lakshmi Devi "), "lakshmi devi");
        assert_eq!(normalize_name("LAKSHMI DEVI"), normalize_name("lakshmi devi"));
    }
}
