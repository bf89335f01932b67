//! Work detail entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "works")]
pub struct Model {
    /// External work id (e.g. W2741809807)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    pub publication_year: Option<i32>,

    /// "First, Second et al."
    #[sea_orm(column_type = "Text", nullable)]
    pub authors: Option<String>,

    pub cited_by_count: Option<i32>,

    pub fetched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::work_reference::Entity")]
    References,
}

impl Related<super::work_reference::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::References.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
