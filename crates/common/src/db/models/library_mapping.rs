//! Library mapping entity: local item key to external work id

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "library_mappings")]
pub struct Model {
    /// Key of the item in the local library
    #[sea_orm(primary_key, auto_increment = false)]
    pub local_key: String,

    /// External work id. May not have a row in `works` yet.
    #[sea_orm(indexed)]
    pub work_id: String,

    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    pub last_updated: DateTimeUtc,
}

// No relation to `works`: a mapping without its work is a valid, repairable state.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
