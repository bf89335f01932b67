//! Marker recording that citing works were fetched for a work.
//!
//! Presence of a row means the citing set in `work_citations` is
//! authoritative, even when it is empty.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citation_fetches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub work_id: String,

    pub citing_count: i32,

    pub fetched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
