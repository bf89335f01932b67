//! Citing edge: `citing_work_id` cites `work_id`

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_citations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub work_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub citing_work_id: String,

    /// Order in which the service returned the citer
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
