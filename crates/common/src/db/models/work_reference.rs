//! Reference edge: `work_id` cites `referenced_work_id`

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_references")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub work_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub referenced_work_id: String,

    /// Position in the work's reference list
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work::Entity",
        from = "Column::WorkId",
        to = "super::work::Column::Id",
        on_delete = "Cascade"
    )]
    Work,
}

impl Related<super::work::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Work.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
