//! SeaORM entity models
//!
//! Database entities for the citation caches

mod citation_fetch;
mod library_mapping;
mod work;
mod work_citation;
mod work_reference;

pub use library_mapping::{
    Entity as LibraryMappingEntity,
    Model as LibraryMapping,
    ActiveModel as LibraryMappingActiveModel,
    Column as LibraryMappingColumn,
};

pub use work::{
    Entity as WorkEntity,
    Model as Work,
    ActiveModel as WorkActiveModel,
    Column as WorkColumn,
};

pub use work_reference::{
    Entity as WorkReferenceEntity,
    Model as WorkReference,
    ActiveModel as WorkReferenceActiveModel,
    Column as WorkReferenceColumn,
};

pub use work_citation::{
    Entity as WorkCitationEntity,
    Model as WorkCitation,
    ActiveModel as WorkCitationActiveModel,
    Column as WorkCitationColumn,
};

pub use citation_fetch::{
    Entity as CitationFetchEntity,
    Model as CitationFetch,
    ActiveModel as CitationFetchActiveModel,
    Column as CitationFetchColumn,
};
