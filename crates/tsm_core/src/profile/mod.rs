mod model;
mod read;
mod table;

pub use model::{
    DEFAULT_OPERATION_MODULES, GroupMeta, ItemAssignment, OtherKey, ProfileModel, TableKind,
};
pub use read::{DEFAULT_PROFILE, ProfileSelector, read};
pub use table::TableEntries;

pub(crate) use model::Section;
pub(crate) use table::{SetOutcome, SlotKey};
