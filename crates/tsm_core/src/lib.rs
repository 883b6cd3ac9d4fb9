pub mod catalog;
pub mod core_api;
pub mod group_path;
pub mod item_string;
pub mod layout;
pub mod lua;
pub mod merge;
pub mod persist;
pub mod profile;
pub mod reader;
pub mod tree;
pub mod writer;

pub use core_api::{CoreError, CoreErrorCode, Engine, Session};
pub use group_path::{GroupPath, TreeStatusKey};
pub use item_string::{Dialect, ItemIdentity};
pub use profile::{ProfileModel, ProfileSelector};
