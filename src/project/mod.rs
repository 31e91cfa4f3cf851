//! Known projects, their in-app trash, and visit-history navigation

mod history;
mod os_trash;
mod registry;
mod validate;

pub use os_trash::{OsTrash, TrashFacility};
pub use registry::{ProjectRegistry, RegistryError, RepairChoice};
pub use validate::{check_path, validate_project_path};
