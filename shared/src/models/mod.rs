//! Domain models for the inventory administration platform

mod inventory;
mod notification;
mod site;

pub use inventory::*;
pub use notification::*;
pub use site::*;
