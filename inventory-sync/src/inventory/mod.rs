//! Boundary to the inventory the external state is compared against.

mod base;
pub mod memory;

pub use base::{Inventory, InventoryChange};
