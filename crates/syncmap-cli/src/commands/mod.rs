pub mod common;
pub mod index;
pub mod mappings;
pub mod reconcile;
pub mod resolve;
