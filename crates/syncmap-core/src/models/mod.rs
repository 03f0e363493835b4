//! Data models for syncmap

mod change;
mod mapping;
mod object;

pub use change::{ChangeDescriptor, ReconciliationEvent};
pub use mapping::{MappingFilter, MappingKey, MappingRecord, Side};
pub use object::{ObjectDescriptor, ObjectRef};
