pub mod design;

pub use design::{is_truthy, Design, Revision, RESERVED_FIELDS};
