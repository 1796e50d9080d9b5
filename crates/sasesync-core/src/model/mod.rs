//! Domain model: identities, items, and reference fields.

pub mod identity;
pub mod item;

pub use identity::{ConfigKind, Identity, Location, ParseIdentityError};
pub use item::{ConfigItem, FieldPath, PathSegment, RefStyle, Reference};
