//! # Object Model
//!
//! The identity layer shared by every other module:
//!
//! ```text
//! id.rs      : ObjectId (safes, caps, items) and custody Address
//! version.rs : opaque epoch tokens for capability generations
//! item.rs    : the Item trait and declared TypeName
//! ```

pub mod id;
pub mod item;
pub mod version;

pub use id::{Address, ObjectId};
pub use item::{Item, TypeName};
pub use version::Version;
