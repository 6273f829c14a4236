//! Grouping classified articles into digest sections, plus text, markdown and
//! JSON previews of the result.

pub mod group;
pub mod render;

pub use group::{group, CategoryGroup, DigestGroups};
