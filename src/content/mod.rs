mod article;
pub mod legacy;
mod list;
pub mod sanitize;
pub mod tree;

pub use self::{
    article::{Article, Options},
    list::{List, ListRef, Version, VersionSet, VersionStatus},
};
