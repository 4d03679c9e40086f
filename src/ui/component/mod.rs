#[allow(clippy::module_inception)]
mod component;

pub use component::{Component, ComponentEnum};
