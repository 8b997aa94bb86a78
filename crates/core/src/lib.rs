//! Core types for listing-pager
//!
//! Snapshots, statuses and view descriptors shared by the controller and
//! the rendering layer.

pub mod config;
pub mod constants;
mod error;
mod snapshot;
mod status;
mod view;

pub use config::{PagerConfig, env_parse_with_default};
pub use error::*;
pub use snapshot::*;
pub use status::*;
pub use view::*;
