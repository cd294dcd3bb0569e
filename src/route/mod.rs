mod controller;
pub mod path;
mod tree;

pub use controller::{pascal_case, ControllerRef};
pub use path::{Segment, CATCH_ALL, DEFAULT_MAX_URL_LENGTH};
pub use tree::{MethodSet, RouteBuilder, RouteEntry, RouteGroup, RouteNode};
