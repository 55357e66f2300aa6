pub mod link;

pub use link::{CreateLinkRequest, Link, LinkPage, ListQuery, UpdateLinkRequest};
