//! Request middleware for the HTTP surface.

pub mod rate_limit;
