//! Host platform queries.

pub mod account;
