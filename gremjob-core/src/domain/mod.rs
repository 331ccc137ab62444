//! Domain types

pub mod job;
