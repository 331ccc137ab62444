//! Data transfer objects

pub mod job;
