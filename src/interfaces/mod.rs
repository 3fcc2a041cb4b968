//! Batch surfaces: CSV operations in, CSV roster out, JSON seed data.

pub mod csv;
pub mod seed;
