//! Application layer: the engines that orchestrate the domain rules over the
//! store ports.
//!
//! `ClassScheduler` owns class lifecycle, `EnrollmentEngine` links students to
//! classes, and `ClassCatalog` answers read-only queries; `service::Classroom`
//! wires all three to one set of stores. Multi-document writes
//! go through [`unit_of_work::modify`], which retries on lost compare-and-swap
//! races, and are compensated step by step when a later write fails.

pub mod catalog;
pub mod enrollment;
pub mod scheduling;
pub mod service;
pub mod unit_of_work;
