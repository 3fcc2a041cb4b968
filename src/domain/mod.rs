//! Domain layer: entities, value objects, scheduling/enrollment rules and the
//! store ports the application layer depends on.

pub mod class;
pub mod enrollment;
pub mod ids;
pub mod ports;
pub mod schedule;
pub mod user;
pub mod validation;
pub mod voucher;
