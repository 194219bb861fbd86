//! Domain Layer
//!
//! Value objects, entities, ports and pure services. Nothing in here
//! performs I/O.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
