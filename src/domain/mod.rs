//! Domain layer
//!
//! Device entities, the collaborator traits the reader consumes, and the
//! probing services. Nothing here talks to real hardware.

pub mod entities;
pub mod repositories;
pub mod services;
