//! External-service boundaries used by the HTTP routes.

pub mod execute;
