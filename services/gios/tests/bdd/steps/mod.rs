//! BDD step definitions for the GIOŚ service

pub mod api_client_steps;
pub mod lifecycle_steps;
