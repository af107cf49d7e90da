//! Route modules for the CAR upload server

pub mod health;
pub mod upload;
