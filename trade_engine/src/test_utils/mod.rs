//! Helpers for tests that need a throw-away database and stand-ins for the external collaborators.
pub mod fakes;
pub mod prepare_env;
pub mod seed;
