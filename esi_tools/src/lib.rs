mod api;
mod config;
mod data_objects;
mod error;

pub use api::EsiApi;
pub use config::EsiConfig;
pub use data_objects::{EsiContract, TokenResponse};
pub use error::EsiApiError;
