use esi_tools::EsiApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("Could not apply database migrations. {0}")]
    MigrationError(String),
    #[error("Could not create the game API client. {0}")]
    EsiError(#[from] EsiApiError),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}
