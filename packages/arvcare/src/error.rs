use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Duplicate value {value} for unique field {field}")]
    Conflict { field: &'static str, value: String },

    #[error("Consultation time slot {id} is already booked")]
    SlotAlreadyBooked { id: i64 },

    #[error("Schedule window must start before it ends ({start} >= {end})")]
    InvalidWindow { start: String, end: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown error")]
    Unknown,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing field {name} from configuration file or environment")]
    MissingParameter { name: String },

    #[error("Invalid value {value} for configuration field {name}")]
    InvalidParameter { name: String, value: String },

    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    FileOrEnvironment(#[from] config::ConfigError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Row {id} in {table} no longer exists")]
    MissingRow { table: &'static str, id: i64 },

    #[error("Store is unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.into())
    }
}
