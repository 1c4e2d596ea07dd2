use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Template error: {0}")]
    Template(String),
}

pub type AppResult<T> = Result<T, AppError>;
