use super::*;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),
  #[error("no image loaded")]
  NoImageLoaded,
  #[error("model not found at `{}`", .0.display())]
  ModelNotFound(PathBuf),
  #[error("invalid model: {0}")]
  ModelInvalid(String),
  #[error("configuration error: {0}")]
  Configuration(String),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("image error: {0}")]
  Image(#[from] image::ImageError),
  #[error("DICOM error: {0}")]
  Dicom(String),
  #[error("log error: {0}")]
  Csv(#[from] csv::Error),
}

impl Error {
  pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
    Self::InvalidArgument(message.into())
  }

  pub(crate) fn model_invalid(message: impl Into<String>) -> Self {
    Self::ModelInvalid(message.into())
  }
}
