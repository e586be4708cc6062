pub type Result<T> = ::core::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Usb(#[from] rusb::Error),
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
    #[error(transparent)]
    Postcard(#[from] postcard::Error),
    #[error(transparent)]
    Attach(#[from] u810::AttachError),
    #[error("session worker panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use u810::{AttachError, ConfigError};

    use super::*;

    #[test]
    fn bad_parameters_surface_through_attach() {
        let e = AppError::from(AttachError::from(ConfigError::Orientation(7)));
        assert!(matches!(e, AppError::Attach(AttachError::Config(_))));
        assert_eq!(e.to_string(), ConfigError::Orientation(7).to_string());
    }
}
