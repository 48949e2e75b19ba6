//! Error type shared by every fallible operation.

/// Result alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid arguments or options, raised before any device work
    #[error("config error: {0}")]
    Config(String),

    /// An operation the buffer's current state cannot support
    #[error("usage error: {0}")]
    Usage(String),

    /// No adapter matched the configuration
    #[error("no GPU adapter available")]
    NoAdapter,

    /// The adapter refused the device request
    #[error("device request failed: {0}")]
    Device(String),

    /// The WGSL front end rejected a generated kernel
    #[error("kernel compilation failed: {0}")]
    Compilation(String),

    /// `map_async` failed
    #[error("buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    /// Any other validation error reported by the device
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Metrics could not be exported
    #[cfg(feature = "telemetry")]
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// I/O failure while exporting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a [`Error::Config`]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a [`Error::Usage`]
    pub fn usage<S: Into<String>>(msg: S) -> Self {
        Error::Usage(msg.into())
    }

    /// Create a [`Error::Gpu`]
    pub fn gpu<S: Into<String>>(msg: S) -> Self {
        Error::Gpu(msg.into())
    }

    /// Create a [`Error::Compilation`]
    pub fn compilation<S: Into<String>>(msg: S) -> Self {
        Error::Compilation(msg.into())
    }

    /// Create a [`Error::Telemetry`]
    #[cfg(feature = "telemetry")]
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Telemetry(msg.into())
    }

    /// True for errors raised before any device resource was touched.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<wgpu::RequestDeviceError> for Error {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        Error::Device(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("workgroup must have 1 to 3 dimensions");
        assert_eq!(
            err.to_string(),
            "config error: workgroup must have 1 to 3 dimensions"
        );
        assert!(err.is_config());

        let err = Error::usage("bad");
        assert_eq!(err.to_string(), "usage error: bad");
        assert!(!err.is_config());
    }

    #[test]
    fn test_map_error_conversion() {
        let err: Error = wgpu::BufferAsyncError.into();
        assert!(matches!(err, Error::Map(_)));
    }
}
