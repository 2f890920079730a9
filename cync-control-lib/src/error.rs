use std::io;

/// Result alias used across the controller, modes and engines.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Every failure the control loop can surface.
///
/// Remote calls made by a [`crate::client::DeviceClient`] report plain
/// [`anyhow::Error`]s; they are classified here once they cross the controller boundary.
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    /// The requested mode id is not registered. Nothing changed.
    #[error("unrecognized mode {0}")]
    UnknownMode(String),

    /// A single remote call for one device failed.
    #[error("command for device {device} failed: {source}")]
    DeviceCommand {
        device: String,
        #[source]
        source: anyhow::Error,
    },

    /// Listing devices failed; the previous cache is still in place.
    #[error("failed to refresh device cache: {0}")]
    CacheRefresh(#[source] anyhow::Error),

    /// A cached session token could not be used.
    #[error("invalid session: {0}")]
    Session(String),

    /// Interactive login did not produce a session.
    #[error("login failed: {0}")]
    Login(#[source] anyhow::Error),

    /// Operator input could not be understood.
    #[error("invalid input: {0}")]
    InputParse(String),

    /// A mode's tick or setup failed.
    #[error("failed to execute mode {mode}: {source}")]
    Mode {
        mode: String,
        #[source]
        source: Box<ControlError>,
    },

    /// Reading from the console failed.
    #[error("console error: {0}")]
    Console(#[from] io::Error),
}

impl ControlError {
    pub fn device(device: impl Into<String>, source: anyhow::Error) -> Self {
        Self::DeviceCommand {
            device: device.into(),
            source,
        }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputParse(msg.into())
    }

    pub fn in_mode(mode: impl Into<String>, source: ControlError) -> Self {
        Self::Mode {
            mode: mode.into(),
            source: Box::new(source),
        }
    }

    /// True for [`ControlError::UnknownMode`], including when wrapped in a mode error.
    pub fn is_unknown_mode(&self) -> bool {
        match self {
            Self::UnknownMode(_) => true,
            Self::Mode { source, .. } => source.is_unknown_mode(),
            _ => false,
        }
    }
}
