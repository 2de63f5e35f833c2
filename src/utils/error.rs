use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicamError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Camera device error on {device}: {message}")]
    DeviceError { device: String, message: String },

    #[error("Format {format} is not supported by {device} (available: {available})")]
    UnsupportedFormatError {
        device: String,
        format: String,
        available: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Boot config error in {path}: {message}")]
    BootConfigError { path: String, message: String },

    #[error("Tool check failed for {tool}: {message}")]
    ToolCheckError { tool: String, message: String },

    #[error("Frame processing error: {message}")]
    ProcessingError { message: String },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Device,
    Configuration,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PicamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PicamError::IoError(_) => ErrorCategory::Io,
            PicamError::DeviceError { .. } | PicamError::UnsupportedFormatError { .. } => {
                ErrorCategory::Device
            }
            PicamError::ConfigError { .. }
            | PicamError::ConfigValidationError { .. }
            | PicamError::InvalidConfigValueError { .. }
            | PicamError::MissingConfigError { .. }
            | PicamError::BootConfigError { .. } => ErrorCategory::Configuration,
            PicamError::ZipError(_)
            | PicamError::CsvError(_)
            | PicamError::SerializationError(_)
            | PicamError::ProcessingError { .. } => ErrorCategory::Processing,
            PicamError::ToolCheckError { .. } | PicamError::TaskError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 裝置忙碌或暫時拔除，通常重試即可
            PicamError::DeviceError { .. } | PicamError::ToolCheckError { .. } => {
                ErrorSeverity::Medium
            }
            PicamError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorSeverity::High
            }
            PicamError::IoError(_) | PicamError::TaskError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PicamError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                "Re-run the command with sudo, or add your user to the 'video' group".to_string()
            }
            PicamError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "Check that the path exists and the camera is connected".to_string()
            }
            PicamError::IoError(_) => "Check disk space and file permissions".to_string(),
            PicamError::DeviceError { device, .. } => format!(
                "Make sure {} exists, no other program is using the camera, and the overlay is enabled (picam overlay enable)",
                device
            ),
            PicamError::UnsupportedFormatError { device, .. } => format!(
                "Run 'picam formats --device {}' to list supported formats and resolutions",
                device
            ),
            PicamError::ConfigError { .. }
            | PicamError::ConfigValidationError { .. }
            | PicamError::InvalidConfigValueError { .. } => {
                "Fix the value in the capture profile or command line flags".to_string()
            }
            PicamError::MissingConfigError { field } => {
                format!("Set '{}' in the capture profile or pass it as a flag", field)
            }
            PicamError::BootConfigError { .. } => {
                "Inspect the boot config file manually; a .bak copy is written before every change"
                    .to_string()
            }
            PicamError::ToolCheckError { .. } => {
                "Install the missing packages with apt and run 'picam doctor' again".to_string()
            }
            PicamError::ZipError(_) | PicamError::CsvError(_) | PicamError::SerializationError(_) => {
                "Retry the capture; if it keeps failing, disable archive output".to_string()
            }
            PicamError::ProcessingError { .. } => {
                "Retry with --verbose to see which frame failed".to_string()
            }
            PicamError::TaskError(_) => "Retry the command; this is likely a bug".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Device => format!("Camera problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Processing => format!("Could not process captured frames: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PicamError>;
