use thiserror::Error;

/// All errors that can occur in libris-core.
#[derive(Debug, Error)]
pub enum LibrisError {
    #[error("A book with title '{title}' by '{author}' already exists")]
    Duplicate { title: String, author: String },

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Migration error at version {version}: {message}")]
    Migration { version: u32, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl LibrisError {
    pub fn duplicate(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self::Duplicate {
            title: title.into(),
            author: author.into(),
        }
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Duplicate { .. } => ExitCode::Conflict,
            Self::NotFound(_) => ExitCode::NotFound,
            Self::Validation(_) | Self::Config(_) => ExitCode::InvalidArgs,
            Self::Io(_) => ExitCode::FileSystemError,
            Self::Storage(_)
            | Self::Migration { .. }
            | Self::TomlParse(_)
            | Self::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

/// Exit codes used by the `libris` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    Conflict = 7,
    ConfirmRequired = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

pub type Result<T> = std::result::Result<T, LibrisError>;
