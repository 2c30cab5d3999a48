use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid invoice data: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("No valid invoice items after processing")]
    NoValidItems,

    #[error("Please select an entity")]
    NoEntitySelected,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Max retries exceeded. The PDF service is rate limiting. Please try again in a few minutes.")]
    RateLimited,

    #[error("PDF service error: {0}")]
    PdfService(String),

    #[error("Unsupported chain shape: {0}")]
    ChainShape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Saved {saved} of {total} invoices before failing: {source}")]
    BatchAborted {
        saved: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(vec![message.into()])
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Whether this is a lookup miss rather than a validation or transport failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
