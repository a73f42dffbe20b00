use camino::Utf8PathBuf;

/// Error types for the ownersed library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No lookup credential was configured.
    #[error("IP2LOCATION_API_KEY is not set")]
    MissingApiKey,

    /// Cache file could not be read.
    #[error("failed to read cache file {path}")]
    CacheRead {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache file is not a JSON object of strings.
    #[error("failed to parse cache file {path}")]
    CacheParse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Cache file could not be written.
    #[error("failed to write cache file {path}")]
    CacheWrite {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache contents could not be serialized.
    #[error("failed to encode cache")]
    CacheEncode(#[source] serde_json::Error),

    /// The lookup request failed in transport or returned a non-2xx status.
    #[error("lookup request failed for {ip}")]
    LookupRequest {
        ip: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The lookup response body could not be read.
    #[error("failed to read lookup response for {ip}")]
    LookupBody {
        ip: String,
        #[source]
        source: std::io::Error,
    },

    /// The lookup response was not the expected JSON document.
    #[error("malformed lookup response for {ip}")]
    LookupDecode {
        ip: String,
        #[source]
        source: serde_json::Error,
    },

    /// The lookup response lacked a field needed to describe the owner.
    #[error("lookup response for {ip} has no {field}")]
    MissingField { ip: String, field: &'static str },

    /// The field extractor could not be built.
    #[error(transparent)]
    Extract(#[from] field_extract::Error),
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
