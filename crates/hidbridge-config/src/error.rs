use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(hidbridge::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(hidbridge::config::invalid))]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    #[diagnostic(code(hidbridge::config::missing_field))]
    MissingField { field: String },

    #[error("Unknown key '{key}' in {context} block")]
    #[diagnostic(
        code(hidbridge::config::unknown_key),
        help("use a name like `CapsLock`, `F1`, `\"1\"` or a raw kernel name like `KEY_102ND`")
    )]
    UnknownKey {
        key: String,
        context: String,
        #[source_code]
        src: String,
        #[label("not a known key")]
        span: miette::SourceSpan,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
