//! Error taxonomy for the extension subsystem.

/// Errors surfaced by descriptor parsing, registration and parameter
/// dispatch.
///
/// Validation failures (`Extension::check`) never appear here: they are
/// reduced to a boolean and logged to the shared [`crate::ErrorLog`].
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The descriptor declared no (or an empty) `id` element.
    #[error("extension description has no id")]
    MissingId,

    /// The descriptor declared no (or an empty) `name` element.
    #[error("extension description has no name")]
    MissingName,

    /// A parameter lookup found no parameter of that name anywhere in
    /// the extension's declaration.
    #[error("no parameter named \"{0}\"")]
    ParameterNotFound(String),

    /// A typed accessor was used on a parameter of a different type.
    #[error("parameter \"{name}\" does not hold a {expected} value")]
    WrongParameterType { name: String, expected: &'static str },

    /// An option-group set with a value outside the declared options.
    #[error("\"{value}\" is not an option of parameter \"{name}\"")]
    UnknownOption { name: String, value: String },

    /// An extension with the same id is already registered.
    #[error("extension already registered: {0}")]
    AlreadyRegistered(String),

    /// The descriptor's root element is not an extension declaration.
    #[error("not an extension description (root element <{0}>)")]
    NotAnExtension(String),

    /// The descriptor text is not well-formed XML.
    #[error("malformed extension description: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Reading a descriptor file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ExtensionError::MissingId.to_string(),
            "extension description has no id"
        );
        assert_eq!(
            ExtensionError::ParameterNotFound("radius".into()).to_string(),
            "no parameter named \"radius\""
        );

        let err = ExtensionError::WrongParameterType {
            name: "radius".into(),
            expected: "bool",
        };
        assert!(err.to_string().contains("does not hold a bool"));
    }
}
