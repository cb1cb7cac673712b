// crates/mtp-sim-aml/src/error.rs

use quick_xml::Error as XmlError;
use quick_xml::events::attributes::AttrError;
use std::fmt;
use std::io;
use zip::result::ZipError;

/// Errors that can occur while loading a descriptor.
#[derive(Debug)]
pub enum AmlError {
    /// The file extension does not select any parsing mode. Raised before the
    /// content is read.
    UnsupportedFormat { extension: String },

    /// The XML could not be parsed. `entry` names the archive entry that failed,
    /// if the document came from an archive; one bad entry fails the whole archive.
    MalformedDocument {
        entry: Option<String>,
        reason: String,
    },

    /// The archive container itself could not be read.
    Archive(ZipError),

    /// The descriptor file could not be read.
    Io(io::Error),
}

impl AmlError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AmlError::MalformedDocument {
            entry: None,
            reason: reason.into(),
        }
    }

    /// Attributes a document error to the archive entry it came from.
    pub(crate) fn in_entry(self, name: &str) -> Self {
        match self {
            AmlError::MalformedDocument { entry: None, reason } => AmlError::MalformedDocument {
                entry: Some(name.to_string()),
                reason,
            },
            other => other,
        }
    }
}

impl From<XmlError> for AmlError {
    fn from(e: XmlError) -> Self {
        AmlError::malformed(e.to_string())
    }
}

impl From<AttrError> for AmlError {
    fn from(e: AttrError) -> Self {
        AmlError::malformed(format!("invalid attribute: {}", e))
    }
}

impl From<ZipError> for AmlError {
    fn from(e: ZipError) -> Self {
        AmlError::Archive(e)
    }
}

impl From<io::Error> for AmlError {
    fn from(e: io::Error) -> Self {
        AmlError::Io(e)
    }
}

impl fmt::Display for AmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmlError::UnsupportedFormat { extension } if extension.is_empty() => {
                write!(f, "Unsupported file type: no extension")
            }
            AmlError::UnsupportedFormat { extension } => {
                write!(f, "Unsupported file type: .{}", extension)
            }
            AmlError::MalformedDocument {
                entry: Some(entry),
                reason,
            } => write!(f, "Malformed document in archive entry '{}': {}", entry, reason),
            AmlError::MalformedDocument { entry: None, reason } => {
                write!(f, "Malformed document: {}", reason)
            }
            AmlError::Archive(e) => write!(f, "Archive error: {}", e),
            AmlError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for AmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmlError::Archive(e) => Some(e),
            AmlError::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_attribution_only_applies_once() {
        let err = AmlError::malformed("unexpected end").in_entry("a.aml").in_entry("b.aml");
        match err {
            AmlError::MalformedDocument { entry, .. } => assert_eq!(entry.as_deref(), Some("a.aml")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        let err = AmlError::UnsupportedFormat {
            extension: "txt".into(),
        };
        assert_eq!(err.to_string(), "Unsupported file type: .txt");

        let err = AmlError::malformed("bad").in_entry("x.aml");
        assert_eq!(
            err.to_string(),
            "Malformed document in archive entry 'x.aml': bad"
        );
    }
}
