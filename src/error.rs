use std::io;

/// Errors surfaced while compressing or decompressing a record.
///
/// The first error aborts the invocation; no layer retries or falls back to
/// another encoding. Walker levels wrap inner errors in [`Error::Field`] so
/// the failing field path survives to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    /// A varint ran past ten bytes.
    #[error("varint longer than ten bytes")]
    VarintOverflow,
    /// The encoder saw an enum number absent from the descriptor.
    #[error("enum {enumeration} has no value numbered {number}")]
    UnknownEnumValue { enumeration: String, number: i32 },
    /// The decoder produced an index past the declared value count.
    #[error("enum {enumeration} has no declared index {index}")]
    InvalidEnumIndex { enumeration: String, index: usize },
    #[error("unsupported field kind: {0}")]
    UnsupportedKind(&'static str),
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
    #[error("text decode failed: {0}")]
    TextDecode(&'static str),
    #[error("field {name}: {source}")]
    Field {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap with the name of the field the error surfaced under.
    #[cold]
    pub(crate) fn in_field(self, name: &str) -> Self {
        Self::Field {
            name: name.to_owned(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn test_field_annotation() {
    let err = Error::VarintOverflow.in_field("altitude").in_field("position");
    assert_eq!(
        "field position: field altitude: varint longer than ten bytes",
        format!("{err}")
    );
}
