use thiserror::Error;

use crate::{A1ParseError, XlsxError};

/// Why an existing comments or VML drawing part could not be read back.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("part is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed xml: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("invalid {attr} value {value:?}")]
    InvalidAttr { attr: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("invalid cell reference {reference:?}: {source}")]
    InvalidReference {
        reference: String,
        #[source]
        source: A1ParseError,
    },
    #[error("invalid note payload: {0}")]
    PayloadParse(#[from] serde_json::Error),
    #[error("corrupt note part {part}: {source}")]
    PartCorruption {
        part: String,
        #[source]
        source: FragmentError,
    },
    #[error("legacy drawing part name {0:?} does not carry a numeric id")]
    MalformedDrawingPartName(String),
    #[error("legacy drawing relationship {0} does not resolve to a package part")]
    DanglingLegacyDrawing(String),
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}
