use serde::de::Error as _;
use serde_json::{Map, Value};

pub const DEFAULT_AUTHOR: &str = "Author:";
pub const DEFAULT_TEXT: &str = " ";

/// Excel refuses longer author names.
pub const MAX_AUTHOR_CHARS: usize = 255;
/// Excel's cap on note text.
pub const MAX_TEXT_CHARS: usize = 32_512;

/// Author label and body of a note, as supplied by the caller.
///
/// Values are stored as given; [`NoteFormat::author`] and [`NoteFormat::text`] apply the Excel
/// length caps when the note is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFormat {
    author: String,
    text: String,
}

impl Default for NoteFormat {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR, DEFAULT_TEXT)
    }
}

impl NoteFormat {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    /// Parse a JSON payload such as `{"author":"Excelize: ","text":"This is a comment."}`.
    ///
    /// Keys match case-insensitively, an exact `author` / `text` key winning over other
    /// spellings. Missing or `null` fields fall back to [`DEFAULT_AUTHOR`] / [`DEFAULT_TEXT`];
    /// unknown fields are ignored. Anything that is not a JSON object (or `null`) is an error.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let fields = match serde_json::from_str::<Value>(payload)? {
            Value::Null => Map::new(),
            Value::Object(fields) => fields,
            _ => return Err(serde_json::Error::custom("note payload must be a JSON object")),
        };
        Ok(Self {
            author: string_field(&fields, "author")?
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            text: string_field(&fields, "text")?.unwrap_or_else(|| DEFAULT_TEXT.to_string()),
        })
    }

    /// Author label, capped at [`MAX_AUTHOR_CHARS`] characters.
    pub fn author(&self) -> &str {
        truncate_to_chars(&self.author, MAX_AUTHOR_CHARS)
    }

    /// Note body, capped at [`MAX_TEXT_CHARS`] characters.
    pub fn text(&self) -> &str {
        truncate_to_chars(&self.text, MAX_TEXT_CHARS)
    }
}

fn string_field(
    fields: &Map<String, Value>,
    name: &str,
) -> Result<Option<String>, serde_json::Error> {
    let value = fields.get(name).or_else(|| {
        fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    });
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(serde_json::Error::custom(format!(
            "note field `{name}` must be a string, found {other}"
        ))),
    }
}

pub(crate) fn truncate_to_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
