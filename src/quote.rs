//! The quote record and the request payloads that create or edit it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A book-attributed text snippet.
///
/// `id` and `inserted_at` never change after construction; `updated_at`
/// moves forward on every edit, so `inserted_at <= updated_at` holds.
/// Empty text fields and a nil id are left out of the JSON payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default, skip_serializing_if = "Uuid::is_nil")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub book: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub quote: String,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a new record with a fresh v4 id, stamped with the current time.
    ///
    /// No content validation: empty `book` or `quote` is accepted.
    pub fn new(book: impl Into<String>, quote: impl Into<String>) -> Self {
        Self::new_at(Uuid::new_v4(), book, quote, Utc::now())
    }

    /// Same as [`Quote::new`] with the identity and clock supplied by the caller.
    pub fn new_at(id: Uuid, book: impl Into<String>, quote: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            book: book.into(),
            quote: quote.into(),
            inserted_at: now,
            updated_at: now,
        }
    }
}

/// Body of `POST /quote`. Missing fields read as empty strings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewQuote {
    #[serde(default)]
    pub book: String,
    #[serde(default)]
    pub quote: String,
}

/// Body of `PATCH /quote`. Only the text is editable.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuoteEdit {
    #[serde(default)]
    pub quote: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stamps_both_timestamps_identically() {
        let q = Quote::new("Dune", "Fear is the mind-killer");
        assert!(!q.id.is_nil());
        assert_eq!(q.inserted_at, q.updated_at);
        assert_ne!(q.id, Quote::new("Dune", "").id);
    }

    #[test]
    fn wire_shape_is_camel_case_and_omits_empty_text() {
        let q = Quote::new("", "");
        let json = serde_json::to_value(&q).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("insertedAt"));
        assert!(obj.contains_key("updatedAt"));
        assert!(!obj.contains_key("book"));
        assert!(!obj.contains_key("quote"));
    }

    #[test]
    fn payloads_tolerate_missing_fields() {
        let args: NewQuote = serde_json::from_str(r#"{"book":"Dune"}"#).unwrap();
        assert_eq!(args.book, "Dune");
        assert_eq!(args.quote, "");
        assert!(serde_json::from_str::<QuoteEdit>(r#"{"quote":5}"#).is_err());
    }
}
