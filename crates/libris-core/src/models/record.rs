use serde::{Deserialize, Serialize};

use crate::error::{LibrisError, Result};
use crate::models::Category;

/// Store-assigned identifier of a record. Never reused.
pub type RecordId = i64;

/// A catalog entry as persisted in the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub author: String,
    pub publisher: String,
    /// Free-form year token, e.g. "1965" or "c. 1600".
    pub year: String,
    pub category: Category,
    pub quantity: u32,
}

impl Record {
    /// The mutable part of this record.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            title: self.title.clone(),
            author: self.author.clone(),
            publisher: self.publisher.clone(),
            year: self.year.clone(),
            category: self.category,
            quantity: self.quantity,
        }
    }
}

/// Every field of a record except its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: String,
    #[serde(default)]
    pub category: Category,
    pub quantity: u32,
}

impl RecordFields {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        publisher: impl Into<String>,
        year: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            publisher: publisher.into(),
            year: year.into(),
            category: Category::default(),
            quantity: 0,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Required text fields must be non-empty. Values are checked verbatim.
    pub fn check_required(&self) -> Result<()> {
        let required = [
            ("title", &self.title),
            ("author", &self.author),
            ("publisher", &self.publisher),
            ("year", &self.year),
        ];
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(LibrisError::Validation(format!("{name} is required"))),
            None => Ok(()),
        }
    }
}

/// Raw field values as typed by a person, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quantity: String,
}

impl RecordDraft {
    /// Prefill a draft from a stored record, e.g. before a partial edit.
    pub fn from_record(record: &Record) -> Self {
        Self {
            title: record.title.clone(),
            author: record.author.clone(),
            publisher: record.publisher.clone(),
            year: record.year.clone(),
            category: Some(record.category.to_string()),
            quantity: record.quantity.to_string(),
        }
    }

    /// Trim every field and turn the draft into typed record fields.
    pub fn validate(&self) -> Result<RecordFields> {
        let title = self.title.trim();
        let author = self.author.trim();
        let publisher = self.publisher.trim();
        let year = self.year.trim();
        let quantity = self.quantity.trim();

        let required = [
            ("title", title),
            ("author", author),
            ("publisher", publisher),
            ("year", year),
            ("quantity", quantity),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(LibrisError::Validation(format!(
                "all fields are required ({name} is empty)"
            )));
        }

        let quantity = parse_quantity(quantity)?;

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => Category::default(),
            Some(name) => name.parse::<Category>().map_err(LibrisError::Validation)?,
        };

        Ok(RecordFields {
            title: title.to_string(),
            author: author.to_string(),
            publisher: publisher.to_string(),
            year: year.to_string(),
            category,
            quantity,
        })
    }
}

fn parse_quantity(raw: &str) -> Result<u32> {
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(LibrisError::Validation(format!(
            "quantity must be a number, got '{raw}'"
        )));
    }
    raw.parse::<u32>()
        .map_err(|_| LibrisError::Validation(format!("quantity is out of range: {raw}")))
}
