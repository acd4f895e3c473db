use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Event category. Anything the store sends that is not one of the known
/// names is read as `Otros`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    EnumIter,
    strum::Display,
)]
#[serde(from = "String")]
pub enum Category {
    Alumnos,
    Docentes,
    Presentaciones,
    #[default]
    Otros,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Lowercase name, used for CSS classes and case-insensitive search
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Alumnos => "alumnos",
            Category::Docentes => "docentes",
            Category::Presentaciones => "presentaciones",
            Category::Otros => "otros",
        }
    }

    /// Exact category name, ignoring surrounding whitespace, or `Otros`
    pub fn parse_or_default(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::parse_or_default(&value)
    }
}

/// A single calendar event as stored in the spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque identifier assigned by the store (or the local clock when offline)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Event date in YYYY-MM-DD format, possibly followed by a time part
    pub date: String,

    pub title: String,

    #[serde(default)]
    pub category: Category,

    #[serde(default)]
    pub notes: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Event {
    pub fn new(id: String, date: String, title: String, category: Category, notes: String) -> Self {
        Self {
            id,
            date,
            title,
            category,
            notes,
            created_at: None,
        }
    }

    /// The calendar date of this event, ignoring any time component.
    /// Returns None when the date cannot be parsed.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.date)
    }
}

/// Parse the `YYYY-MM-DD` portion of a date or ISO datetime string
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Spreadsheet-backed stores hand out numeric ids; keep them as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Validation failures for submitted event forms
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("date is required")]
    MissingDate,

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Event fields as submitted from the form, before an id is assigned
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventDraft {
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub notes: String,
}

impl EventDraft {
    /// Blank form: today's date and the default category
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            ..Self::default()
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            date: event.date.clone(),
            title: event.title.clone(),
            category: event.category,
            notes: event.notes.clone(),
        }
    }

    /// Check required fields and return a trimmed copy
    pub fn validate(&self) -> Result<EventDraft, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let date = self.date.trim();
        if date.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        let parsed =
            parse_calendar_date(date).ok_or_else(|| ValidationError::InvalidDate(date.to_string()))?;

        Ok(EventDraft {
            date: parsed.format("%Y-%m-%d").to_string(),
            title: title.to_string(),
            category: self.category,
            notes: self.notes.trim().to_string(),
        })
    }

    pub fn into_event(self, id: String, created_at: String) -> Event {
        Event {
            id,
            date: self.date,
            title: self.title,
            category: self.category,
            notes: self.notes,
            created_at: Some(created_at),
        }
    }
}
