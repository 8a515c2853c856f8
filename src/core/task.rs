use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::LazyLock;
use uuid::Uuid;

static DUE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` due date. Anything else is rejected.
pub fn parse_due_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if !DUE_DATE_RE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, DUE_DATE_FORMAT).ok()
}

/// Task priority, persisted as its integer level (0 = unset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[default]
    Unset,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn level(&self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn from_level(level: u64) -> Option<Self> {
        match level {
            0 => Some(Self::Unset),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = u64::deserialize(deserializer)?;
        Self::from_level(level)
            .ok_or_else(|| serde::de::Error::custom(format!("priority out of range: {}", level)))
    }
}

mod due_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format(super::DUE_DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_due_date(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {}", s))),
        }
    }
}

/// One to-do item inside a project. Has no lifecycle of its own; tasks are
/// created, edited and deleted by submitting a revised task list to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    #[serde(with = "due_date_format")]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            text: text.into(),
            completed: false,
            priority: Priority::Unset,
            due_date: None,
        }
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn reopen(&mut self) {
        self.completed = false;
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Open task whose due date has passed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }

    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due_date == Some(day)
    }
}

pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}
