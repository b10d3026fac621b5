use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::text::{normalize_title, similarity};

/// Fuzzy-match cutoff used across category and title matching.
pub const FUZZY_CUTOFF: f64 = 0.6;

/// A task as seen through the external task store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned opaque ID (a Notion page ID).
    pub id: String,
    pub title: String,
    pub category: Option<Category>,
    pub due: Option<DueDate>,
    pub status: TaskStatus,
}

/// The closed category set. User input is mapped in via [`Category::normalize`];
/// anything else is rejected upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Studies,
    Work,
    Domestic,
}

/// Synonyms accepted for each category, already in normalized form.
const CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("estudio", Category::Studies),
    ("estudios", Category::Studies),
    ("academico", Category::Studies),
    ("universidad", Category::Studies),
    ("trabajo", Category::Work),
    ("laboral", Category::Work),
    ("laborales", Category::Work),
    ("empleo", Category::Work),
    ("oficio", Category::Work),
    ("profesional", Category::Work),
    ("domestica", Category::Domestic),
    ("domesticas", Category::Domestic),
    ("casa", Category::Domestic),
    ("hogar", Category::Domestic),
    ("limpieza", Category::Domestic),
];

impl Category {
    pub const ALL: [Category; 3] = [Category::Studies, Category::Work, Category::Domestic];

    /// Canonical Spanish label, as stored in Notion.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Studies => "Estudios",
            Category::Work => "Laboral",
            Category::Domestic => "Domésticas",
        }
    }

    /// The labels joined for user-facing error messages.
    pub fn labels_joined() -> String {
        Self::ALL.map(|c| c.label()).join(", ")
    }

    /// Map free-form user input to a category.
    ///
    /// Exact synonym lookup first, then a fuzzy pass over the synonym table
    /// to absorb typos ("laborl"). `None` means the caller should ask the
    /// user to pick from the valid set.
    pub fn normalize(input: &str) -> Option<Category> {
        let key = normalize_title(input);
        if key.is_empty() {
            return None;
        }
        for (synonym, category) in CATEGORY_SYNONYMS {
            if key == *synonym {
                return Some(*category);
            }
        }
        let mut best: Option<(f64, Category)> = None;
        for (synonym, category) in CATEGORY_SYNONYMS {
            let score = similarity(&key, synonym);
            if score >= FUZZY_CUTOFF && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, *category));
            }
        }
        best.map(|(_, c)| c)
    }

    /// Parse a canonical label coming back from the store.
    pub fn from_label(label: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Task status, mirroring the store's status property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Canonical Spanish label, as stored in Notion.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Por hacer",
            TaskStatus::InProgress => "En progreso",
            TaskStatus::Done => "Hecho",
        }
    }

    pub fn from_label(label: &str) -> Option<TaskStatus> {
        [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done]
            .into_iter()
            .find(|s| s.label() == label)
    }
}

/// A due date, which may or may not carry a time of day.
///
/// Date-only dues are treated as end-of-day when a reminder offset is
/// subtracted from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl DueDate {
    /// ISO 8601 string for the store ("2025-06-21" or "2025-06-21T15:30:00").
    pub fn to_iso(&self) -> String {
        match self {
            DueDate::Date(d) => d.format("%Y-%m-%d").to_string(),
            DueDate::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Parse a store value. A `T` separator marks a datetime.
    pub fn parse_iso(value: &str) -> Option<DueDate> {
        if value.contains('T') {
            let head = value.get(..19)?;
            NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(DueDate::DateTime)
        } else {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(DueDate::Date)
        }
    }
}

/// Filter for task listing.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub category: Option<Category>,
    pub status: Option<TaskStatus>,
}

/// Payload for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub due: DueDate,
}
