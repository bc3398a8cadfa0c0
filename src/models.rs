use std::collections::BTreeMap;

use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub timestamp: String,
    pub body: String,
}

impl ReportRecord {
    pub fn new(body: impl Into<String>, created_at: DateTime<Local>) -> Self {
        Self {
            timestamp: created_at.format(TIMESTAMP_FORMAT).to_string(),
            body: body.into(),
        }
    }

    pub fn now(body: impl Into<String>) -> Self {
        Self::new(body, Local::now())
    }
}

/// Activity types the operator fills in. Declaration order is the order
/// used when the notes are formatted for the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActivityCategory {
    ClassAndSchool,
    SelfDirected,
    Community,
    CreativeProblemSolving,
    CareerExploration,
    Other,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 6] = [
        ActivityCategory::ClassAndSchool,
        ActivityCategory::SelfDirected,
        ActivityCategory::Community,
        ActivityCategory::CreativeProblemSolving,
        ActivityCategory::CareerExploration,
        ActivityCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ClassAndSchool => "학급 및 학교 활동",
            Self::SelfDirected => "자기주도적 활동",
            Self::Community => "공동체 활동",
            Self::CreativeProblemSolving => "창의적 문제해결 활동",
            Self::CareerExploration => "진로탐색 활동",
            Self::Other => "기타 활동",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportTemplate {
    #[default]
    Detailed,
    Summary,
    OutcomeFocused,
}

impl ReportTemplate {
    pub const ALL: [ReportTemplate; 3] = [
        ReportTemplate::Detailed,
        ReportTemplate::Summary,
        ReportTemplate::OutcomeFocused,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Detailed => "detailed",
            Self::Summary => "summary",
            Self::OutcomeFocused => "outcome-focused",
        }
    }

    /// Label embedded in the prompt.
    pub fn label(self) -> &'static str {
        match self {
            Self::Detailed => "상세형",
            Self::Summary => "요약형",
            Self::OutcomeFocused => "성과중심형",
        }
    }
}

/// Free-text notes for one report request, keyed by category.
#[derive(Debug, Clone, Default)]
pub struct ActivityNotes {
    entries: BTreeMap<ActivityCategory, String>,
}

impl ActivityNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: ActivityCategory, text: impl Into<String>) {
        self.entries.insert(category, text.into());
    }

    #[cfg(test)]
    pub fn with(mut self, category: ActivityCategory, text: impl Into<String>) -> Self {
        self.set(category, text);
        self
    }

    /// Categories with non-blank text, in category order.
    pub fn non_empty(&self) -> impl Iterator<Item = (ActivityCategory, &str)> {
        self.entries
            .iter()
            .map(|(category, text)| (*category, text.trim()))
            .filter(|(_, text)| !text.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty().next().is_none()
    }
}
