use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};
use crate::models::{ReportRecord, StudentProfile};

/// Session-lifetime student profiles and their saved reports.
///
/// Saving a profile under an existing id overwrites it; no history is kept.
/// Reports are append-only and can only be attached to a known id.
#[derive(Debug, Default)]
pub struct RecordStore {
    students: BTreeMap<String, StudentProfile>,
    reports: HashMap<String, Vec<ReportRecord>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_student(&mut self, id: &str, name: &str, class: &str) -> StudentProfile {
        let profile = StudentProfile {
            id: id.to_string(),
            name: name.to_string(),
            class: class.to_string(),
        };
        let replaced = self
            .students
            .insert(id.to_string(), profile.clone())
            .is_some();
        info!(student_id = id, replaced, "student saved");
        profile
    }

    pub fn student(&self, id: &str) -> Option<&StudentProfile> {
        self.students.get(id)
    }

    /// Profiles ordered by id.
    pub fn list_students(&self) -> Vec<&StudentProfile> {
        self.students.values().collect()
    }

    pub fn append_report(&mut self, id: &str, record: ReportRecord) -> ReportResult<()> {
        if !self.students.contains_key(id) {
            return Err(ReportError::unknown_student(id));
        }
        let reports = self.reports.entry(id.to_string()).or_default();
        reports.push(record);
        debug!(student_id = id, count = reports.len(), "report appended");
        Ok(())
    }

    pub fn list_reports(&self, id: &str) -> &[ReportRecord] {
        self.reports.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Loads `id,name,class` rows, saving each one in order.
    pub fn import_csv<R: Read>(&mut self, source: R) -> anyhow::Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            id: String,
            name: String,
            class: String,
        }

        let mut reader = csv::Reader::from_reader(source);
        let mut applied = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            self.save_student(row.id.trim(), row.name.trim(), row.class.trim());
            applied += 1;
        }

        Ok(applied)
    }
}
