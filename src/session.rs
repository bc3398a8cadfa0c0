use std::io::Read;

use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::export::{self, DocumentExporter};
use crate::llm::TextGenerator;
use crate::models::{ActivityNotes, ReportRecord, ReportTemplate, StudentProfile};
use crate::report::ReportRequester;
use crate::store::RecordStore;

/// An export ready to be handed to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// State and operations for one operator session.
///
/// Each session owns its record store; nothing is shared between sessions.
pub struct Session<G> {
    id: Uuid,
    store: RecordStore,
    requester: ReportRequester<G>,
    exporter: DocumentExporter,
    report_label: String,
}

impl<G: TextGenerator> Session<G> {
    pub fn new(
        requester: ReportRequester<G>,
        exporter: DocumentExporter,
        report_label: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(session_id = %id, model = requester.model(), "session started");
        Self {
            id,
            store: RecordStore::new(),
            requester,
            exporter,
            report_label: report_label.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn save_student(&mut self, id: &str, name: &str, class: &str) -> StudentProfile {
        let _span = info_span!("session", session_id = %self.id).entered();
        self.store.save_student(id, name, class)
    }

    pub fn import_roster<R: Read>(&mut self, source: R) -> anyhow::Result<usize> {
        let _span = info_span!("session", session_id = %self.id).entered();
        let applied = self.store.import_csv(source)?;
        info!(applied, "roster imported");
        Ok(applied)
    }

    /// Drafts a report for `student_id`.
    ///
    /// Rejected with `MissingInput` before any external call when the
    /// student is not registered or every category is blank.
    pub async fn draft_report(
        &self,
        student_id: &str,
        notes: &ActivityNotes,
        template: ReportTemplate,
    ) -> ReportResult<String> {
        let profile = self.store.student(student_id);
        let profile = match profile {
            Some(profile) if !notes.is_empty() => profile,
            _ => {
                warn!(session_id = %self.id, student_id, "draft request missing input");
                return Err(ReportError::missing_input(
                    "select a student and fill in at least one activity",
                ));
            }
        };

        info!(
            session_id = %self.id,
            student_id,
            template = template.key(),
            "requesting report draft"
        );
        self.requester.request(profile, notes, template).await
    }

    /// Stores the final (possibly edited) text, stamped with the current time.
    pub fn save_report(&mut self, student_id: &str, body: &str) -> ReportResult<ReportRecord> {
        let record = ReportRecord::now(body);
        self.store.append_report(student_id, record.clone())?;
        info!(
            session_id = %self.id,
            student_id,
            timestamp = %record.timestamp,
            "report saved"
        );
        Ok(record)
    }

    pub fn export_report_pdf(
        &self,
        student_id: &str,
        record: &ReportRecord,
    ) -> ReportResult<Download> {
        let profile = self.profile(student_id)?;
        let bytes = self
            .exporter
            .render_single_report_document(&profile.name, &record.body)?;

        Ok(Download {
            file_name: export::single_report_file_name(
                &profile.name,
                &self.report_label,
                &record.timestamp,
            ),
            mime: export::PDF_MIME,
            bytes,
        })
    }

    pub fn export_history_xlsx(&self, student_id: &str) -> ReportResult<Download> {
        let profile = self.profile(student_id)?;
        let reports = self.store.list_reports(student_id);
        if reports.is_empty() {
            return Err(ReportError::missing_input(format!(
                "no saved reports for {}",
                profile.name
            )));
        }

        let bytes = export::render_report_table_document(reports)?;
        info!(
            session_id = %self.id,
            student_id,
            reports = reports.len(),
            "report history exported"
        );

        Ok(Download {
            file_name: export::report_table_file_name(&profile.name, &self.report_label),
            mime: export::XLSX_MIME,
            bytes,
        })
    }

    fn profile(&self, student_id: &str) -> ReportResult<&StudentProfile> {
        self.store
            .student(student_id)
            .ok_or_else(|| ReportError::unknown_student(student_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::models::ActivityCategory;
    use crate::testing::FakeGenerator;

    fn session(generator: FakeGenerator) -> Session<FakeGenerator> {
        let exporter = DocumentExporter::new(&ExportConfig {
            font_path: "/nonexistent/NanumGothic.ttf".into(),
            ..ExportConfig::default()
        });
        Session::new(
            ReportRequester::new(generator, "gpt-4o-mini"),
            exporter,
            "자율활동세특",
        )
    }

    fn notes() -> ActivityNotes {
        ActivityNotes::new().with(ActivityCategory::Community, "환경 정화 봉사 기획")
    }

    fn calls(session: &Session<FakeGenerator>) -> usize {
        session.requester.generator().call_count()
    }

    #[tokio::test]
    async fn all_blank_categories_are_rejected_before_generation() {
        let mut session = session(FakeGenerator::replying("unused"));
        session.save_student("1001", "Kim", "1-3");

        let mut blank = ActivityNotes::new();
        for category in ActivityCategory::ALL {
            blank.set(category, "");
        }

        let err = session
            .draft_report("1001", &blank, ReportTemplate::Detailed)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingInput { .. }));
        assert_eq!(calls(&session), 0);
    }

    #[tokio::test]
    async fn unregistered_student_is_rejected_before_generation() {
        let session = session(FakeGenerator::replying("unused"));

        let err = session
            .draft_report("1001", &notes(), ReportTemplate::Detailed)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingInput { .. }));
        assert_eq!(calls(&session), 0);
    }

    #[tokio::test]
    async fn draft_then_save_appends_edited_text() {
        let mut session = session(FakeGenerator::replying(" 봉사 활동을 기획하고 주도함. "));
        session.save_student("1001", "Kim", "1-3");

        let draft = session
            .draft_report("1001", &notes(), ReportTemplate::Summary)
            .await
            .unwrap();
        assert_eq!(draft, "봉사 활동을 기획하고 주도함.");
        assert!(session.store().list_reports("1001").is_empty());

        let edited = format!("{draft} 공동체 의식이 돋보임.");
        let record = session.save_report("1001", &edited).unwrap();

        let reports = session.store().list_reports("1001");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0], record);
        assert_eq!(reports[0].body, edited);
    }

    #[tokio::test]
    async fn generation_failure_leaves_history_unchanged() {
        let mut session = session(FakeGenerator::failing("503 service unavailable"));
        session.save_student("1001", "Kim", "1-3");
        session.save_report("1001", "기존 세특").unwrap();
        let before = session.store().list_reports("1001").to_vec();

        let err = session
            .draft_report("1001", &notes(), ReportTemplate::OutcomeFocused)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::GenerationFailed { .. }));
        assert_eq!(session.store().list_reports("1001"), before.as_slice());
        assert_eq!(calls(&session), 1);
    }

    #[tokio::test]
    async fn retry_with_same_inputs_after_failure() {
        let generator = FakeGenerator::scripted(vec![
            Err(ReportError::generation("timeout")),
            Ok("두 번째 시도에서 생성됨.".to_string()),
        ]);
        let mut session = session(generator);
        session.save_student("1001", "Kim", "1-3");

        let notes = notes();
        assert!(session
            .draft_report("1001", &notes, ReportTemplate::Detailed)
            .await
            .is_err());
        let draft = session
            .draft_report("1001", &notes, ReportTemplate::Detailed)
            .await
            .unwrap();
        assert_eq!(draft, "두 번째 시도에서 생성됨.");
        assert_eq!(calls(&session), 2);
    }

    #[test]
    fn save_report_for_unknown_student_is_rejected() {
        let mut session = session(FakeGenerator::replying("unused"));
        let err = session.save_report("404", "본문").unwrap_err();
        assert!(matches!(err, ReportError::UnknownStudent { .. }));
        assert!(session.store().student("404").is_none());
    }

    #[test]
    fn history_export_names_file_after_student() {
        let mut session = session(FakeGenerator::replying("unused"));
        session.save_student("1001", "Kim", "1-3");
        session.save_report("1001", "첫 번째").unwrap();
        session.save_report("1001", "두 번째").unwrap();

        let download = session.export_history_xlsx("1001").unwrap();
        assert_eq!(download.file_name, "Kim_all_자율활동세특.xlsx");
        assert_eq!(download.mime, export::XLSX_MIME);
        assert!(download.bytes.starts_with(b"PK"));
    }

    #[test]
    fn history_export_requires_saved_reports() {
        let mut session = session(FakeGenerator::replying("unused"));
        session.save_student("1001", "Kim", "1-3");

        assert!(matches!(
            session.export_history_xlsx("1001"),
            Err(ReportError::MissingInput { .. })
        ));
        assert!(matches!(
            session.export_history_xlsx("2002"),
            Err(ReportError::UnknownStudent { .. })
        ));
    }

    #[test]
    fn pdf_export_failure_is_reported_not_panicked() {
        let mut session = session(FakeGenerator::replying("unused"));
        session.save_student("1001", "Kim", "1-3");
        let record = session.save_report("1001", "본문").unwrap();

        let err = session.export_report_pdf("1001", &record).unwrap_err();
        assert!(matches!(err, ReportError::RenderFailed { .. }));
    }

    #[test]
    fn sessions_do_not_share_records() {
        let mut first = session(FakeGenerator::replying("unused"));
        let second = session(FakeGenerator::replying("unused"));
        first.save_student("1001", "Kim", "1-3");

        assert_ne!(first.id(), second.id());
        assert!(second.store().student("1001").is_none());
    }

    #[test]
    fn roster_import_goes_through_session_store() {
        let mut session = session(FakeGenerator::replying("unused"));
        let applied = session
            .import_roster("id,name,class\n1001,Kim,1-3\n".as_bytes())
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(session.store().student("1001").unwrap().class, "1-3");
    }
}
