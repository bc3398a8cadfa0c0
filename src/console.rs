use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::error::ReportError;
use crate::llm::TextGenerator;
use crate::models::{ActivityCategory, ActivityNotes, ReportTemplate};
use crate::session::{Download, Session};

/// Interactive menu driving one [`Session`].
pub struct Console<R, W> {
    input: R,
    output: W,
    output_dir: PathBuf,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output,
            output_dir: output_dir.into(),
        }
    }

    pub async fn run<G: TextGenerator>(&mut self, session: &mut Session<G>) -> anyhow::Result<()> {
        writeln!(self.output, "Activity report writer (session {})", session.id())?;
        writeln!(self.output, "Downloads go to {}\n", self.output_dir.display())?;

        loop {
            writeln!(
                self.output,
                "Modes: [1] Student profiles  [2] Generate report  [3] Report history  [q] Quit"
            )?;
            let Some(choice) = self.read_line("mode")? else {
                break;
            };

            match choice.trim() {
                "1" => self.profiles(session)?,
                "2" => self.generate(session).await?,
                "3" => self.history(session)?,
                "q" | "quit" | "exit" => break,
                "" => continue,
                other => writeln!(self.output, "Unknown mode '{other}'.")?,
            }
            writeln!(self.output)?;
        }

        writeln!(self.output, "Goodbye")?;
        Ok(())
    }

    fn profiles<G: TextGenerator>(&mut self, session: &mut Session<G>) -> anyhow::Result<()> {
        writeln!(self.output, "\n== Student profiles ==")?;
        self.print_students(session)?;
        writeln!(
            self.output,
            "[a] add or update a student  [i] import a CSV roster  (blank to go back)"
        )?;

        match self.read_line("action")?.as_deref().map(str::trim) {
            Some("a") => self.add_student(session),
            Some("i") => self.import_roster(session),
            Some("") | None => Ok(()),
            Some(other) => {
                writeln!(self.output, "Unknown action '{other}'.")?;
                Ok(())
            }
        }
    }

    fn add_student<G: TextGenerator>(&mut self, session: &mut Session<G>) -> anyhow::Result<()> {
        let Some(name) = self.read_line("student name")? else {
            return Ok(());
        };
        let Some(id) = self.read_line("student id")? else {
            return Ok(());
        };
        let Some(class) = self.read_line("class")? else {
            return Ok(());
        };

        session.save_student(id.trim(), name.trim(), class.trim());
        writeln!(self.output, "Student saved.")?;
        self.print_students(session)
    }

    fn import_roster<G: TextGenerator>(&mut self, session: &mut Session<G>) -> anyhow::Result<()> {
        let Some(path) = self.read_line("roster path")? else {
            return Ok(());
        };
        let path = Path::new(path.trim());
        match import_roster_file(session, path) {
            Ok(applied) => writeln!(self.output, "Imported {applied} students.")?,
            Err(e) => writeln!(self.output, "Import failed: {e:#}")?,
        }
        self.print_students(session)
    }

    async fn generate<G: TextGenerator>(
        &mut self,
        session: &mut Session<G>,
    ) -> anyhow::Result<()> {
        writeln!(self.output, "\n== Generate report ==")?;
        if session.store().list_students().is_empty() {
            writeln!(self.output, "No students registered yet.")?;
            return Ok(());
        }
        self.print_students(session)?;

        let Some(student_id) = self.read_line("student id")? else {
            return Ok(());
        };
        let student_id = student_id.trim().to_string();

        writeln!(self.output, "Activity notes (blank to skip a category):")?;
        let mut notes = ActivityNotes::new();
        for category in ActivityCategory::ALL {
            let text = self.read_line(category.label())?.unwrap_or_default();
            notes.set(category, text);
        }

        let template = self.choose_template()?;

        let body = loop {
            let draft = match session.draft_report(&student_id, &notes, template).await {
                Ok(draft) => draft,
                Err(err @ ReportError::GenerationFailed { .. }) => {
                    writeln!(self.output, "Error: {err}")?;
                    if self.confirm("Retry with the same inputs? [y/N]")? {
                        continue;
                    }
                    return Ok(());
                }
                Err(err) => {
                    writeln!(self.output, "Warning: {err}")?;
                    return Ok(());
                }
            };

            writeln!(self.output, "\nGenerated report:\n{draft}\n")?;
            writeln!(
                self.output,
                "[a] accept  [e] edit  [r] regenerate  [d] discard"
            )?;
            match self.read_line("choice")?.as_deref().map(str::trim) {
                Some("a") | Some("") => break draft,
                Some("e") => {
                    let edited = self.read_block(
                        "Enter the revised report, finish with a line containing only '.'",
                    )?;
                    if edited.trim().is_empty() {
                        writeln!(self.output, "Empty report discarded.")?;
                        return Ok(());
                    }
                    break edited;
                }
                Some("r") => continue,
                _ => {
                    writeln!(self.output, "Draft discarded.")?;
                    return Ok(());
                }
            }
        };

        let record = match session.save_report(&student_id, &body) {
            Ok(record) => record,
            Err(err) => {
                writeln!(self.output, "Warning: {err}")?;
                return Ok(());
            }
        };
        writeln!(self.output, "Report saved at {}.", record.timestamp)?;

        match session.export_report_pdf(&student_id, &record) {
            Ok(download) => self.deliver(&download)?,
            Err(err) => writeln!(self.output, "Error: {err}")?,
        }
        Ok(())
    }

    fn history<G: TextGenerator>(&mut self, session: &Session<G>) -> anyhow::Result<()> {
        writeln!(self.output, "\n== Report history ==")?;
        self.print_students(session)?;
        let Some(student_id) = self.read_line("student id")? else {
            return Ok(());
        };
        let student_id = student_id.trim();

        if session.store().student(student_id).is_none() {
            writeln!(self.output, "Warning: {}", ReportError::unknown_student(student_id))?;
            return Ok(());
        }

        let reports = session.store().list_reports(student_id).to_vec();
        if reports.is_empty() {
            writeln!(self.output, "No saved reports.")?;
            return Ok(());
        }

        for (index, record) in reports.iter().enumerate() {
            writeln!(self.output, "[{}] {}", index + 1, record.timestamp)?;
            writeln!(self.output, "{}\n", record.body)?;
        }

        loop {
            writeln!(self.output, "'pdf <n>' exports one report, 'xlsx' exports all, 'back' returns.")?;
            let Some(command) = self.read_line("history")? else {
                return Ok(());
            };
            let command = command.trim();

            let result = if command == "xlsx" {
                session.export_history_xlsx(student_id)
            } else if let Some(number) = command.strip_prefix("pdf ") {
                match number
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| reports.get(index))
                {
                    Some(record) => session.export_report_pdf(student_id, record),
                    None => {
                        writeln!(self.output, "No report numbered '{}'.", number.trim())?;
                        continue;
                    }
                }
            } else if command == "back" || command.is_empty() {
                return Ok(());
            } else {
                writeln!(self.output, "Unknown command '{command}'.")?;
                continue;
            };

            match result {
                Ok(download) => self.deliver(&download)?,
                Err(err) => writeln!(self.output, "Error: {err}")?,
            }
        }
    }

    /// Writes a download into the output directory. Write failures are
    /// shown and the session continues.
    fn deliver(&mut self, download: &Download) -> anyhow::Result<()> {
        match write_download(&self.output_dir, download) {
            Ok(path) => {
                info!(file = %path.display(), mime = download.mime, "download written");
                writeln!(
                    self.output,
                    "Saved {} ({}, {} bytes).",
                    path.display(),
                    download.mime,
                    download.bytes.len()
                )?;
            }
            Err(e) => {
                warn!(error = %e, "download could not be written");
                writeln!(self.output, "Error: {e:#}")?;
            }
        }
        Ok(())
    }

    fn print_students<G: TextGenerator>(&mut self, session: &Session<G>) -> anyhow::Result<()> {
        let students = session.store().list_students();
        if students.is_empty() {
            writeln!(self.output, "(no students registered)")?;
            return Ok(());
        }
        writeln!(self.output, "{:<10} {:<16} {}", "id", "name", "class")?;
        for profile in students {
            writeln!(
                self.output,
                "{:<10} {:<16} {}",
                profile.id, profile.name, profile.class
            )?;
        }
        Ok(())
    }

    fn choose_template(&mut self) -> anyhow::Result<ReportTemplate> {
        for (index, template) in ReportTemplate::ALL.iter().enumerate() {
            writeln!(
                self.output,
                "[{}] {} ({})",
                index + 1,
                template.key(),
                template.label()
            )?;
        }
        let choice = self.read_line("template [1]")?.unwrap_or_default();
        let template = choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| ReportTemplate::ALL.get(index).copied())
            .unwrap_or_default();
        Ok(template)
    }

    fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        let answer = self.read_line(question)?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    fn read_block(&mut self, instructions: &str) -> anyhow::Result<String> {
        writeln!(self.output, "{instructions}")?;
        let mut lines = Vec::new();
        while let Some(line) = self.read_line(">")? {
            if line.trim() == "." {
                break;
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    /// `None` at end of input. Lines that are not UTF-8 are rejected and
    /// the prompt is repeated.
    fn read_line(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        let mut buf = Vec::new();
        loop {
            write!(self.output, "{label}: ")?;
            self.output.flush()?;

            buf.clear();
            if self.input.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            match std::str::from_utf8(&buf) {
                Ok(line) => {
                    return Ok(Some(
                        line.trim_end_matches(|c| c == '\n' || c == '\r').to_string(),
                    ))
                }
                Err(e) => {
                    warn!(error = %e, "discarded input line that is not UTF-8");
                    writeln!(
                        self.output,
                        "\nWarning: input was not valid UTF-8; set the terminal to UTF-8 and try again."
                    )?;
                }
            }
        }
    }
}

pub fn import_roster_file<G: TextGenerator>(
    session: &mut Session<G>,
    path: &Path,
) -> anyhow::Result<usize> {
    let file =
        File::open(path).with_context(|| format!("failed to open roster {}", path.display()))?;
    session
        .import_roster(file)
        .with_context(|| format!("failed to import roster {}", path.display()))
}

fn write_download(dir: &Path, download: &Download) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(&download.file_name);
    std::fs::write(&path, &download.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
