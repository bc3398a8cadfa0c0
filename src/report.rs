use std::fmt::Write;

use tracing::{info, warn};

use crate::error::ReportResult;
use crate::llm::{ChatMessage, TextGenerator};
use crate::models::{ActivityNotes, ReportTemplate, StudentProfile};

pub const SYSTEM_PERSONA: &str =
    "당신은 대한민국 최고의 입시컨설턴트로서 학생들의 자율활동 세특을 작성하는 전문가입니다.";

/// One `{label}: {text}` line per filled-in category, in category order.
pub fn format_activities(notes: &ActivityNotes) -> String {
    notes
        .non_empty()
        .map(|(category, text)| format!("{}: {}", category.label(), text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(
    profile: &StudentProfile,
    activity_block: &str,
    template: ReportTemplate,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "학생 정보: 이름: {}, 학급: {}",
        profile.name, profile.class
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "다음은 고등학교 1학년 학생의 자율활동 내용입니다:");
    let _ = writeln!(prompt, "{activity_block}");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "템플릿: {}", template.label());
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "위 정보를 바탕으로 자율활동 세부능력 및 특기사항을 작성해주세요."
    );
    let _ = writeln!(
        prompt,
        "학생의 자기주도성, 리더십, 공동체 의식, 문제해결 능력 등이 잘 드러나도록 작성해주세요."
    );
    let _ = writeln!(
        prompt,
        "구체적인 활동 내용과 그로 인한 성과, 학생의 성장을 포함해주세요."
    );
    let _ = writeln!(
        prompt,
        "제공된 템플릿의 스타일을 따라주세요. 단, 한 문단으로 표현해야 합니다."
    );
    let _ = writeln!(
        prompt,
        "모든 문장은 '-함.', '-음.', '-됨.' 등으로 끝나야 합니다."
    );
    let _ = writeln!(
        prompt,
        "최대한 미사여구를 많이 포함하도록 하세요. 학생의 이름과 '학생은'이라는 주어는 생략하세요."
    );

    prompt
}

/// Drafts report text through a [`TextGenerator`].
pub struct ReportRequester<G> {
    generator: G,
    model: String,
}

impl<G: TextGenerator> ReportRequester<G> {
    pub fn new(generator: G, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    pub(crate) fn generator(&self) -> &G {
        &self.generator
    }

    /// Single completion call; returns the draft with outer whitespace
    /// trimmed. Callers check that `notes` has at least one entry.
    pub async fn request(
        &self,
        profile: &StudentProfile,
        notes: &ActivityNotes,
        template: ReportTemplate,
    ) -> ReportResult<String> {
        let activity_block = format_activities(notes);
        let messages = [
            ChatMessage::system(SYSTEM_PERSONA),
            ChatMessage::user(build_prompt(profile, &activity_block, template)),
        ];

        match self.generator.complete(&self.model, &messages).await {
            Ok(text) => {
                let draft = text.trim().to_string();
                info!(
                    student_id = %profile.id,
                    template = template.key(),
                    chars = draft.chars().count(),
                    "report drafted"
                );
                Ok(draft)
            }
            Err(err) => {
                warn!(student_id = %profile.id, error = %err, "report drafting failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::llm::Role;
    use crate::models::ActivityCategory;
    use crate::testing::FakeGenerator;

    fn kim() -> StudentProfile {
        StudentProfile {
            id: "1001".to_string(),
            name: "Kim".to_string(),
            class: "1-3".to_string(),
        }
    }

    #[test]
    fn activity_block_keeps_non_empty_categories_in_order() {
        let notes = ActivityNotes::new()
            .with(ActivityCategory::CareerExploration, "진로 박람회 참가")
            .with(ActivityCategory::Community, "")
            .with(ActivityCategory::ClassAndSchool, "학급 부회장")
            .with(ActivityCategory::Other, "  ");

        assert_eq!(
            format_activities(&notes),
            "학급 및 학교 활동: 학급 부회장\n진로탐색 활동: 진로 박람회 참가"
        );
    }

    #[test]
    fn activity_block_lists_all_six_when_filled() {
        let mut notes = ActivityNotes::new();
        for category in ActivityCategory::ALL {
            notes.set(category, "내용");
        }
        let block = format_activities(&notes);
        let labels: Vec<&str> = block
            .lines()
            .map(|line| line.split(": ").next().unwrap())
            .collect();
        let expected: Vec<&str> = ActivityCategory::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn prompt_embeds_profile_block_template_and_style_rules() {
        let prompt = build_prompt(
            &kim(),
            "공동체 활동: 환경 캠페인 기획",
            ReportTemplate::OutcomeFocused,
        );

        assert!(prompt.contains("이름: Kim, 학급: 1-3"));
        assert!(prompt.contains("공동체 활동: 환경 캠페인 기획"));
        assert!(prompt.contains("템플릿: 성과중심형"));
        assert!(prompt.contains("단, 한 문단으로 표현해야 합니다."));
        assert!(prompt.contains("'-함.', '-음.', '-됨.'"));
        assert!(prompt.contains("'학생은'이라는 주어는 생략하세요."));
    }

    #[tokio::test]
    async fn request_sends_persona_then_prompt_and_trims() {
        let generator = FakeGenerator::replying("\n  창의적인 발상으로 학급 문화를 개선함.  \n");
        let requester = ReportRequester::new(generator, "gpt-4o-mini");
        let notes = ActivityNotes::new().with(ActivityCategory::SelfDirected, "독서 모임 운영");

        let draft = requester
            .request(&kim(), &notes, ReportTemplate::Summary)
            .await
            .unwrap();
        assert_eq!(draft, "창의적인 발상으로 학급 문화를 개선함.");

        let calls = requester.generator().calls();
        assert_eq!(calls.len(), 1);
        let (model, messages) = &calls[0];
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PERSONA);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("자기주도적 활동: 독서 모임 운영"));
        assert!(messages[1].content.contains("템플릿: 요약형"));
    }

    #[tokio::test]
    async fn generator_failure_passes_through() {
        let requester = ReportRequester::new(FakeGenerator::failing("quota exceeded"), "m");
        let notes = ActivityNotes::new().with(ActivityCategory::Other, "봉사");

        let err = requester
            .request(&kim(), &notes, ReportTemplate::Detailed)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::GenerationFailed { ref reason } if reason == "quota exceeded"));
    }
}
