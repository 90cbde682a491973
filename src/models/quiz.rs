// src/models/quiz.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::user::Role,
    utils::{
        extract::{canonical_id, validate_not_blank},
        html::clean_html,
    },
};

/// One selectable answer. Ids are unique within their question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: Uuid,
    pub text: String,
}

/// A multiple-choice question embedded in a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<QuizOption>,
    /// Always the id of exactly one entry in `options`.
    pub correct_option_id: Uuid,
    #[serde(default)]
    pub explanation: String,
    pub points: i32,
}

/// Represents the 'quizzes' table. Questions are stored as an embedded JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub course_id: Uuid,
    pub created_by: Uuid,
    /// Order matters: the index is what reviewers see.
    pub questions: Vec<Question>,
    pub time_limit_minutes: Option<i32>,
    /// One-way latch, see [`Quiz::apply_update`].
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question as shown to viewers who must not see the answer key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub explanation: String,
    pub points: i32,
}

/// Quiz with every `correctOptionId` removed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: Uuid,
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub course_id: Uuid,
    pub created_by: Uuid,
    pub questions: Vec<PublicQuestion>,
    pub time_limit_minutes: Option<i32>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role-dependent rendering of a quiz.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuizView {
    Full(Quiz),
    Redacted(PublicQuiz),
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            slug: quiz.slug.clone(),
            description: quiz.description.clone(),
            course_id: quiz.course_id,
            created_by: quiz.created_by,
            questions: quiz
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    text: q.text.clone(),
                    options: q.options.clone(),
                    explanation: q.explanation.clone(),
                    points: q.points,
                })
                .collect(),
            time_limit_minutes: quiz.time_limit_minutes,
            published: quiz.published,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        }
    }
}

/// Derives the view a viewer with `role` may see. The input is never modified.
pub fn redact(quiz: &Quiz, role: Role) -> QuizView {
    if role.is_privileged() {
        QuizView::Full(quiz.clone())
    } else {
        QuizView::Redacted(PublicQuiz::from(quiz))
    }
}

// ---------------------------------------------------------------------------
// Authoring input
// ---------------------------------------------------------------------------

/// Option as supplied by the author. Missing ids are generated server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionInput {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub correct_option_id: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub points: Option<i32>,
}

/// Per-question validation failure. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionError {
    pub index: usize,
    pub reason: String,
}

impl QuestionError {
    fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Turns author input into stored questions, enforcing the answer-key invariant.
///
/// Option ids are generated before the `correctOptionId` check runs, so the
/// reference must match a final id. Nothing is returned on the first failure.
pub fn build_questions(inputs: &[QuestionInput]) -> Result<Vec<Question>, QuestionError> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| build_question(i + 1, input))
        .collect()
}

fn build_question(index: usize, input: &QuestionInput) -> Result<Question, QuestionError> {
    if input.text.trim().is_empty() || input.options.len() < 2 {
        return Err(QuestionError::new(
            index,
            "must have text and at least 2 options",
        ));
    }

    let mut options = Vec::with_capacity(input.options.len());
    let mut seen = HashSet::new();
    for (n, opt) in input.options.iter().enumerate() {
        if opt.text.trim().is_empty() {
            return Err(QuestionError::new(
                index,
                format!("option #{} must have text", n + 1),
            ));
        }
        let id = match opt.id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Uuid::parse_str(raw).map_err(|_| {
                QuestionError::new(index, "option id must be a valid identifier if provided")
            })?,
            _ => Uuid::new_v4(),
        };
        if !seen.insert(id) {
            return Err(QuestionError::new(index, "has duplicate option ids"));
        }
        options.push(QuizOption {
            id,
            text: clean_html(&opt.text),
        });
    }

    let correct_option_id = input
        .correct_option_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| QuestionError::new(index, "has invalid correctOptionId"))?;

    if !options.iter().any(|o| o.id == correct_option_id) {
        return Err(QuestionError::new(
            index,
            "correctOptionId must reference one of its options",
        ));
    }

    let points = input.points.unwrap_or(1);
    if points < 0 {
        return Err(QuestionError::new(index, "points must not be negative"));
    }

    Ok(Question {
        id: Uuid::new_v4(),
        text: clean_html(&input.text),
        options,
        correct_option_id,
        explanation: input
            .explanation
            .as_deref()
            .map(clean_html)
            .unwrap_or_default(),
        points,
    })
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: Option<String>,
    pub course_id: String,
    #[validate(length(min = 1, max = 200, message = "at least one question is required"))]
    pub questions: Vec<QuestionInput>,
    #[validate(range(min = 1, max = 1440))]
    #[serde(default)]
    pub time_limit_minutes: Option<i32>,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// DTO for updating a quiz. Only these fields can change; anything else in
/// the body (owner, course, id) is ignored.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_time_limit))]
pub struct UpdateQuizRequest {
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    /// `null` clears the limit, absence leaves it untouched.
    #[serde(default, deserialize_with = "double_option")]
    pub time_limit_minutes: Option<Option<i32>>,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    /// Accepted for compatibility; the stored value is always forced to `true`.
    pub published: Option<bool>,
    /// Replacement questions follow the same rules as on create.
    #[validate(length(min = 1, max = 200, message = "at least one question is required"))]
    pub questions: Option<Vec<QuestionInput>>,
}

/// A replacement limit must be 1..=1440 minutes; `null` is still allowed.
fn validate_time_limit(req: &UpdateQuizRequest) -> Result<(), validator::ValidationError> {
    match req.time_limit_minutes {
        Some(Some(limit)) if !(1..=1440).contains(&limit) => {
            let mut err = validator::ValidationError::new("range");
            err.message = Some("timeLimitMinutes must be between 1 and 1440".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// A validated update, ready to apply.
#[derive(Debug, Default)]
pub struct QuizPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_limit_minutes: Option<Option<i32>>,
    pub slug: Option<String>,
    pub questions: Option<Vec<Question>>,
}

impl Quiz {
    /// Applies an allow-listed patch, then latches `published` to `true`.
    ///
    /// The latch runs on every update, including ones that never mention
    /// `published`; once any update has executed the quiz cannot be unpublished.
    pub fn apply_update(&mut self, patch: QuizPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(limit) = patch.time_limit_minutes {
            self.time_limit_minutes = limit;
        }
        if let Some(slug) = patch.slug {
            self.slug = Some(slug);
        }
        if let Some(questions) = patch.questions {
            self.questions = questions;
        }
        self.published = true;
        self.updated_at = Utc::now();
    }

    /// Whether a viewer may see this quiz at all.
    pub fn visible_to(&self, viewer: Uuid, role: Role) -> bool {
        self.published || self.created_by == viewer || role == Role::Admin
    }
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// One submitted answer. Ids are compared in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    #[serde(default)]
    pub selected_option_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(max = 1000))]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub question_id: String,
    pub correct: bool,
    /// Disclosed for every known question, right or wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeResult {
    /// Number of correct answers submitted.
    pub score: usize,
    /// Number of questions in the quiz, not answers submitted.
    pub total: usize,
    pub feedback: Vec<AnswerFeedback>,
}

/// Scores answers against the quiz's answer key. Pure: nothing is persisted.
///
/// Unknown question ids yield an incorrect entry with no disclosure. Unanswered
/// questions get no entry. Every matching answer counts, so repeating a
/// correct answer scores it again.
pub fn grade(quiz: &Quiz, answers: &[SubmittedAnswer]) -> GradeResult {
    let mut score = 0;
    let mut feedback = Vec::with_capacity(answers.len());

    for answer in answers {
        let question_id = canonical_id(&answer.question_id);
        let Some(question) = quiz
            .questions
            .iter()
            .find(|q| q.id.to_string() == question_id)
        else {
            feedback.push(AnswerFeedback {
                question_id: answer.question_id.clone(),
                correct: false,
                correct_option_id: None,
            });
            continue;
        };

        let correct = answer
            .selected_option_id
            .as_deref()
            .map(canonical_id)
            .is_some_and(|selected| selected == question.correct_option_id.to_string());

        if correct {
            score += 1;
        }

        feedback.push(AnswerFeedback {
            question_id: question.id.to_string(),
            correct,
            correct_option_id: Some(question.correct_option_id),
        });
    }

    GradeResult {
        score,
        total: quiz.questions.len(),
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: Uuid, text: &str) -> OptionInput {
        OptionInput {
            id: Some(id.to_string()),
            text: text.to_string(),
        }
    }

    fn question_input(correct: Option<String>, options: Vec<OptionInput>) -> QuestionInput {
        QuestionInput {
            text: "What is 2 + 2?".to_string(),
            options,
            correct_option_id: correct,
            explanation: None,
            points: None,
        }
    }

    fn sample_quiz() -> (Quiz, [Uuid; 4]) {
        let (a1, b1, a2, b2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let q = |correct: Uuid, a: Uuid, b: Uuid| Question {
            id: Uuid::new_v4(),
            text: "Pick one".to_string(),
            options: vec![
                QuizOption { id: a, text: "A".to_string() },
                QuizOption { id: b, text: "B".to_string() },
            ],
            correct_option_id: correct,
            explanation: String::new(),
            points: 1,
        };
        let quiz = Quiz {
            id: Uuid::new_v4(),
            title: "JS Basics".to_string(),
            slug: Some("js-basics".to_string()),
            description: String::new(),
            course_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            questions: vec![q(a1, a1, b1), q(b2, a2, b2)],
            time_limit_minutes: None,
            published: false,
            created_at: now,
            updated_at: now,
        };
        (quiz, [a1, b1, a2, b2])
    }

    #[test]
    fn generated_option_ids_precede_key_check() {
        // Caller omits the id of the second option but references the first.
        let a = Uuid::new_v4();
        let inputs = vec![question_input(
            Some(a.to_string()),
            vec![
                option(a, "4"),
                OptionInput { id: None, text: "5".to_string() },
            ],
        )];
        let questions = build_questions(&inputs).unwrap();
        assert_eq!(questions[0].correct_option_id, a);
        assert_eq!(questions[0].options.len(), 2);
        assert_ne!(questions[0].options[1].id, a);
        assert_eq!(questions[0].points, 1);
    }

    #[test]
    fn key_outside_option_set_is_rejected_with_index() {
        let a = Uuid::new_v4();
        let valid = question_input(
            Some(a.to_string()),
            vec![option(a, "4"), option(Uuid::new_v4(), "5")],
        );
        let stray = question_input(
            Some(Uuid::new_v4().to_string()),
            vec![option(Uuid::new_v4(), "4"), option(Uuid::new_v4(), "5")],
        );
        let err = build_questions(&[valid, stray]).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(err.reason.contains("correctOptionId"));
    }

    #[test]
    fn structural_failures() {
        let a = Uuid::new_v4();

        let one_option = question_input(Some(a.to_string()), vec![option(a, "4")]);
        assert_eq!(
            build_questions(&[one_option]).unwrap_err().reason,
            "must have text and at least 2 options"
        );

        let bad_key = question_input(
            Some("not-an-id".to_string()),
            vec![option(a, "4"), option(Uuid::new_v4(), "5")],
        );
        assert_eq!(
            build_questions(&[bad_key]).unwrap_err().reason,
            "has invalid correctOptionId"
        );

        let missing_key = question_input(None, vec![option(a, "4"), option(Uuid::new_v4(), "5")]);
        assert_eq!(
            build_questions(&[missing_key]).unwrap_err().reason,
            "has invalid correctOptionId"
        );

        let duplicate = question_input(Some(a.to_string()), vec![option(a, "4"), option(a, "5")]);
        assert_eq!(
            build_questions(&[duplicate]).unwrap_err().reason,
            "has duplicate option ids"
        );

        let bad_option_id = question_input(
            Some(a.to_string()),
            vec![
                option(a, "4"),
                OptionInput { id: Some("zzz".to_string()), text: "5".to_string() },
            ],
        );
        assert!(build_questions(&[bad_option_id]).is_err());
    }

    #[test]
    fn redaction_strips_keys_for_students_only() {
        let (quiz, _) = sample_quiz();

        let student = serde_json::to_value(redact(&quiz, Role::Student)).unwrap();
        for q in student["questions"].as_array().unwrap() {
            assert!(q.get("correctOptionId").is_none());
            assert_eq!(q["options"].as_array().unwrap().len(), 2);
        }

        let instructor = serde_json::to_value(redact(&quiz, Role::Instructor)).unwrap();
        for q in instructor["questions"].as_array().unwrap() {
            assert!(q.get("correctOptionId").is_some());
        }

        // The source document keeps its key.
        assert!(quiz.questions.iter().all(|q| !q.correct_option_id.is_nil()));
    }

    #[test]
    fn grading_counts_matches_and_discloses_key() {
        let (quiz, [a1, _b1, a2, b2]) = sample_quiz();
        let answers = vec![
            SubmittedAnswer {
                question_id: quiz.questions[0].id.to_string(),
                selected_option_id: Some(a1.to_string()),
            },
            SubmittedAnswer {
                question_id: quiz.questions[1].id.to_string(),
                selected_option_id: Some(a2.to_string()),
            },
        ];

        let result = grade(&quiz, &answers);
        assert_eq!(result.score, 1);
        assert_eq!(result.total, 2);
        assert!(result.feedback[0].correct);
        assert!(!result.feedback[1].correct);
        assert_eq!(result.feedback[1].correct_option_id, Some(b2));
    }

    #[test]
    fn grading_handles_unknown_partial_and_duplicate_answers() {
        let (quiz, [a1, ..]) = sample_quiz();
        let first = quiz.questions[0].id.to_string().to_uppercase();
        let answers = vec![
            SubmittedAnswer {
                question_id: "ghost".to_string(),
                selected_option_id: Some(a1.to_string()),
            },
            SubmittedAnswer {
                question_id: first.clone(),
                selected_option_id: Some(a1.to_string().to_uppercase()),
            },
            SubmittedAnswer {
                question_id: first,
                selected_option_id: Some(a1.to_string()),
            },
        ];

        let result = grade(&quiz, &answers);
        assert_eq!(result.total, 2);
        assert_eq!(result.score, 2);
        assert_eq!(result.feedback.len(), 3);
        assert!(!result.feedback[0].correct);
        assert_eq!(result.feedback[0].correct_option_id, None);
        assert!(result.feedback[1].correct);
        assert!(result.feedback[2].correct);
    }

    #[test]
    fn score_agrees_with_feedback_when_a_question_is_retried() {
        let (quiz, [a1, b1, ..]) = sample_quiz();
        let question_id = quiz.questions[0].id.to_string();
        let answers = vec![
            SubmittedAnswer {
                question_id: question_id.clone(),
                selected_option_id: Some(b1.to_string()),
            },
            SubmittedAnswer {
                question_id,
                selected_option_id: Some(a1.to_string()),
            },
        ];

        let result = grade(&quiz, &answers);
        let marked_correct = result.feedback.iter().filter(|f| f.correct).count();
        assert_eq!(result.score, 1);
        assert_eq!(result.score, marked_correct);
    }

    #[test]
    fn every_update_latches_published() {
        let (mut quiz, _) = sample_quiz();
        assert!(!quiz.published);
        quiz.apply_update(QuizPatch {
            description: Some("unrelated".to_string()),
            ..Default::default()
        });
        assert!(quiz.published);
        assert_eq!(quiz.description, "unrelated");
    }

    #[test]
    fn update_request_distinguishes_null_from_absent_limit() {
        let cleared: UpdateQuizRequest =
            serde_json::from_value(serde_json::json!({ "timeLimitMinutes": null })).unwrap();
        assert_eq!(cleared.time_limit_minutes, Some(None));

        let untouched: UpdateQuizRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(untouched.time_limit_minutes, None);
    }

    #[test]
    fn update_request_enforces_create_rules() {
        let parse = |body: serde_json::Value| -> UpdateQuizRequest {
            serde_json::from_value(body).unwrap()
        };

        assert!(parse(serde_json::json!({ "questions": [] })).validate().is_err());
        assert!(parse(serde_json::json!({ "timeLimitMinutes": -5 })).validate().is_err());
        assert!(parse(serde_json::json!({ "timeLimitMinutes": 0 })).validate().is_err());
        assert!(parse(serde_json::json!({ "timeLimitMinutes": 30 })).validate().is_ok());
        assert!(parse(serde_json::json!({ "timeLimitMinutes": null })).validate().is_ok());
        assert!(parse(serde_json::json!({ "title": "Only a title" })).validate().is_ok());
    }
}
