// src/models/question.rs

use serde::{Deserialize, Serialize, Serializer};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;

/// Placeholder shown to viewers who must not see which choice is correct.
pub const MASKED_CORRECTNESS: &str = "****";

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    /// Order of the question inside its exam.
    pub position: i32,
    /// Structured body stored as JSONB.
    pub body: Json<QuestionBody>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Multiple choice.
    Mcq,
    Coding,
}

/// The structured body of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionBody {
    pub desc: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub grade: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Choice {
    pub desc: String,
    #[serde(rename = "isCorrect")]
    #[schema(value_type = bool)]
    pub is_correct: Correctness,
}

/// Whether a choice is correct, or hidden from the current viewer.
///
/// Deserializes from a plain boolean. `Masked` serializes as `"****"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "bool")]
pub enum Correctness {
    Known(bool),
    Masked,
}

impl From<bool> for Correctness {
    fn from(value: bool) -> Self {
        Correctness::Known(value)
    }
}

impl Serialize for Correctness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Correctness::Known(value) => serializer.serialize_bool(*value),
            Correctness::Masked => serializer.serialize_str(MASKED_CORRECTNESS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

impl QuestionBody {
    /// Hides which choices are correct.
    pub fn redact(&mut self) {
        for choice in &mut self.choices {
            choice.is_correct = Correctness::Masked;
        }
    }
}

/// Outgoing question: the id plus the flattened body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: i64,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            body: question.body.0,
        }
    }
}

/// Custom validator for the `questions` array of exam create/update requests.
pub fn validate_questions(questions: &[QuestionBody]) -> Result<(), validator::ValidationError> {
    if questions.len() > 200 {
        return Err(validator::ValidationError::new("too_many_questions"));
    }

    for question in questions {
        if question.desc.trim().is_empty() || question.desc.len() > 10_000 {
            return Err(validator::ValidationError::new("invalid_question_desc"));
        }
        if question.grade < 1 {
            return Err(validator::ValidationError::new("grade_must_be_positive"));
        }

        match question.kind {
            QuestionKind::Mcq => {
                if question.choices.len() < 2 {
                    return Err(validator::ValidationError::new("mcq_needs_two_choices"));
                }
                if question.choices.iter().any(|c| c.desc.trim().is_empty() || c.desc.len() > 1000) {
                    return Err(validator::ValidationError::new("invalid_choice_desc"));
                }
                if !question
                    .choices
                    .iter()
                    .any(|c| c.is_correct == Correctness::Known(true))
                {
                    return Err(validator::ValidationError::new("mcq_needs_correct_choice"));
                }
            }
            QuestionKind::Coding => {
                if !question.choices.is_empty() {
                    return Err(validator::ValidationError::new("coding_question_has_choices"));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mcq() -> QuestionBody {
        serde_json::from_value(json!({
            "desc": "Which planet is largest?",
            "type": "mcq",
            "grade": 2,
            "choices": [
                {"desc": "Mars", "isCorrect": false},
                {"desc": "Jupiter", "isCorrect": true}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn redact_masks_every_choice() {
        let mut body = mcq();
        body.redact();

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["choices"][0]["isCorrect"], "****");
        assert_eq!(value["choices"][1]["isCorrect"], "****");
        assert_eq!(value["choices"][1]["desc"], "Jupiter");
    }

    #[test]
    fn unredacted_body_keeps_booleans() {
        let value = serde_json::to_value(mcq()).unwrap();
        assert_eq!(value["choices"][1]["isCorrect"], true);
        assert!(value.get("test_cases").is_none());
    }

    #[test]
    fn flattened_response_shape() {
        let response = QuestionResponse { id: 9, body: mcq() };
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["type"], "mcq");
        assert_eq!(value["grade"], 2);
    }

    #[test]
    fn masked_value_cannot_be_submitted() {
        let result: Result<QuestionBody, _> = serde_json::from_value(json!({
            "desc": "x",
            "type": "mcq",
            "grade": 1,
            "choices": [{"desc": "a", "isCorrect": "****"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn mcq_validation() {
        assert!(validate_questions(&[mcq()]).is_ok());

        let mut no_correct = mcq();
        no_correct.choices[1].is_correct = Correctness::Known(false);
        assert!(validate_questions(&[no_correct]).is_err());

        let mut single = mcq();
        single.choices.truncate(1);
        assert!(validate_questions(&[single]).is_err());

        let mut zero_grade = mcq();
        zero_grade.grade = 0;
        assert!(validate_questions(&[zero_grade]).is_err());
    }

    #[test]
    fn coding_question_with_test_cases() {
        let body: QuestionBody = serde_json::from_value(json!({
            "desc": "Reverse a string",
            "type": "coding",
            "grade": 5,
            "test_cases": [{"input": "abc", "output": "cba"}]
        }))
        .unwrap();
        assert!(validate_questions(&[body]).is_ok());
    }

    #[test]
    fn markup_like_text_is_kept_verbatim() {
        let mut body = mcq();
        body.desc = "Is 2 < 3 && 5 > 4? Return a Vec<i32>".to_string();
        body.choices[0].desc = "A & B".to_string();

        let stored = serde_json::to_value(&body).unwrap();
        let loaded: QuestionBody = serde_json::from_value(stored).unwrap();

        assert_eq!(loaded.desc, "Is 2 < 3 && 5 > 4? Return a Vec<i32>");
        assert_eq!(loaded.choices[0].desc, "A & B");
    }
}
