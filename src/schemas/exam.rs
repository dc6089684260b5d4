use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub(crate) const ALL: [OptionLetter; 4] =
        [OptionLetter::A, OptionLetter::B, OptionLetter::C, OptionLetter::D];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InvalidOption(pub(crate) String);

impl fmt::Display for InvalidOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not one of A, B, C, D", self.0)
    }
}

impl std::error::Error for InvalidOption {}

impl FromStr for OptionLetter {
    type Err = InvalidOption;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(InvalidOption(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamCategory {
    pub(crate) id: i64,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub(crate) struct CategoryPayload {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Exam {
    pub(crate) id: i64,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) category_id: Option<i64>,
    #[serde(default)]
    pub(crate) category_name: Option<String>,
    pub(crate) duration_minutes: u32,
    pub(crate) total_marks: u32,
    pub(crate) passing_marks: u32,
    #[serde(default)]
    pub(crate) instructions: Option<String>,
    #[serde(default = "default_active")]
    pub(crate) is_active: bool,
}

impl Exam {
    pub(crate) fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_exam_marks))]
pub(crate) struct ExamPayload {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category_id: i64,
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: u32,
    #[validate(range(min = 1, message = "total_marks must be positive"))]
    pub(crate) total_marks: u32,
    #[validate(range(min = 1, message = "passing_marks must be positive"))]
    pub(crate) passing_marks: u32,
    pub(crate) instructions: Option<String>,
    pub(crate) is_active: bool,
}

fn validate_exam_marks(payload: &ExamPayload) -> Result<(), ValidationError> {
    if payload.passing_marks > payload.total_marks {
        return Err(ValidationError::new("passing_marks")
            .with_message("passing marks cannot exceed total marks".into()));
    }
    Ok(())
}

/// A question as the exam view receives it. There is deliberately no field for
/// the correct option, so it is dropped during decoding even if sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Question {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) exam_id: Option<i64>,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) marks: u32,
    #[serde(default)]
    pub(crate) difficulty_level: DifficultyLevel,
}

impl Question {
    pub(crate) fn option(&self, letter: OptionLetter) -> &str {
        match letter {
            OptionLetter::A => &self.option_a,
            OptionLetter::B => &self.option_b,
            OptionLetter::C => &self.option_c,
            OptionLetter::D => &self.option_d,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminQuestion {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) exam_id: Option<i64>,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) correct_answer: OptionLetter,
    pub(crate) marks: u32,
    #[serde(default)]
    pub(crate) difficulty_level: DifficultyLevel,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExamRef {
    pub(crate) id: i64,
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionPayload {
    pub(crate) exam: ExamRef,
    #[validate(length(min = 1, message = "question text must not be empty"))]
    pub(crate) question_text: String,
    #[validate(length(min = 1, message = "option A must not be empty"))]
    pub(crate) option_a: String,
    #[validate(length(min = 1, message = "option B must not be empty"))]
    pub(crate) option_b: String,
    #[validate(length(min = 1, message = "option C must not be empty"))]
    pub(crate) option_c: String,
    #[validate(length(min = 1, message = "option D must not be empty"))]
    pub(crate) option_d: String,
    pub(crate) correct_answer: OptionLetter,
    #[validate(range(min = 1, message = "marks must be positive"))]
    pub(crate) marks: u32,
    pub(crate) difficulty_level: DifficultyLevel,
}

fn default_active() -> bool {
    true
}
