// ********* Form definitions ***********

use std::error::Error;
use std::fmt::Display;

/// Lowest value of a scale question.
pub const SCALE_MIN: u8 = 1;
/// Highest value of a scale question.
pub const SCALE_MAX: u8 = 5;
/// The value preselected for a scale question that has not been answered yet.
pub const SCALE_DEFAULT: u8 = 3;
/// The largest number of questions the form builder accepts.
pub const MAX_QUESTIONS: usize = 20;

/// The kinds of questions a form can ask.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum QuestionType {
    /// Free text, possibly empty.
    Text,
    /// An integer rating between `SCALE_MIN` and `SCALE_MAX`.
    Scale,
    /// Exactly one of the options of the question.
    MultipleChoice,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::Text,
        QuestionType::Scale,
        QuestionType::MultipleChoice,
    ];

    /// The label used in form documents.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Text => "Text",
            QuestionType::Scale => "Scale (1–5)",
            QuestionType::MultipleChoice => "Multiple Choice",
        }
    }

    /// Parses a label from a form document.
    ///
    /// The scale label is written with an en dash, an ASCII hyphen is accepted as well.
    pub fn from_label(label: &str) -> Option<QuestionType> {
        match label.trim() {
            "Text" => Some(QuestionType::Text),
            "Scale (1–5)" | "Scale (1-5)" => Some(QuestionType::Scale),
            "Multiple Choice" => Some(QuestionType::MultipleChoice),
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Question {
    pub text: String,
    pub question_type: QuestionType,
    /// Only filled for multiple choice questions. The order is the display order.
    pub options: Vec<String>,
}

impl Question {
    pub fn text(text: &str) -> Question {
        Question {
            text: text.to_string(),
            question_type: QuestionType::Text,
            options: Vec::new(),
        }
    }

    pub fn scale(text: &str) -> Question {
        Question {
            text: text.to_string(),
            question_type: QuestionType::Scale,
            options: Vec::new(),
        }
    }

    pub fn multiple_choice(text: &str, options: &[String]) -> Question {
        Question {
            text: text.to_string(),
            question_type: QuestionType::MultipleChoice,
            options: options.to_vec(),
        }
    }

    /// The column name of this question in the response ledger.
    ///
    /// `position` is 1-based.
    pub fn column_name(&self, position: usize) -> String {
        format!("Q{}: {}", position, self.text)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Form {
    pub title: String,
    pub questions: Vec<Question>,
}

impl Form {
    /// The identifier of the form in a store.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    /// The ledger header for this form, in question order.
    pub fn header(&self) -> Vec<String> {
        self.questions
            .iter()
            .enumerate()
            .map(|(idx, q)| q.column_name(idx + 1))
            .collect()
    }

    /// Checks the structural invariants of the form.
    ///
    /// Positions in the errors are 1-based.
    pub fn validate(&self) -> Result<(), FormErrors> {
        if self.title.trim().is_empty() {
            return Err(FormErrors::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(FormErrors::NoQuestions);
        }
        for (idx, q) in self.questions.iter().enumerate() {
            let position = idx + 1;
            if q.text.trim().is_empty() {
                return Err(FormErrors::EmptyQuestionText(position));
            }
            match q.question_type {
                QuestionType::MultipleChoice => {
                    if q.options.is_empty() {
                        return Err(FormErrors::MissingOptions(position));
                    }
                    if q.options.iter().any(|o| o.is_empty() || o.trim() != o) {
                        return Err(FormErrors::BlankOption(position));
                    }
                }
                _ if !q.options.is_empty() => {
                    return Err(FormErrors::UnexpectedOptions(position));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Lowercases the title and replaces the spaces with underscores.
///
/// Path separators are also replaced so that the slug always names a single file.
pub fn slugify(title: &str) -> String {
    title
        .replace([' ', '/', '\\'], "_")
        .to_lowercase()
}

// ********* Answers ***********

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Answer {
    Text(String),
    Scale(u8),
    Choice(String),
}

impl Answer {
    /// A scale answer, with the value forced into the scale domain.
    pub fn scale_clamped(value: i64) -> Answer {
        Answer::Scale(value.clamp(SCALE_MIN as i64, SCALE_MAX as i64) as u8)
    }

    /// The value written in the ledger.
    pub fn display_value(&self) -> String {
        match self {
            Answer::Text(s) => s.clone(),
            Answer::Scale(x) => x.to_string(),
            Answer::Choice(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One committed submission: the ledger columns and the values, in question order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResponseRow {
    pub cells: Vec<(String, String)>,
}

impl ResponseRow {
    pub fn header(&self) -> Vec<String> {
        self.cells.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.cells.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }
}

// ********* Configuration **********

/// Whether a submission may contain unanswered questions.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ValidationPolicy {
    /// When set, every question must be answered and text answers must not be blank.
    pub strict: bool,
}

impl ValidationPolicy {
    pub const PERMISSIVE: ValidationPolicy = ValidationPolicy { strict: false };
    pub const STRICT: ValidationPolicy = ValidationPolicy { strict: true };
}

// ********* Errors **********

/// A form that breaks one of the structural rules.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FormErrors {
    EmptyTitle,
    NoQuestions,
    TooManyQuestions(usize),
    EmptyQuestionText(usize),
    MissingOptions(usize),
    BlankOption(usize),
    UnexpectedOptions(usize),
}

impl Error for FormErrors {}

impl Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormErrors::EmptyTitle => write!(f, "the form title is empty"),
            FormErrors::NoQuestions => write!(f, "the form has no questions"),
            FormErrors::TooManyQuestions(n) => write!(
                f,
                "the form has {} questions, at most {} are allowed",
                n, MAX_QUESTIONS
            ),
            FormErrors::EmptyQuestionText(p) => write!(f, "question {} has no text", p),
            FormErrors::MissingOptions(p) => {
                write!(f, "multiple choice question {} has no options", p)
            }
            FormErrors::BlankOption(p) => {
                write!(f, "question {} has a blank or untrimmed option", p)
            }
            FormErrors::UnexpectedOptions(p) => {
                write!(f, "question {} has options but is not multiple choice", p)
            }
        }
    }
}

/// Errors that prevent a session transition.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SessionErrors {
    InvalidForm(FormErrors),
    /// The answer does not fit the question at this (1-based) position.
    InvalidAnswer { position: usize, reason: String },
    /// Submitting is only possible from the last question.
    NotOnLastQuestion { position: usize, total: usize },
    /// Strict validation failed, with the 1-based positions of the missing answers.
    Incomplete(Vec<usize>),
    AlreadyComplete,
    UnknownSession(String),
}

impl Error for SessionErrors {}

impl Display for SessionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErrors::InvalidForm(e) => write!(f, "invalid form: {}", e),
            SessionErrors::InvalidAnswer { position, reason } => {
                write!(f, "invalid answer for question {}: {}", position, reason)
            }
            SessionErrors::NotOnLastQuestion { position, total } => write!(
                f,
                "cannot submit from question {} of {}, go to the last question first",
                position, total
            ),
            SessionErrors::Incomplete(positions) => {
                let l: Vec<String> = positions.iter().map(|p| format!("Q{}", p)).collect();
                write!(f, "some questions are not answered: {}", l.join(", "))
            }
            SessionErrors::AlreadyComplete => write!(f, "the session is already submitted"),
            SessionErrors::UnknownSession(token) => write!(f, "unknown session {}", token),
        }
    }
}

/// A failed submission: either the session refused it or the sink could not store it.
#[derive(Debug)]
pub enum SubmitErrors<E> {
    Session(SessionErrors),
    Sink(E),
}

impl<E: Error> Error for SubmitErrors<E> {}

impl<E: Display> Display for SubmitErrors<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitErrors::Session(e) => write!(f, "{}", e),
            SubmitErrors::Sink(e) => write!(f, "could not store the response: {}", e),
        }
    }
}

impl<E> From<SessionErrors> for SubmitErrors<E> {
    fn from(e: SessionErrors) -> Self {
        SubmitErrors::Session(e)
    }
}

/// The destination of committed responses.
pub trait ResponseSink {
    type Error;

    /// Stores one row for the given form. On error nothing may be stored.
    fn append(&self, form: &Form, row: &ResponseRow) -> Result<(), Self::Error>;
}
