mod config;
use log::{debug, info};

pub mod builder;
pub mod manual;
pub mod registry;
pub mod report;

pub use crate::config::*;
pub use crate::registry::{SessionRegistry, SessionToken};

/// Where a session stands.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SessionState {
    /// Showing the question at this (0-based) index.
    Active(usize),
    /// The answers were committed. Terminal until `restart`.
    Complete,
}

/// One respondent's walk through a form, one question at a time.
///
/// The walk is strictly linear: the respondent can move back to fix an earlier answer,
/// but cannot skip ahead of the navigation controls and can only submit from the last
/// question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySession {
    form: Form,
    policy: ValidationPolicy,
    // Invariant: same length as the questions of the form.
    answers: Vec<Option<Answer>>,
    state: SessionState,
}

/// A read-only projection of the current step of a session, for display.
#[derive(PartialEq, Debug, Clone)]
pub struct SessionView<'a> {
    /// 1-based
    pub position: usize,
    pub total: usize,
    pub question: &'a Question,
    pub answer: Option<&'a Answer>,
    /// What an input widget should show preselected.
    pub suggested: Answer,
    pub can_previous: bool,
    pub can_next: bool,
    pub can_submit: bool,
}

impl SurveySession {
    /// Starts a session at the first question, with no answers.
    pub fn new(form: &Form, policy: ValidationPolicy) -> Result<SurveySession, SessionErrors> {
        form.validate().map_err(SessionErrors::InvalidForm)?;
        debug!(
            "SurveySession::new: form {:?} with {} questions, policy {:?}",
            form.slug(),
            form.questions.len(),
            policy
        );
        Ok(SurveySession {
            form: form.clone(),
            policy,
            answers: vec![None; form.questions.len()],
            state: SessionState::Active(0),
        })
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    pub fn len(&self) -> usize {
        self.form.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.form.questions.is_empty()
    }

    pub fn answers(&self) -> &[Option<Answer>] {
        &self.answers
    }

    /// The index of the current question, or an error once the session is complete.
    pub fn current_index(&self) -> Result<usize, SessionErrors> {
        match self.state {
            SessionState::Active(idx) => Ok(idx),
            SessionState::Complete => Err(SessionErrors::AlreadyComplete),
        }
    }

    pub fn current_question(&self) -> Result<&Question, SessionErrors> {
        let idx = self.current_index()?;
        Ok(&self.form.questions[idx])
    }

    /// Records the answer to the current question. The current question does not change.
    pub fn set_answer(&mut self, answer: Answer) -> Result<(), SessionErrors> {
        let idx = self.current_index()?;
        check_answer(&self.form.questions[idx], idx + 1, &answer)?;
        debug!("set_answer: question {}: {:?}", idx + 1, answer);
        self.answers[idx] = Some(answer);
        Ok(())
    }

    /// Interprets raw input for the current question.
    ///
    /// Scale input is parsed as an integer and clamped into the scale. Multiple choice
    /// input is either one of the options or the 1-based number of an option.
    pub fn parse_answer(&self, raw: &str) -> Result<Answer, SessionErrors> {
        let idx = self.current_index()?;
        let question = &self.form.questions[idx];
        let invalid = |reason: String| SessionErrors::InvalidAnswer {
            position: idx + 1,
            reason,
        };
        match question.question_type {
            QuestionType::Text => Ok(Answer::Text(raw.to_string())),
            QuestionType::Scale => raw
                .trim()
                .parse::<i64>()
                .map(Answer::scale_clamped)
                .map_err(|_| invalid(format!("{:?} is not a number", raw.trim()))),
            QuestionType::MultipleChoice => {
                let s = raw.trim();
                if let Some(o) = question.options.iter().find(|o| o.as_str() == s) {
                    return Ok(Answer::Choice(o.clone()));
                }
                match s.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= question.options.len() => {
                        Ok(Answer::Choice(question.options[n - 1].clone()))
                    }
                    _ => Err(invalid(format!(
                        "{:?} is not one of {:?}",
                        s, question.options
                    ))),
                }
            }
        }
    }

    /// Moves to the previous question. Returns false if already on the first question.
    pub fn previous(&mut self) -> bool {
        match self.state {
            SessionState::Active(idx) if idx > 0 => {
                self.state = SessionState::Active(idx - 1);
                true
            }
            _ => false,
        }
    }

    /// Moves to the next question. Returns false if already on the last question.
    pub fn next(&mut self) -> bool {
        match self.state {
            SessionState::Active(idx) if idx + 1 < self.len() => {
                self.state = SessionState::Active(idx + 1);
                true
            }
            _ => false,
        }
    }

    /// The 1-based positions of the questions that strict validation would reject.
    pub fn incomplete_questions(&self) -> Vec<usize> {
        self.answers
            .iter()
            .enumerate()
            .filter(|(_, a)| match a {
                None => true,
                Some(a) => a.is_blank(),
            })
            .map(|(idx, _)| idx + 1)
            .collect()
    }

    /// The row that a submission would store. Unanswered questions are empty cells.
    pub fn response_row(&self) -> ResponseRow {
        let cells = self
            .form
            .questions
            .iter()
            .zip(self.answers.iter())
            .enumerate()
            .map(|(idx, (q, a))| {
                let value = a.as_ref().map(|a| a.display_value()).unwrap_or_default();
                (q.column_name(idx + 1), value)
            })
            .collect();
        ResponseRow { cells }
    }

    /// Validates the answers and commits them to the sink.
    ///
    /// On success the session becomes complete and forgets its answers. On any error the
    /// session is left as it was.
    pub fn submit<S: ResponseSink>(
        &mut self,
        sink: &S,
    ) -> Result<ResponseRow, SubmitErrors<S::Error>> {
        let idx = self.current_index()?;
        let total = self.len();
        if idx + 1 != total {
            return Err(SessionErrors::NotOnLastQuestion {
                position: idx + 1,
                total,
            }
            .into());
        }
        if self.policy.strict {
            let missing = self.incomplete_questions();
            if !missing.is_empty() {
                debug!("submit: rejected, incomplete questions {:?}", missing);
                return Err(SessionErrors::Incomplete(missing).into());
            }
        }
        let row = self.response_row();
        sink.append(&self.form, &row).map_err(SubmitErrors::Sink)?;
        info!("submit: response committed for form {:?}", self.form.slug());
        self.answers = vec![None; total];
        self.state = SessionState::Complete;
        Ok(row)
    }

    /// Starts over from the first question with no answers.
    pub fn restart(&mut self) {
        self.answers = vec![None; self.len()];
        self.state = SessionState::Active(0);
    }

    /// The current step, for display.
    pub fn view(&self) -> Result<SessionView<'_>, SessionErrors> {
        let idx = self.current_index()?;
        let question = &self.form.questions[idx];
        let answer = self.answers[idx].as_ref();
        let total = self.len();
        Ok(SessionView {
            position: idx + 1,
            total,
            question,
            answer,
            suggested: suggested_answer(question, answer),
            can_previous: idx > 0,
            can_next: idx + 1 < total,
            can_submit: idx + 1 == total,
        })
    }
}

impl<'a> SessionView<'a> {
    /// For multiple choice questions, the index of the option to preselect.
    pub fn suggested_index(&self) -> Option<usize> {
        match &self.suggested {
            Answer::Choice(s) => self.question.options.iter().position(|o| o == s),
            _ => None,
        }
    }
}

fn suggested_answer(question: &Question, answer: Option<&Answer>) -> Answer {
    if let Some(a) = answer {
        return a.clone();
    }
    match question.question_type {
        QuestionType::Text => Answer::Text(String::new()),
        QuestionType::Scale => Answer::Scale(SCALE_DEFAULT),
        // The form invariants guarantee at least one option.
        QuestionType::MultipleChoice => Answer::Choice(question.options[0].clone()),
    }
}

fn check_answer(question: &Question, position: usize, answer: &Answer) -> Result<(), SessionErrors> {
    let invalid = |reason: String| SessionErrors::InvalidAnswer { position, reason };
    match (question.question_type, answer) {
        (QuestionType::Text, Answer::Text(_)) => Ok(()),
        (QuestionType::Scale, Answer::Scale(x)) if (SCALE_MIN..=SCALE_MAX).contains(x) => Ok(()),
        (QuestionType::Scale, Answer::Scale(x)) => Err(invalid(format!(
            "{} is outside of {}..{}",
            x, SCALE_MIN, SCALE_MAX
        ))),
        (QuestionType::MultipleChoice, Answer::Choice(s)) if question.options.contains(s) => {
            Ok(())
        }
        (QuestionType::MultipleChoice, Answer::Choice(s)) => Err(invalid(format!(
            "{:?} is not one of {:?}",
            s, question.options
        ))),
        (t, a) => Err(invalid(format!(
            "a {} question cannot take the answer {:?}",
            t.label(),
            a
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemorySink {
        rows: RefCell<Vec<ResponseRow>>,
        fail: bool,
    }

    impl ResponseSink for MemorySink {
        type Error = String;
        fn append(&self, _form: &Form, row: &ResponseRow) -> Result<(), String> {
            if self.fail {
                return Err("disk full".to_string());
            }
            self.rows.borrow_mut().push(row.clone());
            Ok(())
        }
    }

    fn pets() -> Form {
        Form {
            title: "Pets".to_string(),
            questions: vec![
                Question::multiple_choice(
                    "Favorite animal?",
                    &["Cat".to_string(), "Dog".to_string(), "Bird".to_string()],
                ),
                Question::scale("Rate your day"),
            ],
        }
    }

    fn three_questions() -> Form {
        let mut f = pets();
        f.questions.insert(0, Question::text("Your name?"));
        f
    }

    #[test]
    fn starts_on_first_question() {
        let _ = env_logger::builder().is_test(true).try_init();
        let s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        assert_eq!(s.state(), SessionState::Active(0));
        assert_eq!(s.answers(), &[None, None]);
    }

    #[test]
    fn rejects_invalid_form() {
        let mut f = pets();
        f.questions[0].options.clear();
        assert_eq!(
            SurveySession::new(&f, ValidationPolicy::PERMISSIVE),
            Err(SessionErrors::InvalidForm(FormErrors::MissingOptions(1)))
        );
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut s = SurveySession::new(&three_questions(), ValidationPolicy::PERMISSIVE).unwrap();
        assert!(!s.previous());
        assert_eq!(s.current_index(), Ok(0));
        assert!(s.next());
        assert!(s.next());
        assert!(!s.next());
        assert!(!s.next());
        assert_eq!(s.current_index(), Ok(2));
        assert!(s.previous());
        assert_eq!(s.current_index(), Ok(1));
    }

    #[test]
    fn answers_survive_navigation() {
        let mut s = SurveySession::new(&three_questions(), ValidationPolicy::PERMISSIVE).unwrap();
        s.set_answer(Answer::Text("Ada".to_string())).unwrap();
        s.next();
        s.set_answer(Answer::Choice("Bird".to_string())).unwrap();
        s.next();
        s.previous();
        s.previous();
        assert_eq!(s.view().unwrap().answer, Some(&Answer::Text("Ada".to_string())));
        s.next();
        assert_eq!(
            s.view().unwrap().answer,
            Some(&Answer::Choice("Bird".to_string()))
        );
    }

    #[test]
    fn answers_are_checked_against_the_question() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        assert!(matches!(
            s.set_answer(Answer::Choice("Fish".to_string())),
            Err(SessionErrors::InvalidAnswer { position: 1, .. })
        ));
        assert!(matches!(
            s.set_answer(Answer::Scale(2)),
            Err(SessionErrors::InvalidAnswer { position: 1, .. })
        ));
        s.next();
        assert!(matches!(
            s.set_answer(Answer::Scale(6)),
            Err(SessionErrors::InvalidAnswer { position: 2, .. })
        ));
        assert!(matches!(
            s.set_answer(Answer::Scale(0)),
            Err(SessionErrors::InvalidAnswer { position: 2, .. })
        ));
        s.set_answer(Answer::Scale(5)).unwrap();
        assert_eq!(s.answers()[1], Some(Answer::Scale(5)));
    }

    #[test]
    fn raw_input_parsing() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        assert_eq!(s.parse_answer(" Dog "), Ok(Answer::Choice("Dog".to_string())));
        assert_eq!(s.parse_answer("3"), Ok(Answer::Choice("Bird".to_string())));
        assert!(s.parse_answer("4").is_err());
        assert!(s.parse_answer("dog").is_err());
        s.next();
        assert_eq!(s.parse_answer("9"), Ok(Answer::Scale(5)));
        assert_eq!(s.parse_answer("-2"), Ok(Answer::Scale(1)));
        assert!(s.parse_answer("great").is_err());
    }

    #[test]
    fn view_suggests_defaults() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        let v = s.view().unwrap();
        assert_eq!(v.position, 1);
        assert_eq!(v.total, 2);
        assert_eq!(v.suggested, Answer::Choice("Cat".to_string()));
        assert_eq!(v.suggested_index(), Some(0));
        assert!(!v.can_previous && v.can_next && !v.can_submit);
        s.set_answer(Answer::Choice("Dog".to_string())).unwrap();
        assert_eq!(s.view().unwrap().suggested_index(), Some(1));
        s.next();
        let v = s.view().unwrap();
        assert_eq!(v.suggested, Answer::Scale(SCALE_DEFAULT));
        assert!(v.can_previous && !v.can_next && v.can_submit);
    }

    #[test]
    fn submit_only_from_last_question() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        let sink = MemorySink::default();
        assert!(matches!(
            s.submit(&sink),
            Err(SubmitErrors::Session(SessionErrors::NotOnLastQuestion {
                position: 1,
                total: 2
            }))
        ));
        assert!(sink.rows.borrow().is_empty());
        assert_eq!(s.state(), SessionState::Active(0));
    }

    #[test]
    fn pets_example() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::STRICT).unwrap();
        let sink = MemorySink::default();
        s.set_answer(Answer::Choice("Dog".to_string())).unwrap();
        s.next();
        s.set_answer(Answer::Scale(4)).unwrap();
        let row = s.submit(&sink).unwrap();
        assert_eq!(
            row.cells,
            vec![
                ("Q1: Favorite animal?".to_string(), "Dog".to_string()),
                ("Q2: Rate your day".to_string(), "4".to_string()),
            ]
        );
        assert_eq!(sink.rows.borrow().as_slice(), &[row]);
        assert!(s.is_complete());
        assert_eq!(s.answers(), &[None, None]);
        assert_eq!(s.current_index(), Err(SessionErrors::AlreadyComplete));
    }

    #[test]
    fn strict_rejects_missing_answers() {
        let mut s = SurveySession::new(&three_questions(), ValidationPolicy::STRICT).unwrap();
        let sink = MemorySink::default();
        s.set_answer(Answer::Text("   ".to_string())).unwrap();
        s.next();
        s.next();
        s.set_answer(Answer::Scale(2)).unwrap();
        match s.submit(&sink) {
            Err(SubmitErrors::Session(SessionErrors::Incomplete(l))) => assert_eq!(l, vec![1, 2]),
            x => panic!("unexpected {:?}", x),
        }
        assert!(sink.rows.borrow().is_empty());
        assert_eq!(s.state(), SessionState::Active(2));
        assert_eq!(s.answers()[2], Some(Answer::Scale(2)));
    }

    #[test]
    fn permissive_accepts_missing_answers() {
        let mut s = SurveySession::new(&three_questions(), ValidationPolicy::PERMISSIVE).unwrap();
        let sink = MemorySink::default();
        s.next();
        s.next();
        let row = s.submit(&sink).unwrap();
        assert_eq!(row.values(), vec!["", "", ""]);
        assert_eq!(sink.rows.borrow().len(), 1);
    }

    #[test]
    fn failed_sink_keeps_the_answers() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        let sink = MemorySink {
            fail: true,
            ..Default::default()
        };
        s.set_answer(Answer::Choice("Cat".to_string())).unwrap();
        s.next();
        assert!(matches!(s.submit(&sink), Err(SubmitErrors::Sink(_))));
        assert_eq!(s.state(), SessionState::Active(1));
        assert_eq!(s.answers()[0], Some(Answer::Choice("Cat".to_string())));
    }

    #[test]
    fn complete_session_is_frozen() {
        let mut s = SurveySession::new(&pets(), ValidationPolicy::PERMISSIVE).unwrap();
        let sink = MemorySink::default();
        s.next();
        s.submit(&sink).unwrap();
        assert!(!s.next());
        assert!(!s.previous());
        assert_eq!(
            s.set_answer(Answer::Scale(1)),
            Err(SessionErrors::AlreadyComplete)
        );
        assert!(matches!(
            s.submit(&sink),
            Err(SubmitErrors::Session(SessionErrors::AlreadyComplete))
        ));
        s.restart();
        assert_eq!(s.state(), SessionState::Active(0));
    }
}
