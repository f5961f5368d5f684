// The interactive screens: building a form and filling one out.

use log::{debug, info};
use snafu::prelude::*;
use survey_session::builder::{parse_options, FormBuilder};
use survey_session::{
    Answer, Form, QuestionType, ResponseRow, SessionRegistry, SessionToken, SubmitErrors,
    SurveySession, MAX_QUESTIONS, SCALE_MAX, SCALE_MIN,
};

use crate::survey::{io_ledger::ResponseLedger, *};

const DEFAULT_TITLE: &str = "My Survey";

/// Checks one attempt at an input. The error is shown and the input is asked again.
pub type Validator<'a> = &'a dyn Fn(&str) -> Result<(), String>;

/// The widgets the screens are made of.
pub trait Prompter {
    /// A line of text. An empty line gives the default, if any.
    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validator: Validator,
    ) -> SvResult<String>;

    /// One item of a list, returned by index.
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> SvResult<usize>;

    fn message(&mut self, msg: &str) -> SvResult<()>;
}

/// Terminal widgets.
#[derive(Default)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for DialoguerPrompter {
    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validator: Validator,
    ) -> SvResult<String> {
        let mut input = dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .validate_with(|s: &String| validator(s));
        if let Some(d) = default {
            input = input.default(d.to_string());
        }
        input.interact_text().context(PromptSnafu {})
    }

    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> SvResult<usize> {
        dialoguer::Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .context(PromptSnafu {})
    }

    fn message(&mut self, msg: &str) -> SvResult<()> {
        println!("{}", msg);
        Ok(())
    }
}

/// Widgets answered from a list of lines, for tests.
///
/// An input line goes through the validator like a typed one. A select line is the
/// text of an item. An empty line takes the default in both cases.
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    script: std::collections::VecDeque<String>,
    pub transcript: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(lines: &[&str]) -> Self {
        ScriptedPrompter {
            script: lines.iter().map(|s| s.to_string()).collect(),
            transcript: Vec::new(),
        }
    }

    fn next_line(&mut self) -> SvResult<String> {
        match self.script.pop_front() {
            Some(l) => Ok(l),
            None => whatever!("The script ended"),
        }
    }

    pub fn said(&self, fragment: &str) -> bool {
        self.transcript.iter().any(|l| l.contains(fragment))
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validator: Validator,
    ) -> SvResult<String> {
        loop {
            self.transcript.push(prompt.to_string());
            let line = self.next_line()?;
            let value = match default {
                Some(d) if line.is_empty() => d.to_string(),
                _ => line,
            };
            match validator(&value) {
                Ok(()) => return Ok(value),
                Err(e) => self.transcript.push(e),
            }
        }
    }

    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> SvResult<usize> {
        loop {
            self.transcript.push(format!("{} {:?}", prompt, items));
            let line = self.next_line()?;
            if line.is_empty() {
                return Ok(default);
            }
            if let Some(idx) = items.iter().position(|i| *i == line) {
                return Ok(idx);
            }
            self.transcript.push(format!("No item {:?}", line));
        }
    }

    fn message(&mut self, msg: &str) -> SvResult<()> {
        self.transcript.push(msg.to_string());
        Ok(())
    }
}

fn not_blank(what: &'static str) -> impl Fn(&str) -> Result<(), String> {
    move |s: &str| {
        if s.trim().is_empty() {
            Err(format!("The {} cannot be empty", what))
        } else {
            Ok(())
        }
    }
}

/// Asks the operator for a new form: the number of questions, each question, then the
/// title.
pub fn ask_form<P: Prompter>(prompter: &mut P) -> SvResult<Form> {
    prompter.message("Create a survey form")?;
    let count_s = prompter.input(
        &format!("How many questions? (1-{})", MAX_QUESTIONS),
        Some("1"),
        &|s: &str| match s.trim().parse::<usize>() {
            Ok(n) if (1..=MAX_QUESTIONS).contains(&n) => Ok(()),
            _ => Err(format!(
                "Please enter a number between 1 and {}",
                MAX_QUESTIONS
            )),
        },
    )?;
    let count = match count_s.trim().parse::<usize>() {
        Ok(n) => n,
        Err(_) => whatever!("Not a number of questions: {:?}", count_s),
    };

    let type_labels: Vec<String> = QuestionType::ALL
        .iter()
        .map(|t| t.label().to_string())
        .collect();
    let mut builder = FormBuilder::new(DEFAULT_TITLE);
    for position in 1..=count {
        let text = prompter.input(
            &format!("Question {}", position),
            None,
            &not_blank("question"),
        )?;
        let type_idx = prompter.select(
            &format!("Type of question {}", position),
            &type_labels,
            0,
        )?;
        let added = match QuestionType::ALL.get(type_idx) {
            Some(QuestionType::Text) => builder.add_text(text.trim()),
            Some(QuestionType::Scale) => builder.add_scale(text.trim()),
            Some(QuestionType::MultipleChoice) => {
                let options = prompter.input(
                    &format!("Options for question {} (comma-separated)", position),
                    None,
                    &|s: &str| {
                        if parse_options(s).is_empty() {
                            Err("Please enter at least one option".to_string())
                        } else {
                            Ok(())
                        }
                    },
                )?;
                builder.add_multiple_choice(text.trim(), &options)
            }
            None => whatever!("No question type at index {}", type_idx),
        };
        added.context(InvalidFormSnafu {})?;
        debug!("ask_form: question {} added", position);
    }

    let title = prompter.input("Title of the form", Some(DEFAULT_TITLE), &not_blank("title"))?;
    builder
        .title(title.trim())
        .build()
        .context(InvalidFormSnafu {})
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Step {
    Previous,
    Next,
    Submit,
    Quit,
}

impl Step {
    fn label(&self) -> &'static str {
        match self {
            Step::Previous => "Previous",
            Step::Next => "Next",
            Step::Submit => "Submit",
            Step::Quit => "Quit",
        }
    }
}

/// The widget for the current question, preselected with the stored or suggested answer.
fn ask_answer<P: Prompter>(session: &SurveySession, prompter: &mut P) -> SvResult<Answer> {
    let view = session.view().context(SessionSnafu {})?;
    let prompt = format!("[{}/{}] {}", view.position, view.total, view.question.text);
    match view.question.question_type {
        QuestionType::MultipleChoice => {
            let options = &view.question.options;
            let idx = prompter.select(&prompt, options, view.suggested_index().unwrap_or(0))?;
            match options.get(idx) {
                Some(o) => Ok(Answer::Choice(o.clone())),
                None => whatever!("No option at index {}", idx),
            }
        }
        t => {
            let prompt = if t == QuestionType::Scale {
                format!("{} ({}-{})", prompt, SCALE_MIN, SCALE_MAX)
            } else {
                prompt
            };
            let default = view.suggested.display_value();
            let raw = prompter.input(&prompt, Some(&default), &|s: &str| {
                session
                    .parse_answer(s)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })?;
            session.parse_answer(&raw).context(SessionSnafu {})
        }
    }
}

fn drive<P: Prompter>(
    registry: &mut SessionRegistry,
    token: &SessionToken,
    ledger: &ResponseLedger,
    prompter: &mut P,
) -> SvResult<Option<ResponseRow>> {
    loop {
        let answer = ask_answer(registry.get(token).context(SessionSnafu {})?, prompter)?;
        let session = registry.get_mut(token).context(SessionSnafu {})?;
        session.set_answer(answer).context(SessionSnafu {})?;

        let steps: Vec<Step> = {
            let view = session.view().context(SessionSnafu {})?;
            [
                (view.can_previous, Step::Previous),
                (view.can_next, Step::Next),
                (view.can_submit, Step::Submit),
                (true, Step::Quit),
            ]
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, s)| *s)
            .collect()
        };
        let labels: Vec<String> = steps.iter().map(|s| s.label().to_string()).collect();
        let default = steps
            .iter()
            .position(|s| *s == Step::Next || *s == Step::Submit)
            .unwrap_or(0);
        let choice = prompter.select("Continue", &labels, default)?;
        match steps.get(choice) {
            Some(Step::Previous) => {
                session.previous();
            }
            Some(Step::Next) => {
                session.next();
            }
            Some(Step::Submit) => match registry.submit(token, ledger) {
                Ok(row) => {
                    prompter.message("Thank you! Your response has been recorded.")?;
                    return Ok(Some(row));
                }
                Err(SubmitErrors::Session(e)) => prompter.message(&e.to_string())?,
                Err(SubmitErrors::Sink(e)) => return Err(e),
            },
            Some(Step::Quit) | None => {
                prompter.message("Nothing was recorded.")?;
                return Ok(None);
            }
        }
    }
}

/// Walks a respondent through the form until they submit or leave.
///
/// With the token of a session still in the registry, the walk resumes on the question
/// where that session stopped. The session is dropped from the registry when the walk
/// ends, whatever the outcome.
pub fn respond<P: Prompter>(
    registry: &mut SessionRegistry,
    form: &Form,
    ledger: &ResponseLedger,
    resume: Option<&SessionToken>,
    prompter: &mut P,
) -> SvResult<Option<ResponseRow>> {
    let token = registry
        .resume_or_open(resume, form)
        .context(SessionSnafu {})?;
    prompter.message(&format!("Fill out the survey: {}", form.title))?;
    let res = drive(registry, &token, ledger, prompter);
    if registry.abandon(&token) {
        info!("respond: session {} left without submitting", token);
    }
    res
}
