pub use crate::config::*;

/// A builder for assembling a form question by question.
///
/// This is the operator side of the program: every question is checked as it is added,
/// and the whole form is checked again when it is built.
///
/// ```
/// use survey_session::builder::FormBuilder;
/// # use survey_session::FormErrors;
///
/// let mut builder = FormBuilder::new("Pets");
/// builder.add_multiple_choice("Favorite animal?", "Cat, Dog, Bird")?;
/// builder.add_scale("Rate your day")?;
/// let form = builder.build()?;
///
/// assert_eq!(form.slug(), "pets");
/// assert_eq!(form.questions[0].options, vec!["Cat", "Dog", "Bird"]);
/// # Ok::<(), FormErrors>(())
/// ```
pub struct FormBuilder {
    pub(crate) _title: String,
    pub(crate) _questions: Vec<Question>,
}

impl FormBuilder {
    pub fn new(title: &str) -> FormBuilder {
        FormBuilder {
            _title: title.to_string(),
            _questions: Vec::new(),
        }
    }

    pub fn title(self, title: &str) -> FormBuilder {
        FormBuilder {
            _title: title.to_string(),
            _questions: self._questions,
        }
    }

    pub fn add_text(&mut self, text: &str) -> Result<(), FormErrors> {
        self.add_question(&Question::text(text))
    }

    pub fn add_scale(&mut self, text: &str) -> Result<(), FormErrors> {
        self.add_question(&Question::scale(text))
    }

    /// Adds a multiple choice question.
    ///
    /// options: the choices, separated by commas. Blank choices are dropped.
    pub fn add_multiple_choice(&mut self, text: &str, options: &str) -> Result<(), FormErrors> {
        self.add_question(&Question::multiple_choice(text, &parse_options(options)))
    }

    pub fn add_question(&mut self, question: &Question) -> Result<(), FormErrors> {
        let position = self._questions.len() + 1;
        if position > MAX_QUESTIONS {
            return Err(FormErrors::TooManyQuestions(position));
        }
        // Checked alone so that the position in the error is the right one.
        let single = Form {
            title: "-".to_string(),
            questions: vec![question.clone()],
        };
        single.validate().map_err(|e| match e {
            FormErrors::EmptyQuestionText(_) => FormErrors::EmptyQuestionText(position),
            FormErrors::MissingOptions(_) => FormErrors::MissingOptions(position),
            FormErrors::BlankOption(_) => FormErrors::BlankOption(position),
            FormErrors::UnexpectedOptions(_) => FormErrors::UnexpectedOptions(position),
            x => x,
        })?;
        self._questions.push(question.clone());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self._questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self._questions.is_empty()
    }

    pub fn build(self) -> Result<Form, FormErrors> {
        let form = Form {
            title: self._title.trim().to_string(),
            questions: self._questions,
        };
        form.validate()?;
        Ok(form)
    }
}

/// Splits a comma-separated list of options, trimming them and dropping the blank ones.
pub fn parse_options(options: &str) -> Vec<String> {
    options
        .split(',')
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| o.to_string())
        .collect()
}
