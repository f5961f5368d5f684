// Reading and writing the form documents.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use survey_session::{Form, Question, QuestionType};

use crate::survey::{
    io_common::{ensure_dir, list_slugs, slug_path},
    *,
};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FormDocument {
    pub title: String,
    pub questions: Vec<QuestionDocument>,
}

impl From<&Form> for FormDocument {
    fn from(form: &Form) -> Self {
        FormDocument {
            title: form.title.clone(),
            questions: form
                .questions
                .iter()
                .map(|q| QuestionDocument {
                    text: q.text.clone(),
                    question_type: q.question_type.label().to_string(),
                    options: match q.question_type {
                        QuestionType::MultipleChoice => Some(q.options.clone()),
                        _ => None,
                    },
                })
                .collect(),
        }
    }
}

/// Converts a document into a form. Only the question types are checked here.
pub fn document_to_form(doc: &FormDocument, path: &str) -> SvResult<Form> {
    let mut questions: Vec<Question> = Vec::new();
    for (idx, qd) in doc.questions.iter().enumerate() {
        let question_type = QuestionType::from_label(&qd.question_type).context(
            UnknownQuestionTypeSnafu {
                label: &qd.question_type,
                position: idx + 1,
                path,
            },
        )?;
        questions.push(Question {
            text: qd.text.clone(),
            question_type,
            options: qd.options.clone().unwrap_or_default(),
        });
    }
    Ok(Form {
        title: doc.title.clone(),
        questions,
    })
}

/// Reads a form document from any location.
pub fn read_form_document(path: &str) -> SvResult<Form> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_form_document: {:?}", contents);
    let doc: FormDocument =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    document_to_form(&doc, path)
}

/// Pretty JSON with the four-space indentation of the form files.
fn to_json_4(doc: &FormDocument) -> SvResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser).context(WritingJsonSnafu {})?;
    Ok(buf)
}

/// The forms, one JSON document per form in a directory.
///
/// Forms are never overwritten: the file name is derived from the title, and saving a
/// second form with the same file name fails.
pub struct FormStore {
    root: PathBuf,
}

impl FormStore {
    pub fn new(root: &Path) -> FormStore {
        FormStore {
            root: root.to_path_buf(),
        }
    }

    pub fn path_for(&self, slug: &str) -> SvResult<PathBuf> {
        slug_path(&self.root, slug, "json")
    }

    /// Saves a new form and returns its location.
    pub fn save(&self, form: &Form) -> SvResult<PathBuf> {
        if form.title.trim().is_empty() {
            return Err(SurveyError::InvalidForm {
                source: survey_session::FormErrors::EmptyTitle,
            });
        }
        let slug = form.slug();
        let path = self.path_for(&slug)?;
        let path_s = path.display().to_string();
        ensure_dir(&self.root)?;
        let buf = to_json_4(&FormDocument::from(form))?;
        // create_new makes the existence check and the creation one step.
        let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return DuplicateNameSnafu { slug }.fail();
            }
            Err(e) => {
                return Err(SurveyError::WritingFile {
                    source: e,
                    path: path_s,
                })
            }
        };
        if let Err(e) = f.write_all(&buf).and_then(|_| f.sync_all()) {
            // Do not leave a truncated form behind.
            let _ = fs::remove_file(&path);
            return Err(SurveyError::WritingFile {
                source: e,
                path: path_s,
            });
        }
        info!("Form {:?} saved to {:?}", form.title, path_s);
        Ok(path)
    }

    pub fn load(&self, slug: &str) -> SvResult<Form> {
        let path = self.path_for(slug)?;
        if !path.exists() {
            return FormNotFoundSnafu { slug }.fail();
        }
        read_form_document(&path.display().to_string())
    }

    /// The slugs of the stored forms, sorted.
    pub fn list(&self) -> SvResult<Vec<String>> {
        list_slugs(&self.root, "json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_session::builder::FormBuilder;

    fn pets() -> Form {
        let mut b = FormBuilder::new("Pets");
        b.add_multiple_choice("Favorite animal?", "Cat, Dog, Bird")
            .unwrap();
        b.add_scale("Rate your day").unwrap();
        b.add_text("Anything else?").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(&tmp.path().join("forms"));
        let p = store.save(&pets()).unwrap();
        assert_eq!(p, tmp.path().join("forms").join("pets.json"));
        assert_eq!(store.load("pets").unwrap(), pets());
        assert_eq!(store.list().unwrap(), vec!["pets"]);
    }

    #[test]
    fn document_format() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(tmp.path());
        let p = store.save(&pets()).unwrap();
        let js: JSValue = serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap();
        assert_eq!(js["title"], "Pets");
        assert_eq!(js["questions"][0]["type"], "Multiple Choice");
        assert_eq!(
            js["questions"][0]["options"],
            serde_json::json!(["Cat", "Dog", "Bird"])
        );
        assert_eq!(js["questions"][1]["type"], "Scale (1–5)");
        assert!(js["questions"][1].get("options").is_none());
    }

    #[test]
    fn duplicate_titles_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(tmp.path());
        store.save(&pets()).unwrap();
        let mut other = pets();
        other.title = "PETS".to_string();
        other.questions.pop();
        assert!(matches!(
            store.save(&other),
            Err(SurveyError::DuplicateName { slug }) if slug == "pets"
        ));
        // The first form is untouched.
        assert_eq!(store.load("pets").unwrap().questions.len(), 3);
    }

    #[test]
    fn missing_form() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(tmp.path());
        assert!(matches!(
            store.load("nothing"),
            Err(SurveyError::FormNotFound { .. })
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn names_outside_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(&tmp.path().join("forms"));
        fs::write(tmp.path().join("x.json"), r#"{"title": "X", "questions": []}"#).unwrap();
        assert!(matches!(
            store.load("../x"),
            Err(SurveyError::InvalidSlug { .. })
        ));
    }

    #[test]
    fn empty_title() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FormStore::new(tmp.path());
        let mut f = pets();
        f.title = " ".to_string();
        assert!(store.save(&f).is_err());
    }

    #[test]
    fn reads_hyphen_scale_label() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("day.json");
        fs::write(
            &p,
            r#"{"title": "Day", "questions": [{"text": "How was it?", "type": "Scale (1-5)"}]}"#,
        )
        .unwrap();
        let f = read_form_document(&p.display().to_string()).unwrap();
        assert_eq!(f.questions[0].question_type, QuestionType::Scale);
    }

    #[test]
    fn unknown_question_type() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("day.json");
        fs::write(
            &p,
            r#"{"title": "Day", "questions": [{"text": "Date?", "type": "Date"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            read_form_document(&p.display().to_string()),
            Err(SurveyError::UnknownQuestionType { position: 1, .. })
        ));
    }
}
