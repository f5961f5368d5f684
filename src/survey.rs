use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_session::report::*;
use survey_session::*;

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_forms;
pub mod io_ledger;
pub mod prompt;

use crate::survey::config_reader::*;
use crate::survey::io_forms::FormStore;
use crate::survey::io_ledger::{LedgerContents, ResponseLedger};
use crate::survey::prompt::Prompter;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing to JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error reading {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error listing directory {path}"))]
    ListingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid form name {slug:?}: it must name a single file"))]
    InvalidSlug { slug: String },
    #[snafu(display("No form named {slug}"))]
    FormNotFound { slug: String },
    #[snafu(display("A form named {slug} already exists"))]
    DuplicateName { slug: String },
    #[snafu(display("Unknown question type {label:?} for question {position} in {path}"))]
    UnknownQuestionType {
        label: String,
        position: usize,
        path: String,
    },
    #[snafu(display("Invalid form: {source}"))]
    InvalidForm { source: FormErrors },
    #[snafu(display("No responses found for form {slug}"))]
    LedgerNotFound { slug: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: u64,
    },
    #[snafu(display("Error encoding a CSV row"))]
    CsvWrite { source: csv::Error },
    #[snafu(display(
        "The responses of {slug} have the columns {expected:?} but the response has {found:?}"
    ))]
    SchemaMismatch {
        slug: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[snafu(display("{source}"))]
    Session { source: SessionErrors },
    #[snafu(display("Error reading the answer"))]
    Prompt { source: dialoguer::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SvResult<T> = Result<T, SurveyError>;

impl From<SubmitErrors<SurveyError>> for SurveyError {
    fn from(e: SubmitErrors<SurveyError>) -> Self {
        match e {
            SubmitErrors::Session(source) => SurveyError::Session { source },
            SubmitErrors::Sink(e) => e,
        }
    }
}

/// Formats a number without a fractional part when it is an integer.
fn format_number(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

fn column_report_to_json(cr: &ColumnReport, settings: &Settings) -> JSValue {
    match &cr.summary {
        ColumnSummary::Frequencies(f) => {
            let responses: Vec<JSValue> = f
                .entries
                .iter()
                .map(|e| {
                    json!({
                        "value": e.value,
                        "label": e.label(settings.label_width),
                        "count": e.count,
                        "percentage": format!("{:.1}", e.percentage),
                    })
                })
                .collect();
            json!({
                "question": cr.column,
                "type": "frequencies",
                "total": f.total,
                "blank": f.blank,
                "freeText": f.is_free_text(),
                "responses": responses,
            })
        }
        ColumnSummary::Numeric(n) => {
            let ratings: Vec<String> = n.values.iter().map(|v| format_number(*v)).collect();
            json!({
                "question": cr.column,
                "type": "numeric",
                "total": n.values.len() as u64 + n.blank,
                "blank": n.blank,
                "average": format!("{:.2}", n.mean),
                "histogram": n.histogram.to_vec(),
                "ratings": ratings,
            })
        }
    }
}

fn build_summary_js(
    slug: &str,
    contents: &LedgerContents,
    reports: &[ColumnReport],
    settings: &Settings,
) -> JSValue {
    let results: Vec<JSValue> = reports
        .iter()
        .map(|cr| column_report_to_json(cr, settings))
        .collect();
    json!({
        "config": {
            "form": slug,
            "responses": contents.rows.len(),
            "sortOrder": settings.sort_order.name(),
        },
        "results": results,
    })
}

/// Writes the human-readable summary, in the spirit of the results page.
fn print_report<W: Write>(
    slug: &str,
    contents: &LedgerContents,
    reports: &[ColumnReport],
    settings: &Settings,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(out, "Showing {} responses from {}", contents.rows.len(), slug)?;
    for cr in reports.iter() {
        writeln!(out)?;
        writeln!(out, "### {}", cr.column)?;
        match &cr.summary {
            ColumnSummary::Frequencies(f) if f.entries.is_empty() => {
                writeln!(out, "  No answers.")?;
            }
            ColumnSummary::Frequencies(f) => {
                if f.is_free_text() {
                    writeln!(out, "  {} different answers, the first ones:", f.distinct())?;
                }
                for e in f.top(settings.top_responses) {
                    let suffix = if e.is_truncated(settings.label_width) {
                        " (shortened)"
                    } else {
                        ""
                    };
                    writeln!(
                        out,
                        "  {} said: {} ({:.1}%){}",
                        e.count,
                        e.label(settings.label_width),
                        e.percentage,
                        suffix
                    )?;
                }
                if f.distinct() > settings.top_responses {
                    writeln!(
                        out,
                        "  ... and {} other answers",
                        f.distinct() - settings.top_responses
                    )?;
                }
            }
            ColumnSummary::Numeric(n) => {
                writeln!(out, "  Average rating: {:.2}", n.mean)?;
                for (idx, count) in n.histogram.iter().enumerate() {
                    writeln!(out, "  {}: {}", idx + SCALE_MIN as usize, count)?;
                }
            }
        }
    }
    Ok(())
}

fn write_output(dest: &str, content: &str) -> SvResult<()> {
    if dest == "stdout" {
        println!("{}", content);
        return Ok(());
    }
    if let Some(parent) = Path::new(dest).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingFileSnafu { path: dest })?;
        }
    }
    fs::write(dest, content).context(WritingFileSnafu { path: dest })?;
    info!("Summary written to {:?}", dest);
    Ok(())
}

/// Computes the summary of the responses of a form.
///
/// Arguments:
/// * `out_path` where to write the JSON summary: a file, `stdout`, or nothing (the text
///   report then goes to `out`).
/// * `check_summary_path` a reference summary. If the computed summary differs, the
///   differences are printed and an error is returned.
///
/// A form without responses is not an error: a message is written to `out` and there is
/// no summary.
pub fn run_results<W: Write>(
    settings: &Settings,
    slug: &str,
    out_path: Option<String>,
    check_summary_path: Option<String>,
    out: &mut W,
) -> SvResult<Option<JSValue>> {
    let ledger = ResponseLedger::new(&settings.responses_dir);
    let contents = match ledger.read(slug) {
        Ok(c) => c,
        Err(SurveyError::LedgerNotFound { .. }) => {
            info!("run_results: no responses for {:?}", slug);
            writeln!(out, "No responses found for {}.", slug)
                .context(WritingFileSnafu { path: "stdout" })?;
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    info!(
        "run_results: {} responses, {} columns for {:?}",
        contents.rows.len(),
        contents.header.len(),
        slug
    );
    let reports = summarize(&contents.header, &contents.rows, settings.sort_order);
    let result_js = build_summary_js(slug, &contents, &reports, settings);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;

    if let Some(p) = out_path {
        write_output(&p, &pretty_js_stats)?;
    } else {
        print_report(slug, &contents, &reports, settings, out)
            .context(WritingFileSnafu { path: "stdout" })?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }
    Ok(Some(result_js))
}

/// Lists the forms and how many responses each has.
pub fn run_list<W: Write>(settings: &Settings, out: &mut W) -> SvResult<()> {
    let store = FormStore::new(&settings.forms_dir);
    let ledger = ResponseLedger::new(&settings.responses_dir);
    let forms = store.list()?;
    let with_responses = ledger.list()?;
    let w = |e: std::io::Error| SurveyError::WritingFile {
        source: e,
        path: "stdout".to_string(),
    };
    if forms.is_empty() {
        writeln!(out, "No survey forms found. Please create one first.").map_err(w)?;
    }
    for slug in forms.iter() {
        let count = if with_responses.contains(slug) {
            ledger.read(slug)?.rows.len()
        } else {
            0
        };
        writeln!(out, "{}\t{} responses", slug, count).map_err(w)?;
    }
    // Responses may outlive their form.
    for slug in with_responses.iter().filter(|s| !forms.contains(*s)) {
        writeln!(out, "{}\t(form missing)", slug).map_err(w)?;
    }
    Ok(())
}

/// Copies the raw responses of a form to a file or to the standard output.
pub fn run_export(settings: &Settings, slug: &str, out_path: Option<String>) -> SvResult<u64> {
    let ledger = ResponseLedger::new(&settings.responses_dir);
    match out_path.as_deref() {
        None | Some("stdout") => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            ledger.export(slug, &mut handle)
        }
        Some(p) => {
            // Checked first so that a missing ledger leaves no empty file behind.
            if !ledger.has_responses(slug)? {
                return LedgerNotFoundSnafu { slug }.fail();
            }
            let mut f = fs::File::create(p).context(WritingFileSnafu { path: p })?;
            let n = ledger.export(slug, &mut f)?;
            info!("Exported {} bytes to {:?}", n, p);
            Ok(n)
        }
    }
}

/// Creates a form, either from a draft document or by asking the operator, and saves it.
pub fn run_create<P: Prompter>(
    settings: &Settings,
    draft_path: Option<String>,
    prompter: &mut P,
) -> SvResult<Form> {
    let form = match draft_path {
        Some(p) => {
            let f = io_forms::read_form_document(&p)?;
            f.validate().context(InvalidFormSnafu {})?;
            f
        }
        None => prompt::ask_form(prompter)?,
    };
    let store = FormStore::new(&settings.forms_dir);
    let location = store.save(&form)?;
    prompter.message(&format!("Survey form saved as {}", location.display()))?;
    Ok(form)
}

/// Walks a respondent through a form and stores the response.
///
/// Returns nothing if the respondent left without submitting.
pub fn run_respond<P: Prompter>(
    settings: &Settings,
    slug: &str,
    prompter: &mut P,
) -> SvResult<Option<ResponseRow>> {
    let store = FormStore::new(&settings.forms_dir);
    let form = store.load(slug)?;
    let ledger = ResponseLedger::new(&settings.responses_dir);
    let mut registry = SessionRegistry::new(settings.policy);
    prompt::respond(&mut registry, &form, &ledger, None, prompter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::prompt::ScriptedPrompter;
    use std::path::PathBuf;

    fn test_settings(forms_dir: &Path, responses_dir: &Path) -> Settings {
        Settings {
            forms_dir: forms_dir.to_path_buf(),
            responses_dir: responses_dir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn run_results_test(test_name: &str) {
        let _ = env_logger::builder().is_test(true).try_init();
        let test_dir: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", test_name]
            .iter()
            .collect();
        info!("Running test {}", test_name);
        let settings = test_settings(&test_dir, &test_dir);
        let summary_p = test_dir.join(format!("{}_expected_summary.json", test_name));
        let mut report: Vec<u8> = Vec::new();
        let res = run_results(
            &settings,
            test_name,
            None,
            Some(summary_p.display().to_string()),
            &mut report,
        );
        if let Err(e) = res {
            panic!("An error occured {}", e);
        }
    }

    #[test]
    fn pets() {
        run_results_test("pets");
    }

    #[test]
    fn lunch_feedback() {
        run_results_test("lunch_feedback");
    }

    #[test]
    fn results_of_unknown_form() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = test_settings(tmp.path(), tmp.path());
        let mut out: Vec<u8> = Vec::new();
        let res = run_results(&settings, "nothing", None, None, &mut out).unwrap();
        assert!(res.is_none());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "No responses found for nothing.\n"
        );
    }

    #[test]
    fn create_respond_and_summarize() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = test_settings(&tmp.path().join("forms"), &tmp.path().join("responses"));

        let mut operator = ScriptedPrompter::new(&[
            "2",
            "Favorite animal?",
            "Multiple Choice",
            "Cat, Dog, Bird",
            "Rate your day",
            QuestionType::Scale.label(),
            "Pets",
        ]);
        let form = run_create(&settings, None, &mut operator).unwrap();
        assert_eq!(form.slug(), "pets");
        assert!(operator.said("Survey form saved as"));

        for answers in [["Dog", "", "4", ""], ["Cat", "", "2", ""], ["Dog", "", "5", ""]] {
            let mut respondent = ScriptedPrompter::new(&answers);
            let row = run_respond(&settings, "pets", &mut respondent)
                .unwrap()
                .unwrap();
            assert_eq!(row.cells.len(), 2);
        }

        let out_p = tmp.path().join("summary.json");
        let mut report: Vec<u8> = Vec::new();
        let js = run_results(
            &settings,
            "pets",
            Some(out_p.display().to_string()),
            None,
            &mut report,
        )
        .unwrap()
        .unwrap();
        assert_eq!(js["config"]["responses"], json!(3));
        assert_eq!(js["results"][0]["responses"][0]["value"], json!("Dog"));
        assert_eq!(js["results"][0]["responses"][0]["count"], json!(2));
        assert_eq!(js["results"][1]["average"], json!("3.67"));
        assert!(out_p.exists());

        let mut listing: Vec<u8> = Vec::new();
        run_list(&settings, &mut listing).unwrap();
        assert_eq!(String::from_utf8(listing).unwrap(), "pets\t3 responses\n");
    }

    #[test]
    fn export_copies_the_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let test_dir: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "pets"].iter().collect();
        let settings = test_settings(tmp.path(), &test_dir);
        let dest = tmp.path().join("copy.csv");
        let n = run_export(&settings, "pets", Some(dest.display().to_string())).unwrap();
        let original = fs::read(test_dir.join("pets.csv")).unwrap();
        assert_eq!(n, original.len() as u64);
        assert_eq!(fs::read(dest).unwrap(), original);
    }

    #[test]
    fn export_of_unknown_form_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = test_settings(tmp.path(), &tmp.path().join("responses"));
        let dest = tmp.path().join("copy.csv");
        assert!(matches!(
            run_export(&settings, "nothing", Some(dest.display().to_string())),
            Err(SurveyError::LedgerNotFound { .. })
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn form_names_cannot_leave_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = test_settings(&tmp.path().join("forms"), &tmp.path().join("responses"));
        let mut respondent = ScriptedPrompter::new(&[]);
        assert!(matches!(
            run_respond(&settings, "../pets", &mut respondent),
            Err(SurveyError::InvalidSlug { .. })
        ));
        let mut out: Vec<u8> = Vec::new();
        assert!(matches!(
            run_results(&settings, "../../etc/passwd", None, None, &mut out),
            Err(SurveyError::InvalidSlug { .. })
        ));
    }

    #[test]
    fn empty_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = test_settings(&tmp.path().join("forms"), &tmp.path().join("responses"));
        let mut listing: Vec<u8> = Vec::new();
        run_list(&settings, &mut listing).unwrap();
        assert_eq!(
            String::from_utf8(listing).unwrap(),
            "No survey forms found. Please create one first.\n"
        );
    }
}
