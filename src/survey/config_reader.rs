use crate::args::Args;
use crate::survey::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use survey_session::report::{SortOrder, DEFAULT_LABEL_WIDTH, DEFAULT_TOP_RESPONSES};
use survey_session::ValidationPolicy;

/// The optional configuration file. Every field may be left out.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "formsDirectory")]
    pub forms_directory: Option<String>,
    #[serde(rename = "responsesDirectory")]
    pub responses_directory: Option<String>,
    #[serde(rename = "strictValidation")]
    pub strict_validation: Option<bool>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    #[serde(rename = "labelWidth")]
    pub label_width: Option<usize>,
    #[serde(rename = "topResponses")]
    pub top_responses: Option<usize>,
}

/// The settings in effect, after merging the defaults, the configuration file and the
/// command line.
#[derive(PartialEq, Debug, Clone)]
pub struct Settings {
    pub forms_dir: PathBuf,
    pub responses_dir: PathBuf,
    pub policy: ValidationPolicy,
    pub sort_order: SortOrder,
    pub label_width: usize,
    pub top_responses: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            forms_dir: PathBuf::from("forms"),
            responses_dir: PathBuf::from("responses"),
            policy: ValidationPolicy::PERMISSIVE,
            sort_order: SortOrder::MostPopular,
            label_width: DEFAULT_LABEL_WIDTH,
            top_responses: DEFAULT_TOP_RESPONSES,
        }
    }
}

pub fn read_config(path: &str) -> SvResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: content: {:?}", contents);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

/// Builds the settings.
///
/// Relative directories of the configuration file are taken from the directory of that
/// file. The command line flags take precedence.
pub fn resolve_settings(args: &Args) -> SvResult<Settings> {
    let mut settings = Settings::default();

    if let Some(config_path) = args.config.as_deref() {
        let config = read_config(config_path)?;
        info!("config: {:?}", config);
        let root_p = Path::new(config_path)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        apply_config(&mut settings, &config, &root_p)?;
    }

    if let Some(d) = args.forms_dir.as_deref() {
        settings.forms_dir = PathBuf::from(d);
    }
    if let Some(d) = args.responses_dir.as_deref() {
        settings.responses_dir = PathBuf::from(d);
    }
    if args.strict {
        settings.policy = ValidationPolicy::STRICT;
    }
    debug!("resolve_settings: {:?}", settings);
    Ok(settings)
}

fn apply_config(settings: &mut Settings, config: &SurveyConfig, root_p: &Path) -> SvResult<()> {
    if let Some(d) = config.forms_directory.as_deref() {
        settings.forms_dir = root_p.join(d);
    }
    if let Some(d) = config.responses_directory.as_deref() {
        settings.responses_dir = root_p.join(d);
    }
    if let Some(strict) = config.strict_validation {
        settings.policy = ValidationPolicy { strict };
    }
    if let Some(name) = config.sort_order.as_deref() {
        settings.sort_order = match SortOrder::from_name(name) {
            Some(x) => x,
            None => whatever!("unknown sort order {:?}", name),
        };
    }
    match config.label_width {
        Some(0) => whatever!("labelWidth must be positive"),
        Some(x) => settings.label_width = x,
        None => {}
    }
    if let Some(x) = config.top_responses {
        settings.top_responses = x;
    }
    Ok(())
}

/// Reads a reference summary, to compare with a computed one.
pub fn read_summary(path: String) -> SvResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path: &path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config() {
        let c: SurveyConfig =
            serde_json::from_str(r#"{"strictValidation": true, "sortOrder": "alpha"}"#).unwrap();
        let mut s = Settings::default();
        apply_config(&mut s, &c, Path::new("/srv/surveys")).unwrap();
        assert_eq!(s.policy, ValidationPolicy::STRICT);
        assert_eq!(s.sort_order, SortOrder::Alphabetical);
        assert_eq!(s.forms_dir, PathBuf::from("forms"));
        assert_eq!(s.label_width, DEFAULT_LABEL_WIDTH);
    }

    #[test]
    fn directories_follow_the_config_file() {
        let c = SurveyConfig {
            forms_directory: Some("my_forms".to_string()),
            responses_directory: Some("/var/responses".to_string()),
            ..Default::default()
        };
        let mut s = Settings::default();
        apply_config(&mut s, &c, Path::new("/srv/surveys")).unwrap();
        assert_eq!(s.forms_dir, PathBuf::from("/srv/surveys/my_forms"));
        assert_eq!(s.responses_dir, PathBuf::from("/var/responses"));
    }

    #[test]
    fn bad_sort_order() {
        let c = SurveyConfig {
            sort_order: Some("random".to_string()),
            ..Default::default()
        };
        assert!(apply_config(&mut Settings::default(), &c, Path::new(".")).is_err());
    }

    #[test]
    fn command_line_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_p = tmp.path().join("survey.json");
        fs::write(
            &config_p,
            r#"{"formsDirectory": "f", "responsesDirectory": "r", "strictValidation": false}"#,
        )
        .unwrap();
        let args = Args {
            config: Some(config_p.display().to_string()),
            forms_dir: None,
            responses_dir: Some("elsewhere".to_string()),
            strict: true,
            verbose: false,
            command: crate::args::Command::List,
        };
        let s = resolve_settings(&args).unwrap();
        assert_eq!(s.forms_dir, tmp.path().join("f"));
        assert_eq!(s.responses_dir, PathBuf::from("elsewhere"));
        assert!(s.policy.strict);
    }
}
