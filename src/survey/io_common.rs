use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use snafu::prelude::*;

use crate::survey::*;

/// Refuses the names that would not stay inside the storage directory.
pub fn check_slug(slug: &str) -> SvResult<()> {
    let escapes = slug.contains(&['/', '\\'][..]) || slug == "." || slug == "..";
    if slug.trim().is_empty() || escapes {
        return InvalidSlugSnafu { slug }.fail();
    }
    Ok(())
}

/// The path of the document for a slug, in the given directory.
pub fn slug_path(root: &Path, slug: &str, extension: &str) -> SvResult<PathBuf> {
    check_slug(slug)?;
    Ok(root.join(format!("{}.{}", slug, extension)))
}

/// The slugs of all the files with the given extension, sorted.
///
/// A missing directory has no files.
pub fn list_slugs(root: &Path, extension: &str) -> SvResult<Vec<String>> {
    if !root.exists() {
        debug!("list_slugs: {:?} does not exist", root);
        return Ok(vec![]);
    }
    let path = root.display().to_string();
    let entries = fs::read_dir(root).context(ListingDirSnafu { path: &path })?;
    let mut res: Vec<String> = Vec::new();
    for entry in entries {
        let p = entry.context(ListingDirSnafu { path: &path })?.path();
        if p.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = p.file_stem().and_then(|s| s.to_str()) {
            res.push(stem.to_string());
        }
    }
    res.sort();
    Ok(res)
}

/// Creates the directory if needed.
pub fn ensure_dir(root: &Path) -> SvResult<()> {
    fs::create_dir_all(root).context(WritingFileSnafu {
        path: root.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt", "c.csv"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        assert_eq!(list_slugs(tmp.path(), "json").unwrap(), vec!["a", "b"]);
        assert_eq!(list_slugs(tmp.path(), "csv").unwrap(), vec!["c"]);
        assert!(list_slugs(&tmp.path().join("missing"), "csv")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn paths() {
        assert_eq!(
            slug_path(Path::new("forms"), "my_survey", "json").unwrap(),
            PathBuf::from("forms/my_survey.json")
        );
        assert_eq!(
            slug_path(Path::new("forms"), "wait..._what", "json").unwrap(),
            PathBuf::from("forms/wait..._what.json")
        );
    }

    #[test]
    fn names_stay_in_the_directory() {
        for slug in ["../x", "a/b", "..\\x", "..", ".", "", " "] {
            assert!(
                matches!(
                    slug_path(Path::new("forms"), slug, "json"),
                    Err(SurveyError::InvalidSlug { .. })
                ),
                "{:?}",
                slug
            );
        }
    }
}
