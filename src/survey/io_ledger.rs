// Primitives for the response files.
//
// Each form has one CSV file: a header row with the question columns, then one row per
// committed response, in commit order.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use snafu::prelude::*;
use survey_session::{Form, ResponseRow, ResponseSink};

use crate::survey::{
    io_common::{ensure_dir, list_slugs, slug_path},
    *,
};

/// Everything stored for one form.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LedgerContents {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The append-only response files, one per form.
///
/// Appends to the same form are serialized within the process. Each append is a single
/// write, so a reader never sees half of a row from this process.
pub struct ResponseLedger {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResponseLedger {
    pub fn new(root: &Path) -> ResponseLedger {
        ResponseLedger {
            root: root.to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, slug: &str) -> SvResult<PathBuf> {
        slug_path(&self.root, slug, "csv")
    }

    fn lock_for(&self, slug: &str) -> Arc<Mutex<()>> {
        // A poisoned lock only means another append panicked: the file is still whole.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Appends one row, writing the header first if the file is new.
    ///
    /// A file whose last line has no line break gets one before the row. If the write
    /// fails, the file is cut back to its previous length.
    pub fn append_row(&self, slug: &str, row: &ResponseRow) -> SvResult<()> {
        let path = self.path_for(slug)?;
        let lock = self.lock_for(slug);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        ensure_dir(&self.root)?;
        let path_s = path.display().to_string();
        let header = row.header();
        let existing = read_header(&path)?;
        if let Some(h) = existing.as_ref() {
            if *h != header {
                return SchemaMismatchSnafu {
                    slug,
                    expected: h.clone(),
                    found: header,
                }
                .fail();
            }
        }

        let mut buf: Vec<u8> = Vec::new();
        {
            let mut wtr = csv::Writer::from_writer(&mut buf);
            if existing.is_none() {
                wtr.write_record(&header).context(CsvWriteSnafu {})?;
            }
            wtr.write_record(&row.values()).context(CsvWriteSnafu {})?;
            wtr.flush().context(WritingFileSnafu { path: &path_s })?;
        }

        let mut f = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .context(WritingFileSnafu { path: &path_s })?;
        let original_len = f
            .metadata()
            .context(WritingFileSnafu { path: &path_s })?
            .len();
        if original_len > 0 {
            let mut last = [0_u8; 1];
            f.seek(SeekFrom::Start(original_len - 1))
                .and_then(|_| f.read_exact(&mut last))
                .context(ReadingFileSnafu { path: &path_s })?;
            if last[0] != b'\n' {
                debug!("append_row: {:?} does not end with a line break", path_s);
                buf.insert(0, b'\n');
            }
        }
        if let Err(e) = f.write_all(&buf) {
            if let Err(e2) = f.set_len(original_len) {
                warn!("append_row: could not restore {:?}: {}", path_s, e2);
            }
            return Err(SurveyError::WritingFile {
                source: e,
                path: path_s,
            });
        }
        debug!("append_row: {} bytes to {:?}", buf.len(), path_s);
        info!("Response recorded for {:?}", slug);
        Ok(())
    }

    /// Reads the header and all the rows of a form.
    ///
    /// Rows may be shorter or longer than the header.
    pub fn read(&self, slug: &str) -> SvResult<LedgerContents> {
        let path = self.path_for(slug)?;
        if !has_content(&path) {
            return LedgerNotFoundSnafu { slug }.fail();
        }
        let path_s = path.display().to_string();
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .context(CsvOpenSnafu { path: &path_s })?;
        let mut records = rdr.into_records();
        let header: Vec<String> = match records.next() {
            Some(r) => r
                .context(CsvLineParseSnafu {
                    path: &path_s,
                    lineno: 1_u64,
                })?
                .iter()
                .map(|s| s.to_string())
                .collect(),
            None => return LedgerNotFoundSnafu { slug }.fail(),
        };
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (idx, line_r) in records.enumerate() {
            let lineno = (idx + 2) as u64;
            let line = line_r.context(CsvLineParseSnafu {
                path: &path_s,
                lineno,
            })?;
            rows.push(line.iter().map(|s| s.to_string()).collect());
        }
        debug!("read: {} rows from {:?}", rows.len(), path_s);
        Ok(LedgerContents { header, rows })
    }

    /// The slugs of the forms with at least one stored response file.
    pub fn list(&self) -> SvResult<Vec<String>> {
        let slugs = list_slugs(&self.root, "csv")?;
        Ok(slugs
            .into_iter()
            .filter(|s| self.path_for(s).map(|p| has_content(&p)).unwrap_or(false))
            .collect())
    }

    /// True if the form has a non-empty response file.
    pub fn has_responses(&self, slug: &str) -> SvResult<bool> {
        Ok(has_content(&self.path_for(slug)?))
    }

    /// Copies the raw file of a form. Returns the number of bytes copied.
    pub fn export<W: Write>(&self, slug: &str, out: &mut W) -> SvResult<u64> {
        let path = self.path_for(slug)?;
        if !has_content(&path) {
            return LedgerNotFoundSnafu { slug }.fail();
        }
        let path_s = path.display().to_string();
        let mut f = File::open(&path).context(ReadingFileSnafu { path: &path_s })?;
        std::io::copy(&mut f, out).context(WritingFileSnafu { path: "output" })
    }
}

impl ResponseSink for ResponseLedger {
    type Error = SurveyError;

    fn append(&self, form: &Form, row: &ResponseRow) -> SvResult<()> {
        self.append_row(&form.slug(), row)
    }
}

// An empty file is the same as no file.
fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn read_header(path: &Path) -> SvResult<Option<Vec<String>>> {
    if !has_content(path) {
        return Ok(None);
    }
    let path_s = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: &path_s })?;
    match rdr.records().next() {
        Some(r) => {
            let r = r.context(CsvLineParseSnafu {
                path: &path_s,
                lineno: 1_u64,
            })?;
            Ok(Some(r.iter().map(|s| s.to_string()).collect()))
        }
        None => Ok(None),
    }
}
