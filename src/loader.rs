use crate::error::{Error, Result};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;

/// Default cap on the number of compounds accepted per submission
pub const DEFAULT_MAX_COMPOUNDS: usize = 20;

/// Default cap on uploaded file size (1 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

const HEADER_KEYWORDS: [&str; 3] = ["smiles", "compound", "molecule"];
const MAX_HEADER_LEN: usize = 50;
const MIN_IDENTIFIER_LEN: usize = 3;

lazy_static! {
    static ref TEXT_SEPARATOR: Regex = Regex::new(r"[\n,]+").unwrap();
    static ref LINE_BREAK: Regex = Regex::new(r"\r?\n").unwrap();
    static ref FIELD_SEPARATOR: Regex = Regex::new(r"[,;\t]").unwrap();
}

/// How an uploaded file is read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// CSV and other delimited text
    DelimitedText,

    /// XLSX or legacy XLS workbook
    Spreadsheet,
}

impl FileKind {
    /// Detect the file kind from its name and, failing that, its MIME type
    ///
    /// # Arguments
    /// * `file_name` - Name of the uploaded file, extension included
    /// * `content_type` - MIME type reported by the client, if any
    ///
    /// # Returns
    /// * `Result<FileKind>` - The detected kind, or `Error::FileTypeRejected`
    ///
    /// # Examples
    /// ```
    /// use pkm2pred::loader::FileKind;
    ///
    /// assert_eq!(FileKind::detect("batch.XLSX", None).unwrap(), FileKind::Spreadsheet);
    /// assert_eq!(FileKind::detect("upload", Some("text/csv")).unwrap(), FileKind::DelimitedText);
    /// assert!(FileKind::detect("notes.txt", None).is_err());
    /// ```
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Result<FileKind> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileKind::DelimitedText),
            Some("xlsx") | Some("xls") => Ok(FileKind::Spreadsheet),
            _ if content_type == Some("text/csv") => Ok(FileKind::DelimitedText),
            _ => Err(Error::FileTypeRejected),
        }
    }
}

/// A file handed over by the user, read fully into memory
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Original file name
    pub name: String,

    /// MIME type reported by the client
    pub content_type: Option<String>,

    /// Raw file contents
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn kind(&self) -> Result<FileKind> {
        FileKind::detect(&self.name, self.content_type.as_deref())
    }
}

/// Where the compounds of one submission come from
#[derive(Clone, Copy, Debug)]
pub enum CompoundInput<'a> {
    /// Free text, compounds separated by commas or newlines
    Text(&'a str),

    /// Uploaded CSV/XLS/XLSX file, compounds in the first column
    File(&'a UploadedFile),
}

/// Bounds applied while normalizing a submission
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_compounds: usize,
    pub max_upload_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_compounds: DEFAULT_MAX_COMPOUNDS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Normalize one submission into the ordered list of compound identifiers
///
/// Text is split on commas and newlines; files are read through
/// [`identifiers_from_file`]. The result is never empty and never longer than
/// `limits.max_compounds`.
///
/// # Arguments
/// * `input` - Text or file submitted by the user
/// * `limits` - Compound count and upload size bounds
///
/// # Returns
/// * `Result<Vec<String>>` - Identifiers in input order, or the reason they were refused
///
/// # Examples
/// ```
/// use pkm2pred::loader::{normalize, CompoundInput, Limits};
///
/// let ids = normalize(CompoundInput::Text("CCC,CCO\nCNC(=O)C1=CN=CN1"), &Limits::default()).unwrap();
/// assert_eq!(ids, vec!["CCC", "CCO", "CNC(=O)C1=CN=CN1"]);
/// ```
pub fn normalize(input: CompoundInput<'_>, limits: &Limits) -> Result<Vec<String>> {
    let identifiers = match input {
        CompoundInput::Text(text) => identifiers_from_text(text),
        CompoundInput::File(file) => {
            if file.data.len() > limits.max_upload_bytes {
                warn!(
                    "Rejected {} ({} bytes, limit {})",
                    file.name,
                    file.data.len(),
                    limits.max_upload_bytes
                );
                return Err(Error::FileTooLarge {
                    limit: limits.max_upload_bytes,
                });
            }
            let identifiers = identifiers_from_file(file)?;
            if identifiers.is_empty() {
                return Err(Error::NoValidSmilesInFile);
            }
            identifiers
        }
    };

    if identifiers.is_empty() {
        return Err(Error::NoInputProvided);
    }
    if identifiers.len() > limits.max_compounds {
        return Err(Error::CountExceeded {
            limit: limits.max_compounds,
            provided: identifiers.len(),
        });
    }

    Ok(identifiers)
}

/// Split free text into identifiers
///
/// Separators are commas and newlines; tokens are trimmed and empty tokens
/// dropped.
pub fn identifiers_from_text(text: &str) -> Vec<String> {
    TEXT_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract identifiers from the first column of an uploaded file
///
/// Spreadsheets are read with calamine (first sheet only), delimited text
/// with the csv crate. A CSV the structured reader rejects is split line by
/// line on `,`, `;` or tab instead. A leading header row is skipped and
/// cells that are too short or repeat header words are dropped.
///
/// # Arguments
/// * `file` - The uploaded file
///
/// # Returns
/// * `Result<Vec<String>>` - Identifiers in row order, possibly empty
///
/// # Errors
/// * `Error::FileTypeRejected` if the file is neither CSV nor XLS/XLSX
/// * `Error::FileParseFailed` if a workbook cannot be opened
pub fn identifiers_from_file(file: &UploadedFile) -> Result<Vec<String>> {
    let cells = match file.kind()? {
        FileKind::Spreadsheet => spreadsheet_first_column(&file.data)?,
        FileKind::DelimitedText => match delimited_first_column(&file.data) {
            Ok(cells) => cells,
            Err(e) => {
                warn!(
                    "Structured parse of {} failed ({}), falling back to line splitting",
                    file.name, e
                );
                naive_first_column(&String::from_utf8_lossy(&file.data))
            }
        },
    };

    let has_rows = !cells.is_empty();
    let identifiers = first_column_identifiers(cells);
    if identifiers.is_empty() && has_rows {
        warn!(
            "File {} parsed but no valid SMILES extracted. Check first column and header logic.",
            file.name
        );
    }

    Ok(identifiers)
}

fn spreadsheet_first_column(data: &[u8]) -> Result<Vec<String>> {
    use calamine::{Reader, open_workbook_auto_from_rs};

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| Error::FileParseFailed(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::FileParseFailed("No sheets found in the file.".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::FileParseFailed(e.to_string()))?;

    // Blank rows are skipped entirely, matching how the rows are counted for
    // header detection.
    Ok(range
        .rows()
        .filter(|row| row.iter().any(|cell| !cell_text(cell).is_empty()))
        .map(|row| row.first().map(cell_text).unwrap_or_default())
        .collect())
}

fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;

    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn delimited_first_column(data: &[u8]) -> std::result::Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        cells.push(record.get(0).unwrap_or_default().trim().to_string());
    }

    Ok(cells)
}

fn naive_first_column(text: &str) -> Vec<String> {
    LINE_BREAK
        .split(text)
        .map(|line| {
            FIELD_SEPARATOR
                .split(line)
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .collect()
}

fn first_column_identifiers(cells: Vec<String>) -> Vec<String> {
    let start = if cells.len() > 1 && looks_like_header(&cells[0]) {
        1
    } else {
        0
    };

    cells
        .into_iter()
        .skip(start)
        .filter(|cell| is_identifier_cell(cell))
        .collect()
}

fn looks_like_header(cell: &str) -> bool {
    let lower = cell.trim().to_lowercase();
    lower.chars().count() < MAX_HEADER_LEN
        && HEADER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn is_identifier_cell(cell: &str) -> bool {
    let lower = cell.to_lowercase();
    cell.chars().count() >= MIN_IDENTIFIER_LEN
        && !lower.contains("smiles")
        && !lower.contains("compound")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(contents: &str) -> UploadedFile {
        UploadedFile::new("batch.csv", contents.as_bytes().to_vec())
    }

    #[test]
    fn text_tokens_are_trimmed_and_never_empty() {
        let ids = identifiers_from_text(" CCO ,,\n\n  CCN\r\n, ,c1ccccc1,");
        assert_eq!(ids, vec!["CCO", "CCN", "c1ccccc1"]);
        assert!(ids.iter().all(|id| !id.trim().is_empty()));
    }

    #[test]
    fn twenty_one_compounds_exceed_the_limit() {
        let text = (0..21)
            .map(|i| format!("C{}O", i))
            .collect::<Vec<_>>()
            .join(",");
        let err = normalize(CompoundInput::Text(&text), &Limits::default()).unwrap_err();

        match err {
            Error::CountExceeded { limit, provided } => {
                assert_eq!(limit, 20);
                assert_eq!(provided, 21);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            normalize(CompoundInput::Text(&text), &Limits::default())
                .unwrap_err()
                .to_string(),
            "Max 20 compounds allowed. You provided 21."
        );
    }

    #[test]
    fn blank_text_is_no_input() {
        let err = normalize(CompoundInput::Text(" ,\n , "), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::NoInputProvided));
    }

    #[test]
    fn csv_header_row_is_skipped() {
        let file = csv_file("SMILES\nCCO\nc1ccccc1\n");
        let ids = normalize(CompoundInput::File(&file), &Limits::default()).unwrap();
        assert_eq!(ids, vec!["CCO", "c1ccccc1"]);
    }

    #[test]
    fn csv_uses_first_column_only() {
        let file = csv_file("compound_id,activity\n\"CC,O\",1\nCCN,0\n,5\nCC,3\n");
        let ids = identifiers_from_file(&file).unwrap();
        assert_eq!(ids, vec!["CC,O", "CCN"]);
    }

    #[test]
    fn single_row_is_never_treated_as_header() {
        let file = csv_file("Molecule_X1\n");
        let ids = identifiers_from_file(&file).unwrap();
        assert_eq!(ids, vec!["Molecule_X1"]);
    }

    #[test]
    fn file_with_only_a_header_has_no_valid_smiles() {
        let file = csv_file("SMILES\n\n");
        let err = normalize(CompoundInput::File(&file), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::NoValidSmilesInFile));
    }

    #[test]
    fn invalid_utf8_falls_back_to_line_splitting() {
        let mut data = b"SMILES;label\nCCN;1\n".to_vec();
        data.extend_from_slice(b"CC\xffO\tx\r\nCCCl\n");
        let file = UploadedFile::new("batch.csv", data);

        let ids = identifiers_from_file(&file).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "CCN");
        assert_eq!(ids[1], "CC\u{FFFD}O");
        assert_eq!(ids[2], "CCCl");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = UploadedFile::new("batch.txt", b"CCO\n".to_vec());
        let err = normalize(CompoundInput::File(&file), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::FileTypeRejected));
    }

    #[test]
    fn csv_mime_type_is_accepted_without_extension() {
        let file = UploadedFile::new("clipboard", b"CCO\nCCN\n".to_vec())
            .with_content_type("text/csv");
        assert_eq!(identifiers_from_file(&file).unwrap(), vec!["CCO", "CCN"]);
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let file = csv_file("CCO\nCCN\n");
        let limits = Limits {
            max_compounds: 20,
            max_upload_bytes: 4,
        };
        let err = normalize(CompoundInput::File(&file), &limits).unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { limit: 4 }));
        assert_eq!(
            err.to_string(),
            "File is too large. Maximum upload size is 4 bytes."
        );
    }

    #[test]
    fn broken_workbook_is_a_parse_error() {
        let file = UploadedFile::new("batch.xlsx", b"definitely not a zip".to_vec());
        let err = identifiers_from_file(&file).unwrap_err();
        assert!(matches!(err, Error::FileParseFailed(_)));
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_first_sheet_first_column() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Compound").unwrap();
        worksheet.write_string(0, 1, "Notes").unwrap();
        worksheet.write_string(1, 0, "CCO").unwrap();
        worksheet.write_string(2, 0, "c1ccccc1").unwrap();
        worksheet.write_number(3, 0, 12345.0).unwrap();
        worksheet.write_string(4, 0, "N").unwrap();
        let data = workbook.save_to_buffer().unwrap();

        let file = UploadedFile::new("batch.xlsx", data);
        let ids = identifiers_from_file(&file).unwrap();
        assert_eq!(ids, vec!["CCO", "c1ccccc1", "12345"]);
    }
}
