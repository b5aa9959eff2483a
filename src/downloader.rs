use crate::error::Result;
use crate::results::ShapedResults;

/// Column headers of the exported results table
pub const CSV_HEADERS: [&str; 3] = ["Compound (SMILES)", "Modulator Type", "AC50 Range"];

/// Suggested download name for CSV exports
pub const CSV_FILE_NAME: &str = "marc_results.csv";

/// Suggested download name for XLSX exports
pub const XLSX_FILE_NAME: &str = "marc_results.xlsx";

/// Convert shaped results to CSV format
///
/// One record per display row, in display order. Fields containing commas,
/// quotes or line breaks are quoted with embedded quotes doubled.
///
/// # Arguments
/// * `results` - Shaped results to export
///
/// # Returns
/// * `Result<String>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use pkm2pred::downloader::to_csv;
/// use pkm2pred::results::ShapedResults;
///
/// let csv = to_csv(&ShapedResults::default()).unwrap();
/// assert_eq!(csv, "Compound (SMILES),Modulator Type,AC50 Range\n");
/// ```
pub fn to_csv(results: &ShapedResults) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for row in &results.rows {
        writer.write_record([&row.identifier, &row.category, &row.range_text])?;
    }

    let buffer = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Convert shaped results to XLSX format
///
/// Same table as [`to_csv`], plus numeric median and bound columns for rows
/// that carry an AC50 range, written with the rust_xlsxwriter library.
///
/// # Arguments
/// * `results` - Shaped results to export
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(results: &ShapedResults) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    const RANGE_HEADERS: [&str; 3] = ["AC50 Median", "AC50 Lower Bound", "AC50 Upper Bound"];

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Results")?;

    let bold = Format::new().set_bold();
    for (col, header) in CSV_HEADERS.iter().chain(RANGE_HEADERS.iter()).enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (index, row) in results.rows.iter().enumerate() {
        let r = (index + 1) as u32;
        worksheet.write_string(r, 0, row.identifier.as_str())?;
        worksheet.write_string(r, 1, row.category.as_str())?;
        worksheet.write_string(r, 2, row.range_text.as_str())?;

        if let Some(range) = row.raw_range {
            worksheet.write_number(r, 3, range.median)?;
            worksheet.write_number(r, 4, range.lower)?;
            worksheet.write_number(r, 5, range.upper)?;
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
