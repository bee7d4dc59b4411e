use rust_xlsxwriter::{Format, Workbook};

use crate::db::{DbContact, DbExhibition};
use crate::error::ExpoError;

const HEADERS: [&str; 6] = ["City", "Full name", "Position", "Phone", "Email", "Met at"];
const COLUMN_WIDTHS: [f64; 6] = [18.0, 32.0, 28.0, 20.0, 30.0, 40.0];
const NOT_SPECIFIED: &str = "Not specified";

fn or_not_specified(v: &str) -> &str {
    let v = v.trim();
    if v.is_empty() { NOT_SPECIFIED } else { v }
}

/// Excel forbids `[]:*?/\` in sheet names and caps them at 31 chars.
pub fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let cleaned: String = cleaned.trim().trim_matches('\'').chars().take(31).collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Contacts".to_string()
    } else {
        cleaned
    }
}

pub fn export_file_name(exhibition_id: i64) -> String {
    format!("statistics_exhibition_{exhibition_id}.xlsx")
}

/// One row per contact; the last column names where the contact was met.
pub fn contacts_workbook(
    exhibition: &DbExhibition,
    contacts: &[DbContact],
) -> Result<Vec<u8>, ExpoError> {
    let met_at = format!(
        "{} {}",
        exhibition.start_date.format("%d.%m.%Y"),
        exhibition.title
    );

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(&exhibition.title))?;

    for (col, (title, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &header)?;
        sheet.set_column_width(col, width)?;
    }

    for (i, c) in contacts.iter().enumerate() {
        let row = i as u32 + 1;
        let cells = [
            or_not_specified(c.city.as_deref().unwrap_or_default()),
            or_not_specified(&c.full_name),
            or_not_specified(&c.position),
            or_not_specified(&c.phone_number),
            or_not_specified(&c.email),
            met_at.as_str(),
        ];
        for (col, value) in cells.into_iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
