//! Parsing of the national exam results CSV.
//!
//! The published file uses Vietnamese column names (`toan`, `ngu_van`, ...);
//! the English column keys are accepted as aliases. Score cells that are blank,
//! `null`, `NaN` or otherwise unreadable are stored as absent. Rows that cannot
//! be turned into a valid student are reported and skipped.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer};

use crate::models::{NewStudent, Scores};
use crate::service;

#[derive(Debug, Deserialize)]
struct CsvRow {
    sbd: String,
    #[serde(rename = "toan", alias = "math", default, deserialize_with = "lenient_score")]
    math: Option<f64>,
    #[serde(rename = "ngu_van", alias = "literature", default, deserialize_with = "lenient_score")]
    literature: Option<f64>,
    #[serde(
        rename = "ngoai_ngu",
        alias = "foreign_language",
        default,
        deserialize_with = "lenient_score"
    )]
    foreign_language: Option<f64>,
    #[serde(rename = "vat_li", alias = "physics", default, deserialize_with = "lenient_score")]
    physics: Option<f64>,
    #[serde(rename = "hoa_hoc", alias = "chemistry", default, deserialize_with = "lenient_score")]
    chemistry: Option<f64>,
    #[serde(rename = "sinh_hoc", alias = "biology", default, deserialize_with = "lenient_score")]
    biology: Option<f64>,
    #[serde(rename = "lich_su", alias = "history", default, deserialize_with = "lenient_score")]
    history: Option<f64>,
    #[serde(rename = "dia_li", alias = "geography", default, deserialize_with = "lenient_score")]
    geography: Option<f64>,
    #[serde(
        rename = "gdcd",
        alias = "civic_education",
        default,
        deserialize_with = "lenient_score"
    )]
    civic_education: Option<f64>,
    #[serde(
        rename = "ma_ngoai_ngu",
        alias = "foreign_language_code",
        default,
        deserialize_with = "blank_as_none"
    )]
    foreign_language_code: Option<String>,
}

impl CsvRow {
    fn into_student(self) -> NewStudent {
        NewStudent {
            sbd: self.sbd.trim().to_string(),
            scores: Scores {
                math: self.math,
                literature: self.literature,
                foreign_language: self.foreign_language,
                physics: self.physics,
                chemistry: self.chemistry,
                biology: self.biology,
                history: self.history,
                geography: self.geography,
                civic_education: self.civic_education,
            },
            foreign_language_code: self.foreign_language_code,
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty() && !raw.eq_ignore_ascii_case("null")))
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(blank_as_none(deserializer)?
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|score| score.is_finite()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub students: Vec<NewStudent>,
    pub errors: Vec<RowError>,
}

pub fn parse_reader<R: Read>(reader: R) -> anyhow::Result<ParsedCsv> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = reader
        .headers()
        .context("failed to read CSV header")?
        .clone();
    let mut parsed = ParsedCsv::default();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut last_line = 1;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                if err.is_io_error() {
                    return Err(err).context("failed to read CSV input");
                }
                let line = err.position().map_or(last_line + 1, line_of);
                last_line = line;
                parsed.errors.push(RowError {
                    line,
                    message: err.to_string(),
                });
                continue;
            }
        };
        // Records may span several physical lines when a quoted cell holds a newline.
        let line = record.position().map_or(last_line + 1, line_of);
        last_line = line;

        let student = match record.deserialize::<CsvRow>(Some(&headers)) {
            Ok(row) => row.into_student(),
            Err(err) => {
                parsed.errors.push(RowError {
                    line,
                    message: err.to_string(),
                });
                continue;
            }
        };

        if let Err(err) = service::validate_new_student(&student) {
            parsed.errors.push(RowError {
                line,
                message: err.to_string(),
            });
            continue;
        }

        if let Some(first) = first_seen.get(&student.sbd) {
            parsed.errors.push(RowError {
                line,
                message: format!(
                    "duplicate registration code {} (first seen on line {first})",
                    student.sbd
                ),
            });
            continue;
        }
        first_seen.insert(student.sbd.clone(), line);
        parsed.students.push(student);
    }

    Ok(parsed)
}

fn line_of(position: &csv::Position) -> usize {
    usize::try_from(position.line()).unwrap_or(usize::MAX)
}

pub fn read_path(path: &Path) -> anyhow::Result<ParsedCsv> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    parse_reader(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_vietnamese_headers() {
        let data = "sbd,toan,ngu_van,ngoai_ngu,vat_li,hoa_hoc,sinh_hoc,lich_su,dia_li,gdcd,\
                    ma_ngoai_ngu\n\
                    01000001,8.4,6.75,8.0,6.0,5.25,5.0,,,,N1\n\
                    01000002,8.6,8.5,7.2,,,,7.75,6.0,8.75,N1\n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.students.len(), 2);
        let first = &parsed.students[0];
        assert_eq!(first.sbd, "01000001");
        assert_eq!(first.scores.math, Some(8.4));
        assert_eq!(first.scores.chemistry, Some(5.25));
        assert_eq!(first.scores.history, None);
        assert_eq!(first.foreign_language_code.as_deref(), Some("N1"));
        assert_eq!(parsed.students[1].scores.physics, None);
        assert_eq!(parsed.students[1].scores.civic_education, Some(8.75));
    }

    #[test]
    fn accepts_english_headers_and_missing_columns() {
        let data = "sbd,math,physics,chemistry\n01001001,9.5,9.2,9.8\n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        assert_eq!(parsed.students.len(), 1);
        let student = &parsed.students[0];
        assert_eq!(student.scores.physics, Some(9.2));
        assert_eq!(student.scores.literature, None);
        assert_eq!(student.foreign_language_code, None);
    }

    #[test]
    fn unreadable_scores_become_absent() {
        let data = "sbd,toan,vat_li,hoa_hoc,ma_ngoai_ngu\n01000003,null,abc,NaN, \n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        let student = &parsed.students[0];
        assert_eq!(student.scores.math, None);
        assert_eq!(student.scores.physics, None);
        assert_eq!(student.scores.chemistry, None);
        assert_eq!(student.foreign_language_code, None);
    }

    #[test]
    fn invalid_rows_are_reported_and_skipped() {
        let data = "sbd,toan\n,5.0\n01000004,12.5\n01000005,7.0\n01000006\n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        assert_eq!(parsed.students.len(), 1);
        assert_eq!(parsed.students[0].sbd, "01000005");
        let lines: Vec<usize> = parsed.errors.iter().map(|err| err.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
    }

    #[test]
    fn line_numbers_follow_multiline_cells() {
        let data = "sbd,toan,ma_ngoai_ngu\n\
                    01000001,5.0,\"N\n1\"\n\
                    ,7.0,N1\n\
                    01000003,abc,def,ghi\n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        assert_eq!(parsed.students.len(), 1);
        assert_eq!(parsed.students[0].foreign_language_code.as_deref(), Some("N\n1"));
        let lines: Vec<usize> = parsed.errors.iter().map(|err| err.line).collect();
        assert_eq!(lines, vec![4, 5]);
    }

    #[test]
    fn repeated_registration_codes_keep_the_first_row() {
        let data = "sbd,toan\n01000001,5.0\n01000002,6.0\n01000001,9.0\n";
        let parsed = parse_reader(data.as_bytes()).unwrap();

        assert_eq!(parsed.students.len(), 2);
        assert_eq!(parsed.students[0].scores.math, Some(5.0));
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 4);
        assert!(parsed.errors[0]
            .message
            .contains("duplicate registration code 01000001 (first seen on line 2)"));
    }

    #[test]
    fn reads_file_with_byte_order_mark() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}sbd,toan,vat_li,hoa_hoc\n01001001,9.5,9.2,9.8\n").unwrap();
        file.flush().unwrap();

        let parsed = read_path(file.path()).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.students[0].sbd, "01001001");
        assert_eq!(parsed.students[0].scores.math, Some(9.5));
    }
}
