use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::SubjectGroup;
use crate::stats::{BandReport, RankedEntry, ScoreCard};

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.2}"),
        None => "-".to_string(),
    }
}

pub fn render_band_table(report: &BandReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Total students: {}", report.total_records);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Subject | Excellent (>= 8) | Good (6-8) | Average (4-6) | Below average (< 4) | Scored |"
    );
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---:|");
    for bands in report.per_subject.iter() {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            bands.subject,
            bands.excellent,
            bands.good,
            bands.average,
            bands.below_average,
            bands.classified()
        );
    }

    output
}

pub fn render_ranking(group: SubjectGroup, entries: &[RankedEntry]) -> String {
    let mut output = String::new();

    if entries.is_empty() {
        let _ = writeln!(
            output,
            "No students have all three {} scores.",
            group.code()
        );
        return output;
    }

    let [first, second, third] = group.subjects();
    let _ = writeln!(
        output,
        "| Rank | SBD | {} | {} | {} | Total | Average |",
        first.display_name(),
        second.display_name(),
        third.display_name()
    );
    let _ = writeln!(output, "|---:|---|---:|---:|---:|---:|---:|");
    for entry in entries {
        let _ = writeln!(
            output,
            "| {} | {} | {:.2} | {:.2} | {:.2} | {:.1} | {:.2} |",
            entry.rank,
            entry.sbd,
            entry.scores[0],
            entry.scores[1],
            entry.scores[2],
            entry.composite,
            entry.average
        );
    }

    output
}

pub fn render_score_card(card: &ScoreCard) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Registration code: {}", card.sbd);
    if let Some(code) = &card.foreign_language_code {
        let _ = writeln!(output, "Foreign language code: {code}");
    }
    for entry in card.scores.iter() {
        let band = entry.band.map(|band| band.label()).unwrap_or("not taken");
        let _ = writeln!(
            output,
            "- {}: {} ({})",
            entry.subject.display_name(),
            format_score(entry.score),
            band
        );
    }
    if let Some(group) = &card.group_a00 {
        let _ = writeln!(
            output,
            "Group {}: total {:.1}, average {:.2}",
            group.group.code(),
            group.composite,
            group.average
        );
    }

    output
}

pub fn build_report(
    generated_on: NaiveDate,
    bands: &BandReport,
    group: SubjectGroup,
    ranking: &[RankedEntry],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Exam Score Report");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Bands by Subject");

    if bands.total_records == 0 {
        let _ = writeln!(output, "No students recorded.");
    } else {
        let _ = writeln!(output);
        output.push_str(&render_band_table(bands));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top {} Students, Group {}", ranking.len(), group.code());
    let _ = writeln!(output);
    output.push_str(&render_ranking(group, ranking));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scores, StudentRecord, Subject};
    use crate::stats;
    use uuid::Uuid;

    fn records() -> Vec<StudentRecord> {
        [
            ("01001001", Some(9.5), Some(9.2), Some(9.8)),
            ("01001002", Some(9.0), Some(9.5), Some(9.0)),
            ("01001003", None, Some(9.0), Some(9.0)),
        ]
        .into_iter()
        .map(|(sbd, math, physics, chemistry)| StudentRecord {
            id: Uuid::new_v4(),
            sbd: sbd.to_string(),
            scores: Scores {
                math,
                physics,
                chemistry,
                ..Scores::default()
            },
            foreign_language_code: None,
        })
        .collect()
    }

    #[test]
    fn report_lists_subjects_and_ranked_students() {
        let records = records();
        let bands = stats::compute_band_report(&records, &Subject::ALL);
        let ranking = stats::compute_top_composite(&records, SubjectGroup::A00, 10);
        let date = NaiveDate::from_ymd_opt(2024, 7, 17).unwrap();

        let report = build_report(date, &bands, SubjectGroup::A00, &ranking);
        assert!(report.contains("Generated on 2024-07-17"));
        assert!(report.contains("Total students: 3"));
        assert!(report.contains("| Civic Education | 0 | 0 | 0 | 0 | 0 |"));
        assert!(report.contains("| Math | 2 | 0 | 0 | 0 | 2 |"));
        assert!(report.contains("## Top 2 Students, Group A00"));
        assert!(report.contains("| 1 | 01001001 | 9.50 | 9.20 | 9.80 | 28.5 | 9.50 |"));
        assert!(report.contains("| 2 | 01001002 |"));
        assert!(!report.contains("01001003"));
    }

    #[test]
    fn empty_store_report_says_so() {
        let bands = stats::compute_band_report(&[], &Subject::ALL);
        let date = NaiveDate::from_ymd_opt(2024, 7, 17).unwrap();

        let report = build_report(date, &bands, SubjectGroup::A00, &[]);
        assert!(report.contains("No students recorded."));
        assert!(report.contains("No students have all three A00 scores."));
    }

    #[test]
    fn score_card_marks_untaken_subjects() {
        let card = stats::score_card(&records()[2]);
        let text = render_score_card(&card);
        assert!(text.contains("- Math: - (not taken)"));
        assert!(text.contains("- Physics: 9.00 (excellent)"));
        assert!(!text.contains("Group A00"));
    }
}
