use serde::Serialize;

use crate::models::{StudentRecord, Subject, SubjectGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Excellent,
    Good,
    Average,
    BelowAverage,
}

impl Band {
    pub fn label(self) -> &'static str {
        match self {
            Band::Excellent => "excellent",
            Band::Good => "good",
            Band::Average => "average",
            Band::BelowAverage => "below average",
        }
    }
}

/// Lower bounds, highest first. A score belongs to the first band whose floor it reaches.
const BAND_FLOORS: [(f64, Band); 3] = [
    (8.0, Band::Excellent),
    (6.0, Band::Good),
    (4.0, Band::Average),
];

/// Scores are classified as given: 11.0 is excellent, -1.0 and NaN fall through to
/// below average.
pub fn classify(score: f64) -> Band {
    BAND_FLOORS
        .iter()
        .find(|(floor, _)| score >= *floor)
        .map(|(_, band)| *band)
        .unwrap_or(Band::BelowAverage)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectBands {
    pub subject: String,
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub below_average: usize,
}

impl SubjectBands {
    fn new(subject: Subject) -> Self {
        Self {
            subject: subject.display_name(),
            excellent: 0,
            good: 0,
            average: 0,
            below_average: 0,
        }
    }

    fn count(&mut self, band: Band) {
        match band {
            Band::Excellent => self.excellent += 1,
            Band::Good => self.good += 1,
            Band::Average => self.average += 1,
            Band::BelowAverage => self.below_average += 1,
        }
    }

    /// Number of records with a present score for this subject.
    pub fn classified(&self) -> usize {
        self.excellent + self.good + self.average + self.below_average
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandReport {
    pub total_records: usize,
    pub subjects: Vec<String>,
    pub per_subject: Vec<SubjectBands>,
}

pub fn compute_band_report(records: &[StudentRecord], subjects: &[Subject]) -> BandReport {
    let per_subject = subjects
        .iter()
        .map(|&subject| {
            let mut bands = SubjectBands::new(subject);
            for score in records.iter().filter_map(|record| record.score(subject)) {
                bands.count(classify(score));
            }
            bands
        })
        .collect();

    BandReport {
        total_records: records.len(),
        subjects: subjects.iter().map(|subject| subject.display_name()).collect(),
        per_subject,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub sbd: String,
    pub subjects: [Subject; 3],
    pub scores: [f64; 3],
    pub composite: f64,
    pub average: f64,
}

/// Composite of a record over a group, or `None` when any of the three scores is absent.
pub fn group_scores(record: &StudentRecord, group: SubjectGroup) -> Option<[f64; 3]> {
    let [first, second, third] = group.subjects();
    Some([
        record.score(first)?,
        record.score(second)?,
        record.score(third)?,
    ])
}

/// Ranks eligible records by group average, highest first. Equal averages are
/// ordered by registration code ascending.
pub fn compute_top_composite(
    records: &[StudentRecord],
    group: SubjectGroup,
    limit: usize,
) -> Vec<RankedEntry> {
    let mut eligible: Vec<(&StudentRecord, [f64; 3], f64, f64)> = records
        .iter()
        .filter_map(|record| {
            let scores = group_scores(record, group)?;
            let composite = scores[0] + scores[1] + scores[2];
            Some((record, scores, composite, composite / 3.0))
        })
        .collect();

    eligible.sort_by(|a, b| b.3.total_cmp(&a.3).then_with(|| a.0.sbd.cmp(&b.0.sbd)));

    eligible
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (record, scores, composite, average))| RankedEntry {
            rank: index + 1,
            sbd: record.sbd.clone(),
            subjects: group.subjects(),
            scores,
            composite,
            average,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectScore {
    pub subject: Subject,
    pub score: Option<f64>,
    pub band: Option<Band>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComposite {
    pub group: SubjectGroup,
    pub composite: f64,
    pub average: f64,
}

/// Score lookup response for a single student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub sbd: String,
    pub scores: Vec<SubjectScore>,
    pub foreign_language_code: Option<String>,
    pub group_a00: Option<GroupComposite>,
}

pub fn score_card(record: &StudentRecord) -> ScoreCard {
    let scores = Subject::ALL
        .into_iter()
        .map(|subject| {
            let score = record.score(subject);
            SubjectScore {
                subject,
                score,
                band: score.map(classify),
            }
        })
        .collect();

    let group_a00 = group_scores(record, SubjectGroup::A00).map(|scores| {
        let composite = scores[0] + scores[1] + scores[2];
        GroupComposite {
            group: SubjectGroup::A00,
            composite,
            average: composite / 3.0,
        }
    });

    ScoreCard {
        sbd: record.sbd.clone(),
        scores,
        foreign_language_code: record.foreign_language_code.clone(),
        group_a00,
    }
}
