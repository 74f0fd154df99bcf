use clap::ValueEnum;
use serde::Serialize;
use uuid::Uuid;

/// Exam subjects in the order every report lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Literature,
    ForeignLanguage,
    Physics,
    Chemistry,
    Biology,
    History,
    Geography,
    CivicEducation,
}

impl Subject {
    pub const ALL: [Subject; 9] = [
        Subject::Math,
        Subject::Literature,
        Subject::ForeignLanguage,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::History,
        Subject::Geography,
        Subject::CivicEducation,
    ];

    /// Column name used by the store and the JSON output.
    pub fn key(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Literature => "literature",
            Subject::ForeignLanguage => "foreign_language",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::CivicEducation => "civic_education",
        }
    }

    pub fn display_name(self) -> String {
        title_case(self.key())
    }
}

/// `civic_education` -> `Civic Education`.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut out: String = first.to_uppercase().collect();
                    out.push_str(&chars.as_str().to_lowercase());
                    out
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Standard admission groups: three subjects whose scores are summed for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "verbatim")]
pub enum SubjectGroup {
    A00,
    A01,
    B00,
    C00,
    D01,
}

impl SubjectGroup {
    pub fn subjects(self) -> [Subject; 3] {
        match self {
            SubjectGroup::A00 => [Subject::Math, Subject::Physics, Subject::Chemistry],
            SubjectGroup::A01 => [Subject::Math, Subject::Physics, Subject::ForeignLanguage],
            SubjectGroup::B00 => [Subject::Math, Subject::Chemistry, Subject::Biology],
            SubjectGroup::C00 => [Subject::Literature, Subject::History, Subject::Geography],
            SubjectGroup::D01 => [Subject::Math, Subject::Literature, Subject::ForeignLanguage],
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SubjectGroup::A00 => "A00",
            SubjectGroup::A01 => "A01",
            SubjectGroup::B00 => "B00",
            SubjectGroup::C00 => "C00",
            SubjectGroup::D01 => "D01",
        }
    }
}

/// The nine optional subject scores. `None` means the student did not sit the subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Scores {
    pub math: Option<f64>,
    pub literature: Option<f64>,
    pub foreign_language: Option<f64>,
    pub physics: Option<f64>,
    pub chemistry: Option<f64>,
    pub biology: Option<f64>,
    pub history: Option<f64>,
    pub geography: Option<f64>,
    pub civic_education: Option<f64>,
}

impl Scores {
    pub fn get(&self, subject: Subject) -> Option<f64> {
        match subject {
            Subject::Math => self.math,
            Subject::Literature => self.literature,
            Subject::ForeignLanguage => self.foreign_language,
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Biology => self.biology,
            Subject::History => self.history,
            Subject::Geography => self.geography,
            Subject::CivicEducation => self.civic_education,
        }
    }

    pub fn set(&mut self, subject: Subject, value: Option<f64>) {
        let slot = match subject {
            Subject::Math => &mut self.math,
            Subject::Literature => &mut self.literature,
            Subject::ForeignLanguage => &mut self.foreign_language,
            Subject::Physics => &mut self.physics,
            Subject::Chemistry => &mut self.chemistry,
            Subject::Biology => &mut self.biology,
            Subject::History => &mut self.history,
            Subject::Geography => &mut self.geography,
            Subject::CivicEducation => &mut self.civic_education,
        };
        *slot = value;
    }

    /// Present scores, in subject order.
    pub fn present(&self) -> impl Iterator<Item = (Subject, f64)> + '_ {
        Subject::ALL
            .into_iter()
            .filter_map(|subject| self.get(subject).map(|score| (subject, score)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub sbd: String,
    #[serde(flatten)]
    pub scores: Scores,
    pub foreign_language_code: Option<String>,
}

impl StudentRecord {
    pub fn score(&self, subject: Subject) -> Option<f64> {
        self.scores.get(subject)
    }
}

/// Fields for a record that does not exist yet; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub sbd: String,
    pub scores: Scores,
    pub foreign_language_code: Option<String>,
}

impl NewStudent {
    pub fn into_record(self, id: Uuid) -> StudentRecord {
        StudentRecord {
            id,
            sbd: self.sbd,
            scores: self.scores,
            foreign_language_code: self.foreign_language_code,
        }
    }
}

/// Partial update. Outer `None` leaves a field alone, `Some(None)` clears it.
///
/// The registration code is not part of the patch: it is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub math: Option<Option<f64>>,
    pub literature: Option<Option<f64>>,
    pub foreign_language: Option<Option<f64>>,
    pub physics: Option<Option<f64>>,
    pub chemistry: Option<Option<f64>>,
    pub biology: Option<Option<f64>>,
    pub history: Option<Option<f64>>,
    pub geography: Option<Option<f64>>,
    pub civic_education: Option<Option<f64>>,
    pub foreign_language_code: Option<Option<String>>,
}

impl StudentPatch {
    pub fn score_change(&self, subject: Subject) -> Option<Option<f64>> {
        match subject {
            Subject::Math => self.math,
            Subject::Literature => self.literature,
            Subject::ForeignLanguage => self.foreign_language,
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Biology => self.biology,
            Subject::History => self.history,
            Subject::Geography => self.geography,
            Subject::CivicEducation => self.civic_education,
        }
    }

    pub fn set_score(&mut self, subject: Subject, value: Option<f64>) {
        let slot = match subject {
            Subject::Math => &mut self.math,
            Subject::Literature => &mut self.literature,
            Subject::ForeignLanguage => &mut self.foreign_language,
            Subject::Physics => &mut self.physics,
            Subject::Chemistry => &mut self.chemistry,
            Subject::Biology => &mut self.biology,
            Subject::History => &mut self.history,
            Subject::Geography => &mut self.geography,
            Subject::CivicEducation => &mut self.civic_education,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.foreign_language_code.is_none()
            && Subject::ALL
                .into_iter()
                .all(|subject| self.score_change(subject).is_none())
    }

    pub fn apply(&self, record: &mut StudentRecord) {
        for subject in Subject::ALL {
            if let Some(value) = self.score_change(subject) {
                record.scores.set(subject, value);
            }
        }
        if let Some(code) = &self.foreign_language_code {
            record.foreign_language_code = code.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_title_cased() {
        assert_eq!(Subject::Math.display_name(), "Math");
        assert_eq!(Subject::ForeignLanguage.display_name(), "Foreign Language");
        assert_eq!(Subject::CivicEducation.display_name(), "Civic Education");
        assert_eq!(title_case("__odd__KEY"), "Odd Key");
    }

    #[test]
    fn reference_group_is_math_physics_chemistry() {
        assert_eq!(
            SubjectGroup::A00.subjects(),
            [Subject::Math, Subject::Physics, Subject::Chemistry]
        );
    }

    #[test]
    fn patch_changes_only_supplied_fields() {
        let mut record = NewStudent {
            sbd: "01001001".to_string(),
            scores: Scores {
                math: Some(9.5),
                physics: Some(9.2),
                chemistry: Some(9.8),
                ..Scores::default()
            },
            foreign_language_code: Some("N1".to_string()),
        }
        .into_record(Uuid::new_v4());

        let mut patch = StudentPatch::default();
        patch.set_score(Subject::Math, Some(7.0));
        patch.set_score(Subject::Chemistry, None);
        patch.apply(&mut record);

        assert_eq!(record.score(Subject::Math), Some(7.0));
        assert_eq!(record.score(Subject::Physics), Some(9.2));
        assert_eq!(record.score(Subject::Chemistry), None);
        assert_eq!(record.foreign_language_code.as_deref(), Some("N1"));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(StudentPatch::default().is_empty());
        let patch = StudentPatch {
            foreign_language_code: Some(None),
            ..StudentPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
