use serde::{Deserialize, Serialize};

const FRESHER_KEYWORDS: &[&str] = &[
    "intern",
    "internship",
    "fresher",
    "graduate",
    "trainee",
    "entry level",
    "junior",
    "0-1 year",
    "0-2 years",
];

const EXPERIENCED_KEYWORDS: &[&str] = &[
    "senior",
    "lead",
    "principal",
    "manager",
    "architect",
    "head",
    "years experience",
    "mid-senior",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceLevel {
    Fresher,
    Experienced,
    Unknown,
}

impl std::fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperienceLevel::Fresher => write!(f, "FRESHER"),
            ExperienceLevel::Experienced => write!(f, "EXPERIENCED"),
            ExperienceLevel::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Keyword heuristic over title and description. Entry-level keywords are
/// checked first and win when both sets match.
pub fn classify_experience(title: &str, description: &str) -> ExperienceLevel {
    let text = format!("{} {}", title, description).to_lowercase();

    if FRESHER_KEYWORDS.iter().any(|k| text.contains(k)) {
        ExperienceLevel::Fresher
    } else if EXPERIENCED_KEYWORDS.iter().any(|k| text.contains(k)) {
        ExperienceLevel::Experienced
    } else {
        ExperienceLevel::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn senior_title_is_experienced() {
        assert_eq!(
            classify_experience("Senior Software Engineer", "..."),
            ExperienceLevel::Experienced
        );
    }

    #[test]
    fn graduate_title_is_fresher() {
        assert_eq!(
            classify_experience("Graduate Trainee", "..."),
            ExperienceLevel::Fresher
        );
    }

    #[test]
    fn plain_title_is_unknown() {
        assert_eq!(
            classify_experience("Software Engineer", "..."),
            ExperienceLevel::Unknown
        );
    }

    #[test]
    fn fresher_wins_over_experienced() {
        assert_eq!(
            classify_experience("Fresher Intern - Senior Team", ""),
            ExperienceLevel::Fresher
        );
    }

    #[test]
    fn description_participates_case_insensitively() {
        assert_eq!(
            classify_experience("Backend Developer", "Requires 5 YEARS EXPERIENCE"),
            ExperienceLevel::Experienced
        );
        assert_eq!(
            classify_experience("Backend Developer", "Open to candidates with 0-1 year"),
            ExperienceLevel::Fresher
        );
    }

    #[test]
    fn substring_matches_count() {
        // "internal" contains "intern"; "leadership" contains "lead"
        assert_eq!(
            classify_experience("Internal Tools Engineer", ""),
            ExperienceLevel::Fresher
        );
        assert_eq!(
            classify_experience("Engineer", "leadership skills"),
            ExperienceLevel::Experienced
        );
    }
}
