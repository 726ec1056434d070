use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MonthKeyError;

/// Reporting period, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let bytes = value.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(MonthKeyError(value.to_string()));
        }
        let date = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
            .map_err(|_| MonthKeyError(value.to_string()))?;
        Ok(Self {
            year: date.year(),
            month: date.month(),
        })
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

/// One data row of an uploaded sheet after column detection.
///
/// `points` is parallel to the schema's category list and holds the raw
/// numeric cell values (0 when a cell is empty or not a number).
#[derive(Debug, Clone)]
pub struct RawActivityRow {
    pub line: usize,
    pub student_name: String,
    pub email: String,
    pub house: String,
    pub campus: String,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentScore {
    pub line: usize,
    pub student_name: String,
    pub email: String,
    pub house: String,
    pub campus: String,
    pub house_recognized: bool,
    pub individual_academic: f64,
    pub individual_culture: f64,
    pub house_contribution_academic: f64,
    pub house_contribution_culture: f64,
    pub council_total: f64,
    pub individual_total: f64,
    pub cultural_winner_points: f64,
}

impl StudentScore {
    pub fn academic_total(&self) -> f64 {
        self.individual_academic + self.house_contribution_academic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseAggregate {
    pub house: String,
    pub member_count: usize,
    pub dual_sum: f64,
    pub individual_avg: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WinningHouse {
    #[serde(flatten)]
    pub house: HouseAggregate,
    pub top_contributors: Vec<StudentScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub campus: String,
    pub month: MonthKey,
    pub overall_winner: Option<StudentScore>,
    pub academic_winner: Option<StudentScore>,
    pub cultural_winner: Option<StudentScore>,
    pub winning_house: Option<WinningHouse>,
    pub leaderboard: Vec<HouseAggregate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadWarnings {
    pub unknown_houses: Vec<String>,
    pub unknown_campuses: Vec<String>,
    pub incomplete_rows: usize,
    /// Categories with at least one cell of the opposite sign.
    pub wrong_sign_headers: Vec<String>,
    /// Emails on more than one row; the last row's points are saved.
    pub duplicate_emails: Vec<String>,
}

impl UploadWarnings {
    pub fn count(&self) -> usize {
        self.unknown_houses.len()
            + self.unknown_campuses.len()
            + self.incomplete_rows
            + self.wrong_sign_headers.len()
            + self.duplicate_emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadStats {
    pub total_rows: usize,
    pub campus_rows: usize,
    pub students_processed: usize,
    pub students_ranked: usize,
}

/// Everything derived from one upload, ready for preview or persistence.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub students: Vec<StudentScore>,
    pub houses: Vec<HouseAggregate>,
    pub summary: MonthlySummary,
    pub warnings: UploadWarnings,
    pub stats: UploadStats,
}

impl UploadOutcome {
    /// One score per distinct email, taken from the last row that carries
    /// it, in first-seen order. Rows without an email are skipped.
    pub fn students_by_email(&self) -> Vec<&StudentScore> {
        let mut slots: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        let mut picked: Vec<&StudentScore> = Vec::new();
        for student in self.students.iter().filter(|s| !s.email.is_empty()) {
            match slots.get(student.email.as_str()) {
                Some(&index) => picked[index] = student,
                None => {
                    slots.insert(student.email.as_str(), picked.len());
                    picked.push(student);
                }
            }
        }
        picked
    }
}

/// What a confirmed upload wrote.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub batch_id: Uuid,
    pub houses_written: usize,
    pub students_written: usize,
    pub students_without_email: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStanding {
    pub student_name: String,
    pub email: String,
    pub house: String,
    pub individual_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reward {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub required_level: i32,
    pub point_cost: i32,
    pub campus: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClaimStatus::Pending),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            other => Err(format!("unknown claim status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub id: Uuid,
    pub user_email: String,
    pub house: String,
    pub reward_id: Uuid,
    pub month: MonthKey,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_parses_and_displays() {
        let key: MonthKey = "2025-08".parse().unwrap();
        assert_eq!(key, MonthKey::new(2025, 8).unwrap());
        assert_eq!(key.to_string(), "2025-08");
    }

    #[test]
    fn month_key_rejects_malformed_values() {
        assert!("2025-8".parse::<MonthKey>().is_err());
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("2025/08".parse::<MonthKey>().is_err());
        assert!("August".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_key_serializes_as_string() {
        let key = MonthKey::new(2026, 1).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2026-01\"");
        let back: MonthKey = serde_json::from_str("\"2026-01\"").unwrap();
        assert_eq!(back, key);
    }

    fn scored(line: usize, name: &str, email: &str, total: f64) -> StudentScore {
        StudentScore {
            line,
            student_name: name.to_string(),
            email: email.to_string(),
            house: "Malhar".to_string(),
            campus: "Pune".to_string(),
            house_recognized: true,
            individual_academic: total,
            individual_culture: 0.0,
            house_contribution_academic: 0.0,
            house_contribution_culture: 0.0,
            council_total: 0.0,
            individual_total: total,
            cultural_winner_points: 0.0,
        }
    }

    #[test]
    fn students_by_email_keeps_last_row_per_email() {
        let outcome = UploadOutcome {
            students: vec![
                scored(2, "Asha", "asha@example.com", 3.0),
                scored(3, "Ravi", "", 4.0),
                scored(4, "Meera", "meera@example.com", 1.0),
                scored(5, "Asha K", "asha@example.com", 7.0),
            ],
            houses: Vec::new(),
            summary: MonthlySummary {
                campus: "Pune".to_string(),
                month: MonthKey::new(2025, 8).unwrap(),
                overall_winner: None,
                academic_winner: None,
                cultural_winner: None,
                winning_house: None,
                leaderboard: Vec::new(),
            },
            warnings: UploadWarnings::default(),
            stats: UploadStats::default(),
        };

        let picked = outcome.students_by_email();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].student_name, "Asha K");
        assert_eq!(picked[0].individual_total, 7.0);
        assert_eq!(picked[1].email, "meera@example.com");
    }

    #[test]
    fn claim_status_round_trips_through_text() {
        for status in [
            ClaimStatus::Pending,
            ClaimStatus::Approved,
            ClaimStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<ClaimStatus>().is_err());
    }
}
