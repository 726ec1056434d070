use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::UploadError;
use crate::ingest::{self, SheetTable};
use crate::models::{
    HouseAggregate, MonthKey, MonthlySummary, RawActivityRow, StudentScore, UploadOutcome,
    UploadStats, UploadWarnings, WinningHouse,
};
use crate::normalize::{canonicalize, normalize_value};
use crate::schema::{Bucket, PointSchema};

const MAX_WARNINGS: usize = 10;
const TOP_CONTRIBUTORS: usize = 10;

/// Which students compete for the monthly cultural award.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CulturalWinnerScope {
    /// Every scored student, including those whose house is unrecognized.
    #[default]
    AllStudents,
    /// Only students counted on the house leaderboard.
    RankedStudents,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringOptions {
    pub cultural_scope: CulturalWinnerScope,
}

/// A scored student together with the sheet row it came from.
#[derive(Debug, Clone)]
pub struct ScoredRow<'a> {
    pub row: &'a RawActivityRow,
    pub score: StudentScore,
}

pub fn score_student(
    row: &RawActivityRow,
    house: String,
    house_recognized: bool,
    campus: String,
    schema: &PointSchema,
) -> StudentScore {
    let mut individual_academic = 0.0;
    let mut individual_culture = 0.0;
    let mut house_academic = 0.0;
    let mut house_culture = 0.0;
    let mut council = 0.0;
    let mut council_active = false;
    let mut excluded = 0.0;

    for (category, &value) in schema.categories.iter().zip(&row.points) {
        match category.bucket {
            Bucket::IndividualAcademic => individual_academic += value,
            Bucket::IndividualCulture => individual_culture += value,
            Bucket::HouseAcademic => house_academic += value,
            Bucket::HouseCulture => house_culture += value,
            Bucket::Council => council += value,
        }
        if category.council_gate && value > 0.0 {
            council_active = true;
        }
        if category.excluded_from_cultural_winner {
            excluded += value;
        }
    }

    let council_total = if council_active { council } else { 0.0 };

    StudentScore {
        line: row.line,
        student_name: row.student_name.clone(),
        email: row.email.clone(),
        house,
        campus,
        house_recognized,
        individual_academic,
        individual_culture,
        house_contribution_academic: house_academic,
        house_contribution_culture: house_culture,
        council_total,
        individual_total: individual_academic
            + individual_culture
            + house_academic
            + house_culture
            + council_total,
        cultural_winner_points: individual_culture + house_culture - excluded,
    }
}

/// Dual-effect points read straight from the sheet row.
pub fn dual_effect_points(row: &RawActivityRow, schema: &PointSchema) -> f64 {
    schema
        .categories
        .iter()
        .zip(&row.points)
        .filter(|(category, _)| category.dual_effect)
        .map(|(_, &value)| value)
        .sum()
}

/// One aggregate per canonical house, in schema order.
///
/// Members whose house is not canonical never reach an aggregate.
pub fn aggregate_houses(members: &[ScoredRow<'_>], schema: &PointSchema) -> Vec<HouseAggregate> {
    schema
        .houses
        .iter()
        .map(|house| {
            let mut member_count = 0usize;
            let mut dual_sum = 0.0;
            let mut total_sum = 0.0;

            for member in members
                .iter()
                .filter(|m| m.score.house_recognized && &m.score.house == house)
            {
                member_count += 1;
                dual_sum += dual_effect_points(member.row, schema);
                total_sum += member.score.individual_total;
            }

            let individual_avg = if member_count == 0 {
                0.0
            } else {
                total_sum / member_count as f64
            };

            HouseAggregate {
                house: house.clone(),
                member_count,
                dual_sum,
                individual_avg,
                total: dual_sum + individual_avg,
            }
        })
        .collect()
}

fn first_max<'a, T, F>(items: &'a [T], key: F) -> Option<&'a T>
where
    F: Fn(&T) -> f64,
{
    items.iter().fold(None, |best, item| match best {
        Some(current) if key(current) >= key(item) => Some(current),
        _ => Some(item),
    })
}

fn sort_desc_by<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

pub fn overall_winner(ranked: &[StudentScore]) -> Option<&StudentScore> {
    first_max(ranked, |s| s.individual_total)
}

/// Highest academic scorer, passing over the overall winner when a
/// runner-up exists.
pub fn academic_winner<'a>(
    ranked: &'a [StudentScore],
    overall: Option<&StudentScore>,
) -> Option<&'a StudentScore> {
    let mut order: Vec<&StudentScore> = ranked.iter().collect();
    order.sort_by(|a, b| {
        b.academic_total()
            .partial_cmp(&a.academic_total())
            .unwrap_or(Ordering::Equal)
    });

    match (order.first(), order.get(1), overall) {
        (Some(top), Some(runner_up), Some(overall)) if top.line == overall.line => {
            Some(*runner_up)
        }
        (top, _, _) => top.copied(),
    }
}

pub fn cultural_winner(population: &[StudentScore]) -> Option<&StudentScore> {
    first_max(population, |s| s.cultural_winner_points)
}

pub fn winning_house(houses: &[HouseAggregate], ranked: &[StudentScore]) -> Option<WinningHouse> {
    if ranked.is_empty() {
        return None;
    }
    let house = first_max(houses, |h| h.total)?.clone();

    let mut top_contributors: Vec<StudentScore> = ranked
        .iter()
        .filter(|s| s.house == house.house)
        .cloned()
        .collect();
    sort_desc_by(&mut top_contributors, |s| s.individual_total);
    top_contributors.truncate(TOP_CONTRIBUTORS);

    Some(WinningHouse {
        house,
        top_contributors,
    })
}

fn push_bounded(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if list.len() < MAX_WARNINGS && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Validates one uploaded sheet and derives scores, the house
/// leaderboard and the monthly winners for a single campus.
pub fn compute_summary(
    table: &SheetTable,
    schema: &PointSchema,
    campus: &str,
    month: MonthKey,
    options: ScoringOptions,
) -> Result<UploadOutcome, UploadError> {
    if table.rows.is_empty() {
        return Err(UploadError::NoDataRows);
    }

    let layout = ingest::resolve_columns(&table.headers, schema)?;
    let selected = canonicalize(campus, &schema.campuses)
        .ok_or_else(|| UploadError::UnknownCampus(campus.trim().to_string()))?
        .to_string();

    let rows = ingest::activity_rows(table, &layout);
    let mut warnings = UploadWarnings::default();

    for row in rows.iter().filter(|r| !r.campus.is_empty()) {
        if canonicalize(&row.campus, &schema.campuses).is_none() {
            push_bounded(&mut warnings.unknown_campuses, &row.campus);
        }
    }

    let campus_rows: Vec<&RawActivityRow> = rows
        .iter()
        .filter(|r| canonicalize(&r.campus, &schema.campuses) == Some(selected.as_str()))
        .collect();
    if campus_rows.is_empty() {
        return Err(UploadError::NoRowsForCampus(selected));
    }

    let mut scored = Vec::with_capacity(campus_rows.len());
    for row in campus_rows.iter().copied() {
        if row.student_name.is_empty() || row.house.is_empty() || row.campus.is_empty() {
            warnings.incomplete_rows += 1;
            continue;
        }

        let house = normalize_value(&row.house, &schema.houses);
        let recognized = schema.houses.contains(&house);
        if !recognized {
            push_bounded(&mut warnings.unknown_houses, &row.house);
        }
        for (category, &value) in schema.categories.iter().zip(&row.points) {
            if category.is_wrong_sign(value) {
                push_bounded(&mut warnings.wrong_sign_headers, &category.header);
            }
        }
        if !row.email.is_empty()
            && scored
                .iter()
                .any(|s: &ScoredRow<'_>| s.row.email == row.email)
        {
            push_bounded(&mut warnings.duplicate_emails, &row.email);
        }

        let score = score_student(row, house, recognized, selected.clone(), schema);
        scored.push(ScoredRow { row, score });
    }

    let houses = aggregate_houses(&scored, schema);
    let students: Vec<StudentScore> = scored.into_iter().map(|s| s.score).collect();
    let ranked: Vec<StudentScore> = students
        .iter()
        .filter(|s| s.house_recognized)
        .cloned()
        .collect();

    let overall = overall_winner(&ranked).cloned();
    let academic = academic_winner(&ranked, overall.as_ref()).cloned();
    let cultural = match options.cultural_scope {
        CulturalWinnerScope::AllStudents => cultural_winner(&students),
        CulturalWinnerScope::RankedStudents => cultural_winner(&ranked),
    }
    .cloned();

    let mut leaderboard = houses.clone();
    sort_desc_by(&mut leaderboard, |h| h.total);

    let summary = MonthlySummary {
        campus: selected.clone(),
        month,
        overall_winner: overall,
        academic_winner: academic,
        cultural_winner: cultural,
        winning_house: winning_house(&houses, &ranked),
        leaderboard,
    };

    let stats = UploadStats {
        total_rows: rows.len(),
        campus_rows: campus_rows.len(),
        students_processed: students.len(),
        students_ranked: ranked.len(),
    };

    if !warnings.is_empty() {
        warn!(
            unknown_houses = ?warnings.unknown_houses,
            unknown_campuses = ?warnings.unknown_campuses,
            incomplete_rows = warnings.incomplete_rows,
            wrong_sign_headers = ?warnings.wrong_sign_headers,
            duplicate_emails = ?warnings.duplicate_emails,
            "upload has rows that were left out of the leaderboard"
        );
    }
    info!(
        campus = %selected,
        month = %month,
        students = stats.students_processed,
        ranked = stats.students_ranked,
        "scored upload"
    );

    Ok(UploadOutcome {
        students,
        houses,
        summary,
        warnings,
        stats,
    })
}
