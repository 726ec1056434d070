use std::fmt::Write;

use crate::models::{HouseAggregate, StudentScore, UploadOutcome, UploadWarnings};

fn student_line(score: &StudentScore) -> String {
    format!(
        "{} ({}) total {:.1}: academic {:.1}, culture {:.1}, house {:.1}/{:.1}, council {:.1}",
        score.student_name,
        score.house,
        score.individual_total,
        score.individual_academic,
        score.individual_culture,
        score.house_contribution_academic,
        score.house_contribution_culture,
        score.council_total
    )
}

fn house_line(house: &HouseAggregate) -> String {
    format!(
        "{} total {:.2} (dual {:.1} + avg {:.2} across {} students)",
        house.house, house.total, house.dual_sum, house.individual_avg, house.member_count
    )
}

pub fn warning_lines(warnings: &UploadWarnings) -> Vec<String> {
    let mut lines = Vec::new();
    if !warnings.unknown_houses.is_empty() {
        lines.push(format!(
            "Unrecognized houses (left off the leaderboard): {}",
            warnings.unknown_houses.join(", ")
        ));
    }
    if !warnings.unknown_campuses.is_empty() {
        lines.push(format!(
            "Unrecognized campuses (rows ignored): {}",
            warnings.unknown_campuses.join(", ")
        ));
    }
    if warnings.incomplete_rows > 0 {
        lines.push(format!(
            "{} rows without a student name, house or campus were ignored",
            warnings.incomplete_rows
        ));
    }
    if !warnings.wrong_sign_headers.is_empty() {
        lines.push(format!(
            "Cells with the opposite sign were counted as entered: {}",
            warnings.wrong_sign_headers.join(", ")
        ));
    }
    if !warnings.duplicate_emails.is_empty() {
        lines.push(format!(
            "Emails on more than one row (last row saved): {}",
            warnings.duplicate_emails.join(", ")
        ));
    }
    lines
}

pub fn build_report(outcome: &UploadOutcome) -> String {
    let summary = &outcome.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# House Points: {} {}", summary.campus, summary.month);
    let _ = writeln!(
        output,
        "Processed {} students ({} on the leaderboard) from {} rows",
        outcome.stats.students_processed, outcome.stats.students_ranked, outcome.stats.total_rows
    );

    let warnings = warning_lines(&outcome.warnings);
    if !warnings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Warnings");
        for line in warnings {
            let _ = writeln!(output, "- {line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Winners");
    let awards = [
        ("Overall", &summary.overall_winner),
        ("Academic", &summary.academic_winner),
        ("Cultural", &summary.cultural_winner),
    ];
    for (label, winner) in awards {
        match winner {
            Some(score) => {
                let _ = writeln!(output, "- {label}: {}", student_line(score));
            }
            None => {
                let _ = writeln!(output, "- {label}: no eligible students");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## House Leaderboard");
    for (rank, house) in summary.leaderboard.iter().enumerate() {
        let _ = writeln!(output, "{}. {}", rank + 1, house_line(house));
    }

    if let Some(winner) = &summary.winning_house {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Top Contributors: {}", winner.house.house);
        for score in &winner.top_contributors {
            let _ = writeln!(output, "- {}", student_line(score));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonthKey, MonthlySummary, UploadStats, WinningHouse};

    fn score(name: &str, house: &str, total: f64) -> StudentScore {
        StudentScore {
            line: 2,
            student_name: name.to_string(),
            email: String::new(),
            house: house.to_string(),
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

    fn aggregate(house: &str, total: f64) -> HouseAggregate {
        HouseAggregate {
            house: house.to_string(),
            member_count: 1,
            dual_sum: 0.0,
            individual_avg: total,
            total,
        }
    }

    fn outcome(warnings: UploadWarnings) -> UploadOutcome {
        let asha = score("Asha", "Bageshree", 9.0);
        let houses = vec![aggregate("Bageshree", 9.0), aggregate("Malhar", 4.0)];
        UploadOutcome {
            students: vec![asha.clone()],
            houses: houses.clone(),
            summary: MonthlySummary {
                campus: "Pune".to_string(),
                month: MonthKey::new(2025, 8).unwrap(),
                overall_winner: Some(asha.clone()),
                academic_winner: Some(asha.clone()),
                cultural_winner: None,
                winning_house: Some(WinningHouse {
                    house: houses[0].clone(),
                    top_contributors: vec![asha],
                }),
                leaderboard: houses,
            },
            warnings,
            stats: UploadStats {
                total_rows: 3,
                campus_rows: 2,
                students_processed: 1,
                students_ranked: 1,
            },
        }
    }

    #[test]
    fn report_lists_winners_and_leaderboard() {
        let report = build_report(&outcome(UploadWarnings::default()));
        assert!(report.contains("# House Points: Pune 2025-08"));
        assert!(report.contains("- Overall: Asha (Bageshree) total 9.0"));
        assert!(report.contains("- Cultural: no eligible students"));
        assert!(report.contains("1. Bageshree total 9.00"));
        assert!(report.contains("2. Malhar total 4.00"));
        assert!(report.contains("## Top Contributors: Bageshree"));
        assert!(!report.contains("## Warnings"));
    }

    #[test]
    fn report_includes_warnings_when_present() {
        let report = build_report(&outcome(UploadWarnings {
            unknown_houses: vec!["Durbari".to_string()],
            incomplete_rows: 2,
            ..UploadWarnings::default()
        }));
        assert!(report.contains("## Warnings"));
        assert!(report.contains("Unrecognized houses (left off the leaderboard): Durbari"));
        assert!(report.contains("2 rows without a student name, house or campus were ignored"));
        assert!(!report.contains("opposite sign"));
    }

    #[test]
    fn report_lists_wrong_sign_columns_and_repeated_emails() {
        let report = build_report(&outcome(UploadWarnings {
            wrong_sign_headers: vec!["Module Completion (+5)".to_string()],
            duplicate_emails: vec!["asha@example.com".to_string()],
            ..UploadWarnings::default()
        }));
        assert!(report.contains(
            "Cells with the opposite sign were counted as entered: Module Completion (+5)"
        ));
        assert!(report.contains("Emails on more than one row (last row saved): asha@example.com"));
    }
}
