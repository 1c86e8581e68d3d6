use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{DashboardStats, DepartmentRisk, RiskLevel, StudentRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorSummary {
    pub factor: String,
    pub count: usize,
}

/// How often each risk factor appears across `students`, most common first.
pub fn summarize_factors(students: &[StudentRecord]) -> Vec<FactorSummary> {
    let mut map: HashMap<&str, usize> = HashMap::new();

    for student in students {
        for factor in &student.risk_factors {
            *map.entry(factor.as_str()).or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<FactorSummary> = map
        .into_iter()
        .map(|(factor, count)| FactorSummary {
            factor: factor.to_string(),
            count,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.factor.cmp(&b.factor)));
    summaries
}

/// High-risk students first, lowest engagement first within a tier.
pub fn rank_students(students: &[StudentRecord]) -> Vec<&StudentRecord> {
    fn tier(level: RiskLevel) -> u8 {
        match level {
            RiskLevel::High => 0,
            RiskLevel::Unknown => 1,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 3,
        }
    }

    let mut ranked: Vec<&StudentRecord> = students.iter().collect();
    ranked.sort_by(|a, b| {
        tier(a.risk_level)
            .cmp(&tier(b.risk_level))
            .then_with(|| a.engagement_score.cmp(&b.engagement_score))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}

pub fn build_report(
    generated_at: DateTime<Utc>,
    stats: &DashboardStats,
    departments: &[DepartmentRisk],
    students: &[StudentRecord],
    limit: usize,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Engagement Risk Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Metrics");
    let _ = writeln!(output, "- Total students: {}", stats.total_students);
    let _ = writeln!(output, "- Average engagement: {}%", stats.avg_engagement);
    let _ = writeln!(output, "- Disengagement rate: {}%", stats.disengagement_rate);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");
    for level in RiskLevel::KNOWN {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            level,
            stats.count(level),
            stats.risk_share(level)
        );
    }
    if !stats.is_consistent() {
        let _ = writeln!(
            output,
            "- Note: tier counts do not add up to the total ({} unclassified)",
            stats.count(RiskLevel::Unknown)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department Breakdown");
    if departments.is_empty() {
        let _ = writeln!(output, "No department analytics available.");
    } else {
        let _ = writeln!(output, "| Department | High | Medium | Low |");
        let _ = writeln!(output, "|---|---|---|---|");
        for row in departments {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                row.department, row.high, row.medium, row.low
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");
    if students.is_empty() {
        let _ = writeln!(output, "No students returned by the backend.");
    } else {
        for student in rank_students(students).into_iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} engagement {} attendance {}% CGPA {:.2}",
                student.name,
                student.id,
                if student.department.is_empty() {
                    "no department"
                } else {
                    student.department.as_str()
                },
                student.risk_level,
                student.engagement_score,
                student.attendance,
                student.cgpa
            );
        }
    }

    let factors = summarize_factors(students);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Common Risk Factors");
    if factors.is_empty() {
        let _ = writeln!(output, "No risk factors reported.");
    } else {
        for summary in factors.iter().take(5) {
            let _ = writeln!(output, "- {}: {} students", summary.factor, summary.count);
        }
    }

    output
}
