use serde::Serialize;

use crate::models::RiskLevel;

pub const ATTENDANCE_WEIGHT: f64 = 30.0;
pub const CGPA_WEIGHT: f64 = 35.0;
pub const STUDY_WEIGHT: f64 = 20.0;
pub const PARTICIPATION_WEIGHT: f64 = 15.0;

/// Weekly study hours beyond this add nothing to the score.
pub const STUDY_HOURS_CAP: f64 = 8.0;

pub fn compute_risk_score(attendance: f64, cgpa: f64, study_hours: f64, participation: f64) -> i64 {
    weighted_terms(attendance, cgpa, study_hours, participation)
        .iter()
        .sum::<f64>()
        .round() as i64
}

pub fn classify_risk(score: i64) -> RiskLevel {
    match score {
        s if s >= 75 => RiskLevel::Low,
        s if s >= 50 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

fn weighted_terms(attendance: f64, cgpa: f64, study_hours: f64, participation: f64) -> [f64; 4] {
    [
        (attendance / 100.0) * ATTENDANCE_WEIGHT,
        (cgpa / 10.0) * CGPA_WEIGHT,
        (study_hours.min(STUDY_HOURS_CAP) / STUDY_HOURS_CAP) * STUDY_WEIGHT,
        (participation / 100.0) * PARTICIPATION_WEIGHT,
    ]
}

/// What-if parameters, one per slider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationInput {
    pub attendance: f64,
    pub cgpa: f64,
    pub study_hours: f64,
    pub participation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub factor: &'static str,
    pub points: f64,
    pub max_points: f64,
}

impl Default for SimulationInput {
    fn default() -> Self {
        Self {
            attendance: 75.0,
            cgpa: 7.0,
            study_hours: 4.0,
            participation: 60.0,
        }
    }
}

impl SimulationInput {
    /// Back to the slider defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bounded and snapped to each slider's range and step.
    pub fn clamped(self) -> Self {
        Self {
            attendance: snap(self.attendance, 0.0, 100.0, 1.0),
            cgpa: snap(self.cgpa, 0.0, 10.0, 0.1),
            study_hours: snap(self.study_hours, 0.0, 12.0, 0.5),
            participation: snap(self.participation, 0.0, 100.0, 1.0),
        }
    }

    pub fn score(&self) -> i64 {
        compute_risk_score(self.attendance, self.cgpa, self.study_hours, self.participation)
    }

    pub fn risk_level(&self) -> RiskLevel {
        classify_risk(self.score())
    }

    pub fn contributions(&self) -> Vec<Contribution> {
        let terms = weighted_terms(self.attendance, self.cgpa, self.study_hours, self.participation);
        let factors = [
            ("Attendance", ATTENDANCE_WEIGHT),
            ("CGPA", CGPA_WEIGHT),
            ("Study hours", STUDY_WEIGHT),
            ("Participation", PARTICIPATION_WEIGHT),
        ];
        factors
            .iter()
            .zip(terms)
            .map(|(&(factor, max_points), points)| Contribution {
                factor,
                points,
                max_points,
            })
            .collect()
    }

    /// Intervention advice for the simulated tier, headline first. High-risk
    /// advice depends on which inputs are below target.
    pub fn recommendations(&self) -> Vec<&'static str> {
        match self.risk_level() {
            RiskLevel::High => {
                let mut advice = vec![
                    "Critical Intervention Needed",
                    "Immediate counseling and academic support required",
                ];
                if self.attendance < 75.0 {
                    advice.push("Improve attendance to at least 75%");
                }
                if self.cgpa < 6.0 {
                    advice.push("Focus on improving CGPA through tutoring");
                }
                if self.study_hours < 3.0 {
                    advice.push("Increase daily study hours");
                }
                advice
            }
            RiskLevel::Medium => vec![
                "Moderate Risk",
                "Monitor progress and provide regular support",
                "Continue current support measures",
                "Regular check-ins recommended",
            ],
            RiskLevel::Low => vec![
                "On Track",
                "Student is performing well",
                "Maintain current performance",
                "Consider peer mentoring opportunities",
            ],
            RiskLevel::Unknown => vec!["No recommendation available"],
        }
    }

    /// Body for the backend `/simulate` endpoint: the student's stored features
    /// with these values substituted.
    pub fn to_payload(&self, student_id: &str, original_risk: RiskLevel) -> serde_json::Value {
        serde_json::json!({
            "student_id": student_id,
            "original_risk": original_risk.backend_label().unwrap_or(""),
            "modifications": {
                "attendance_rate": self.attendance,
                "cgpa": self.cgpa,
                "study_hours": self.study_hours,
                "participation": self.participation,
            },
        })
    }
}

fn snap(value: f64, min: f64, max: f64, step: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    let stepped = (value.clamp(min, max) / step).round() * step;
    // Keep one decimal so 0.1 steps print cleanly.
    (stepped * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_map_to_zero_and_hundred() {
        assert_eq!(compute_risk_score(100.0, 10.0, 8.0, 100.0), 100);
        assert_eq!(compute_risk_score(0.0, 0.0, 0.0, 0.0), 0);
    }

    #[test]
    fn scores_stay_in_range_across_the_grid() {
        let mut attendance = 0.0;
        while attendance <= 100.0 {
            let mut cgpa = 0.0;
            while cgpa <= 10.0 {
                for hours in [0.0, 2.5, 8.0, 12.0] {
                    for participation in [0.0, 33.0, 100.0] {
                        let score = compute_risk_score(attendance, cgpa, hours, participation);
                        assert!((0..=100).contains(&score), "score {score} out of range");
                    }
                }
                cgpa += 0.5;
            }
            attendance += 5.0;
        }
    }

    #[test]
    fn study_hours_above_cap_have_no_effect() {
        for (a, c, p) in [(75.0, 7.0, 60.0), (10.0, 2.3, 0.0), (100.0, 10.0, 100.0)] {
            assert_eq!(compute_risk_score(a, c, 8.0, p), compute_risk_score(a, c, 12.0, p));
        }
    }

    #[test]
    fn thresholds_are_inclusive_for_higher_tier() {
        assert_eq!(classify_risk(75), RiskLevel::Low);
        assert_eq!(classify_risk(74), RiskLevel::Medium);
        assert_eq!(classify_risk(50), RiskLevel::Medium);
        assert_eq!(classify_risk(49), RiskLevel::High);
        assert_eq!(classify_risk(0), RiskLevel::High);
        assert_eq!(classify_risk(100), RiskLevel::Low);
    }

    #[test]
    fn defaults_score_as_medium() {
        // 22.5 + 24.5 + 10 + 9 = 66
        let input = SimulationInput::default();
        assert_eq!(input.score(), 66);
        assert_eq!(input.risk_level(), RiskLevel::Medium);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut input = SimulationInput {
            attendance: 10.0,
            cgpa: 1.0,
            study_hours: 11.5,
            participation: 5.0,
        };
        input.reset();
        assert_eq!(input, SimulationInput::default());
    }

    #[test]
    fn clamped_enforces_bounds_and_steps() {
        let input = SimulationInput {
            attendance: 140.0,
            cgpa: 7.26,
            study_hours: 3.7,
            participation: -4.0,
        }
        .clamped();
        assert_eq!(input.attendance, 100.0);
        assert_eq!(input.cgpa, 7.3);
        assert_eq!(input.study_hours, 3.5);
        assert_eq!(input.participation, 0.0);
    }

    #[test]
    fn payload_nests_modifications_under_student() {
        let payload = SimulationInput::default().to_payload("STU0042", RiskLevel::High);
        assert_eq!(payload["student_id"], "STU0042");
        assert_eq!(payload["original_risk"], "High");
        assert_eq!(payload["modifications"]["attendance_rate"], 75.0);
        assert_eq!(payload["modifications"]["study_hours"], 4.0);
    }

    fn input(attendance: f64, cgpa: f64, study_hours: f64, participation: f64) -> SimulationInput {
        SimulationInput {
            attendance,
            cgpa,
            study_hours,
            participation,
        }
    }

    #[test]
    fn high_risk_advice_lists_every_weak_input() {
        let weak = input(40.0, 4.0, 1.0, 20.0);
        assert_eq!(weak.risk_level(), RiskLevel::High);
        let advice = weak.recommendations();
        assert_eq!(
            advice,
            [
                "Critical Intervention Needed",
                "Immediate counseling and academic support required",
                "Improve attendance to at least 75%",
                "Focus on improving CGPA through tutoring",
                "Increase daily study hours",
            ]
        );
    }

    #[test]
    fn high_risk_advice_thresholds_are_exclusive() {
        // All three inputs on target already scores 51, which is medium.
        assert_eq!(input(75.0, 6.0, 3.0, 0.0).risk_level(), RiskLevel::Medium);

        // 22.5 + 0 + 7.5 + 0 = 30: high risk with attendance and study hours exactly on target.
        let advice = input(75.0, 0.0, 3.0, 0.0).recommendations();
        assert_eq!(advice.len(), 3);
        assert_eq!(advice[2], "Focus on improving CGPA through tutoring");

        // 0 + 21 + 0 + 0 = 21: cgpa exactly on target.
        let advice = input(0.0, 6.0, 0.0, 0.0).recommendations();
        assert!(advice.contains(&"Improve attendance to at least 75%"));
        assert!(advice.contains(&"Increase daily study hours"));
        assert!(!advice.contains(&"Focus on improving CGPA through tutoring"));

        let advice = input(74.0, 5.9, 2.5, 0.0).recommendations();
        assert_eq!(advice.len(), 5);
    }

    #[test]
    fn medium_and_low_tiers_have_fixed_advice() {
        let medium = SimulationInput::default().recommendations();
        assert_eq!(medium[0], "Moderate Risk");
        assert_eq!(medium.len(), 4);

        let low = input(100.0, 9.0, 8.0, 90.0).recommendations();
        assert_eq!(low[0], "On Track");
        assert!(low.contains(&"Consider peer mentoring opportunities"));
    }

    #[test]
    fn contributions_sum_to_score() {
        let input = SimulationInput::default();
        let contributions = input.contributions();
        assert_eq!(contributions.len(), 4);
        let total: f64 = contributions.iter().map(|c| c.points).sum();
        assert_eq!(total.round() as i64, input.score());
        let max: f64 = contributions.iter().map(|c| c.max_points).sum();
        assert_eq!(max, 100.0);
    }
}
