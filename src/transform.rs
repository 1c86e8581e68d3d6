use serde_json::Value;

use crate::models::{
    DashboardStats, DepartmentRisk, Explanation, FeatureImpact, Prediction, RiskLevel,
    StudentPage, StudentRecord,
};

// Candidate field names per attribute, in priority order.
const STUDENT_ID: &[&str] = &["student_id", "id"];
const NAME: &[&str] = &["name"];
const DEPARTMENT: &[&str] = &["department"];
const YEAR: &[&str] = &["year"];
const RISK_LEVEL: &[&str] = &["risk_level"];
const ENGAGEMENT_SCORE: &[&str] = &["engagement_score"];
const ATTENDANCE: &[&str] = &["attendance", "attendance_rate"];
const CGPA: &[&str] = &["cgpa", "academic_performance"];
const CREDITS_COMPLETED: &[&str] = &["credits_completed"];
const EMAIL: &[&str] = &["email"];
const PHONE: &[&str] = &["phone"];
const CONFIDENCE: &[&str] = &["confidence"];
const RISK_FACTORS: &[&str] = &["risk_factors"];

const TOTAL_STUDENTS: &[&str] = &["total_students"];
const HIGH_RISK: &[&str] = &["high_risk"];
const MEDIUM_RISK: &[&str] = &["medium_risk"];
const LOW_RISK: &[&str] = &["low_risk"];
const AVG_ENGAGEMENT: &[&str] = &["avg_engagement_score"];
const DISENGAGEMENT_RATE: &[&str] = &["disengagement_rate"];

/// First candidate key present on `raw` with a non-null value.
pub fn first_present<'a>(raw: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let object = raw.as_object()?;
    candidates
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn float_field(raw: &Value, candidates: &[&str]) -> f64 {
    first_present(raw, candidates).and_then(number).unwrap_or(0.0)
}

fn rounded_field(raw: &Value, candidates: &[&str], default: i64) -> i64 {
    first_present(raw, candidates)
        .and_then(number)
        .map(|n| n.round() as i64)
        .unwrap_or(default)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_field(raw: &Value, candidates: &[&str]) -> Option<String> {
    first_present(raw, candidates).and_then(text)
}

fn risk_field(raw: &Value, candidates: &[&str]) -> RiskLevel {
    first_present(raw, candidates)
        .and_then(Value::as_str)
        .map(RiskLevel::from_label)
        .unwrap_or(RiskLevel::Unknown)
}

pub fn normalize_student(raw: &Value) -> StudentRecord {
    let id = text_field(raw, STUDENT_ID);
    let name = text_field(raw, NAME)
        .or_else(|| id.clone())
        .unwrap_or_else(|| "N/A".to_string());

    let risk_factors = first_present(raw, RISK_FACTORS)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    StudentRecord {
        id: id.unwrap_or_default(),
        name,
        department: text_field(raw, DEPARTMENT).unwrap_or_default(),
        year: rounded_field(raw, YEAR, 1).max(1),
        risk_level: risk_field(raw, RISK_LEVEL),
        engagement_score: rounded_field(raw, ENGAGEMENT_SCORE, 0),
        attendance: rounded_field(raw, ATTENDANCE, 0),
        cgpa: float_field(raw, CGPA),
        credits_completed: rounded_field(raw, CREDITS_COMPLETED, 0),
        email: text_field(raw, EMAIL).unwrap_or_default(),
        phone: text_field(raw, PHONE).unwrap_or_default(),
        prediction_confidence: rounded_field(raw, CONFIDENCE, 0),
        risk_factors,
    }
}

pub fn normalize_dashboard_stats(raw: &Value) -> DashboardStats {
    DashboardStats {
        total_students: rounded_field(raw, TOTAL_STUDENTS, 0),
        high_risk: rounded_field(raw, HIGH_RISK, 0),
        medium_risk: rounded_field(raw, MEDIUM_RISK, 0),
        low_risk: rounded_field(raw, LOW_RISK, 0),
        avg_engagement: rounded_field(raw, AVG_ENGAGEMENT, 0),
        disengagement_rate: rounded_field(raw, DISENGAGEMENT_RATE, 0),
    }
}

pub fn normalize_student_page(raw: &Value) -> StudentPage {
    let students: Vec<StudentRecord> = first_present(raw, &["students"])
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_student).collect())
        .unwrap_or_default();

    StudentPage {
        total_pages: rounded_field(raw, &["total_pages"], 0),
        current_page: rounded_field(raw, &["current_page"], 1),
        total_students: rounded_field(raw, &["total_students"], students.len() as i64),
        students,
    }
}

pub fn normalize_prediction(raw: &Value) -> Prediction {
    Prediction {
        risk_level: risk_field(raw, RISK_LEVEL),
        engagement_score: rounded_field(raw, ENGAGEMENT_SCORE, 0),
        confidence: rounded_field(raw, CONFIDENCE, 0),
    }
}

/// Feature importances arrive as `[name, value]` pairs or `{feature, importance}` objects.
pub fn normalize_explanation(raw: &Value) -> Explanation {
    let mut features: Vec<FeatureImpact> = first_present(raw, &["feature_importance"])
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(feature_impact).collect())
        .unwrap_or_default();
    features.sort_by(|a, b| {
        b.impact
            .abs()
            .partial_cmp(&a.impact.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Explanation {
        prediction: risk_field(raw, &["prediction"]),
        confidence: rounded_field(raw, CONFIDENCE, 0),
        features,
    }
}

fn feature_impact(item: &Value) -> Option<FeatureImpact> {
    let (feature, impact) = match item {
        Value::Array(pair) => (pair.first()?, pair.get(1)?),
        Value::Object(_) => (
            first_present(item, &["feature", "name"])?,
            first_present(item, &["importance", "impact", "value"])?,
        ),
        _ => return None,
    };
    Some(FeatureImpact {
        feature: text(feature)?,
        impact: number(impact)?,
    })
}

/// Per-department tier counts from the analytics `department_performance` map,
/// sorted by department name.
pub fn department_breakdown(analytics: &Value) -> Vec<DepartmentRisk> {
    let Some(departments) = first_present(analytics, &["department_performance"])
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut rows: Vec<DepartmentRisk> = departments
        .iter()
        .filter(|(_, counts)| counts.is_object())
        .map(|(department, counts)| DepartmentRisk {
            department: department.clone(),
            high: rounded_field(counts, &["High", "high"], 0),
            medium: rounded_field(counts, &["Medium", "medium"], 0),
            low: rounded_field(counts, &["Low", "low"], 0),
        })
        .collect();

    rows.sort_by(|a, b| a.department.cmp(&b.department));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payload_yields_fully_defaulted_record() {
        let student = normalize_student(&json!({}));
        assert_eq!(student.id, "");
        assert_eq!(student.name, "N/A");
        assert_eq!(student.department, "");
        assert_eq!(student.year, 1);
        assert_eq!(student.risk_level, RiskLevel::Unknown);
        assert_eq!(student.engagement_score, 0);
        assert_eq!(student.attendance, 0);
        assert_eq!(student.cgpa, 0.0);
        assert_eq!(student.credits_completed, 0);
        assert_eq!(student.prediction_confidence, 0);
        assert!(student.risk_factors.is_empty());
    }

    #[test]
    fn non_object_payloads_are_total() {
        for raw in [json!(null), json!(42), json!("student"), json!([1, 2])] {
            let student = normalize_student(&raw);
            assert_eq!(student.name, "N/A");
            assert_eq!(normalize_dashboard_stats(&raw), DashboardStats::default());
        }
    }

    #[test]
    fn primary_field_wins_over_alias() {
        let student = normalize_student(&json!({"attendance": 90, "attendance_rate": 10}));
        assert_eq!(student.attendance, 90);

        let student = normalize_student(&json!({"cgpa": 8.25, "academic_performance": 5.0}));
        assert_eq!(student.cgpa, 8.25);
    }

    #[test]
    fn aliases_fill_in_when_primary_missing_or_null() {
        let student = normalize_student(&json!({
            "id": "S-17",
            "attendance": null,
            "attendance_rate": 82.6,
            "academic_performance": 6.73,
        }));
        assert_eq!(student.id, "S-17");
        assert_eq!(student.name, "S-17");
        assert_eq!(student.attendance, 83);
        assert_eq!(student.cgpa, 6.73);
    }

    #[test]
    fn zero_is_present_and_does_not_fall_through() {
        let student = normalize_student(&json!({"attendance": 0, "attendance_rate": 75}));
        assert_eq!(student.attendance, 0);
    }

    #[test]
    fn full_backend_record_is_normalized() {
        let student = normalize_student(&json!({
            "student_id": "STU0042",
            "name": "Asha Verma",
            "department": "Computer Science",
            "year": 3,
            "risk_level": "High",
            "engagement_score": 41.6,
            "attendance_rate": 58.4,
            "cgpa": 5.92,
            "credits_completed": 86,
            "email": "asha@college.edu",
            "confidence": 87.5,
            "risk_factors": ["Low attendance", 7, "Declining grades"],
        }));
        assert_eq!(student.id, "STU0042");
        assert_eq!(student.name, "Asha Verma");
        assert_eq!(student.year, 3);
        assert_eq!(student.risk_level, RiskLevel::High);
        assert_eq!(student.engagement_score, 42);
        assert_eq!(student.attendance, 58);
        assert_eq!(student.cgpa, 5.92);
        assert_eq!(student.credits_completed, 86);
        assert_eq!(student.prediction_confidence, 88);
        assert_eq!(student.phone, "");
        assert_eq!(student.risk_factors, vec!["Low attendance", "Declining grades"]);
    }

    #[test]
    fn numeric_department_and_numeric_strings_are_coerced() {
        let student = normalize_student(&json!({
            "department": 4,
            "engagement_score": "66.5",
            "attendance": "n/a",
        }));
        assert_eq!(student.department, "4");
        assert_eq!(student.engagement_score, 67);
        assert_eq!(student.attendance, 0);
    }

    #[test]
    fn unrecognized_risk_label_is_unknown() {
        let student = normalize_student(&json!({"risk_level": "Severe"}));
        assert_eq!(student.risk_level, RiskLevel::Unknown);
        let student = normalize_student(&json!({"risk_level": "medium"}));
        assert_eq!(student.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn dashboard_stats_keep_counts_and_round_rates() {
        let stats = normalize_dashboard_stats(&json!({
            "total_students": 100,
            "high_risk": 10,
            "medium_risk": 30,
            "low_risk": 60,
            "avg_engagement_score": 71.48,
            "disengagement_rate": 10.5,
        }));
        assert_eq!(
            stats,
            DashboardStats {
                total_students: 100,
                high_risk: 10,
                medium_risk: 30,
                low_risk: 60,
                avg_engagement: 71,
                disengagement_rate: 11,
            }
        );
        assert!(stats.is_consistent());
    }

    #[test]
    fn oversized_dashboard_counts_do_not_panic() {
        let stats = normalize_dashboard_stats(&json!({
            "total_students": 1,
            "high_risk": 9.0e18,
            "medium_risk": 9.0e18,
            "low_risk": 0,
        }));
        assert!(!stats.is_consistent());
        assert_eq!(stats.count(RiskLevel::Unknown), 0);
    }

    #[test]
    fn year_below_one_falls_back_to_first_year() {
        assert_eq!(normalize_student(&json!({"year": 0})).year, 1);
        assert_eq!(normalize_student(&json!({"year": -2})).year, 1);
        assert_eq!(normalize_student(&json!({"year": "4"})).year, 4);
    }

    #[test]
    fn student_page_maps_every_entry() {
        let page = normalize_student_page(&json!({
            "students": [{"student_id": "A"}, {"student_id": "B", "risk_level": "Low"}],
            "total_pages": 4,
            "current_page": 2,
            "total_students": 37,
        }));
        assert_eq!(page.students.len(), 2);
        assert_eq!(page.students[1].risk_level, RiskLevel::Low);
        assert_eq!(page.total_pages, 4);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_students, 37);

        let empty = normalize_student_page(&json!({}));
        assert!(empty.students.is_empty());
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.total_students, 0);
    }

    #[test]
    fn prediction_reads_backend_fields() {
        let prediction = normalize_prediction(&json!({
            "risk_level": "Medium",
            "engagement_score": 61.2,
            "confidence": 79.9,
        }));
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
        assert_eq!(prediction.engagement_score, 61);
        assert_eq!(prediction.confidence, 80);
        assert_eq!(normalize_prediction(&json!({})).risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn explanation_orders_features_by_magnitude() {
        let explanation = normalize_explanation(&json!({
            "prediction": "High",
            "confidence": 91.4,
            "feature_importance": [
                ["attendance_rate", 0.12],
                {"feature": "cgpa", "importance": -0.4},
                ["broken"],
                ["library_visits", "0.05"],
            ],
        }));
        assert_eq!(explanation.prediction, RiskLevel::High);
        assert_eq!(explanation.confidence, 91);
        let names: Vec<&str> = explanation.features.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, ["cgpa", "attendance_rate", "library_visits"]);
    }

    #[test]
    fn department_breakdown_reads_tier_counts() {
        let rows = department_breakdown(&json!({
            "department_performance": {
                "Physics": {"High": 3, "Low": 12},
                "Biology": {"High": 1, "Medium": 4, "Low": 9},
                "charts": "ignored",
            }
        }));
        assert_eq!(
            rows,
            vec![
                DepartmentRisk {
                    department: "Biology".into(),
                    high: 1,
                    medium: 4,
                    low: 9
                },
                DepartmentRisk {
                    department: "Physics".into(),
                    high: 3,
                    medium: 0,
                    low: 12
                },
            ]
        );
        assert!(department_breakdown(&json!({"department_performance": [1, 2]})).is_empty());
        assert!(department_breakdown(&json!({})).is_empty());
    }
}
