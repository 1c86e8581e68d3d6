use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    /// The backend sent no label, or one outside the known vocabulary.
    Unknown,
}

/// Display attributes for a risk badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskStyle {
    pub label: &'static str,
    pub color: &'static str,
}

impl RiskLevel {
    pub const KNOWN: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    /// Case-insensitive match against the closed vocabulary, anything else is `Unknown`.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Unknown,
        }
    }

    /// Label in the backend's own casing, used for the `risk` query filter.
    pub fn backend_label(self) -> Option<&'static str> {
        match self {
            RiskLevel::High => Some("High"),
            RiskLevel::Medium => Some("Medium"),
            RiskLevel::Low => Some("Low"),
            RiskLevel::Unknown => None,
        }
    }

    pub fn style(self) -> RiskStyle {
        match self {
            RiskLevel::High => RiskStyle {
                label: "High Risk",
                color: "red",
            },
            RiskLevel::Medium => RiskStyle {
                label: "Medium Risk",
                color: "yellow",
            },
            RiskLevel::Low => RiskStyle {
                label: "Low Risk",
                color: "green",
            },
            RiskLevel::Unknown => RiskStyle {
                label: "Unknown Risk",
                color: "grey",
            },
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.style().label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub department: String,
    pub year: i64,
    pub risk_level: RiskLevel,
    pub engagement_score: i64,
    pub attendance: i64,
    pub cgpa: f64,
    pub credits_completed: i64,
    pub email: String,
    pub phone: String,
    pub prediction_confidence: i64,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_students: i64,
    pub high_risk: i64,
    pub medium_risk: i64,
    pub low_risk: i64,
    pub avg_engagement: i64,
    pub disengagement_rate: i64,
}

impl DashboardStats {
    /// Whether the per-tier counts add up to the total.
    pub fn is_consistent(&self) -> bool {
        self.classified() == i128::from(self.total_students)
    }

    fn classified(&self) -> i128 {
        i128::from(self.high_risk) + i128::from(self.medium_risk) + i128::from(self.low_risk)
    }

    pub fn count(&self, level: RiskLevel) -> i64 {
        match level {
            RiskLevel::High => self.high_risk,
            RiskLevel::Medium => self.medium_risk,
            RiskLevel::Low => self.low_risk,
            RiskLevel::Unknown => {
                let rest = (i128::from(self.total_students) - self.classified()).max(0);
                i64::try_from(rest).unwrap_or(i64::MAX)
            }
        }
    }

    /// Percentage of all students in `level`, 0 when there are no students.
    pub fn risk_share(&self, level: RiskLevel) -> f64 {
        if self.total_students <= 0 {
            return 0.0;
        }
        self.count(level) as f64 / self.total_students as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPage {
    pub students: Vec<StudentRecord>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_students: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentRisk {
    pub department: String,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

/// Typed view of a `/predict` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub risk_level: RiskLevel,
    pub engagement_score: i64,
    pub confidence: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

/// Typed view of a `/shap_analysis/{id}` response, strongest features first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub prediction: RiskLevel,
    pub confidence: i64,
    pub features: Vec<FeatureImpact>,
}

/// Filters and paging for the student list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentQuery {
    pub search: Option<String>,
    pub risk: Option<RiskLevel>,
    pub department: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl StudentQuery {
    /// Query pairs with empty filters left out.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(label) = self.risk.and_then(RiskLevel::backend_label) {
            pairs.push(("risk", label.to_string()));
        }
        if let Some(department) = self.department.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("department", department.to_string()));
        }
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page.filter(|p| *p > 0) {
            pairs.push(("per_page", per_page.to_string()));
        }
        pairs
    }
}
