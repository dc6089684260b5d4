use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum ResultStatus {
    Passed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ResultStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultSummary {
    pub(crate) id: i64,
    pub(crate) exam_title: String,
    #[serde(default)]
    pub(crate) exam_category: Option<String>,
    #[serde(default)]
    pub(crate) obtained_marks: f64,
    #[serde(default)]
    pub(crate) total_marks: f64,
    #[serde(default)]
    pub(crate) passing_marks: f64,
    #[serde(default)]
    pub(crate) percentage: f64,
    pub(crate) status: ResultStatus,
    /// Server-formatted timestamp, shown as-is.
    #[serde(default)]
    pub(crate) completed_at: Option<String>,
    #[serde(default)]
    pub(crate) duration: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultsOverview {
    #[serde(default)]
    pub(crate) results: Vec<ResultSummary>,
    #[serde(default)]
    pub(crate) total_results: u64,
    #[serde(default)]
    pub(crate) average_percentage: f64,
    #[serde(default)]
    pub(crate) passed_exams: u64,
    #[serde(default)]
    pub(crate) failed_exams: u64,
    #[serde(default)]
    pub(crate) pass_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_decodes() {
        let overview: ResultsOverview = serde_json::from_value(serde_json::json!({
            "results": [{
                "id": 1,
                "examTitle": "Chemistry",
                "examCategory": "Science",
                "obtainedMarks": 35.0,
                "totalMarks": 50.0,
                "passingMarks": 20.0,
                "percentage": 70.0,
                "status": "PASSED",
                "completedAt": "2026-01-05 11:20",
                "duration": "25 min"
            }],
            "totalResults": 1,
            "averagePercentage": 70.0,
            "passedExams": 1,
            "failedExams": 0,
            "passRate": 100.0
        }))
        .expect("overview");
        assert_eq!(overview.results.len(), 1);
        assert_eq!(overview.results[0].status, ResultStatus::Passed);
        assert_eq!(overview.passed_exams, 1);
    }
}
