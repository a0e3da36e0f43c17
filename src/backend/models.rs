//! Analysis payloads exchanged with the backend

use serde::{Deserialize, Serialize};

use crate::video::VideoReference;

/// Allowed drift of the three percentages away from 100
const PERCENT_TOLERANCE: f64 = 0.5;

/// Title used when the backend does not send one
pub const UNKNOWN_TITLE: &str = "Unknown Video";

/// Outbound body of `POST /analyze`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

impl From<&VideoReference> for AnalysisRequest {
    fn from(video: &VideoReference) -> Self {
        Self {
            video_id: video.id().to_string(),
        }
    }
}

/// Overall tone of the comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Interpret a backend label.
    ///
    /// Besides the plain `positive`/`neutral`/`negative`, the descriptive
    /// labels of the reference backend ("Highly Positive", "Mostly Negative",
    /// "Mixed / Neutral", "No Comments Found") are understood.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.contains("positive") {
            Some(SentimentLabel::Positive)
        } else if label.contains("negative") {
            Some(SentimentLabel::Negative)
        } else if label.contains("neutral") || label.contains("mixed") || label.starts_with("no comments") {
            Some(SentimentLabel::Neutral)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

/// Whether the video seems worth watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    #[default]
    Maybe,
    No,
}

impl Verdict {
    /// Unknown values fall back to `Maybe`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "yes" => Verdict::Yes,
            "no" => Verdict::No,
            _ => Verdict::Maybe,
        }
    }
}

/// The backend's scored output for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub title: String,
    pub total_comments: u64,
    pub sentiment_label: SentimentLabel,
    pub average_score: f64,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
    pub positive_count: u64,
    pub neutral_count: u64,
    pub negative_count: u64,
    pub key_insights: Vec<String>,
    pub verdict: Verdict,
    pub verdict_reason: String,
    pub top_positive_comments: Vec<String>,
    pub top_negative_comments: Vec<String>,
}

/// Raw `POST /analyze` success body.
///
/// Accepts the camelCase field names as well as the snake_case names of the
/// reference backend; [`AnalysisPayload::into_result`] checks what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisPayload {
    #[serde(rename = "title", alias = "video_title")]
    title: Option<String>,
    #[serde(rename = "totalComments", alias = "total")]
    total_comments: Option<u64>,
    #[serde(rename = "sentimentLabel", alias = "sentiment_label")]
    sentiment_label: Option<String>,
    #[serde(rename = "averageScore", alias = "average_compound")]
    average_score: Option<f64>,
    #[serde(rename = "positivePct", alias = "positive_pct")]
    positive_pct: Option<f64>,
    #[serde(rename = "neutralPct", alias = "neutral_pct")]
    neutral_pct: Option<f64>,
    #[serde(rename = "negativePct", alias = "negative_pct")]
    negative_pct: Option<f64>,
    #[serde(rename = "positiveCount", alias = "positive")]
    positive_count: Option<u64>,
    #[serde(rename = "neutralCount", alias = "neutral")]
    neutral_count: Option<u64>,
    #[serde(rename = "negativeCount", alias = "negative")]
    negative_count: Option<u64>,
    #[serde(rename = "keyInsights", alias = "key_insights")]
    key_insights: Option<Vec<String>>,
    #[serde(rename = "verdict", alias = "worth_watching")]
    verdict: Option<String>,
    #[serde(rename = "verdictReason", alias = "worth_reason")]
    verdict_reason: Option<String>,
    #[serde(rename = "topPositiveComments")]
    top_positive_comments: Option<Vec<String>>,
    #[serde(rename = "topNegativeComments")]
    top_negative_comments: Option<Vec<String>>,
    top_comments: Option<TopComments>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TopComments {
    #[serde(default)]
    top_positive: Vec<String>,
    #[serde(default)]
    top_negative: Vec<String>,
}

impl AnalysisPayload {
    /// Check required fields and internal consistency.
    ///
    /// The error is a human readable diagnostic.
    pub fn into_result(self) -> Result<AnalysisResult, String> {
        let mut missing = Vec::new();
        if self.total_comments.is_none() {
            missing.push("totalComments");
        }
        if self.positive_count.is_none() {
            missing.push("positiveCount");
        }
        if self.neutral_count.is_none() {
            missing.push("neutralCount");
        }
        if self.negative_count.is_none() {
            missing.push("negativeCount");
        }
        if self.sentiment_label.is_none() {
            missing.push("sentimentLabel");
        }
        if self.average_score.is_none() {
            missing.push("averageScore");
        }

        let (
            Some(total_comments),
            Some(positive_count),
            Some(neutral_count),
            Some(negative_count),
            Some(label),
            Some(average_score),
        ) = (
            self.total_comments,
            self.positive_count,
            self.neutral_count,
            self.negative_count,
            self.sentiment_label,
            self.average_score,
        )
        else {
            return Err(format!("Analysis response is missing fields: {}", missing.join(", ")));
        };

        let sentiment_label = SentimentLabel::from_label(&label)
            .ok_or_else(|| format!("Unknown sentiment label: {:?}", label))?;

        if !average_score.is_finite() {
            return Err("Average score is not a number".to_string());
        }

        let counted = positive_count
            .checked_add(neutral_count)
            .and_then(|sum| sum.checked_add(negative_count));
        if counted != Some(total_comments) {
            return Err(format!(
                "Comment counts do not add up: {} + {} + {} != {}",
                positive_count, neutral_count, negative_count, total_comments
            ));
        }

        let (positive_pct, neutral_pct, negative_pct) =
            match (self.positive_pct, self.neutral_pct, self.negative_pct) {
                (Some(positive), Some(neutral), Some(negative)) => (positive, neutral, negative),
                _ => (
                    percent_of(positive_count, total_comments),
                    percent_of(neutral_count, total_comments),
                    percent_of(negative_count, total_comments),
                ),
            };

        if total_comments > 0 {
            let sum = positive_pct + neutral_pct + negative_pct;
            if !sum.is_finite() || (sum - 100.0).abs() > PERCENT_TOLERANCE {
                return Err(format!("Sentiment percentages add up to {:.1}, not 100", sum));
            }
        }

        let top_comments = self.top_comments.unwrap_or_default();

        Ok(AnalysisResult {
            title: self
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            total_comments,
            sentiment_label,
            average_score,
            positive_pct,
            neutral_pct,
            negative_pct,
            positive_count,
            neutral_count,
            negative_count,
            key_insights: self.key_insights.unwrap_or_default(),
            verdict: self.verdict.as_deref().map(Verdict::from_label).unwrap_or_default(),
            verdict_reason: self.verdict_reason.unwrap_or_default(),
            top_positive_comments: self.top_positive_comments.unwrap_or(top_comments.top_positive),
            top_negative_comments: self.top_negative_comments.unwrap_or(top_comments.top_negative),
        })
    }
}

/// Share of `count` in `total`, rounded to one decimal
fn percent_of(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}
