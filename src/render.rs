/// Plain-text rendering of the UI state
///
/// Consumes finished [`UiState`] values; it never drives the pipeline.
use std::fmt::Write;

use crate::backend::{AnalysisResult, SentimentLabel, Verdict};
use crate::pipeline::{BackendIndicator, UiState};
use crate::video::VideoReference;

const BAR_WIDTH: usize = 20;

/// Render one state as a block of text
pub fn render_state(state: &UiState, video: Option<&VideoReference>, max_comment_chars: usize) -> String {
    match state {
        UiState::Idle => String::new(),
        UiState::NotApplicable => "Open a YouTube video to analyze its comments.".to_string(),
        UiState::Loading { stage } => stage.message().to_string(),
        UiState::Error { message } => format!("Error: {}", message),
        UiState::Results { result } => render_results(result, video, max_comment_chars),
    }
}

pub fn render_indicator(indicator: BackendIndicator) -> &'static str {
    match indicator {
        BackendIndicator::Unknown => "○ backend status unknown",
        BackendIndicator::Checking => "◌ checking backend…",
        BackendIndicator::Online => "● backend online",
        BackendIndicator::Offline => "✕ backend offline",
    }
}

fn render_results(result: &AnalysisResult, video: Option<&VideoReference>, max_comment_chars: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", result.title);
    let _ = writeln!(out, "{} comments analyzed", result.total_comments);
    if let Some(video) = video {
        let _ = writeln!(out, "Thumbnail: {}", video.thumbnail_url());
    }
    out.push('\n');

    let _ = writeln!(out, "Overall: {}", label_text(result.sentiment_label));
    let _ = writeln!(out, "Overall score: {}", format_score(result.average_score));
    out.push('\n');

    for (name, pct, count) in [
        ("Positive", result.positive_pct, result.positive_count),
        ("Neutral", result.neutral_pct, result.neutral_count),
        ("Negative", result.negative_pct, result.negative_count),
    ] {
        let _ = writeln!(out, "{:<9}{} {:>5.1}% ({})", name, bar(pct), pct, count);
    }
    out.push('\n');

    let _ = writeln!(out, "Worth watching: {}", verdict_badge(result.verdict));
    if !result.verdict_reason.is_empty() {
        let _ = writeln!(out, "  {}", result.verdict_reason);
    }
    out.push('\n');

    if result.key_insights.is_empty() {
        let _ = writeln!(out, "Key insights: No keywords extracted.");
    } else {
        let _ = writeln!(out, "Key insights: {}", result.key_insights.join(", "));
    }

    render_comments(&mut out, "positive", &result.top_positive_comments, max_comment_chars);
    render_comments(&mut out, "negative", &result.top_negative_comments, max_comment_chars);

    out
}

fn render_comments(out: &mut String, kind: &str, comments: &[String], max_chars: usize) {
    let _ = writeln!(out, "\nTop {} comments:", kind);
    if comments.is_empty() {
        let _ = writeln!(out, "  No {} comments found.", kind);
        return;
    }
    for comment in comments {
        let _ = writeln!(out, "  - {}", truncate(comment, max_chars));
    }
}

fn label_text(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "Positive",
        SentimentLabel::Neutral => "Neutral",
        SentimentLabel::Negative => "Negative",
    }
}

pub fn verdict_badge(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Yes => "✅ YES",
        Verdict::Maybe => "🤔 MAYBE",
        Verdict::No => "❌ NO",
    }
}

/// Signed score with three decimals, e.g. `+0.420`
pub fn format_score(score: f64) -> String {
    // -0.0 prints as "-0.000" otherwise
    let score = if score == 0.0 { 0.0 } else { score };
    if score > 0.0 {
        format!("+{:.3}", score)
    } else {
        format!("{:.3}", score)
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

fn bar(pct: f64) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}
