//! Value objects returned by the quality tool adapters.
//!
//! All scores are on a 0–100 scale. These records are consumed read-only
//! by the pipeline stages and refinement loops.

use serde::{Deserialize, Serialize};

/// SEO analysis of a draft: overall score plus the measurable dimensions
/// the refinement loop compares against its targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoAnalysis {
    /// Overall SEO score.
    pub score: f64,
    /// Focus-keyword density, percent of total words.
    pub keyword_density: f64,
    /// Readability score.
    pub readability: f64,
    /// Title length in characters.
    pub title_length: usize,
    /// Meta description length in characters.
    pub meta_description_length: usize,
    /// Content length in words.
    pub content_length: usize,
    /// Outstanding problems, most important first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    /// Suggested improvements, most important first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub improvements: Vec<String>,
}

/// A section of text flagged as matching an external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    /// The matched excerpt from the article.
    pub excerpt: String,
    /// Attribution of the likely source.
    pub source: String,
}

/// Plagiarism check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismReport {
    /// Percentage of the article flagged as matching existing sources.
    pub score_percent: f64,
    /// The flagged sections with source attributions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<PlagiarismMatch>,
}

/// Bias detection result. Lower is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    /// Bias score; 0 is neutral.
    pub score: f64,
    /// Phrases that contributed to the score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_phrases: Vec<String>,
    /// Whether a second model corroborated the score. `false` means
    /// single-model mode (no secondary provider configured).
    #[serde(default)]
    pub cross_validated: bool,
}

/// Fact verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckReport {
    /// Confidence that checkable claims are supported.
    pub score: f64,
    /// Fraction of claim-bearing paragraphs carrying a citation, 0–1.
    pub citation_rate: f64,
    /// Number of claims examined.
    pub claims_checked: usize,
}

/// AI-generated-text likelihood. Lower is better (reads more human).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDetectionReport {
    /// Likelihood the text reads as machine-generated.
    pub score: f64,
    /// Signals that contributed to the score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
}

/// Perspective coverage analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveReport {
    /// Number of distinct viewpoints detected.
    pub perspectives_found: usize,
    /// Coverage score.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seo_analysis_serde_roundtrip() {
        let analysis = SeoAnalysis {
            score: 72.5,
            keyword_density: 1.4,
            readability: 66.0,
            title_length: 58,
            meta_description_length: 152,
            content_length: 1480,
            issues: vec!["keyword density below 1.5%".into()],
            improvements: vec!["add the focus keyword to one more subheading".into()],
        };
        let json = serde_json::to_string(&analysis).unwrap();
        let parsed: SeoAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.score, 72.5);
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn plagiarism_report_empty_matches_skipped() {
        let report = PlagiarismReport {
            score_percent: 1.2,
            matches: vec![],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("matches"));
    }
}
