//! Deterministic local quality analyzers.
//!
//! The scoring heuristics here are intentionally simple text statistics:
//! sentence-length distributions, keyword density, marker-phrase counts.
//! They exist so the pipeline has a working default wiring; production
//! deployments can swap in external checkers behind the same traits.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use draftpilot_shared::Result;

use crate::report::{
    AiDetectionReport, BiasReport, FactCheckReport, PerspectiveReport, PlagiarismMatch,
    PlagiarismReport, SeoAnalysis,
};
use crate::{
    AiDetector, BiasDetector, FactChecker, PerspectiveAnalyzer, PlagiarismChecker, SeoAnalyzer,
};

static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence split regex"));

static CITATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://\S+|according to|\[\d+\]|\bcited\b|\bstudy\b)")
        .expect("citation regex")
});

// ---------------------------------------------------------------------------
// Text statistics
// ---------------------------------------------------------------------------

/// Count words by whitespace splitting.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split into sentences on terminal punctuation.
pub fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Average sentence length in words. Zero for empty text.
pub fn avg_sentence_length(text: &str) -> f64 {
    let sents = sentences(text);
    if sents.is_empty() {
        return 0.0;
    }
    let total: usize = sents.iter().map(|s| word_count(s)).sum();
    total as f64 / sents.len() as f64
}

/// Readability score (0–100) from the average-sentence-length heuristic.
///
/// Peaks at ~15 words per sentence and falls off 3 points per word of
/// deviation. Empty text scores 0.
pub fn readability_score(text: &str) -> f64 {
    let avg = avg_sentence_length(text);
    if avg == 0.0 {
        return 0.0;
    }
    (100.0 - (avg - 15.0).abs() * 3.0).clamp(0.0, 100.0)
}

/// Focus-keyword density as a percent of total words.
pub fn keyword_density(text: &str, keyword: &str) -> f64 {
    let total = word_count(text);
    if total == 0 || keyword.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let needle = keyword.to_lowercase();
    let occurrences = haystack.matches(&needle).count();
    let keyword_words = word_count(keyword).max(1);
    (occurrences * keyword_words) as f64 / total as f64 * 100.0
}

// ---------------------------------------------------------------------------
// SEO
// ---------------------------------------------------------------------------

/// SEO scoring from keyword density, readability, and length checks.
#[derive(Debug, Default)]
pub struct HeuristicSeoAnalyzer;

#[async_trait]
impl SeoAnalyzer for HeuristicSeoAnalyzer {
    async fn analyze(
        &self,
        content: &str,
        title: &str,
        meta_description: &str,
        keyword: &str,
    ) -> Result<SeoAnalysis> {
        let density = keyword_density(content, keyword);
        let readability = readability_score(content);
        let title_length = title.chars().count();
        let meta_length = meta_description.chars().count();
        let content_length = word_count(content);

        let mut issues = Vec::new();
        let mut improvements = Vec::new();
        let mut score: f64 = 100.0;

        if !(0.8..=2.5).contains(&density) {
            score -= 20.0;
            issues.push(format!("keyword density {density:.1}% outside 0.8–2.5%"));
            improvements.push(format!("work \"{keyword}\" naturally into more paragraphs"));
        }
        if readability < 60.0 {
            score -= 15.0;
            issues.push(format!("readability {readability:.0} below 60"));
            improvements.push("shorten long sentences and break up dense paragraphs".into());
        }
        if !(30..=65).contains(&title_length) {
            score -= 10.0;
            issues.push(format!("title length {title_length} outside 30–65 chars"));
            improvements.push("rewrite the title to 30–65 characters".into());
        }
        if !(120..=160).contains(&meta_length) {
            score -= 10.0;
            issues.push(format!("meta description {meta_length} outside 120–160 chars"));
            improvements.push("rewrite the meta description to 120–160 characters".into());
        }
        if content_length < 600 {
            score -= 20.0;
            issues.push(format!("content length {content_length} words below 600"));
            improvements.push("expand thin sections with supporting detail".into());
        }
        if !title.to_lowercase().contains(&keyword.to_lowercase()) {
            score -= 10.0;
            issues.push("focus keyword missing from title".into());
            improvements.push(format!("include \"{keyword}\" in the title"));
        }

        Ok(SeoAnalysis {
            score: score.clamp(0.0, 100.0),
            keyword_density: density,
            readability,
            title_length,
            meta_description_length: meta_length,
            content_length,
            issues,
            improvements,
        })
    }
}

// ---------------------------------------------------------------------------
// Plagiarism
// ---------------------------------------------------------------------------

/// Self-similarity plagiarism check: repeated 8-word shingles across the
/// document count as matched text. A local stand-in for an external
/// source-matching service.
#[derive(Debug)]
pub struct HeuristicPlagiarismChecker;

const SHINGLE_WORDS: usize = 8;

#[async_trait]
impl PlagiarismChecker for HeuristicPlagiarismChecker {
    async fn analyze(&self, content: &str, _title: &str) -> Result<PlagiarismReport> {
        let words: Vec<&str> = content.split_whitespace().collect();
        if words.len() < SHINGLE_WORDS * 2 {
            return Ok(PlagiarismReport {
                score_percent: 0.0,
                matches: vec![],
            });
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut duplicated = 0usize;
        let mut matches = Vec::new();

        for (i, window) in words.windows(SHINGLE_WORDS).enumerate() {
            let shingle = window.join(" ").to_lowercase();
            if let Some(first) = seen.get(&shingle) {
                duplicated += SHINGLE_WORDS;
                if matches.len() < 5 {
                    matches.push(PlagiarismMatch {
                        excerpt: window.join(" "),
                        source: format!("duplicate of word offset {first}"),
                    });
                }
            } else {
                seen.insert(shingle, i);
            }
        }

        let score = (duplicated as f64 / words.len() as f64 * 100.0).min(100.0);
        Ok(PlagiarismReport {
            score_percent: score,
            matches,
        })
    }
}

// ---------------------------------------------------------------------------
// Bias
// ---------------------------------------------------------------------------

/// Loaded-language scan.
#[derive(Debug)]
pub struct HeuristicBiasDetector {
    loaded_phrases: Vec<&'static str>,
}

impl Default for HeuristicBiasDetector {
    fn default() -> Self {
        Self {
            loaded_phrases: vec![
                "obviously",
                "everyone knows",
                "clearly",
                "undeniably",
                "without question",
                "the only",
                "always",
                "never",
            ],
        }
    }
}

#[async_trait]
impl BiasDetector for HeuristicBiasDetector {
    async fn analyze(&self, content: &str, _title: &str) -> Result<BiasReport> {
        let lower = content.to_lowercase();
        let total = word_count(content).max(1);

        let mut flagged = Vec::new();
        let mut hits = 0usize;
        for phrase in &self.loaded_phrases {
            let count = lower.matches(phrase).count();
            if count > 0 {
                hits += count;
                flagged.push(phrase.to_string());
            }
        }

        // Hits per 100 words, scaled to a 0–100 score.
        let score = (hits as f64 / total as f64 * 100.0 * 10.0).min(100.0);
        Ok(BiasReport {
            score,
            flagged_phrases: flagged,
            cross_validated: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Fact verification
// ---------------------------------------------------------------------------

/// Citation-rate scan over claim-bearing paragraphs.
#[derive(Debug, Default)]
pub struct HeuristicFactChecker;

#[async_trait]
impl FactChecker for HeuristicFactChecker {
    async fn analyze(&self, content: &str, _title: &str) -> Result<FactCheckReport> {
        let paragraphs: Vec<&str> = content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if paragraphs.is_empty() {
            return Ok(FactCheckReport {
                score: 0.0,
                citation_rate: 0.0,
                claims_checked: 0,
            });
        }

        let cited = paragraphs
            .iter()
            .filter(|p| CITATION_MARKER.is_match(p))
            .count();
        let citation_rate = cited as f64 / paragraphs.len() as f64;
        let score = (50.0 + citation_rate * 50.0).clamp(0.0, 100.0);

        Ok(FactCheckReport {
            score,
            citation_rate,
            claims_checked: paragraphs.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// AI detection
// ---------------------------------------------------------------------------

/// Burstiness check: uniform sentence lengths read as machine-generated.
#[derive(Debug)]
pub struct HeuristicAiDetector;

#[async_trait]
impl AiDetector for HeuristicAiDetector {
    async fn analyze(&self, content: &str) -> Result<AiDetectionReport> {
        let sents = sentences(content);
        if sents.len() < 3 {
            return Ok(AiDetectionReport {
                score: 50.0,
                signals: vec!["too short to analyze".into()],
            });
        }

        let lengths: Vec<f64> = sents.iter().map(|s| word_count(s) as f64).collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let variance =
            lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
        let stddev = variance.sqrt();

        // High variation in sentence length reads human; monotone does not.
        let mut score = (80.0 - stddev * 8.0).clamp(5.0, 95.0);
        let mut signals = vec![format!("sentence length stddev {stddev:.1}")];

        let starters: Vec<&str> = sents
            .iter()
            .filter_map(|s| s.split_whitespace().next())
            .collect();
        let unique_starters: std::collections::HashSet<_> =
            starters.iter().map(|s| s.to_lowercase()).collect();
        if unique_starters.len() * 2 < starters.len() {
            score = (score + 10.0).min(95.0);
            signals.push("repetitive sentence openers".into());
        }

        Ok(AiDetectionReport { score, signals })
    }
}

// ---------------------------------------------------------------------------
// Perspectives
// ---------------------------------------------------------------------------

/// Contrast-marker scan for viewpoint coverage.
#[derive(Debug)]
pub struct HeuristicPerspectiveAnalyzer {
    markers: Vec<&'static str>,
}

impl Default for HeuristicPerspectiveAnalyzer {
    fn default() -> Self {
        Self {
            markers: vec![
                "however",
                "on the other hand",
                "in contrast",
                "critics",
                "proponents",
                "some argue",
                "alternatively",
                "others believe",
            ],
        }
    }
}

#[async_trait]
impl PerspectiveAnalyzer for HeuristicPerspectiveAnalyzer {
    async fn analyze(&self, content: &str, _title: &str) -> Result<PerspectiveReport> {
        let lower = content.to_lowercase();
        let found = self
            .markers
            .iter()
            .filter(|m| lower.contains(*m))
            .count();
        // One implicit baseline perspective plus one per distinct marker.
        let perspectives_found = 1 + found;
        let score = ((perspectives_found as f64 / 3.0) * 100.0).min(100.0);
        Ok(PerspectiveReport {
            perspectives_found,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Rust is a systems language. It offers memory safety without garbage \
        collection, which many teams value. However, the learning curve is real. According to \
        the 2024 survey, adoption keeps growing.\n\nCritics point at compile times. Proponents \
        answer that correctness up front saves debugging later. See https://example.com/survey \
        for the data.";

    #[test]
    fn word_and_sentence_stats() {
        assert_eq!(word_count("one two three"), 3);
        let sents = sentences(SAMPLE);
        assert!(sents.len() >= 5);
        assert!(avg_sentence_length(SAMPLE) > 3.0);
    }

    #[test]
    fn readability_peaks_near_fifteen_word_sentences() {
        let ideal = "word ".repeat(15).trim_end().to_string() + ". " + &"word ".repeat(15);
        let choppy = "a. b. c. d. e. f.";
        assert!(readability_score(&ideal) > readability_score(choppy));
        assert_eq!(readability_score(""), 0.0);
    }

    #[test]
    fn keyword_density_counts_phrase_occurrences() {
        let text = "rust async is fast. rust async is everywhere in rust async code.";
        let density = keyword_density(text, "rust async");
        assert!(density > 0.0);
        assert_eq!(keyword_density(text, ""), 0.0);
        assert_eq!(keyword_density("", "rust"), 0.0);
    }

    #[tokio::test]
    async fn seo_analyzer_flags_thin_content() {
        let analyzer = HeuristicSeoAnalyzer;
        let analysis = analyzer
            .analyze("short text without the term", "A title", "meta", "rust")
            .await
            .unwrap();
        assert!(analysis.score < 100.0);
        assert!(analysis.issues.iter().any(|i| i.contains("content length")));
        assert!(analysis.issues.iter().any(|i| i.contains("keyword")));
    }

    #[tokio::test]
    async fn seo_score_stays_in_range_with_every_deduction() {
        // An empty draft trips all six deductions (85 points off 100).
        let analyzer = HeuristicSeoAnalyzer;
        let analysis = analyzer.analyze("", "t", "m", "rust").await.unwrap();
        assert_eq!(analysis.score, 15.0);
        assert!((0.0..=100.0).contains(&analysis.score));
        assert_eq!(analysis.issues.len(), 6);
    }

    #[tokio::test]
    async fn plagiarism_checker_finds_repeated_shingles() {
        let repeated = "the quick brown fox jumps over the lazy dog again and again \
            the quick brown fox jumps over the lazy dog again and again";
        let checker = HeuristicPlagiarismChecker;
        let report = checker.analyze(repeated, "t").await.unwrap();
        assert!(report.score_percent > 0.0);
        assert!(!report.matches.is_empty());

        let clean = "every sentence in this passage is distinct from its neighbours so no \
            shingle repeats anywhere across the entire body of text at all";
        let report = checker.analyze(clean, "t").await.unwrap();
        assert_eq!(report.score_percent, 0.0);
    }

    #[tokio::test]
    async fn bias_detector_flags_loaded_language() {
        let detector = HeuristicBiasDetector::default();
        let biased = "Obviously this is the only answer. Everyone knows it never fails.";
        let report = detector.analyze(biased, "t").await.unwrap();
        assert!(report.score > 0.0);
        assert!(report.flagged_phrases.contains(&"obviously".to_string()));
        assert!(!report.cross_validated);

        let neutral = "The benchmark measured a 12% improvement across three runs.";
        let report = detector.analyze(neutral, "t").await.unwrap();
        assert_eq!(report.score, 0.0);
    }

    #[tokio::test]
    async fn fact_checker_measures_citation_rate() {
        let checker = HeuristicFactChecker;
        let report = checker.analyze(SAMPLE, "t").await.unwrap();
        assert!(report.citation_rate > 0.0);
        assert!(report.claims_checked >= 2);
        assert!(report.score >= 50.0);
    }

    #[tokio::test]
    async fn ai_detector_scores_monotone_text_higher() {
        let detector = HeuristicAiDetector;
        let monotone = "The tool works well here. The tool works well there. \
            The tool works well today. The tool works well tomorrow.";
        let varied = "Yes. The benchmark took an unexpectedly long time to converge on a \
            stable figure across the three machines we tried. Then it crashed.";
        let m = detector.analyze(monotone).await.unwrap();
        let v = detector.analyze(varied).await.unwrap();
        assert!(m.score > v.score);
    }

    #[tokio::test]
    async fn perspective_analyzer_counts_contrast_markers() {
        let analyzer = HeuristicPerspectiveAnalyzer::default();
        let report = analyzer.analyze(SAMPLE, "t").await.unwrap();
        assert!(report.perspectives_found >= 3);

        let one_sided = "The product is fine. It ships on time.";
        let report = analyzer.analyze(one_sided, "t").await.unwrap();
        assert_eq!(report.perspectives_found, 1);
    }
}
