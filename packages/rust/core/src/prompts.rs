//! Prompt builders for the LLM-backed stages.
//!
//! Each builder returns `(system, user)` prompt strings. Stages that accept
//! a refinement instruction append it to the user prompt when one is set on
//! the context.

use draftpilot_shared::ArticleTemplate;

use crate::context::PipelineContext;

fn template_guidance(template: ArticleTemplate) -> &'static str {
    match template {
        ArticleTemplate::HowTo => "a step-by-step how-to guide with numbered instructions",
        ArticleTemplate::Listicle => "a listicle with clearly numbered entries",
        ArticleTemplate::Comparison => "a balanced comparison weighing alternatives",
        ArticleTemplate::News => "a news-style report, most important facts first",
        ArticleTemplate::Evergreen => "an evergreen reference article",
    }
}

pub fn keyword_analysis(ctx: &PipelineContext) -> (String, String) {
    (
        "You are an SEO keyword analyst. Respond with JSON only, no prose: \
         {\"focus_keyword\": string, \"related_keywords\": [string], \"search_intent\": string}."
            .into(),
        format!(
            "Analyze the topic keyword \"{}\". Identify the best focus keyword, \
             up to 8 related keywords, and the dominant search intent.",
            ctx.keyword()
        ),
    )
}

pub fn research(ctx: &PipelineContext) -> (String, String) {
    (
        "You are a research assistant. Respond with JSON only: \
         {\"findings\": [string], \"sources\": [string]}."
            .into(),
        format!(
            "Collect the key facts, statistics, and talking points for an article \
             about \"{}\". List each finding as one sentence and name its source.",
            ctx.focus_keyword()
        ),
    )
}

pub fn outline(ctx: &PipelineContext) -> (String, String) {
    let findings = match ctx.get(draftpilot_shared::StageId::Research) {
        Some(crate::stage::StageOutput::Research { findings, .. }) => findings.join("\n- "),
        _ => String::new(),
    };
    (
        "You are a content strategist. Respond with JSON only: \
         {\"title\": string, \"sections\": [string]}."
            .into(),
        format!(
            "Draft a title and section outline for {} about \"{}\" (target {} words).\n\
             Research findings:\n- {findings}",
            template_guidance(ctx.template()),
            ctx.focus_keyword(),
            ctx.target_words(),
        ),
    )
}

pub fn content_generation(ctx: &PipelineContext) -> (String, String) {
    let sections = match ctx.get(draftpilot_shared::StageId::Outline) {
        Some(crate::stage::StageOutput::Outline { sections, .. }) => sections.join("\n- "),
        _ => String::new(),
    };
    let mut user = format!(
        "Write {} titled \"{}\" about \"{}\", target length {} words.\n\
         Follow this outline:\n- {sections}\n\
         Use markdown headings. Return the article body only.",
        template_guidance(ctx.template()),
        ctx.title(),
        ctx.focus_keyword(),
        ctx.target_words(),
    );
    append_refinement(ctx, &mut user);
    (
        "You are a professional long-form writer. Return the article text only, \
         no preamble and no JSON."
            .into(),
        user,
    )
}

pub fn humanization(ctx: &PipelineContext) -> (String, String) {
    let mut user = format!(
        "Rewrite the following article so it reads naturally human: vary sentence \
         length, remove formulaic transitions, keep all facts and headings intact. \
         Return the rewritten article only.\n\n{}",
        ctx.content()
    );
    append_refinement(ctx, &mut user);
    (
        "You are an experienced human editor. Return the edited article text only.".into(),
        user,
    )
}

pub fn bias_cross_validation(content: &str) -> (String, String) {
    (
        "You are a neutrality reviewer. Respond with a single number from 0 to 100, \
         where 0 is perfectly neutral and 100 is extremely biased."
            .into(),
        format!("Rate the bias of this article:\n\n{content}"),
    )
}

pub fn meta_generation(ctx: &PipelineContext) -> (String, String) {
    (
        "You are an SEO specialist. Respond with JSON only: \
         {\"meta_title\": string, \"meta_description\": string, \"slug\": string}. \
         Keep the meta title under 60 characters and the description between \
         120 and 160 characters."
            .into(),
        format!(
            "Write SEO metadata for an article titled \"{}\" with focus keyword \
             \"{}\". Opening of the article:\n\n{}",
            ctx.title(),
            ctx.focus_keyword(),
            ctx.meta_description(),
        ),
    )
}

/// Rewrite prompt for the plagiarism remediation loop, seeded with the
/// flagged excerpts and their source attributions.
pub fn plagiarism_rewrite(
    content: &str,
    matches: &[draftpilot_quality::PlagiarismMatch],
    full_article: bool,
) -> (String, String) {
    let mut flagged = String::new();
    for m in matches {
        flagged.push_str(&format!("- \"{}\" (matches: {})\n", m.excerpt, m.source));
    }
    let scope = if full_article {
        "Rewrite the entire article in original wording"
    } else {
        "Rewrite only the flagged passages, leaving the rest of the article unchanged"
    };
    (
        "You are an editor removing plagiarized phrasing. Preserve meaning, facts, \
         and structure. Return the full article text only."
            .into(),
        format!("{scope}. Flagged passages:\n{flagged}\nArticle:\n\n{content}"),
    )
}

fn append_refinement(ctx: &PipelineContext, user: &mut String) {
    if let Some(instruction) = ctx.refinement_instruction() {
        user.push_str("\n\nRefinement instruction:\n");
        user.push_str(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftpilot_shared::Article;

    #[test]
    fn refinement_instruction_is_appended_to_rewrite_prompts() {
        let article = Article::queued("solar balconies", ArticleTemplate::HowTo, 900);
        let mut ctx = PipelineContext::for_article(&article);
        let (_, without) = content_generation(&ctx);
        assert!(!without.contains("Refinement instruction"));

        ctx.set_refinement_instruction("increase keyword density to 1.5%".into());
        let (_, with) = content_generation(&ctx);
        assert!(with.contains("increase keyword density to 1.5%"));
        let (_, human) = humanization(&ctx);
        assert!(human.contains("Refinement instruction"));
    }

    #[test]
    fn plagiarism_rewrite_seeds_matches() {
        let matches = vec![draftpilot_quality::PlagiarismMatch {
            excerpt: "the quick brown fox".into(),
            source: "self-similarity".into(),
        }];
        let (_, user) = plagiarism_rewrite("body", &matches, false);
        assert!(user.contains("the quick brown fox"));
        assert!(user.contains("flagged passages"));

        let (_, full) = plagiarism_rewrite("body", &matches, true);
        assert!(full.contains("entire article"));
    }
}
