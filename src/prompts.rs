//! Prompt rendering for the reasoning loop and article synthesis.
//!
//! All builders are pure: they take every piece of state they need as an
//! explicit argument, perform no I/O, and cannot fail on well-formed input.
//! Prompt length grows linearly with transcript size; any truncation policy
//! belongs to the caller.

use crate::engine::Turn;

/// Render the first prompt of a session from the bare query.
///
/// Asks the model to break the problem into `width` alternative next steps
/// without committing to an answer yet.
pub fn build_initial_prompt(query: &str, width: u32) -> String {
    format!(
        "PROBLEM: {query}\n\n\
         THINK LOUDLY!\n\
         1. Break the problem into {width} step alternatives to address it\n\
         2. Choose one alternative\n\
         3. DO NOT USE CONJECTURES. Only use well known theorems, lemmas and mathematical concepts.\n\n\
         Do not write an answer yet, only propose the alternatives.\n\
         Display math in KATEX form\n"
    )
}

/// Render a continuation prompt embedding the full transcript and the query.
///
/// The output contains every turn's text in transcript order, followed by an
/// instruction to extend the chosen alternative and to emit `sentinel` once
/// a solution is reached.
pub fn build_continuation_prompt(
    transcript: &[Turn],
    query: &str,
    width: u32,
    sentinel: &str,
) -> String {
    let mut prompt = format!("PROBLEM: {query}\n\nREASONING SO FAR:\n\n");
    for turn in transcript {
        prompt.push_str(&format!("[{}]\n{}\n\n", turn.role, turn.text));
    }
    prompt.push_str(&format!(
        "Now, extensively create a rigorous approximation using the chosen alternative,\n\
         proposing {width} new ones from the result of the approach.\n\n\
         Remember: don't use any conjecture, only theorems, lemmas and other mathematical concepts well known.\n\
         If any solution is encountered, state \"{sentinel}\" in your reply, else only report progress.\n\
         Display math in KATEX form\n"
    ));
    prompt
}

/// Render the first article synthesis prompt from a finished transcript.
pub fn build_article_prompt(transcript: &[Turn], target_tokens: u32) -> String {
    let mut prompt = format!(
        "From the given text, generate an article section with subsections to explain and formalize the reasoning process in detail.\n\
         The article should be approximately {target_tokens} tokens long.\n\
         Use KATEX to display any math expressions.\n\n\
         For the first section, proceed as follows:\n\
         \u{20}  1. Introduction: Briefly introduce the problem and its significance.\n\
         \u{20}  2. Background: Provide necessary background information and definitions.\n\n\
         For subsequent sections, follow this structure:\n\
         \u{20}  3. Methodology: Describe the reasoning steps taken to approach the problem.\n\
         \u{20}  4. Results: Present the findings and any solutions derived from the reasoning process.\n\
         \u{20}  5. Conclusion: Summarize the key points and implications of the results.\n\n\
         CONTENT TO FORMALIZE:\n"
    );
    push_transcript(&mut prompt, transcript);
    prompt
}

/// Render a follow-up synthesis prompt that continues a partial draft.
pub fn build_article_continuation_prompt(
    transcript: &[Turn],
    draft_so_far: &str,
    target_tokens: u32,
) -> String {
    let mut prompt = format!(
        "Continue generating the article current section with subsections to explain and formalize the reasoning process in detail.\n\
         Also write the next sections of the article.\n\
         The article should be approximately {target_tokens} tokens long.\n\
         Use KATEX to display any math expressions.\n\n\
         PREVIOUSLY GENERATED ARTICLE CONTENT:\n{draft_so_far}\n\n\
         CONTENT TO FORMALIZE:\n"
    );
    push_transcript(&mut prompt, transcript);
    prompt
}

fn push_transcript(prompt: &mut String, transcript: &[Turn]) {
    for turn in transcript {
        prompt.push_str(&turn.text);
        prompt.push_str("\n\n");
    }
}
