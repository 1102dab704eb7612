//! Built-in stage prompts.
//!
//! Every stage prompt is a system block appended to the caller's persona text,
//! plus a user block with the stage's inputs filled in.

use super::Prompt;

const JUDGE_SYSTEM: &str = "Decide ACCEPT or REJECT for memory storage. Respond in strict JSON.\n\
Fields: label('ACCEPT'|'REJECT'), reason(str, <=30 words), risk(float 0..1), \
importance(float 0..1), uncertainty(float 0..1).";

const EVALUATE_SYSTEM: &str = "You evaluate a proposed action for the current context. \
Respond with strict JSON only containing label('ACCEPT'|'REJECT'), reason(<=30 words), \
utility(0..1), and risk(0..1). Be concise and realistic.";

const PLANNER_SYSTEM: &str =
    "Plan concisely. Output numbered steps. Ask for missing facts at the end as questions.";

const CRITIC_SYSTEM: &str =
    "Critique tersely. Identify 2 risks and 2 improvements. Keep under 120 words.";

const EXPLAINER_SYSTEM: &str = "Explain decisions clearly. Avoid fluff.";

pub const PERMISSIVE_INSTRUCTION: &str = "You are the Permissive Reviewer. Argue for the utility, \
accuracy, and relevance of the candidate memory. Be concrete about how it can improve future \
performance or decisions.";

pub const CRITICAL_INSTRUCTION: &str = "You are the Critical Reviewer. Identify flaws, \
inaccuracies, privacy risks, duplication, or irrelevance in the candidate memory. Be rigorous \
and skeptical.";

fn system(persona: &str, stage: &str) -> String {
    format!("{persona}\n{stage}").trim().to_string()
}

/// Memory admission: should `candidate` be stored?
pub fn judge(persona: &str, candidate: &str) -> Prompt {
    Prompt {
        system: system(persona, JUDGE_SYSTEM),
        user: format!(
            "Candidate artifact:\n{candidate}\n\nReply JSON only, no prose, e.g. \
             {{\"label\":\"ACCEPT\",\"reason\":\"...\",\"risk\":0.2,\"importance\":0.6,\"uncertainty\":0.3}}"
        ),
    }
}

/// Action evaluation: is `action` worth taking in `context`?
pub fn evaluate(persona: &str, context: &str, action: &str) -> Prompt {
    Prompt {
        system: system(persona, EVALUATE_SYSTEM),
        user: format!("Context:\n{context}\n\nAction:\n{action}\n\nReturn only one JSON object."),
    }
}

pub fn planner(persona: &str, input: &str, recall: &str) -> Prompt {
    Prompt {
        system: system(persona, PLANNER_SYSTEM),
        user: format!("Input:\n{input}\n\nRelevant recall:\n{recall}\n\nProduce a 3-7 step plan."),
    }
}

pub fn critic(persona: &str, plan: &str) -> Prompt {
    Prompt {
        system: system(persona, CRITIC_SYSTEM),
        user: format!(
            "Plan:\n{plan}\n\nList risks and improvements. End with a one-line revision suggestion."
        ),
    }
}

pub fn explainer(system_text: &str, input: &str, plan: &str, critique: &str, action: &str) -> Prompt {
    Prompt {
        system: system(system_text, EXPLAINER_SYSTEM),
        user: format!(
            "Input:\n{input}\n\nPlan:\n{plan}\n\nCritique:\n{critique}\n\nChosen action:\n{action}\n\n\
             Summarize: input, plan, critique, and chosen action."
        ),
    }
}

/// One reviewer turn in a multi-round memory debate. `opponent` is the other
/// role's previous response; round one has none.
pub fn reviewer(instruction: &str, candidate: &str, opponent: Option<&str>) -> Prompt {
    let user = match opponent {
        None => format!("{instruction}\n\nCandidate Memory:\n{candidate}"),
        Some(arg) => format!(
            "{instruction}\n\nOpponent argument to address:\n{arg}\n\nCandidate Memory:\n{candidate}"
        ),
    };
    Prompt {
        system: String::new(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_text_prefixes_stage_system() {
        let p = evaluate("You are Analytical.", "ctx", "do: x");
        assert!(p.system.starts_with("You are Analytical.\nYou evaluate"));
        assert!(p.user.contains("Action:\ndo: x"));
    }

    #[test]
    fn empty_persona_is_trimmed() {
        assert!(judge("", "c").system.starts_with("Decide ACCEPT"));
    }

    #[test]
    fn reviewer_includes_opponent_only_after_round_one() {
        assert!(!reviewer(CRITICAL_INSTRUCTION, "m", None).user.contains("Opponent"));
        let p = reviewer(CRITICAL_INSTRUCTION, "m", Some("it is novel"));
        assert!(p.user.contains("Opponent argument to address:\nit is novel"));
    }
}
