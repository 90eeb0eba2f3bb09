//! Critic response parsing.

use super::stage::Verdict;
use super::state::ApprovalStatus;
use serde_json::Value;
use tracing::{debug, warn};

/// Drafts longer than this are approved when the critic reply is unusable.
const HEURISTIC_APPROVAL_CHARS: usize = 1000;

/// Parses a critic reply into a verdict.
///
/// Looks for a JSON object (inside a ```` ```json ```` fence, a plain fence, or
/// the outermost braces) with an `overall_assessment` field. Without a usable
/// assessment the verdict falls back to a length heuristic on `draft`.
#[must_use]
pub fn parse_verdict(response: &str, draft: &str) -> Verdict {
    let parsed = candidates(response)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .and_then(|value| verdict_from_json(&value));

    if let Some(verdict) = parsed {
        debug!(status = %verdict.status, "Parsed critic verdict");
        return verdict;
    }

    warn!(
        response_len = response.len(),
        "Critic reply had no usable assessment, using length heuristic"
    );
    heuristic_verdict(draft)
}

/// Verdict used when the critic reply cannot be interpreted.
#[must_use]
pub fn heuristic_verdict(draft: &str) -> Verdict {
    if draft.chars().count() > HEURISTIC_APPROVAL_CHARS {
        Verdict {
            status: ApprovalStatus::Approved,
            feedback: "Report meets basic quality standards and provides comprehensive \
                       coverage of the topic."
                .to_string(),
        }
    } else {
        Verdict {
            status: ApprovalStatus::RevisionNeeded,
            feedback: "Report needs additional development and refinement to meet quality \
                       standards."
                .to_string(),
        }
    }
}

fn candidates(response: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let fenced = fenced_block(response, "```json").or_else(|| fenced_block(response, "```"));
    if let Some(fenced) = fenced {
        found.push(fenced);
    }
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            found.push(&response[start..=end]);
        }
    }
    found
}

fn fenced_block<'a>(response: &'a str, opener: &str) -> Option<&'a str> {
    let start = response.find(opener)? + opener.len();
    let len = response[start..].find("```")?;
    Some(response[start..start + len].trim())
}

fn verdict_from_json(value: &Value) -> Option<Verdict> {
    let status = value
        .get("overall_assessment")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ApprovalStatus>().ok())
        .filter(|status| *status != ApprovalStatus::Pending)?;

    let feedback = value
        .get("specific_feedback")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value.get("recommendations").and_then(Value::as_array).map(|items| {
                items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("\n")
            })
        })
        .unwrap_or_default();

    Some(Verdict { status, feedback })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let verdict = parse_verdict(
            r#"{"overall_assessment": "approved", "specific_feedback": "Well done"}"#,
            "",
        );
        assert_eq!(verdict.status, ApprovalStatus::Approved);
        assert_eq!(verdict.feedback, "Well done");
    }

    #[test]
    fn test_json_fence_with_surrounding_text() {
        let response = "Here is my assessment:\n```json\n\
                        {\"overall_assessment\": \"REVISION_NEEDED\", \
                        \"specific_feedback\": \"Tighten the intro\"}\n```\nThanks.";
        let verdict = parse_verdict(response, "");
        assert_eq!(verdict.status, ApprovalStatus::RevisionNeeded);
        assert_eq!(verdict.feedback, "Tighten the intro");
    }

    #[test]
    fn test_plain_fence() {
        let response = "```\n{\"overall_assessment\": \"research_insufficient\"}\n```";
        let verdict = parse_verdict(response, "");
        assert_eq!(verdict.status, ApprovalStatus::ResearchInsufficient);
        assert_eq!(verdict.feedback, "");
    }

    #[test]
    fn test_braces_inside_prose() {
        let response = "Verdict follows {\"overall_assessment\": \"approved\", \
                        \"recommendations\": [\"a\", \"b\"]} end";
        let verdict = parse_verdict(response, "");
        assert_eq!(verdict.status, ApprovalStatus::Approved);
        assert_eq!(verdict.feedback, "a\nb");
    }

    #[test]
    fn test_unparseable_reply_uses_length_heuristic() {
        let short = parse_verdict("looks approved to me", "tiny draft");
        assert_eq!(short.status, ApprovalStatus::RevisionNeeded);

        let long_draft = "word ".repeat(300);
        let long = parse_verdict("no json here", &long_draft);
        assert_eq!(long.status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_unknown_assessment_uses_heuristic() {
        let verdict = parse_verdict(r#"{"overall_assessment": "meh"}"#, "short");
        assert_eq!(verdict.status, ApprovalStatus::RevisionNeeded);

        let verdict = parse_verdict(r#"{"overall_assessment": "pending"}"#, "short");
        assert_eq!(verdict.status, ApprovalStatus::RevisionNeeded);
    }
}
