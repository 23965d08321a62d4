use regex::Regex;

/// Marker the UI prepends to a message when the user approves a proposed plan.
/// The token between the colon and the closing bracket is the plan id; its
/// content is opaque here, only the shape matters.
pub const PLAN_APPROVED_PREFIX: &str = "[PLAN_APPROVED:";

const DRAFT_KEYWORDS: &[&str] = &["draft", "reply", "respond", "write", "email", "send"];
const SCHEDULING_KEYWORDS: &[&str] = &["schedule", "meeting", "call", "book", "invite"];
const SEARCH_KEYWORDS: &[&str] = &["find", "search", "look", "show", "get", "fetch", "check"];

/// What a free-text message is asking for, derived purely from keyword and
/// marker matching. Classification never fails; an unmatched message just
/// comes back with every flag false.
#[derive(Debug, Clone, Default)]
pub struct Intent {
    pub wants_draft: bool,
    pub wants_scheduling: bool,
    pub actionable: bool,
    pub plan_approved: bool,
    pub plan_goal: Option<String>,
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

pub fn wants_draft(text: &str) -> bool {
    contains_any(&text.to_lowercase(), DRAFT_KEYWORDS)
}

pub fn wants_scheduling(text: &str) -> bool {
    contains_any(&text.to_lowercase(), SCHEDULING_KEYWORDS)
}

pub fn wants_search(text: &str) -> bool {
    contains_any(&text.to_lowercase(), SEARCH_KEYWORDS)
}

/// Classify one inbound message. Pure function, no side effects.
pub fn classify(message: &str) -> Intent {
    let lower = message.to_lowercase();
    let draft = contains_any(&lower, DRAFT_KEYWORDS);
    let scheduling = contains_any(&lower, SCHEDULING_KEYWORDS);
    let search = contains_any(&lower, SEARCH_KEYWORDS);

    let marker_re = Regex::new(r"^\[PLAN_APPROVED:[^\]]+\]").unwrap();
    let plan_approved = message.starts_with(PLAN_APPROVED_PREFIX) && marker_re.is_match(message);

    let plan_goal = if plan_approved {
        let goal_re = Regex::new(r"Execute the approved plan:\s*(.+)").unwrap();
        Some(
            goal_re
                .captures(message)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| "the approved plan".to_string()),
        )
    } else {
        None
    };

    Intent {
        wants_draft: draft,
        wants_scheduling: scheduling,
        actionable: draft || scheduling || search,
        plan_approved,
        plan_goal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_keywords_set_draft_flag() {
        let intent = classify("Please draft a reply to John");
        assert!(intent.wants_draft);
        assert!(intent.actionable);
        assert!(!intent.plan_approved);
    }

    #[test]
    fn scheduling_keywords_set_scheduling_flag() {
        let intent = classify("Can you BOOK a meeting with Jane?");
        assert!(intent.wants_scheduling);
        assert!(intent.actionable);
    }

    #[test]
    fn search_only_message_is_actionable_without_draft_or_scheduling() {
        let intent = classify("find messages from the investor");
        assert!(intent.actionable);
        assert!(!intent.wants_draft);
        assert!(!intent.wants_scheduling);
    }

    #[test]
    fn plain_chitchat_matches_nothing() {
        let intent = classify("how are you today?");
        assert!(!intent.actionable);
        assert!(!intent.wants_draft);
        assert!(!intent.wants_scheduling);
        assert!(!intent.plan_approved);
        assert!(intent.plan_goal.is_none());
    }

    #[test]
    fn plan_marker_with_goal_phrase_extracts_goal() {
        let intent = classify(
            "[PLAN_APPROVED:abc123] Execute the approved plan: draft a reply to Jane about the proposal",
        );
        assert!(intent.plan_approved);
        assert_eq!(
            intent.plan_goal.as_deref(),
            Some("draft a reply to Jane about the proposal")
        );
    }

    #[test]
    fn plan_marker_without_goal_phrase_falls_back_to_placeholder() {
        let intent = classify("[PLAN_APPROVED:xyz] go");
        assert!(intent.plan_approved);
        assert_eq!(intent.plan_goal.as_deref(), Some("the approved plan"));
    }

    #[test]
    fn marker_must_be_a_prefix() {
        let intent = classify("please run [PLAN_APPROVED:xyz] now");
        assert!(!intent.plan_approved);
    }

    #[test]
    fn marker_token_may_not_contain_closing_bracket() {
        let intent = classify("[PLAN_APPROVED:] whatever");
        assert!(!intent.plan_approved);
    }
}
