//! Strict parser for plan text.
//!
//! Grammar, one step per non-blank line:
//!
//! ```text
//! <ordinal>. <agent> → <capability>
//! ```
//!
//! `->` is accepted in place of `→`. The whole text may instead be the
//! sentinel `NO_PLAN`. Anything else rejects the whole plan.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{OrchestratorError, Result};

use super::plan::{PlanStep, StructuredPlan, NO_PLAN_SENTINEL};

static STEP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.\s*([A-Za-z0-9_.\-]+)\s*(?:→|->)\s*([A-Za-z0-9_.\-]+)$")
        .expect("step line pattern is valid")
});

/// Parse plan text into a [`StructuredPlan`].
///
/// Agent and capability names are not resolved here; that happens at
/// execution time against a registry snapshot.
///
/// # Errors
///
/// `MalformedPlan` naming the first offending 1-based line.
pub fn parse_plan(text: &str) -> Result<StructuredPlan> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(OrchestratorError::malformed_plan(1, "plan text is empty"));
    }
    if trimmed == NO_PLAN_SENTINEL {
        log::debug!("Planner reported no feasible plan");
        return Ok(StructuredPlan::no_plan());
    }

    let mut steps = Vec::new();
    let mut previous = 0u32;
    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line == NO_PLAN_SENTINEL {
            return Err(OrchestratorError::malformed_plan(
                line_no,
                "no-plan sentinel mixed with plan steps",
            ));
        }

        let caps = STEP_LINE.captures(line).ok_or_else(|| {
            OrchestratorError::malformed_plan(
                line_no,
                format!("expected `<n>. <agent> → <capability>`, got `{}`", line),
            )
        })?;
        let ordinal: u32 = caps[1].parse().map_err(|_| {
            OrchestratorError::malformed_plan(line_no, format!("ordinal `{}` out of range", &caps[1]))
        })?;

        if previous == 0 && ordinal != 1 {
            return Err(OrchestratorError::malformed_plan(
                line_no,
                format!("plan must start at ordinal 1, got {}", ordinal),
            ));
        }
        if ordinal <= previous {
            return Err(OrchestratorError::malformed_plan(
                line_no,
                format!("ordinal {} does not follow {}", ordinal, previous),
            ));
        }
        previous = ordinal;
        steps.push(PlanStep::new(ordinal, &caps[2], &caps[3]));
    }

    log::debug!("Parsed plan with {} steps", steps.len());
    StructuredPlan::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_example_plan() {
        let plan = parse_plan(
            "1. fetch_articles → fetch_static_articles\n2. summarize_articles → structured_text_summarization",
        )
        .unwrap();
        assert_eq!(
            plan.steps(),
            &[
                PlanStep::new(1, "fetch_articles", "fetch_static_articles"),
                PlanStep::new(2, "summarize_articles", "structured_text_summarization"),
            ]
        );
    }

    #[test]
    fn test_ascii_arrow_and_spacing() {
        let plan = parse_plan("  1.fetch->get  \n\n 2.   sum   ->  summarize\n").unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[1].agent_name, "sum");
        assert_eq!(plan.steps()[1].capability_name, "summarize");
    }

    #[test]
    fn test_hyphenated_names_with_ascii_arrow() {
        let plan = parse_plan("1. agent-1->cap-2").unwrap();
        assert_eq!(plan.steps()[0], PlanStep::new(1, "agent-1", "cap-2"));
    }

    #[test]
    fn test_sentinel() {
        assert!(parse_plan("NO_PLAN").unwrap().is_no_plan());
        assert!(parse_plan("\n  NO_PLAN \n").unwrap().is_no_plan());
    }

    #[test]
    fn test_sentinel_mixed_with_steps() {
        let err = parse_plan("1. a → b\nNO_PLAN").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 2, .. }));
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_plan("Here is your plan:\n1. a → b").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 1, .. }));

        let err = parse_plan("1. a → b\n2. then summarize everything").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 2, .. }));
    }

    #[test]
    fn test_ordinals() {
        let err = parse_plan("2. a → b").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 1, .. }));

        let err = parse_plan("1. a → b\n1. c → d").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 2, .. }));

        let err = parse_plan("1. a → b\n\n3. c → d\n2. e → f").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 4, .. }));

        let err = parse_plan("99999999999. a → b").unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 1, .. }));
    }

    #[test]
    fn test_empty_text_is_malformed_not_no_plan() {
        assert!(matches!(
            parse_plan("   \n "),
            Err(OrchestratorError::MalformedPlan { .. })
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let plans = [
            StructuredPlan::no_plan(),
            StructuredPlan::sequential([("solo", "run")]),
            StructuredPlan::new(vec![
                PlanStep::new(1, "fetch_articles", "fetch_static_articles"),
                PlanStep::new(4, "agent.v2", "cap-x"),
                PlanStep::new(10, "summarize_articles", "structured_text_summarization"),
            ])
            .unwrap(),
        ];
        for plan in plans {
            assert_eq!(parse_plan(&plan.render()).unwrap(), plan);
        }
    }
}
