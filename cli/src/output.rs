//! Terminal and JSON rendering of query outcomes, routing decisions and the
//! tool catalogue.

use ragroute_agent::ToolDescriptor;
use ragroute_core::{DegradationLevel, RerankStatus, RetrievalOutcome, RoutingDecision};
use serde::Serialize;
use std::fmt::Write;

const SNIPPET_MAX_LEN: usize = 200;

#[derive(Serialize)]
struct JsonOutcome<'a> {
    query: &'a str,
    #[serde(flatten)]
    outcome: &'a RetrievalOutcome,
    sources: Vec<String>,
}

pub fn format_outcome_json(query: &str, outcome: &RetrievalOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonOutcome {
        query,
        outcome,
        sources: outcome.sources(),
    })
}

pub fn format_outcome_human(query: &str, outcome: &RetrievalOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Routed {:?} via {} [{}]",
        outcome.routing.rule,
        mode_name(outcome),
        strategy_names(&outcome.routing)
    );
    for transition in &outcome.transitions {
        let _ = writeln!(
            out,
            "Degraded {} -> {}: {}",
            transition.from, transition.to, transition.cause
        );
    }
    if let Some(trace) = &outcome.trace {
        let state = trace
            .outcome()
            .map(|state| format!("{state:?}"))
            .unwrap_or_else(|| "unfinished".to_string());
        let _ = writeln!(
            out,
            "Agent: {state} after {} step(s), {} LLM call(s)",
            trace.entries().len(),
            outcome.stats.llm_calls
        );
    }
    if let RerankStatus::Skipped { reason } = &outcome.stats.rerank {
        let _ = writeln!(out, "Rerank skipped: {reason}");
    }
    out.push('\n');

    if outcome.results.is_empty() {
        if outcome.degraded_to == DegradationLevel::PureGeneration {
            let _ = write!(
                out,
                "No retrieval context for \"{query}\"; answer from the model alone."
            );
        } else {
            let _ = write!(out, "No results found for \"{query}\"");
        }
        return out;
    }

    let count = outcome.results.len();
    let _ = writeln!(
        out,
        "Found {count} result{} for \"{query}\" in {}ms:\n",
        if count == 1 { "" } else { "s" },
        outcome.stats.timings.total_ms
    );
    for (i, result) in outcome.results.iter().enumerate() {
        let node = &result.node;
        let label = node
            .path()
            .map(str::to_string)
            .or_else(|| node.id.clone())
            .unwrap_or_else(|| node.dedup_key());
        let _ = write!(out, "{}. {label} (score: {:.4}", i + 1, result.fused_score);
        if let Some(rerank) = result.rerank_score {
            let _ = write!(out, ", rerank: {rerank:.3}");
        }
        out.push_str(")\n");

        let strategies: Vec<&str> = result
            .contributing_strategies
            .iter()
            .map(|s| s.as_str())
            .collect();
        let _ = writeln!(out, "   [{}]", strategies.join(", "));
        let _ = writeln!(out, "   {}", truncate_text(&node.text, SNIPPET_MAX_LEN));
        out.push('\n');
    }

    out.trim_end().to_string()
}

pub fn format_route_human(decision: &RoutingDecision) -> String {
    let signals = &decision.signals;
    let mut out = String::new();
    let _ = writeln!(out, "mode:        {:?}", decision.mode);
    let _ = writeln!(out, "rule:        {:?}", decision.rule);
    let _ = writeln!(out, "strategies:  {}", strategy_names(decision));
    let _ = writeln!(out, "complexity:  {:.2}", signals.complexity);
    let _ = write!(
        out,
        "signals:     {} file mention(s), {} quoted path(s), {} broad keyword(s), \
         {} word(s), {} conjunction(s), {} question mark(s)",
        signals.file_mentions,
        signals.quoted_paths,
        signals.broad_keywords,
        signals.words,
        signals.conjunctions,
        signals.question_marks
    );
    out
}

pub fn format_tools_human(tools: &[ToolDescriptor]) -> String {
    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    tools
        .iter()
        .map(|tool| format!("{:<width$}  {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn mode_name(outcome: &RetrievalOutcome) -> String {
    format!("{:?}", outcome.routing.mode).to_lowercase()
}

fn strategy_names(decision: &RoutingDecision) -> String {
    decision
        .strategies
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cut at a word boundary near `max_len` characters.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_len) else {
        return text.to_string();
    };
    let truncated = &text[..cut];
    match truncated.rfind(' ') {
        Some(space) => format!("{}...", &truncated[..space]),
        None => format!("{truncated}..."),
    }
}
