//! Heuristic score adjustments.
//!
//! An ordered list of independent (predicate, delta) rules, applied as
//! additive offsets to the active score basis before final ranking. They are
//! soft nudges, not filters: a penalized passage can still rank first, a
//! boosted one can still lose.

use regex::Regex;
use std::sync::OnceLock;

/// Everything a rule predicate may look at.
pub struct RuleContext<'a> {
    /// The user's plain query.
    pub query: &'a str,
    /// The passage text being scored.
    pub text: &'a str,
    /// Position of the passage in the document, 0-based.
    pub position: usize,
    /// Total passages in the document.
    pub total: usize,
}

/// A single (predicate, delta) adjustment.
pub struct ScoreRule {
    pub name: &'static str,
    pub delta: f32,
    pub applies: fn(&RuleContext) -> bool,
}

pub const BOILERPLATE_PENALTY: f32 = -0.05;
pub const FRONT_MATTER_BOOST: f32 = 0.1;
pub const ABSTRACT_BOOST: f32 = 0.1;

/// Passages within this many positions of the document start count as
/// front matter.
const FRONT_MATTER_WINDOW: usize = 5;

const BOILERPLATE_MARKERS: &[&str] = &[
    "all rights reserved",
    "copyright",
    "creative commons",
    "this page intentionally left blank",
    "terms of use",
    "privacy policy",
    "issn",
    "isbn",
];

const ABSTRACT_MARKERS: &[&str] = &["abstract", "summary", "overview"];

fn front_matter_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(title|author|authors|who wrote|written by|byline)\b").unwrap()
    })
}

fn about_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(abstract|summary|overview|what is this (document )?about|purpose|objective)\b")
            .unwrap()
    })
}

/// The default rule list, in application order.
pub fn default_rules() -> Vec<ScoreRule> {
    vec![
        ScoreRule {
            name: "boilerplate-penalty",
            delta: BOILERPLATE_PENALTY,
            applies: |ctx| {
                let text = ctx.text.to_lowercase();
                BOILERPLATE_MARKERS.iter().any(|m| text.contains(m))
            },
        },
        ScoreRule {
            name: "front-matter-boost",
            delta: FRONT_MATTER_BOOST,
            applies: |ctx| {
                ctx.position < FRONT_MATTER_WINDOW && front_matter_query_re().is_match(ctx.query)
            },
        },
        ScoreRule {
            name: "abstract-boost",
            delta: ABSTRACT_BOOST,
            applies: |ctx| {
                if !about_query_re().is_match(ctx.query) {
                    return false;
                }
                let text = ctx.text.to_lowercase();
                ABSTRACT_MARKERS.iter().any(|m| text.contains(m))
            },
        },
    ]
}

/// Sum the deltas of all rules whose predicate matches.
pub fn apply_rules(rules: &[ScoreRule], ctx: &RuleContext) -> f32 {
    rules
        .iter()
        .filter(|rule| (rule.applies)(ctx))
        .map(|rule| rule.delta)
        .sum()
}
