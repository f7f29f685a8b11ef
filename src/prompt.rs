//! Prompt degradation ladder.
//!
//! Three total, deterministic rewrites applied in order by the recovery
//! controller: simplification, semantic substitution, decomposition.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const COMPLEXITY_MODIFIERS: &[&str] = &[
    "intricate",
    "complex",
    "detailed",
    "advanced",
    "state-of-the-art",
    "sleek",
    "modern",
    "futuristic",
    "cutting-edge",
    "sophisticated",
    "ephemeral",
    "subtle",
    "gracefully",
    "seamlessly",
    "effortlessly",
];

// (concept, proxy, plural proxy). Order matters: multi-word phrases
// before the words they contain.
const SEMANTIC_PROXIES: &[(&str, &str, &str)] = &[
    ("holographic", "glowing digital", "glowing digital"),
    ("AR glasses", "smart glasses", "smart glasses"),
    ("neural network", "abstract pattern", "abstract patterns"),
    ("biometric", "digital data", "digital data"),
    ("surveillance", "monitoring", "monitoring"),
    ("weapon", "tool", "tools"),
    ("blood", "red liquid", "red liquid"),
    ("death", "ending", "endings"),
    ("explosion", "burst of light", "bursts of light"),
];

const GENERIC_SUBJECTS: &[&str] = &[
    "person",
    "people",
    "individual",
    "user",
    "hand",
    "hands",
    "screen",
    "display",
    "interface",
    "room",
    "space",
    "city",
];

const ATMOSPHERIC_FALLBACK: &str = "A dark, atmospheric cinematic scene";

static MODIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = COMPLEXITY_MODIFIERS
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b,?", alternation)).unwrap()
});

static PROXY_RES: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    SEMANTIC_PROXIES
        .iter()
        .map(|(concept, proxy, plural)| {
            let pattern = format!(r"(?i)\b{}(es|s)?\b", regex::escape(concept));
            (Regex::new(&pattern).unwrap(), *proxy, *plural)
        })
        .collect()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());
static REPEATED_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(?:\s*,)+").unwrap());

fn tidy(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text, " ");
    let attached = SPACE_BEFORE_PUNCT_RE.replace_all(&collapsed, "$1");
    let deduped = REPEATED_COMMA_RE.replace_all(&attached, ",");
    deduped
        .trim()
        .trim_start_matches([',', ' '])
        .trim_end_matches([',', ' '])
        .to_string()
}

/// Strip complexity/style modifiers and collapse the leftover whitespace.
///
/// Falls back to the trimmed input when nothing but modifiers was present.
pub fn simplify(prompt: &str) -> String {
    let stripped = MODIFIER_RE.replace_all(prompt, "");
    let out = tidy(&stripped);
    if out.is_empty() {
        return prompt.trim().to_string();
    }
    out
}

/// Replace concepts likely to trip content filters with neutral paraphrases.
pub fn semantic_proxy(prompt: &str) -> String {
    let mut out = prompt.to_string();
    for (re, proxy, plural) in PROXY_RES.iter() {
        out = re
            .replace_all(&out, |caps: &Captures| {
                if caps.get(1).is_some() { *plural } else { *proxy }
            })
            .into_owned();
    }
    out
}

/// Reduce a prompt to a minimal template around its first generic subject.
pub fn decompose(prompt: &str) -> String {
    let subject = prompt.split_whitespace().find_map(|word| {
        let bare: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        GENERIC_SUBJECTS.iter().find(|s| **s == bare).copied()
    });

    match subject {
        Some(subject) => format!("A {} in a dark, cinematic setting", subject),
        None => ATMOSPHERIC_FALLBACK.to_string(),
    }
}
