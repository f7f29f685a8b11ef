//! Prompt list sources: JSON prompt files, the built-in list and topic
//! templates.

use crate::error::{FactoryError, FactoryResult};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

pub const DEFAULT_PROMPTS: &[&str] = &[
    "A serene sunrise casting golden light over a modern city skyline",
    "A person in meditation, soft light filtering through a window",
    "Streams of luminous data flowing across transparent display screens",
    "Dynamic charts and graphs displaying financial growth on a tablet",
    "A professional focused at a modern workstation with multiple screens",
    "Currency notes dissolving into digital particles",
    "A locked vault door slowly opening to reveal golden light",
    "Chains breaking apart in dramatic slow motion",
    "A chess king piece dominating the board from above",
    "Dark storm clouds parting to reveal sunlight",
    "A person standing at a crossroads, dramatic lighting",
    "An eye opening wide, reflecting digital data streams",
];

const TOPIC_SCENES: &[&str] = &[
    "A person in shadows looking up at towering buildings, oppression",
    "Money flowing from many hands into one, wealth concentration",
    "A maze seen from above with a person trapped inside, system",
    "Scales of justice tipping dramatically, imbalance",
    "A clock with hands spinning rapidly, time pressure",
    "A door marked 'EXIT' with light streaming through, escape",
    "Charts and graphs showing dramatic downward trend, decline",
    "A mirror reflection showing a different reality, deception",
    "Chains around a wallet or piggy bank, financial trap",
    "A lighthouse beam cutting through dark fog, guidance",
    "A person breaking through a wall, breakthrough moment",
];

#[derive(Debug, Deserialize)]
struct Beat {
    visual: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromptDocument {
    List(Vec<String>),
    Prompts { prompts: Vec<String> },
    Beats { beats: Vec<Beat> },
}

impl PromptDocument {
    fn into_prompts(self) -> Vec<String> {
        match self {
            PromptDocument::List(list) => list,
            PromptDocument::Prompts { prompts } => prompts,
            PromptDocument::Beats { beats } => beats.into_iter().map(|b| b.visual).collect(),
        }
    }
}

pub fn default_prompts() -> Vec<String> {
    DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect()
}

/// Title card for `topic` followed by the fixed scene templates.
pub fn topic_prompts(topic: &str) -> Vec<String> {
    let mut prompts = Vec::with_capacity(TOPIC_SCENES.len() + 1);
    prompts.push(format!(
        "A dramatic title card with the words related to {}, dark cinematic",
        topic.trim()
    ));
    prompts.extend(TOPIC_SCENES.iter().map(|s| s.to_string()));
    prompts
}

pub fn parse_prompts(text: &str) -> FactoryResult<Vec<String>> {
    let doc: PromptDocument = serde_json::from_str(text).map_err(|e| {
        FactoryError::PromptFile(format!(
            "expected a list of prompts, {{\"prompts\": [...]}} \
             or {{\"beats\": [{{\"visual\": ...}}]}}: {}",
            e
        ))
    })?;
    Ok(doc.into_prompts())
}

pub async fn load_prompts(path: &Path) -> FactoryResult<Vec<String>> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| FactoryError::PromptFile(format!("{}: {}", path.display(), e)))?;
    parse_prompts(&text).map_err(|e| match e {
        FactoryError::PromptFile(msg) => {
            FactoryError::PromptFile(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_three_layouts() {
        assert_eq!(parse_prompts(r#"["a", "b"]"#).unwrap(), vec!["a", "b"]);
        assert_eq!(parse_prompts(r#"{"prompts": ["c"]}"#).unwrap(), vec!["c"]);
        let beats = r#"{"beats": [{"visual": "d", "narration": "x"}, {"visual": "e"}]}"#;
        assert_eq!(parse_prompts(beats).unwrap(), vec!["d", "e"]);
    }

    #[test]
    fn rejects_unknown_layout() {
        assert!(matches!(
            parse_prompts(r#"{"scenes": ["a"]}"#),
            Err(FactoryError::PromptFile(_))
        ));
        assert!(matches!(parse_prompts("42"), Err(FactoryError::PromptFile(_))));
    }

    #[test]
    fn topic_list_leads_with_title_card() {
        let prompts = topic_prompts("  Why the Rich Use Debt ");
        assert_eq!(prompts.len(), 12);
        assert!(prompts[0].contains("related to Why the Rich Use Debt,"));
        assert_eq!(default_prompts().len(), 12);
    }

    #[tokio::test]
    async fn missing_file_is_prompt_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_prompts(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, FactoryError::PromptFile(_)));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        tokio::fs::write(&path, r#"{"prompts": ["one", "two"]}"#).await.unwrap();
        assert_eq!(load_prompts(&path).await.unwrap(), vec!["one", "two"]);
    }
}
