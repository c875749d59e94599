//! Oracles - External judgment behind request/response traits
//!
//! The store never decides what text means. Three collaborators do:
//!
//! - [`RetentionOracle`]: is this text worth remembering?
//! - [`PlacementOracle`]: which category should it go under?
//! - [`RelevanceOracle`]: which stored memories answer this query?
//!
//! [`ChatOracle`] implements all three over an OpenAI-compatible
//! chat-completions endpoint. Tests plug in scripted implementations.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{Result, TreeError};
use crate::core::node::ROOT_ID;
use crate::core::tree::{CategoryEntry, FlatMemory};

mod chat;

pub use chat::ChatOracle;

/// Where the placement oracle wants new content to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementDecision {
    /// Attach under an existing category
    Attach { target_id: String, summary: String },
    /// Create a new category under the root and attach there
    Create { category: String, summary: String },
}

impl PlacementDecision {
    /// Short text to store as the memory content
    pub fn summary(&self) -> &str {
        match self {
            Self::Attach { summary, .. } | Self::Create { summary, .. } => summary,
        }
    }
}

#[async_trait]
pub trait PlacementOracle: Send + Sync {
    async fn place(&self, content: &str, categories: &[CategoryEntry]) -> Result<PlacementDecision>;
}

#[async_trait]
pub trait RetentionOracle: Send + Sync {
    async fn should_remember(&self, text: &str) -> Result<bool>;
}

#[async_trait]
pub trait RelevanceOracle: Send + Sync {
    /// 1-based indices into `memories`, most relevant first
    async fn select_relevant(&self, query: &str, memories: &[FlatMemory]) -> Result<Vec<usize>>;
}

#[derive(Debug, Deserialize)]
struct RawPlacement {
    action: Option<String>,
    target_id: Option<String>,
    new_category: Option<String>,
    summary: Option<String>,
}

/// Parse `{"action", "target_id", "new_category", "summary"}`.
///
/// A missing `target_id` on attach means the root. Anything else that does
/// not fit is an error.
pub fn parse_placement(text: &str) -> Result<PlacementDecision> {
    let raw: RawPlacement =
        serde_json::from_str(extract_json(text)).map_err(|e| TreeError::oracle(format!("placement: {}", e)))?;

    let summary = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TreeError::oracle("placement: missing summary"))?;

    match raw.action.as_deref().map(str::trim) {
        Some("attach") => Ok(PlacementDecision::Attach {
            target_id: raw
                .target_id
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| ROOT_ID.to_string()),
            summary,
        }),
        Some("create") => {
            let category = raw
                .new_category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .ok_or_else(|| TreeError::oracle("placement: create without new_category"))?;
            Ok(PlacementDecision::Create { category, summary })
        }
        other => Err(TreeError::oracle(format!("placement: unknown action {:?}", other))),
    }
}

/// Parse `{"should_remember": bool}`; a missing field means no
pub fn parse_retention(text: &str) -> Result<bool> {
    let value: Value =
        serde_json::from_str(extract_json(text)).map_err(|e| TreeError::oracle(format!("retention: {}", e)))?;
    match value.get("should_remember") {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(TreeError::oracle(format!("retention: not a boolean: {}", other))),
    }
}

/// Parse `{"selected": [1, 3]}`; a missing field means nothing selected
pub fn parse_selection(text: &str) -> Result<Vec<usize>> {
    #[derive(Deserialize)]
    struct Selection {
        #[serde(default)]
        selected: Vec<usize>,
    }

    let selection: Selection =
        serde_json::from_str(extract_json(text)).map_err(|e| TreeError::oracle(format!("relevance: {}", e)))?;
    Ok(selection.selected)
}

/// Strip markdown fences and surrounding chatter around a JSON object
fn extract_json(text: &str) -> &str {
    let text = text.trim();
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach() {
        let decision =
            parse_placement(r#"{"action": "attach", "target_id": "root:人物", "new_category": null, "summary": "张三28岁"}"#)
                .unwrap();
        assert_eq!(
            decision,
            PlacementDecision::Attach {
                target_id: "root:人物".to_string(),
                summary: "张三28岁".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_attach_without_target_means_root() {
        let decision = parse_placement(r#"{"action": "attach", "target_id": null, "summary": "x"}"#).unwrap();
        assert!(matches!(decision, PlacementDecision::Attach { ref target_id, .. } if target_id == "root"));
    }

    #[test]
    fn test_parse_create() {
        let decision =
            parse_placement(r#"{"action": "create", "new_category": "旅行", "summary": "下周去上海"}"#).unwrap();
        assert_eq!(decision.summary(), "下周去上海");
        assert!(matches!(decision, PlacementDecision::Create { ref category, .. } if category == "旅行"));
    }

    #[test]
    fn test_parse_placement_rejects_bad_shapes() {
        assert!(parse_placement("not json").is_err());
        assert!(parse_placement(r#"{"action": "attach", "target_id": "root"}"#).is_err());
        assert!(parse_placement(r#"{"action": "create", "summary": "x"}"#).is_err());
        assert!(parse_placement(r#"{"action": "delete", "summary": "x"}"#).is_err());
        assert!(matches!(
            parse_placement("{}"),
            Err(TreeError::OracleUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"action\": \"attach\", \"target_id\": \"root\", \"summary\": \"x\"}\n```";
        assert!(parse_placement(text).is_ok());
    }

    #[test]
    fn test_parse_retention() {
        assert!(parse_retention(r#"{"should_remember": true}"#).unwrap());
        assert!(!parse_retention(r#"{"should_remember": false}"#).unwrap());
        assert!(!parse_retention("{}").unwrap());
        assert!(parse_retention(r#"{"should_remember": "yes"}"#).is_err());
        assert!(parse_retention("garbage").is_err());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(r#"{"selected": [1, 3]}"#).unwrap(), vec![1, 3]);
        assert!(parse_selection(r#"{"selected": []}"#).unwrap().is_empty());
        assert!(parse_selection("{}").unwrap().is_empty());
        assert!(parse_selection(r#"{"selected": [-1]}"#).is_err());
        assert!(parse_selection(r#"{"selected": "1"}"#).is_err());
    }
}
