//! Current time tool.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{SecondsFormat, Utc};
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolOutcome};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current UTC date and time. Optionally pass a strftime `format`."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "strftime format, e.g. '%Y-%m-%d'. Defaults to RFC 3339."
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let now = Utc::now();
        let Some(format) = arguments["format"].as_str() else {
            return Ok(ToolOutcome::success(
                now.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        };

        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(ToolError::InvalidArguments(format!(
                "invalid time format '{format}'"
            )));
        }
        Ok(ToolOutcome::success(
            now.format_with_items(items.into_iter()).to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_is_rfc3339() {
        let outcome = CurrentTimeTool.execute(serde_json::json!({})).await.unwrap();
        assert!(outcome.ok);
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.content).is_ok());
    }

    #[tokio::test]
    async fn custom_format() {
        let outcome = CurrentTimeTool
            .execute(serde_json::json!({"format": "%Y"}))
            .await
            .unwrap();
        assert_eq!(outcome.content.len(), 4);
        assert!(outcome.content.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn invalid_format_is_rejected() {
        let result = CurrentTimeTool
            .execute(serde_json::json!({"format": "%Q%"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
