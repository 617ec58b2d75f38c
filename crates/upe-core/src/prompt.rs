//! Prompt BOM compiler.
//!
//! Builds the single instruction string sent to the oracle. The output is a
//! pure function of [`PromptInputs`]: identical inputs produce identical
//! bytes, so the BOM can be stored, diffed and replayed outside the pipeline.

use serde::{Deserialize, Serialize};

/// Rubric embedded in every BOM compiled by the pipeline.
pub const DEFAULT_RUBRIC: &str = "- Correctness (40%)\n- Completeness (20%)\n- Evidence (20%)\n- Style (10%)\n- Safety (10%)";

/// Failure object the oracle returns when it cannot comply.
pub const FAILURE_JSON: &str = r#"{"status":"INSUFFICIENT_CONTEXT","missing":["field"]}"#;

const RETURN_INSTRUCTIONS: &str =
    "[RETURN INSTRUCTIONS] Return only JSON conforming to schema. No prose. </END>";

/// Named inputs of the prompt compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInputs {
    pub run_id: String,
    pub cartridge_version: String,
    pub seed: u64,
    pub model: String,
    pub temperature: f64,
    pub role: String,
    pub goal: String,
    pub context: String,
    pub style: String,
    pub banlist: Vec<String>,
    pub tools: String,
    pub rubric: String,
    pub output_schema: String,
    pub failure_schema: String,
}

/// Compile the labeled sections in fixed order, separated by blank lines.
pub fn compile_prompt(inputs: &PromptInputs) -> String {
    let sections = [
        format!(
            "[HEADER] Prompt-ID:{} Version:{} Seed:{} Model:{} t={}",
            inputs.run_id, inputs.cartridge_version, inputs.seed, inputs.model, inputs.temperature
        ),
        format!(
            "[ROLE] You are {}. Do not reveal chain-of-thought. Follow policy; obey schema.",
            inputs.role
        ),
        format!("[OBJECTIVE] {}", inputs.goal),
        format!("[CONTEXT] {}", inputs.context),
        format!(
            "[STYLE & GLOSSARY] {} | Avoid: {}",
            inputs.style,
            inputs.banlist.join(", ")
        ),
        format!("[TOOLS] {}", inputs.tools),
        format!("[ACCEPTANCE RUBRIC]\n{}", inputs.rubric),
        format!("[OUTPUT SCHEMA]\n{}", inputs.output_schema),
        format!("[FAILURE JSON]\n{}", inputs.failure_schema),
        RETURN_INSTRUCTIONS.to_string(),
    ];
    sections.join("\n\n")
}

/// JSON schema the oracle output must follow.
pub fn output_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": { "type": "string" },
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "heading": { "type": "string" },
                        "blocks": { "type": "array", "items": { "type": "object" } }
                    },
                    "required": ["id", "heading", "blocks"],
                    "additionalProperties": false
                }
            },
            "citations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "source_id": { "type": "string" },
                        "quote": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["id", "source_id", "quote"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["title", "sections"]
    })
}

/// Pretty-printed [`output_schema`] as embedded in the BOM.
pub fn output_schema_text() -> String {
    // Serializing a `Value` built from literals cannot fail.
    serde_json::to_string_pretty(&output_schema()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PromptInputs {
        PromptInputs {
            run_id: "run-1".to_string(),
            cartridge_version: "cartridge@1.0.0".to_string(),
            seed: 42,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            role: "Domain Expert".to_string(),
            goal: "Summarize Q3 results".to_string(),
            context: "Sources:\ns1 abc".to_string(),
            style: "Executive, terse, data-first".to_string(),
            banlist: vec!["emojis".to_string(), "hyperbole".to_string()],
            tools: "[]".to_string(),
            rubric: DEFAULT_RUBRIC.to_string(),
            output_schema: output_schema_text(),
            failure_schema: FAILURE_JSON.to_string(),
        }
    }

    #[test]
    fn identical_inputs_give_identical_bytes() {
        assert_eq!(compile_prompt(&inputs()), compile_prompt(&inputs()));
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let bom = compile_prompt(&inputs());
        let labels = [
            "[HEADER]",
            "[ROLE]",
            "[OBJECTIVE]",
            "[CONTEXT]",
            "[STYLE & GLOSSARY]",
            "[TOOLS]",
            "[ACCEPTANCE RUBRIC]",
            "[OUTPUT SCHEMA]",
            "[FAILURE JSON]",
            "[RETURN INSTRUCTIONS]",
        ];
        let positions: Vec<usize> = labels.iter().map(|l| bom.find(l).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert!(bom.ends_with("</END>"));
    }

    #[test]
    fn header_and_style_render_exactly() {
        let bom = compile_prompt(&inputs());
        assert!(bom.starts_with(
            "[HEADER] Prompt-ID:run-1 Version:cartridge@1.0.0 Seed:42 Model:gpt-4o-mini t=0.3\n\n[ROLE] You are Domain Expert."
        ));
        assert!(bom.contains("[STYLE & GLOSSARY] Executive, terse, data-first | Avoid: emojis, hyperbole"));
        assert!(bom.contains("[ACCEPTANCE RUBRIC]\n- Correctness (40%)"));
    }

    #[test]
    fn any_input_change_changes_output() {
        let mut other = inputs();
        other.seed = 43;
        assert_ne!(compile_prompt(&inputs()), compile_prompt(&other));
    }

    #[test]
    fn schema_requires_title_and_sections() {
        let schema = output_schema();
        assert_eq!(schema["required"], serde_json::json!(["title", "sections"]));
    }
}
