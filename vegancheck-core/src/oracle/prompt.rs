//! Prompt for classifying ingredients the knowledge base does not know.

/// Prompt name, used in logs.
pub const CLASSIFY_PROMPT_NAME: &str = "classify_unknown_ingredients";

/// System instruction fixing the output to strict JSON.
pub fn render_system_prompt() -> String {
    r#"You are a food ingredient analyst. The user will give you a list of ingredient names that are not in our database. Decide whether each one is vegan.

IMPORTANT RULES:
- Return ONLY valid JSON matching the exact schema below. No other text, no markdown.
- Flag every ingredient that is animal-derived or commonly animal-derived. Do not flag clearly plant-based or mineral ingredients.
- Set "maybe" to true when the flagged ingredients are only sometimes animal-derived.
- If the list is not a list of food ingredients at all (gibberish, a sentence, a recipe title), set "unclear" to true and leave "flagged" empty.

JSON Schema:
{
  "is_vegan": "boolean, true if none of the ingredients are animal-derived",
  "maybe": "boolean, true if flagged ingredients are only possibly animal-derived",
  "unclear": "boolean, true if the input is not understandable as ingredients",
  "flagged": [
    {
      "name": "string, the ingredient name exactly as given",
      "reason": "string, why it is or may be animal-derived",
      "function": "string or null, what it does in food",
      "nourishment": "string or null, a short nutrition fact"
    }
  ],
  "explanation": "string, one or two sentence summary"
}"#
    .to_string()
}

/// User payload listing the unknown ingredient names.
pub fn render_user_prompt(unknown: &[String]) -> String {
    let list = unknown
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Classify these unknown ingredients:\n{}", list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_user_prompt() {
        let prompt = render_user_prompt(&["tallow".to_string(), "shea butter".to_string()]);
        assert!(prompt.contains("- tallow\n- shea butter"));
    }

    #[test]
    fn test_system_prompt_names_schema_fields() {
        let prompt = render_system_prompt();
        for field in ["is_vegan", "maybe", "unclear", "flagged", "explanation"] {
            assert!(prompt.contains(field), "missing {}", field);
        }
    }
}
