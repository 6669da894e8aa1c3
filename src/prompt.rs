/// The instruction sent to the model: a diabetes-nutritionist persona, the ingredient list, the
/// glycaemic targets, and the exact JSON layout the response validator expects.
pub fn build_prompt(ingredients: &str) -> String {
    format!(
        r#"As a diabetes nutritionist, create a recipe with: {ingredients}. Rules:
1. Title: Fun creative name using food puns
2. Diabetic-friendly (GI < 50, GL < 10)
3. Format response as JSON:
{{
  "title": "Recipe Name",
  "ingredients": {{
    "provided": ["1 cup broccoli (GI=15)"],
    "optional": ["1 tbsp olive oil"]
  }},
  "instructions": ["Step 1..."],
  "nutrition": {{
    "carbs": "8g",
    "fiber": "5g",
    "gi": 15,
    "gl": 3,
    "calories": 250,
    "protein": "20g",
    "fat": "10g"
  }},
  "tips": "Pair with whole-grain bread for a lower GI"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_ingredients_and_constraints() {
        let prompt = build_prompt("broccoli, olive oil");
        assert!(prompt.contains("create a recipe with: broccoli, olive oil."));
        assert!(prompt.contains("GI < 50, GL < 10"));
        assert!(prompt.contains("\"provided\""));
        assert!(prompt.contains("\"instructions\""));
    }

    #[test]
    fn test_prompt_template_is_valid_json() {
        let prompt = build_prompt("kale");
        let template = &prompt[prompt.find('{').unwrap()..];
        let value: serde_json::Value = serde_json::from_str(template).unwrap();
        assert!(value["title"].is_string());
        assert!(value["ingredients"]["provided"].is_array());
    }
}
