use crate::domain::contract::{ContractError, LlmRecommendation};
use crate::domain::recommendation::Recommendation;

/// Pulls the first JSON object out of model text that may be fenced or wrapped in prose.
pub fn extract_json(text: &str) -> Option<String> {
    let body = fenced_body(text.trim());
    let start = body.find('{')?;
    let len = object_len(&body[start..])?;
    Some(body[start..start + len].to_string())
}

/// Contents of the first Markdown code fence, or the whole text when there is none.
/// An unterminated fence runs to the end.
fn fenced_body(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    // Skip the info string (`json`) on the opening line.
    let body = after.split_once('\n').map_or(after, |(_, rest)| rest);
    body.find("```").map_or(body, |close| &body[..close])
}

/// Byte length of the object that opens `s`. Braces inside string literals don't count.
fn object_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("model output is not a JSON object: {0}")]
    NotJson(String),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

pub fn parse_recommendation(text: &str) -> Result<Recommendation, ParseError> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmRecommendation>(&json_str)
        .map_err(|e| ParseError::NotJson(e.to_string()))?;
    Ok(parsed.validate_and_into_recommendation()?)
}
