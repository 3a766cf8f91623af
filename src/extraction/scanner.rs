use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExtractionError;

/// Field map of the first JSON object found in generated text.
pub type ExtractedPayload = Map<String, Value>;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think-block regex"));
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid code-fence regex"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing-comma regex"));

/// Drops a leading BOM, `<think>` reasoning blocks and markdown fence markers. Fenced
/// content is kept in place.
pub fn strip_wrappers(text: &str) -> String {
    let text = text.trim().trim_start_matches('\u{feff}');
    let without_think = THINK_BLOCK.replace_all(text, "");
    CODE_FENCE.replace_all(&without_think, "").trim().to_string()
}

/// True when the brace at `brace` is followed by a quoted key, i.e. it opens a JSON
/// object rather than a stray `{` in prose.
fn opens_object(text: &str, brace: usize) -> bool {
    text[brace + 1..].trim_start().starts_with('"')
}

fn parse_object(candidate: &str, repair: bool) -> Result<ExtractedPayload, String> {
    let first_error = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => return Err(format!("expected an object, found {other}")),
        Err(err) => err.to_string(),
    };

    if repair {
        let repaired = TRAILING_COMMA.replace_all(candidate, "$1");
        if repaired != candidate {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&repaired) {
                return Ok(map);
            }
        }
    }
    Err(first_error)
}

/// Locates and parses the first complete JSON object in `raw`.
///
/// One pass over the text keeps a stack of open braces, honouring string literals and
/// escapes. A balanced span is a candidate only when no enclosing object is still open,
/// so members of an outer object are never taken for the answer. Stray `{` in prose do
/// not count as enclosing objects.
///
/// Errors: an object still open at the end of the text is truncated output and yields
/// [`ExtractionError::InvalidJson`], as does a candidate that fails to parse when no
/// later one succeeds. Text without any candidate yields
/// [`ExtractionError::NoJsonObject`].
pub fn extract_json_payload(raw: &str) -> Result<ExtractedPayload, ExtractionError> {
    let cleaned = strip_wrappers(raw);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(map);
    }

    let mut open: Vec<(usize, bool)> = Vec::new();
    let mut objects_open = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut first_error: Option<String> = None;

    for (idx, ch) in cleaned.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => {
                let is_object = opens_object(&cleaned, idx);
                if is_object {
                    objects_open += 1;
                }
                open.push((idx, is_object));
            }
            '}' => {
                let Some((start, is_object)) = open.pop() else {
                    continue;
                };
                if is_object {
                    objects_open -= 1;
                }
                if objects_open > 0 {
                    continue;
                }
                match parse_object(&cleaned[start..=idx], is_object) {
                    Ok(map) => return Ok(map),
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            _ => {}
        }
    }

    if objects_open > 0 {
        return Err(ExtractionError::InvalidJson(
            "truncated object: output ends before the JSON object is closed".to_string(),
        ));
    }

    Err(match first_error {
        Some(err) => ExtractionError::InvalidJson(err),
        None => ExtractionError::NoJsonObject,
    })
}
