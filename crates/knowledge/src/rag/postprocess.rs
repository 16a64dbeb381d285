//! Separating a model's reasoning trace from its answer.
//!
//! Reasoning models emit `<think>...</think>` segments ahead of the answer.
//! Only the text after the last closing tag is the user-facing answer.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Split raw model output into `(summary, reasoning)`.
///
/// Each `<think>` is paired with the nearest following `</think>`; an opening
/// tag without a closing one is plain text. Segments that are blank after
/// trimming are dropped and the rest are newline-joined into the reasoning.
/// When at least one segment survives, the summary is the trimmed text after
/// the last closing tag; otherwise the summary is the whole output, trimmed.
pub fn split(raw: &str) -> (String, String) {
    let segments = reasoning_segments(raw);

    if segments.is_empty() {
        return (raw.trim().to_string(), String::new());
    }

    let summary = raw
        .rfind(CLOSE_TAG)
        .map(|at| raw[at + CLOSE_TAG.len()..].trim())
        .unwrap_or_default();

    (summary.to_string(), segments.join("\n"))
}

fn reasoning_segments(raw: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while let Some(open) = raw[cursor..].find(OPEN_TAG) {
        let body_start = cursor + open + OPEN_TAG.len();
        let Some(close) = raw[body_start..].find(CLOSE_TAG) else {
            break;
        };

        let body = raw[body_start..body_start + close].trim();
        if !body.is_empty() {
            segments.push(body);
        }
        cursor = body_start + close + CLOSE_TAG.len();
    }

    segments
}
