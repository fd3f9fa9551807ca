// Clean free text before it reaches a prompt: strip invisible Unicode,
// drop prompt-injection lines, collapse whitespace, cap the length.

/// Maximum characters kept from one free-text input.
pub const MAX_INPUT_CHARS: usize = 50_000;

const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

/// Normalize clinician-entered text for prompting and rule matching.
pub fn normalize_text(raw: &str) -> String {
    let visible = remove_invisible_chars(raw);
    let (kept, removed) = remove_injection_lines(&visible);
    if removed > 0 {
        tracing::warn!(removed_lines = removed, "Prompt-injection lines removed from input");
    }
    truncate_chars(&collapse_whitespace(&kept), MAX_INPUT_CHARS)
}

/// Keeps space, tab, newline and carriage return; drops zero-width,
/// bidi-override and other control characters.
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t' | '\r') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn is_role_marker(lower: &str) -> bool {
    const MARKERS: &[&str] = &[
        "system:",
        "assistant:",
        "user:",
        "[system]",
        "[assistant]",
        "[inst]",
        "[/inst]",
        "<<sys>>",
        "<system",
        "</system",
        "<instruction",
        "</instruction",
        "note to ai:",
        "instructions:",
    ];
    MARKERS.iter().any(|m| lower.starts_with(m))
}

fn is_override_attempt(lower: &str) -> bool {
    const PHRASES: &[&str] = &[
        "ignore previous instructions",
        "ignore all instructions",
        "ignore the above instructions",
        "disregard your instructions",
        "disregard all instructions",
        "forget your instructions",
        "forget all instructions",
        "new instructions:",
    ];
    PHRASES.iter().any(|p| lower.contains(p))
}

fn remove_injection_lines(text: &str) -> (String, usize) {
    let mut removed = 0usize;
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let lower = line.trim().to_lowercase();
            let injected = is_role_marker(&lower) || is_override_attempt(&lower);
            if injected {
                removed += 1;
            }
            !injected
        })
        .collect();
    (kept.join("\n"), removed)
}

/// Collapse runs of spaces/tabs inside lines and runs of blank lines.
fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut prev_blank = true;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !prev_blank {
                lines.push(String::new());
                prev_blank = true;
            }
        } else {
            lines.push(collapsed);
            prev_blank = false;
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Truncate to `max_chars`, breaking at the last whitespace when possible.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    let end = head.rfind(char::is_whitespace).unwrap_or(cut);
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
