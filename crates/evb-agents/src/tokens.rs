//! Per-variant token-usage extraction. Every function strips ANSI first and
//! never fails: an unparseable transcript yields an all-`None` [`ParsedTokens`].

use evb_testparse::strip_ansi_codes;

use crate::types::ParsedTokens;

/// `claude-code`: reverse-scan JSONL for a line shaped like
/// `{"type":"result",...,"usage":{"input_tokens":N,"output_tokens":N}}`.
pub fn parse_claude_code_tokens(output: &str) -> ParsedTokens {
    let clean = strip_ansi_codes(output);

    for line in clean.lines().rev() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(event) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let usage = event.get("usage");
        let input = usage.and_then(|u| u.get("input_tokens")).and_then(|v| v.as_u64());
        let output = usage.and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64());
        if input.is_some() || output.is_some() {
            let total = match (input, output) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            };
            return ParsedTokens { input, output, total };
        }
    }

    ParsedTokens::default()
}

/// `gemini-cli --output-format json`: a trailing JSON object at
/// `stats.models.*.tokens.{input,candidates,total}`, summed across models.
pub fn parse_gemini_cli_tokens(output: &str) -> ParsedTokens {
    let clean = strip_ansi_codes(output);

    let event = clean
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .or_else(|| serde_json::from_str::<serde_json::Value>(clean.trim()).ok());

    let Some(event) = event else {
        return ParsedTokens::default();
    };
    let Some(models) = event.get("stats").and_then(|s| s.get("models")).and_then(|m| m.as_object()) else {
        return ParsedTokens::default();
    };
    if models.is_empty() {
        return ParsedTokens::default();
    }

    let mut input_total = 0u64;
    let mut candidates_total = 0u64;
    let mut grand_total = 0u64;
    for model_data in models.values() {
        let tokens = model_data.get("tokens");
        input_total += tokens.and_then(|t| t.get("input")).and_then(|v| v.as_u64()).unwrap_or(0);
        candidates_total += tokens.and_then(|t| t.get("candidates")).and_then(|v| v.as_u64()).unwrap_or(0);
        grand_total += tokens.and_then(|t| t.get("total")).and_then(|v| v.as_u64()).unwrap_or(0);
    }

    let input = (input_total > 0).then_some(input_total);
    let output = (candidates_total > 0).then_some(candidates_total);
    let total = if grand_total > 0 {
        Some(grand_total)
    } else if input_total > 0 || candidates_total > 0 {
        Some(input_total + candidates_total)
    } else {
        None
    };

    ParsedTokens { input, output, total }
}

/// `openhands --json`: accumulate `prompt_tokens`/`completion_tokens` (or the
/// `input_tokens`/`output_tokens` and `total_input_tokens`/`total_output_tokens`
/// aliases) across every JSONL event carrying a `usage`, `metrics`, or
/// `token_usage` object.
pub fn parse_openhands_tokens(output: &str) -> ParsedTokens {
    let clean = strip_ansi_codes(output);

    let mut total_input = 0u64;
    let mut total_output = 0u64;
    let mut found_any = false;

    for line in clean.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(event) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };

        for key in ["usage", "metrics", "token_usage"] {
            let Some(usage) = event.get(key).and_then(|v| v.as_object()) else {
                continue;
            };
            let inp = usage
                .get("prompt_tokens")
                .or_else(|| usage.get("input_tokens"))
                .or_else(|| usage.get("total_input_tokens"))
                .and_then(|v| v.as_u64());
            let out = usage
                .get("completion_tokens")
                .or_else(|| usage.get("output_tokens"))
                .or_else(|| usage.get("total_output_tokens"))
                .and_then(|v| v.as_u64());

            if inp.is_some() || out.is_some() {
                found_any = true;
                total_input += inp.unwrap_or(0);
                total_output += out.unwrap_or(0);
                break;
            }
        }
    }

    if found_any {
        ParsedTokens {
            input: Some(total_input),
            output: Some(total_output),
            total: Some(total_input + total_output),
        }
    } else {
        ParsedTokens::default()
    }
}

/// `trae`: scrape the boxed "Execution Summary" table for its "Total Tokens" row.
pub fn parse_trae_tokens(output: &str) -> ParsedTokens {
    let clean = strip_ansi_codes(output);

    let Some(start) = clean.find("Execution Summary") else {
        return ParsedTokens::default();
    };
    let summary = &clean[start..];

    for line in summary.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("│ Total Tokens") {
            let digits = rest
                .trim_start_matches(|c: char| c == '│' || c.is_whitespace())
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            if let Ok(total) = digits.parse::<u64>() {
                return ParsedTokens {
                    input: None,
                    output: None,
                    total: Some(total),
                };
            }
        }
    }

    ParsedTokens::default()
}
