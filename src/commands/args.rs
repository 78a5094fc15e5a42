//! Command argument parser.
//!
//! Splits raw command text on the quote character, so each quoted span
//! becomes one contiguous argument. Unquoted leading tokens (the time
//! specification, the `end` keyword) survive as their own arguments.

/// Parse raw command text into an ordered argument list.
///
/// Strips `prefix`, trims, splits on `"`, and drops empty or
/// whitespace-only fragments. The `end <id>` form is unquoted, so its
/// single fragment is re-split on one space to yield the keyword and the
/// id as separate arguments. Unbalanced quotes are tolerated; the naive
/// split result is whatever it is.
pub fn parse_args(content: &str, prefix: &str) -> Vec<String> {
    let body = content.strip_prefix(prefix).unwrap_or(content).trim();

    let mut args: Vec<String> = body
        .split('"')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(first) = args.first() {
        if first.starts_with("end") {
            let mut parts = first.splitn(2, ' ');
            let keyword = parts.next().unwrap_or_default().to_string();
            let id = parts.next().map(|s| s.trim().to_string());
            args[0] = keyword;
            if let Some(id) = id {
                args.push(id);
            }
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_form() {
        let args = parse_args("!vota \"Do you like this?\"", "!vota");
        assert_eq!(args, vec!["Do you like this?"]);
    }

    #[test]
    fn question_and_options() {
        let args = parse_args(
            "!vota \"What do you wanna play?\" \"Overwatch\" \"CS:GO\" \"Quake\"",
            "!vota",
        );
        assert_eq!(args, vec!["What do you wanna play?", "Overwatch", "CS:GO", "Quake"]);
    }

    #[test]
    fn time_token_stays_first() {
        let args = parse_args("!vota time=6h \"Chat tonight?\"", "!vota");
        assert_eq!(args, vec!["time=6h", "Chat tonight?"]);
    }

    #[test]
    fn end_form_splits_keyword_and_id() {
        let args = parse_args("!vota end 61342378", "!vota");
        assert_eq!(args, vec!["end", "61342378"]);
    }

    #[test]
    fn keyword_commands_pass_through() {
        assert_eq!(parse_args("!vota help", "!vota"), vec!["help"]);
        assert_eq!(parse_args("!vota examples", "!vota"), vec!["examples"]);
        assert_eq!(parse_args("!vota invite", "!vota"), vec!["invite"]);
    }

    #[test]
    fn empty_body_yields_no_arguments() {
        assert!(parse_args("!vota", "!vota").is_empty());
        assert!(parse_args("!vota   ", "!vota").is_empty());
        assert!(parse_args("!vota \"\" \"  \"", "!vota").is_empty());
    }

    #[test]
    fn unbalanced_quotes_are_tolerated() {
        // Whatever the naive split produces; no error path.
        let args = parse_args("!vota \"broken question", "!vota");
        assert_eq!(args, vec!["broken question"]);
    }
}
