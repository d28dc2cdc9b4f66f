use std::sync::OnceLock;

use regex::Regex;

/// Placeholder pattern: `{{ env.VAR }}` with an optional
/// `| default("fallback")` suffix
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("must be valid regex")
    })
}

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// Substitution happens on the raw TOML before deserialization, so config
/// structs stay plain `String`/`SecretString`. A missing variable is an
/// error unless the placeholder carries a `default("…")`. TOML comment
/// lines are passed through untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut cursor = 0;
        for captures in placeholder().captures_iter(line) {
            let span = captures.get(0).expect("group 0 always present");
            let var = &captures[1];

            output.push_str(&line[cursor..span.start()]);
            cursor = span.end();

            match std::env::var(var) {
                Ok(value) => output.push_str(&value),
                Err(_) => match captures.get(2) {
                    Some(fallback) => output.push_str(fallback.as_str()),
                    None => return Err(format!("environment variable not found: `{var}`")),
                },
            }
        }
        output.push_str(&line[cursor..]);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
