use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::{Frontmatter, ParseError};

/// Reads the YAML frontmatter block at the top of the document, if any.
///
/// Returns the frontmatter and the index of the first body line. Malformed
/// frontmatter is reported as a recoverable error; an unterminated block
/// leaves everything after the opening `---` to the body.
pub fn extract(lines: &[&str], errors: &mut Vec<ParseError>) -> (Option<Frontmatter>, usize) {
    if lines.first().map(|line| line.trim()) != Some("---") {
        return (None, 0);
    }

    let Some(close) = lines[1..].iter().position(|line| line.trim() == "---") else {
        errors.push(
            ParseError::recoverable("frontmatter is not terminated by '---'", 1, 1)
                .with_context(lines[0]),
        );
        return (None, 1);
    };
    let body_start = close + 2;
    let yaml = lines[1..=close].join("\n");

    if yaml.trim().is_empty() {
        return (Some(Frontmatter::default()), body_start);
    }

    match serde_yaml::from_str::<BTreeMap<String, Value>>(&yaml) {
        Ok(mut fields) => {
            let frontmatter = Frontmatter {
                title: take_scalar(&mut fields, "title"),
                version: take_scalar(&mut fields, "version"),
                description: take_scalar(&mut fields, "description"),
                metadata: fields,
            };
            tracing::debug!(title = %frontmatter.title, "read frontmatter");
            (Some(frontmatter), body_start)
        }
        Err(error) => {
            let (line, column) = error
                .location()
                .map_or((1, 1), |location| (location.line() + 1, location.column().max(1)));
            let context = lines.get(line - 1).copied().unwrap_or_default();
            errors.push(
                ParseError::recoverable(format!("malformed frontmatter: {error}"), line, column)
                    .with_context(context),
            );
            (None, body_start)
        }
    }
}

/// Removes a key and renders its value as a string.
fn take_scalar(fields: &mut BTreeMap<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(text: &str) -> (Option<Frontmatter>, usize, Vec<ParseError>) {
        let lines: Vec<&str> = text.lines().collect();
        let mut errors = Vec::new();
        let (frontmatter, start) = extract(&lines, &mut errors);
        (frontmatter, start, errors)
    }

    #[test]
    fn known_keys_and_metadata() {
        let (frontmatter, start, errors) =
            run("---\ntitle: Tasks\nversion: 1.0\nowner: platform\n---\n# Body");
        let frontmatter = frontmatter.unwrap();
        assert!(errors.is_empty());
        assert_eq!(start, 5);
        assert_eq!(frontmatter.title, "Tasks");
        assert_eq!(frontmatter.version, "1.0");
        assert_eq!(frontmatter.metadata.get("owner"), Some(&json!("platform")));
    }

    #[test]
    fn no_frontmatter() {
        let (frontmatter, start, errors) = run("# Title\n---\n");
        assert!(frontmatter.is_none());
        assert_eq!(start, 0);
        assert!(errors.is_empty());
    }

    #[test]
    fn unterminated_is_recoverable() {
        let (frontmatter, start, errors) = run("---\ntitle: x\n## GET /x");
        assert!(frontmatter.is_none());
        assert_eq!(start, 1);
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].fatal);
    }

    #[test]
    fn invalid_yaml_is_recoverable() {
        let (frontmatter, start, errors) = run("---\ntitle: [unclosed\n---\nbody");
        assert!(frontmatter.is_none());
        assert_eq!(start, 3);
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].fatal);
        assert!(errors[0].message.starts_with("malformed frontmatter"));
    }

    #[test]
    fn empty_block_is_default() {
        let (frontmatter, start, errors) = run("---\n---\n");
        assert_eq!(frontmatter, Some(Frontmatter::default()));
        assert_eq!(start, 2);
        assert!(errors.is_empty());
    }
}
