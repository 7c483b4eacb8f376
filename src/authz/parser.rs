use crate::authz::errors::ModelError;
use crate::authz::model::{is_field_section, Definition, Model};

/// Parse model text into a `Model`.
///
/// Blank lines and lines starting with `#` or `;` are skipped. A trailing
/// `\` joins an assignment with the following line. Parsing stops at the
/// first error; nothing is partially applied.
pub fn parse_model(source: &str) -> Result<Model, ModelError> {
    let mut model = Model::new();
    let mut current: Option<String> = None;
    let mut lines = source.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((line_no, raw)) = lines.next() {
        let line = raw.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        if line.starts_with('[') {
            let name = section_name(line).ok_or_else(|| ModelError::InvalidSectionHeader {
                line: line_no,
                header: line.to_string(),
            })?;
            // Reopening a section keeps its existing keys
            model.section_mut(name);
            current = Some(name.to_string());
            continue;
        }

        let Some(section) = current.as_deref() else {
            return Err(ModelError::LineOutsideSection {
                line: line_no,
                text: line.to_string(),
            });
        };

        let assignment = join_continuations(line_no, line, &mut lines)?;
        let (key, value) =
            assignment
                .split_once('=')
                .ok_or_else(|| ModelError::MissingSeparator {
                    line: line_no,
                    text: assignment.clone(),
                })?;
        let key = key.trim();
        let value = value.trim();

        if key.is_empty() {
            return Err(ModelError::EmptyKey { line: line_no });
        }
        if model.definition(section, key).is_some() {
            return Err(ModelError::DuplicateKey {
                line: line_no,
                section: section.to_string(),
                key: key.to_string(),
            });
        }

        let definition = if is_field_section(section) {
            let fields = split_fields(value).ok_or_else(|| ModelError::EmptyDefinition {
                line: line_no,
                section: section.to_string(),
                key: key.to_string(),
            })?;
            Definition::Fields(fields)
        } else {
            Definition::Expression(value.to_string())
        };

        model.add_definition(section, key, definition)?;
    }

    Ok(model)
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

/// Extract `name` from `[name]`, where name is `[A-Za-z0-9_]+`.
fn section_name(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(name)
}

/// Follow trailing `\` continuations, consuming lines from `rest`.
/// Comment lines inside a continuation are skipped; a blank line ends it.
fn join_continuations<'a, I>(
    line_no: usize,
    first: &str,
    rest: &mut I,
) -> Result<String, ModelError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut text = first.to_string();
    let mut last_line = line_no;
    while let Some(stripped) = text.strip_suffix('\\') {
        let mut joined = stripped.trim_end().to_string();
        let (next_no, next) = loop {
            let (no, raw) = rest
                .next()
                .ok_or(ModelError::DanglingContinuation { line: last_line })?;
            let raw = raw.trim();
            if !is_comment(raw) {
                break (no, raw);
            }
            last_line = no;
        };
        if !next.is_empty() {
            joined.push(' ');
            joined.push_str(next);
        }
        text = joined;
        last_line = next_no;
    }
    Ok(text)
}

/// Split `sub, obj, act` into trimmed names; `None` if any name is empty.
fn split_fields(value: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = value.split(',').map(|f| f.trim().to_string()).collect();
    if fields.iter().any(|f| f.is_empty()) {
        return None;
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::model::{MATCHERS, POLICY_DEFINITION, POLICY_EFFECT, ROLE_DEFINITION};

    const RBAC_MODEL: &str = r#"
[request_definition]
r = sub, obj, act
[policy_definition]
p = sub, obj, act
[role_definition]
g = _, _
[policy_effect]
e = some(where (p.eft == allow))
[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

    #[test]
    fn test_parse_rbac_model() {
        let model = parse_model(RBAC_MODEL).unwrap();
        assert_eq!(model.sections().len(), 5);
        for section in model.sections() {
            assert_eq!(section.len(), 1);
        }

        assert_eq!(
            model.fields("request_definition", "r").unwrap(),
            ["sub", "obj", "act"]
        );
        assert_eq!(
            model.fields(POLICY_DEFINITION, "p").unwrap(),
            ["sub", "obj", "act"]
        );
        assert_eq!(model.fields(ROLE_DEFINITION, "g").unwrap(), ["_", "_"]);
        assert_eq!(
            model.expression(POLICY_EFFECT, "e"),
            Some("some(where (p.eft == allow))")
        );
        assert_eq!(
            model.expression(MATCHERS, "m"),
            Some("g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse_model(RBAC_MODEL).unwrap();
        let b = parse_model(RBAC_MODEL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = r#"
# access model
[request_definition]

; request shape
r = sub, obj, act
    # indented comment
"#;
        let model = parse_model(text).unwrap();
        assert_eq!(model.sections().len(), 1);
        assert_eq!(model.get("request_definition").unwrap().len(), 1);
    }

    #[test]
    fn test_custom_section_kept_as_expression() {
        let text = "[custom]\nx = a, b , c\n";
        let model = parse_model(text).unwrap();
        assert_eq!(model.expression("custom", "x"), Some("a, b , c"));
    }

    #[test]
    fn test_numbered_variants() {
        let text = "[policy_definition]\np = sub, obj, act\np2 = sub, act\n";
        let model = parse_model(text).unwrap();
        assert_eq!(model.arity("p", "p").unwrap(), 3);
        assert_eq!(model.arity("p", "p2").unwrap(), 2);
    }

    #[test]
    fn test_line_continuation() {
        let text = "[matchers]\nm = r.sub == p.sub && \\\n    r.obj == p.obj\n";
        let model = parse_model(text).unwrap();
        assert_eq!(
            model.expression(MATCHERS, "m"),
            Some("r.sub == p.sub && r.obj == p.obj")
        );
    }

    #[test]
    fn test_continuation_skips_comments() {
        let text = "[matchers]\nm = r.sub == p.sub && \\\n# object check\n; still a comment\n    r.obj == p.obj\n";
        let model = parse_model(text).unwrap();
        assert_eq!(
            model.expression(MATCHERS, "m"),
            Some("r.sub == p.sub && r.obj == p.obj")
        );

        let text = "[matchers]\nm = a && \\\n\nn = b\n";
        let model = parse_model(text).unwrap();
        assert_eq!(model.expression(MATCHERS, "m"), Some("a &&"));
        assert_eq!(model.expression(MATCHERS, "n"), Some("b"));

        let err = parse_model("[matchers]\nm = a && \\\n# trailing").unwrap_err();
        assert!(matches!(err, ModelError::DanglingContinuation { line: 3 }));
    }

    #[test]
    fn test_dangling_continuation() {
        let err = parse_model("[matchers]\nm = a && \\").unwrap_err();
        assert!(matches!(err, ModelError::DanglingContinuation { line: 2 }));
    }

    #[test]
    fn test_line_outside_section() {
        let err = parse_model("r = sub, obj\n[request_definition]\n").unwrap_err();
        assert!(matches!(err, ModelError::LineOutsideSection { line: 1, .. }));
    }

    #[test]
    fn test_invalid_section_headers() {
        for header in ["[]", "[request definition]", "[unclosed", "[a-b]"] {
            let err = parse_model(header).unwrap_err();
            assert!(
                matches!(err, ModelError::InvalidSectionHeader { line: 1, .. }),
                "{header} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_key() {
        let text = "[policy_definition]\np = sub\n[role_definition]\ng = _, _\n[policy_definition]\np = obj\n";
        let err = parse_model(text).unwrap_err();
        match err {
            ModelError::DuplicateKey { line, section, key } => {
                assert_eq!(line, 6);
                assert_eq!(section, "policy_definition");
                assert_eq!(key, "p");
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_separator() {
        let err = parse_model("[request_definition]\nr sub, obj\n").unwrap_err();
        assert!(matches!(err, ModelError::MissingSeparator { line: 2, .. }));
    }

    #[test]
    fn test_empty_key() {
        let err = parse_model("[request_definition]\n = sub\n").unwrap_err();
        assert!(matches!(err, ModelError::EmptyKey { line: 2 }));
    }

    #[test]
    fn test_empty_field_name() {
        let err = parse_model("[policy_definition]\np = sub, , act\n").unwrap_err();
        assert!(matches!(err, ModelError::EmptyDefinition { .. }));

        let err = parse_model("[policy_definition]\np =\n").unwrap_err();
        assert!(matches!(err, ModelError::EmptyDefinition { .. }));
    }

    #[test]
    fn test_expression_may_contain_equals() {
        let model = parse_model("[policy_effect]\ne = a == b\n").unwrap();
        assert_eq!(model.expression(POLICY_EFFECT, "e"), Some("a == b"));
    }
}
