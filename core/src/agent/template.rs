// `{key}` must exist in state, `{key?}` may be missing, `{{` and `}}` are literal braces.

use crate::error::{PipelineError, Result};
use crate::state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Key { name: &'a str, optional: bool },
}

fn malformed(template: &str, position: usize, reason: &str) -> PipelineError {
    PipelineError::MalformedTemplate {
        template: template.to_string(),
        position,
        reason: reason.to_string(),
    }
}

fn is_key_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn parse(template: &str) -> Result<Vec<Segment<'_>>> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                segments.push(Segment::Text(&template[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                segments.push(Segment::Text(&template[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'{' => {
                let close = template[i + 1..]
                    .find('}')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| malformed(template, i, "unclosed '{'"))?;

                let inner = &template[i + 1..close];
                let (name, optional) = match inner.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (inner, false),
                };
                if !is_key_name(name) {
                    return Err(malformed(
                        template,
                        i,
                        &format!("'{{{inner}}}' is not a valid placeholder; use '{{{{' for a literal brace"),
                    ));
                }

                if text_start < i {
                    segments.push(Segment::Text(&template[text_start..i]));
                }
                segments.push(Segment::Key { name, optional });
                i = close + 1;
                text_start = i;
            }
            b'}' => return Err(malformed(template, i, "unmatched '}'")),
            _ => i += 1,
        }
    }

    if text_start < bytes.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }

    Ok(segments)
}

pub fn referenced_keys(template: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    for segment in parse(template)? {
        if let Segment::Key { name, .. } = segment
            && !keys.iter().any(|k| k == name)
        {
            keys.push(name.to_string());
        }
    }
    Ok(keys)
}

pub fn resolve(template: &str, state: &SessionState) -> Result<String> {
    let mut resolved = String::with_capacity(template.len());

    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => resolved.push_str(text),
            Segment::Key { name, optional } => match state.get(name) {
                Some(value) => resolved.push_str(&value),
                None if optional => {}
                None => {
                    return Err(PipelineError::UnresolvedKey {
                        key: name.to_string(),
                    });
                }
            },
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        [("blog_outline", "H1\nIntro\nBody\nConclusion"), ("n", "3")]
            .into_iter()
            .collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let out = resolve("Following this outline strictly {blog_outline}", &state()).unwrap();
        assert_eq!(out, "Following this outline strictly H1\nIntro\nBody\nConclusion");
    }

    #[test]
    fn repeated_and_adjacent_placeholders() {
        let out = resolve("{n}{n} items: {n}", &state()).unwrap();
        assert_eq!(out, "33 items: 3");
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        let text = "You are a helpful assistant.";
        assert_eq!(resolve(text, &SessionState::new()).unwrap(), text);
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = resolve("Edit this draft: {blog_draft}", &state()).unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedKey { key } if key == "blog_draft"));
    }

    #[test]
    fn optional_key_may_be_missing() {
        let out = resolve("Feedback: [{critique?}] n={n?}", &state()).unwrap();
        assert_eq!(out, "Feedback: [] n=3");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = resolve(r#"Reply as {{"count": {n}}}"#, &state()).unwrap();
        assert_eq!(out, r#"Reply as {"count": 3}"#);
    }

    #[test]
    fn stray_braces_are_malformed() {
        for template in ["open {n", "close } here", "{not a key}", "{}", "{1st}"] {
            let err = resolve(template, &state()).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedTemplate { .. }),
                "{template:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn malformed_position_points_at_brace() {
        match resolve("abc }", &state()).unwrap_err() {
            PipelineError::MalformedTemplate { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lists_referenced_keys_once() {
        let keys = referenced_keys("{a} {b?} {a} {{c}}").unwrap();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let out = resolve("résumé → {n} ✓", &state()).unwrap();
        assert_eq!(out, "résumé → 3 ✓");
    }
}
