use crate::errors::{LaunchError, LaunchResult};
use crate::params::ResolvedParameters;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Matches `{{`, `}}` (literal braces) or a `{name}` placeholder
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// How substituted values are written into the command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quoting {
    /// Values are substituted verbatim, so glob patterns reach the program untouched
    #[default]
    None,
    /// Values are quoted with POSIX shell rules for the quotes surrounding the placeholder
    Shell,
}

/// Shell quoting in effect at a point in a template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum QuoteContext {
    #[default]
    Bare,
    Single,
    Double,
}

/// Follows quote characters through the literal text of a template
#[derive(Debug, Default)]
struct QuoteTracker {
    context: QuoteContext,
    escaped: bool,
}

impl QuoteTracker {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if self.escaped {
                self.escaped = false;
                continue;
            }
            self.context = match (self.context, c) {
                (QuoteContext::Bare | QuoteContext::Double, '\\') => {
                    self.escaped = true;
                    self.context
                }
                (QuoteContext::Bare, '\'') => QuoteContext::Single,
                (QuoteContext::Bare, '"') => QuoteContext::Double,
                (QuoteContext::Single, '\'') | (QuoteContext::Double, '"') => QuoteContext::Bare,
                (context, _) => context,
            };
        }
    }
}

fn substitute<F>(template: &str, mut on_placeholder: F) -> LaunchResult<String>
where
    F: FnMut(&str, QuoteContext) -> LaunchResult<String>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut quotes = QuoteTracker::default();
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture group 0 always matches");
        let literal = &template[last..whole.start()];
        quotes.advance(literal);
        rendered.push_str(literal);
        rendered.push_str(&expand(&caps, quotes.context, &mut on_placeholder)?);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

fn expand<F>(
    caps: &Captures<'_>,
    context: QuoteContext,
    on_placeholder: &mut F,
) -> LaunchResult<String>
where
    F: FnMut(&str, QuoteContext) -> LaunchResult<String>,
{
    match caps.get(1) {
        Some(name) => on_placeholder(name.as_str(), context),
        None if &caps[0] == "{{" => Ok("{".to_string()),
        None => Ok("}".to_string()),
    }
}

/// Names referenced by `{name}` placeholders, in order of first appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}

/// Render a command template by substituting every placeholder with its resolved value.
///
/// Fails with `UnresolvedPlaceholder` if the template references a name absent from
/// `params`.
pub fn render_command(
    template: &str,
    params: &ResolvedParameters,
    quoting: Quoting,
) -> LaunchResult<String> {
    substitute(template, |name, context| {
        let value = params
            .get(name)
            .ok_or_else(|| LaunchError::UnresolvedPlaceholder(name.to_string()))?
            .to_string();
        match quoting {
            Quoting::None => Ok(value),
            Quoting::Shell => shell_quote(&value, context).map_err(|e| {
                LaunchError::ParseError(format!(
                    "value of '{}' cannot be shell-quoted: {}",
                    name, e
                ))
            }),
        }
    })
}

/// Quote `value` so the shell reads it back verbatim inside the given context
fn shell_quote(value: &str, context: QuoteContext) -> Result<String, shlex::QuoteError> {
    if value.contains('\0') {
        return Err(shlex::QuoteError::Nul);
    }
    Ok(match context {
        QuoteContext::Bare => shlex::try_quote(value)?.into_owned(),
        QuoteContext::Single => value.replace('\'', r"'\''"),
        QuoteContext::Double => {
            let mut quoted = String::with_capacity(value.len());
            for c in value.chars() {
                if matches!(c, '\\' | '"' | '$' | '`') {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
            quoted
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterValue;

    fn params(pairs: &[(&str, ParameterValue)]) -> ResolvedParameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_int_parameter() {
        let resolved = params(&[("batch_size", ParameterValue::Int(64))]);
        assert_eq!(
            render_command("-b {batch_size}", &resolved, Quoting::None).unwrap(),
            "-b 64"
        );
    }

    #[test]
    fn test_render_keeps_glob_pattern() {
        let resolved = params(&[
            ("datadir", ParameterValue::String("/data".to_string())),
            ("datasize", ParameterValue::String("5GB".to_string())),
        ]);
        assert_eq!(
            render_command("{datadir}/{datasize}/202???01T*.nc", &resolved, Quoting::None)
                .unwrap(),
            "/data/5GB/202???01T*.nc"
        );
    }

    #[test]
    fn test_unknown_placeholder() {
        let resolved = params(&[("datadir", ParameterValue::String("/data".to_string()))]);
        let err = render_command("{datadir} {unknown}", &resolved, Quoting::None).unwrap_err();
        assert!(matches!(err, LaunchError::UnresolvedPlaceholder(ref n) if n == "unknown"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let resolved = params(&[
            ("nepochs", ParameterValue::Int(3)),
            ("lr", ParameterValue::Float(0.5)),
        ]);
        let template = "python benchmark.py -e {nepochs} --lr {lr} {nepochs}";
        let first = render_command(template, &resolved, Quoting::None).unwrap();
        let second = render_command(template, &resolved, Quoting::None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "python benchmark.py -e 3 --lr 0.5 3");
    }

    #[test]
    fn test_escaped_braces() {
        let resolved = params(&[("name", ParameterValue::String("x".to_string()))]);
        assert_eq!(
            render_command("echo {{name}} {name} }}", &resolved, Quoting::None).unwrap(),
            "echo {name} x }"
        );
    }

    #[test]
    fn test_non_identifier_braces_are_literal() {
        let resolved = ResolvedParameters::default();
        assert_eq!(
            render_command("awk '{ print $1 }' {0}", &resolved, Quoting::None).unwrap(),
            "awk '{ print $1 }' {0}"
        );
    }

    #[test]
    fn test_shell_quoting() {
        let resolved = params(&[
            ("tag", ParameterValue::String("two words".to_string())),
            ("n", ParameterValue::Int(2)),
        ]);
        assert_eq!(
            render_command("run --tag {tag} -n {n}", &resolved, Quoting::Shell).unwrap(),
            "run --tag 'two words' -n 2"
        );
    }

    #[test]
    fn test_shell_quoting_inside_double_quotes() {
        let resolved = params(&[(
            "datadir",
            ParameterValue::String("/my \"data\" $HOME".to_string()),
        )]);
        let rendered =
            render_command("ls \"{datadir}/*.nc\"", &resolved, Quoting::Shell).unwrap();
        assert_eq!(rendered, r#"ls "/my \"data\" \$HOME/*.nc""#);
        assert_eq!(
            shlex::split(&rendered).unwrap(),
            vec!["ls", "/my \"data\" $HOME/*.nc"]
        );
    }

    #[test]
    fn test_shell_quoting_inside_single_quotes() {
        let resolved = params(&[("tag", ParameterValue::String("it's here".to_string()))]);
        let rendered = render_command("echo '{tag}'", &resolved, Quoting::Shell).unwrap();
        assert_eq!(rendered, r"echo 'it'\''s here'");
        assert_eq!(shlex::split(&rendered).unwrap(), vec!["echo", "it's here"]);
    }

    #[test]
    fn test_escaped_quote_does_not_open_quotes() {
        let resolved = params(&[("tag", ParameterValue::String("a b".to_string()))]);
        assert_eq!(
            render_command(r#"echo \"{tag}"#, &resolved, Quoting::Shell).unwrap(),
            r#"echo \"'a b'"#
        );
    }

    #[test]
    fn test_shell_quoting_rejects_nul() {
        let resolved = params(&[("tag", ParameterValue::String("a\0b".to_string()))]);
        let err = render_command("echo \"{tag}\"", &resolved, Quoting::Shell).unwrap_err();
        assert!(err.to_string().contains("cannot be shell-quoted"));
    }

    #[test]
    fn test_placeholders_in_order_without_duplicates() {
        assert_eq!(
            placeholders("{b} {a} {b} {{c}} {d}"),
            vec!["b".to_string(), "a".to_string(), "d".to_string()]
        );
    }
}
