//! Template data used to render queries, legends and value texts.
//!
//! Templates use the Go template action syntax of dashboard files:
//! `{{ .name }}` reads a key, `{{ if (lt .value 1.0) }}DOWN{{ else }}UP{{ end }}`
//! branches and `{{ printf "%.1f" .value }}` formats. Actions are translated
//! to Jinja and rendered with `minijinja`. Data comes in layers merged with
//! [`TemplateData::with`], where the layer applied last wins on key
//! collisions:
//!
//! ```text
//!   static (dashboard)  ──with──▶  sync (tick)  ──with──▶  override (user)
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use minijinja::value::{Rest, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template {template:?}: {reason}")]
    Syntax { template: String, reason: String },
    #[error("error rendering template: {0:#}")]
    Render(#[from] Error),
}

/// Immutable key/value environment for template rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateData(BTreeMap<String, Value>);

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `key` set to `value`. Numbers stay numbers so
    /// templates can compare them.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Shallow merge: keys of `other` overwrite the keys of `self`.
    pub fn with(&self, other: &TemplateData) -> TemplateData {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        TemplateData(merged)
    }

    /// The string value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render `template` against the data. Unknown keys render as the
    /// empty string.
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        if !template.contains("{{") {
            return Ok(template.to_string());
        }
        let source = translate(template).map_err(|reason| TemplateError::Syntax {
            template: template.to_string(),
            reason,
        })?;
        Ok(ENV.render_str(&source, &self.0)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TemplateData(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::from(Into::<String>::into(v))))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for TemplateData {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

static ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.set_formatter(|out, state, value| {
        // Whole floats print without a fraction, like integers.
        if value.is_number() && !value.is_integer() {
            if let Ok(f) = f64::try_from(value.clone()) {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    return write!(out, "{}", f as i64)
                        .map_err(|_| Error::new(ErrorKind::WriteFailure, "formatter failed"));
                }
            }
        }
        minijinja::escape_formatter(out, state, value)
    });
    env.add_function("printf", printf);
    env.add_function("print", print);
    env
});

fn print(args: Rest<Value>) -> String {
    args.iter().map(ToString::to_string).collect()
}

/// `printf` with the common verbs: `%v %s %q %d %f %e %g %x %%`, flags
/// `-`, `+`, `0`, width and precision.
fn printf(format: String, args: Rest<Value>) -> Result<String, Error> {
    let invalid = |msg: String| Error::new(ErrorKind::InvalidOperation, msg);
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let (mut left, mut plus, mut zero) = (false, false, false);
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '+' => plus = true,
                '0' => zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            width.push(d);
        }
        let mut precision = None;
        if chars.next_if_eq(&'.').is_some() {
            let mut p = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                p.push(d);
            }
            precision = Some(p.parse::<usize>().unwrap_or(0));
        }
        let verb = chars
            .next()
            .ok_or_else(|| invalid(format!("printf: {format:?} ends with %")))?;
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = args
            .next()
            .ok_or_else(|| invalid(format!("printf: missing argument for %{verb}")))?;
        let number = || {
            f64::try_from(arg.clone())
                .map_err(|_| invalid(format!("printf: %{verb} needs a number, got {arg}")))
        };
        let mut text = match verb {
            'v' | 's' => arg.to_string(),
            'q' => format!("{:?}", arg.to_string()),
            'd' => {
                let n = i64::try_from(arg.clone())
                    .map_err(|_| invalid(format!("printf: %d needs an integer, got {arg}")))?;
                n.to_string()
            }
            'x' => {
                let n = i64::try_from(arg.clone())
                    .map_err(|_| invalid(format!("printf: %x needs an integer, got {arg}")))?;
                format!("{n:x}")
            }
            'f' | 'F' => format!("{:.*}", precision.unwrap_or(6), number()?),
            'e' => format!("{:.*e}", precision.unwrap_or(6), number()?),
            'g' => match precision {
                Some(p) => format!("{:.*}", p, number()?),
                None => number()?.to_string(),
            },
            other => return Err(invalid(format!("printf: unsupported verb %{other}"))),
        };
        if plus && matches!(verb, 'd' | 'f' | 'F' | 'e' | 'g') && !text.starts_with('-') {
            text.insert(0, '+');
        }

        let width = width.parse::<usize>().unwrap_or(0);
        let pad = width.saturating_sub(text.chars().count());
        if pad == 0 {
            out.push_str(&text);
        } else if left {
            out.push_str(&text);
            out.push_str(&" ".repeat(pad));
        } else if zero {
            let (sign, digits) = match text.strip_prefix(['-', '+']) {
                Some(digits) => (&text[..1], digits),
                None => ("", text.as_str()),
            };
            let _ = write!(out, "{sign}{}{digits}", "0".repeat(pad));
        } else {
            out.push_str(&" ".repeat(pad));
            out.push_str(&text);
        }
    }
    Ok(out)
}

/// Translate Go template actions into a Jinja template.
fn translate(template: &str) -> Result<String, String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut open_ifs = 0usize;
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        push_text(&mut out, &rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| "unclosed action".to_string())?;
        let mut action = &after_open[..close];
        rest = &after_open[close + 2..];

        let trim_left = match action.strip_prefix("- ") {
            Some(a) => {
                action = a;
                "-"
            }
            None => "",
        };
        let trim_right = match action.strip_suffix(" -") {
            Some(a) => {
                action = a;
                "-"
            }
            None => "",
        };
        let action = action.trim();

        let tag = |body: String| format!("{{%{trim_left} {body} {trim_right}%}}");
        if action.starts_with("/*") {
            continue;
        } else if let Some(cond) = keyword_arg(action, "if") {
            open_ifs += 1;
            out.push_str(&tag(format!("if {}", expression(cond)?)));
        } else if let Some(cond) = action
            .strip_prefix("else")
            .and_then(|a| keyword_arg(a.trim_start(), "if"))
        {
            if open_ifs == 0 {
                return Err("else if outside of if".into());
            }
            out.push_str(&tag(format!("elif {}", expression(cond)?)));
        } else if action == "else" {
            if open_ifs == 0 {
                return Err("else outside of if".into());
            }
            out.push_str(&tag("else".into()));
        } else if action == "end" {
            open_ifs = open_ifs
                .checked_sub(1)
                .ok_or_else(|| "unexpected end".to_string())?;
            out.push_str(&tag("endif".into()));
        } else {
            let first = action.split_whitespace().next().unwrap_or_default();
            if matches!(
                first,
                "range" | "with" | "define" | "template" | "block" | "break" | "continue"
            ) {
                return Err(format!("unsupported action {first:?}"));
            }
            let expr = expression(action)?;
            out.push_str(&format!("{{{{{trim_left} {expr} {trim_right}}}}}"));
        }
    }
    push_text(&mut out, rest);

    if open_ifs > 0 {
        return Err("missing end".into());
    }
    Ok(out)
}

/// Text outside actions. Jinja block and comment openers are escaped.
fn push_text(out: &mut String, text: &str) {
    if text.contains("{%") || text.contains("{#") {
        out.push_str("{% raw %}");
        out.push_str(text);
        out.push_str("{% endraw %}");
    } else {
        out.push_str(text);
    }
}

/// The argument of `keyword` when `action` starts with it.
fn keyword_arg<'a>(action: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = action.strip_prefix(keyword)?;
    if rest.starts_with([' ', '(']) {
        Some(rest.trim())
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Pipe,
    /// Jinja ready literal: string, number or constant.
    Literal(String),
    /// `.a.b` field access, without the leading dot.
    Field(String),
    Ident(String),
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    let ident_char = |c: &char| c.is_ascii_alphanumeric() || *c == '_';

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                let mut lit = String::from(chars.next().unwrap_or('"'));
                loop {
                    let c = chars.next().ok_or("unterminated string")?;
                    lit.push(c);
                    match c {
                        '\\' => lit.push(chars.next().ok_or("unterminated string")?),
                        '"' => break,
                        _ => {}
                    }
                }
                tokens.push(Token::Literal(lit));
            }
            '`' => {
                chars.next();
                let mut raw = String::new();
                loop {
                    match chars.next().ok_or("unterminated raw string")? {
                        '`' => break,
                        c => raw.push(c),
                    }
                }
                tokens.push(Token::Literal(format!("{raw:?}")));
            }
            '.' => {
                let mut path = String::new();
                while chars.next_if_eq(&'.').is_some() {
                    let mut name = String::new();
                    while let Some(c) = chars.next_if(ident_char) {
                        name.push(c);
                    }
                    if name.is_empty() {
                        return Err("unsupported use of \".\"".into());
                    }
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(&name);
                }
                tokens.push(Token::Field(path));
            }
            '0'..='9' | '-' | '+' => {
                let mut num = String::new();
                while let Some(c) = chars.next_if(|c| {
                    c.is_ascii_alphanumeric() || matches!(*c, '.' | '-' | '+' | '_')
                }) {
                    num.push(c);
                }
                if num.parse::<f64>().is_err() && num.parse::<i64>().is_err() {
                    return Err(format!("invalid number {num:?}"));
                }
                tokens.push(Token::Literal(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.next_if(ident_char) {
                    name.push(c);
                }
                tokens.push(match name.as_str() {
                    "true" | "false" => Token::Literal(name),
                    "nil" => Token::Literal("none".into()),
                    _ => Token::Ident(name),
                });
            }
            '$' => return Err("template variables are not supported".into()),
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(tokens)
}

/// Translate a Go pipeline into a Jinja expression.
fn expression(expr: &str) -> Result<String, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty action".into());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let out = parser.pipeline()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected \")\"".into());
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn pipeline(&mut self) -> Result<String, String> {
        let mut acc = self.command(None)?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            acc = self.command(Some(acc))?;
        }
        Ok(acc)
    }

    fn command(&mut self, piped: Option<String>) -> Result<String, String> {
        let head = match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Some(name)
            }
            _ => None,
        };

        let mut args = Vec::new();
        while !matches!(self.peek(), None | Some(Token::Close) | Some(Token::Pipe)) {
            args.push(self.operand()?);
        }
        args.extend(piped);

        match head {
            Some(name) => call(&name, args),
            None => match <[String; 1]>::try_from(args) {
                Ok([single]) => Ok(single),
                Err(args) if args.is_empty() => Err("missing value".into()),
                Err(_) => Err("can't give arguments to a non-function".into()),
            },
        }
    }

    fn operand(&mut self) -> Result<String, String> {
        let token = self.peek().cloned().ok_or("missing value")?;
        self.pos += 1;
        match token {
            Token::Open => {
                let inner = self.pipeline()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("unclosed \"(\"".into());
                }
                self.pos += 1;
                Ok(format!("({inner})"))
            }
            Token::Literal(lit) => Ok(lit),
            Token::Field(path) => Ok(path),
            Token::Ident(name) => call(&name, Vec::new()),
            Token::Close | Token::Pipe => Err("missing value".into()),
        }
    }
}

/// A Go builtin as a Jinja expression. A bare unknown identifier reads the
/// key of the same name.
fn call(name: &str, args: Vec<String>) -> Result<String, String> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("{name} expects {n} arguments, got {}", args.len()))
        }
    };
    let compare = |op: &str| -> Result<String, String> {
        arity(2)?;
        Ok(format!("({} {op} {})", args[0], args[1]))
    };

    match name {
        "lt" => compare("<"),
        "le" => compare("<="),
        "gt" => compare(">"),
        "ge" => compare(">="),
        "ne" => compare("!="),
        "eq" => {
            let [first, rest @ ..] = args.as_slice() else {
                return Err("eq expects at least 2 arguments".into());
            };
            if rest.is_empty() {
                return Err("eq expects at least 2 arguments".into());
            }
            let alternatives: Vec<String> =
                rest.iter().map(|r| format!("{first} == {r}")).collect();
            Ok(format!("({})", alternatives.join(" or ")))
        }
        "and" | "or" if !args.is_empty() => {
            Ok(format!("({})", args.join(format!(" {name} ").as_str())))
        }
        "not" => {
            arity(1)?;
            Ok(format!("(not {})", args[0]))
        }
        "len" => {
            arity(1)?;
            Ok(format!("({} | length)", args[0]))
        }
        "index" if args.len() >= 2 => {
            let keys: String = args[1..].iter().map(|k| format!("[{k}]")).collect();
            Ok(format!("{}{keys}", args[0]))
        }
        "printf" | "print" => Ok(format!("{name}({})", args.join(", "))),
        _ if args.is_empty() => Ok(name.to_string()),
        _ => Err(format!("function {name:?} not defined")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_priority() {
        let static_data = TemplateData::from([("a", "1"), ("b", "2")]);
        let sync_data = TemplateData::from([("b", "3"), ("c", "4")]);
        let override_data = TemplateData::from([("c", "5")]);

        let merged = static_data.with(&sync_data).with(&override_data);
        assert_eq!(merged, TemplateData::from([("a", "1"), ("b", "3"), ("c", "5")]));
        // Layers are untouched.
        assert_eq!(sync_data.get("b"), Some("3"));
    }

    #[test]
    fn test_render() {
        let data = TemplateData::from([("job", "api"), ("__range", "1h")]);
        assert_eq!(
            data.render(r#"rate(http_total{job="{{ .job }}"}[{{.__range}}])"#)
                .unwrap(),
            r#"rate(http_total{job="api"}[1h])"#
        );
        assert_eq!(data.render("{{job}}-{{ job }}").unwrap(), "api-api");
        assert_eq!(data.render("no placeholders {a}").unwrap(), "no placeholders {a}");
    }

    #[test]
    fn test_render_unknown_key_is_empty() {
        let data = TemplateData::new().set("a", "x");
        assert_eq!(data.render("[{{ .missing }}] {{ .a }}").unwrap(), "[] x");
    }

    #[test]
    fn test_render_conditional() {
        let tpl = "{{ if (lt .value 1.0) }}DOWN{{else}}UP{{end}}";
        assert_eq!(TemplateData::new().set("value", 0.5).render(tpl).unwrap(), "DOWN");
        assert_eq!(TemplateData::new().set("value", 1.0).render(tpl).unwrap(), "UP");

        let chained = "{{ if eq .env \"prod\" \"live\" }}P{{ else if .env }}{{ .env }}{{ end }}";
        let data = TemplateData::new().set("env", "live");
        assert_eq!(data.render(chained).unwrap(), "P");
        let data = TemplateData::new().set("env", "dev");
        assert_eq!(data.render(chained).unwrap(), "dev");
        assert_eq!(TemplateData::new().render(chained).unwrap(), "");
    }

    #[test]
    fn test_render_printf() {
        let data = TemplateData::new().set("value", 19.14).set("name", "cpu");
        assert_eq!(
            data.render(r#"this is a test with {{printf "%.1f" .value}} value"#)
                .unwrap(),
            "this is a test with 19.1 value"
        );
        assert_eq!(
            data.render(r#"{{ .value | printf "%06.2f" }}|{{ printf "%-5s|%3d%%" .name 7 }}"#)
                .unwrap(),
            "019.14|cpu  |  7%"
        );
    }

    #[test]
    fn test_render_numbers() {
        let data = TemplateData::new().set("a", 2.0).set("b", 17.5);
        assert_eq!(data.render("{{ .a }} {{ .b }}").unwrap(), "2 17.5");
    }

    #[test]
    fn test_render_keeps_jinja_syntax_in_text() {
        let data = TemplateData::new().set("a", "x");
        assert_eq!(data.render("{# note #} {% {{ .a }}").unwrap(), "{# note #} {% x");
    }

    #[test]
    fn test_render_errors() {
        let data = TemplateData::new().set("a", "x");
        for tpl in [
            "open {{ .a",
            "{{ if .a }}never closed",
            "{{ end }}",
            "{{ else }}",
            "{{ range .a }}{{ end }}",
            "{{ frobnicate .a }}",
            "{{ lt .a }}",
            "{{ (.a }}",
            "{{ $x := .a }}",
        ] {
            let err = data.render(tpl).unwrap_err();
            assert!(
                matches!(err, TemplateError::Syntax { .. }),
                "{tpl}: {err}"
            );
        }
        assert!(matches!(
            data.render(r#"{{ printf "%d" .a }}"#),
            Err(TemplateError::Render(_))
        ));
    }
}
