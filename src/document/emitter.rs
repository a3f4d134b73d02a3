use super::layout::{child_path, ScalarStyle, SourceLayout};
use serde_json::{Map, Value};
use std::fmt::Write;

/// YAML 1.1 spellings other tools may still read as booleans or null
const AMBIGUOUS_PLAIN: [&str; 10] = ["y", "n", "yes", "no", "on", "off", "true", "false", "null", "~"];

enum Rendered<'a> {
    Inline(String),
    Literal(&'a str),
}

/// Block style YAML for `root`. Scalars that still hold the value they were loaded with are
/// written exactly as in the source, new or changed ones get a style that keeps their type.
pub(crate) fn emit(root: &Value, layout: &SourceLayout) -> String {
    let mut emitter = Emitter {
        layout,
        out: String::new(),
    };

    match root {
        Value::Object(map) if !map.is_empty() => emitter.mapping(map, "", 0, false),
        Value::Array(items) if !items.is_empty() => emitter.sequence(items, "", 0, false),
        scalar => match emitter.render(scalar, "") {
            Rendered::Inline(text) => {
                emitter.out.push_str(&text);
                emitter.out.push('\n');
            }
            Rendered::Literal(text) => emitter.literal(text, 2),
        },
    }

    emitter.out
}

struct Emitter<'a> {
    layout: &'a SourceLayout,
    out: String,
}

impl Emitter<'_> {
    fn indent(&mut self, col: usize) {
        self.out.extend(std::iter::repeat(' ').take(col));
    }

    /// With `inline`, the first entry continues a line that already holds a `- `
    fn mapping(&mut self, map: &Map<String, Value>, path: &str, col: usize, inline: bool) {
        for (position, (key, value)) in map.iter().enumerate() {
            if !inline || position > 0 {
                self.indent(col);
            }

            let child = child_path(path, key);
            let key = self.key(key, &child);
            self.out.push_str(&key);
            self.out.push(':');

            match value {
                Value::Object(nested) if !nested.is_empty() => {
                    self.out.push('\n');
                    self.mapping(nested, &child, col + self.layout.indent, false);
                }
                Value::Array(items) if !items.is_empty() => {
                    self.out.push('\n');
                    let col = if self.layout.indent_sequences { col + self.layout.indent } else { col };
                    self.sequence(items, &child, col, false);
                }
                scalar => self.scalar(scalar, &child, col + self.layout.indent),
            }
        }
    }

    fn sequence(&mut self, items: &[Value], path: &str, col: usize, inline: bool) {
        for (index, item) in items.iter().enumerate() {
            if !inline || index > 0 {
                self.indent(col);
            }

            self.out.push('-');
            let child = format!("{path}/{index}");

            match item {
                Value::Object(map) if !map.is_empty() => {
                    self.out.push(' ');
                    self.mapping(map, &child, col + 2, true);
                }
                Value::Array(nested) if !nested.is_empty() => {
                    self.out.push(' ');
                    self.sequence(nested, &child, col + 2, true);
                }
                scalar => self.scalar(scalar, &child, col + 2),
            }
        }
    }

    /// The rest of the line after `key:` or `-`. Block scalar lines go at `block_col`.
    fn scalar(&mut self, value: &Value, path: &str, block_col: usize) {
        match self.render(value, path) {
            Rendered::Inline(text) if text.is_empty() => self.out.push('\n'),
            Rendered::Inline(text) => {
                self.out.push(' ');
                self.out.push_str(&text);
                self.out.push('\n');
            }
            Rendered::Literal(text) => self.literal(text, block_col),
        }
    }

    fn literal(&mut self, text: &str, col: usize) {
        let body = text.strip_suffix('\n');
        let chomping = match body {
            None => "-",
            Some(rest) if rest.is_empty() || rest.ends_with('\n') => "+",
            Some(_) => "",
        };

        self.out.push_str(" |");
        self.out.push_str(chomping);
        self.out.push('\n');

        for line in body.unwrap_or(text).split('\n') {
            if !line.is_empty() {
                self.indent(col);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    fn key(&self, key: &str, path: &str) -> String {
        match self.layout.key_style(path) {
            Some(ScalarStyle::Plain) => key.to_string(),
            Some(style @ (ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)) => quoted(style, key),
            _ if is_plain_safe(key) => key.to_string(),
            _ => quoted(ScalarStyle::SingleQuoted, key),
        }
    }

    fn render<'v>(&self, value: &'v Value, path: &str) -> Rendered<'v> {
        let source = self.layout.scalar(path);

        if let Some(source) = source.filter(|source| source.value == *value) {
            match (source.style, value) {
                (ScalarStyle::Plain, _) => return Rendered::Inline(source.text.clone()),
                (style @ (ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted), _) => {
                    return Rendered::Inline(quoted(style, &source.text))
                }
                (ScalarStyle::Literal | ScalarStyle::Folded, Value::String(text)) if is_literal_safe(text) => {
                    return Rendered::Literal(text)
                }
                _ => {}
            }
        }

        match value {
            Value::String(text) => match source.map(|source| source.style) {
                Some(style @ (ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)) => Rendered::Inline(quoted(style, text)),
                Some(ScalarStyle::Literal | ScalarStyle::Folded) if is_literal_safe(text) => Rendered::Literal(text),
                _ => render_string(text),
            },
            Value::Null => Rendered::Inline("null".to_string()),
            Value::Bool(boolean) => Rendered::Inline(boolean.to_string()),
            Value::Number(number) => Rendered::Inline(number.to_string()),
            Value::Array(_) => Rendered::Inline("[]".to_string()),
            Value::Object(_) => Rendered::Inline("{}".to_string()),
        }
    }
}

fn render_string(text: &str) -> Rendered<'_> {
    if is_plain_safe(text) {
        Rendered::Inline(text.to_string())
    } else if text.contains('\n') && is_literal_safe(text) {
        Rendered::Literal(text)
    } else {
        Rendered::Inline(quoted(ScalarStyle::SingleQuoted, text))
    }
}

/// Single quotes can't carry escapes, such text falls back to double quotes
fn quoted(style: ScalarStyle, text: &str) -> String {
    if style == ScalarStyle::SingleQuoted && !text.chars().any(char::is_control) {
        return format!("'{}'", text.replace('\'', "''"));
    }

    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');

    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }

    out.push('"');
    out
}

/// Text that reads back as the same string when written without quotes
fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };

    if text.trim() != text || text.chars().any(char::is_control) {
        return false;
    }

    if "-?:,[]{}#&*!|>'\"%@`.+".contains(first) || first.is_ascii_digit() {
        return false;
    }

    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }

    if AMBIGUOUS_PLAIN.contains(&text.to_ascii_lowercase().as_str()) {
        return false;
    }

    serde_yaml::from_str::<serde_yaml::Value>(text).is_ok_and(|parsed| parsed == serde_yaml::Value::String(text.to_string()))
}

/// Leading whitespace would need an explicit indentation indicator
fn is_literal_safe(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with([' ', '\t', '\n'])
        && !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t')
}
