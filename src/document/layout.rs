use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use yaml_rust2::{
    parser::{Event, MarkedEventReceiver, Parser},
    scanner::{Marker, TScalarStyle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::SingleQuoted => Self::SingleQuoted,
            TScalarStyle::DoubleQuoted => Self::DoubleQuoted,
            TScalarStyle::Literal => Self::Literal,
            TScalarStyle::Folded => Self::Folded,
            _ => Self::Plain,
        }
    }
}

/// A scalar as written in the source file
#[derive(Debug, Clone)]
pub(crate) struct SourceScalar {
    pub(crate) style: ScalarStyle,
    /// The scalar text before any type resolution, e.g. `1.20` for a value loaded as 1.2
    pub(crate) text: String,
    /// What the scalar loaded as, used to tell whether it was changed since
    pub(crate) value: Value,
}

/// How a YAML file was written: the style and text of every scalar, keyed by JSON pointer, and
/// the block indentation
#[derive(Debug, Clone)]
pub(crate) struct SourceLayout {
    scalars: HashMap<String, SourceScalar>,
    key_styles: HashMap<String, ScalarStyle>,
    pub(crate) indent: usize,
    /// `key:\n  - item` rather than `key:\n- item`
    pub(crate) indent_sequences: bool,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            scalars: HashMap::new(),
            key_styles: HashMap::new(),
            indent: 2,
            indent_sequences: false,
        }
    }
}

pub(crate) fn child_path(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, key.replace('~', "~0").replace('/', "~1"))
}

impl SourceLayout {
    /// Record the layout of `contents`, which loaded as `root`
    pub(crate) fn scan(contents: &str, root: &Value) -> Result<Self> {
        let mut receiver = LayoutReceiver {
            source: contents.chars().collect(),
            ..Default::default()
        };

        Parser::new(contents.chars())
            .load(&mut receiver, false)
            .context("scanning yaml layout")?;

        let scalars = receiver
            .scalars
            .into_iter()
            .filter_map(|(path, (style, text))| {
                let value = root.pointer(&path)?.clone();
                Some((path, SourceScalar { style, text, value }))
            })
            .collect();

        let defaults = Self::default();

        Ok(Self {
            scalars,
            key_styles: receiver.key_styles,
            indent: receiver.indent.unwrap_or(defaults.indent),
            indent_sequences: receiver.indent_sequences.unwrap_or(defaults.indent_sequences),
        })
    }

    pub(crate) fn scalar(&self, path: &str) -> Option<&SourceScalar> {
        self.scalars.get(path)
    }

    /// Style of the key of the mapping entry at `path`
    pub(crate) fn key_style(&self, path: &str) -> Option<ScalarStyle> {
        self.key_styles.get(path).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    col: usize,
}

impl From<Marker> for Position {
    fn from(marker: Marker) -> Self {
        Self {
            line: marker.line(),
            col: marker.col(),
        }
    }
}

enum Frame {
    Mapping {
        path: String,
        key: Option<(String, Position)>,
        parent_key: Option<Position>,
    },
    Sequence {
        path: String,
        index: usize,
    },
}

#[derive(Default)]
struct LayoutReceiver {
    source: Vec<char>,
    frames: Vec<Frame>,
    // Depth inside a complex (non-scalar) mapping key, which has no pointer of its own
    skip_depth: usize,
    scalars: HashMap<String, (ScalarStyle, String)>,
    key_styles: HashMap<String, ScalarStyle>,
    indent: Option<usize>,
    indent_sequences: Option<bool>,
}

impl LayoutReceiver {
    fn in_key_position(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Mapping { key: None, .. }))
    }

    fn value_path(&self) -> String {
        match self.frames.last() {
            None => String::new(),
            Some(Frame::Mapping { path, key, .. }) => child_path(path, key.as_ref().map_or("", |(key, _)| key.as_str())),
            Some(Frame::Sequence { path, index }) => format!("{path}/{index}"),
        }
    }

    fn current_key(&self) -> Option<Position> {
        match self.frames.last() {
            Some(Frame::Mapping { key: Some((_, position)), .. }) => Some(*position),
            _ => None,
        }
    }

    fn node_done(&mut self) {
        match self.frames.last_mut() {
            Some(Frame::Mapping { key, .. }) => *key = None,
            Some(Frame::Sequence { index, .. }) => *index += 1,
            None => {}
        }
    }

    fn key(&mut self, text: String, style: ScalarStyle, position: Position) {
        let Some(Frame::Mapping { path, key, parent_key }) = self.frames.last_mut() else {
            return;
        };

        if let Some(parent_key) = parent_key {
            if self.indent.is_none() && position.line > parent_key.line && position.col > parent_key.col {
                self.indent = Some(position.col - parent_key.col);
            }
        }

        self.key_styles.insert(child_path(path, &text), style);
        *key = Some((text, position));
    }
}

impl MarkedEventReceiver for LayoutReceiver {
    fn on_event(&mut self, event: Event, marker: Marker) {
        let index = marker.index();
        let position = Position::from(marker);

        if self.skip_depth > 0 {
            match event {
                Event::MappingStart(..) | Event::SequenceStart(..) => self.skip_depth += 1,
                Event::MappingEnd | Event::SequenceEnd => {
                    self.skip_depth -= 1;
                    if self.skip_depth == 0 {
                        self.node_done();
                    }
                }
                _ => {}
            }
            return;
        }

        match event {
            Event::Scalar(mut text, style, ..) => {
                // An empty node is reported as a plain `~`
                if matches!(style, TScalarStyle::Plain) && text == "~" && self.source.get(index) != Some(&'~') {
                    text.clear();
                }

                if self.in_key_position() {
                    self.key(text, style.into(), position);
                    return;
                }

                let path = self.value_path();
                self.scalars.insert(path, (style.into(), text));
                self.node_done();
            }
            Event::Alias(..) => {
                if self.in_key_position() {
                    self.key(String::new(), ScalarStyle::Plain, position);
                    return;
                }

                self.node_done();
            }
            Event::MappingStart(..) | Event::SequenceStart(..) if self.in_key_position() => self.skip_depth = 1,
            Event::MappingStart(..) => {
                let frame = Frame::Mapping {
                    path: self.value_path(),
                    key: None,
                    parent_key: self.current_key(),
                };
                self.frames.push(frame);
            }
            Event::SequenceStart(..) => {
                // Only block sequences start on a later line than their key
                if let Some(key) = self.current_key().filter(|key| position.line > key.line) {
                    self.indent_sequences.get_or_insert(position.col > key.col);
                }

                let frame = Frame::Sequence {
                    path: self.value_path(),
                    index: 0,
                };
                self.frames.push(frame);
            }
            Event::MappingEnd | Event::SequenceEnd => {
                self.frames.pop();
                self.node_done();
            }
            _ => {}
        }
    }
}
