//! Word Splitting
//!
//! The expansion scanner turns one raw word into a sequence of [`Piece`]s:
//! runs of text tagged with whether they were quoted and whether they came
//! from an unquoted expansion (and so are subject to IFS splitting), plus
//! hard field breaks between the elements of `"$@"`-style lists.
//!
//! [`split_pieces`] folds those pieces into the final fields. Each field
//! also carries a glob pattern in which quoted characters are escaped, so
//! pathname expansion only honours metacharacters that were unquoted.

use crate::interpreter::helpers::ifs::{Ifs, IfsClass};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text {
        text: String,
        /// Came from inside quotes (or a backslash escape)
        quoted: bool,
        /// Result of an unquoted expansion: IFS splitting applies
        splittable: bool,
    },
    /// Boundary between list elements (`"$@"`, `${arr[@]}`)
    Break,
}

impl Piece {
    pub fn literal(text: impl Into<String>) -> Self {
        Piece::Text {
            text: text.into(),
            quoted: false,
            splittable: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Piece::Text {
            text: text.into(),
            quoted: true,
            splittable: false,
        }
    }

    pub fn expanded(text: impl Into<String>, quoted: bool) -> Self {
        Piece::Text {
            text: text.into(),
            quoted,
            splittable: !quoted,
        }
    }
}

/// One output field of a word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub value: String,
    /// Pattern for pathname expansion, quoted metacharacters escaped
    pub glob_pattern: String,
    /// Some unquoted glob metacharacter is present
    pub globbable: bool,
}

impl Field {
    fn push(&mut self, text: &str, quoted: bool) {
        self.value.push_str(text);
        if quoted {
            self.glob_pattern.push_str(&glob::Pattern::escape(text));
        } else {
            if text.contains(['*', '?', '[']) {
                self.globbable = true;
            }
            self.glob_pattern.push_str(text);
        }
    }

    fn push_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.push(c.encode_utf8(&mut buf), false);
    }
}

struct FieldBuilder<'a> {
    ifs: &'a Ifs,
    fields: Vec<Field>,
    current: Option<Field>,
    /// The last separator seen was a non-whitespace delimiter (or the word
    /// just started), so another delimiter produces an empty field
    after_delimiter: bool,
}

impl<'a> FieldBuilder<'a> {
    fn new(ifs: &'a Ifs) -> Self {
        Self {
            ifs,
            fields: Vec::new(),
            current: None,
            after_delimiter: true,
        }
    }

    fn field(&mut self) -> &mut Field {
        self.after_delimiter = false;
        self.current.get_or_insert_with(Field::default)
    }

    fn finish_field(&mut self) {
        if let Some(field) = self.current.take() {
            self.fields.push(field);
        }
    }

    fn push_text(&mut self, text: &str, quoted: bool, splittable: bool) {
        if !splittable || self.ifs.is_empty() {
            if !text.is_empty() || quoted {
                self.field().push(text, quoted);
            }
            return;
        }
        for c in text.chars() {
            match self.ifs.classify(c) {
                IfsClass::Plain => self.field().push_char(c),
                IfsClass::Whitespace => {
                    if self.current.is_some() {
                        self.finish_field();
                    }
                }
                IfsClass::Delimiter => {
                    if self.current.is_some() {
                        self.finish_field();
                    } else if self.after_delimiter {
                        self.fields.push(Field::default());
                    }
                    self.after_delimiter = true;
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Field> {
        self.finish_field();
        self.fields
    }
}

/// Fold pieces into fields, splitting unquoted expansion text on IFS.
pub fn split_pieces(pieces: &[Piece], ifs: &Ifs) -> Vec<Field> {
    let mut builder = FieldBuilder::new(ifs);
    for piece in pieces {
        match piece {
            Piece::Text {
                text,
                quoted,
                splittable,
            } => builder.push_text(text, *quoted, *splittable),
            Piece::Break => {
                builder.finish_field();
                builder.after_delimiter = false;
            }
        }
    }
    builder.finish()
}

/// Concatenate pieces without splitting; list breaks become `sep`.
pub fn join_pieces(pieces: &[Piece], sep: &str) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text { text, .. } => out.push_str(text),
            Piece::Break => out.push_str(sep),
        }
    }
    out
}

/// Concatenate pieces into a shell pattern: quoted text is backslash-escaped
/// so it matches literally.
pub fn pieces_to_pattern(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text { text, quoted: true, .. } => {
                for c in text.chars() {
                    if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
            }
            Piece::Text { text, .. } => out.push_str(text),
            Piece::Break => out.push(' '),
        }
    }
    out
}
