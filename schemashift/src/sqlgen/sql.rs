use std::fmt::{Display, Formatter};

use crate::change::DatabaseObject;

/// One generated statement with the objects it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sql {
    text: String,
    end_delimiter: String,
    affected: Vec<DatabaseObject>,
}

impl Sql {
    pub fn new(text: &str) -> Self {
        Sql {
            text: text.trim().to_string(),
            end_delimiter: ";".to_string(),
            affected: Vec::new(),
        }
    }

    pub fn with_end_delimiter(mut self, delimiter: &str) -> Self {
        self.end_delimiter = delimiter.to_string();
        self
    }

    pub fn affecting(mut self, object: DatabaseObject) -> Self {
        if !self.affected.contains(&object) {
            self.affected.push(object);
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn end_delimiter(&self) -> &str {
        &self.end_delimiter
    }

    pub fn affected_objects(&self) -> &[DatabaseObject] {
        &self.affected
    }
}

impl Display for Sql {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.text, self.end_delimiter)
    }
}

/// Splits SQL text on `;` outside quoted strings, identifiers and comments.
/// Comments are dropped, `--` up to the line end and `/* */` blocks, and so
/// are empty statements.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    // line comment
                    for next in chars.by_ref() {
                        if next == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut previous = None;
                    for next in chars.by_ref() {
                        if previous == Some('*') && next == '/' {
                            break;
                        }
                        previous = Some(next);
                    }
                    current.push(' ');
                }
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
