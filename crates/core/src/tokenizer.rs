//! POSIX-like word splitting for command lines.
//!
//! Supports single quotes (no escapes inside), double quotes (backslash
//! escapes `"`, `\`, `$` and `` ` ``) and backslash escapes outside quotes.
//! Quoted segments glued to unquoted text form a single word, and an empty
//! pair of quotes yields an empty word.

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    None,
    Single,
    Double,
}

/// Split `line` into words.
///
/// Fails on unterminated quoting or a dangling backslash, and when the line
/// holds no words at all.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    // a word can be empty ("") so track its presence separately
    let mut in_word = false;
    let mut quoting = Quoting::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quoting {
            Quoting::None => match c {
                '\'' => {
                    quoting = Quoting::Single;
                    in_word = true;
                }
                '"' => {
                    quoting = Quoting::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars.next().ok_or(CoreError::UnterminatedEscape)?;
                    current.push(escaped);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            Quoting::Single => match c {
                '\'' => quoting = Quoting::None,
                c => current.push(c),
            },
            Quoting::Double => match c {
                '"' => quoting = Quoting::None,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\' | '$' | '`')) => current.push(e),
                    Some('\n') => {}
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(CoreError::UnterminatedEscape),
                },
                c => current.push(c),
            },
        }
    }

    match quoting {
        Quoting::Single => return Err(CoreError::UnterminatedSingleQuote),
        Quoting::Double => return Err(CoreError::UnterminatedDoubleQuote),
        Quoting::None => {}
    }

    if in_word {
        words.push(current);
    }

    if words.is_empty() {
        return Err(CoreError::EmptyCommandLine);
    }

    Ok(words)
}
