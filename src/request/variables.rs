use std::fmt;

/// Positional arguments for one call of the target function
///
/// Items are kept verbatim (apart from surrounding whitespace) because they're spliced into the
/// generated script as unquoted literals, e.g. `3`, `'name'` or `[1 2 3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSet {
    items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    NotUtf8,
    Read(String),
    BlankLine { line: usize },
    EmptyItem { line: usize, position: usize },
    Unbalanced { line: usize, item: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InputError::*;
        match self {
            NotUtf8 => write!(f, "standard input is not valid UTF-8"),
            Read(err) => write!(f, "can't read standard input: {}", err),
            BlankLine { line } => write!(f, "line {}: blank line, expected variables", line),
            EmptyItem { line, position } => {
                write!(f, "line {}: variable {} is empty", line, position)
            }
            Unbalanced { line, item } => write!(
                f,
                "line {}: '{}' has unbalanced brackets or quotes",
                line, item
            ),
        }
    }
}

impl std::error::Error for InputError {}

impl VariableSet {
    /// Parse one comma separated line, `line_no` is 1-based and only used in errors
    pub fn parse(line_no: usize, line: &str) -> Result<VariableSet, InputError> {
        if line.trim().is_empty() {
            return Err(InputError::BlankLine { line: line_no });
        }

        let items = line
            .split(',')
            .enumerate()
            .map(|(i, item)| {
                let item = item.trim();
                if item.is_empty() {
                    Err(InputError::EmptyItem { line: line_no, position: i + 1 })
                } else if !balanced(item) {
                    Err(InputError::Unbalanced { line: line_no, item: item.to_string() })
                } else {
                    Ok(item.to_string())
                }
            })
            .collect::<Result<Vec<String>, InputError>>()?;

        Ok(VariableSet { items })
    }

    /// Never empty: parsing rejects blank lines
    pub fn first(&self) -> &str {
        &self.items[0]
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Brackets must nest outside of string literals and every string must close
///
/// Both `'...'` and `"..."` strings are recognised, with `''` and `""` as escaped quotes. A `'`
/// right after an operand (identifier, number, closing bracket or quote) is the transpose
/// operator, not the start of a string.
fn balanced(item: &str) -> bool {
    let chars: Vec<char> = item.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' if i > 0 && ends_operand(chars[i - 1]) => {}
            '\'' | '"' => match closing_quote(&chars, i + 1, c) {
                Some(end) => i = end,
                None => return false,
            },
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }

    stack.is_empty()
}

fn ends_operand(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ')' | ']' | '}' | '\'' | '"')
}

/// Index of the quote closing a string that starts at `from`, skipping doubled quotes
fn closing_quote(chars: &[char], from: usize, quote: char) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}
