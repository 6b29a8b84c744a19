//! CSV import.
//!
//! The first line is a header naming the columns; every other non-empty line
//! is one tuple. Unquoted fields that parse as integers become `Long`,
//! everything else is a `String`. Quoted fields may contain the delimiter and
//! `""` for a literal quote.
//!
//! ```csv
//! id,label
//! 1,Person
//! 2,"Person"
//! ```

use crate::error::ImportError;
use crate::value::{Tuple, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Header and tuples of a CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct CsvData {
    pub header: Vec<String>,
    pub tuples: Vec<Tuple>,
}

/// Load a CSV file; every row must have as many fields as the header
pub fn load_csv(path: &Path) -> Result<CsvData, ImportError> {
    let display = path.display().to_string();
    let io_error = |source| ImportError::Io {
        path: display.clone(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_error)?);

    let mut header = Vec::new();
    let mut tuples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_line(&line).map_err(|message| ImportError::Row {
            path: display.clone(),
            line: index + 1,
            message,
        })?;
        if header.is_empty() {
            header = fields.into_iter().map(|f| f.text).collect();
            continue;
        }
        if fields.len() != header.len() {
            return Err(ImportError::Row {
                path: display.clone(),
                line: index + 1,
                message: format!("{} field(s), header has {}", fields.len(), header.len()),
            });
        }
        tuples.push(Tuple::new(fields.into_iter().map(Field::into_value).collect()));
    }
    tracing::debug!(path = %path.display(), rows = tuples.len(), "csv_loaded");
    Ok(CsvData { header, tuples })
}

struct Field {
    text: String,
    quoted: bool,
}

impl Field {
    fn into_value(self) -> Value {
        if !self.quoted {
            if let Ok(n) = self.text.parse::<i64>() {
                return Value::Long(n);
            }
        }
        Value::String(self.text)
    }
}

fn split_line(line: &str) -> Result<Vec<Field>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
            chars.next();
        }
        let mut text = String::new();
        let quoted = chars.peek() == Some(&QUOTE);
        if quoted {
            chars.next();
            loop {
                match chars.next() {
                    Some(QUOTE) if chars.peek() == Some(&QUOTE) => {
                        chars.next();
                        text.push(QUOTE);
                    }
                    Some(QUOTE) => break,
                    Some(c) => text.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            }
            while let Some(c) = chars.peek() {
                match *c {
                    DELIMITER => break,
                    ' ' | '\t' => {
                        chars.next();
                    }
                    other => return Err(format!("unexpected '{other}' after quoted field")),
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == DELIMITER {
                    break;
                }
                text.push(*c);
                chars.next();
            }
            text = text.trim_end().to_string();
        }
        fields.push(Field { text, quoted });
        if chars.next().is_none() {
            return Ok(fields);
        }
    }
}
