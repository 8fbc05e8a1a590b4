//! Tabular text parsing for coefficient matrices and right-hand-side vectors
//!
//! Both parsers are fail-fast: the first malformed cell stops parsing and is
//! reported with its 1-based location.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while turning text into numeric data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("input is empty")]
    Empty,

    #[error("row {row} contains no values")]
    EmptyRow { row: usize },

    #[error("row {row}, column {column}: '{token}' is not a finite number")]
    InvalidCell {
        row: usize,
        column: usize,
        token: String,
    },

    #[error("matrix is not rectangular: row {row} has {found} values, expected {expected}")]
    NotRectangular {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("position {position}: '{token}' is not a finite number")]
    InvalidEntry { position: usize, token: String },
}

/// Where in the input a [`ParseError`] was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLocation {
    /// The input as a whole (empty input, non-rectangular shape)
    Input,
    /// A whole row
    Row { row: usize },
    /// A single matrix cell
    Cell { row: usize, column: usize },
    /// A token position in a vector
    Position(usize),
}

impl fmt::Display for ParseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseLocation::Input => write!(f, "input"),
            ParseLocation::Row { row } => write!(f, "row {}", row),
            ParseLocation::Cell { row, column } => write!(f, "row {}, column {}", row, column),
            ParseLocation::Position(position) => write!(f, "position {}", position),
        }
    }
}

impl ParseError {
    /// Location of the first violation
    pub fn location(&self) -> ParseLocation {
        match self {
            ParseError::Empty | ParseError::NotRectangular { .. } => ParseLocation::Input,
            ParseError::EmptyRow { row } => ParseLocation::Row { row: *row },
            ParseError::InvalidCell { row, column, .. } => ParseLocation::Cell {
                row: *row,
                column: *column,
            },
            ParseError::InvalidEntry { position, .. } => ParseLocation::Position(*position),
        }
    }
}

/// Errors from reading a matrix or vector file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Non-empty rectangular matrix of finite values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Matrix {
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// Build a matrix from rows, checking shape and finiteness
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ParseError> {
        let Some(first) = rows.first() else {
            return Err(ParseError::Empty);
        };
        let expected = first.len();

        for (r, row) in rows.iter().enumerate() {
            if row.is_empty() {
                return Err(ParseError::EmptyRow { row: r + 1 });
            }
            if let Some(c) = row.iter().position(|v| !v.is_finite()) {
                return Err(ParseError::InvalidCell {
                    row: r + 1,
                    column: c + 1,
                    token: row[c].to_string(),
                });
            }
        }
        check_rectangular(&rows, expected)?;

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows[0].len()
    }

    /// Render back to delimited text, one row per line
    pub fn to_delimited(&self, delimiter: char) -> String {
        let separator = delimiter.to_string();
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(&separator)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Non-empty sequence of finite values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Vector {
    values: Vec<f64>,
}

impl Vector {
    /// Build a vector from values, checking it is non-empty and finite
    pub fn from_values(values: Vec<f64>) -> Result<Self, ParseError> {
        if values.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ParseError::InvalidEntry {
                position: i + 1,
                token: values[i].to_string(),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn check_rectangular(rows: &[Vec<f64>], expected: usize) -> Result<(), ParseError> {
    match rows.iter().position(|row| row.len() != expected) {
        Some(r) => Err(ParseError::NotRectangular {
            row: r + 1,
            expected,
            found: rows[r].len(),
        }),
        None => Ok(()),
    }
}

/// Parse comma-delimited text into a matrix.
///
/// Blank lines are skipped, so row numbers in errors count non-blank lines
/// only. Blank tokens inside a row (`1,,2`) are skipped as well.
pub fn parse_matrix(text: &str) -> Result<Matrix, ParseError> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut rows = Vec::with_capacity(lines.len());
    for (r, line) in lines.iter().enumerate() {
        let row_number = r + 1;
        let tokens: Vec<&str> = line
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            return Err(ParseError::EmptyRow { row: row_number });
        }

        let mut row = Vec::with_capacity(tokens.len());
        for (c, token) in tokens.iter().enumerate() {
            let value = parse_number(token).ok_or_else(|| ParseError::InvalidCell {
                row: row_number,
                column: c + 1,
                token: token.to_string(),
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    check_rectangular(&rows, rows[0].len())?;
    Ok(Matrix { rows })
}

/// Parse a vector written either as a column (one value per line) or as a
/// row (comma or whitespace separated), or any mix of the two.
pub fn parse_vector(text: &str) -> Result<Vector, ParseError> {
    let tokens: Vec<&str> = text
        .trim()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let values = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            parse_number(token).ok_or_else(|| ParseError::InvalidEntry {
                position: i + 1,
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Vector { values })
}

/// Convert a single token in plain decimal notation to a finite `f64`.
///
/// Accepts an optional sign, digits with an optional fractional part and an
/// optional exponent (`-1.5e3`, `.5`, `2.`). Rejects `NaN`, `inf`,
/// thousands separators and anything that overflows to infinity.
pub fn parse_number(token: &str) -> Option<f64> {
    if !is_decimal_literal(token) {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_decimal_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }

    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

/// Read and parse a matrix file
pub async fn read_matrix_file(path: impl AsRef<Path>) -> Result<Matrix, LoadError> {
    let path = path.as_ref();
    let text = read_text(path).await?;
    parse_matrix(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse a right-hand-side vector file
pub async fn read_vector_file(path: impl AsRef<Path>) -> Result<Vector, LoadError> {
    let path = path.as_ref();
    let text = read_text(path).await?;
    parse_vector(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_text(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_square_matrix() {
        let m = parse_matrix("1,2\n3,4").unwrap();
        assert_eq!(m.rows(), &[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(m.row_count(), 2);
        assert_eq!(m.column_count(), 2);
    }

    #[test]
    fn test_parse_matrix_tolerates_padding() {
        let m = parse_matrix("\n  1.5 , -2e1\r\n\n 3, +4.  \n\n").unwrap();
        assert_eq!(m.rows(), &[vec![1.5, -20.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_parse_matrix_skips_blank_tokens() {
        let m = parse_matrix("1,,2\n3,4,").unwrap();
        assert_eq!(m.rows(), &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_parse_matrix_empty_input() {
        assert_eq!(parse_matrix(""), Err(ParseError::Empty));
        assert_eq!(parse_matrix("  \n\t\n"), Err(ParseError::Empty));
        assert_eq!(ParseError::Empty.location(), ParseLocation::Input);
    }

    #[test]
    fn test_parse_matrix_invalid_cell_location() {
        let err = parse_matrix("1,a").unwrap_err();
        assert_eq!(err.location(), ParseLocation::Cell { row: 1, column: 2 });
        assert!(err.to_string().contains("'a'"));

        let err = parse_matrix("1,2\n3,4\n5,x6").unwrap_err();
        assert_eq!(err.location(), ParseLocation::Cell { row: 3, column: 2 });
    }

    #[test]
    fn test_parse_matrix_stops_at_first_error() {
        let err = parse_matrix("1,b\nc,2").unwrap_err();
        assert_eq!(err.location(), ParseLocation::Cell { row: 1, column: 2 });
    }

    #[test]
    fn test_parse_matrix_row_without_values() {
        let err = parse_matrix("1,2\n , ,\n3,4").unwrap_err();
        assert_eq!(err, ParseError::EmptyRow { row: 2 });
    }

    #[test]
    fn test_parse_matrix_not_rectangular() {
        let err = parse_matrix("1,2\n3").unwrap_err();
        assert_eq!(
            err,
            ParseError::NotRectangular {
                row: 2,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(err.location(), ParseLocation::Input);
    }

    #[test]
    fn test_parse_matrix_rejects_non_finite_literals() {
        for bad in ["NaN", "inf", "Infinity", "-infinity", "1e400", "1 000", "0x10", "1_000"] {
            let text = format!("1;{}", bad).replace(';', "\n");
            let err = parse_matrix(&text).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidCell { row: 2, .. }),
                "{} should be rejected, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_matrix_delimited_text_reparses() {
        let text = "1.25,-3,4e-2\n0,7.5,100";
        let m = parse_matrix(text).unwrap();
        let again = parse_matrix(&m.to_delimited(',')).unwrap();
        assert_eq!(m, again);
    }

    #[test]
    fn test_matrix_from_rows_validates_shape() {
        assert!(Matrix::from_rows(vec![vec![1.0], vec![2.0]]).is_ok());
        assert_eq!(Matrix::from_rows(vec![]), Err(ParseError::Empty));
        assert!(matches!(
            Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(ParseError::NotRectangular { .. })
        ));
        assert!(matches!(
            Matrix::from_rows(vec![vec![f64::NAN]]),
            Err(ParseError::InvalidCell { row: 1, column: 1, .. })
        ));
    }

    #[test]
    fn test_parse_vector_mixed_delimiters() {
        let v = parse_vector("1.5\n2.5,3.5").unwrap();
        assert_eq!(v.values(), &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_parse_vector_row_and_column_layouts() {
        assert_eq!(parse_vector("1, 2, 3").unwrap().values(), &[1.0, 2.0, 3.0]);
        assert_eq!(parse_vector("1\n2\n3\n").unwrap().values(), &[1.0, 2.0, 3.0]);
        assert_eq!(parse_vector("1 \t 2,,\n 3").unwrap().values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parse_vector_errors() {
        assert_eq!(parse_vector(""), Err(ParseError::Empty));
        assert_eq!(parse_vector(" ,\n, "), Err(ParseError::Empty));

        let err = parse_vector("1\n2\nNaN").unwrap_err();
        assert_eq!(err.location(), ParseLocation::Position(3));
    }

    #[test]
    fn test_parse_number_grammar() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-0.5"), Some(-0.5));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("5."), Some(5.0));
        assert_eq!(parse_number("1E-3"), Some(0.001));
        assert_eq!(parse_number("+7e+2"), Some(700.0));

        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("1e"), None);
        assert_eq!(parse_number("e5"), None);
        assert_eq!(parse_number("1.2.3"), None);
        assert_eq!(parse_number("1,5"), None);
    }

    #[tokio::test]
    async fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let matrix_path = dir.path().join("matrix.csv");
        let rhs_path = dir.path().join("rhs.csv");
        std::fs::write(&matrix_path, "2,0\n0,4\n").unwrap();
        std::fs::write(&rhs_path, "2\n8\n").unwrap();

        let m = read_matrix_file(&matrix_path).await.unwrap();
        let v = read_vector_file(&rhs_path).await.unwrap();
        assert_eq!(m.row_count(), 2);
        assert_eq!(v.values(), &[2.0, 8.0]);

        let missing = read_matrix_file(dir.path().join("nope.csv")).await;
        assert!(matches!(missing, Err(LoadError::Io { .. })));

        std::fs::write(&rhs_path, "1\nfoo\n").unwrap();
        let bad = read_vector_file(&rhs_path).await.unwrap_err();
        assert!(matches!(
            bad,
            LoadError::Parse {
                source: ParseError::InvalidEntry { position: 2, .. },
                ..
            }
        ));
    }
}
