//! Text formats: control tokens, job and result payloads, and the matrix
//! input file.
//!
//! Payloads are plain whitespace-separated decimal numbers. Readers do not
//! care about line breaks, so writers emit a single line.

use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;
use std::str::SplitWhitespace;

use tracing::debug;

use crate::block::Block;
use crate::error::CodecError;

/// Upper bound on values reserved up front when reading a block.
const PREALLOC_LIMIT: usize = 1 << 16;

/// Fixed control messages exchanged with workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    /// Worker asks for the next job.
    Init,
    /// Result accepted, worker should ask again.
    Done,
    /// No more work, worker should disconnect.
    Exit,
}

impl ControlToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlToken::Init => "init",
            ControlToken::Done => "done",
            ControlToken::Exit => "exit",
        }
    }

    /// Exact match only. Anything else is a data payload.
    pub fn parse(message: &str) -> Option<Self> {
        match message {
            "init" => Some(ControlToken::Init),
            "done" => Some(ControlToken::Done),
            "exit" => Some(ControlToken::Exit),
            _ => None,
        }
    }
}

fn push_values(out: &mut String, block: &Block) {
    for value in block.as_slice() {
        // Writing into a String cannot fail.
        let _ = write!(out, " {value}");
    }
}

/// Job payload: the side length followed by both operand blocks.
pub fn encode_job(a: &Block, b: &Block) -> String {
    let mut out = String::with_capacity(16 * 2 * a.as_slice().len() + 8);
    out.push_str(&a.side().to_string());
    push_values(&mut out, a);
    push_values(&mut out, b);
    out
}

/// Worker-side counterpart of [`encode_job`].
pub fn decode_job(payload: &str) -> Result<(Block, Block), CodecError> {
    let mut tokens = payload.split_whitespace();
    let side = read_side(&mut tokens)?;
    let a = read_block(&mut tokens, side, 1)?;
    let b = read_block(&mut tokens, side, 1 + side * side)?;
    expect_end(tokens, 1 + 2 * side * side)?;
    Ok((a, b))
}

/// Result payload: the product block's values, row-major, no header.
pub fn encode_block(block: &Block) -> String {
    let mut out = String::with_capacity(16 * block.as_slice().len());
    push_values(&mut out, block);
    out.trim_start().to_string()
}

/// Parse a result payload that must hold exactly `side * side` values.
pub fn decode_block(payload: &str, side: usize) -> Result<Block, CodecError> {
    let mut tokens = payload.split_whitespace();
    let block = read_block(&mut tokens, side, 0)?;
    expect_end(tokens, side * side)?;
    Ok(block)
}

/// Parse the input file format: `N`, then `N²` values of A, then `N²` of B.
pub fn parse_matrices<R: Read>(mut reader: R) -> Result<(Block, Block), CodecError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut tokens = text.split_whitespace();
    let side = read_side(&mut tokens)?;
    let a = read_block(&mut tokens, side, 1)?;
    let b = read_block(&mut tokens, side, 1 + side * side)?;
    expect_end(tokens, 1 + 2 * side * side)?;

    debug!(side, "parsed input matrices");
    Ok((a, b))
}

/// Open and parse an input file.
pub fn read_matrices(path: &Path) -> Result<(Block, Block), CodecError> {
    let file = std::fs::File::open(path)?;
    parse_matrices(std::io::BufReader::new(file))
}

/// Side length header of a job payload or input file. The header is
/// untrusted: it must leave room for `1 + 2 * side²` token positions.
fn read_side(tokens: &mut SplitWhitespace<'_>) -> Result<usize, CodecError> {
    let token = tokens.next().ok_or(CodecError::MissingSide)?;
    let side: usize = token.parse().map_err(|_| CodecError::InvalidNumber {
        token: token.to_string(),
        position: 0,
    })?;
    side.checked_mul(side)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| n.checked_add(1))
        .ok_or(CodecError::SideTooLarge(side))?;
    Ok(side)
}

fn read_block(
    tokens: &mut SplitWhitespace<'_>,
    side: usize,
    offset: usize,
) -> Result<Block, CodecError> {
    let expected = side.checked_mul(side).ok_or(CodecError::SideTooLarge(side))?;
    // Grow with the tokens actually present rather than trusting the header.
    let mut data = Vec::with_capacity(expected.min(PREALLOC_LIMIT));
    for i in 0..expected {
        let token = tokens.next().ok_or(CodecError::WrongLength {
            expected: offset + expected,
            actual: offset + i,
        })?;
        let value: f64 = token.parse().map_err(|_| CodecError::InvalidNumber {
            token: token.to_string(),
            position: offset + i,
        })?;
        data.push(value);
    }
    Ok(Block::from_vec(side, data)?)
}

fn expect_end(tokens: SplitWhitespace<'_>, consumed: usize) -> Result<(), CodecError> {
    let extra = tokens.count();
    if extra > 0 {
        return Err(CodecError::WrongLength {
            expected: consumed,
            actual: consumed + extra,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Block, Block) {
        (
            Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap(),
            Block::from_rows(&[[0.5, -6.0], [7.25, 8.0]]).unwrap(),
        )
    }

    #[test]
    fn control_tokens_match_exactly() {
        for token in [ControlToken::Init, ControlToken::Done, ControlToken::Exit] {
            assert_eq!(ControlToken::parse(token.as_str()), Some(token));
        }
        assert_eq!(ControlToken::parse("INIT"), None);
        assert_eq!(ControlToken::parse("init "), None);
    }

    #[test]
    fn job_payload_layout() {
        let (a, b) = sample();
        assert_eq!(encode_job(&a, &b), "2 1 2 3 4 0.5 -6 7.25 8");
    }

    #[test]
    fn worker_reads_what_the_server_writes() {
        let (a, b) = sample();
        let (da, db) = decode_job(&encode_job(&a, &b)).unwrap();
        assert_eq!(da, a);
        assert_eq!(db, b);
    }

    #[test]
    fn result_payload_ignores_line_breaks() {
        let block = decode_block("19 22\n43 50\n", 2).unwrap();
        assert_eq!(block.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
        assert_eq!(encode_block(&block), "19 22 43 50");
    }

    #[test]
    fn short_result_payload_is_rejected() {
        let err = decode_block("1 2 3", 2).unwrap_err();
        assert!(matches!(err, CodecError::WrongLength { expected: 4, actual: 3 }));
    }

    #[test]
    fn long_result_payload_is_rejected() {
        let err = decode_block("1 2 3 4 5", 2).unwrap_err();
        assert!(matches!(err, CodecError::WrongLength { expected: 4, actual: 5 }));
    }

    #[test]
    fn garbage_token_reports_position() {
        let err = decode_block("1 2 x 4", 2).unwrap_err();
        match err {
            CodecError::InvalidNumber { token, position } => {
                assert_eq!(token, "x");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_input_file_format() {
        let input = "2\n1 2\n3 4\n5 6\n7 8\n";
        let (a, b) = parse_matrices(input.as_bytes()).unwrap();
        assert_eq!(a.side(), 2);
        assert_eq!(a.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(b.as_slice(), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn input_with_missing_values_is_rejected() {
        assert!(parse_matrices("2 1 2 3 4 5 6 7".as_bytes()).is_err());
        assert!(matches!(
            parse_matrices("".as_bytes()),
            Err(CodecError::MissingSide)
        ));
    }

    #[test]
    fn oversized_side_in_input_is_rejected() {
        let err = parse_matrices("5000000000 1 2".as_bytes()).unwrap_err();
        assert!(matches!(err, CodecError::SideTooLarge(5000000000)));
        let err = parse_matrices(format!("{} 1 2", usize::MAX).as_bytes()).unwrap_err();
        assert!(matches!(err, CodecError::SideTooLarge(_)));
    }

    #[test]
    fn huge_job_header_fails_on_missing_values() {
        let err = decode_job("1000000000 1 2").unwrap_err();
        assert!(matches!(
            err,
            CodecError::WrongLength { expected: 1000000000000000001, actual: 3 }
        ));
        let err = decode_job("5000000000 1 2").unwrap_err();
        assert!(matches!(err, CodecError::SideTooLarge(5000000000)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_matrices(Path::new("/nonexistent/hypergrid.in")).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }
}
