//! Line codec: one board line in, one [`Event`] out.
//!
//! Decoding is pure. A line that starts with a structured prefix (`DONE`,
//! `TEST NAME`, `TIME`, `ASSERT`) must match that prefix's full grammar or it
//! is a [`ProtocolError`]; everything else is [`Event::Unstructured`].

use super::event::{AssertKind, Assertion, Event};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// A line carried a protocol prefix but did not follow its grammar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("malformed {prefix} line: {line:?}")]
    Malformed { prefix: &'static str, line: String },

    #[error("operand out of range in {line:?}")]
    OutOfRange { line: String },

    #[error("invalid timing expectation: {value} s")]
    InvalidTime { value: f64 },

    #[error("invalid timing range: MIN {min} s, MAX {max} s")]
    InvalidTimeRange { min: f64, max: f64 },
}

const SITE: &str = r"\((.+?)\)\s*\((\d+)\)";
const FLOAT: &str = r"([-+]?(?:\d+(?:\.\d*)?|\.\d+))";

static TEST_NAME_RE: Lazy<Regex> = Lazy::new(|| build(r"^TEST NAME:?\s+(.+?)\s*$"));
static TIME_RE: Lazy<Regex> = Lazy::new(|| build(&format!(r"^TIME\s+{FLOAT}$")));
static TIME_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| build(&format!(r"^TIME\s+MIN\s+{FLOAT}\s+MAX\s+{FLOAT}$")));
static INT_CMP_RE: Lazy<Regex> =
    Lazy::new(|| build(&format!(r"^ASSERT\s+(EQ|NEQ|GT|LT)\s+(\d+)\s+(\d+)\s+{SITE}$")));
static FP_CMP_RE: Lazy<Regex> = Lazy::new(|| {
    build(&format!(
        r"^ASSERT\s+FP\s+(EQ|NEQ|GT|LT)\s+{FLOAT}\s+{FLOAT}\s+{SITE}$"
    ))
});
static BOOL_RE: Lazy<Regex> =
    Lazy::new(|| build(&format!(r"^ASSERT\s+(TRUE|FALSE)\s+(\d+)\s+{SITE}$")));
static STR_EQ_RE: Lazy<Regex> =
    Lazy::new(|| build(&format!(r"^ASSERT\s+STR\s+EQ\s+(\S+)\s+(\S+)\s+{SITE}$")));

fn build(pattern: &str) -> Regex {
    // Patterns are compile-time constants covered by the tests below.
    Regex::new(pattern).expect("protocol grammar must compile")
}

/// Strip one trailing `\n` and one trailing `\r`.
fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn has_prefix(body: &str, prefix: &str) -> bool {
    match body.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', '\t', ':']),
        None => false,
    }
}

/// Classify one raw line from a board.
pub fn decode(raw: &str) -> Result<Event, ProtocolError> {
    let body = strip_terminator(raw);

    if body == "DONE" {
        Ok(Event::Done)
    } else if has_prefix(body, "TEST NAME") {
        decode_name(body)
    } else if has_prefix(body, "TIME") {
        decode_time(body)
    } else if has_prefix(body, "ASSERT") {
        decode_assert(body).map(Event::Assert)
    } else {
        Ok(Event::Unstructured(raw.to_string()))
    }
}

/// Parse the primary board's reply to `COUNT`.
pub fn decode_count(raw: &str) -> Result<u32, ProtocolError> {
    let body = strip_terminator(raw).trim();
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("COUNT", body));
    }
    body.parse().map_err(|_| ProtocolError::OutOfRange {
        line: body.to_string(),
    })
}

fn malformed(prefix: &'static str, body: &str) -> ProtocolError {
    ProtocolError::Malformed {
        prefix,
        line: body.to_string(),
    }
}

fn decode_name(body: &str) -> Result<Event, ProtocolError> {
    let caps = TEST_NAME_RE
        .captures(body)
        .ok_or_else(|| malformed("TEST NAME", body))?;
    Ok(Event::TestName(caps[1].to_string()))
}

fn decode_time(body: &str) -> Result<Event, ProtocolError> {
    if let Some(caps) = TIME_RANGE_RE.captures(body) {
        let min = float(&caps, 1, body)?;
        let max = float(&caps, 2, body)?;
        let valid = min >= 0.0 && max >= 0.0 && min <= max && !(min == 0.0 && max == 0.0);
        if !valid {
            return Err(ProtocolError::InvalidTimeRange { min, max });
        }
        return Ok(Event::TimeRange { min, max });
    }

    let caps = TIME_RE.captures(body).ok_or_else(|| malformed("TIME", body))?;
    let value = float(&caps, 1, body)?;
    if value < 0.0 {
        return Err(ProtocolError::InvalidTime { value });
    }
    Ok(Event::TimeExpect(value))
}

fn decode_assert(body: &str) -> Result<Assertion, ProtocolError> {
    if let Some(caps) = FP_CMP_RE.captures(body) {
        let (a, b) = (float(&caps, 2, body)?, float(&caps, 3, body)?);
        let kind = match &caps[1] {
            "EQ" => AssertKind::FpEq(a, b),
            "NEQ" => AssertKind::FpNeq(a, b),
            "GT" => AssertKind::FpGt(a, b),
            _ => AssertKind::FpLt(a, b),
        };
        return assertion(kind, &caps, 4, body);
    }

    if let Some(caps) = INT_CMP_RE.captures(body) {
        let (a, b) = (int(&caps, 2, body)?, int(&caps, 3, body)?);
        let kind = match &caps[1] {
            "EQ" => AssertKind::Eq(a, b),
            "NEQ" => AssertKind::Neq(a, b),
            "GT" => AssertKind::Gt(a, b),
            _ => AssertKind::Lt(a, b),
        };
        return assertion(kind, &caps, 4, body);
    }

    if let Some(caps) = BOOL_RE.captures(body) {
        let v = int(&caps, 2, body)?;
        let kind = if &caps[1] == "TRUE" {
            AssertKind::True(v)
        } else {
            AssertKind::False(v)
        };
        return assertion(kind, &caps, 3, body);
    }

    if let Some(caps) = STR_EQ_RE.captures(body) {
        let kind = AssertKind::StrEq(caps[1].to_string(), caps[2].to_string());
        return assertion(kind, &caps, 3, body);
    }

    Err(malformed("ASSERT", body))
}

/// Attach the `(<function>) (<line>)` suffix starting at capture group `at`.
fn assertion(
    kind: AssertKind,
    caps: &Captures<'_>,
    at: usize,
    body: &str,
) -> Result<Assertion, ProtocolError> {
    let line = caps[at + 1]
        .parse::<u32>()
        .map_err(|_| ProtocolError::OutOfRange {
            line: body.to_string(),
        })?;
    Ok(Assertion::new(kind, &caps[at], line))
}

fn int(caps: &Captures<'_>, group: usize, body: &str) -> Result<u64, ProtocolError> {
    caps[group].parse().map_err(|_| ProtocolError::OutOfRange {
        line: body.to_string(),
    })
}

fn float(caps: &Captures<'_>, group: usize, body: &str) -> Result<f64, ProtocolError> {
    caps[group]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed("numeric", body))
}
