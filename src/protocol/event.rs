//! Typed board events.

use serde::Serialize;
use std::fmt;

/// Source location of an assertion inside the firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub function: String,
    pub line: u32,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "In function '{}', line {}", self.function, self.line)
    }
}

/// The comparison a board asked the host to check.
///
/// Integer operands are unsigned because the wire grammar only admits
/// decimal digits. Floating operands are compared at three decimals, the
/// precision firmware prints them with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssertKind {
    Eq(u64, u64),
    Neq(u64, u64),
    Gt(u64, u64),
    Lt(u64, u64),
    FpEq(f64, f64),
    FpNeq(f64, f64),
    FpGt(f64, f64),
    FpLt(f64, f64),
    True(u64),
    False(u64),
    StrEq(String, String),
}

/// Round to the three decimals that survive the wire.
pub fn wire_precision(value: f64) -> f64 {
    // Formatting rounds on the exact binary value, which is what the board's
    // printf did before transmission.
    format!("{value:.3}").parse().unwrap_or(value)
}

impl AssertKind {
    /// Whether the assertion holds.
    pub fn holds(&self) -> bool {
        match self {
            Self::Eq(a, b) => a == b,
            Self::Neq(a, b) => a != b,
            Self::Gt(a, b) => a > b,
            Self::Lt(a, b) => a < b,
            Self::FpEq(a, b) => wire_precision(*a) == wire_precision(*b),
            Self::FpNeq(a, b) => wire_precision(*a) != wire_precision(*b),
            Self::FpGt(a, b) => wire_precision(*a) > wire_precision(*b),
            Self::FpLt(a, b) => wire_precision(*a) < wire_precision(*b),
            Self::True(v) => *v != 0,
            Self::False(v) => *v == 0,
            Self::StrEq(a, b) => a == b,
        }
    }

    /// Macro name used in failure diagnostics, e.g. `ASSERT_FP_EQ`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Eq(..) => "ASSERT_EQ",
            Self::Neq(..) => "ASSERT_NEQ",
            Self::Gt(..) => "ASSERT_GT",
            Self::Lt(..) => "ASSERT_LT",
            Self::FpEq(..) => "ASSERT_FP_EQ",
            Self::FpNeq(..) => "ASSERT_FP_NEQ",
            Self::FpGt(..) => "ASSERT_FP_GT",
            Self::FpLt(..) => "ASSERT_FP_LT",
            Self::True(_) => "ASSERT_TRUE",
            Self::False(_) => "ASSERT_FALSE",
            Self::StrEq(..) => "ASSERT_STR_EQ",
        }
    }

    /// Operands as printed in diagnostics.
    pub fn operands(&self) -> String {
        match self {
            Self::Eq(a, b) | Self::Neq(a, b) | Self::Gt(a, b) | Self::Lt(a, b) => {
                format!("{a}, {b}")
            }
            Self::FpEq(a, b) | Self::FpNeq(a, b) | Self::FpGt(a, b) | Self::FpLt(a, b) => {
                format!("{a:.3}, {b:.3}")
            }
            Self::True(v) | Self::False(v) => v.to_string(),
            Self::StrEq(a, b) => format!("\"{a}\", \"{b}\""),
        }
    }
}

/// One assertion report with its firmware call site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assertion {
    pub kind: AssertKind,
    pub site: CallSite,
}

impl Assertion {
    pub fn new(kind: AssertKind, function: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            site: CallSite {
                function: function.into(),
                line,
            },
        }
    }

    pub fn passed(&self) -> bool {
        self.kind.holds()
    }
}

/// A line from a board, classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    /// The current test has finished.
    Done,
    /// Display name of the current test.
    TestName(String),
    /// The test should take this many seconds. Zero means "no expectation".
    TimeExpect(f64),
    /// The test should take between `min` and `max` seconds.
    TimeRange { min: f64, max: f64 },
    Assert(Assertion),
    /// Anything else; echoed to the operator verbatim.
    Unstructured(String),
}
