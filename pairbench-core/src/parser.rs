// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Client output parser.
//!
//! Extracts the elapsed time, data rate and bytes-sent fields from the
//! client's free-text report using fixed label anchors. Each anchor is
//! searched independently and the first match wins; there is no structural
//! validation of the surrounding text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ParseError, ValidationError};
use crate::types::{Measurement, MeasurementField};

/// Anchor for the elapsed time in milliseconds.
pub const DEFAULT_ELAPSED_PATTERN: &str = r"Time\(ms\)\s*:\s*([0-9.]+)";
/// Anchor for the data rate in KB/s.
pub const DEFAULT_RATE_PATTERN: &str = r"Data rate:\s*([0-9.]+)";
/// Anchor for the number of bytes sent.
pub const DEFAULT_BYTES_PATTERN: &str = r"Data sent\(byte\):\s*([0-9]+)";

lazy_static! {
    static ref ELAPSED_RE: Regex =
        Regex::new(DEFAULT_ELAPSED_PATTERN).expect("elapsed anchor is a valid regex");
    static ref RATE_RE: Regex =
        Regex::new(DEFAULT_RATE_PATTERN).expect("rate anchor is a valid regex");
    static ref BYTES_RE: Regex =
        Regex::new(DEFAULT_BYTES_PATTERN).expect("bytes anchor is a valid regex");
}

/// Turns raw client output into a [`Measurement`].
///
/// Implementations must be pure: same text in, same result out.
pub trait OutputParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Measurement, ParseError>;
}

/// Regex anchors for the three fields. Each pattern has exactly one
/// capture group holding the numeric value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserPatterns {
    pub elapsed: String,
    pub rate: String,
    pub bytes: String,
}

impl Default for ParserPatterns {
    fn default() -> Self {
        Self {
            elapsed: DEFAULT_ELAPSED_PATTERN.to_string(),
            rate: DEFAULT_RATE_PATTERN.to_string(),
            bytes: DEFAULT_BYTES_PATTERN.to_string(),
        }
    }
}

/// Anchor-based parser for the labeled report format.
#[derive(Debug, Clone)]
pub struct LabeledFieldParser {
    elapsed: Regex,
    rate: Regex,
    bytes: Regex,
}

impl LabeledFieldParser {
    /// Parser for the stock client report format.
    pub fn new() -> Self {
        Self {
            elapsed: ELAPSED_RE.clone(),
            rate: RATE_RE.clone(),
            bytes: BYTES_RE.clone(),
        }
    }

    /// Parser with custom anchors.
    pub fn with_patterns(patterns: &ParserPatterns) -> Result<Self, ValidationError> {
        Ok(Self {
            elapsed: compile_anchor("parser.elapsed_pattern", &patterns.elapsed)?,
            rate: compile_anchor("parser.rate_pattern", &patterns.rate)?,
            bytes: compile_anchor("parser.bytes_pattern", &patterns.bytes)?,
        })
    }

    fn capture<'t>(
        re: &Regex,
        field: MeasurementField,
        raw: &'t str,
    ) -> Result<&'t str, ParseError> {
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| ParseError::MissingField {
                field,
                raw: raw.to_string(),
            })
    }

    fn float_field(re: &Regex, field: MeasurementField, raw: &str) -> Result<f64, ParseError> {
        let value = Self::capture(re, field, raw)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::MalformedField {
                field,
                value: value.to_string(),
                raw: raw.to_string(),
            })
    }
}

impl Default for LabeledFieldParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for LabeledFieldParser {
    fn parse(&self, raw: &str) -> Result<Measurement, ParseError> {
        let elapsed_ms = Self::float_field(&self.elapsed, MeasurementField::ElapsedTime, raw)?;
        let throughput_kbps = Self::float_field(&self.rate, MeasurementField::DataRate, raw)?;

        let bytes = Self::capture(&self.bytes, MeasurementField::BytesSent, raw)?;
        let bytes_sent = bytes
            .parse::<u64>()
            .map_err(|_| ParseError::MalformedField {
                field: MeasurementField::BytesSent,
                value: bytes.to_string(),
                raw: raw.to_string(),
            })?;

        Ok(Measurement::new(elapsed_ms, throughput_kbps, bytes_sent))
    }
}

/// Parse with the stock anchors.
pub fn parse(raw: &str) -> Result<Measurement, ParseError> {
    LabeledFieldParser::new().parse(raw)
}

fn compile_anchor(field: &'static str, pattern: &str) -> Result<Regex, ValidationError> {
    let re = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
        field,
        reason: e.to_string(),
    })?;

    // captures_len counts the implicit whole-match group.
    if re.captures_len() != 2 {
        return Err(ValidationError::InvalidPattern {
            field,
            reason: format!(
                "expected exactly one capture group, found {}",
                re.captures_len() - 1
            ),
        });
    }

    Ok(re)
}
