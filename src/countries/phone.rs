//! Phone numbering plans
//!
//! A [`PhonePlan`] describes how one country's numbers are written: the
//! international calling code, the trunk prefix used when dialling nationally,
//! the allowed lengths and leading digits of the national significant number,
//! and how that number is grouped for display.
//!
//! Numbers are accepted in international form (`+49 151 23456789`,
//! `0049 151 23456789`) or national form (`0151 23456789`). Spaces, dashes,
//! dots, slashes and parentheses are ignored.

use std::ops::RangeInclusive;

use smallvec::SmallVec;
use thiserror::Error;

/// Reasons a phone number does not fit a country's numbering plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// No digits were supplied.
    #[error("phone number is empty")]
    Empty,

    /// The number contains characters other than digits and separators.
    #[error("phone number contains invalid character {0:?}")]
    InvalidCharacter(char),

    /// The number is in international form for a different country.
    #[error("phone number does not start with calling code +{expected}")]
    WrongCallingCode {
        /// Calling code of the country the number was checked against
        expected: u16,
    },

    /// The national significant number has the wrong length.
    #[error("national number has {len} digits, expected {min} to {max}")]
    InvalidLength {
        /// Digits found
        len: usize,
        /// Minimum allowed digits
        min: usize,
        /// Maximum allowed digits
        max: usize,
    },

    /// The national significant number starts with digits the plan does not allow.
    #[error("national number cannot start with {0}")]
    InvalidLeadingDigits(String),
}

/// Numbering plan for a single country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonePlan {
    calling_code: u16,
    trunk_prefix: Option<String>,
    lengths: RangeInclusive<usize>,
    leading_digits: SmallVec<[String; 4]>,
    groups: SmallVec<[usize; 4]>,
    example: String,
}

impl PhonePlan {
    /// Create a new numbering plan.
    ///
    /// `groups` lists the sizes of the leading display groups of the national
    /// number; any remaining digits form a final group. `example` is a valid
    /// national significant number used to guide users.
    pub fn new(
        calling_code: u16,
        trunk_prefix: Option<String>,
        lengths: RangeInclusive<usize>,
        leading_digits: impl IntoIterator<Item = String>,
        groups: impl IntoIterator<Item = usize>,
        example: impl Into<String>,
    ) -> Self {
        Self {
            calling_code,
            trunk_prefix: trunk_prefix.filter(|prefix| !prefix.is_empty()),
            lengths,
            leading_digits: leading_digits.into_iter().collect(),
            groups: groups.into_iter().filter(|size| *size > 0).collect(),
            example: example.into(),
        }
    }

    /// International calling code, without the `+`.
    pub fn calling_code(&self) -> u16 {
        self.calling_code
    }

    /// Trunk prefix dialled before national numbers, if the country has one.
    pub fn trunk_prefix(&self) -> Option<&str> {
        self.trunk_prefix.as_deref()
    }

    /// Example national significant number.
    pub fn example(&self) -> &str {
        &self.example
    }

    /// The example number in canonical international form.
    pub fn example_format(&self) -> String {
        self.format(&self.example)
    }

    /// Parse a phone number and return its national significant number.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the number is malformed or does not satisfy the plan.
    pub fn parse(&self, raw: &str) -> Result<String, PhoneError> {
        let raw = raw.trim();
        let international = raw.starts_with('+');

        let mut digits = String::with_capacity(raw.len());

        for (idx, ch) in raw.char_indices() {
            match ch {
                '0'..='9' => digits.push(ch),
                '+' if idx == 0 => {}
                ' ' | '-' | '.' | '/' | '(' | ')' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        let code = self.calling_code.to_string();
        let exit_code = format!("00{code}");

        let national = if international {
            digits
                .strip_prefix(code.as_str())
                .ok_or(PhoneError::WrongCallingCode {
                    expected: self.calling_code,
                })?
        } else if let Some(rest) = digits.strip_prefix(exit_code.as_str()) {
            rest
        } else if digits.starts_with("00") {
            return Err(PhoneError::WrongCallingCode {
                expected: self.calling_code,
            });
        } else {
            digits.as_str()
        };

        let national = self
            .trunk_prefix
            .as_deref()
            .and_then(|prefix| national.strip_prefix(prefix))
            .unwrap_or(national);

        self.check(national)?;

        Ok(national.to_string())
    }

    /// Parse a phone number and rewrite it in canonical international form.
    ///
    /// # Errors
    ///
    /// See [`PhonePlan::parse`].
    pub fn normalize(&self, raw: &str) -> Result<String, PhoneError> {
        self.parse(raw).map(|national| self.format(&national))
    }

    /// Format a national significant number as `+CC G1 G2 … REST`.
    pub fn format(&self, national: &str) -> String {
        let mut out = format!("+{}", self.calling_code);
        let mut rest = national;

        for &size in &self.groups {
            if rest.len() <= size {
                break;
            }

            let (group, tail) = rest.split_at(size);

            out.push(' ');
            out.push_str(group);
            rest = tail;
        }

        if !rest.is_empty() {
            out.push(' ');
            out.push_str(rest);
        }

        out
    }

    fn check(&self, national: &str) -> Result<(), PhoneError> {
        if !self.lengths.contains(&national.len()) {
            return Err(PhoneError::InvalidLength {
                len: national.len(),
                min: *self.lengths.start(),
                max: *self.lengths.end(),
            });
        }

        // at most one trunk prefix is dropped before this point
        if let Some(prefix) = self
            .trunk_prefix
            .as_deref()
            .filter(|prefix| national.starts_with(prefix))
        {
            return Err(PhoneError::InvalidLeadingDigits(prefix.to_string()));
        }

        if !self.leading_digits.is_empty()
            && !self
                .leading_digits
                .iter()
                .any(|prefix| national.starts_with(prefix.as_str()))
        {
            let first = national.chars().next().map(String::from).unwrap_or_default();

            return Err(PhoneError::InvalidLeadingDigits(first));
        }

        Ok(())
    }
}
