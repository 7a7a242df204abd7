//! crates/detailing_core/src/validation.rs
//!
//! Input checks shared by the use cases. Every failing field is collected
//! into one `PortError::Validation` so callers see all problems at once, and
//! nothing is written until the whole input has passed.

use regex::Regex;
use std::sync::LazyLock;

use crate::ports::{PortError, PortResult};

static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern compiles"));

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{3,}$").expect("slug pattern compiles"));

pub fn is_valid_zip(zip: &str) -> bool {
    ZIP_CODE.is_match(zip)
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG.is_match(slug)
}

/// Accumulates field errors.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.0.push(message.into());
        }
        self
    }

    /// Length is counted in characters after trimming.
    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        let ok = value.trim().chars().count() >= min;
        self.check(ok, format!("{} must be at least {} characters", field, min))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(&self) -> PortResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PortError::Validation(self.0.join("; ")))
        }
    }
}
