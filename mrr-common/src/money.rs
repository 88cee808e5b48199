//! Money rounding and currency formatting
//!
//! All monetary values are `f64`. Rounding is `(x * 100).round() / 100`: the
//! scaled product is rounded half away from zero, and the multiplication itself
//! may already have rounded. `0.125` gives `0.13`; `1.005` (stored as 1.00499...,
//! scaled to 100.49999...) gives `1.0`; `0.25 * 0.94` (stored as 0.23499999...,
//! scaled to exactly 23.5) gives `0.24`.

use serde::{Deserialize, Serialize};

/// Suffix used when no currency is configured
pub const DEFAULT_CURRENCY_SUFFIX: &str = "₽";

/// Round to 2 decimal places, half away from zero on `value * 100`
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders summary amounts as `"<amount with 2 decimals> <suffix>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    pub suffix: String,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_CURRENCY_SUFFIX.to_string(),
        }
    }
}

impl CurrencyFormat {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn format(&self, amount: f64) -> String {
        if self.suffix.is_empty() {
            format!("{:.2}", round_money(amount))
        } else {
            format!("{:.2} {}", round_money(amount), self.suffix)
        }
    }

    /// Inverse of [`format`](Self::format); `None` if the text is not a formatted amount
    pub fn parse(&self, text: &str) -> Option<f64> {
        let number = text.trim().strip_suffix(self.suffix.as_str())?;
        number.trim().parse().ok()
    }
}
