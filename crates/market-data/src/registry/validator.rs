//! Quote payload validation.
//!
//! Rejects structurally invalid provider payloads before they reach the
//! cache:
//! - Quote must be for the requested symbol
//! - Price must be positive and below a sanity ceiling
//! - 52 week low must not exceed the 52 week high
//! - Source id must be present
//!
//! Soft issues (e.g. zero volume) are logged but do not reject the quote.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::FetchError;
use crate::models::QuoteData;

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject quote, try next provider.
    Hard,
    /// Soft warning - accept quote but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Quote validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether a zero price is rejected (negative prices always are).
    pub reject_zero_price: bool,
    /// Maximum allowed price value (for sanity check).
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_zero_price: true,
            max_price: Some(Decimal::from(1_000_000_000i64)), // 1 billion as sanity check
            warn_on_zero_volume: true,
        }
    }
}

/// Quote payload validator.
#[derive(Clone, Debug, Default)]
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a quote returned by `provider` for `symbol`.
    ///
    /// Hard issues become a `MalformedResponse`; soft issues are logged.
    pub fn validate(&self, provider: &str, symbol: &str, quote: &QuoteData) -> Result<(), FetchError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        self.validate_identity(symbol, quote, &mut issues);
        self.validate_price(quote, &mut issues);
        self.validate_52w_range(quote, &mut issues);
        self.validate_volume(quote, &mut issues);

        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(FetchError::malformed(provider, errors.join("; ")));
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Quote validation warning for {} from '{}': {}",
                symbol, provider, issue.message
            );
        }

        Ok(())
    }

    fn validate_identity(&self, symbol: &str, quote: &QuoteData, issues: &mut Vec<ValidationIssue>) {
        if !quote.symbol.eq_ignore_ascii_case(symbol) {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Quote is for '{}', expected '{}'", quote.symbol, symbol),
            });
        }
        if quote.source_id.trim().is_empty() {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: "Missing source id".to_string(),
            });
        }
    }

    fn validate_price(&self, quote: &QuoteData, issues: &mut Vec<ValidationIssue>) {
        if quote.price < Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Negative price: {}", quote.price),
            });
        } else if self.config.reject_zero_price && quote.price.is_zero() {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: "Zero price".to_string(),
            });
        }

        if let Some(max) = self.config.max_price {
            if quote.price > max {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Price {} exceeds maximum {}", quote.price, max),
                });
            }
        }
    }

    fn validate_52w_range(&self, quote: &QuoteData, issues: &mut Vec<ValidationIssue>) {
        if let (Some(low), Some(high)) = (quote.low_52w, quote.high_52w) {
            if low > high {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("52w low ({}) > 52w high ({})", low, high),
                });
            }
        }
    }

    fn validate_volume(&self, quote: &QuoteData, issues: &mut Vec<ValidationIssue>) {
        if self.config.warn_on_zero_volume && quote.volume == 0 {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: "Zero volume".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, price: Decimal) -> QuoteData {
        QuoteData::new(symbol, price, dec!(0.5), dec!(0.3), 1000, "PRIMARY", Utc::now())
    }

    #[test]
    fn test_valid_quote() {
        let validator = QuoteValidator::new();
        assert!(validator
            .validate("PRIMARY", "AAPL", &quote("AAPL", dec!(150.25)))
            .is_ok());
    }

    #[test]
    fn test_negative_price_is_malformed() {
        let validator = QuoteValidator::new();
        let err = validator
            .validate("PRIMARY", "AAPL", &quote("AAPL", dec!(-1)))
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
        assert!(err.to_string().contains("Negative price"));
    }

    #[test]
    fn test_zero_price_rejected_by_default() {
        let validator = QuoteValidator::new();
        assert!(validator
            .validate("PRIMARY", "AAPL", &quote("AAPL", Decimal::ZERO))
            .is_err());

        let lenient = QuoteValidator::with_config(ValidatorConfig {
            reject_zero_price: false,
            ..ValidatorConfig::default()
        });
        assert!(lenient
            .validate("PRIMARY", "AAPL", &quote("AAPL", Decimal::ZERO))
            .is_ok());
    }

    #[test]
    fn test_symbol_mismatch_is_malformed() {
        let validator = QuoteValidator::new();
        let err = validator
            .validate("PRIMARY", "AAPL", &quote("MSFT", dec!(410)))
            .unwrap_err();
        assert!(err.to_string().contains("expected 'AAPL'"));
    }

    #[test]
    fn test_symbol_match_is_case_insensitive() {
        let validator = QuoteValidator::new();
        assert!(validator
            .validate("PRIMARY", "aapl", &quote("AAPL", dec!(150)))
            .is_ok());
    }

    #[test]
    fn test_inverted_52w_range_is_malformed() {
        let validator = QuoteValidator::new();
        let q = quote("AAPL", dec!(150)).with_52w_range(dec!(200), dec!(120));
        assert!(validator.validate("PRIMARY", "AAPL", &q).is_err());
    }

    #[test]
    fn test_zero_volume_is_only_a_warning() {
        let validator = QuoteValidator::new();
        let mut q = quote("AAPL", dec!(150));
        q.volume = 0;
        assert!(validator.validate("PRIMARY", "AAPL", &q).is_ok());
    }
}
