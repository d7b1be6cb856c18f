//! Price conversion and display.
//!
//! Every price shown anywhere in the storefront goes through
//! [`render_price`]: listing grids, cart lines, and order summaries all use
//! the same ceiling rule, so there is exactly one rounding behavior and no
//! ad hoc fallback exchange rates.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Placeholder shown while the exchange rate has not loaded yet.
pub const LOADING_PLACEHOLDER: &str = "…";

/// Shown for items whose provider did not report a price
/// (`price_cents_usd == 0`).
pub const PRICE_UNAVAILABLE: &str = "Unavailable";

/// Display conventions for the local currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFormat {
    /// Currency symbol prefixed to the amount (e.g. `Rp`).
    pub symbol: String,
    /// Thousands separator for the integer amount.
    pub thousands_separator: char,
}

impl Default for PriceFormat {
    fn default() -> Self {
        Self {
            symbol: "Rp".to_owned(),
            thousands_separator: '.',
        }
    }
}

/// Convert integer USD cents into a localized display string.
///
/// - `price_cents_usd == 0` yields [`PRICE_UNAVAILABLE`] regardless of rate.
/// - A missing (or non-finite) rate yields [`LOADING_PLACEHOLDER`].
/// - Otherwise the local amount is `ceil(price_cents_usd * rate / 100)`,
///   formatted as a grouped integer with no decimal places.
///
/// Deterministic and side-effect-free; the ceiling is computed in decimal
/// arithmetic so it is monotonically non-decreasing in `rate`.
#[must_use]
pub fn render_price(price_cents_usd: u64, rate: Option<f64>, format: &PriceFormat) -> String {
    if price_cents_usd == 0 {
        return PRICE_UNAVAILABLE.to_owned();
    }
    let Some(rate) = rate.and_then(Decimal::from_f64) else {
        return LOADING_PLACEHOLDER.to_owned();
    };

    let local = (Decimal::from(price_cents_usd) * rate / Decimal::from(100)).ceil();
    let Some(amount) = local.to_u128() else {
        // Negative or absurdly large rates do not produce a displayable price.
        return LOADING_PLACEHOLDER.to_owned();
    };

    format!(
        "{} {}",
        format.symbol,
        group_thousands(amount, format.thousands_separator)
    )
}

/// Insert a separator every three digits, from the right.
fn group_thousands(amount: u128, separator: char) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt() -> PriceFormat {
        PriceFormat::default()
    }

    #[test]
    fn zero_cents_is_unavailable_for_any_rate() {
        assert_eq!(render_price(0, None, &fmt()), PRICE_UNAVAILABLE);
        assert_eq!(render_price(0, Some(3450.5), &fmt()), PRICE_UNAVAILABLE);
        assert_eq!(render_price(0, Some(0.0), &fmt()), PRICE_UNAVAILABLE);
    }

    #[test]
    fn missing_rate_is_the_loading_placeholder() {
        assert_eq!(render_price(10_000, None, &fmt()), LOADING_PLACEHOLDER);
        assert_eq!(render_price(1, None, &fmt()), LOADING_PLACEHOLDER);
    }

    #[test]
    fn non_finite_rate_degrades_to_placeholder() {
        assert_eq!(
            render_price(10_000, Some(f64::NAN), &fmt()),
            LOADING_PLACEHOLDER
        );
    }

    #[test]
    fn converts_with_ceiling_and_grouping() {
        // ceil(10000 * 3450.5 / 100) = 345050
        assert_eq!(render_price(10_000, Some(3450.5), &fmt()), "Rp 345.050");
    }

    #[test]
    fn rounds_up_fractional_amounts() {
        // ceil(999 * 1.0 / 100) = ceil(9.99) = 10
        assert_eq!(render_price(999, Some(1.0), &fmt()), "Rp 10");
    }

    #[test]
    fn monotone_non_decreasing_in_rate() {
        let cents = 12_345;
        let rates = [0.5, 1.0, 14.2, 99.99, 3450.5, 15_000.0];
        let amounts: Vec<u128> = rates
            .iter()
            .map(|&r| {
                let rendered = render_price(cents, Some(r), &fmt());
                rendered
                    .trim_start_matches("Rp ")
                    .replace('.', "")
                    .parse()
                    .expect("numeric amount")
            })
            .collect();
        for window in amounts.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn respects_custom_format() {
        let format = PriceFormat {
            symbol: "₱".to_owned(),
            thousands_separator: ',',
        };
        assert_eq!(render_price(200_000, Some(56.0), &format), "₱ 112,000");
    }

    #[test]
    fn grouping_small_numbers_is_untouched() {
        assert_eq!(group_thousands(7, '.'), "7");
        assert_eq!(group_thousands(999, '.'), "999");
        assert_eq!(group_thousands(1_000, '.'), "1.000");
        assert_eq!(group_thousands(1_234_567, '.'), "1.234.567");
    }
}
