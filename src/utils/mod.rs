//! Utility functions for formatting and parsing currency values
//!
//! Centralized formatting for consistent display of BRL and USD amounts:
//! Brazilian locale conventions for reais, US conventions for dollars, and
//! a decimal-comma-tolerant parser for user input.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Currency to format a value as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    /// "R$ " prefix, `.` thousands, `,` decimals
    Brl,
    /// "$" prefix, `,` thousands, `.` decimals
    Usd,
}

/// Core formatting function with full control over output.
///
/// # Examples
/// ```
/// use cambio::utils::{format_currency_with_width, Currency};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, Currency::Brl),
///     "R$ 1.234,56"
/// );
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, Currency::Usd),
///     "$1,234.56"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, currency: Currency) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs();

    // Round to 2 decimal places and format
    let formatted = format!("{:.2}", abs_value);
    let parts: Vec<&str> = formatted.split('.').collect();

    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    let (prefix, thousands_sep, decimal_sep) = match currency {
        Currency::Brl => ("R$ ", '.', ','),
        Currency::Usd => ("$", ',', '.'),
    };

    // Add thousands separators to the integer part
    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![thousands_sep, c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let result = format!(
        "{}{}{}{}{}",
        prefix, sign, with_separators, decimal_sep, decimal_part
    );

    // Apply width padding (right-align)
    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format as Brazilian Real: "R$ 1.234,56"
///
/// # Examples
/// ```
/// use cambio::utils::format_brl;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_brl(dec!(1234.56)), "R$ 1.234,56");
/// assert_eq!(format_brl(dec!(-500)), "R$ -500,00");
/// ```
pub fn format_brl(value: Decimal) -> String {
    format_currency_with_width(value, 0, Currency::Brl)
}

/// Format as US Dollar: "$1,234.56"
pub fn format_usd(value: Decimal) -> String {
    format_currency_with_width(value, 0, Currency::Usd)
}

/// Format right-aligned to a width, for tabular display.
pub fn format_currency_aligned(value: Decimal, width: usize, currency: Currency) -> String {
    format_currency_with_width(value, width, currency)
}

/// Parse a pt-BR formatted amount ("1.234,56") into a Decimal; anything
/// unparsable counts as zero, matching the entry-form behavior.
pub fn parse_currency_input(value: &str) -> Decimal {
    let sanitized = value.trim().replace('.', "").replace(',', ".");
    Decimal::from_str(&sanitized).unwrap_or(Decimal::ZERO)
}
