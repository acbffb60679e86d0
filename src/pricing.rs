//! Quote totals: subtotal, then discount, then tax.
//!
//! Everything here keeps full `f64` precision. Rounding to cents happens only
//! when a figure is formatted for display.

use serde::Serialize;

use crate::model::LineItem;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QuoteTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub taxable_amount: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Derives the totals for a set of line items and two percentage rates.
///
/// Rates are applied as given: a negative discount raises the taxable amount
/// and a discount above 100% clamps the taxable amount at zero.
pub fn compute_totals(items: &[LineItem], discount_percent: f64, tax_percent: f64) -> QuoteTotals {
    let subtotal: f64 = items.iter().map(LineItem::line_total).sum();
    let discount_amount = subtotal * discount_percent / 100.0;
    let taxable_amount = (subtotal - discount_amount).max(0.0);
    let tax_amount = taxable_amount * tax_percent / 100.0;

    QuoteTotals {
        subtotal,
        discount_amount,
        taxable_amount,
        tax_amount,
        total: taxable_amount + tax_amount,
    }
}

/// Two-decimal money string, e.g. `$1234.50` or `-$25.00`.
pub fn format_money(amount: f64) -> String {
    let text = format_amount(amount);
    match text.strip_prefix('-') {
        Some(magnitude) => format!("-${}", magnitude),
        None => format!("${}", text),
    }
}

/// The discount as it is applied to the subtotal: `-$25.00` for a discount,
/// `$10.00` for a negative rate that adds to it.
pub fn format_discount(discount_amount: f64) -> String {
    format_money(-discount_amount)
}

/// Two-decimal amount without a currency sign.
pub fn format_amount(amount: f64) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    // Avoid printing "-0.00"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.2}", rounded)
}

/// Rates and quantities as typed by the user: `16`, `8.875`, `2.5`.
pub fn format_decimal(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: f64, unit_price: f64) -> LineItem {
        LineItem { quantity, unit_price, ..LineItem::empty() }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn discount_then_tax() {
        let items = [item(2.0, 100.0), item(1.0, 50.0)];
        let totals = compute_totals(&items, 10.0, 16.0);
        assert_close(totals.subtotal, 250.0);
        assert_close(totals.discount_amount, 25.0);
        assert_close(totals.taxable_amount, 225.0);
        assert_close(totals.tax_amount, 36.0);
        assert_close(totals.total, 261.0);
    }

    #[test]
    fn empty_quote_is_all_zero() {
        let totals = compute_totals(&[], 10.0, 16.0);
        assert_eq!(totals, QuoteTotals::default());
    }

    #[test]
    fn discount_above_subtotal_clamps_taxable_amount() {
        let totals = compute_totals(&[item(1.0, 100.0)], 150.0, 16.0);
        assert_close(totals.discount_amount, 150.0);
        assert_eq!(totals.taxable_amount, 0.0);
        assert_eq!(totals.tax_amount, 0.0);
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn taxable_amount_never_negative() {
        let items = [item(3.0, 19.99), item(0.5, 7.25)];
        for discount in [0.0, 50.0, 99.9, 100.0, 100.1, 250.0, 1e6] {
            assert!(compute_totals(&items, discount, 16.0).taxable_amount >= 0.0);
        }
    }

    #[test]
    fn negative_rates_pass_through() {
        let totals = compute_totals(&[item(1.0, 100.0)], -10.0, -5.0);
        assert_close(totals.discount_amount, -10.0);
        assert_close(totals.taxable_amount, 110.0);
        assert_close(totals.tax_amount, -5.5);
        assert_close(totals.total, 104.5);
    }

    #[test]
    fn total_grows_with_tax_rate() {
        let items = [item(2.0, 12.5), item(7.0, 3.1)];
        let mut previous = f64::MIN;
        for step in 0..=60 {
            let total = compute_totals(&items, 5.0, step as f64 * 0.5).total;
            assert!(total >= previous);
            previous = total;
        }
    }

    #[test]
    fn precision_is_kept_until_formatting() {
        // 3 x 0.335 = 1.005; 10% off = 0.9045; 8.875% tax = 0.08027...
        let totals = compute_totals(&[item(3.0, 0.335)], 10.0, 8.875);
        assert_close(totals.taxable_amount, 0.9045);
        assert_close(totals.total, 0.9045 * 1.08875);
        assert_eq!(format_money(totals.total), "$0.98");
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(261.0), "$261.00");
        assert_eq!(format_money(1234.5), "$1234.50");
        assert_eq!(format_money(-0.001), "$0.00");
        assert_eq!(format_amount(0.125), "0.13");
        assert_eq!(format_money(-5.5), "-$5.50");
    }

    #[test]
    fn discount_line_carries_one_sign() {
        assert_eq!(format_discount(25.0), "-$25.00");
        assert_eq!(format_discount(-10.0), "$10.00");
        assert_eq!(format_discount(0.0), "$0.00");
    }

    #[test]
    fn decimal_formatting() {
        assert_eq!(format_decimal(16.0), "16");
        assert_eq!(format_decimal(8.875), "8.875");
        assert_eq!(format_decimal(12.5), "12.5");
        assert_eq!(format_decimal(0.0), "0");
    }
}
