/// Digits kept after the decimal point before trailing zeros are stripped.
pub const QUOTE_DECIMALS: usize = 8;

/// Render a quote-currency figure for the remote table.
///
/// The value is printed with eight decimals, then trailing zeros and a dangling
/// decimal point are removed: `12.50000000` → `12.5`, `100.00000000` → `100`.
/// Values that round to zero render as `0`, never `-0`.
pub fn format_quote_value(value: f64) -> String {
    let fixed = format!("{value:.prec$}", prec = QUOTE_DECIMALS);
    if !fixed.contains('.') {
        // NaN / inf
        return fixed;
    }
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
