//! Plain-text history files.
//!
//! One line per time index:
//!
//! ```text
//! 00001:  1.00000000000000e+00, -2.50000000000000e-03, ...
//! ```
//!
//! Labels are zero-padded to five digits. Values use C's `% 1.14e` layout: a
//! sign column, 14 digits after the point, and an exponent with sign and at
//! least two digits.

use std::io::Write;

use crate::error::OptCtlResult;

/// Write `blocks` as labelled lines starting at `first_label`.
pub fn write_history<W: Write>(
    writer: &mut W,
    first_label: usize,
    blocks: &[Vec<f64>],
) -> OptCtlResult<()> {
    for (i, block) in blocks.iter().enumerate() {
        write!(writer, "{:05}: ", first_label + i)?;
        for (j, &x) in block.iter().enumerate() {
            if j > 0 {
                write!(writer, ", ")?;
            }
            write!(writer, "{}", format_value(x))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Format one value as `% 1.14e`.
pub fn format_value(x: f64) -> String {
    if !x.is_finite() {
        let body = if x.is_nan() { "nan" } else { "inf" };
        let sign = if x.is_sign_negative() && !x.is_nan() { '-' } else { ' ' };
        return format!("{}{}", sign, body);
    }

    let s = format!("{:.14e}", x);
    let (mantissa, exp) = match s.split_once('e') {
        Some(parts) => parts,
        None => (s.as_str(), "0"),
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if mantissa.starts_with('-') { "" } else { " " };
    let exp_sign = if exp < 0 { '-' } else { '+' };

    format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exp.abs())
}
