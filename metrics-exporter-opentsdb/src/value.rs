use std::{borrow::Cow, fmt::Write as _};

/// A numeric metric value.
///
/// The variant is chosen by whatever produced the reading: integer-valued fields (counts, integral gauge values, the
/// bounds of integer histograms) are [`MetricValue::Integer`], everything else is [`MetricValue::FloatingPoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    /// An integral value, rendered as a plain decimal.
    Integer(i64),

    /// A floating-point value, rendered with exactly two fractional digits.
    FloatingPoint(f64),
}

impl MetricValue {
    /// Returns the value as an `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Integer(v) => v as f64,
            MetricValue::FloatingPoint(v) => v,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        MetricValue::Integer(i64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::FloatingPoint(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::FloatingPoint(f64::from(value))
    }
}

/// Formats metric values without going through the host locale.
///
/// The formatter owns its scratch buffers, so formatting many values in a row does not allocate.
pub(crate) struct MetricValueFormatter {
    int_writer: itoa::Buffer,
    float_buf: String,
}

impl MetricValueFormatter {
    pub fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_buf: String::new() }
    }

    pub fn format(&mut self, value: MetricValue) -> &str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            MetricValue::FloatingPoint(v) => {
                self.float_buf.clear();
                // Writing into a `String` cannot fail.
                let _ = write!(self.float_buf, "{v:.2}");
                &self.float_buf
            }
        }
    }
}

/// Character encoding applied to outgoing lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Charset {
    /// Lines are sent as UTF-8.
    #[default]
    Utf8,

    /// Lines are sent as 7-bit ASCII, with every non-ASCII character replaced by `?`.
    Ascii,
}

impl Charset {
    pub(crate) fn encode_into(self, s: &str, buf: &mut Vec<u8>) {
        match self {
            Charset::Utf8 => buf.extend_from_slice(s.as_bytes()),
            Charset::Ascii => buf.extend(s.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' })),
        }
    }
}

/// Replaces every maximal run of whitespace in `s` with a single `-`.
pub(crate) fn sanitize(s: &str) -> Cow<'_, str> {
    if !s.contains(char::is_whitespace) {
        return Cow::Borrowed(s);
    }

    let mut sanitized = String::with_capacity(s.len());
    let mut in_whitespace = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('-');
            }
            in_whitespace = true;
        } else {
            sanitized.push(c);
            in_whitespace = false;
        }
    }

    Cow::Owned(sanitized)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{sanitize, Charset, MetricValue, MetricValueFormatter};

    #[test]
    fn formats_integers_as_plain_decimals() {
        let mut formatter = MetricValueFormatter::new();
        assert_eq!(formatter.format(MetricValue::Integer(42)), "42");
        assert_eq!(formatter.format(MetricValue::Integer(-7)), "-7");
        assert_eq!(formatter.format(MetricValue::Integer(i64::MAX)), "9223372036854775807");
    }

    #[test]
    fn formats_floats_with_two_digits() {
        let mut formatter = MetricValueFormatter::new();
        assert_eq!(formatter.format(MetricValue::FloatingPoint(3.14159)), "3.14");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(2.0)), "2.00");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(-0.5)), "-0.50");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(1234567.891)), "1234567.89");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(0.0)), "0.00");
    }

    #[test]
    fn formats_ties_and_non_finite_floats() {
        let mut formatter = MetricValueFormatter::new();
        // Ties round to even on the exact binary value.
        assert_eq!(formatter.format(MetricValue::FloatingPoint(0.125)), "0.12");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(0.375)), "0.38");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(f64::NAN)), "NaN");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(f64::INFINITY)), "inf");
        assert_eq!(formatter.format(MetricValue::FloatingPoint(f64::NEG_INFINITY)), "-inf");
    }

    #[test]
    fn value_conversions_pick_the_variant() {
        assert_eq!(MetricValue::from(36), MetricValue::Integer(36));
        assert_eq!(MetricValue::from(36u32), MetricValue::Integer(36));
        assert_eq!(MetricValue::from(1.5f32), MetricValue::FloatingPoint(1.5));
        assert_eq!(MetricValue::Integer(3).as_f64(), 3.0);
    }

    #[test]
    fn sanitize_cases() {
        let cases = [
            ("name", "name"),
            ("name woo", "name-woo"),
            ("value woo", "value-woo"),
            ("a  \t b", "a-b"),
            (" leading", "-leading"),
            ("trailing\n", "trailing-"),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize(input), expected);
        }
    }

    #[test]
    fn ascii_charset_replaces_non_ascii() {
        let mut buf = Vec::new();
        Charset::Ascii.encode_into("temp.°C", &mut buf);
        assert_eq!(buf, b"temp.?C");

        buf.clear();
        Charset::Utf8.encode_into("temp.°C", &mut buf);
        assert_eq!(buf, "temp.°C".as_bytes());
    }

    proptest! {
        #[test]
        fn sanitized_output_has_no_whitespace(input in "[a-z \t\r\n]{0,64}") {
            let sanitized = sanitize(&input);
            prop_assert!(!sanitized.contains(char::is_whitespace));
            prop_assert!(!sanitized.contains("--"));
            prop_assert_eq!(sanitized.replace('-', ""), input.replace(char::is_whitespace, ""));
        }
    }
}
