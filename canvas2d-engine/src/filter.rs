//! CSS filter strings (`grayscale(50%)`, `blur(2px)`, ...) and the color
//! matrices they produce.
//!
//! Matrices are 4×5, row-major, operating on normalized `[0, 1]` RGBA with the
//! fifth column holding the additive offset.

use std::f64::consts::PI;

/// A 4×5 row-major color matrix.
pub type ColorMatrix = [f64; 20];

pub const LUM_R: f64 = 0.2126;
pub const LUM_G: f64 = 0.7152;
pub const LUM_B: f64 = 0.0722;

/// Pixels per `rem` unit in blur lengths.
const REM_PX: f64 = 15.0;

pub const IDENTITY_MATRIX: ColorMatrix = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

/// If `value` ends in a percent sign, cut the string at the `%` and return
/// true; otherwise leave it untouched.
pub fn is_percent_str(value: &mut String) -> bool {
    match value.find('%') {
        Some(index) if value.ends_with('%') => {
            value.truncate(index);
            true
        }
        _ => false,
    }
}

/// Parse the longest numeric prefix of `s`, or `None` if there is none.
fn parse_numeric_prefix(s: &str) -> Option<f64> {
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Validate and parse a filter amount such as `"50%"`, `"0.5"` or `"2"`.
///
/// Every character but the last must be a digit or `.`; a lone non-digit is
/// rejected. Well-formed prefixes that still fail to parse degrade to `1.0`.
/// A trailing `%` scales by 0.01 and `clamp` caps the result at 1.
pub fn check_number_and_percentage(param: &str, clamp: bool) -> Option<f64> {
    let param = param.trim();
    let bytes = param.as_bytes();
    let (&last, head) = bytes.split_last()?;
    if head.is_empty() && !last.is_ascii_digit() {
        return None;
    }
    if !head.iter().all(|c| *c == b'.' || c.is_ascii_digit()) {
        return None;
    }

    let mut digits = param.to_string();
    let percent = is_percent_str(&mut digits);
    let mut result = parse_numeric_prefix(&digits).unwrap_or(1.0);
    if percent {
        result *= 0.01;
    }
    if clamp && result > 1.0 {
        result = 1.0;
    }
    Some(result)
}

/// Parse an angle with a `deg`, `turn` or `rad` suffix into radians. A bare
/// number is taken as degrees.
pub fn parse_angle(param: &str) -> Option<f64> {
    let param = param.trim();
    let (number, to_radians) = if let Some(v) = param.strip_suffix("deg") {
        (v, PI / 180.0)
    } else if let Some(v) = param.strip_suffix("turn") {
        (v, 2.0 * PI)
    } else if let Some(v) = param.strip_suffix("rad") {
        (v, 1.0)
    } else {
        (param, PI / 180.0)
    };
    let value = number.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value * to_radians)
}

/// Parse a blur length with a `px` or `rem` suffix into pixels.
pub fn parse_blur_length(param: &str) -> Option<f64> {
    let param = param.trim();
    let (number, scale) = if let Some(v) = param.strip_suffix("px") {
        (v, 1.0)
    } else if let Some(v) = param.strip_suffix("rem") {
        (v, REM_PX)
    } else {
        (param, 1.0)
    };
    let value = number.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value * scale)
}

/// Luminance blend shared by grayscale and saturate. `value == 1` is the
/// identity and `value == 0` is full luminance.
fn luminance_matrix(value: f64) -> ColorMatrix {
    let mut m = IDENTITY_MATRIX;
    m[0] = LUM_R + (1.0 - LUM_R) * value;
    m[1] = LUM_G - LUM_G * value;
    m[2] = LUM_B - LUM_B * value;
    m[5] = LUM_R - LUM_R * value;
    m[6] = LUM_G + (1.0 - LUM_G) * value;
    m[7] = LUM_B - LUM_B * value;
    m[10] = LUM_R - LUM_R * value;
    m[11] = LUM_G - LUM_G * value;
    m[12] = LUM_B + (1.0 - LUM_B) * value;
    m[18] = 1.0;
    m
}

pub fn grayscale_matrix(amount: f64) -> ColorMatrix {
    luminance_matrix(1.0 - amount)
}

pub fn saturate_matrix(amount: f64) -> ColorMatrix {
    luminance_matrix(amount)
}

pub fn sepia_matrix(p: f64) -> ColorMatrix {
    let mut m = IDENTITY_MATRIX;
    m[0] = 1.0 - 0.6412 * p;
    m[1] = 0.7044 * p;
    m[2] = 0.1368 * p;
    m[5] = 0.2990 * p;
    m[6] = 1.0 - 0.4130 * p;
    m[7] = 0.1140 * p;
    m[10] = 0.2392 * p;
    m[11] = 0.4696 * p;
    m[12] = 1.0 - 0.9088 * p;
    m[18] = 1.0;
    m
}

pub fn hue_rotate_matrix(radians: f64) -> ColorMatrix {
    let (sin, cos) = radians.sin_cos();
    let mut m = IDENTITY_MATRIX;
    m[0] = LUM_R + cos * (1.0 - LUM_R) - sin * LUM_R;
    m[1] = LUM_G - cos * LUM_G - sin * LUM_G;
    m[2] = LUM_B - cos * LUM_B + sin * (1.0 - LUM_B);
    m[5] = LUM_R - cos * LUM_R + sin * 0.143;
    m[6] = LUM_G + cos * (1.0 - LUM_G) + sin * 0.140;
    m[7] = LUM_B - cos * LUM_B - sin * 0.283;
    m[10] = LUM_R - cos * LUM_R - sin * (1.0 - LUM_R);
    m[11] = LUM_G - cos * LUM_G + sin * LUM_G;
    m[12] = LUM_B + cos * (1.0 - LUM_B) + sin * LUM_B;
    m[18] = 1.0;
    m
}

pub fn invert_matrix(p: f64) -> ColorMatrix {
    let mut m = IDENTITY_MATRIX;
    m[0] = 1.0 - 2.0 * p;
    m[6] = 1.0 - 2.0 * p;
    m[12] = 1.0 - 2.0 * p;
    m[4] = p;
    m[9] = p;
    m[14] = p;
    m
}

pub fn opacity_matrix(p: f64) -> ColorMatrix {
    let mut m = IDENTITY_MATRIX;
    m[18] = p;
    m
}

pub fn brightness_matrix(p: f64) -> ColorMatrix {
    let mut m = IDENTITY_MATRIX;
    m[0] = p;
    m[6] = p;
    m[12] = p;
    m
}

pub fn contrast_matrix(p: f64) -> ColorMatrix {
    let mut m = brightness_matrix(p);
    let offset = 0.5 * (1.0 - p);
    m[4] = offset;
    m[9] = offset;
    m[14] = offset;
    m
}

/// Compose two color matrices so that `first` is applied before `then`.
pub fn concat_color_matrices(first: &ColorMatrix, then: &ColorMatrix) -> ColorMatrix {
    let mut out = [0.0; 20];
    for r in 0..4 {
        for c in 0..5 {
            let mut sum: f64 = (0..4).map(|k| then[r * 5 + k] * first[k * 5 + c]).sum();
            if c == 4 {
                sum += then[r * 5 + 4];
            }
            out[r * 5 + c] = sum;
        }
    }
    out
}

/// Apply a color matrix to one normalized, non-premultiplied RGBA pixel.
pub fn apply_color_matrix(m: &ColorMatrix, rgba: [f64; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (r, value) in out.iter_mut().enumerate() {
        let row = &m[r * 5..r * 5 + 5];
        let v = row[0] * rgba[0] + row[1] * rgba[1] + row[2] * rgba[2] + row[3] * rgba[3] + row[4];
        *value = v.clamp(0.0, 1.0);
    }
    out
}

/// A single parsed filter function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterFunction {
    Grayscale(f64),
    Sepia(f64),
    Saturate(f64),
    /// Angle in radians.
    HueRotate(f64),
    Invert(f64),
    Opacity(f64),
    Brightness(f64),
    Contrast(f64),
    /// Radius in pixels.
    Blur(f64),
    /// Accepted but not rendered.
    DropShadow,
}

impl FilterFunction {
    /// Parse one `name(param)` pair. `Err(true)` marks an unknown function
    /// name, `Err(false)` an invalid parameter.
    fn parse(name: &str, param: &str) -> Result<Self, bool> {
        let amount = |clamp: bool| check_number_and_percentage(param, clamp).ok_or(false);
        Ok(match name.trim() {
            "grayscale" => FilterFunction::Grayscale(amount(true)?),
            "sepia" => FilterFunction::Sepia(amount(true)?),
            "saturate" => FilterFunction::Saturate(amount(false)?),
            "hue-rotate" => FilterFunction::HueRotate(parse_angle(param).ok_or(false)?),
            "invert" => FilterFunction::Invert(amount(true)?),
            "opacity" => FilterFunction::Opacity(amount(true)?),
            "brightness" => FilterFunction::Brightness(amount(false)?),
            "contrast" => FilterFunction::Contrast(amount(false)?),
            "blur" => FilterFunction::Blur(parse_blur_length(param).ok_or(false)?),
            "drop-shadow" => FilterFunction::DropShadow,
            _ => return Err(true),
        })
    }

    pub fn color_matrix(&self) -> Option<ColorMatrix> {
        match *self {
            FilterFunction::Grayscale(p) => Some(grayscale_matrix(p)),
            FilterFunction::Sepia(p) => Some(sepia_matrix(p)),
            FilterFunction::Saturate(p) => Some(saturate_matrix(p)),
            FilterFunction::HueRotate(rad) => Some(hue_rotate_matrix(rad)),
            FilterFunction::Invert(p) => Some(invert_matrix(p)),
            FilterFunction::Opacity(p) => Some(opacity_matrix(p)),
            FilterFunction::Brightness(p) => Some(brightness_matrix(p)),
            FilterFunction::Contrast(p) => Some(contrast_matrix(p)),
            FilterFunction::Blur(_) | FilterFunction::DropShadow => None,
        }
    }
}

/// The active filter effect: an optional color matrix and an optional blur.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub color_matrix: Option<ColorMatrix>,
    pub blur_radius: Option<f64>,
}

impl Filter {
    pub fn is_none(&self) -> bool {
        self.color_matrix.is_none() && self.blur_radius.map_or(true, |r| r <= 0.0)
    }

    fn push(&mut self, function: FilterFunction) {
        if let FilterFunction::Blur(radius) = function {
            self.blur_radius = Some(radius);
        }
        if let Some(m) = function.color_matrix() {
            self.color_matrix = Some(match &self.color_matrix {
                Some(prev) => concat_color_matrices(prev, &m),
                None => m,
            });
        }
    }
}

/// Outcome of parsing a filter string against the current filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterUpdate {
    /// Remove any active filter.
    Clear,
    /// Keep the current filter unchanged.
    Ignore,
    /// Replace the current filter.
    Set(Filter),
}

/// Split a filter string into `(name, param)` pairs. Returns `None` when the
/// parentheses do not balance.
fn split_functions(input: &str) -> Option<Vec<(&str, &str)>> {
    let mut functions = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let open = rest.find('(')?;
        let close = open + rest[open..].find(')')?;
        functions.push((&rest[..open], &rest[open + 1..close]));
        rest = rest[close + 1..].trim_start();
    }
    Some(functions)
}

/// Parse a CSS filter string.
///
/// A string without `(` (including `"none"`) clears the filter, as does any
/// unknown function name. An invalid parameter leaves the state untouched.
pub fn parse_filter(input: &str) -> FilterUpdate {
    if !input.contains('(') {
        return FilterUpdate::Clear;
    }
    let Some(functions) = split_functions(input) else {
        return FilterUpdate::Ignore;
    };

    let mut filter = Filter::default();
    for (name, param) in functions {
        match FilterFunction::parse(name, param) {
            Ok(function) => filter.push(function),
            Err(true) => return FilterUpdate::Clear,
            Err(false) => return FilterUpdate::Ignore,
        }
    }
    FilterUpdate::Set(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn matrix_of(input: &str) -> ColorMatrix {
        match parse_filter(input) {
            FilterUpdate::Set(Filter {
                color_matrix: Some(m),
                ..
            }) => m,
            other => panic!("expected a color matrix for {input}, got {other:?}"),
        }
    }

    fn assert_matrix_close(a: &ColorMatrix, b: &ColorMatrix, tolerance: f64) {
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() <= tolerance, "index {i}: {x} vs {y}");
        }
    }

    #[test]
    fn test_is_percent_str() {
        let mut value = "50%".to_string();
        assert!(is_percent_str(&mut value));
        assert_eq!(value, "50");

        let mut value = "50".to_string();
        assert!(!is_percent_str(&mut value));
        assert_eq!(value, "50");
    }

    #[rstest]
    #[case("50%", false, Some(0.5))]
    #[case("0.25", false, Some(0.25))]
    #[case("2", false, Some(2.0))]
    #[case("200%", true, Some(1.0))]
    #[case("3", true, Some(1.0))]
    #[case("%", false, None)]
    #[case("a", false, None)]
    #[case("-1", false, None)]
    #[case("1/2", false, None)]
    #[case("", false, None)]
    fn test_check_number_and_percentage(
        #[case] input: &str,
        #[case] clamp: bool,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(check_number_and_percentage(input, clamp), expected);
    }

    #[test]
    fn test_malformed_number_degrades_to_one() {
        assert_eq!(check_number_and_percentage("..%", false), Some(0.01));
        assert_eq!(check_number_and_percentage("..", false), Some(1.0));
    }

    #[test]
    fn test_grayscale_zero_is_identity() {
        let mut expected = IDENTITY_MATRIX;
        expected[18] = 1.0;
        assert_matrix_close(&matrix_of("grayscale(0%)"), &expected, 1e-12);
    }

    #[test]
    fn test_grayscale_full_is_luminance() {
        let m = matrix_of("grayscale(100%)");
        for row in 0..3 {
            assert!((m[row * 5] - LUM_R).abs() < 1e-12);
            assert!((m[row * 5 + 1] - LUM_G).abs() < 1e-12);
            assert!((m[row * 5 + 2] - LUM_B).abs() < 1e-12);
            assert_eq!(m[row * 5 + 4], 0.0);
        }
        assert_eq!(m[18], 1.0);
    }

    #[test]
    fn test_grayscale_clamps_but_saturate_does_not() {
        assert_eq!(matrix_of("grayscale(250%)"), matrix_of("grayscale(1)"));
        let m = matrix_of("saturate(200%)");
        assert!((m[0] - (LUM_R + (1.0 - LUM_R) * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_hue_rotate_unit_normalization() {
        let degrees = matrix_of("hue-rotate(660deg)");
        let turns = matrix_of("hue-rotate(1.833turn)");
        let wrapped = matrix_of("hue-rotate(300deg)");
        assert_matrix_close(&degrees, &turns, 1e-2);
        assert_matrix_close(&degrees, &wrapped, 1e-9);
        let radians = matrix_of(&format!("hue-rotate({}rad)", 300f64.to_radians()));
        assert_matrix_close(&degrees, &radians, 1e-9);
    }

    #[test]
    fn test_hue_rotate_zero_is_identity() {
        let mut expected = IDENTITY_MATRIX;
        expected[18] = 1.0;
        assert_matrix_close(&matrix_of("hue-rotate(0deg)"), &expected, 1e-12);
    }

    #[test]
    fn test_opacity_half() {
        let m = matrix_of("opacity(50%)");
        assert_eq!((m[0], m[6], m[12]), (1.0, 1.0, 1.0));
        assert_eq!(m[18], 0.5);
    }

    #[test]
    fn test_invert_full() {
        let m = matrix_of("invert(100%)");
        assert_eq!((m[0], m[6], m[12]), (-1.0, -1.0, -1.0));
        assert_eq!((m[4], m[9], m[14]), (1.0, 1.0, 1.0));
        let px = apply_color_matrix(&m, [0.25, 0.5, 1.0, 1.0]);
        assert_eq!(px, [0.75, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_contrast_and_brightness_are_unclamped() {
        let m = matrix_of("contrast(2)");
        assert_eq!(m[0], 2.0);
        assert_eq!(m[4], -0.5);
        let m = matrix_of("brightness(150%)");
        assert_eq!(m[6], 1.5);
    }

    #[test]
    fn test_sepia_full() {
        let m = matrix_of("sepia(1)");
        assert!((m[0] - 0.3588).abs() < 1e-12);
        assert!((m[11] - 0.4696).abs() < 1e-12);
    }

    #[rstest]
    #[case("blur(4px)", 4.0)]
    #[case("blur(2rem)", 30.0)]
    #[case("blur(3)", 3.0)]
    fn test_blur_lengths(#[case] input: &str, #[case] expected: f64) {
        match parse_filter(input) {
            FilterUpdate::Set(filter) => {
                assert_eq!(filter.blur_radius, Some(expected));
                assert!(filter.color_matrix.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_no_parenthesis_clears() {
        assert_eq!(parse_filter("none"), FilterUpdate::Clear);
        assert_eq!(parse_filter(""), FilterUpdate::Clear);
    }

    #[test]
    fn test_unknown_name_clears() {
        assert_eq!(parse_filter("sharpen(2)"), FilterUpdate::Clear);
    }

    #[test]
    fn test_invalid_param_is_ignored() {
        assert_eq!(parse_filter("grayscale(-50%)"), FilterUpdate::Ignore);
        assert_eq!(parse_filter("blur(-2px)"), FilterUpdate::Ignore);
        assert_eq!(parse_filter("hue-rotate(abc)"), FilterUpdate::Ignore);
        assert_eq!(parse_filter("grayscale(50%"), FilterUpdate::Ignore);
    }

    #[test]
    fn test_drop_shadow_is_a_no_op() {
        match parse_filter("drop-shadow(2px 2px 4px black)") {
            FilterUpdate::Set(filter) => assert!(filter.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_chain_composes_in_order() {
        let chained = matrix_of("opacity(50%) invert(100%)");
        let expected = concat_color_matrices(&opacity_matrix(0.5), &invert_matrix(1.0));
        assert_eq!(chained, expected);

        match parse_filter("grayscale(1) blur(2px)") {
            FilterUpdate::Set(filter) => {
                assert!(filter.color_matrix.is_some());
                assert_eq!(filter.blur_radius, Some(2.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
