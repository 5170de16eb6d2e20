//! Lowering of `rgb`/`color`/`spectrum` shorthand.
//!
//! These tags do not bind raw values (except `color`): they synthesize a
//! nested spectrum object under the active variant, choosing the plugin from
//! the surrounding context (reflectance vs. emission) and reducing to a
//! scalar in monochrome mode.

use crate::error::LoadError;
use crate::parser::ParseContext;
use crate::scalars::{parse_float, tokenize};
use helion_math::{Color3, EPSILON};
use helion_runtime::{Properties, SceneObjectRef, Value};

/// Lower bound of the modeled wavelength range, in nanometers.
pub const WAVELENGTH_MIN: f64 = 360.0;

/// Upper bound of the modeled wavelength range, in nanometers.
pub const WAVELENGTH_MAX: f64 = 830.0;

/// Radiometric unit conversion applied to emitter spectra so that a D65
/// sample set integrates to white.
pub const EMITTER_UNIT_CONVERSION: f64 = 100.0 / 10568.0;

/// Reciprocal of the CIE 1931 ȳ curve integral, used to normalize the
/// monochrome reduction of reflectance spectra.
pub const CIE_Y_NORMALIZATION: f64 = 0.0093583;

/// CIE 1931 ȳ color matching function.
///
/// Two-lobe piecewise-Gaussian fit after Wyman et al. (2013).
pub fn cie1931_y(wavelength: f64) -> f64 {
    fn lobe(x: f64, mean: f64, sigma_lo: f64, sigma_hi: f64) -> f64 {
        let sigma = if x < mean { sigma_lo } else { sigma_hi };
        let t = (x - mean) / sigma;
        (-0.5 * t * t).exp()
    }
    0.821 * lobe(wavelength, 568.8, 46.9, 40.5) + 0.286 * lobe(wavelength, 530.9, 16.3, 31.1)
}

/// Parse the `color` shorthand into a [`Color3`] value.
pub(crate) fn color_value(value: &str, monochrome: bool) -> Result<Color3, LoadError> {
    let tokens = tokenize(value);
    if tokens.len() != 3 {
        return Err(LoadError::message(format!(
            "'color' tag requires three values (got \"{value}\")"
        )));
    }
    let mut components = [0.0; 3];
    for (slot, token) in components.iter_mut().zip(&tokens) {
        *slot = parse_float(token)
            .ok_or_else(|| LoadError::message(format!("could not parse color \"{value}\"")))?;
    }
    let color = Color3::new(components[0], components[1], components[2]);
    if monochrome {
        return Ok(Color3::splat(color.luminance()));
    }
    Ok(color)
}

/// Lower the `rgb` shorthand into a spectrum object.
///
/// Outside an emitter the value is a reflectance and must lie in `[0, 1]`;
/// the implicit plugin is `srgb` (or `srgb_d65` for emission). Monochrome
/// variants collapse to a `uniform` spectrum holding the luminance.
pub(crate) fn rgb_object(
    ctx: &ParseContext<'_>,
    value: &str,
    within_emitter: bool,
) -> Result<SceneObjectRef, LoadError> {
    let mut tokens = tokenize(value);
    if tokens.len() == 1 {
        tokens.push(tokens[0]);
        tokens.push(tokens[0]);
    }
    if tokens.len() != 3 {
        return Err(LoadError::message(format!(
            "'rgb' tag requires one or three values (got \"{value}\")"
        )));
    }
    let mut components = [0.0; 3];
    for (slot, token) in components.iter_mut().zip(&tokens) {
        *slot = parse_float(token)
            .ok_or_else(|| LoadError::message(format!("could not parse RGB value \"{value}\"")))?;
    }
    let color = Color3::new(components[0], components[1], components[2]);
    if !within_emitter && !color.is_valid_reflectance() {
        return Err(LoadError::message(
            "invalid RGB reflectance value, must be in the range [0, 1]!",
        ));
    }

    let mut props = if ctx.monochrome {
        let mut props = Properties::new("uniform");
        props.set("value", Value::Float(color.luminance()));
        props
    } else {
        let mut props = Properties::new(if within_emitter { "srgb_d65" } else { "srgb" });
        props.set("color", Value::Color(color));
        props
    };
    create_spectrum(ctx, &mut props)
}

/// Lower the `spectrum` shorthand into a spectrum object.
///
/// A single scalar instantiates `d65` (emission) or `uniform` (reflectance);
/// `wavelength:value` pairs instantiate an `interpolated` spectrum, which
/// requires regular sample spacing.
pub(crate) fn spectrum_object(
    ctx: &ParseContext<'_>,
    value: &str,
    within_emitter: bool,
) -> Result<SceneObjectRef, LoadError> {
    let tokens = tokenize(value);

    if tokens.len() == 1 {
        let mut scalar = parse_float(tokens[0]).ok_or_else(|| {
            LoadError::message(format!("could not parse constant spectrum \"{}\"", tokens[0]))
        })?;
        let plugin = if ctx.monochrome {
            scalar /= WAVELENGTH_MAX - WAVELENGTH_MIN;
            "uniform"
        } else if within_emitter {
            "d65"
        } else {
            "uniform"
        };
        let mut props = Properties::new(plugin);
        props.set("value", Value::Float(scalar));
        return create_spectrum(ctx, &mut props);
    }

    let unit_conversion = if within_emitter {
        EMITTER_UNIT_CONVERSION
    } else {
        1.0
    };
    let (wavelengths, values) = parse_wavelength_pairs(&tokens, unit_conversion)?;

    if ctx.monochrome {
        let average = average_against_cie_y(&wavelengths, &values, within_emitter);
        let mut props = Properties::new("uniform");
        props.set("value", Value::Float(average));
        return create_spectrum(ctx, &mut props);
    }

    let mut props = Properties::new("interpolated");
    props.set("lambda_min", Value::Float(wavelengths[0]));
    props.set("lambda_max", Value::Float(wavelengths[wavelengths.len() - 1]));
    props.set("values", Value::FloatArray(values));
    create_spectrum(ctx, &mut props)
}

/// Parse `wavelength:value` tokens, scaling values by `unit_conversion`.
///
/// Wavelengths must be increasing and regularly spaced: successive intervals
/// deviating from the first by more than [`EPSILON`] are rejected.
pub(crate) fn parse_wavelength_pairs(
    tokens: &[&str],
    unit_conversion: f64,
) -> Result<(Vec<f64>, Vec<f64>), LoadError> {
    let mut wavelengths = Vec::with_capacity(tokens.len());
    let mut values = Vec::with_capacity(tokens.len());
    let mut interval = 0.0;
    let mut is_regular = true;

    for token in tokens {
        let pair: Vec<&str> = token.split(':').collect();
        if pair.len() != 2 {
            return Err(LoadError::message(
                "invalid spectrum (expected wavelength:value pairs)",
            ));
        }
        let (wavelength, value) = match (parse_float(pair[0]), parse_float(pair[1])) {
            (Some(w), Some(v)) => (w, v),
            _ => {
                return Err(LoadError::message(format!(
                    "could not parse wavelength:value pair: \"{token}\""
                )))
            }
        };
        wavelengths.push(wavelength);
        values.push(value * unit_conversion);

        let n = wavelengths.len();
        if n <= 1 {
            continue;
        }
        let distance = wavelengths[n - 1] - wavelengths[n - 2];
        if distance < 0.0 {
            return Err(LoadError::message(
                "wavelengths must be specified in increasing order",
            ));
        }
        if n == 2 {
            interval = distance;
        } else if (distance - interval).abs() > EPSILON {
            is_regular = false;
        }
    }

    if !is_regular {
        return Err(LoadError::message(
            "irregularly sampled spectra are not supported",
        ));
    }
    Ok((wavelengths, values))
}

/// Integrate a sampled spectrum against the CIE ȳ matching curve at 1 nm
/// steps over the full wavelength range, applying the monochrome
/// normalization for the given context.
pub(crate) fn average_against_cie_y(
    wavelengths: &[f64],
    values: &[f64],
    within_emitter: bool,
) -> f64 {
    let mut average = 0.0;
    let mut w = WAVELENGTH_MIN;
    while w <= WAVELENGTH_MAX {
        average += cie1931_y(w) * eval_interpolated(wavelengths, values, w);
        w += 1.0;
    }
    if within_emitter {
        average / (WAVELENGTH_MAX - WAVELENGTH_MIN)
    } else {
        average * CIE_Y_NORMALIZATION
    }
}

/// Piecewise-linear evaluation of a sampled spectrum; zero outside the
/// sampled range.
fn eval_interpolated(wavelengths: &[f64], values: &[f64], w: f64) -> f64 {
    let n = wavelengths.len();
    if n == 0 || w < wavelengths[0] || w > wavelengths[n - 1] {
        return 0.0;
    }
    if n == 1 {
        return values[0];
    }
    let idx = wavelengths.partition_point(|&x| x <= w).min(n - 1);
    let (i0, i1) = (idx - 1, idx);
    let span = wavelengths[i1] - wavelengths[i0];
    if span <= 0.0 {
        return values[i0];
    }
    let t = (w - wavelengths[i0]) / span;
    values[i0] * (1.0 - t) + values[i1] * t
}

fn create_spectrum(
    ctx: &ParseContext<'_>,
    props: &mut Properties,
) -> Result<SceneObjectRef, LoadError> {
    let class = ctx.spectrum_class()?;
    let object = ctx.create_object(&class, props)?;
    // Give the object a chance to replace itself with a single expansion
    let expanded = object.expand();
    if expanded.len() == 1 {
        return Ok(expanded.into_iter().next().unwrap_or(object));
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cie_y_peak_near_555nm() {
        let peak = cie1931_y(555.0);
        assert!(peak > 0.98 && peak <= 1.05, "peak was {peak}");
        assert!(cie1931_y(360.0) < 0.01);
        assert!(cie1931_y(830.0) < 0.01);
    }

    #[test]
    fn test_flat_reflectance_integrates_to_one() {
        // A unit reflectance spectrum across the whole range should come out
        // close to 1 after normalization by the curve integral.
        let wavelengths = vec![WAVELENGTH_MIN, WAVELENGTH_MAX];
        let values = vec![1.0, 1.0];
        let average = average_against_cie_y(&wavelengths, &values, false);
        assert!((average - 1.0).abs() < 0.02, "average was {average}");
    }

    #[test]
    fn test_pair_parsing_and_unit_conversion() {
        let tokens = vec!["400:10", "500:20", "600:30"];
        let (w, v) = parse_wavelength_pairs(&tokens, 0.5).unwrap();
        assert_eq!(w, vec![400.0, 500.0, 600.0]);
        assert_eq!(v, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_decreasing_wavelengths_rejected() {
        let tokens = vec!["500:1", "400:1"];
        let err = parse_wavelength_pairs(&tokens, 1.0).unwrap_err();
        assert!(err.to_string().contains("increasing order"));
    }

    #[test]
    fn test_irregular_spacing_rejected() {
        let tokens = vec!["400:1", "500:1", "650:1"];
        let err = parse_wavelength_pairs(&tokens, 1.0).unwrap_err();
        assert!(err.to_string().contains("irregularly sampled"));
    }

    #[test]
    fn test_malformed_pair_rejected() {
        assert!(parse_wavelength_pairs(&["400"], 1.0).is_err());
        assert!(parse_wavelength_pairs(&["400:x"], 1.0).is_err());
        assert!(parse_wavelength_pairs(&["400:1:2"], 1.0).is_err());
    }

    #[test]
    fn test_interpolation() {
        let w = vec![400.0, 500.0];
        let v = vec![0.0, 1.0];
        assert_eq!(eval_interpolated(&w, &v, 450.0), 0.5);
        assert_eq!(eval_interpolated(&w, &v, 400.0), 0.0);
        assert_eq!(eval_interpolated(&w, &v, 500.0), 1.0);
        assert_eq!(eval_interpolated(&w, &v, 399.0), 0.0);
        assert_eq!(eval_interpolated(&w, &v, 501.0), 0.0);
    }

    #[test]
    fn test_color_value_monochrome() {
        let color = color_value("1 0 0", true).unwrap();
        assert!((color.r - 0.212671).abs() < 1e-9);
        assert_eq!(color.r, color.g);
        assert_eq!(color.g, color.b);
    }

    #[test]
    fn test_color_value_arity() {
        assert!(color_value("0.5", false).is_err());
        assert!(color_value("0.1 0.2 0.3 0.4", false).is_err());
        assert!(color_value("a b c", false).is_err());
    }
}
