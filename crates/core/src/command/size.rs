//! Output frame size specifications and their `scale` filter.

use std::fmt;
use std::str::FromStr;

use super::error::CommandError;
use super::types::Filter;

/// Target frame size of a video output.
///
/// Only built through [`SizeSpec::dimensions`], [`SizeSpec::percent`] or
/// parsing, so a value always lowers to a valid `scale` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSpec(Kind);

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    /// Explicit dimensions; an unset one keeps the aspect ratio.
    Dimensions {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Scale relative to the input, in percent.
    Percent(f64),
}

impl SizeSpec {
    /// Explicit dimensions. At least one must be set and set ones must be positive.
    pub fn dimensions(width: Option<u32>, height: Option<u32>) -> Result<Self, CommandError> {
        match (width, height) {
            (None, None) => Err(CommandError::invalid_size(
                "width and height cannot both be automatic",
            )),
            (Some(0), _) | (_, Some(0)) => Err(CommandError::invalid_size(
                "dimensions must be positive",
            )),
            _ => Ok(Self(Kind::Dimensions { width, height })),
        }
    }

    /// Relative scale; must be positive and finite.
    pub fn percent(percent: f64) -> Result<Self, CommandError> {
        if !percent.is_finite() || percent <= 0.0 {
            return Err(CommandError::invalid_size(format!(
                "percentage must be a positive number, got {}",
                percent
            )));
        }
        Ok(Self(Kind::Percent(percent)))
    }

    /// Width and height, `None` meaning automatic; `None` for percentages.
    pub fn as_dimensions(&self) -> Option<(Option<u32>, Option<u32>)> {
        match self.0 {
            Kind::Dimensions { width, height } => Some((width, height)),
            Kind::Percent(_) => None,
        }
    }

    /// The relative scale, if this is a percentage.
    pub fn as_percent(&self) -> Option<f64> {
        match self.0 {
            Kind::Percent(percent) => Some(percent),
            Kind::Dimensions { .. } => None,
        }
    }

    /// The `scale` filter producing this size.
    ///
    /// Percentages round both dimensions down to an even number, which most
    /// encoders require.
    pub fn scale_filter(&self) -> Filter {
        match &self.0 {
            Kind::Percent(percent) => {
                let factor = percent / 100.0;
                Filter::with_map(
                    "scale",
                    [
                        ("w", format!("trunc(iw*{}/2)*2", factor)),
                        ("h", format!("trunc(ih*{}/2)*2", factor)),
                    ],
                )
            }
            Kind::Dimensions { width, height } => Filter::with_map(
                "scale",
                [
                    ("w", dimension_or_auto(*width)),
                    ("h", dimension_or_auto(*height)),
                ],
            ),
        }
    }
}

fn dimension_or_auto(value: Option<u32>) -> String {
    value.map_or_else(|| "-2".to_string(), |v| v.to_string())
}

fn parse_dimension(token: &str, name: &str) -> Result<Option<u32>, CommandError> {
    let token = token.trim();
    match token {
        "" => Err(CommandError::invalid_size(format!("missing {}", name))),
        "?" => Ok(None),
        _ => token.parse::<u32>().map(Some).map_err(|_| {
            CommandError::invalid_size(format!("invalid {} '{}'", name, token))
        }),
    }
}

impl FromStr for SizeSpec {
    type Err = CommandError;

    /// Parses `WxH`, `Wx?`, `?xH` or `N%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(number) = s.strip_suffix('%') {
            let percent: f64 = number.trim().parse().map_err(|_| {
                CommandError::invalid_size(format!("invalid percentage '{}'", s))
            })?;
            return Self::percent(percent);
        }

        let Some((width, height)) = s.split_once(['x', 'X']) else {
            return Err(CommandError::invalid_size(format!(
                "expected WxH, Wx?, ?xH or N%, got '{}'",
                s
            )));
        };

        Self::dimensions(
            parse_dimension(width, "width")?,
            parse_dimension(height, "height")?,
        )
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Kind::Percent(percent) => write!(f, "{}%", percent),
            Kind::Dimensions { width, height } => {
                let show = |v: &Option<u32>| v.map_or_else(|| "?".to_string(), |v| v.to_string());
                write!(f, "{}x{}", show(width), show(height))
            }
        }
    }
}
