use strum_macros::{Display, FromRepr, VariantArray};

use crate::errors::ConfigError;

/// Screen rotation applied to raw panel coordinates.
///
/// The discriminants are the values the parameter store uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, FromRepr, VariantArray)]
#[repr(i32)]
#[strum(serialize_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Normal = 0,
    RotatedLeft = 1,
    Inverted = 2,
    RotatedRight = 3,
}

impl TryFrom<i32> for Orientation {
    type Error = ConfigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Orientation::from_repr(value).ok_or(ConfigError::Orientation(value))
    }
}

/// Usable raw range of the sensor, also the reported axis range.
///
/// Only constructible with non-zero spans on both axes, so the rotated
/// transforms never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratedBounds {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl CalibratedBounds {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Result<Self, ConfigError> {
        if min_x == max_x {
            return Err(ConfigError::DegenerateBounds {
                axis: 'x',
                min: min_x,
                max: max_x,
            });
        }
        if min_y == max_y {
            return Err(ConfigError::DegenerateBounds {
                axis: 'y',
                min: min_y,
                max: max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn min_x(&self) -> i32 {
        self.min_x
    }
    pub fn min_y(&self) -> i32 {
        self.min_y
    }
    pub fn max_x(&self) -> i32 {
        self.max_x
    }
    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    pub fn span_x(&self) -> i64 {
        i64::from(self.max_x) - i64::from(self.min_x)
    }

    pub fn span_y(&self) -> i64 {
        i64::from(self.max_y) - i64::from(self.min_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

/// Fractional bits carried through the rescale before the final rounding.
const FRAC_BITS: u32 = 16;

/// `offset * to_span / from_span`, rounded to nearest.
///
/// The quotient keeps `FRAC_BITS` of fraction so the single division is the
/// only truncation, then the half-unit is added back before shifting out.
/// Offsets and spans of any `i32` bounds fit in 34 bits, so the shifted
/// product stays well inside `i128`.
fn rescale(offset: i128, to_span: i128, from_span: i128) -> i128 {
    let fixed = ((offset * to_span) << FRAC_BITS) / from_span;
    (fixed + (1 << (FRAC_BITS - 1))) >> FRAC_BITS
}

fn saturate(value: i128) -> i32 {
    value.clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32
}

/// Maps raw panel coordinates to the coordinates reported for `orientation`.
///
/// The rotated orientations transpose the axes, so each output axis is
/// rescaled from the span of the opposite raw axis.
pub fn to_screen(
    x: u32,
    y: u32,
    orientation: Orientation,
    bounds: &CalibratedBounds,
) -> ScreenPoint {
    let (x, y) = (i128::from(x), i128::from(y));
    let min_x = i128::from(bounds.min_x);
    let min_y = i128::from(bounds.min_y);
    let max_x = i128::from(bounds.max_x);
    let max_y = i128::from(bounds.max_y);
    let (span_x, span_y) = (i128::from(bounds.span_x()), i128::from(bounds.span_y()));

    let (sx, sy) = match orientation {
        Orientation::Normal => (x, y),
        Orientation::Inverted => (max_x + min_x - x, max_y + min_y - y),
        Orientation::RotatedLeft => (
            max_x - rescale(y - min_y, span_x, span_y),
            min_y + rescale(x - min_x, span_y, span_x),
        ),
        Orientation::RotatedRight => (
            min_x + rescale(y - min_y, span_x, span_y),
            max_y - rescale(x - min_x, span_y, span_x),
        ),
    };

    ScreenPoint {
        x: saturate(sx),
        y: saturate(sy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantArray;

    fn factory_bounds() -> CalibratedBounds {
        CalibratedBounds::new(130, 250, 3820, 3920).unwrap()
    }

    fn inside(bounds: &CalibratedBounds) -> impl Iterator<Item = (u32, u32)> + '_ {
        (bounds.min_x()..=bounds.max_x())
            .step_by(97)
            .flat_map(move |x| {
                (bounds.min_y()..=bounds.max_y())
                    .step_by(89)
                    .map(move |y| (x as u32, y as u32))
            })
    }

    #[test]
    fn normal_is_identity() {
        let bounds = factory_bounds();
        for (x, y) in inside(&bounds).chain([(0, 0), (65535, 65535)]) {
            let p = to_screen(x, y, Orientation::Normal, &bounds);
            assert_eq!((p.x, p.y), (x as i32, y as i32));
        }
    }

    #[test]
    fn inverted_reflects_through_midpoint() {
        let bounds = factory_bounds();
        let p = to_screen(130, 250, Orientation::Inverted, &bounds);
        assert_eq!(p, ScreenPoint { x: 3820, y: 3920 });

        let p = to_screen(0, 0, Orientation::Inverted, &bounds);
        assert_eq!(p, ScreenPoint { x: 3950, y: 4170 });
    }

    #[test]
    fn inverted_is_an_involution() {
        let bounds = factory_bounds();
        for (x, y) in inside(&bounds) {
            let once = to_screen(x, y, Orientation::Inverted, &bounds);
            let twice = to_screen(once.x as u32, once.y as u32, Orientation::Inverted, &bounds);
            assert_eq!((twice.x, twice.y), (x as i32, y as i32));
        }
    }

    #[test]
    fn rotated_corners_land_on_bounds() {
        let bounds = factory_bounds();

        let p = to_screen(130, 250, Orientation::RotatedLeft, &bounds);
        assert_eq!(p, ScreenPoint { x: 3820, y: 250 });
        let p = to_screen(3820, 3920, Orientation::RotatedLeft, &bounds);
        assert_eq!(p, ScreenPoint { x: 130, y: 3920 });

        let p = to_screen(130, 250, Orientation::RotatedRight, &bounds);
        assert_eq!(p, ScreenPoint { x: 130, y: 3920 });
        let p = to_screen(3820, 3920, Orientation::RotatedRight, &bounds);
        assert_eq!(p, ScreenPoint { x: 3820, y: 250 });
    }

    #[test]
    fn left_then_right_returns_within_one_unit() {
        for bounds in [
            factory_bounds(),
            CalibratedBounds::new(0, 0, 4095, 1023).unwrap(),
            CalibratedBounds::new(200, 10, 900, 3000).unwrap(),
        ] {
            for (x, y) in inside(&bounds) {
                let left = to_screen(x, y, Orientation::RotatedLeft, &bounds);
                let back =
                    to_screen(left.x as u32, left.y as u32, Orientation::RotatedRight, &bounds);
                assert!(
                    (back.x - x as i32).abs() <= 1 && (back.y - y as i32).abs() <= 1,
                    "({x}, {y}) -> {left:?} -> {back:?} with {bounds:?}"
                );
            }
        }
    }

    #[test]
    fn wide_bounds_do_not_overflow() {
        let wide = 20_000_000;
        let bounds = CalibratedBounds::new(-wide, -wide, wide, wide).unwrap();
        let p = to_screen(0, 0, Orientation::RotatedRight, &bounds);
        assert_eq!(p, ScreenPoint { x: 0, y: 0 });
        let p = to_screen(0, 0, Orientation::RotatedLeft, &bounds);
        assert_eq!(p, ScreenPoint { x: 0, y: 0 });

        let huge = 2_000_000_000;
        let bounds = CalibratedBounds::new(0, -huge, huge, huge).unwrap();
        let p = to_screen(0, 0, Orientation::RotatedLeft, &bounds);
        assert_eq!(p.x, 1_000_000_000);

        let bounds = CalibratedBounds::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX).unwrap();
        let p = to_screen(u32::MAX, u32::MAX, Orientation::RotatedRight, &bounds);
        assert_eq!(p, ScreenPoint { x: i32::MAX, y: i32::MIN });
    }

    #[test]
    fn rescale_rounds_to_nearest() {
        // 1 * 2 / 3 = 0.67
        assert_eq!(rescale(1, 2, 3), 1);
        // 1 * 1 / 3 = 0.33
        assert_eq!(rescale(1, 1, 3), 0);
        // the historical x10/10 scheme truncated this to 1
        assert_eq!(rescale(5, 7, 20), 2);
    }

    #[test]
    fn zero_span_is_rejected() {
        assert_eq!(
            CalibratedBounds::new(100, 0, 100, 10),
            Err(ConfigError::DegenerateBounds {
                axis: 'x',
                min: 100,
                max: 100
            })
        );
        assert!(matches!(
            CalibratedBounds::new(0, 7, 10, 7),
            Err(ConfigError::DegenerateBounds { axis: 'y', .. })
        ));
    }

    #[test]
    fn orientation_codes_round_trip() {
        for (code, orientation) in Orientation::VARIANTS.iter().enumerate() {
            assert_eq!(Orientation::try_from(code as i32), Ok(*orientation));
        }
        assert_eq!(Orientation::try_from(4), Err(ConfigError::Orientation(4)));
        assert_eq!(Orientation::RotatedLeft.to_string(), "rotated-left");
    }
}
