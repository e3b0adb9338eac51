//! Display strings for distances, durations and elevations.

use shared::{Coordinate, Units};

const METERS_PER_KM: f64 = 1_000.0;
const METERS_PER_MILE: f64 = 1_609.344;
const FEET_PER_MILE: f64 = 5_280.0;
const FEET_PER_METER: f64 = 3.280_84;

/// Render a distance given in meters.
///
/// The value is first converted to kilometers (or miles) and rounded to fewer
/// decimals as its integer part grows: `decimals = max(0, 3 - int_digits)`.
/// Anything below one unit is shown in meters (or feet).
pub fn format_distance(meters: f64, units: Units) -> String {
    let value = match units {
        Units::Metric => meters / METERS_PER_KM,
        Units::Imperial => meters / METERS_PER_MILE,
    };
    let rounded = round_by_magnitude(value);

    match units {
        Units::Metric if rounded >= 1.0 => format!("{rounded} km"),
        Units::Metric => format!("{} m", (value * METERS_PER_KM).round()),
        Units::Imperial if rounded >= 1.0 => format!("{rounded} mi"),
        Units::Imperial => format!("{} ft", (value * FEET_PER_MILE).round()),
    }
}

fn round_by_magnitude(value: f64) -> f64 {
    let magnitude = if value == 0.0 { 1.0 } else { value.abs() };
    let int_digits = magnitude.log10().floor() as i32 + 1;
    let decimals = (3 - int_digits).max(0);
    let factor = 10f64.powi(decimals);
    // Second rounding pass caps the result at two decimals.
    ((value * factor).round() / factor * 100.0).round() / 100.0
}

/// `"M min"` under an hour, `"Hh Mmin"` otherwise.
pub fn format_duration(minutes: f64) -> String {
    let hours = (minutes / 60.0).floor();
    let rest = (minutes % 60.0).floor();
    if hours == 0.0 {
        format!("{rest} min")
    } else {
        format!("{hours}h {rest}min")
    }
}

pub fn format_elevation(meters: f64, units: Units) -> String {
    match units {
        Units::Metric => format!("{:.0} m", meters),
        Units::Imperial => format!("{:.0} ft", meters * FEET_PER_METER),
    }
}

pub fn format_grade(percent: f64) -> String {
    format!("{percent:.1}%")
}

pub fn format_coordinate(coord: Coordinate) -> String {
    format!("{:.5}, {:.5}", coord.lat, coord.lon)
}
