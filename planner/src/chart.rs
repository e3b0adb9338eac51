//! Line chart model for the elevation profile.

use shared::{ChartSpec, Units};

const AXIS_PADDING: f64 = 0.1;
const METERS_PER_KM: f64 = 1_000.0;
const METERS_PER_MILE: f64 = 1_609.344;

/// Axis bounds and x labels for a set of elevation samples.
///
/// The y axis is padded by 10% on both sides and never goes below zero.
/// Labels stay empty unless the total route distance is known, in which case
/// each sample gets its cumulative distance.
pub fn render_chart(samples: &[f64], total_distance_m: Option<f64>, units: Units) -> Option<ChartSpec> {
    if samples.is_empty() {
        return None;
    }

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let y_min = (min - min * AXIS_PADDING).floor().max(0.0);
    let y_max = (max + max * AXIS_PADDING).ceil();

    let labels = match total_distance_m {
        Some(total) if samples.len() > 1 => {
            let step = total / (samples.len() - 1) as f64;
            let divisor = match units {
                Units::Metric => METERS_PER_KM,
                Units::Imperial => METERS_PER_MILE,
            };
            (0..samples.len())
                .map(|idx| format!("{:.1}", idx as f64 * step / divisor))
                .collect()
        }
        _ => vec![String::new(); samples.len()],
    };

    Some(ChartSpec {
        values: samples.to_vec(),
        labels,
        y_min,
        y_max,
    })
}

/// Holds the single chart currently on screen.
#[derive(Debug, Default)]
pub struct ElevationCanvas {
    current: Option<ChartSpec>,
}

impl ElevationCanvas {
    /// Replace whatever was drawn before.
    pub fn draw(&mut self, samples: &[f64], total_distance_m: Option<f64>, units: Units) -> Option<&ChartSpec> {
        if self.current.take().is_some() {
            tracing::debug!("discarding previous elevation chart");
        }
        self.current = render_chart(samples, total_distance_m, units);
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ChartSpec> {
        self.current.as_ref()
    }
}
