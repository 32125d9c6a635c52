//! Series preprocessing: the Keogh-Pazzani derivative transform.

use crate::series::{TimeSeries, TimeSeriesView};

/// Compute the Keogh-Pazzani first derivative of a time series.
///
/// For interior points: `d[i] = ((x[i] - x[i-1]) + (x[i+1] - x[i-1]) / 2) / 2`.
/// The output has the same length as the input; the first and last points
/// copy their neighbour. Two-point series yield `x[1] - x[0]` twice and a
/// single point yields `[0.0]`.
#[must_use = "returns a new derivative series; the original is unchanged"]
pub fn derivative(series: TimeSeriesView<'_>) -> TimeSeries {
    let data = series.as_slice();
    let n = data.len();

    let deriv = match n {
        1 => vec![0.0],
        2 => vec![data[1] - data[0]; 2],
        _ => {
            let mut out = vec![0.0; n];
            for i in 1..n - 1 {
                out[i] = ((data[i] - data[i - 1]) + (data[i + 1] - data[i - 1]) / 2.0) / 2.0;
            }
            out[0] = out[1];
            out[n - 1] = out[n - 2];
            out
        }
    };

    TimeSeries::from_validated(deriv)
}
