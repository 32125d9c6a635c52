//! Time series types with validation guarantees.

use std::ops::Index;

use crate::error::DistanceError;

/// Owned, validated time series. Guaranteed non-empty with all finite values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries(Vec<f64>);

impl TimeSeries {
    /// Create a new time series, validating that it is non-empty and all values are finite.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `values` is empty |
    /// | [`DistanceError::NonFiniteValue`] | Any value is NaN or infinite |
    pub fn new(values: Vec<f64>) -> Result<Self, DistanceError> {
        validate(&values)?;
        Ok(Self(values))
    }

    /// Borrow this series as a zero-copy view.
    #[must_use]
    pub fn as_view(&self) -> TimeSeriesView<'_> {
        TimeSeriesView::new_unchecked(&self.0)
    }

    /// Return the number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed series; provided for the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the inner vector.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Wrap values that are already known to be valid (e.g. produced by a
    /// transform of a validated series).
    pub(crate) fn from_validated(values: Vec<f64>) -> Self {
        debug_assert!(validate(&values).is_ok());
        Self(values)
    }
}

impl AsRef<[f64]> for TimeSeries {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for TimeSeries {
    type Error = DistanceError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

/// Borrowed, validated view into a time series. Zero-copy reference.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesView<'a>(&'a [f64]);

impl<'a> TimeSeriesView<'a> {
    /// Create a new view, validating that the slice is non-empty and all values are finite.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `slice` is empty |
    /// | [`DistanceError::NonFiniteValue`] | Any value is NaN or infinite |
    pub fn new(slice: &'a [f64]) -> Result<Self, DistanceError> {
        validate(slice)?;
        Ok(Self(slice))
    }

    /// Create a view without validation. For internal use where data is already validated.
    pub(crate) fn new_unchecked(slice: &'a [f64]) -> Self {
        Self(slice)
    }

    /// Return the underlying slice.
    #[must_use]
    pub fn as_slice(&self) -> &'a [f64] {
        self.0
    }

    /// Return the number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed view; provided for the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for TimeSeriesView<'_> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl AsRef<[f64]> for TimeSeriesView<'_> {
    fn as_ref(&self) -> &[f64] {
        self.0
    }
}

/// A time series with an optional class label, as supplied by a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    values: TimeSeries,
    label: Option<usize>,
}

impl Sequence {
    /// Create an unlabelled sequence.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TimeSeries::new`].
    pub fn new(values: Vec<f64>) -> Result<Self, DistanceError> {
        Ok(Self {
            values: TimeSeries::new(values)?,
            label: None,
        })
    }

    /// Create a sequence carrying a zero-based class label.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TimeSeries::new`].
    pub fn labeled(values: Vec<f64>, label: usize) -> Result<Self, DistanceError> {
        Ok(Self {
            values: TimeSeries::new(values)?,
            label: Some(label),
        })
    }

    /// Borrow the values as a view.
    #[must_use]
    pub fn as_view(&self) -> TimeSeriesView<'_> {
        self.values.as_view()
    }

    /// Return the class label, if any.
    #[must_use]
    pub fn label(&self) -> Option<usize> {
        self.label
    }

    /// Return the number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; see [`TimeSeries::is_empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<TimeSeries> for Sequence {
    fn from(values: TimeSeries) -> Self {
        Self {
            values,
            label: None,
        }
    }
}

/// Two sequences presented together to a kernel. `first` plays the role of `A`.
#[derive(Debug, Clone, Copy)]
pub struct SequencePair<'a> {
    /// Query side of the alignment.
    pub first: TimeSeriesView<'a>,
    /// Candidate side of the alignment.
    pub second: TimeSeriesView<'a>,
}

impl<'a> SequencePair<'a> {
    /// Pair two views.
    #[must_use]
    pub fn new(first: TimeSeriesView<'a>, second: TimeSeriesView<'a>) -> Self {
        Self { first, second }
    }

    /// Pair two labelled sequences.
    #[must_use]
    pub fn of(first: &'a Sequence, second: &'a Sequence) -> Self {
        Self::new(first.as_view(), second.as_view())
    }

    /// Return the pair with `first` and `second` exchanged.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

fn validate(values: &[f64]) -> Result<(), DistanceError> {
    if values.is_empty() {
        return Err(DistanceError::EmptySeries);
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(DistanceError::NonFiniteValue { index });
    }
    Ok(())
}
