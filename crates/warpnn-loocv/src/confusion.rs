//! Confusion matrix and per-class metrics over leave-one-out predictions.

use std::fmt;

use serde::Serialize;

use crate::error::LoocvError;

/// Square count table: `get(t, p)` is how many instances of class `t` were predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    n_classes: usize,
    counts: Vec<usize>,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// TP / (TP + FP); 0.0 when the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN); 0.0 when the class has no instances.
    pub recall: f64,
    /// Harmonic mean of precision and recall; 0.0 when both are zero.
    pub f1: f64,
    /// Number of instances whose true class is this one.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally `(true, predicted)` label pairs.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::EmptyDataset`] when no pairs are given.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (usize, usize)>,
        n_classes: usize,
    ) -> Result<Self, LoocvError> {
        let mut counts = vec![0usize; n_classes * n_classes];
        let mut any = false;
        for (t, p) in pairs {
            counts[t * n_classes + p] += 1;
            any = true;
        }
        if !any {
            return Err(LoocvError::EmptyDataset);
        }
        Ok(Self { n_classes, counts })
    }

    /// Count of instances with true class `t` predicted as `p`.
    #[must_use]
    pub fn get(&self, t: usize, p: usize) -> usize {
        self.counts[t * self.n_classes + p]
    }

    /// Total number of tallied instances.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Number of instances on the diagonal.
    #[must_use]
    pub fn correct(&self) -> usize {
        (0..self.n_classes).map(|c| self.get(c, c)).sum()
    }

    /// Proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes)
            .map(|c| {
                let tp = self.get(c, c);
                let predicted: usize = (0..self.n_classes).map(|t| self.get(t, c)).sum();
                let support: usize = (0..self.n_classes).map(|p| self.get(c, p)).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Unweighted mean F1 over classes that have at least one instance.
    #[must_use]
    pub fn macro_f1(&self) -> f64 {
        let present: Vec<f64> = self
            .class_metrics()
            .into_iter()
            .filter(|m| m.support > 0)
            .map(|m| m.f1)
            .collect();
        if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        }
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for p in 0..self.n_classes {
            write!(f, " pred_{p:>3}")?;
        }
        writeln!(f)?;

        for t in 0..self.n_classes {
            write!(f, "true_{t:>3}")?;
            for p in 0..self.n_classes {
                write!(f, " {:>8}", self.get(t, p))?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(true_labels: &[usize], predicted: &[usize], n: usize) -> ConfusionMatrix {
        ConfusionMatrix::from_pairs(
            true_labels.iter().copied().zip(predicted.iter().copied()),
            n,
        )
        .unwrap()
    }

    #[test]
    fn perfect_predictions() {
        let m = cm(&[0, 0, 1, 1, 2, 2], &[0, 0, 1, 1, 2, 2], 3);
        assert!((m.accuracy() - 1.0).abs() < f64::EPSILON);
        assert!((m.macro_f1() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rotating_errors() {
        let m = cm(&[0, 0, 0, 1, 1, 1, 2, 2, 2], &[0, 0, 1, 1, 1, 2, 2, 2, 0], 3);
        let metrics = m.class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert_eq!(m.correct(), 6);
        assert!((m.accuracy() - 6.0 / 9.0).abs() < 1e-10);
        assert_eq!(m.get(2, 0), 1);
    }

    #[test]
    fn empty_pairs_error() {
        let err = ConfusionMatrix::from_pairs(std::iter::empty(), 3).unwrap_err();
        assert!(matches!(err, LoocvError::EmptyDataset));
    }

    #[test]
    fn absent_class_excluded_from_macro_f1() {
        let m = cm(&[0, 0, 1, 1], &[0, 0, 1, 1], 3);
        assert_eq!(m.class_metrics()[2].support, 0);
        assert!((m.macro_f1() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn display_has_headers() {
        let out = format!("{}", cm(&[0, 1], &[0, 1], 2));
        assert!(out.contains("pred_"));
        assert!(out.contains("true_"));
    }
}
