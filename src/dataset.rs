//! CSV reader for labelled sequences.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};
use warpnn_distance::Sequence;

/// Labelled sequences plus the class names behind each label index.
#[derive(Debug)]
pub struct LabelledDataset {
    /// One sequence per CSV row, in file order.
    pub sequences: Vec<Sequence>,
    /// `class_names[label]` is the raw label text for that index.
    pub class_names: Vec<String>,
}

impl LabelledDataset {
    /// Length of the longest sequence.
    pub fn max_len(&self) -> usize {
        self.sequences.iter().map(Sequence::len).max().unwrap_or(0)
    }
}

/// Reads `label,t0,t1,...` rows.
///
/// Rows may differ in length. Empty trailing cells are ignored. Class labels are
/// arbitrary text, mapped to indices in sorted order.
pub struct SequenceReader {
    path: PathBuf,
    has_header: bool,
}

impl SequenceReader {
    /// Create a reader for the given CSV file.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            has_header: false,
        }
    }

    /// Skip the first row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Read and validate every row.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<LabelledDataset> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
        for (row_index, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("malformed CSV row {row_index}"))?;
            let mut cells = record.iter();
            let Some(label) = cells.next().filter(|l| !l.is_empty()) else {
                bail!("row {row_index} has no class label");
            };

            let values = cells
                .filter(|c| !c.is_empty())
                .enumerate()
                .map(|(col, cell)| {
                    cell.parse::<f64>().with_context(|| {
                        format!("row {row_index}, column {}: cannot parse {cell:?}", col + 1)
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push((label.to_string(), values));
        }

        if rows.is_empty() {
            bail!("{} contains no data rows", self.path.display());
        }

        let class_names: Vec<String> = rows
            .iter()
            .map(|(label, _)| label.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut sequences = Vec::with_capacity(rows.len());
        for (row_index, (label, values)) in rows.into_iter().enumerate() {
            let class = class_names
                .binary_search(&label)
                .map_err(|_| anyhow::anyhow!("row {row_index}: unmapped label {label:?}"))?;
            let seq = Sequence::labeled(values, class)
                .with_context(|| format!("row {row_index} is not a valid sequence"))?;
            sequences.push(seq);
        }

        debug!(classes = ?class_names, "class labels mapped");
        info!(
            n_sequences = sequences.len(),
            n_classes = class_names.len(),
            "dataset loaded"
        );
        Ok(LabelledDataset {
            sequences,
            class_names,
        })
    }
}
