//! Temporal train/test split.
//!
//! Rows strictly before the cutoff go to training, everything at or after it
//! goes to test. The target column is peeled off into a parallel sequence so
//! the feature rows can be handed to a model without leaking actuals.

use crate::domain::{format_timestamp, time_range, FeatureRow, FrameSchema, SeriesFrame, Timestamp};

/// One side of a split: feature rows and their targets, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPart {
    pub rows: Vec<FeatureRow>,
    pub target: Vec<Option<f64>>,
}

impl SplitPart {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        time_range(self.rows.iter().map(|r| r.timestamp))
    }

    fn push(&mut self, row: FeatureRow, target: Option<f64>) {
        self.rows.push(row);
        self.target.push(target);
    }
}

#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub schema: FrameSchema,
    pub cutoff: Timestamp,
    pub train: SplitPart,
    pub test: SplitPart,
}

/// Split a frame at `cutoff` (exclusive for training).
///
/// `FeatureRow::position` is the record's index in the source frame, so the
/// two parts can always be traced back to the original row order. An empty
/// side is allowed and only logged.
pub fn temporal_split(frame: &SeriesFrame, cutoff: Timestamp) -> TemporalSplit {
    let mut train = SplitPart::default();
    let mut test = SplitPart::default();

    for (position, record) in frame.records.iter().enumerate() {
        let row = record.to_feature_row(position);
        if record.timestamp < cutoff {
            train.push(row, record.target);
        } else {
            test.push(row, record.target);
        }
    }

    if train.is_empty() || test.is_empty() {
        tracing::warn!(
            cutoff = %format_timestamp(cutoff),
            train = train.len(),
            test = test.len(),
            "Cutoff lies outside the data's time range; one side of the split is empty"
        );
    }

    TemporalSplit {
        schema: frame.schema.clone(),
        cutoff,
        train,
        test,
    }
}

impl TemporalSplit {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Cutoff: {} (exclusive for training)\n", format_timestamp(self.cutoff)));
        out.push_str(&format!("Train: {}\n", describe_part(&self.train)));
        out.push_str(&format!("Test : {}\n", describe_part(&self.test)));
        out
    }
}

fn describe_part(part: &SplitPart) -> String {
    match part.time_range() {
        Some((lo, hi)) => format!(
            "n={} | [{}, {}] | missing target={}",
            part.len(),
            format_timestamp(lo),
            format_timestamp(hi),
            part.target.iter().filter(|y| y.is_none()).count()
        ),
        None => "n=0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, GrainKey, SeriesRecord};

    fn frame(rows: &[(&str, Option<f64>)]) -> SeriesFrame {
        SeriesFrame {
            schema: FrameSchema {
                time_column: "timeStamp".to_string(),
                target_column: "demand".to_string(),
                grain_columns: Vec::new(),
                covariate_columns: Vec::new(),
            },
            records: rows
                .iter()
                .map(|(t, y)| SeriesRecord {
                    timestamp: parse_timestamp(t).unwrap(),
                    grain: GrainKey::single(),
                    target: *y,
                    covariates: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn month_boundary_example() {
        let f = frame(&[("2017-01-31 23:00", Some(100.0)), ("2017-02-01 00:00", Some(110.0))]);
        let split = temporal_split(&f, parse_timestamp("2017-02-01").unwrap());

        assert_eq!(split.train.len(), 1);
        assert_eq!(split.train.target, vec![Some(100.0)]);
        assert_eq!(split.train.rows[0].timestamp, parse_timestamp("2017-01-31 23:00").unwrap());

        assert_eq!(split.test.len(), 1);
        assert_eq!(split.test.target, vec![Some(110.0)]);
        assert_eq!(split.test.rows[0].timestamp, parse_timestamp("2017-02-01 00:00").unwrap());
    }

    #[test]
    fn every_record_lands_exactly_once_in_order() {
        // Deliberately unsorted input.
        let f = frame(&[
            ("2017-01-03 00:00", Some(3.0)),
            ("2017-01-01 00:00", Some(1.0)),
            ("2017-01-04 00:00", None),
            ("2017-01-02 00:00", Some(2.0)),
            ("2017-01-05 00:00", Some(5.0)),
        ]);
        let cutoff = parse_timestamp("2017-01-03").unwrap();
        let split = temporal_split(&f, cutoff);

        assert_eq!(split.train.len() + split.test.len(), f.len());
        assert!(split.train.rows.iter().all(|r| r.timestamp < cutoff));
        assert!(split.test.rows.iter().all(|r| r.timestamp >= cutoff));

        let train_pos: Vec<usize> = split.train.rows.iter().map(|r| r.position).collect();
        let test_pos: Vec<usize> = split.test.rows.iter().map(|r| r.position).collect();
        assert_eq!(train_pos, vec![1, 3]);
        assert_eq!(test_pos, vec![0, 2, 4]);
        assert_eq!(split.test.target, vec![Some(3.0), None, Some(5.0)]);
    }

    #[test]
    fn cutoff_outside_range_yields_empty_side() {
        let f = frame(&[("2017-01-01 00:00", Some(1.0)), ("2017-01-01 01:00", Some(2.0))]);

        let early = temporal_split(&f, parse_timestamp("2016-01-01").unwrap());
        assert!(early.train.is_empty());
        assert_eq!(early.test.len(), 2);

        let late = temporal_split(&f, parse_timestamp("2018-01-01").unwrap());
        assert_eq!(late.train.len(), 2);
        assert!(late.test.is_empty());
        assert!(late.summary().contains("Test : n=0"));
    }
}
