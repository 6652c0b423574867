//! Feature correlation analysis
//!
//! Pearson correlation over the labelled rows of a feature table, either
//! every column against the `winning_team` label or one column against the
//! rest. Unplayed games carry no label and are left out of both.

use std::fmt;

use crate::predict::matchup::FeatureTable;
use crate::{HoopError, Result};

/// Name used for the label column
pub const LABEL_COLUMN: &str = "winning_team";

/// One column's correlation with a target
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub column: String,
    /// `None` when either side has zero variance
    pub value: Option<f64>,
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(r) => write!(f, "{:<16} {:>7.3}", self.column, r),
            None => write!(f, "{:<16} {:>7}", self.column, "n/a"),
        }
    }
}

/// Pearson correlation coefficient
///
/// `None` for fewer than two points, mismatched lengths or a constant series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Column-major view of the labelled rows: feature columns then the label
fn labelled_columns(table: &FeatureTable) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut columns = vec![Vec::new(); table.columns.len()];
    let mut labels = Vec::new();
    for (row, label) in table.labelled() {
        for (column, value) in columns.iter_mut().zip(&row.values) {
            column.push(*value);
        }
        labels.push(f64::from(label));
    }
    (columns, labels)
}

/// Highest correlation first; undefined correlations last
fn sort_descending(correlations: &mut [Correlation]) {
    correlations.sort_by(|a, b| match (a.value, b.value) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Every feature column's correlation with the label
///
/// Labels are 0 for a home win and 1 for an away win, so a positive value
/// means the feature rises with away wins.
pub fn label_correlations(table: &FeatureTable) -> Vec<Correlation> {
    let (columns, labels) = labelled_columns(table);
    let mut correlations: Vec<Correlation> = table
        .columns
        .iter()
        .zip(&columns)
        .map(|(name, values)| Correlation {
            column: name.clone(),
            value: pearson(values, &labels),
        })
        .collect();
    sort_descending(&mut correlations);
    correlations
}

/// One feature's correlation with every other column, label included
pub fn feature_correlations(table: &FeatureTable, feature: &str) -> Result<Vec<Correlation>> {
    let target = table
        .columns
        .iter()
        .position(|c| c == feature)
        .ok_or_else(|| HoopError::UnknownColumn(feature.to_string()))?;

    let (columns, labels) = labelled_columns(table);
    let target_values = &columns[target];

    let mut correlations: Vec<Correlation> = table
        .columns
        .iter()
        .zip(&columns)
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(_, (name, values))| Correlation {
            column: name.clone(),
            value: pearson(target_values, values),
        })
        .collect();
    correlations.push(Correlation {
        column: LABEL_COLUMN.to_string(),
        value: pearson(target_values, &labels),
    });
    sort_descending(&mut correlations);

    log::debug!(
        "Correlated {} against {} columns over {} labelled rows",
        feature,
        correlations.len(),
        labels.len()
    );
    Ok(correlations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::predict::matchup::FeatureRow;
    use crate::{Config, Matchup, TeamId};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(d: &str, winner: Option<&str>, values: Vec<f64>) -> FeatureRow {
        let home = TeamId::from("T");
        let away = TeamId::from("V");
        let matchup = match winner {
            Some(w) => Matchup::completed(date(d), home, away, TeamId::from(w)),
            None => Matchup::scheduled(date(d), home, away),
        };
        FeatureRow {
            label: matchup.label(),
            as_of: matchup.date,
            matchup,
            values,
        }
    }

    fn table(rows: Vec<FeatureRow>) -> FeatureTable {
        let mut config = Config::default();
        config.schema.derived.clear();
        FeatureTable {
            schema: FeatureSchema::from_config(&config).unwrap(),
            columns: vec!["home_pts".into(), "away_pts".into(), "home_ast".into()],
            rows,
            skipped: Vec::new(),
        }
    }

    fn value_of(correlations: &[Correlation], column: &str) -> Option<f64> {
        correlations
            .iter()
            .find(|c| c.column == column)
            .and_then(|c| c.value)
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);

        let r = pearson(&xs, &[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert!((r - 0.8).abs() < 1e-12);

        assert_eq!(pearson(&xs, &[5.0; 4]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&xs, &[1.0, 2.0]), None);
    }

    #[test]
    fn test_label_correlations_use_labelled_rows_only() {
        let table = table(vec![
            row("2024-01-01", Some("T"), vec![110.0, 100.0, 25.0]),
            row("2024-01-02", Some("V"), vec![100.0, 110.0, 25.0]),
            row("2024-01-03", Some("T"), vec![115.0, 98.0, 25.0]),
            row("2024-01-04", Some("V"), vec![95.0, 112.0, 25.0]),
            // Unplayed: would flip every sign if it were counted
            row("2024-01-05", None, vec![0.0, 500.0, 90.0]),
        ]);

        let correlations = label_correlations(&table);
        assert_eq!(correlations.len(), 3);
        assert_eq!(correlations[0].column, "away_pts");
        assert!(value_of(&correlations, "away_pts").unwrap() > 0.9);
        assert!(value_of(&correlations, "home_pts").unwrap() < -0.9);
        // Constant column sorts last
        assert_eq!(correlations[2].column, "home_ast");
        assert_eq!(correlations[2].value, None);
    }

    #[test]
    fn test_feature_correlations() {
        let table = table(vec![
            row("2024-01-01", Some("T"), vec![110.0, 100.0, 20.0]),
            row("2024-01-02", Some("V"), vec![100.0, 110.0, 30.0]),
            row("2024-01-03", Some("T"), vec![120.0, 90.0, 10.0]),
        ]);

        let correlations = feature_correlations(&table, "home_pts").unwrap();
        let columns: Vec<&str> = correlations.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(columns.len(), 3);
        assert!(!columns.contains(&"home_pts"));
        assert!(columns.contains(&LABEL_COLUMN));

        assert!((value_of(&correlations, "away_pts").unwrap() + 1.0).abs() < 1e-12);
        assert!((value_of(&correlations, "home_ast").unwrap() + 1.0).abs() < 1e-12);
        assert!(value_of(&correlations, LABEL_COLUMN).unwrap() < 0.0);
    }

    #[test]
    fn test_unknown_feature() {
        let table = table(Vec::new());
        assert!(matches!(
            feature_correlations(&table, "home_reb"),
            Err(HoopError::UnknownColumn(c)) if c == "home_reb"
        ));
        // No labelled rows: every value is undefined
        assert!(label_correlations(&table).iter().all(|c| c.value.is_none()));
    }

    #[test]
    fn test_display() {
        let c = Correlation {
            column: "home_pts".into(),
            value: Some(-0.25),
        };
        assert_eq!(c.to_string(), "home_pts          -0.250");
        let undefined = Correlation {
            column: "home_ast".into(),
            value: None,
        };
        assert!(undefined.to_string().ends_with("n/a"));
    }
}
