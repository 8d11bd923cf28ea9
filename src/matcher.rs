use crate::loader::{PredictedRecord, TruthRecord};
use std::collections::HashMap;

/// Truth and predicted value for one field, and whether they agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComparison {
    pub truth: Option<String>,
    pub predicted: Option<String>,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub filename: String,
    pub plate: FieldComparison,
    pub make: FieldComparison,
    pub model: FieldComparison,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub matched: usize,
    pub total: usize,
}

impl Tally {
    fn count(&mut self, matched: bool) {
        self.total += 1;
        if matched {
            self.matched += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub rows: Vec<MatchRow>,
    pub plate: Tally,
    pub make: Tally,
    pub model: Tally,
}

/// Plates compare case-insensitively; a missing value counts as `""`, so two
/// missing plates agree.
pub fn plate_match(truth: Option<&str>, predicted: Option<&str>) -> bool {
    truth.unwrap_or("").to_uppercase() == predicted.unwrap_or("").to_uppercase()
}

/// Same rule as plates.
pub fn make_match(truth: Option<&str>, predicted: Option<&str>) -> bool {
    truth.unwrap_or("").to_lowercase() == predicted.unwrap_or("").to_lowercase()
}

/// Either side containing the other, ignoring case. Unlike plate and make,
/// a missing value never matches.
pub fn model_match(truth: Option<&str>, predicted: Option<&str>) -> bool {
    match (truth, predicted) {
        (Some(t), Some(p)) => {
            let t = t.to_lowercase();
            let p = p.to_lowercase();
            t.contains(&p) || p.contains(&t)
        }
        _ => false,
    }
}

/// Inner join on filename, in truth-table order. A filename repeated on
/// either side produces one pair per combination.
pub fn join<'a>(
    truth: &'a [TruthRecord],
    predicted: &'a [PredictedRecord],
) -> Vec<(&'a TruthRecord, &'a PredictedRecord)> {
    let mut by_name: HashMap<&str, Vec<&PredictedRecord>> = HashMap::new();
    for p in predicted {
        by_name.entry(p.filename.as_str()).or_default().push(p);
    }
    truth
        .iter()
        .flat_map(|t| {
            by_name
                .get(t.filename.as_str())
                .into_iter()
                .flatten()
                .map(move |p| (t, *p))
        })
        .collect()
}

fn compare(
    truth: &Option<String>,
    predicted: &Option<String>,
    rule: fn(Option<&str>, Option<&str>) -> bool,
) -> FieldComparison {
    FieldComparison {
        truth: truth.clone(),
        predicted: predicted.clone(),
        matched: rule(truth.as_deref(), predicted.as_deref()),
    }
}

pub fn evaluate(truth: &[TruthRecord], predicted: &[PredictedRecord]) -> MatchReport {
    let mut report = MatchReport::default();
    for (t, p) in join(truth, predicted) {
        let row = MatchRow {
            filename: t.filename.clone(),
            plate: compare(&t.plate, &p.plate, plate_match),
            make: compare(&t.make, &p.make, make_match),
            model: compare(&t.model, &p.model, model_match),
        };
        report.plate.count(row.plate.matched);
        report.make.count(row.make.matched);
        report.model.count(row.model.matched);
        report.rows.push(row);
    }
    report
}
