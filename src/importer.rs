use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use logging_timer::time;
use rusqlite::TransactionBehavior;
use serde::Deserialize;

use crate::db::Database;
use crate::error::SubtrackError;
use crate::subscriptions::Subscriptions;
use crate::transactions::{NewTransaction, Transactions};

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

/// Parses a money amount, tolerating `$`, thousands separators and
/// accounting-style negatives like `(12.50)`. Anything unparseable is `0`.
pub fn parse_amount(raw: &str) -> f64 {
    let s = raw.replace([',', '$', '"'], "");
    let s = s.trim();

    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.trim().parse::<f64>().map(|v| -v),
        None => s.parse::<f64>(),
    };

    match value {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Accepts `YYYY-MM-DD` (optionally followed by a time), `YYYY/MM/DD`,
/// `MM/DD/YYYY` and `MM/DD/YY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);

    if date_part.contains('-') {
        return NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok();
    }

    let parts: Vec<&str> = date_part.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let format = if parts[0].len() == 4 {
        "%Y/%m/%d"
    } else if parts[2].len() == 2 {
        "%m/%d/%y"
    } else {
        "%m/%d/%Y"
    };

    NaiveDate::parse_from_str(date_part, format).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Merchant")]
    merchant: String,
    #[serde(rename = "Category", default)]
    category: Option<String>,
    #[serde(rename = "Account", default)]
    account: Option<String>,
    #[serde(rename = "Original Statement", default)]
    original_statement: Option<String>,
    #[serde(rename = "Notes", default)]
    notes: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<String>,
}

impl CsvRow {
    fn into_new_transaction(self, line: u64) -> Result<NewTransaction, SubtrackError> {
        let date = parse_date(&self.date).ok_or_else(|| SubtrackError::InvalidRow {
            line,
            message: format!("unrecognized date '{}'", self.date),
        })?;

        Ok(NewTransaction {
            date,
            merchant: self.merchant.trim().to_owned(),
            category: non_empty(self.category),
            account: non_empty(self.account),
            original_statement: non_empty(self.original_statement),
            notes: non_empty(self.notes),
            amount: self.amount.as_deref().map(parse_amount).unwrap_or(0.0),
        })
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub transactions_imported: usize,
    pub subscriptions_detected: usize,
}

pub struct Importer;

impl Importer {
    /// Parses every row before returning; the first bad row fails the whole file.
    pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>, SubtrackError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row: CsvRow = record.deserialize(Some(&headers))?;
            rows.push(row.into_new_transaction(line)?);
        }

        Ok(rows)
    }

    /// Stores the parsed rows and recomputes subscription candidates in a single
    /// write transaction. Nothing is stored if any step fails.
    #[time]
    pub fn import_csv<R: Read>(db: &Database, reader: R) -> Result<ImportSummary, SubtrackError> {
        let new_txs = Self::parse_csv(reader)?;

        let mut conn = db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let transactions_imported = Transactions::insert_all(&tx, &new_txs)?;
        let subscriptions_detected = Subscriptions::detect(&tx)?;

        tx.commit()?;

        info!(
            "Imported {} transactions, detected {} new subscriptions",
            transactions_imported, subscriptions_detected
        );

        Ok(ImportSummary {
            transactions_imported,
            subscriptions_detected,
        })
    }

    pub fn import_file(db: &Database, path: &Path) -> Result<ImportSummary, SubtrackError> {
        let file = File::open(path)?;
        Self::import_csv(db, BufReader::new(file))
    }
}
