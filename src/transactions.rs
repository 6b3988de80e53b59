use chrono::NaiveDate;
use rusqlite::{named_params, Row};
use serde::Serialize;

use crate::db::Database;
use crate::error::SubtrackError;

/// A stored ledger line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub merchant: String,
    pub category: Option<String>,
    pub account: Option<String>,
    pub original_statement: Option<String>,
    pub notes: Option<String>,
    pub amount: f64,
}

/// A parsed ledger line that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub merchant: String,
    pub category: Option<String>,
    pub account: Option<String>,
    pub original_statement: Option<String>,
    pub notes: Option<String>,
    pub amount: f64,
}

impl Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            date: row.get(1)?,
            merchant: row.get(2)?,
            category: row.get(3)?,
            account: row.get(4)?,
            original_statement: row.get(5)?,
            notes: row.get(6)?,
            amount: row.get(7)?,
        })
    }
}

pub struct Transactions;

impl Transactions {
    pub fn insert(
        tx: &rusqlite::Transaction,
        new_tx: &NewTransaction,
    ) -> Result<(), SubtrackError> {
        let sql = r#"
            INSERT INTO transactions (
                date,
                merchant,
                category,
                account,
                original_statement,
                notes,
                amount,
                created_at
            )
            VALUES (
                :date,
                :merchant,
                :category,
                :account,
                :original_statement,
                :notes,
                :amount,
                strftime('%s', 'now', 'utc')
            )
        "#;

        let mut stmt = tx.prepare_cached(sql)?;
        stmt.execute(named_params! {
            ":date":                new_tx.date,
            ":merchant":            new_tx.merchant,
            ":category":            new_tx.category,
            ":account":             new_tx.account,
            ":original_statement":  new_tx.original_statement,
            ":notes":               new_tx.notes,
            ":amount":              new_tx.amount,
        })?;

        Ok(())
    }

    pub fn insert_all(
        tx: &rusqlite::Transaction,
        new_txs: &[NewTransaction],
    ) -> Result<usize, SubtrackError> {
        for new_tx in new_txs {
            Self::insert(tx, new_tx)?;
        }

        Ok(new_txs.len())
    }

    /// All transactions, newest first.
    pub fn list_all(db: &Database) -> Result<Vec<Transaction>, SubtrackError> {
        let conn = db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, merchant, category, account, original_statement, notes, amount
            FROM transactions
            ORDER BY date DESC, id DESC",
        )?;

        let rows = stmt.query_map([], Transaction::from_row)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?);
        }

        Ok(transactions)
    }

    pub fn count(db: &Database) -> Result<i64, SubtrackError> {
        let conn = db.get_connection()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}
