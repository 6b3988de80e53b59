use std::fmt;

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use logging_timer::time;
use rusqlite::{named_params, Row};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::SubtrackError;

/// Coarse cadence of a recurring charge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    /// Spans strictly above this many days are annual.
    pub const ANNUAL_MIN_SPAN_EXCLUSIVE: i64 = 300;
    /// Spans strictly above this many days (and not annual) are quarterly.
    pub const QUARTERLY_MIN_SPAN_EXCLUSIVE: i64 = 60;

    /// Classifies a group by the number of days between its first and last charge.
    pub fn from_span_days(span_days: i64) -> Self {
        if span_days > Self::ANNUAL_MIN_SPAN_EXCLUSIVE {
            Frequency::Annual
        } else if span_days > Self::QUARTERLY_MIN_SPAN_EXCLUSIVE {
            Frequency::Quarterly
        } else {
            Frequency::Monthly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "annual" => Some(Frequency::Annual),
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub merchant: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub day_of_month: u32,
    pub last_transaction_date: NaiveDate,
    pub is_active: bool,
    pub is_false_positive: bool,
}

impl Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let frequency_str: String = row.get(3)?;
        let frequency = Frequency::from_string(&frequency_str).unwrap_or_else(|| {
            warn!(
                "Invalid frequency value in database: '{}', defaulting to monthly",
                frequency_str
            );
            Frequency::Monthly
        });

        Ok(Subscription {
            id: row.get(0)?,
            merchant: row.get(1)?,
            amount: row.get(2)?,
            frequency,
            day_of_month: row.get(4)?,
            last_transaction_date: row.get(5)?,
            is_active: row.get(6)?,
            is_false_positive: row.get(7)?,
        })
    }
}

/// One merchant/amount/day-of-month group seen at least twice.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringGroup {
    pub merchant: String,
    pub amount: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub span_days: i64,
}

impl RecurringGroup {
    pub fn frequency(&self) -> Frequency {
        Frequency::from_span_days(self.span_days)
    }

    pub fn day_of_month(&self) -> u32 {
        self.first_date.day()
    }
}

const SELECT_SUBSCRIPTION_COLUMNS: &str = "SELECT id, merchant, amount, frequency, day_of_month, \
    last_transaction_date, is_active, is_false_positive FROM subscriptions";

pub struct Subscriptions;

impl Subscriptions {
    /// Groups every stored transaction by merchant, amount and calendar day and
    /// returns the groups with two or more members.
    pub fn recurring_groups(
        tx: &rusqlite::Transaction,
    ) -> Result<Vec<RecurringGroup>, SubtrackError> {
        let sql = r#"
            SELECT
                merchant,
                amount,
                MIN(date) AS first_date,
                MAX(date) AS last_date,
                CAST(julianday(MAX(date)) - julianday(MIN(date)) AS INTEGER) AS span_days
            FROM transactions
            GROUP BY merchant, amount, CAST(strftime('%d', date) AS INTEGER)
            HAVING COUNT(*) >= 2
            ORDER BY merchant, amount, first_date
        "#;

        let mut stmt = tx.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(RecurringGroup {
                merchant: row.get(0)?,
                amount: row.get(1)?,
                first_date: row.get(2)?,
                last_date: row.get(3)?,
                span_days: row.get(4)?,
            })
        })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }

        Ok(groups)
    }

    /// Recomputes subscription candidates from the full transaction set.
    ///
    /// Groups whose key already has a row are skipped, so user-set status flags
    /// survive every recompute. Returns the number of newly created candidates.
    #[time]
    pub fn detect(tx: &rusqlite::Transaction) -> Result<usize, SubtrackError> {
        let groups = Self::recurring_groups(tx)?;

        let sql = r#"
            INSERT INTO subscriptions (
                merchant,
                amount,
                frequency,
                day_of_month,
                last_transaction_date,
                created_at
            )
            VALUES (
                :merchant,
                :amount,
                :frequency,
                :day_of_month,
                :last_transaction_date,
                strftime('%s', 'now', 'utc')
            )
            ON CONFLICT (merchant, amount, day_of_month) DO NOTHING
        "#;

        let mut stmt = tx.prepare_cached(sql)?;
        let mut inserted = 0;

        for group in &groups {
            inserted += stmt.execute(named_params! {
                ":merchant":              group.merchant,
                ":amount":                group.amount,
                ":frequency":             group.frequency().as_str(),
                ":day_of_month":          group.day_of_month(),
                ":last_transaction_date": group.last_date,
            })?;
        }

        debug!(
            "Subscription detection: {} recurring groups, {} new candidates",
            groups.len(),
            inserted
        );

        Ok(inserted)
    }

    /// All candidates, most recently charged first.
    pub fn list_all(db: &Database) -> Result<Vec<Subscription>, SubtrackError> {
        let conn = db.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY last_transaction_date DESC, id DESC",
            SELECT_SUBSCRIPTION_COLUMNS
        ))?;

        let rows = stmt.query_map([], Subscription::from_row)?;

        let mut subscriptions = Vec::new();
        for row in rows {
            subscriptions.push(row?);
        }

        Ok(subscriptions)
    }

    /// Flags a candidate as not actually recurring. Also deactivates it.
    pub fn mark_false_positive(db: &Database, id: i64) -> Result<(), SubtrackError> {
        let sql = r#"
            UPDATE subscriptions
            SET is_false_positive = 1, is_active = 0
            WHERE id = :id"#;

        Self::update_one(db, id, sql)
    }

    pub fn mark_inactive(db: &Database, id: i64) -> Result<(), SubtrackError> {
        let sql = r#"
            UPDATE subscriptions
            SET is_active = 0
            WHERE id = :id"#;

        Self::update_one(db, id, sql)
    }

    fn update_one(db: &Database, id: i64, sql: &str) -> Result<(), SubtrackError> {
        let conn = db.get_connection()?;
        let updated = conn.execute(sql, named_params! { ":id": id })?;

        if updated == 0 {
            return Err(SubtrackError::NotFound(format!("Subscription {} not found", id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_db;
    use crate::transactions::{NewTransaction, Transactions};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rusqlite::OptionalExtension;

    fn get_by_id(db: &Database, id: i64) -> Option<Subscription> {
        let conn = db.get_connection().unwrap();
        conn.query_row(
            &format!("{} WHERE id = ?", SELECT_SUBSCRIPTION_COLUMNS),
            [id],
            Subscription::from_row,
        )
        .optional()
        .unwrap()
    }

    fn new_tx(date: &str, merchant: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            merchant: merchant.to_owned(),
            category: None,
            account: None,
            original_statement: None,
            notes: None,
            amount,
        }
    }

    /// Inserts the rows and runs detection in one transaction, returning the
    /// number of new candidates.
    fn ingest(db: &Database, rows: &[NewTransaction]) -> usize {
        let mut conn = db.get_connection().unwrap();
        let tx = conn.transaction().unwrap();
        Transactions::insert_all(&tx, rows).unwrap();
        let detected = Subscriptions::detect(&tx).unwrap();
        tx.commit().unwrap();
        detected
    }

    #[test]
    fn test_frequency_boundaries() {
        assert_eq!(Frequency::from_span_days(0), Frequency::Monthly);
        assert_eq!(Frequency::from_span_days(59), Frequency::Monthly);
        assert_eq!(Frequency::from_span_days(60), Frequency::Monthly);
        assert_eq!(Frequency::from_span_days(61), Frequency::Quarterly);
        assert_eq!(Frequency::from_span_days(90), Frequency::Quarterly);
        assert_eq!(Frequency::from_span_days(300), Frequency::Quarterly);
        assert_eq!(Frequency::from_span_days(301), Frequency::Annual);
        assert_eq!(Frequency::from_span_days(310), Frequency::Annual);
    }

    #[test]
    fn test_frequency_string_conversion() {
        assert_eq!(Frequency::from_string("monthly"), Some(Frequency::Monthly));
        assert_eq!(Frequency::from_string(" Annual "), Some(Frequency::Annual));
        assert_eq!(Frequency::from_string("weekly"), None);
        assert_eq!(Frequency::Quarterly.to_string(), "quarterly");
        assert_eq!(
            serde_json::to_string(&Frequency::Annual).unwrap(),
            "\"annual\""
        );
    }

    #[test]
    fn test_monthly_netflix() {
        let (_dir, db) = temp_db();
        let detected = ingest(
            &db,
            &[
                new_tx("2023-01-05", "Netflix", 15.99),
                new_tx("2023-02-05", "Netflix", 15.99),
                new_tx("2023-03-05", "Netflix", 15.99),
            ],
        );
        assert_eq!(detected, 1);

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);

        let netflix = &subscriptions[0];
        assert_eq!(netflix.merchant, "Netflix");
        assert_eq!(netflix.amount, 15.99);
        assert_eq!(netflix.frequency, Frequency::Monthly);
        assert_eq!(netflix.day_of_month, 5);
        assert_eq!(
            netflix.last_transaction_date,
            NaiveDate::from_ymd_opt(2023, 3, 5).unwrap()
        );
        assert!(netflix.is_active);
        assert!(!netflix.is_false_positive);
    }

    #[test]
    fn test_annual_span() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2022-01-15", "Domain Registrar", 12.0),
                new_tx("2022-11-15", "Domain Registrar", 12.0),
            ],
        );

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].frequency, Frequency::Annual);
        assert_eq!(subscriptions[0].day_of_month, 15);
    }

    #[test]
    fn test_quarterly_span() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-20", "Water Utility", 45.5),
                new_tx("2023-04-20", "Water Utility", 45.5),
            ],
        );

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].frequency, Frequency::Quarterly);
    }

    #[test]
    fn test_single_occurrence_is_not_a_subscription() {
        let (_dir, db) = temp_db();
        let detected = ingest(
            &db,
            &[
                new_tx("2023-01-05", "Hardware Store", 129.99),
                new_tx("2023-02-05", "Netflix", 15.99),
            ],
        );

        assert_eq!(detected, 0);
        assert!(Subscriptions::list_all(&db).unwrap().is_empty());
    }

    #[test]
    fn test_groups_split_by_amount_and_day() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-05", "Spotify", 9.99),
                new_tx("2023-02-06", "Spotify", 9.99),
                new_tx("2023-03-05", "Spotify", 10.99),
                new_tx("2023-04-05", "Spotify", 10.99),
            ],
        );

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].amount, 10.99);
        assert_eq!(
            subscriptions[0].last_transaction_date,
            NaiveDate::from_ymd_opt(2023, 4, 5).unwrap()
        );
    }

    #[test]
    fn test_recompute_does_not_duplicate_or_reset_flags() {
        let (_dir, db) = temp_db();
        let rows = [
            new_tx("2023-01-05", "Netflix", 15.99),
            new_tx("2023-02-05", "Netflix", 15.99),
        ];

        assert_eq!(ingest(&db, &rows), 1);
        let id = Subscriptions::list_all(&db).unwrap()[0].id;
        Subscriptions::mark_inactive(&db, id).unwrap();

        assert_eq!(ingest(&db, &rows), 0);
        assert_eq!(Transactions::count(&db).unwrap(), 4);

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].id, id);
        assert!(!subscriptions[0].is_active);
    }

    #[test]
    fn test_existing_candidate_keeps_original_classification() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-05", "Gym", 30.0),
                new_tx("2023-02-05", "Gym", 30.0),
            ],
        );
        ingest(&db, &[new_tx("2023-12-05", "Gym", 30.0)]);

        let subscriptions = Subscriptions::list_all(&db).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].frequency, Frequency::Monthly);
        assert_eq!(
            subscriptions[0].last_transaction_date,
            NaiveDate::from_ymd_opt(2023, 2, 5).unwrap()
        );
    }

    #[test]
    fn test_list_orders_by_last_transaction_date() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-05", "Netflix", 15.99),
                new_tx("2023-02-05", "Netflix", 15.99),
                new_tx("2023-03-12", "Gym", 30.0),
                new_tx("2023-04-12", "Gym", 30.0),
            ],
        );

        let merchants: Vec<String> = Subscriptions::list_all(&db)
            .unwrap()
            .into_iter()
            .map(|s| s.merchant)
            .collect();
        assert_eq!(merchants, vec!["Gym", "Netflix"]);
    }

    #[test]
    fn test_mark_false_positive_then_inactive() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-05", "Coffee Shop", 4.5),
                new_tx("2023-02-05", "Coffee Shop", 4.5),
            ],
        );
        let id = Subscriptions::list_all(&db).unwrap()[0].id;

        Subscriptions::mark_false_positive(&db, id).unwrap();
        let subscription = get_by_id(&db, id).unwrap();
        assert!(subscription.is_false_positive);
        assert!(!subscription.is_active);

        Subscriptions::mark_inactive(&db, id).unwrap();
        Subscriptions::mark_false_positive(&db, id).unwrap();
        let subscription = get_by_id(&db, id).unwrap();
        assert!(subscription.is_false_positive);
        assert!(!subscription.is_active);
    }

    #[test]
    fn test_mark_inactive_leaves_false_positive_unset() {
        let (_dir, db) = temp_db();
        ingest(
            &db,
            &[
                new_tx("2023-01-05", "Netflix", 15.99),
                new_tx("2023-02-05", "Netflix", 15.99),
            ],
        );
        let id = Subscriptions::list_all(&db).unwrap()[0].id;

        Subscriptions::mark_inactive(&db, id).unwrap();
        let subscription = get_by_id(&db, id).unwrap();
        assert!(!subscription.is_active);
        assert!(!subscription.is_false_positive);
    }

    #[test]
    fn test_mutations_on_unknown_id_are_not_found() {
        let (_dir, db) = temp_db();
        assert!(matches!(
            Subscriptions::mark_inactive(&db, 42),
            Err(SubtrackError::NotFound(_))
        ));
        assert!(matches!(
            Subscriptions::mark_false_positive(&db, 42),
            Err(SubtrackError::NotFound(_))
        ));
        assert_eq!(get_by_id(&db, 42), None);
    }

    proptest! {
        #[test]
        fn prop_frequency_is_monotone(a in 0i64..2000, b in 0i64..2000) {
            let rank = |f: Frequency| match f {
                Frequency::Monthly => 0,
                Frequency::Quarterly => 1,
                Frequency::Annual => 2,
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(Frequency::from_span_days(lo)) <= rank(Frequency::from_span_days(hi)));
        }
    }
}
