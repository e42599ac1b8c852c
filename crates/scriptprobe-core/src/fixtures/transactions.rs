//! `transactions.csv` for the averaging program.

use super::{FixtureGenerator, FixtureResult, RecordSet, ensure_dir, fixture_rng, write_atomic};
use rand::Rng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const TRANSACTIONS_HEADER: &str = "user,date,category,amount";

const USERS: [&str; 4] = ["alice", "bob", "charlie", "tom"];
const CATEGORIES: [&str; 3] = ["food", "transport", "beauty"];

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub user: String,
    /// Written as given, so invalid dates can be injected.
    pub date: String,
    pub category: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(
        user: impl Into<String>,
        date: impl Into<String>,
        category: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            user: user.into(),
            date: date.into(),
            category: category.into(),
            amount,
        }
    }

    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{:.2}",
            self.user, self.date, self.category, self.amount
        )
    }

    fn random(rng: &mut StdRng) -> Self {
        let user = USERS[rng.gen_range(0..USERS.len())];
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let month = rng.gen_range(1..=12);
        let day = rng.gen_range(1..=28);
        let amount = rng.gen_range(100.0..2000.0);
        Self::new(user, format!("2025-{month:02}-{day:02}"), category, amount)
    }
}

#[derive(Debug, Clone)]
pub struct TransactionFixture {
    records: RecordSet<Transaction>,
    rng: StdRng,
}

impl Default for TransactionFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFixture {
    pub fn new() -> Self {
        Self {
            records: RecordSet::default(),
            rng: fixture_rng(None),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            records: RecordSet::default(),
            rng: fixture_rng(Some(seed)),
        }
    }

    pub fn with_transaction(
        &mut self,
        user: &str,
        date: &str,
        category: &str,
        amount: f64,
    ) -> &mut Self {
        self.add_record(Transaction::new(user, date, category, amount));
        self
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.records.iter()
    }

    pub fn render(&self) -> String {
        let mut rendered = String::with_capacity(32 * (self.records.len() + 1));
        rendered.push_str(TRANSACTIONS_HEADER);
        rendered.push('\n');
        for transaction in self.records.iter() {
            rendered.push_str(&transaction.csv_line());
            rendered.push('\n');
        }
        rendered
    }
}

impl FixtureGenerator for TransactionFixture {
    type Record = Transaction;

    fn reset(&mut self) {
        self.records.clear();
    }

    fn add_record(&mut self, record: Transaction) {
        self.records.push_explicit(record);
    }

    fn generate(&mut self, count: usize) {
        let generated = (0..count)
            .map(|_| Transaction::random(&mut self.rng))
            .collect();
        self.records.replace_synthesized(generated);
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn flush(&self, dir: &Path) -> FixtureResult<Vec<PathBuf>> {
        ensure_dir(dir)?;
        let path = write_atomic(dir, TRANSACTIONS_FILE, &self.render())?;
        Ok(vec![path])
    }
}
