//! `users.txt`, `logins.csv` and `banned.json` for the active-user filter.

use super::{
    FixtureGenerator, FixtureResult, RecordSet, ensure_dir, fixture_rng, write_atomic, write_json,
};
use chrono::{Days, Local, NaiveDate};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const USERS_FILE: &str = "users.txt";
pub const LOGINS_FILE: &str = "logins.csv";
pub const BANNED_FILE: &str = "banned.json";
pub const LOGINS_HEADER: &str = "login,last_login";

const BASE_NAMES: [&str; 10] = [
    "alice", "bob", "carol", "dave", "eve", "frank", "grace", "henry", "ivy", "jack",
];
const DATASET_LOGIN_WINDOW_DAYS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEntry {
    /// A line of `users.txt`.
    User(String),
    /// A row of `logins.csv`; the date is written as given.
    Login { login: String, last_login: String },
    /// An element of `banned.json`.
    Banned(String),
}

#[derive(Debug, Clone)]
pub struct ActiveUsersFixture {
    records: RecordSet<AccountEntry>,
    rng: StdRng,
}

impl Default for ActiveUsersFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveUsersFixture {
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

    pub fn with_user(&mut self, login: &str) -> &mut Self {
        self.add_record(AccountEntry::User(login.to_string()));
        self
    }

    pub fn with_login(&mut self, login: &str, last_login: &str) -> &mut Self {
        self.add_record(AccountEntry::Login {
            login: login.to_string(),
            last_login: last_login.to_string(),
        });
        self
    }

    /// Login dated `days_ago` days before today's local date.
    pub fn with_login_days_ago(&mut self, login: &str, days_ago: u64) -> &mut Self {
        let date = days_before_today(days_ago);
        self.with_login(login, &date)
    }

    pub fn with_banned_user(&mut self, login: &str) -> &mut Self {
        self.add_record(AccountEntry::Banned(login.to_string()));
        self
    }

    /// `user_count` synthesized users, `login_count` random login draws among
    /// them within the last sixty days, and one distinct banned user per ten
    /// users. A user drawn more than once keeps only the last draw, so
    /// `logins.csv` holds at most one synthesized row per user.
    pub fn generate_dataset(&mut self, user_count: usize, login_count: usize) -> &mut Self {
        self.generate(user_count);
        if user_count == 0 {
            return self;
        }

        let mut latest_draw = BTreeMap::new();
        for _ in 0..login_count {
            let index = self.rng.gen_range(0..user_count);
            let days_ago = self.rng.gen_range(0..DATASET_LOGIN_WINDOW_DAYS);
            latest_draw.insert(index, days_ago);
        }

        let mut extra = Vec::with_capacity(latest_draw.len() + user_count / 10);
        extra.extend(latest_draw.into_iter().map(|(index, days_ago)| AccountEntry::Login {
            login: synthesized_login(index),
            last_login: days_before_today(days_ago),
        }));

        let banned = rand::seq::index::sample(&mut self.rng, user_count, user_count / 10);
        extra.extend(
            banned
                .into_iter()
                .map(|index| AccountEntry::Banned(synthesized_login(index))),
        );

        self.records.extend_synthesized(extra);
        self
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|entry| match entry {
            AccountEntry::User(login) => Some(login.as_str()),
            _ => None,
        })
    }

    pub fn logins(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().filter_map(|entry| match entry {
            AccountEntry::Login { login, last_login } => Some((login.as_str(), last_login.as_str())),
            _ => None,
        })
    }

    pub fn banned(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|entry| match entry {
            AccountEntry::Banned(login) => Some(login.as_str()),
            _ => None,
        })
    }

    pub fn synthesized_count(&self) -> usize {
        self.records.synthesized().len()
    }
}

impl FixtureGenerator for ActiveUsersFixture {
    type Record = AccountEntry;

    fn reset(&mut self) {
        self.records.clear();
    }

    fn add_record(&mut self, record: AccountEntry) {
        self.records.push_explicit(record);
    }

    fn generate(&mut self, count: usize) {
        let users = (0..count)
            .map(|index| AccountEntry::User(synthesized_login(index)))
            .collect();
        self.records.replace_synthesized(users);
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn flush(&self, dir: &Path) -> FixtureResult<Vec<PathBuf>> {
        ensure_dir(dir)?;

        let users = self.users().fold(String::new(), |mut acc, login| {
            acc.push_str(login);
            acc.push('\n');
            acc
        });

        let mut logins = format!("{LOGINS_HEADER}\n");
        for (login, last_login) in self.logins() {
            logins.push_str(&format!("{login},{last_login}\n"));
        }

        let banned = self.banned().collect::<Vec<_>>();

        Ok(vec![
            write_atomic(dir, USERS_FILE, &users)?,
            write_atomic(dir, LOGINS_FILE, &logins)?,
            write_json(dir, BANNED_FILE, &banned)?,
        ])
    }
}

/// `alice`..`jack` for the first ten users, then the base name suffixed with
/// the index (`alice10`, `bob11`, ...).
pub fn synthesized_login(index: usize) -> String {
    let base = BASE_NAMES[index % BASE_NAMES.len()];
    if index < BASE_NAMES.len() {
        base.to_string()
    } else {
        format!("{base}{index}")
    }
}

fn days_before_today(days_ago: u64) -> String {
    let today = Local::now().date_naive();
    today
        .checked_sub_days(Days::new(days_ago))
        .unwrap_or(NaiveDate::MIN)
        .format("%Y-%m-%d")
        .to_string()
}
