//! `users.txt`, `users.json` and `users.csv` for the record-merging program.

use super::{
    FixtureGenerator, FixtureResult, RecordSet, ensure_dir, fixture_rng, write_atomic, write_json,
};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const USERS_FILE: &str = "users.txt";
pub const NAMES_FILE: &str = "users.json";
pub const EMAILS_FILE: &str = "users.csv";
pub const EMAILS_HEADER: &str = "login,email";

const FULL_NAMES: [&str; 10] = [
    "Alice Smith",
    "Bob Johnson",
    "Carol Lee",
    "Dave Brown",
    "Eve Wilson",
    "Frank Miller",
    "Grace Davis",
    "Henry Garcia",
    "Ivy Rodriguez",
    "Jack Martinez",
];
const DOMAINS: [&str; 4] = ["example.com", "test.org", "demo.net", "sample.io"];
const MAX_INCOMPLETE_USERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEntry {
    /// Listed in `users.txt` only.
    Login(String),
    /// An entry of `users.json`.
    Name { login: String, name: String },
    /// A row of `users.csv`.
    Email { login: String, email: String },
    /// Present in all three files.
    Complete {
        login: String,
        name: String,
        email: String,
    },
}

impl UserEntry {
    fn listed_login(&self) -> Option<&str> {
        match self {
            Self::Login(login) | Self::Complete { login, .. } => Some(login.as_str()),
            _ => None,
        }
    }

    fn name(&self) -> Option<(&str, &str)> {
        match self {
            Self::Name { login, name } | Self::Complete { login, name, .. } => {
                Some((login.as_str(), name.as_str()))
            }
            _ => None,
        }
    }

    fn email(&self) -> Option<(&str, &str)> {
        match self {
            Self::Email { login, email } | Self::Complete { login, email, .. } => {
                Some((login.as_str(), email.as_str()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeUsersFixture {
    records: RecordSet<UserEntry>,
    rng: StdRng,
}

impl Default for MergeUsersFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeUsersFixture {
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
        self.add_record(UserEntry::Login(login.to_string()));
        self
    }

    pub fn with_user_name(&mut self, login: &str, name: &str) -> &mut Self {
        self.add_record(UserEntry::Name {
            login: login.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_user_email(&mut self, login: &str, email: &str) -> &mut Self {
        self.add_record(UserEntry::Email {
            login: login.to_string(),
            email: email.to_string(),
        });
        self
    }

    pub fn with_complete_user(&mut self, login: &str, name: &str, email: &str) -> &mut Self {
        self.add_record(UserEntry::Complete {
            login: login.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        });
        self
    }

    /// `user_count` complete users plus up to five `incompleteN` users that
    /// each randomly lack a name, an email, or both.
    pub fn generate_dataset(&mut self, user_count: usize) -> &mut Self {
        self.generate(user_count);

        let incomplete_count = (user_count / 10).min(MAX_INCOMPLETE_USERS);
        let mut extra = Vec::new();
        for index in 0..incomplete_count {
            let login = format!("incomplete{index}");
            extra.push(UserEntry::Login(login.clone()));
            if self.rng.gen_bool(0.5) {
                extra.push(UserEntry::Name {
                    login: login.clone(),
                    name: format!("Incomplete User {index}"),
                });
            }
            if self.rng.gen_bool(0.5) {
                extra.push(UserEntry::Email {
                    email: format!("{login}@incomplete.com"),
                    login,
                });
            }
        }

        self.records.extend_synthesized(extra);
        self
    }

    pub fn logins(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(UserEntry::listed_login)
    }

    /// Login to name as written to `users.json`. A later name for the same
    /// login replaces an earlier one, since a JSON object holds one value per key.
    pub fn names(&self) -> BTreeMap<&str, &str> {
        self.records.iter().filter_map(UserEntry::name).collect()
    }

    pub fn emails(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().filter_map(UserEntry::email)
    }
}

impl FixtureGenerator for MergeUsersFixture {
    type Record = UserEntry;

    fn reset(&mut self) {
        self.records.clear();
    }

    fn add_record(&mut self, record: UserEntry) {
        self.records.push_explicit(record);
    }

    fn generate(&mut self, count: usize) {
        let users = (0..count)
            .map(|index| {
                let login = format!("user{}", index + 1);
                UserEntry::Complete {
                    name: FULL_NAMES[index % FULL_NAMES.len()].to_string(),
                    email: format!("{login}@{}", DOMAINS[index % DOMAINS.len()]),
                    login,
                }
            })
            .collect();
        self.records.replace_synthesized(users);
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn flush(&self, dir: &Path) -> FixtureResult<Vec<PathBuf>> {
        ensure_dir(dir)?;

        let mut users = String::new();
        for login in self.logins() {
            users.push_str(login);
            users.push('\n');
        }

        let mut emails = format!("{EMAILS_HEADER}\n");
        for (login, email) in self.emails() {
            emails.push_str(&format!("{login},{email}\n"));
        }

        Ok(vec![
            write_atomic(dir, USERS_FILE, &users)?,
            write_json(dir, NAMES_FILE, &self.names())?,
            write_atomic(dir, EMAILS_FILE, &emails)?,
        ])
    }
}
