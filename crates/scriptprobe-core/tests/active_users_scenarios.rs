#![cfg(unix)]

use chrono::{Days, Local};
use scriptprobe_core::{ActiveUsersFixture, ProgramConfig, ProgramKind, given};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn active_window_includes_the_thirtieth_day_and_excludes_banned_users() {
    let temp = TempDir::new().expect("tempdir should be created");

    given(program(&temp), ActiveUsersFixture::seeded(1))
        .expect("config should be valid")
        .configure(|fixture| {
            fixture
                .with_user("alice")
                .with_user("bob")
                .with_user("carol")
                .with_user("dave")
                .with_login_days_ago("alice", 5)
                .with_login_days_ago("bob", 30)
                .with_login_days_ago("carol", 31)
                .with_login_days_ago("dave", 1)
                .with_login_days_ago("mallory", 2)
                .with_banned_user("dave");
        })
        .when()
        .expect("fixture should flush")
        .execute()
        .expect("program should run")
        .exit_code_is(0)
        .file_exists()
        .has_valid_structure()
        .contains_record("alice")
        .contains_record("bob")
        .does_not_contain_record("carol")
        .does_not_contain_record("dave")
        .does_not_contain_record("mallory")
        .value_equals("alice", "last_login", &days_ago(5))
        .all_dates_within_days("last_login", 30)
        .has_row_count(2)
        .is_sorted_by_key()
        .no_stale_artifacts();
}

#[test]
fn most_recent_login_wins() {
    let temp = TempDir::new().expect("tempdir should be created");

    given(program(&temp), ActiveUsersFixture::seeded(2))
        .expect("config should be valid")
        .configure(|fixture| {
            fixture
                .with_user("eve")
                .with_login_days_ago("eve", 45)
                .with_login_days_ago("eve", 3)
                .with_login_days_ago("eve", 20);
        })
        .when()
        .expect("fixture should flush")
        .execute()
        .expect("program should run")
        .exit_code_is(0)
        .has_no_duplicates()
        .value_equals("eve", "last_login", &days_ago(3))
        .has_row_count(1);
}

#[test]
fn generated_dataset_satisfies_global_properties() {
    let temp = TempDir::new().expect("tempdir should be created");

    let scenario = given(program(&temp), ActiveUsersFixture::seeded(3))
        .expect("config should be valid")
        .configure(|fixture| {
            fixture.generate_dataset(50, 200);
        });
    let banned = scenario
        .fixture()
        .banned()
        .map(str::to_string)
        .collect::<Vec<_>>();
    assert_eq!(banned.len(), 5);

    let mut then = scenario
        .when()
        .expect("fixture should flush")
        .execute()
        .expect("program should run")
        .exit_code_is(0)
        .execution_time_within(10_000)
        .has_valid_structure()
        .has_no_duplicates()
        .is_sorted_by_key()
        .all_fields_non_empty()
        .all_dates_within_days("last_login", 30);

    for login in &banned {
        then = then.does_not_contain_record(login.as_str());
    }
    assert!(then.record_count() <= 45);
}

#[test]
fn empty_inputs_produce_header_only() {
    let temp = TempDir::new().expect("tempdir should be created");

    let then = given(program(&temp), ActiveUsersFixture::seeded(4))
        .expect("config should be valid")
        .when()
        .expect("fixture should flush")
        .execute()
        .expect("program should run")
        .exit_code_is(0)
        .has_valid_structure()
        .has_row_count(0);

    assert!(then.keys().is_empty());
}

#[test]
fn missing_input_file_argument_is_reported() {
    let temp = TempDir::new().expect("tempdir should be created");

    let ready = given(program(&temp), ActiveUsersFixture::seeded(5))
        .expect("config should be valid")
        .generate(3)
        .when()
        .expect("fixture should flush");
    let mut arguments = ready.fixture_files().to_vec();
    assert!(arguments[2].ends_with("banned.json"));
    arguments[2] = PathBuf::from("nonexistent.json");

    let then = ready
        .execute_with(arguments)
        .expect("program should run")
        .exit_code_is(1)
        .contains_error("One of the input files not found")
        .error_is("❌ One of the input files not found.");

    assert!(then.verifier().check_file_exists().is_err());
}

#[test]
fn input_files_are_read_from_arguments_not_the_working_directory() {
    let temp = TempDir::new().expect("tempdir should be created");
    let elsewhere = temp.path().join("elsewhere");
    fs::create_dir_all(&elsewhere).expect("working dir should be created");

    given(
        program(&temp).with_working_dir(&elsewhere),
        ActiveUsersFixture::seeded(6),
    )
    .expect("config should be valid")
    .configure(|fixture| {
        fixture.with_user("alice").with_login_days_ago("alice", 2);
    })
    .when()
    .expect("fixture should flush")
    .execute()
    .expect("program should run")
    .exit_code_is(0);

    let result = fs::read_to_string(elsewhere.join("active_users.csv"))
        .expect("result is written to the working directory");
    assert_eq!(result, format!("login,last_login\nalice,{}\n", days_ago(2)));
}

fn program(temp: &TempDir) -> ProgramConfig {
    let script =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/programs/check_active_users.sh");
    ProgramConfig::preset(ProgramKind::CheckActiveUsers, script, temp.path().join("data"))
        .with_interpreter(Some("sh"))
        .with_timeout(Duration::from_secs(20))
}

fn days_ago(days: u64) -> String {
    Local::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .expect("date should be representable")
        .format("%Y-%m-%d")
        .to_string()
}
