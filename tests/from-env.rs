use graph_devflow::utils::from_env::{FromEnv, FromEnvErr};
use std::time::Duration;

#[derive(Debug, FromEnv)]
pub struct PollSettings {
    /// How long to wait between polls.
    #[from_env(var = "TEST_POLL_INTERVAL", desc = "Poll interval in millis")]
    pub interval: Duration,

    #[from_env(var = "TEST_POLL_TENANT", desc = "Tenant to sign in to")]
    pub tenant: String,

    #[from_env(var = "TEST_POLL_HINT", desc = "Login hint", optional)]
    pub hint: Option<String>,

    #[from_env(skip)]
    pub attempts: u32,
}

#[derive(Debug, FromEnv)]
pub struct Nested {
    #[from_env(var = "TEST_NESTED_NAME", desc = "Display name")]
    pub name: String,

    pub poll: PollSettings,
}

const VARS: [&str; 4] = [
    "TEST_POLL_INTERVAL",
    "TEST_POLL_TENANT",
    "TEST_POLL_HINT",
    "TEST_NESTED_NAME",
];

fn clear_env() {
    VARS.iter().for_each(|var| std::env::remove_var(var));
}

#[test]
#[serial_test::serial]
fn load_nested() {
    clear_env();
    std::env::set_var("TEST_POLL_INTERVAL", "1500");
    std::env::set_var("TEST_POLL_TENANT", "contoso");
    std::env::set_var("TEST_POLL_HINT", "megan@contoso.com");
    std::env::set_var("TEST_NESTED_NAME", "devflow");

    let nested = Nested::from_env().unwrap();
    assert_eq!(nested.name, "devflow");
    assert_eq!(nested.poll.interval, Duration::from_millis(1500));
    assert_eq!(nested.poll.tenant, "contoso");
    assert_eq!(nested.poll.hint.as_deref(), Some("megan@contoso.com"));
    assert_eq!(nested.poll.attempts, 0);

    std::env::remove_var("TEST_POLL_HINT");
    let nested = Nested::from_env().unwrap();
    assert_eq!(nested.poll.hint, None);

    clear_env();
}

#[test]
#[serial_test::serial]
fn inventory_lists_nested_vars() {
    let vars: Vec<_> = Nested::inventory().into_iter().map(|item| item.var).collect();
    assert_eq!(
        vars,
        [
            "TEST_NESTED_NAME",
            "TEST_POLL_INTERVAL",
            "TEST_POLL_TENANT",
            "TEST_POLL_HINT"
        ]
    );
}

#[test]
#[serial_test::serial]
fn check_inventory_reports_required_only() {
    clear_env();
    std::env::set_var("TEST_POLL_INTERVAL", "10");

    let missing: Vec<_> = PollSettings::check_inventory()
        .unwrap_err()
        .into_iter()
        .map(|item| item.var)
        .collect();
    assert_eq!(missing, ["TEST_POLL_TENANT"]);

    let err = PollSettings::from_env().unwrap_err();
    assert!(err.is_missing());

    clear_env();
}

#[test]
#[serial_test::serial]
fn parse_errors_name_the_var() {
    clear_env();
    std::env::set_var("TEST_POLL_INTERVAL", "soon");
    std::env::set_var("TEST_POLL_TENANT", "contoso");

    match PollSettings::from_env().unwrap_err() {
        FromEnvErr::ParseError { var, .. } => assert_eq!(var, "TEST_POLL_INTERVAL"),
        other => panic!("expected a parse error, got {other:?}"),
    }

    clear_env();
}
