//! Polling lookup behavior against a scripted driver.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use webauto::locator::{OnMissing, TextScope, wait_for_presence, wait_for_text_match};
use webauto::testing::StubDriver;
use webauto::{Error, Strategy, repeated_lookup};

#[tokio::test]
async fn zero_timeout_still_checks_once() {
    let driver = StubDriver::new();
    driver.plan_finds([true]);
    let found = wait_for_presence(
        &driver,
        Strategy::Css,
        "#present",
        Duration::ZERO,
        OnMissing::Raise,
    )
    .await
    .unwrap();
    assert!(found.is_some());
}

#[tokio::test(start_paused = true)]
async fn presence_appears_after_a_few_polls() {
    let driver = StubDriver::new();
    driver.plan_finds([false, false, false, true]);
    let found = wait_for_presence(
        &driver,
        Strategy::Css,
        "#late",
        Duration::from_secs(5),
        OnMissing::Raise,
    )
    .await
    .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn raise_policy_names_the_locator() {
    let driver = StubDriver::new();
    let err = wait_for_presence(
        &driver,
        Strategy::XPath,
        "//missing",
        Duration::ZERO,
        OnMissing::Raise,
    )
    .await
    .unwrap_err();
    match err {
        Error::NotFound { locator } => assert_eq!(locator, "xpath=//missing"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn suppress_policy_reports_absence_as_success() {
    let driver = StubDriver::new();
    let found = wait_for_presence(
        &driver,
        Strategy::Css,
        "#ghost",
        Duration::ZERO,
        OnMissing::Suppress,
    )
    .await
    .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn text_match_waits_on_escaped_xpath() {
    let driver = StubDriver::new();
    driver.plan_finds([true]);
    let found = wait_for_text_match(
        &driver,
        "button",
        "it's \"done\"",
        TextScope::Subtree,
        Duration::ZERO,
        OnMissing::Raise,
    )
    .await
    .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn text_match_rejects_structural_tags() {
    let driver = StubDriver::new();
    let err = wait_for_text_match(
        &driver,
        "a]|//input[",
        "x",
        TextScope::SelfOnly,
        Duration::ZERO,
        OnMissing::Raise,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn repeated_lookup_yields_each_hit_then_ends() {
    let driver = Arc::new(StubDriver::new());
    driver.plan_finds([true, true]);
    let stream = repeated_lookup(
        driver.clone() as Arc<dyn webauto::Driver>,
        Strategy::Css,
        "li.row",
        Duration::ZERO,
    );
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn repeated_lookup_on_immediate_miss_is_empty() {
    let driver = Arc::new(StubDriver::new());
    let stream = repeated_lookup(
        driver as Arc<dyn webauto::Driver>,
        Strategy::Css,
        "li.row",
        Duration::ZERO,
    );
    let items: Vec<_> = stream.collect().await;
    assert!(items.is_empty());
}
