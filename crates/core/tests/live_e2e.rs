//! End-to-end smoke tests against a real browser.
//!
//! These launch real browser instances and use `data:` URLs to avoid
//! network dependencies. Skipped unless `WEBAUTO_E2E=1` is set, since they
//! need a Chrome or Chromium binary on the host.

use webauto::{FailureClass, Session, SessionConfig, Strategy, classify};

fn e2e_enabled() -> bool {
    std::env::var("WEBAUTO_E2E").map(|v| v == "1").unwrap_or(false)
}

fn headless_config() -> SessionConfig {
    SessionConfig {
        headless: true,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn launch_navigate_find_and_quit() {
    if !e2e_enabled() {
        eprintln!("skipping: set WEBAUTO_E2E=1 to run live browser tests");
        return;
    }
    let heading = Session::scoped(headless_config(), |session| async move {
        session
            .navigate("data:text/html,<h1>Hello</h1><p>world</p>")
            .await?;
        let heading = session.find(Strategy::Css, "h1").await?;
        Ok(heading.text().await?)
    })
    .await
    .unwrap();
    assert_eq!(heading, "Hello");
}

#[tokio::test]
async fn lookup_after_teardown_is_a_fault() {
    if !e2e_enabled() {
        eprintln!("skipping: set WEBAUTO_E2E=1 to run live browser tests");
        return;
    }
    let session = Session::launch(headless_config()).await.unwrap();
    let driver = session.driver().clone();
    session.close().await.unwrap();
    let err = driver.find(Strategy::Css, "h1").await.unwrap_err();
    assert_eq!(classify(&err), FailureClass::Fault);
}

#[tokio::test]
async fn script_evaluation_round_trips_values() {
    if !e2e_enabled() {
        eprintln!("skipping: set WEBAUTO_E2E=1 to run live browser tests");
        return;
    }
    Session::scoped(headless_config(), |session| async move {
        session.navigate("data:text/html,<title>t</title>").await?;
        let value = session.execute_script("6 * 7").await?;
        assert_eq!(value.as_i64(), Some(42));
        Ok(())
    })
    .await
    .unwrap();
}
