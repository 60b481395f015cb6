//! Scoped session teardown guarantees.

use std::sync::Arc;
use std::time::Duration;

use webauto::testing::StubDriver;
use webauto::{Driver, Error, Session, SessionConfig, Strategy};

fn config() -> SessionConfig {
    SessionConfig {
        mask_automation: false,
        ..SessionConfig::default()
    }
}

async fn scoped_with<T, F, Fut>(driver: Arc<StubDriver>, body: F) -> webauto::Result<T>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = webauto::Result<T>>,
{
    // Mirrors Session::scoped without the real browser launch.
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config()).await?;
    let outcome = body(session).await;
    let _ = driver.quit().await;
    outcome
}

#[tokio::test(start_paused = true)]
async fn body_error_still_tears_down() {
    let driver = Arc::new(StubDriver::new());
    let outcome = scoped_with(driver.clone(), |session| async move {
        session.navigate("https://example.org").await?;
        session.find(Strategy::Css, "#absent").await?;
        Ok(())
    })
    .await;
    assert!(matches!(outcome, Err(Error::NotFound { .. })));
    assert_eq!(driver.quit_calls(), 1);
}

#[tokio::test]
async fn teardown_failure_does_not_mask_body_success() {
    let driver = Arc::new(StubDriver::new());
    driver.fail_quit("browser already gone");
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config())
        .await
        .unwrap();
    let body: webauto::Result<u32> = async {
        session.navigate("https://example.org").await?;
        Ok(7)
    }
    .await;
    // Teardown is logged, never raised over the body's value.
    let teardown = driver.quit().await;
    assert!(teardown.is_err());
    assert_eq!(body.unwrap(), 7);
}

#[tokio::test]
async fn traced_operations_reach_the_driver() {
    let driver = Arc::new(StubDriver::new());
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config())
        .await
        .unwrap();

    session.navigate("https://example.org/a").await.unwrap();
    session.switch_frame(Some(2)).await.unwrap();
    session.accept_alert().await.unwrap();
    session.driver().move_pointer(10.0, 20.0).await.unwrap();

    assert_eq!(driver.navigations(), vec!["https://example.org/a"]);
    assert_eq!(driver.frame(), Some(2));
    assert_eq!(driver.alerts_accepted(), 1);
    assert_eq!(driver.pointer_moves(), vec![(10.0, 20.0)]);
}

#[tokio::test]
async fn click_probes_markup_then_clicks() {
    let driver = Arc::new(StubDriver::new());
    driver.plan_finds([true]);
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config())
        .await
        .unwrap();
    let element = session.find(Strategy::Css, "button").await.unwrap();
    session.click(element.as_ref()).await.unwrap();
    assert_eq!(driver.clicks(), 1);
}

#[tokio::test]
async fn find_by_text_uses_implicit_wait() {
    let driver = Arc::new(StubDriver::new());
    driver.plan_finds([true]);
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config())
        .await
        .unwrap();
    let element = session
        .find_by_text("button", "Submit", webauto::locator::TextScope::Subtree)
        .await
        .unwrap();
    assert_eq!(element.text().await.unwrap(), "stub");
}

#[tokio::test]
async fn find_within_overrides_the_default_deadline() {
    let driver = Arc::new(StubDriver::new());
    let session = Session::attach(driver.clone() as Arc<dyn Driver>, config())
        .await
        .unwrap();
    let err = session
        .find_within(Strategy::Css, "#never", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
