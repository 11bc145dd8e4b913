use harvest_browser::{BrowserActions, BrowserEngine, SessionLauncher};
use harvest_core::BrowserConfig;

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_launch_and_close() {
    let engine = BrowserEngine::new(BrowserConfig::default());
    let mut session = engine.launch().await.expect("launch browser");
    assert!(session.close().await.is_ok());
    // Closing twice is a no-op
    assert!(session.close().await.is_ok());
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed and network access
async fn test_navigation_reports_status() {
    let engine = BrowserEngine::new(BrowserConfig::default());
    let mut session = engine.launch().await.expect("launch browser");

    let load = session
        .navigate("https://example.com/", None)
        .await
        .expect("navigate");
    assert!(load.is_success());

    let html = session.content().await.expect("content");
    assert!(html.contains("Example Domain"));

    let missing = session
        .navigate(
            "https://example.com/definitely-missing",
            Some("https://example.com/"),
        )
        .await
        .expect("navigate");
    assert!(missing.is_not_found() || missing.status == 0);

    session.close().await.expect("close");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_closed_session_rejects_navigation() {
    let engine = BrowserEngine::new(BrowserConfig::default());
    let mut session = engine.launch().await.expect("launch browser");
    session.close().await.expect("close");
    assert!(session.navigate("https://example.com/", None).await.is_err());
}
