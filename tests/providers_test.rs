mod common;

use common::{fast_config, init_logger, FakePage, FakeResponse, FakeWeb, Failure};
use feedscout::search::engines::{bing, brave, mojeek, EngineSettings};
use feedscout::search::{BingProvider, BraveProvider, MojeekProvider, SearchProvider};
use feedscout::{CaptchaGuard, PageDriver, UrlScorer};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> EngineSettings {
    EngineSettings::from_config(&fast_config())
}

fn brave() -> BraveProvider {
    BraveProvider::new(settings(), 5)
}

fn mojeek() -> MojeekProvider {
    MojeekProvider::new(settings(), 10, UrlScorer::default(), Duration::from_millis(100))
}

fn bing() -> BingProvider {
    BingProvider::new(settings(), Duration::from_millis(20))
}

fn open(web: FakeWeb) -> (Arc<FakeWeb>, FakePage) {
    let web = Arc::new(web);
    (Arc::clone(&web), FakePage::new(web))
}

#[tokio::test]
async fn brave_returns_first_release_link() {
    init_logger();
    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new().links(
            brave::RESULT_LINKS,
            &[
                "https://fastapi.tiangolo.com/",
                "https://github.com/tiangolo/fastapi",
                "https://github.com/tiangolo/fastapi/releases",
            ],
        ),
    ));

    let found = brave().search(&page, "FastAPI").await.unwrap();
    assert_eq!(
        found.as_deref(),
        Some("https://github.com/tiangolo/fastapi/releases")
    );
}

#[tokio::test]
async fn brave_dismisses_captcha_before_reading_results() {
    let (web, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new()
            .button("I'm not a robot")
            .links(brave::RESULT_LINKS, &["https://github.com/tokio-rs/tokio/releases"]),
    ));

    let found = brave().search(&page, "tokio").await.unwrap();
    assert_eq!(found.as_deref(), Some("https://github.com/tokio-rs/tokio/releases"));
    assert_eq!(web.clicks(), vec!["I'm not a robot".to_string()]);
}

#[tokio::test]
async fn brave_navigation_failure_is_no_result() {
    let (_, page) = open(FakeWeb::new());
    assert_eq!(brave().search(&page, "anything").await.unwrap(), None);

    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new().fails(Failure::Navigation),
    ));
    assert_eq!(brave().search(&page, "anything").await.unwrap(), None);
}

#[tokio::test]
async fn brave_navigation_timeout_is_no_result() {
    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new().delay(Duration::from_secs(5)),
    ));
    assert_eq!(brave().search(&page, "slow").await.unwrap(), None);
}

#[tokio::test]
async fn brave_lost_script_context_is_no_result() {
    let (web, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new()
            .links(brave::RESULT_LINKS, &["https://github.com/facebook/react/releases"])
            .read_fails(),
    ));
    assert_eq!(brave().search(&page, "react").await.unwrap(), None);
    assert_eq!(web.visits_to("https://search.brave.com/search"), 1);
}

#[tokio::test]
async fn closed_tab_is_no_result() {
    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://search.brave.com/search",
        FakeResponse::new().fails(Failure::Closed),
    ));
    assert_eq!(brave().search(&page, "anything").await.unwrap(), None);

    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://www.mojeek.com/search",
        FakeResponse::new().fails(Failure::Closed),
    ));
    assert_eq!(mojeek().search(&page, "anything").await.unwrap(), None);
}

fn mojeek_results() -> FakeResponse {
    FakeResponse::new().child_links(
        mojeek::RESULT_ITEMS,
        mojeek::ITEM_LINK,
        &[
            "https://github.com/other/irrelevant",
            "https://stackoverflow.com/questions/react",
            "https://github.com/facebook/react",
        ],
    )
}

#[tokio::test]
async fn mojeek_upgrades_best_match_to_release_page() {
    let (web, page) = open(
        FakeWeb::new()
            .route_prefix("https://www.mojeek.com/search", mojeek_results())
            .route(
                "https://github.com/facebook/react/releases",
                FakeResponse::new().title("Releases · facebook/react"),
            ),
    );

    let found = mojeek().search(&page, "react").await.unwrap();
    assert_eq!(
        found.as_deref(),
        Some("https://github.com/facebook/react/releases")
    );
    assert_eq!(web.visits_to("https://github.com/facebook/react/releases"), 1);
}

#[tokio::test]
async fn mojeek_keeps_bare_match_when_release_page_is_missing() {
    let (_, page) = open(
        FakeWeb::new()
            .route_prefix("https://www.mojeek.com/search", mojeek_results())
            .route(
                "https://github.com/facebook/react/releases",
                FakeResponse::new().title("Page not found · GitHub"),
            ),
    );
    let found = mojeek().search(&page, "react").await.unwrap();
    assert_eq!(found.as_deref(), Some("https://github.com/facebook/react"));

    // A release page that cannot be reached is not fatal either.
    let (_, page) = open(
        FakeWeb::new().route_prefix("https://www.mojeek.com/search", mojeek_results()),
    );
    let found = mojeek().search(&page, "react").await.unwrap();
    assert_eq!(found.as_deref(), Some("https://github.com/facebook/react"));
}

#[tokio::test]
async fn mojeek_release_page_match_is_kept_as_is() {
    let (web, page) = open(FakeWeb::new().route_prefix(
        "https://www.mojeek.com/search",
        FakeResponse::new().child_links(
            mojeek::RESULT_ITEMS,
            mojeek::ITEM_LINK,
            &["https://github.com/facebook/react/releases/"],
        ),
    ));
    let found = mojeek().search(&page, "react").await.unwrap();
    assert_eq!(
        found.as_deref(),
        Some("https://github.com/facebook/react/releases/")
    );
    assert_eq!(web.visits_to("https://github.com/facebook/react/releases"), 0);
}

#[tokio::test]
async fn mojeek_without_host_matches_is_no_result() {
    let (web, page) = open(FakeWeb::new().route_prefix(
        "https://www.mojeek.com/search",
        FakeResponse::new().child_links(
            mojeek::RESULT_ITEMS,
            mojeek::ITEM_LINK,
            &["https://react.dev/", "https://github.com/"],
        ),
    ));
    assert_eq!(mojeek().search(&page, "react").await.unwrap(), None);
    assert_eq!(web.visits_to("https://github.com"), 0);
}

#[tokio::test]
async fn bing_prefers_direct_answer_panel() {
    let (_, page) = open(FakeWeb::new().route_prefix(
        "https://www.bing.com/search",
        FakeResponse::new()
            .links(bing::ANSWER_LINK, &["https://github.com/numpy/numpy/releases"])
            .links(bing::ORGANIC_LINK, &["https://github.com/numpy/numpy"]),
    ));
    let found = bing().search(&page, "numpy").await.unwrap();
    assert_eq!(found.as_deref(), Some("https://github.com/numpy/numpy/releases"));
}

#[tokio::test]
async fn bing_falls_back_to_first_organic_result() {
    let (web, page) = open(FakeWeb::new().route_prefix(
        "https://www.bing.com/search",
        FakeResponse::new().links(
            bing::ORGANIC_LINK,
            &["https://github.com/numpy/numpy", "https://github.com/other/numpy"],
        ),
    ));
    let found = bing().search(&page, "numpy").await.unwrap();
    assert_eq!(found.as_deref(), Some("https://github.com/numpy/numpy"));

    let visited = web.visits();
    assert!(visited[0].contains("setlang=en-us"));
    assert!(visited[0].contains("-site%3Areddit.com"));
}

#[tokio::test]
async fn bing_without_results_is_no_result() {
    let (_, page) = open(
        FakeWeb::new().route_prefix("https://www.bing.com/search", FakeResponse::new()),
    );
    assert_eq!(bing().search(&page, "nothing").await.unwrap(), None);
}

#[tokio::test]
async fn captcha_guard_is_best_effort() {
    let guard = CaptchaGuard::new("I'm not a robot", Duration::from_millis(20), Duration::from_millis(1));

    let (web, page) = open(FakeWeb::new().route("https://a.test/", FakeResponse::new()));
    page.goto("https://a.test/", Duration::from_millis(50)).await.unwrap();
    assert!(!guard.dismiss(&page).await);
    assert!(web.clicks().is_empty());

    let (web, page) = open(
        FakeWeb::new().route("https://a.test/", FakeResponse::new().button("I'm not a robot")),
    );
    page.goto("https://a.test/", Duration::from_millis(50)).await.unwrap();
    assert!(guard.dismiss(&page).await);
    assert_eq!(web.clicks().len(), 1);

    let (web, page) = open(FakeWeb::new().route(
        "https://a.test/",
        FakeResponse::new().button("I'm not a robot").click_fails(),
    ));
    page.goto("https://a.test/", Duration::from_millis(50)).await.unwrap();
    assert!(!guard.dismiss(&page).await);
    assert!(web.clicks().is_empty());
}
