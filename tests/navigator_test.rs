mod common;

use common::{fast_policy, url, Effect, FakeDriver, FakeElement, ENTRY_URL, SITE};
use wizard_autofill::services::{ActionExecutor, Navigator, PageClassifier};
use wizard_autofill::PageState;

fn navigator() -> Navigator {
    Navigator::new(ENTRY_URL, SITE, fast_policy())
}

#[tokio::test]
async fn test_already_at_target() {
    let page = url("/membership/form/3");
    let driver = FakeDriver::new(&page).with_page(&page, "Membership", vec![]);

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::MembershipPage3,
        )
        .await;

    assert!(arrived);
    // 已在目标页时不做任何交互
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_hub_disclosure_then_entry_link() {
    let dashboard = url("/dashboard");
    let driver = FakeDriver::new(&dashboard)
        .with_page(
            &dashboard,
            "Dashboard",
            vec![
                FakeElement::new("span")
                    .attr("class", "dropdown-arrow")
                    .on_click(Effect::Reveal("menu".to_string())),
                FakeElement::new("a")
                    .attr("href", "/membership/new?type=packaging-paper")
                    .text("Packaging & Paper")
                    .key("menu")
                    .absent()
                    .navigates_to(ENTRY_URL),
            ],
        )
        .with_page(
            ENTRY_URL,
            "New membership",
            vec![
                FakeElement::radio("type", "packaging", "Packaging"),
                FakeElement::radio("type", "other", "Other"),
            ],
        );

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::MembershipForm,
        )
        .await;

    assert!(arrived);
    assert_eq!(driver.url_now(), ENTRY_URL);
    // 先展开菜单，再点入口链接；没有直接跳转
    assert_eq!(driver.count_calls("click"), 2);
    assert_eq!(driver.count_calls("navigate"), 0);
}

#[tokio::test]
async fn test_hub_falls_back_to_entry_url() {
    let dashboard = url("/dashboard");
    let driver = FakeDriver::new(&dashboard).with_page(
        &dashboard,
        "Dashboard",
        vec![FakeElement::new("span").attr("class", "dropdown-arrow")],
    );

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::PackagingChoice,
        )
        .await;

    // 菜单里没有链接时直接跳转入口地址，地址含 packaging 即视为到达
    assert!(arrived);
    assert_eq!(driver.url_now(), ENTRY_URL);
}

#[tokio::test]
async fn test_candidate_url_jump() {
    let page = url("/membership/form/1");
    let driver = FakeDriver::new(&page).with_page(&page, "Membership", vec![]);

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::MembershipPage2,
        )
        .await;

    assert!(arrived);
    assert_eq!(driver.url_now(), url("/membership/form/2"));
}

#[tokio::test]
async fn test_keyword_button() {
    let welcome = url("/welcome");
    let details = url("/details");
    let driver = FakeDriver::new(&welcome)
        .with_page(
            &welcome,
            "Welcome",
            vec![
                FakeElement::new("form"),
                FakeElement::button("Continue").navigates_to(&details),
            ],
        )
        .with_page(
            &details,
            "Details",
            vec![FakeElement::input("email", "email")],
        );

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::CompanyDetails,
        )
        .await;

    assert!(arrived);
    assert_eq!(driver.url_now(), details);
}

#[tokio::test]
async fn test_navigation_failure_returns_false() {
    let page = url("/welcome");
    let driver = FakeDriver::new(&page).with_page(&page, "Welcome", vec![FakeElement::new("form")]);
    driver.fail("navigate");

    let arrived = navigator()
        .navigate(
            &driver,
            &PageClassifier::new(),
            &ActionExecutor::new(),
            PageState::MembershipPage3,
        )
        .await;

    assert!(!arrived);
    assert_eq!(driver.url_now(), page);
}

#[tokio::test]
async fn test_submit_current() {
    let page = url("/membership/form/1");
    let next = url("/membership/form/2");
    let driver = FakeDriver::new(&page).with_page(
        &page,
        "Membership",
        vec![
            FakeElement::submit("Weiter").invisible(),
            FakeElement::button("Next").navigates_to(&next),
        ],
    );

    // 不可见的提交按钮被跳过，按文字找到 Next
    assert!(navigator().submit_current(&driver, &ActionExecutor::new()).await);
    assert_eq!(driver.url_now(), next);

    let empty = url("/empty");
    let driver = FakeDriver::new(&empty).with_page(&empty, "Empty", vec![]);
    assert!(!navigator().submit_current(&driver, &ActionExecutor::new()).await);
}
