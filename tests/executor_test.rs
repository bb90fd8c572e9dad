mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{url, FakeDriver, FakeElement};
use wizard_autofill::infrastructure::{Locator, UiDriver};
use wizard_autofill::models::ControlHandle;
use wizard_autofill::services::{ActionExecutor, InteractionStrategy, UiAction};

/// 只计数、不操作页面的策略
struct Counting {
    name: &'static str,
    succeeds: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl InteractionStrategy for Counting {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, _driver: &dyn UiDriver, _target: &ControlHandle, _action: &UiAction) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.succeeds
    }
}

fn counting(name: &'static str, succeeds: bool) -> (Box<dyn InteractionStrategy>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let strategy = Counting {
        name,
        succeeds,
        calls: calls.clone(),
    };
    (Box::new(strategy), calls)
}

async fn handle_of(driver: &FakeDriver, locator: Locator) -> ControlHandle {
    driver
        .locate(&locator)
        .await
        .unwrap()
        .into_iter()
        .next()
        .expect("测试页面上应有该控件")
}

fn button_page() -> FakeDriver {
    let page = url("/membership/form/1");
    FakeDriver::new(&page).with_page(&page, "Membership", vec![FakeElement::button("Next")])
}

#[test]
fn test_default_strategy_order() {
    assert_eq!(
        ActionExecutor::new().strategy_names(),
        vec!["native", "scripted", "pointer", "label"]
    );
}

#[tokio::test]
async fn test_first_success_stops_the_cascade() {
    let driver = button_page();
    let target = handle_of(&driver, Locator::text("button", "next")).await;

    let (a, a_calls) = counting("a", false);
    let (b, b_calls) = counting("b", true);
    let (c, c_calls) = counting("c", true);
    let executor = ActionExecutor::with_strategies(vec![a, b, c]);

    assert!(executor.click(&driver, &target).await);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_strategies_fail() {
    let driver = button_page();
    let target = handle_of(&driver, Locator::text("button", "next")).await;

    let (a, a_calls) = counting("a", false);
    let (b, b_calls) = counting("b", false);
    let executor = ActionExecutor::with_strategies(vec![a, b]);

    assert!(!executor.click(&driver, &target).await);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_inert_native_click_falls_through_to_script() {
    let page = url("/membership/form/2");
    let driver = FakeDriver::new(&page).with_page(
        &page,
        "Membership",
        vec![FakeElement::radio("online_store", "yes", "Yes").key("yes")],
    );
    // 原生点击"成功"但没有效果，验证不通过
    driver.fail("inert");

    let target = handle_of(&driver, Locator::css("input[type=\"radio\"]")).await;
    assert!(ActionExecutor::new().click(&driver, &target).await);

    assert_eq!(driver.count_calls("click"), 1);
    assert_eq!(driver.count_calls("script"), 1);
    assert!(driver.element("yes").unwrap().selected);
}

#[tokio::test]
async fn test_fill_falls_back_to_script() {
    let page = url("/membership/form/3");
    let driver = FakeDriver::new(&page).with_page(
        &page,
        "Membership",
        vec![FakeElement::input("text", "city").key("city")],
    );
    driver.fail("type");

    let target = handle_of(&driver, Locator::name("city")).await;
    assert!(ActionExecutor::new().fill(&driver, &target, "München").await);
    assert_eq!(driver.element("city").unwrap().value, "München");
}

#[tokio::test]
async fn test_select_by_value() {
    let page = url("/membership/form/1");
    let driver = FakeDriver::new(&page).with_page(
        &page,
        "Membership",
        vec![FakeElement::select("country", &[("Please select", ""), ("Germany", "DE")]).key("country")],
    );
    let target = handle_of(&driver, Locator::name("country")).await;
    let executor = ActionExecutor::new();

    assert!(executor.select(&driver, &target, "DE").await);
    assert_eq!(driver.element("country").unwrap().value, "DE");

    // 所有策略都失败
    driver.fail("script");
    driver.fail("select");
    driver.fail("pointer");
    assert!(!executor.select(&driver, &target, "FR").await);
}
