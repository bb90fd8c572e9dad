pub mod chrome_driver;
pub mod driver;

pub use chrome_driver::ChromeDriver;
pub use driver::{first_match, inspect, poll_until, scripts, wait_for_url_change, Locator, UiDriver};
