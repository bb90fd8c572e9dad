use std::path::PathBuf;
use std::time::Duration;

use crate::services::option_matcher::MatcherConfig;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 起始地址（登录 / 首页）
    pub start_url: String,
    /// 会员表单入口的绝对地址（导航兜底用）
    pub entry_url: String,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动浏览器（否则连接已运行的浏览器）
    pub launch_browser: bool,
    /// 自行启动时是否无头
    pub headless: bool,
    /// 自行启动时的窗口大小
    pub window_width: u32,
    pub window_height: u32,
    /// 浏览器可执行文件，缺省时由 chromiumoxide 自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 数据文件（TOML，`[[records]]`）
    pub data_file: Option<PathBuf>,
    /// 附件（最终页上传）
    pub attachment_file: Option<PathBuf>,
    /// 审计日志文件（JSON Lines）
    pub audit_log_file: String,
    /// 截图证据目录
    pub evidence_dir: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 登录 ---
    pub login_username: String,
    pub login_password: String,
    /// CapSolver API Key，缺省时不解验证码
    pub captcha_api_key: Option<String>,
    pub captcha_api_base_url: String,
    // --- 工作流 ---
    /// 每条记录的最大循环次数
    pub max_iterations: usize,
    /// 达到循环上限时判定成功所需的最少完成页数
    pub min_completed_pages: usize,
    /// 连续 ERROR 分类的上限
    pub max_error_streak: usize,
    /// 驱动的隐式等待
    pub implicit_wait_ms: u64,
    /// 条件轮询超时
    pub poll_timeout_ms: u64,
    /// 条件轮询间隔
    pub poll_interval_ms: u64,
    /// 选项模糊匹配参数
    pub matcher: MatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_url: "https://friendly-captcha-demo.onrender.com/".to_string(),
            entry_url: "https://friendly-captcha-demo.onrender.com/membership/new?type=packaging-paper"
                .to_string(),
            browser_debug_port: 9222,
            launch_browser: false,
            headless: true,
            window_width: 1366,
            window_height: 900,
            chrome_executable: None,
            data_file: None,
            attachment_file: None,
            audit_log_file: "audit_log.jsonl".to_string(),
            evidence_dir: "evidence".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            login_username: "admin".to_string(),
            login_password: "admin123".to_string(),
            captcha_api_key: None,
            captcha_api_base_url: "https://api.capsolver.com".to_string(),
            max_iterations: 10,
            min_completed_pages: 3,
            max_error_streak: 3,
            implicit_wait_ms: 0,
            poll_timeout_ms: 3000,
            poll_interval_ms: 250,
            matcher: MatcherConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            start_url: std::env::var("START_URL").unwrap_or(default.start_url),
            entry_url: std::env::var("ENTRY_URL").unwrap_or(default.entry_url),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            launch_browser: env_parse("LAUNCH_BROWSER").unwrap_or(default.launch_browser),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            window_width: env_parse("WINDOW_WIDTH").unwrap_or(default.window_width),
            window_height: env_parse("WINDOW_HEIGHT").unwrap_or(default.window_height),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .or(default.chrome_executable),
            data_file: std::env::var("DATA_FILE").ok().map(PathBuf::from).or(default.data_file),
            attachment_file: std::env::var("ATTACHMENT_FILE")
                .ok()
                .map(PathBuf::from)
                .or(default.attachment_file),
            audit_log_file: std::env::var("AUDIT_LOG_FILE").unwrap_or(default.audit_log_file),
            evidence_dir: std::env::var("EVIDENCE_DIR").unwrap_or(default.evidence_dir),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            login_username: std::env::var("LOGIN_USERNAME").unwrap_or(default.login_username),
            login_password: std::env::var("LOGIN_PASSWORD").unwrap_or(default.login_password),
            captcha_api_key: std::env::var("CAPSOLVER_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty())
                .or(default.captcha_api_key),
            captcha_api_base_url: std::env::var("CAPSOLVER_API_BASE_URL")
                .unwrap_or(default.captcha_api_base_url),
            max_iterations: env_parse("MAX_ITERATIONS").unwrap_or(default.max_iterations),
            min_completed_pages: env_parse("MIN_COMPLETED_PAGES").unwrap_or(default.min_completed_pages),
            max_error_streak: env_parse("MAX_ERROR_STREAK").unwrap_or(default.max_error_streak),
            implicit_wait_ms: env_parse("IMPLICIT_WAIT_MS").unwrap_or(default.implicit_wait_ms),
            poll_timeout_ms: env_parse("POLL_TIMEOUT_MS").unwrap_or(default.poll_timeout_ms),
            poll_interval_ms: env_parse("POLL_INTERVAL_MS").unwrap_or(default.poll_interval_ms),
            matcher: MatcherConfig::from_env(),
        }
    }

    /// 用命令行参数覆盖输入文件：`[数据文件] [附件]`
    ///
    /// 文件选择本身发生在上游，这里只接收它的两个结果。
    pub fn with_inputs<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        if let Some(data_file) = args.next() {
            self.data_file = Some(PathBuf::from(data_file));
        }
        if let Some(attachment) = args.next() {
            self.attachment_file = Some(PathBuf::from(attachment));
        }
        self
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(self.poll_timeout_ms),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// 条件轮询策略：超时 + 间隔
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// 最多轮询次数（至少一次）
    pub fn max_attempts(&self) -> usize {
        if self.interval.is_zero() {
            return 1;
        }
        (self.timeout.as_millis() / self.interval.as_millis()).max(1) as usize
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            interval: Duration::from_millis(250),
        }
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let config = Config::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.min_completed_pages, 3);
        assert!(config.captcha_api_key.is_none());
        assert!((config.matcher.threshold - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_with_inputs_overrides_files() {
        let config = Config::default().with_inputs(vec![
            "rows.toml".to_string(),
            "brochure.pdf".to_string(),
        ]);
        assert_eq!(config.data_file, Some(PathBuf::from("rows.toml")));
        assert_eq!(config.attachment_file, Some(PathBuf::from("brochure.pdf")));

        // 没有参数时保持原值
        let config = Config::default().with_inputs(Vec::new());
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_browser_defaults() {
        let config = Config::default();
        // 默认连接已运行的浏览器；自行启动时默认无头
        assert!(!config.launch_browser);
        assert!(config.headless);
        assert_eq!((config.window_width, config.window_height), (1366, 900));
        assert!(config.chrome_executable.is_none());
    }

    #[test]
    fn test_poll_policy_attempts() {
        let policy = PollPolicy::new(Duration::from_millis(1000), Duration::from_millis(250));
        assert_eq!(policy.max_attempts(), 4);

        let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(250));
        assert_eq!(policy.max_attempts(), 1);

        let policy = PollPolicy::new(Duration::from_millis(100), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }
}
