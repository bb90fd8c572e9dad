use std::fmt;
use std::path::PathBuf;

/// 一次提交的运行上下文，作为参数传给每个处理器
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 提交 ID（审计日志的主键）
    pub submission_id: String,
    /// 记录在数据源中的序号（从 1 开始）
    pub record_index: usize,
    /// 最终页上传的附件
    pub attachment: Option<PathBuf>,
}

impl RunCtx {
    pub fn new(submission_id: impl Into<String>, record_index: usize, attachment: Option<PathBuf>) -> Self {
        Self {
            submission_id: submission_id.into(),
            record_index,
            attachment,
        }
    }

    /// 按时间戳和记录序号生成提交 ID
    pub fn generate_id(record_index: usize) -> String {
        format!(
            "SUB-{}-{:03}",
            chrono::Local::now().format("%Y%m%d%H%M%S"),
            record_index
        )
    }
}

impl fmt::Display for RunCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[记录 #{} 提交 {}]", self.record_index, self.submission_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_id() {
        let ctx = RunCtx::new("SUB-1", 2, None);
        assert_eq!(ctx.to_string(), "[记录 #2 提交 SUB-1]");

        let id = RunCtx::generate_id(7);
        assert!(id.starts_with("SUB-"));
        assert!(id.ends_with("-007"));
    }
}
