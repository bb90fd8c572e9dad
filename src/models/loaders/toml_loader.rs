use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::error::DataSourceError;
use crate::models::{FieldKey, Record};

/// 校验时必需的列
pub const REQUIRED_FIELDS: [FieldKey; 2] = [FieldKey::CompanyName, FieldKey::Country];

#[derive(Debug, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<toml::Table>,
}

/// 数据源：TOML 文件中的 `[[records]]` 数组
#[derive(Debug, Clone)]
pub struct RecordSource {
    path: PathBuf,
    records: Vec<Record>,
}

/// 数据源校验结果
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub row_count: usize,
    pub found_columns: Vec<String>,
    pub missing_required: Vec<String>,
    pub error: Option<String>,
}

impl RecordSource {
    /// 从 TOML 文件加载全部记录
    pub async fn load(path: &Path) -> Result<Self, DataSourceError> {
        let display = path.display().to_string();
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(DataSourceError::NotFound { path: display });
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DataSourceError::ReadFailed {
                path: display.clone(),
                source: Box::new(e),
            })?;

        let records = parse_records(&content).map_err(|e| DataSourceError::ParseFailed {
            path: display,
            source: Box::new(e),
        })?;

        tracing::debug!("从 {} 读取到 {} 条记录", path.display(), records.len());

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn from_records(path: impl Into<PathBuf>, records: Vec<Record>) -> Self {
        Self {
            path: path.into(),
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 全部记录，保持源顺序（含空行）
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 至少有一个非空值的记录数
    pub fn row_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_blank()).count()
    }

    /// 按首次出现顺序列出全部列名
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in &self.records {
            for (name, _) in record.columns() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        columns
    }

    /// 缺失的必需列
    pub fn missing_required(&self) -> Vec<String> {
        let columns = self.columns();
        REQUIRED_FIELDS
            .iter()
            .filter(|field| !columns.iter().any(|c| field.matches_column(c)))
            .map(|field| field.canonical().to_string())
            .collect()
    }

    /// 校验数据文件：能解析、非空、包含必需列
    pub async fn validate(path: &Path) -> ValidationReport {
        match Self::load(path).await {
            Ok(source) => source.report(),
            Err(e) => ValidationReport {
                is_valid: false,
                error: Some(e.to_string()),
                ..ValidationReport::default()
            },
        }
    }

    pub fn report(&self) -> ValidationReport {
        let row_count = self.row_count();
        let missing_required = self.missing_required();
        let error = if row_count == 0 {
            Some(DataSourceError::Empty {
                path: self.path.display().to_string(),
            }
            .to_string())
        } else if !missing_required.is_empty() {
            Some(
                DataSourceError::MissingColumns {
                    columns: missing_required.clone(),
                }
                .to_string(),
            )
        } else {
            None
        };

        ValidationReport {
            is_valid: error.is_none(),
            row_count,
            found_columns: self.columns(),
            missing_required,
            error,
        }
    }
}

/// 解析 TOML 文本为记录列表
pub fn parse_records(content: &str) -> Result<Vec<Record>, toml::de::Error> {
    let file: RecordsFile = toml::from_str(content)?;
    Ok(file
        .records
        .into_iter()
        .map(|table| {
            Record::new(
                table
                    .into_iter()
                    .filter_map(|(key, value)| stringify(value).map(|v| (key, v)))
                    .collect(),
            )
        })
        .collect())
}

fn stringify(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
