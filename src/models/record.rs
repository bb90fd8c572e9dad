//! 数据记录
//!
//! 一行输入数据驱动一次向导提交。列名来自外部表格，
//! 同一个字段可能有多种写法，查找顺序：标准列名 → 变体 → 空白归一化比较。

use std::fmt;

use phf::phf_set;

/// 表示"是"的取值
static YES_TOKENS: phf::Set<&'static str> = phf_set! {
    "yes", "ja", "true", "1", "x", "y",
};

/// 表示"否"的取值
static NO_TOKENS: phf::Set<&'static str> = phf_set! {
    "no", "nein", "false", "0", "n", "not", "kein",
};

/// 向导使用的标准字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    CompanyName,
    Country,
    Salutation,
    FirstName,
    LastName,
    Email,
    Street,
    PostalCode,
    City,
    Phone,
    Website,
    BusinessActivity,
    SubActivity,
    OnlineStore,
    OnlineStoreSells,
    PackagingManufacturing,
    TermsAccepted,
}

impl FieldKey {
    /// 标准列名
    pub fn canonical(self) -> &'static str {
        match self {
            FieldKey::CompanyName => "Company Name",
            FieldKey::Country => "Country",
            FieldKey::Salutation => "Salutation",
            FieldKey::FirstName => "First Name",
            FieldKey::LastName => "Last Name",
            FieldKey::Email => "Email Address",
            FieldKey::Street => "Number and Street",
            FieldKey::PostalCode => "Postal Code",
            FieldKey::City => "City",
            FieldKey::Phone => "Phone",
            FieldKey::Website => "Website",
            FieldKey::BusinessActivity => "Business Activity",
            FieldKey::SubActivity => "Sub-Activity",
            FieldKey::OnlineStore => "Does your client have an online store?",
            FieldKey::OnlineStoreSells => "In their online store, my client sells…",
            FieldKey::PackagingManufacturing => "📦 Packaging Manufacturing",
            FieldKey::TermsAccepted => "I accept the Terms and Conditions",
        }
    }

    /// 已知的列名变体
    pub fn variants(self) -> &'static [&'static str] {
        match self {
            FieldKey::Country => &["Country2"],
            FieldKey::Email => &["Email Adress", "Email"],
            FieldKey::Phone => &["Phone Number"],
            FieldKey::BusinessActivity => &["Business Activity "],
            FieldKey::SubActivity => &[
                "Sub-activity",
                "Sub Activity",
                "Sub activity",
                "Subactivity",
                "subactivity",
                "Sub-Activity ",
                "Sub-activity ",
            ],
            FieldKey::OnlineStoreSells => &["In their online store, my client sells..."],
            FieldKey::PackagingManufacturing => &["Packaging Manufacturing"],
            FieldKey::TermsAccepted => &["I accept the Terms and Conditions "],
            _ => &[],
        }
    }
}

impl FieldKey {
    /// 列名是否指向该字段（忽略大小写与多余空白）
    pub fn matches_column(self, column: &str) -> bool {
        let column = normalize_key(column);
        std::iter::once(self.canonical())
            .chain(self.variants().iter().copied())
            .any(|name| normalize_key(name) == column)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// 一条记录：列名 → 值，保持来源顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    columns: Vec<(String, String)>,
}

impl Record {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// 按列名原样取值
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// 读取字段值（去掉首尾空白并合并内部空白），缺失时返回空串
    pub fn get(&self, key: FieldKey) -> String {
        self.lookup(key).map(normalize_spaces).unwrap_or_default()
    }

    /// 把"是/否"类取值解释为 bool，无法识别时返回 None
    pub fn flag(&self, key: FieldKey) -> Option<bool> {
        parse_flag(&self.get(key))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_blank(&self) -> bool {
        self.columns.iter().all(|(_, value)| value.trim().is_empty())
    }

    fn lookup(&self, key: FieldKey) -> Option<&str> {
        // 标准列名 / 变体：取第一个非空值
        let exact = std::iter::once(key.canonical())
            .chain(key.variants().iter().copied())
            .filter_map(|column| self.raw(column))
            .find(|value| !value.trim().is_empty());
        if exact.is_some() {
            return exact;
        }

        self.columns
            .iter()
            .filter(|(name, value)| !value.trim().is_empty() && key.matches_column(name))
            .map(|(_, value)| value.as_str())
            .next()
    }
}

/// 合并空白
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_key(text: &str) -> String {
    normalize_spaces(text).to_lowercase()
}

pub fn parse_flag(value: &str) -> Option<bool> {
    flag_token(&value.trim().to_lowercase())
}

/// 单个小写词表示的是 / 否
pub fn flag_token(token: &str) -> Option<bool> {
    if YES_TOKENS.contains(token) {
        Some(true)
    } else if NO_TOKENS.contains(token) {
        Some(false)
    } else {
        None
    }
}
