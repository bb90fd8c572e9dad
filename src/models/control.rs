//! 控件描述
//!
//! 每次检查页面时重新构建，跨页面不保留。

use serde::{Deserialize, Serialize};

/// 控件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Email,
    Tel,
    Select,
    Radio,
    Checkbox,
    File,
    Button,
    Link,
    Other,
}

impl ControlKind {
    /// 由标签名和 type 属性推断
    pub fn from_tag(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "select" => ControlKind::Select,
            "textarea" => ControlKind::Text,
            "button" => ControlKind::Button,
            "a" => ControlKind::Link,
            "input" => match input_type.map(|t| t.to_ascii_lowercase()).as_deref() {
                None | Some("") | Some("text") | Some("search") | Some("url") | Some("number") => {
                    ControlKind::Text
                }
                Some("email") => ControlKind::Email,
                Some("tel") => ControlKind::Tel,
                Some("radio") => ControlKind::Radio,
                Some("checkbox") => ControlKind::Checkbox,
                Some("file") => ControlKind::File,
                Some("submit") | Some("button") => ControlKind::Button,
                Some(_) => ControlKind::Other,
            },
            _ => ControlKind::Other,
        }
    }

    /// 可以输入文字的控件
    pub fn is_textual(self) -> bool {
        matches!(self, ControlKind::Text | ControlKind::Email | ControlKind::Tel)
    }
}

/// 驱动分配的控件句柄
///
/// 只在当前页面有效，页面跳转后失效。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlHandle(pub String);

impl ControlHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 下拉框或单选组中的一个选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCandidate {
    /// 显示文字
    pub label: String,
    /// 提交值
    pub value: String,
    #[serde(default)]
    pub selected: bool,
}

impl OptionCandidate {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            selected: false,
        }
    }

    /// 占位选项（"Please select" 之类，或空值）
    pub fn is_placeholder(&self) -> bool {
        self.value.trim().is_empty() || self.label.to_lowercase().contains("select")
    }
}

/// 控件的结构化描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub kind: ControlKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub placeholder: String,
    /// 关联 label 的文字
    #[serde(default)]
    pub label: String,
    /// 按钮或链接的可见文字
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub enabled: bool,
    /// 当前值（输入框内容 / 下拉框选中值 / 单选按钮的 value）
    #[serde(default)]
    pub value: String,
    /// 单选 / 复选是否选中
    #[serde(default)]
    pub selected: bool,
    /// 下拉框的全部选项
    #[serde(default)]
    pub options: Vec<OptionCandidate>,
}

impl ControlDescriptor {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            name: String::new(),
            id: String::new(),
            placeholder: String::new(),
            label: String::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            value: String::new(),
            selected: false,
            options: Vec::new(),
        }
    }

    /// name / id / placeholder 合并后的小写文本，用于属性规则匹配
    pub fn attribute_text(&self) -> String {
        format!("{} {} {}", self.name, self.id, self.placeholder).to_lowercase()
    }

    /// 日志里用来指代控件的名字
    pub fn display_name(&self) -> &str {
        [&self.name, &self.id, &self.placeholder, &self.label, &self.text]
            .into_iter()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
            .unwrap_or("<anonymous>")
    }

    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }

    /// 单选按钮作为选项时的表示
    pub fn as_option(&self) -> OptionCandidate {
        let label = if self.label.trim().is_empty() {
            self.value.clone()
        } else {
            self.label.clone()
        };
        OptionCandidate {
            label,
            value: self.value.clone(),
            selected: self.selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(ControlKind::from_tag("INPUT", Some("Email")), ControlKind::Email);
        assert_eq!(ControlKind::from_tag("input", None), ControlKind::Text);
        assert_eq!(ControlKind::from_tag("select", None), ControlKind::Select);
        assert_eq!(ControlKind::from_tag("input", Some("hidden")), ControlKind::Other);
    }

    #[test]
    fn test_placeholder_option() {
        assert!(OptionCandidate::new("Please select...", "x").is_placeholder());
        assert!(OptionCandidate::new("Germany", "").is_placeholder());
        assert!(!OptionCandidate::new("Germany", "DE").is_placeholder());
    }

    #[test]
    fn test_radio_as_option_falls_back_to_value() {
        let mut radio = ControlDescriptor::new(ControlKind::Radio);
        radio.value = "own".to_string();
        assert_eq!(radio.as_option().label, "own");

        radio.label = "Products they own".to_string();
        assert_eq!(radio.as_option().label, "Products they own");
    }

    #[test]
    fn test_display_name_order() {
        let mut control = ControlDescriptor::new(ControlKind::Text);
        assert_eq!(control.display_name(), "<anonymous>");
        control.placeholder = "City".to_string();
        assert_eq!(control.display_name(), "City");
        control.id = "city_id".to_string();
        assert_eq!(control.display_name(), "city_id");
    }
}
