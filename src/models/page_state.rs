//! 页面状态
//!
//! 分类器的离散标签：当前显示的是向导的哪一步。
//! 每轮循环都从实时页面重新计算，从不缓存。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

/// 页面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageState {
    Login,
    Dashboard,
    /// 会员表单入口（未编号的新会员表单）
    MembershipForm,
    MembershipPage1,
    MembershipPage2,
    MembershipPage3,
    MembershipPage4,
    /// 结构识别：多个单选按钮的选择页
    PackagingChoice,
    /// 结构识别：包含邮箱输入的公司信息页
    CompanyDetails,
    /// 结构识别：普通表单
    AdditionalDetails,
    /// 结构识别：文件上传页
    Upload,
    /// 注册完成
    Success,
    Unknown,
    Error,
}

impl PageState {
    pub fn as_str(self) -> &'static str {
        match self {
            PageState::Login => "LOGIN",
            PageState::Dashboard => "DASHBOARD",
            PageState::MembershipForm => "MEMBERSHIP_FORM",
            PageState::MembershipPage1 => "MEMBERSHIP_PAGE_1",
            PageState::MembershipPage2 => "MEMBERSHIP_PAGE_2",
            PageState::MembershipPage3 => "MEMBERSHIP_PAGE_3",
            PageState::MembershipPage4 => "MEMBERSHIP_PAGE_4",
            PageState::PackagingChoice => "PAGE_1_PACKAGING",
            PageState::CompanyDetails => "PAGE_2_COMPANY",
            PageState::AdditionalDetails => "PAGE_3_DETAILS",
            PageState::Upload => "PAGE_4_UPLOAD",
            PageState::Success => "SUCCESS_PAGE",
            PageState::Unknown => "UNKNOWN",
            PageState::Error => "ERROR",
        }
    }

    /// 地址中的序号步骤（`membership/form/N`）
    pub fn membership_step(step: u32) -> Option<Self> {
        match step {
            1 => Some(PageState::MembershipPage1),
            2 => Some(PageState::MembershipPage2),
            3 => Some(PageState::MembershipPage3),
            4 => Some(PageState::MembershipPage4),
            _ => None,
        }
    }

    /// 逻辑上的下一页
    pub fn next(self) -> Option<Self> {
        match self {
            PageState::Login => Some(PageState::Dashboard),
            PageState::Dashboard => Some(PageState::MembershipForm),
            PageState::MembershipForm => Some(PageState::MembershipPage1),
            PageState::MembershipPage1 => Some(PageState::MembershipPage2),
            PageState::MembershipPage2 => Some(PageState::MembershipPage3),
            PageState::MembershipPage3 => Some(PageState::MembershipPage4),
            PageState::MembershipPage4 => Some(PageState::Success),
            PageState::PackagingChoice => Some(PageState::CompanyDetails),
            PageState::CompanyDetails => Some(PageState::AdditionalDetails),
            PageState::AdditionalDetails => Some(PageState::Upload),
            PageState::Upload => Some(PageState::Success),
            PageState::Success | PageState::Unknown | PageState::Error => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PageState::Success
    }

    /// 导航枢纽页（从这里进入表单需要展开菜单）
    pub fn is_hub(self) -> bool {
        self == PageState::Dashboard
    }

    /// 表单入口
    pub fn is_entry_point(self) -> bool {
        matches!(self, PageState::MembershipForm | PageState::PackagingChoice)
    }

    pub fn is_membership_page(self) -> bool {
        matches!(
            self,
            PageState::MembershipPage1
                | PageState::MembershipPage2
                | PageState::MembershipPage3
                | PageState::MembershipPage4
        )
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PageState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 本次运行中已经处理完成的页面
///
/// 只提供插入和查询，集合在一次运行内只增不减。
#[derive(Debug, Default, Clone)]
pub struct CompletedPageSet {
    pages: BTreeSet<PageState>,
}

impl CompletedPageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回是否为新加入的页面
    pub fn insert(&mut self, state: PageState) -> bool {
        self.pages.insert(state)
    }

    pub fn contains(&self, state: PageState) -> bool {
        self.pages.contains(&state)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PageState> + '_ {
        self.pages.iter().copied()
    }
}
