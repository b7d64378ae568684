// ==========================================
// 新品工单表单配置 - 领域类型定义
// ==========================================
// 职责: 版本号、字段类型枚举、调用方上下文
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 表单版本号 (major.minor)
// ==========================================
// 序列化格式: "1.0"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormVersion {
    /// 新建配置的初始版本
    pub const INITIAL: FormVersion = FormVersion { major: 1, minor: 0 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// 发布: minor + 1
    pub fn next_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_add(1),
        }
    }

    /// 回滚: minor - 1，最低到 0
    pub fn previous_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_sub(1),
        }
    }

    /// 宽松解析版本字符串
    ///
    /// - "1.2" -> 1.2
    /// - "3"   -> 3.0 (缺失 minor 视为 0)
    /// - "1.2.9" -> 1.2 (只取前两段)
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError(raw.to_string()));
        }

        let mut parts = trimmed.split('.');
        let major = parts
            .next()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or_else(|| VersionParseError(raw.to_string()))?;
        let minor = match parts.next() {
            None => 0,
            Some(s) if s.trim().is_empty() => 0,
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| VersionParseError(raw.to_string()))?,
        };

        Ok(Self { major, minor })
    }
}

impl Default for FormVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for FormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for FormVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FormVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FormVersion> for String {
    fn from(v: FormVersion) -> Self {
        v.to_string()
    }
}

/// 版本号解析失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("无效的版本号: {0:?}")]
pub struct VersionParseError(pub String);

// ==========================================
// 字段类型 (Field Type)
// ==========================================
// 封闭枚举: 未知类型在反序列化时直接拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Date,
    Email,
}

impl FieldType {
    /// 选择类字段（必须携带 options）
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Multiselect | FieldType::Radio
        )
    }

    /// 文本类字段（允许 pattern / maxLength）
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::Textarea | FieldType::Email
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Email => "email",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 调用方上下文 (Caller Context)
// ==========================================
// 审计字段 createdBy/updatedBy 的唯一来源，显式传入每个写操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// 操作人（认证协作方提供，本引擎不解释其含义）
    pub user_id: String,
    /// 调用方期望的 revision（If-Match），None 表示不校验
    pub expected_revision: Option<i32>,
}

impl CallerContext {
    pub const SYSTEM_USER: &'static str = "system";

    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            expected_revision: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Self::SYSTEM_USER)
    }

    pub fn with_expected_revision(mut self, revision: i32) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}
