// ==========================================
// 新品工单表单配置 - 表单配置领域模型
// ==========================================
// 结构: Configuration -> Section[] -> Field[]（严格的树，无共享子结构）
// 序列化: camelCase，与管理端前端约定一致
// ==========================================

use crate::domain::types::{FieldType, FormVersion};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

fn default_true() -> bool {
    true
}

// ==========================================
// FormConfiguration - 表单配置（根实体）
// ==========================================
// 红线: 全库同一时刻最多一个 is_active = true（由 ActivationManager 保证）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfiguration {
    // ===== 标识 =====
    #[serde(rename = "id")]
    pub config_id: String,           // 配置ID（生命周期内不变）
    pub name: String,                // 名称（全局唯一）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>, // 描述

    // ===== 版本状态 =====
    pub version: FormVersion,                   // 当前版本 "major.minor"
    pub published_version: Option<FormVersion>, // 最近一次发布的版本（首次发布前为空）
    pub is_draft: bool,                         // sections 是否含未发布修改
    pub is_active: bool,                        // 是否为当前生效配置

    // ===== 表单结构 =====
    pub sections: Vec<FormSection>,
    pub last_published_sections: Option<Vec<FormSection>>, // 发布基线快照（丢弃/回滚用）

    // ===== 审计字段 =====
    pub last_published_at: Option<NaiveDateTime>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_by: String,
    pub updated_at: NaiveDateTime,

    // ===== 并发控制 =====
    pub revision: i32, // 乐观锁修订号
}

impl FormConfiguration {
    /// 是否存在可用于丢弃/回滚的快照
    pub fn has_snapshot(&self) -> bool {
        self.last_published_sections
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

// ==========================================
// FormSection - 表单分区
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormSection {
    pub section_key: String, // 配置内唯一
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32, // 排序键（允许有间隙）
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub collapsible: bool,
    #[serde(default = "default_true")]
    pub default_expanded: bool,
    #[serde(default)]
    pub is_custom: bool, // false = 系统内置，禁止删除
    #[serde(default)]
    pub fields: Vec<FormField>,
}

// ==========================================
// FormField - 表单字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormField {
    pub field_key: String, // 分区内唯一
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_column: Option<String>, // 布局提示，如 "span 2"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>, // 仅选择类字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibleWhen>, // 条件显示（由渲染端求值，本引擎只负责原样保存）
}

/// 选项（value/label）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// 字段校验约束（元数据，执行不在本引擎范围内）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl FieldValidation {
    pub fn has_numeric_rules(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.step.is_some()
    }

    pub fn has_text_rules(&self) -> bool {
        self.pattern.is_some() || self.max_length.is_some()
    }
}

/// 单依赖条件显示: 仅当 field_key 对应字段当前值等于 value 时显示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VisibleWhen {
    pub field_key: String,
    pub value: JsonValue,
}

// ==========================================
// FormConfigSummary - 列表摘要投影
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfigSummary {
    #[serde(rename = "id")]
    pub config_id: String,
    pub name: String,
    pub version: FormVersion,
    pub published_version: Option<FormVersion>,
    pub is_draft: bool,
    pub is_active: bool,
    pub section_count: i64,
    pub last_published_at: Option<NaiveDateTime>,
    pub updated_by: String,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// 请求载荷 (Request Payloads)
// ==========================================

/// 创建配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateFormConfigRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 省略时使用系统内置默认分区
    #[serde(default)]
    pub sections: Option<Vec<FormSection>>,
    #[serde(default)]
    pub is_draft: bool,
}

/// 保存草稿（部分或整体替换可变字段）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateFormConfigRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: Option<Vec<FormSection>>,
}

/// 分区排序对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SectionOrder {
    pub section_key: String,
    pub order: i32,
}

/// 分区重排请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderSectionsRequest {
    pub sections: Vec<SectionOrder>,
}
