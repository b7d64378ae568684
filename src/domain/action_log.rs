// ==========================================
// 新品工单表单配置 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪（谁在何时把配置从哪个版本改到哪个版本）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// FormConfigAction - 表单配置操作日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfigAction {
    pub action_id: String,                 // 日志ID
    pub config_id: String,                 // 关联配置
    pub action_type: FormConfigActionType, // 操作类型
    pub action_ts: NaiveDateTime,          // 操作时间
    pub actor: String,                     // 操作人

    // ===== 版本变化 =====
    pub version_before: Option<String>,
    pub version_after: Option<String>,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// FormConfigActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormConfigActionType {
    Create,
    SaveDraft,
    Publish,
    DiscardDraft,
    Rollback,
    ReorderSections,
    AddSection,
    AddField,
    RemoveSection,
    RemoveField,
    Activate,
    RestoreDefault,
}

impl FormConfigActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormConfigActionType::Create => "CREATE",
            FormConfigActionType::SaveDraft => "SAVE_DRAFT",
            FormConfigActionType::Publish => "PUBLISH",
            FormConfigActionType::DiscardDraft => "DISCARD_DRAFT",
            FormConfigActionType::Rollback => "ROLLBACK",
            FormConfigActionType::ReorderSections => "REORDER_SECTIONS",
            FormConfigActionType::AddSection => "ADD_SECTION",
            FormConfigActionType::AddField => "ADD_FIELD",
            FormConfigActionType::RemoveSection => "REMOVE_SECTION",
            FormConfigActionType::RemoveField => "REMOVE_FIELD",
            FormConfigActionType::Activate => "ACTIVATE",
            FormConfigActionType::RestoreDefault => "RESTORE_DEFAULT",
        }
    }

    /// 从数据库字符串解析（未知值返回 None）
    pub fn from_db_str(s: &str) -> Option<Self> {
        let parsed = match s.trim() {
            "CREATE" => FormConfigActionType::Create,
            "SAVE_DRAFT" => FormConfigActionType::SaveDraft,
            "PUBLISH" => FormConfigActionType::Publish,
            "DISCARD_DRAFT" => FormConfigActionType::DiscardDraft,
            "ROLLBACK" => FormConfigActionType::Rollback,
            "REORDER_SECTIONS" => FormConfigActionType::ReorderSections,
            "ADD_SECTION" => FormConfigActionType::AddSection,
            "ADD_FIELD" => FormConfigActionType::AddField,
            "REMOVE_SECTION" => FormConfigActionType::RemoveSection,
            "REMOVE_FIELD" => FormConfigActionType::RemoveField,
            "ACTIVATE" => FormConfigActionType::Activate,
            "RESTORE_DEFAULT" => FormConfigActionType::RestoreDefault,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for FormConfigActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
