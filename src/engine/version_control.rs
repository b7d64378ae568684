// ==========================================
// 新品工单表单配置 - 版本控制引擎
// ==========================================
// 状态机: Published <-> Draft
//   edit          Published/Draft -> Draft
//   publish       Draft/Published -> Published (minor + 1)
//   discard_draft Draft -> Published (恢复快照，版本不变)
//   rollback      Published -> Published (恢复快照，minor - 1，消费快照)
// ==========================================
// 红线: last_published_sections 必须是独立深拷贝
// 红线: 快照只反映最近一次"已提交"状态，草稿期间不得覆盖
// ==========================================

use crate::domain::form_config::{FormConfiguration, FormSection, UpdateFormConfigRequest};
use crate::domain::schema::{deep_clone_sections, validate_sections};
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDateTime;

/// 丢弃草稿时当前不是草稿
pub const NO_DRAFT_TO_DISCARD: &str = "no draft to discard";
/// 丢弃草稿时没有可恢复的快照
pub const NO_PUBLISHED_VERSION_TO_RESTORE: &str = "no published version to restore";
/// 回滚时没有可恢复的快照
pub const NO_PREVIOUS_VERSION: &str = "no previous version available";
/// 草稿未处理时回滚
pub const ROLLBACK_WHILE_DRAFT: &str = "draft pending, publish or discard it before rollback";

// ==========================================
// VersionController - 版本控制引擎
// ==========================================
/// 版本控制引擎
/// 职责: 在内存中执行状态迁移，持久化由调用方负责
pub struct VersionController {
    // 无状态引擎
}

impl VersionController {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 进入草稿
    // ==========================================

    /// 进入草稿的一次性簿记
    ///
    /// - 非草稿状态: 当前 sections 即已提交基线，捕获为快照
    /// - 已是草稿: 保留既有快照（快照必须反映上次已提交状态，而非上次编辑）
    pub fn begin_edit(&self, config: &mut FormConfiguration) {
        if !config.is_draft {
            config.last_published_sections = Some(deep_clone_sections(&config.sections));
            tracing::debug!(
                "进入草稿并捕获快照: config_id={}, version={}",
                config.config_id,
                config.version
            );
        }
        config.is_draft = true;
    }

    /// 保存草稿（部分/整体替换可变字段）
    ///
    /// 先校验再修改: 校验失败时 config 保持原样
    pub fn apply_edit(
        &self,
        config: &mut FormConfiguration,
        patch: UpdateFormConfigRequest,
    ) -> EngineResult<()> {
        let name = match patch.name {
            Some(raw) => {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    return Err(EngineError::Validation("配置名称不能为空".to_string()));
                }
                Some(trimmed)
            }
            None => None,
        };
        if let Some(sections) = &patch.sections {
            validate_sections(sections)?;
        }

        self.begin_edit(config);

        if let Some(name) = name {
            config.name = name;
        }
        if let Some(description) = patch.description {
            config.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(sections) = patch.sections {
            config.sections = sections;
        }
        Ok(())
    }

    /// 以整套 sections 替换当前结构（恢复出厂默认等）
    pub fn replace_sections(
        &self,
        config: &mut FormConfiguration,
        sections: Vec<FormSection>,
    ) -> EngineResult<()> {
        self.apply_edit(
            config,
            UpdateFormConfigRequest {
                sections: Some(sections),
                ..Default::default()
            },
        )
    }

    // ==========================================
    // 发布
    // ==========================================

    /// 发布
    ///
    /// # 快照规则
    /// - 草稿且已有进入草稿时的快照: 保留（它就是正确的发布基线）
    /// - 非草稿（无草稿的重复发布）: 捕获当前即将被取代的已提交 sections
    /// - 草稿但没有基线（直接以草稿创建、从未提交）: 不捕获
    ///
    /// # 版本规则
    /// version.minor + 1，同时写入 published_version
    pub fn publish(&self, config: &mut FormConfiguration, now: NaiveDateTime) -> EngineResult<()> {
        let keep_draft_snapshot = config.is_draft && config.last_published_sections.is_some();
        if !keep_draft_snapshot && !config.is_draft {
            config.last_published_sections = Some(deep_clone_sections(&config.sections));
        }

        let previous = config.version;
        let next = previous.next_minor();
        config.version = next;
        config.published_version = Some(next);
        config.is_draft = false;
        config.last_published_at = Some(now);

        tracing::info!(
            "配置发布: config_id={}, {} -> {}",
            config.config_id,
            previous,
            next
        );
        Ok(())
    }

    // ==========================================
    // 丢弃草稿
    // ==========================================

    /// 丢弃草稿，恢复到快照
    ///
    /// 快照不清除；非草稿状态一律拒绝，失败时 config 保持原样
    pub fn discard_draft(&self, config: &mut FormConfiguration) -> EngineResult<()> {
        if !config.has_snapshot() {
            return Err(EngineError::InvalidState(
                NO_PUBLISHED_VERSION_TO_RESTORE.to_string(),
            ));
        }
        if !config.is_draft {
            return Err(EngineError::InvalidState(NO_DRAFT_TO_DISCARD.to_string()));
        }

        if let Some(snapshot) = config.last_published_sections.as_deref() {
            config.sections = deep_clone_sections(snapshot);
        }
        if let Some(published) = config.published_version {
            config.version = published;
        }
        config.is_draft = false;

        tracing::info!(
            "草稿已丢弃: config_id={}, version={}",
            config.config_id,
            config.version
        );
        Ok(())
    }

    // ==========================================
    // 回滚
    // ==========================================

    /// 回滚一个版本步长
    ///
    /// 与丢弃不同，回滚消费快照: 没有新的发布时，第二次回滚必然失败
    /// 草稿期间不允许回滚（快照此时是当前已发布内容，而非上一版本）
    pub fn rollback(&self, config: &mut FormConfiguration, now: NaiveDateTime) -> EngineResult<()> {
        if config.is_draft {
            return Err(EngineError::InvalidState(ROLLBACK_WHILE_DRAFT.to_string()));
        }
        let snapshot = match config.last_published_sections.take() {
            Some(s) if !s.is_empty() => s,
            other => {
                config.last_published_sections = other;
                return Err(EngineError::InvalidState(NO_PREVIOUS_VERSION.to_string()));
            }
        };

        let previous = config.version;
        let target = previous.previous_minor();
        config.sections = snapshot;
        config.version = target;
        config.published_version = Some(target);
        config.is_draft = false;
        config.last_published_at = Some(now);

        tracing::info!(
            "配置回滚: config_id={}, {} -> {}",
            config.config_id,
            previous,
            target
        );
        Ok(())
    }
}

impl Default for VersionController {
    fn default() -> Self {
        Self::new()
    }
}
