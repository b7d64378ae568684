// ==========================================
// 新品工单表单配置 - 表单配置 API
// ==========================================
// 职责: 编排 读取 -> 校验 -> 引擎状态迁移 -> 持久化 -> 审计 -> 缓存失效
// 红线: 每次写入都必须携带显式的 CallerContext（不读取任何隐式"当前用户"）
// 红线: 任一步失败时不持久化任何修改
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, SubsecRound};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::cache::ReadThroughCache;
use crate::domain::action_log::{FormConfigAction, FormConfigActionType};
use crate::domain::defaults::{default_sections, DEFAULT_CONFIG_NAME};
use crate::domain::form_config::{
    CreateFormConfigRequest, FormConfigSummary, FormConfiguration, FormField, FormSection,
    ReorderSectionsRequest, UpdateFormConfigRequest,
};
use crate::domain::schema::validate_sections;
use crate::domain::types::{CallerContext, FormVersion};
use crate::engine::{ActivationManager, StructureEditor, VersionController};
use crate::perf::PerfGuard;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::form_config_repo::FormConfigRepository;

const ACTIVE_KEY: &str = "active";
const ALL_KEY: &str = "all";

/// 缓存参数
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_entries: 256,
        }
    }
}

impl CacheSettings {
    /// 关闭缓存（测试用）
    pub fn disabled() -> Self {
        Self {
            ttl: Duration::ZERO,
            max_entries: 1,
        }
    }
}

// ==========================================
// FormConfigApi - 表单配置 API
// ==========================================

/// 表单配置API
///
/// 职责：
/// 1. 配置查询（激活、列表、单个）并经读穿透缓存
/// 2. 版本状态迁移（保存草稿、发布、丢弃草稿、回滚、恢复默认）
/// 3. 结构编辑（分区/字段增删、分区重排）
/// 4. 激活切换
/// 5. ActionLog记录
pub struct FormConfigApi {
    form_config_repo: Arc<FormConfigRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    version_controller: VersionController,
    structure_editor: StructureEditor,
    activation_manager: ActivationManager,
    config_cache: ReadThroughCache<FormConfiguration>,
    summary_cache: ReadThroughCache<Vec<FormConfigSummary>>,
}

impl FormConfigApi {
    /// 创建新的FormConfigApi实例
    pub fn new(
        form_config_repo: Arc<FormConfigRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        cache: CacheSettings,
    ) -> Self {
        Self {
            activation_manager: ActivationManager::new(form_config_repo.clone()),
            form_config_repo,
            action_log_repo,
            version_controller: VersionController::new(),
            structure_editor: StructureEditor::new(),
            config_cache: ReadThroughCache::new(cache.ttl, cache.max_entries),
            summary_cache: ReadThroughCache::new(cache.ttl, 1),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询当前激活配置
    ///
    /// # 返回
    /// - Err(ApiError::NotFound): 没有激活配置
    pub fn get_active(&self) -> ApiResult<FormConfiguration> {
        self.config_cache.get_or_populate(ACTIVE_KEY, || {
            self.form_config_repo
                .find_active()?
                .ok_or_else(|| ApiError::NotFound("当前没有激活的表单配置".to_string()))
        })
    }

    /// 查询配置列表（摘要）
    pub fn list_summaries(&self) -> ApiResult<Vec<FormConfigSummary>> {
        self.summary_cache
            .get_or_populate(ALL_KEY, || Ok(self.form_config_repo.list_summaries()?))
    }

    /// 按 id 查询配置
    pub fn get_by_id(&self, config_id: &str) -> ApiResult<FormConfiguration> {
        let key = format!("id:{}", config_id);
        self.config_cache
            .get_or_populate(&key, || self.load(config_id))
    }

    /// 查询配置的操作历史（最新在前）
    pub fn list_actions(&self, config_id: &str, limit: i64) -> ApiResult<Vec<FormConfigAction>> {
        // 先确认配置存在
        self.load(config_id)?;
        Ok(self.action_log_repo.find_by_config(config_id, limit)?)
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 创建配置
    ///
    /// # 规则
    /// - 名称去空白后非空且唯一
    /// - 未提供 sections 时使用系统内置默认分区
    /// - version = 1.0，无 publishedVersion，无快照，未激活
    pub fn create(
        &self,
        request: CreateFormConfigRequest,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_create");

        let name = normalize_name(&request.name)?;
        self.ensure_name_available(&name, None)?;

        let sections = match request.sections {
            Some(sections) => {
                validate_sections(&sections).map_err(|e| ApiError::ValidationError(e.to_string()))?;
                sections
            }
            None => default_sections(),
        };

        let now = now();
        let config = FormConfiguration {
            config_id: Uuid::new_v4().to_string(),
            name,
            description: request.description.filter(|d| !d.trim().is_empty()),
            version: FormVersion::INITIAL,
            published_version: None,
            is_draft: request.is_draft,
            is_active: false,
            sections,
            last_published_sections: None,
            last_published_at: None,
            created_by: ctx.user_id.clone(),
            created_at: now,
            updated_by: ctx.user_id.clone(),
            updated_at: now,
            revision: 1,
        };

        self.form_config_repo.insert(&config)?;
        self.invalidate_caches();

        self.record_action(
            &config,
            FormConfigActionType::Create,
            ctx,
            None,
            Some(json!({ "name": config.name, "isDraft": config.is_draft })),
            None,
        );

        tracing::info!(
            "表单配置已创建: config_id={}, name={}, actor={}",
            config.config_id,
            config.name,
            ctx.user_id
        );
        Ok(config)
    }

    // ==========================================
    // 版本状态迁移
    // ==========================================

    /// 保存草稿
    pub fn save_draft(
        &self,
        config_id: &str,
        request: UpdateFormConfigRequest,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_save_draft");

        if let Some(raw) = &request.name {
            let name = normalize_name(raw)?;
            self.ensure_name_available(&name, Some(config_id))?;
        }

        let payload = json!({
            "name": request.name,
            "description": request.description,
            "sectionsReplaced": request.sections.is_some(),
        });
        self.mutate(
            config_id,
            ctx,
            FormConfigActionType::SaveDraft,
            Some(payload),
            |config| Ok(self.version_controller.apply_edit(config, request)?),
        )
    }

    /// 发布
    pub fn publish(&self, config_id: &str, ctx: &CallerContext) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_publish");
        let now = now();
        self.mutate(config_id, ctx, FormConfigActionType::Publish, None, |config| {
            Ok(self.version_controller.publish(config, now)?)
        })
    }

    /// 丢弃草稿
    pub fn discard_draft(&self, config_id: &str, ctx: &CallerContext) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_discard_draft");
        self.mutate(config_id, ctx, FormConfigActionType::DiscardDraft, None, |config| {
            Ok(self.version_controller.discard_draft(config)?)
        })
    }

    /// 回滚到上一个已发布版本
    pub fn rollback(&self, config_id: &str, ctx: &CallerContext) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_rollback");
        let now = now();
        self.mutate(config_id, ctx, FormConfigActionType::Rollback, None, |config| {
            Ok(self.version_controller.rollback(config, now)?)
        })
    }

    /// 恢复为系统内置默认分区（进入草稿）
    pub fn restore_default(&self, config_id: &str, ctx: &CallerContext) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_restore_default");
        self.mutate(config_id, ctx, FormConfigActionType::RestoreDefault, None, |config| {
            Ok(self
                .version_controller
                .replace_sections(config, default_sections())?)
        })
    }

    // ==========================================
    // 结构编辑（均为编辑操作: 先进入草稿）
    // ==========================================

    /// 分区重排（未知分区键忽略）
    pub fn reorder_sections(
        &self,
        config_id: &str,
        request: ReorderSectionsRequest,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let payload = serde_json::to_value(&request.sections).ok();
        self.mutate(
            config_id,
            ctx,
            FormConfigActionType::ReorderSections,
            payload,
            |config| {
                self.version_controller.begin_edit(config);
                let applied = self
                    .structure_editor
                    .reorder_sections(config, &request.sections);
                if applied < request.sections.len() {
                    tracing::debug!(
                        "重排部分生效: config_id={}, applied={}, requested={}",
                        config.config_id,
                        applied,
                        request.sections.len()
                    );
                }
                Ok(())
            },
        )
    }

    /// 追加自定义分区
    pub fn add_section(
        &self,
        config_id: &str,
        section: FormSection,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let payload = json!({ "sectionKey": section.section_key });
        self.mutate(config_id, ctx, FormConfigActionType::AddSection, Some(payload), |config| {
            self.version_controller.begin_edit(config);
            Ok(self.structure_editor.add_section(config, section)?)
        })
    }

    /// 在指定分区追加自定义字段
    pub fn add_field(
        &self,
        config_id: &str,
        section_key: &str,
        field: FormField,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let payload = json!({ "sectionKey": section_key, "fieldKey": field.field_key });
        self.mutate(config_id, ctx, FormConfigActionType::AddField, Some(payload), |config| {
            self.version_controller.begin_edit(config);
            Ok(self.structure_editor.add_field(config, section_key, field)?)
        })
    }

    /// 删除自定义分区（内置分区返回 Forbidden）
    pub fn remove_section(
        &self,
        config_id: &str,
        section_key: &str,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let payload = json!({ "sectionKey": section_key });
        self.mutate(config_id, ctx, FormConfigActionType::RemoveSection, Some(payload), |config| {
            self.version_controller.begin_edit(config);
            self.structure_editor.remove_section(config, section_key)?;
            Ok(())
        })
    }

    /// 删除自定义字段（内置字段返回 Forbidden）
    pub fn remove_field(
        &self,
        config_id: &str,
        section_key: &str,
        field_key: &str,
        ctx: &CallerContext,
    ) -> ApiResult<FormConfiguration> {
        let payload = json!({ "sectionKey": section_key, "fieldKey": field_key });
        self.mutate(config_id, ctx, FormConfigActionType::RemoveField, Some(payload), |config| {
            self.version_controller.begin_edit(config);
            self.structure_editor
                .remove_field(config, section_key, field_key)?;
            Ok(())
        })
    }

    // ==========================================
    // 激活
    // ==========================================

    /// 激活配置（同时取消其他配置的激活，事务内完成）
    pub fn activate(&self, config_id: &str, ctx: &CallerContext) -> ApiResult<FormConfiguration> {
        let _perf = PerfGuard::new("form_config_activate");

        let before = self.load(config_id)?;
        check_expected_revision(ctx, &before)?;

        self.activation_manager.activate(config_id, ctx, now())?;
        self.invalidate_caches();

        let after = self.load(config_id)?;
        self.record_action(
            &after,
            FormConfigActionType::Activate,
            ctx,
            Some(before.version),
            None,
            Some(format!("was_active={}", before.is_active)),
        );
        Ok(after)
    }

    // ==========================================
    // 启动初始化
    // ==========================================

    /// 空库时创建并激活内置默认配置
    ///
    /// # 返回
    /// - Ok(Some(config)): 已创建
    /// - Ok(None): 库中已有配置，跳过
    pub fn seed_default_if_empty(&self, ctx: &CallerContext) -> ApiResult<Option<FormConfiguration>> {
        if self.form_config_repo.count()? > 0 {
            return Ok(None);
        }

        let created = self.create(
            CreateFormConfigRequest {
                name: DEFAULT_CONFIG_NAME.to_string(),
                description: Some("System default intake form for new chemical products".to_string()),
                sections: None,
                is_draft: false,
            },
            ctx,
        )?;
        let activated = self.activate(&created.config_id, ctx)?;
        tracing::info!("已初始化默认表单配置: config_id={}", activated.config_id);
        Ok(Some(activated))
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load(&self, config_id: &str) -> ApiResult<FormConfiguration> {
        self.form_config_repo
            .find_by_id(config_id)?
            .ok_or_else(|| ApiError::NotFound(format!("FormConfiguration(id={})不存在", config_id)))
    }

    fn ensure_name_available(&self, name: &str, exclude_config_id: Option<&str>) -> ApiResult<()> {
        if self.form_config_repo.name_taken(name, exclude_config_id)? {
            return Err(ApiError::BusinessRuleViolation(format!(
                "配置名称已存在: {}",
                name
            )));
        }
        Ok(())
    }

    /// 单次读-改-写
    ///
    /// 加载 -> If-Match 校验 -> 内存中执行 op -> 盖章 -> 乐观锁写回 -> 审计 -> 缓存失效
    fn mutate<F>(
        &self,
        config_id: &str,
        ctx: &CallerContext,
        action_type: FormConfigActionType,
        payload: Option<JsonValue>,
        op: F,
    ) -> ApiResult<FormConfiguration>
    where
        F: FnOnce(&mut FormConfiguration) -> ApiResult<()>,
    {
        let mut config = self.load(config_id)?;
        check_expected_revision(ctx, &config)?;

        let version_before = config.version;
        op(&mut config)?;

        config.updated_by = ctx.user_id.clone();
        config.updated_at = now();
        config.revision = self.form_config_repo.update(&config)?;
        self.invalidate_caches();

        self.record_action(&config, action_type, ctx, Some(version_before), payload, None);

        tracing::info!(
            "表单配置已更新: config_id={}, action={}, version {} -> {}, draft={}, actor={}",
            config.config_id,
            action_type,
            version_before,
            config.version,
            config.is_draft,
            ctx.user_id
        );
        Ok(config)
    }

    fn record_action(
        &self,
        config: &FormConfiguration,
        action_type: FormConfigActionType,
        ctx: &CallerContext,
        version_before: Option<FormVersion>,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) {
        let log = FormConfigAction {
            action_id: Uuid::new_v4().to_string(),
            config_id: config.config_id.clone(),
            action_type,
            action_ts: now(),
            actor: ctx.user_id.clone(),
            version_before: version_before.map(|v| v.to_string()),
            version_after: Some(config.version.to_string()),
            payload_json,
            detail,
        };

        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!("记录操作日志失败: {}", e);
        }
    }

    fn invalidate_caches(&self) {
        self.config_cache.invalidate_all();
        self.summary_cache.invalidate_all();
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 当前时间（秒级，与存储精度一致）
fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

fn normalize_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::ValidationError("配置名称不能为空".to_string()));
    }
    Ok(name.to_string())
}

/// If-Match 校验：调用方携带的 revision 必须与当前一致
fn check_expected_revision(ctx: &CallerContext, config: &FormConfiguration) -> ApiResult<()> {
    match ctx.expected_revision {
        Some(expected) if expected != config.revision => Err(ApiError::OptimisticLockFailure(format!(
            "配置{}已被其他用户修改（期望revision={}，实际revision={}）",
            config.config_id, expected, config.revision
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup_api(cache: CacheSettings) -> FormConfigApi {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        FormConfigApi::new(
            Arc::new(FormConfigRepository::new(conn.clone())),
            Arc::new(ActionLogRepository::new(conn)),
            cache,
        )
    }

    fn create_req(name: &str) -> CreateFormConfigRequest {
        CreateFormConfigRequest {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_invalidated_on_write() {
        let api = setup_api(CacheSettings::default());
        let ctx = CallerContext::new("admin");
        let cfg = api.create(create_req("Form A"), &ctx).unwrap();
        api.activate(&cfg.config_id, &ctx).unwrap();

        let cached = api.get_active().unwrap();
        assert_eq!(cached.version.to_string(), "1.0");

        api.publish(&cfg.config_id, &ctx).unwrap();
        let fresh = api.get_active().unwrap();
        assert_eq!(fresh.version.to_string(), "1.1");
        assert_eq!(api.get_by_id(&cfg.config_id).unwrap().revision, fresh.revision);
    }

    #[test]
    fn test_if_match_mismatch_rejected_before_mutation() {
        let api = setup_api(CacheSettings::disabled());
        let cfg = api
            .create(create_req("Form A"), &CallerContext::new("admin"))
            .unwrap();

        let stale = CallerContext::new("bob").with_expected_revision(cfg.revision + 5);
        let err = api.publish(&cfg.config_id, &stale).unwrap_err();
        assert!(matches!(err, ApiError::OptimisticLockFailure(_)));

        let stored = api.get_by_id(&cfg.config_id).unwrap();
        assert_eq!(stored.version, FormVersion::INITIAL);
        assert_eq!(stored.revision, cfg.revision);
    }

    #[test]
    fn test_failed_structural_edit_persists_nothing() {
        let api = setup_api(CacheSettings::disabled());
        let ctx = CallerContext::new("admin");
        let cfg = api.create(create_req("Form A"), &ctx).unwrap();

        let err = api.remove_section(&cfg.config_id, "pricing", &ctx).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let stored = api.get_by_id(&cfg.config_id).unwrap();
        assert!(!stored.is_draft);
        assert!(stored.last_published_sections.is_none());
        assert_eq!(stored.revision, cfg.revision);
    }

    #[test]
    fn test_seed_default_only_when_empty() {
        let api = setup_api(CacheSettings::disabled());
        let ctx = CallerContext::system();

        let seeded = api.seed_default_if_empty(&ctx).unwrap().unwrap();
        assert_eq!(seeded.name, DEFAULT_CONFIG_NAME);
        assert!(seeded.is_active);
        assert_eq!(seeded.sections.len(), 5);

        assert!(api.seed_default_if_empty(&ctx).unwrap().is_none());
        assert_eq!(api.list_summaries().unwrap().len(), 1);
    }

    #[test]
    fn test_action_history_recorded() {
        let api = setup_api(CacheSettings::disabled());
        let ctx = CallerContext::new("admin");
        let cfg = api.create(create_req("Form A"), &ctx).unwrap();
        api.publish(&cfg.config_id, &ctx).unwrap();
        api.rollback(&cfg.config_id, &ctx).unwrap();

        let actions = api.list_actions(&cfg.config_id, 10).unwrap();
        let types: Vec<FormConfigActionType> = actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            types,
            vec![
                FormConfigActionType::Rollback,
                FormConfigActionType::Publish,
                FormConfigActionType::Create
            ]
        );
        assert_eq!(actions[0].version_before.as_deref(), Some("1.1"));
        assert_eq!(actions[0].version_after.as_deref(), Some("1.0"));

        assert!(matches!(
            api.list_actions("missing", 10).unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
