// ==========================================
// 新品工单表单配置 - 激活管理
// ==========================================
// 红线: 全库最多一个激活配置
// 实现: 取消全部 + 激活目标在仓储层同一事务内完成，目标不存在时不写入
// ==========================================

use crate::domain::types::CallerContext;
use crate::repository::error::RepositoryResult;
use crate::repository::form_config_repo::FormConfigRepository;
use chrono::NaiveDateTime;
use std::sync::Arc;

// ==========================================
// ActivationManager - 激活管理器
// ==========================================
pub struct ActivationManager {
    form_config_repo: Arc<FormConfigRepository>,
}

impl ActivationManager {
    pub fn new(form_config_repo: Arc<FormConfigRepository>) -> Self {
        Self { form_config_repo }
    }

    /// 激活指定配置
    ///
    /// # 错误
    /// - `RepositoryError::NotFound`: 目标不存在，此时没有任何配置被取消激活
    /// - `RepositoryError::OptimisticLockFailure`: ctx 携带的 revision 已过期（在事务内比较）
    /// - 其他 `RepositoryError`: 事务整体回滚
    pub fn activate(&self, config_id: &str, ctx: &CallerContext, now: NaiveDateTime) -> RepositoryResult<()> {
        self.form_config_repo
            .activate_exclusive(config_id, ctx.expected_revision, &ctx.user_id, now)?;
        tracing::info!("配置已激活: config_id={}, actor={}", config_id, ctx.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::defaults::default_sections;
    use crate::domain::form_config::FormConfiguration;
    use crate::domain::types::FormVersion;
    use crate::repository::error::RepositoryError;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn seed(repo: &FormConfigRepository, id: &str) {
        repo.insert(&FormConfiguration {
            config_id: id.to_string(),
            name: format!("Form {}", id),
            description: None,
            version: FormVersion::INITIAL,
            published_version: None,
            is_draft: false,
            is_active: false,
            sections: default_sections(),
            last_published_sections: None,
            last_published_at: None,
            created_by: "admin".to_string(),
            created_at: ts(),
            updated_by: "admin".to_string(),
            updated_at: ts(),
            revision: 1,
        })
        .unwrap();
    }

    #[test]
    fn test_last_activation_wins() {
        let conn = Connection::open_in_memory().unwrap();
        let repo = Arc::new(FormConfigRepository::new(Arc::new(Mutex::new(conn))));
        let ids = ["a", "b", "c", "d"];
        for id in ids {
            seed(&repo, id);
        }

        let manager = ActivationManager::new(repo.clone());
        let ctx = CallerContext::new("admin");
        for target in ["c", "a", "d", "a", "b"] {
            manager.activate(target, &ctx, ts()).unwrap();
            let active: Vec<String> = repo
                .list_summaries()
                .unwrap()
                .into_iter()
                .filter(|s| s.is_active)
                .map(|s| s.config_id)
                .collect();
            assert_eq!(active, vec![target.to_string()]);
        }

        let err = manager.activate("zzz", &ctx, ts()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "b");
    }

    #[test]
    fn test_expected_revision_checked_inside_activation() {
        let conn = Connection::open_in_memory().unwrap();
        let repo = Arc::new(FormConfigRepository::new(Arc::new(Mutex::new(conn))));
        seed(&repo, "a");
        seed(&repo, "b");
        let manager = ActivationManager::new(repo.clone());

        manager.activate("a", &CallerContext::new("admin"), ts()).unwrap();

        let stale = CallerContext::new("bob").with_expected_revision(7);
        let err = manager.activate("b", &stale, ts()).unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "a");

        let fresh = CallerContext::new("bob").with_expected_revision(1);
        manager.activate("b", &fresh, ts()).unwrap();
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "b");
    }
}
