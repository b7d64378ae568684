// ==========================================
// 新品工单表单配置 - 表单配置仓储
// ==========================================
// 存储: form_configuration 表（sections 以 JSON 文本存储）
// 并发: revision 乐观锁，UPDATE ... WHERE revision = ?
// 红线: 激活必须在事务中完成，同一时刻最多一个激活配置
// ==========================================

use crate::domain::form_config::{FormConfigSummary, FormConfiguration, FormSection};
use crate::domain::types::FormVersion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_COLUMNS: &str = r#"
    config_id, name, description, version, published_version,
    is_draft, is_active, sections_json, last_published_sections_json,
    last_published_at, created_by, created_at, updated_by, updated_at, revision
"#;

// ==========================================
// FormConfigRepository - 表单配置仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct FormConfigRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FormConfigRepository {
    /// 创建仓储（表不存在时自动创建）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        // best-effort: 建表失败不阻断启动，使用时会暴露错误
        if let Err(e) = repo.ensure_table_and_indexes() {
            tracing::warn!("form_configuration ensure failed: {}", e);
        }
        repo
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table_and_indexes(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS form_configuration (
              config_id TEXT PRIMARY KEY,
              name TEXT NOT NULL UNIQUE,
              description TEXT,
              version TEXT NOT NULL DEFAULT '1.0',
              published_version TEXT,
              is_draft INTEGER NOT NULL DEFAULT 0,
              is_active INTEGER NOT NULL DEFAULT 0,
              sections_json TEXT NOT NULL,
              last_published_sections_json TEXT,
              last_published_at TEXT,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_by TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              revision INTEGER NOT NULL DEFAULT 1
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_form_configuration_single_active
              ON form_configuration(is_active) WHERE is_active = 1;
            CREATE INDEX IF NOT EXISTS idx_form_configuration_updated_at
              ON form_configuration(updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新配置
    ///
    /// # 错误
    /// - `RepositoryError::UniqueConstraintViolation`: 名称重复
    pub fn insert(&self, config: &FormConfiguration) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let sections_json = serde_json::to_string(&config.sections)?;
        let snapshot_json = encode_snapshot(config.last_published_sections.as_deref())?;

        conn.execute(
            r#"
            INSERT INTO form_configuration (
              config_id, name, description, version, published_version,
              is_draft, is_active, sections_json, last_published_sections_json,
              last_published_at, created_by, created_at, updated_by, updated_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                config.config_id,
                config.name,
                config.description,
                config.version.to_string(),
                config.published_version.map(|v| v.to_string()),
                config.is_draft,
                config.is_active,
                sections_json,
                snapshot_json,
                config.last_published_at.map(|t| t.format(TS_FORMAT).to_string()),
                config.created_by,
                config.created_at.format(TS_FORMAT).to_string(),
                config.updated_by,
                config.updated_at.format(TS_FORMAT).to_string(),
                config.revision,
            ],
        )?;

        Ok(())
    }

    /// 更新配置 (带乐观锁检查)
    ///
    /// is_active 不在此处写入，只能经由 `activate_exclusive` 修改。
    ///
    /// # 返回
    /// - Ok(new_revision)
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他人已更新)
    /// - `RepositoryError::NotFound`: config_id不存在
    pub fn update(&self, config: &FormConfiguration) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let sections_json = serde_json::to_string(&config.sections)?;
        let snapshot_json = encode_snapshot(config.last_published_sections.as_deref())?;

        let rows_affected = conn.execute(
            r#"
            UPDATE form_configuration
               SET name = ?1, description = ?2, version = ?3, published_version = ?4,
                   is_draft = ?5, sections_json = ?6, last_published_sections_json = ?7,
                   last_published_at = ?8, updated_by = ?9, updated_at = ?10,
                   revision = revision + 1
             WHERE config_id = ?11 AND revision = ?12
            "#,
            params![
                config.name,
                config.description,
                config.version.to_string(),
                config.published_version.map(|v| v.to_string()),
                config.is_draft,
                sections_json,
                snapshot_json,
                config.last_published_at.map(|t| t.format(TS_FORMAT).to_string()),
                config.updated_by,
                config.updated_at.format(TS_FORMAT).to_string(),
                config.config_id,
                config.revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM form_configuration WHERE config_id = ?1",
                    params![config.config_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    config_id: config.config_id.clone(),
                    expected: config.revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "FormConfiguration".to_string(),
                    id: config.config_id.clone(),
                },
            });
        }

        Ok(config.revision + 1)
    }

    /// 激活配置 (同时取消其他配置的激活)
    ///
    /// # 红线
    /// - 先校验目标存在（及 expected_revision），再写入；校验失败时不做任何修改
    /// - 取消全部 + 激活目标在同一事务内提交
    ///
    /// # 错误
    /// - `RepositoryError::NotFound`: config_id不存在
    /// - `RepositoryError::OptimisticLockFailure`: expected_revision 与当前不一致
    pub fn activate_exclusive(
        &self,
        config_id: &str,
        expected_revision: Option<i32>,
        actor: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let actual: Option<i32> = tx
            .query_row(
                "SELECT revision FROM form_configuration WHERE config_id = ?1",
                params![config_id],
                |row| row.get(0),
            )
            .optional()?;
        match (actual, expected_revision) {
            (None, _) => {
                return Err(RepositoryError::NotFound {
                    entity: "FormConfiguration".to_string(),
                    id: config_id.to_string(),
                });
            }
            (Some(actual), Some(expected)) if actual != expected => {
                return Err(RepositoryError::OptimisticLockFailure {
                    config_id: config_id.to_string(),
                    expected,
                    actual,
                });
            }
            _ => {}
        }

        let deactivated = tx.execute(
            "UPDATE form_configuration SET is_active = 0 WHERE is_active = 1 AND config_id <> ?1",
            params![config_id],
        )?;

        tx.execute(
            r#"
            UPDATE form_configuration
               SET is_active = 1, updated_by = ?2, updated_at = ?3, revision = revision + 1
             WHERE config_id = ?1
            "#,
            params![config_id, actor, now.format(TS_FORMAT).to_string()],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::debug!(
            "激活配置: config_id={}, deactivated_others={}",
            config_id,
            deactivated
        );
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 config_id 查询
    pub fn find_by_id(&self, config_id: &str) -> RepositoryResult<Option<FormConfiguration>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM form_configuration WHERE config_id = ?1",
            SELECT_COLUMNS
        );

        let found = conn
            .query_row(&sql, params![config_id], |row| map_row(row))
            .optional()?;
        Ok(found)
    }

    /// 查询当前激活配置
    pub fn find_active(&self) -> RepositoryResult<Option<FormConfiguration>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM form_configuration WHERE is_active = 1 LIMIT 1",
            SELECT_COLUMNS
        );

        let found = conn.query_row(&sql, [], |row| map_row(row)).optional()?;
        Ok(found)
    }

    /// 列表摘要（不加载 sections 正文）
    pub fn list_summaries(&self) -> RepositoryResult<Vec<FormConfigSummary>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT config_id, name, version, published_version, is_draft, is_active,
                   json_array_length(sections_json), last_published_at, updated_by, updated_at
            FROM form_configuration
            ORDER BY is_active DESC, updated_at DESC, name ASC
            "#,
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(FormConfigSummary {
                    config_id: row.get(0)?,
                    name: row.get(1)?,
                    version: parse_version(row, 2)?,
                    published_version: parse_optional_version(row, 3)?,
                    is_draft: row.get(4)?,
                    is_active: row.get(5)?,
                    section_count: row.get(6)?,
                    last_published_at: parse_optional_ts(row, 7)?,
                    updated_by: row.get(8)?,
                    updated_at: parse_ts(row, 9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// 配置总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM form_configuration", [], |row| row.get(0))?;
        Ok(n)
    }

    /// 名称是否已被其他配置占用
    pub fn name_taken(&self, name: &str, exclude_config_id: Option<&str>) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM form_configuration WHERE name = ?1 AND config_id <> ?2",
            params![name, exclude_config_id.unwrap_or("")],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

// ==========================================
// 行映射
// ==========================================

fn encode_snapshot(snapshot: Option<&[FormSection]>) -> RepositoryResult<Option<String>> {
    match snapshot {
        Some(sections) => Ok(Some(serde_json::to_string(sections)?)),
        None => Ok(None),
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn parse_optional_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

fn parse_version(row: &Row, idx: usize) -> rusqlite::Result<FormVersion> {
    let raw: String = row.get(idx)?;
    FormVersion::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_optional_version(row: &Row, idx: usize) -> rusqlite::Result<Option<FormVersion>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => FormVersion::parse(&raw)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

fn parse_sections(row: &Row, idx: usize) -> rusqlite::Result<Option<Vec<FormSection>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

/// 映射数据库行到 FormConfiguration（列顺序见 SELECT_COLUMNS）
fn map_row(row: &Row) -> rusqlite::Result<FormConfiguration> {
    Ok(FormConfiguration {
        config_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        version: parse_version(row, 3)?,
        published_version: parse_optional_version(row, 4)?,
        is_draft: row.get(5)?,
        is_active: row.get(6)?,
        sections: parse_sections(row, 7)?.unwrap_or_default(),
        last_published_sections: parse_sections(row, 8)?,
        last_published_at: parse_optional_ts(row, 9)?,
        created_by: row.get(10)?,
        created_at: parse_ts(row, 11)?,
        updated_by: row.get(12)?,
        updated_at: parse_ts(row, 13)?,
        revision: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::defaults::default_sections;
    use chrono::NaiveDate;

    fn setup_repo() -> FormConfigRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        FormConfigRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 6)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn make_config(id: &str, name: &str) -> FormConfiguration {
        FormConfiguration {
            config_id: id.to_string(),
            name: name.to_string(),
            description: Some("desc".to_string()),
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
        }
    }

    #[test]
    fn test_insert_and_find_by_id() {
        let repo = setup_repo();
        let cfg = make_config("c1", "Form A");
        repo.insert(&cfg).unwrap();

        let found = repo.find_by_id("c1").unwrap().unwrap();
        assert_eq!(found, cfg);
        assert!(repo.find_by_id("missing").unwrap().is_none());
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let repo = setup_repo();
        repo.insert(&make_config("c1", "Form A")).unwrap();
        let err = repo.insert(&make_config("c2", "Form A")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert!(repo.name_taken("Form A", Some("c2")).unwrap());
        assert!(!repo.name_taken("Form A", Some("c1")).unwrap());
    }

    #[test]
    fn test_update_with_optimistic_lock() {
        let repo = setup_repo();
        let cfg = make_config("c1", "Form A");
        repo.insert(&cfg).unwrap();

        let mut first = repo.find_by_id("c1").unwrap().unwrap();
        let mut stale = first.clone();

        first.is_draft = true;
        first.last_published_sections = Some(first.sections.clone());
        let new_rev = repo.update(&first).unwrap();
        assert_eq!(new_rev, 2);

        stale.name = "Form B".to_string();
        let err = repo.update(&stale).unwrap_err();
        match err {
            RepositoryError::OptimisticLockFailure { expected, actual, .. } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected OptimisticLockFailure, got {:?}", other),
        }

        let stored = repo.find_by_id("c1").unwrap().unwrap();
        assert!(stored.is_draft);
        assert_eq!(stored.name, "Form A");
        assert_eq!(stored.last_published_sections, Some(stored.sections.clone()));

        let ghost = make_config("ghost", "Ghost");
        assert!(matches!(
            repo.update(&ghost).unwrap_err(),
            RepositoryError::NotFound { .. }
        ));
    }

    #[test]
    fn test_activate_exclusive() {
        let repo = setup_repo();
        for (id, name) in [("c1", "A"), ("c2", "B"), ("c3", "C")] {
            repo.insert(&make_config(id, name)).unwrap();
        }

        repo.activate_exclusive("c1", None, "admin", ts()).unwrap();
        repo.activate_exclusive("c3", None, "admin", ts()).unwrap();
        repo.activate_exclusive("c2", None, "admin", ts()).unwrap();

        let active = repo.find_active().unwrap().unwrap();
        assert_eq!(active.config_id, "c2");
        let actives = repo
            .list_summaries()
            .unwrap()
            .into_iter()
            .filter(|s| s.is_active)
            .count();
        assert_eq!(actives, 1);
    }

    #[test]
    fn test_activate_missing_target_changes_nothing() {
        let repo = setup_repo();
        repo.insert(&make_config("c1", "A")).unwrap();
        repo.activate_exclusive("c1", None, "admin", ts()).unwrap();

        let err = repo.activate_exclusive("nope", None, "admin", ts()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        // 原激活配置仍然激活
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "c1");
    }

    #[test]
    fn test_activate_with_stale_revision_changes_nothing() {
        let repo = setup_repo();
        repo.insert(&make_config("c1", "A")).unwrap();
        repo.insert(&make_config("c2", "B")).unwrap();
        repo.activate_exclusive("c1", None, "admin", ts()).unwrap();

        // 读取 c2 之后有其他写入
        let mut c2 = repo.find_by_id("c2").unwrap().unwrap();
        let seen_revision = c2.revision;
        c2.name = "B renamed".to_string();
        repo.update(&c2).unwrap();

        match repo
            .activate_exclusive("c2", Some(seen_revision), "admin", ts())
            .unwrap_err()
        {
            RepositoryError::OptimisticLockFailure { expected, actual, .. } => {
                assert_eq!(expected, seen_revision);
                assert_eq!(actual, seen_revision + 1);
            }
            other => panic!("Expected OptimisticLockFailure, got {:?}", other),
        }
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "c1");

        repo.activate_exclusive("c2", Some(seen_revision + 1), "admin", ts())
            .unwrap();
        assert_eq!(repo.find_active().unwrap().unwrap().config_id, "c2");
    }

    #[test]
    fn test_list_summaries_projection() {
        let repo = setup_repo();
        repo.insert(&make_config("c1", "A")).unwrap();
        let summaries = repo.list_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].section_count, 5);
        assert_eq!(summaries[0].version.to_string(), "1.0");
        assert!(summaries[0].published_version.is_none());
    }
}
