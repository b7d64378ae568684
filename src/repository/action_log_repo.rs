// ==========================================
// 新品工单表单配置 - 操作日志数据仓储
// ==========================================
// 红线: 所有写入必须记录
// ==========================================

use crate::domain::action_log::{FormConfigAction, FormConfigActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        if let Err(e) = repo.ensure_table_and_indexes() {
            tracing::warn!("form_config_action_log ensure failed: {}", e);
        }
        repo
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table_and_indexes(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS form_config_action_log (
              action_id TEXT PRIMARY KEY,
              config_id TEXT NOT NULL,
              action_type TEXT NOT NULL,
              action_ts TEXT NOT NULL,
              actor TEXT NOT NULL,
              version_before TEXT,
              version_after TEXT,
              payload_json TEXT,
              detail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_form_config_action_log_config
              ON form_config_action_log(config_id, action_ts DESC);
            "#,
        )?;
        Ok(())
    }

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入
    pub fn insert(&self, log: &FormConfigAction) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO form_config_action_log (
                action_id, config_id, action_type, action_ts, actor,
                version_before, version_after, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.action_id,
                log.config_id,
                log.action_type.as_str(),
                log.action_ts.format(TS_FORMAT).to_string(),
                log.actor,
                log.version_before,
                log.version_after,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 按配置查询操作日志（最新在前）
    pub fn find_by_config(&self, config_id: &str, limit: i64) -> RepositoryResult<Vec<FormConfigAction>> {
        let conn = self.get_conn()?;
        let limit = if limit <= 0 { 100 } else { limit.min(1000) };

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, config_id, action_type, action_ts, actor,
                   version_before, version_after, payload_json, detail
            FROM form_config_action_log
            WHERE config_id = ?1
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;

        let logs = stmt
            .query_map(params![config_id, limit], |row| {
                let type_str: String = row.get(2)?;
                let action_type = FormConfigActionType::from_db_str(&type_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        Type::Text,
                        format!("未知操作类型: {}", type_str).into(),
                    )
                })?;
                let ts_str: String = row.get(3)?;
                let action_ts = NaiveDateTime::parse_from_str(&ts_str, TS_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                })?;
                let payload_json = row
                    .get::<_, Option<String>>(7)?
                    .and_then(|s| serde_json::from_str(&s).ok());

                Ok(FormConfigAction {
                    action_id: row.get(0)?,
                    config_id: row.get(1)?,
                    action_type,
                    action_ts,
                    actor: row.get(4)?,
                    version_before: row.get(5)?,
                    version_after: row.get(6)?,
                    payload_json,
                    detail: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_repo() -> ActionLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ActionLogRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn make_log(id: &str, config_id: &str, minute: u32, action_type: FormConfigActionType) -> FormConfigAction {
        FormConfigAction {
            action_id: id.to_string(),
            config_id: config_id.to_string(),
            action_type,
            action_ts: NaiveDate::from_ymd_opt(2026, 5, 6)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
            actor: "admin".to_string(),
            version_before: Some("1.0".to_string()),
            version_after: Some("1.1".to_string()),
            payload_json: Some(serde_json::json!({"sectionKey": "pricing"})),
            detail: None,
        }
    }

    #[test]
    fn test_insert_and_find_by_config() {
        let repo = setup_repo();
        repo.insert(&make_log("a1", "c1", 1, FormConfigActionType::Create)).unwrap();
        repo.insert(&make_log("a2", "c1", 2, FormConfigActionType::Publish)).unwrap();
        repo.insert(&make_log("a3", "c2", 3, FormConfigActionType::Create)).unwrap();

        let logs = repo.find_by_config("c1", 0).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action_id, "a2");
        assert_eq!(logs[0].action_type, FormConfigActionType::Publish);
        assert_eq!(logs[1].payload_json, Some(serde_json::json!({"sectionKey": "pricing"})));
    }
}
