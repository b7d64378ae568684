// ==========================================
// 新品工单表单配置 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::form_config_api::{CacheSettings, FormConfigApi};
use crate::config::AppConfig;
use crate::db;
use crate::perf;
use crate::repository::{ActionLogRepository, FormConfigRepository};

/// 应用状态
///
/// 所有 HTTP 处理器共享同一份（Clone 只复制 Arc）
#[derive(Clone)]
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    /// 表单配置API
    pub form_config_api: Arc<FormConfigApi>,
}

impl AppState {
    /// 按运行配置创建AppState
    ///
    /// # 流程
    /// 1. 打开数据库连接（统一 PRAGMA，安装 SQL 观测）
    /// 2. 登记 schema_version
    /// 3. 初始化Repository与API
    pub fn new(config: &AppConfig) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", config.db_path);

        let mut conn = db::open_sqlite_connection(&config.db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        perf::install_sqlite_tracing(&mut conn, config.sql_perf);

        Self::from_connection(config.db_path.clone(), conn, config.cache_settings())
    }

    /// 用已打开的连接创建AppState（测试使用内存库/临时库）
    pub fn from_connection(
        db_path: String,
        conn: Connection,
        cache: CacheSettings,
    ) -> Result<Self, String> {
        match db::ensure_schema_version(&conn) {
            Ok(v) => tracing::debug!("schema_version={}", v),
            // best-effort: 版本登记失败不阻断启动
            Err(e) => tracing::warn!("schema_version 登记失败(将继续启动): {}", e),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let form_config_repo = Arc::new(FormConfigRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));

        // ==========================================
        // 初始化API层
        // ==========================================
        let form_config_api = Arc::new(FormConfigApi::new(
            form_config_repo,
            action_log_repo,
            cache,
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            form_config_api,
        })
    }
}
