// ==========================================
// 新品工单表单配置 - 性能观测
// ==========================================
// SQL 计数 + 慢 SQL 日志 + 单次操作耗时
// 开关: TICKET_FORM_PERF_SQL / TICKET_FORM_SLOW_SQL_MS
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const PERF_SQL_ENV: &str = "TICKET_FORM_PERF_SQL";
pub const SLOW_SQL_MS_ENV: &str = "TICKET_FORM_SLOW_SQL_MS";

static SQL_PROFILE_ON: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static OPEN_GUARDS: Cell<u32> = const { Cell::new(0) };
    static STATEMENTS: Cell<u64> = const { Cell::new(0) };
    static SLOW_STATEMENTS: Cell<u64> = const { Cell::new(0) };
}

/// SQL 观测参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPerfSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl SqlPerfSettings {
    /// 从环境变量读取
    ///
    /// - 未设置 TICKET_FORM_PERF_SQL 时: Debug 开启，Release 关闭
    /// - 未设置 TICKET_FORM_SLOW_SQL_MS 时: Debug 50ms，Release 200ms
    pub fn from_env() -> Self {
        let enabled = std::env::var(PERF_SQL_ENV)
            .map(|v| flag_on(&v))
            .unwrap_or(cfg!(debug_assertions));
        let slow_sql_ms = std::env::var(SLOW_SQL_MS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_sql_ms,
        }
    }
}

pub(crate) fn flag_on(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn one_line(sql: &str, max_chars: usize) -> String {
    let flat = sql.trim().replace('\n', " ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

/// 在连接上安装 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection, settings: SqlPerfSettings) {
    SQL_PROFILE_ON.store(settings.enabled, Ordering::Relaxed);
    SLOW_SQL_MS.store(settings.slow_sql_ms, Ordering::Relaxed);

    if settings.enabled {
        conn.trace(Some(on_statement));
        conn.profile(Some(on_profile));
    } else {
        conn.trace(None);
        conn.profile(None);
    }
}

fn guard_open() -> bool {
    OPEN_GUARDS.with(|d| d.get() > 0)
}

fn on_statement(_sql: &str) {
    if SQL_PROFILE_ON.load(Ordering::Relaxed) && guard_open() {
        STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_profile(sql: &str, duration: Duration) {
    if !SQL_PROFILE_ON.load(Ordering::Relaxed) {
        return;
    }
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %one_line(sql, 400),
        "slow sql"
    );
    if guard_open() {
        SLOW_STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 单次操作耗时 Guard: 记录 elapsed_ms + SQL 语句数 + 慢 SQL 数
///
/// ```ignore
/// let _perf = ticket_form_config::perf::PerfGuard::new("form_config_publish");
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        OPEN_GUARDS.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            started: Instant::now(),
            statements_at_start: STATEMENTS.with(|c| c.get()),
            slow_at_start: SLOW_STATEMENTS.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let sql_count = STATEMENTS
            .with(|c| c.get())
            .saturating_sub(self.statements_at_start);
        let slow_sql_count = SLOW_STATEMENTS
            .with(|c| c.get())
            .saturating_sub(self.slow_at_start);

        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "done"
        );

        OPEN_GUARDS.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("SELECT 1", 100), "SELECT 1");
        let long = "SELECT config_id\nFROM form_configuration";
        assert_eq!(one_line(long, 16), "SELECT config_id…");
    }

    #[test]
    fn test_flag_on() {
        for v in ["1", "TRUE", " yes ", "on"] {
            assert!(flag_on(v));
        }
        assert!(!flag_on("0"));
        assert!(!flag_on("off"));
    }

    #[test]
    fn test_perf_guard_with_tracing_installed() {
        let mut conn = Connection::open_in_memory().unwrap();
        install_sqlite_tracing(
            &mut conn,
            SqlPerfSettings {
                enabled: true,
                slow_sql_ms: 10_000,
            },
        );
        let _perf = PerfGuard::new("perf_guard_test");
        let n: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(n, 1);
    }
}
