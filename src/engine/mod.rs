// ==========================================
// 新品工单表单配置 - 引擎层
// ==========================================
// 职责: 版本状态机、结构编辑、激活管理
// 红线: Engine 不拼 SQL（激活的原子性委托给仓储层事务）
// ==========================================

pub mod activation;
pub mod error;
pub mod structure_editor;
pub mod version_control;

// 重导出核心引擎
pub use activation::ActivationManager;
pub use error::{EngineError, EngineResult};
pub use structure_editor::StructureEditor;
pub use version_control::VersionController;
