// ==========================================
// 新品工单表单配置 - 结构编辑引擎
// ==========================================
// 职责: 增删分区/字段、分区重排
// 红线: is_custom = false 的内置元素不可删除（失败，而不是静默忽略）
// 红线: 失败时不修改任何结构
// ==========================================

use crate::domain::form_config::{FormConfiguration, FormField, FormSection, SectionOrder};
use crate::domain::schema::{
    check_dependency, find_field_anywhere, find_section, find_section_mut, validate_field,
    validate_section, SchemaError,
};
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// StructureEditor - 结构编辑引擎
// ==========================================
pub struct StructureEditor {
    // 无状态引擎
}

impl StructureEditor {
    pub fn new() -> Self {
        Self {}
    }

    /// 追加分区
    ///
    /// - order = 当前分区数量
    /// - is_custom 强制为 true（调用方提交的数据永远不是内置）
    pub fn add_section(
        &self,
        config: &mut FormConfiguration,
        mut section: FormSection,
    ) -> EngineResult<()> {
        section.section_key = section.section_key.trim().to_string();
        section.is_custom = true;
        for field in section.fields.iter_mut() {
            field.is_custom = true;
        }
        validate_section(&section)?;

        if find_section(config, &section.section_key).is_some() {
            return Err(EngineError::Validation(format!(
                "分区键已存在: {}",
                section.section_key
            )));
        }
        // 依赖可以指向新分区自身的字段，也可以指向已有分区
        for field in &section.fields {
            if let Some(cond) = &field.visible_when {
                let resolved = find_field_anywhere(&config.sections, &cond.field_key).is_some()
                    || section.fields.iter().any(|f| f.field_key == cond.field_key);
                if !resolved {
                    return Err(SchemaError::UnresolvedDependency {
                        field_key: field.field_key.clone(),
                        depends_on: cond.field_key.clone(),
                    }
                    .into());
                }
            }
        }

        section.order = config.sections.len() as i32;
        tracing::debug!(
            "追加分区: config_id={}, section={}, order={}",
            config.config_id,
            section.section_key,
            section.order
        );
        config.sections.push(section);
        Ok(())
    }

    /// 删除分区（仅自定义分区）
    ///
    /// 幸存分区的 order 保持不变（order 是排序键，不是稠密下标）
    pub fn remove_section(&self, config: &mut FormConfiguration, section_key: &str) -> EngineResult<FormSection> {
        let idx = config
            .sections
            .iter()
            .position(|s| s.section_key == section_key)
            .ok_or_else(|| EngineError::section_not_found(section_key))?;

        if !config.sections[idx].is_custom {
            return Err(EngineError::Forbidden(format!(
                "内置分区不可删除: {}",
                section_key
            )));
        }

        let mut remaining = config.sections.clone();
        let removed = remaining.remove(idx);
        ensure_still_resolvable(&remaining)?;
        config.sections = remaining;
        Ok(removed)
    }

    /// 在指定分区追加字段
    pub fn add_field(
        &self,
        config: &mut FormConfiguration,
        section_key: &str,
        mut field: FormField,
    ) -> EngineResult<()> {
        field.field_key = field.field_key.trim().to_string();
        field.is_custom = true;
        if field.field_key.is_empty() {
            return Err(EngineError::Validation("字段键不能为空".to_string()));
        }
        validate_field(&field)?;
        check_dependency(&field, &config.sections)?;

        let section = find_section_mut(config, section_key)
            .ok_or_else(|| EngineError::section_not_found(section_key))?;

        if section.fields.iter().any(|f| f.field_key == field.field_key) {
            return Err(EngineError::Validation(format!(
                "字段键已存在: {}.{}",
                section_key, field.field_key
            )));
        }

        field.order = section.fields.len() as i32;
        section.fields.push(field);
        Ok(())
    }

    /// 删除字段（仅自定义字段）
    pub fn remove_field(
        &self,
        config: &mut FormConfiguration,
        section_key: &str,
        field_key: &str,
    ) -> EngineResult<FormField> {
        let mut remaining = config.sections.clone();
        let section = find_section_mut_in(&mut remaining, section_key)
            .ok_or_else(|| EngineError::section_not_found(section_key))?;

        let idx = section
            .fields
            .iter()
            .position(|f| f.field_key == field_key)
            .ok_or_else(|| EngineError::field_not_found(section_key, field_key))?;

        if !section.fields[idx].is_custom {
            return Err(EngineError::Forbidden(format!(
                "内置字段不可删除: {}.{}",
                section_key, field_key
            )));
        }

        let removed = section.fields.remove(idx);
        ensure_still_resolvable(&remaining)?;
        config.sections = remaining;
        Ok(removed)
    }

    /// 分区重排
    ///
    /// 未知的 sectionKey 直接忽略（容忍过期客户端），不会让整批失败。
    /// 应用后按 order 升序稳定排序。
    ///
    /// # 返回
    /// 实际应用的排序对数量
    pub fn reorder_sections(&self, config: &mut FormConfiguration, orders: &[SectionOrder]) -> usize {
        let mut applied = 0;
        for pair in orders {
            match find_section_mut(config, &pair.section_key) {
                Some(section) => {
                    section.order = pair.order;
                    applied += 1;
                }
                None => {
                    tracing::debug!(
                        "重排忽略未知分区: config_id={}, section={}",
                        config.config_id,
                        pair.section_key
                    );
                }
            }
        }
        config.sections.sort_by_key(|s| s.order);
        applied
    }
}

fn find_section_mut_in<'a>(sections: &'a mut [FormSection], section_key: &str) -> Option<&'a mut FormSection> {
    sections.iter_mut().find(|s| s.section_key == section_key)
}

/// 删除后剩余字段的 visibleWhen 依赖必须仍可解析
fn ensure_still_resolvable(sections: &[FormSection]) -> EngineResult<()> {
    for field in sections.iter().flat_map(|s| s.fields.iter()) {
        if let Err(SchemaError::UnresolvedDependency { field_key, depends_on }) =
            check_dependency(field, sections)
        {
            return Err(EngineError::Validation(format!(
                "字段 {} 仍被 {} 的 visibleWhen 引用，不能删除",
                depends_on, field_key
            )));
        }
    }
    Ok(())
}

impl Default for StructureEditor {
    fn default() -> Self {
        Self::new()
    }
}
