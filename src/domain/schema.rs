// ==========================================
// 新品工单表单配置 - 表单结构模型操作
// ==========================================
// 职责: 查找 / 深拷贝 / 边界校验
// 红线: 纯函数，无副作用
// ==========================================

use crate::domain::form_config::{FormConfiguration, FormField, FormSection};
use std::collections::HashSet;
use thiserror::Error;

/// 表单结构校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("分区键不能为空")]
    EmptySectionKey,

    #[error("分区键重复: {0}")]
    DuplicateSectionKey(String),

    #[error("字段键不能为空 (section={0})")]
    EmptyFieldKey(String),

    #[error("字段键重复: section={section_key}, field={field_key}")]
    DuplicateFieldKey {
        section_key: String,
        field_key: String,
    },

    #[error("字段 {field_key} 配置无效: {reason}")]
    InvalidField { field_key: String, reason: String },

    #[error("字段 {field_key} 的 visibleWhen 依赖不存在的字段 {depends_on}")]
    UnresolvedDependency {
        field_key: String,
        depends_on: String,
    },
}

// ==========================================
// 查找
// ==========================================

pub fn find_section<'a>(config: &'a FormConfiguration, section_key: &str) -> Option<&'a FormSection> {
    config.sections.iter().find(|s| s.section_key == section_key)
}

pub fn find_section_mut<'a>(
    config: &'a mut FormConfiguration,
    section_key: &str,
) -> Option<&'a mut FormSection> {
    config
        .sections
        .iter_mut()
        .find(|s| s.section_key == section_key)
}

pub fn find_field<'a>(
    config: &'a FormConfiguration,
    section_key: &str,
    field_key: &str,
) -> Option<&'a FormField> {
    find_section(config, section_key)?
        .fields
        .iter()
        .find(|f| f.field_key == field_key)
}

/// 在整棵 sections 中按 fieldKey 查找（visibleWhen 的依赖可以跨分区）
pub fn find_field_anywhere<'a>(sections: &'a [FormSection], field_key: &str) -> Option<&'a FormField> {
    sections
        .iter()
        .flat_map(|s| s.fields.iter())
        .find(|f| f.field_key == field_key)
}

// ==========================================
// 深拷贝
// ==========================================

/// 生成完全独立的 sections 副本
///
/// Section/Field 只含拥有所有权的值（String/Vec/Option/JsonValue），
/// 整棵树没有 Rc/引用共享，逐层 Clone 即为深拷贝。
pub fn deep_clone_sections(sections: &[FormSection]) -> Vec<FormSection> {
    sections
        .iter()
        .map(|section| FormSection {
            section_key: section.section_key.clone(),
            name: section.name.clone(),
            description: section.description.clone(),
            order: section.order,
            visible: section.visible,
            collapsible: section.collapsible,
            default_expanded: section.default_expanded,
            is_custom: section.is_custom,
            fields: section.fields.iter().map(FormField::clone).collect(),
        })
        .collect()
}

// ==========================================
// 边界校验
// ==========================================

/// 校验整棵 sections 树（键唯一 + 字段形状 + visibleWhen 依赖可解析）
pub fn validate_sections(sections: &[FormSection]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for section in sections {
        validate_section(section)?;
        if !seen.insert(section.section_key.as_str()) {
            return Err(SchemaError::DuplicateSectionKey(section.section_key.clone()));
        }
    }
    for field in sections.iter().flat_map(|s| s.fields.iter()) {
        check_dependency(field, sections)?;
    }
    Ok(())
}

/// visibleWhen 依赖的字段必须存在于 sections 中
pub fn check_dependency(field: &FormField, sections: &[FormSection]) -> Result<(), SchemaError> {
    match &field.visible_when {
        Some(cond) if find_field_anywhere(sections, &cond.field_key).is_none() => {
            Err(SchemaError::UnresolvedDependency {
                field_key: field.field_key.clone(),
                depends_on: cond.field_key.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// 校验单个分区（分区键 + 分区内字段）
pub fn validate_section(section: &FormSection) -> Result<(), SchemaError> {
    if section.section_key.trim().is_empty() {
        return Err(SchemaError::EmptySectionKey);
    }

    let mut seen = HashSet::new();
    for field in &section.fields {
        if field.field_key.trim().is_empty() {
            return Err(SchemaError::EmptyFieldKey(section.section_key.clone()));
        }
        validate_field(field)?;
        if !seen.insert(field.field_key.as_str()) {
            return Err(SchemaError::DuplicateFieldKey {
                section_key: section.section_key.clone(),
                field_key: field.field_key.clone(),
            });
        }
    }
    Ok(())
}

/// 校验字段形状与类型是否匹配
pub fn validate_field(field: &FormField) -> Result<(), SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidField {
        field_key: field.field_key.clone(),
        reason: reason.to_string(),
    };

    if field.field_type.is_choice() {
        if field.options.is_empty() {
            return Err(invalid("选择类字段必须提供 options"));
        }
        let mut values = HashSet::new();
        for opt in &field.options {
            if !values.insert(opt.value.as_str()) {
                return Err(invalid(&format!("选项值重复: {}", opt.value)));
            }
        }
    } else if !field.options.is_empty() {
        return Err(invalid(&format!("{} 类型字段不允许 options", field.field_type)));
    }

    if let Some(rules) = &field.validation {
        if rules.has_numeric_rules() && field.field_type != crate::domain::types::FieldType::Number {
            return Err(invalid("min/max/step 仅适用于 number 字段"));
        }
        if rules.has_text_rules() && !field.field_type.is_textual() {
            return Err(invalid("pattern/maxLength 仅适用于文本类字段"));
        }
        if let (Some(min), Some(max)) = (rules.min, rules.max) {
            if min > max {
                return Err(invalid("min 不能大于 max"));
            }
        }
        if let Some(step) = rules.step {
            if step <= 0.0 {
                return Err(invalid("step 必须大于 0"));
            }
        }
    }

    if let Some(cond) = &field.visible_when {
        if cond.field_key == field.field_key {
            return Err(invalid("visibleWhen 不能依赖自身"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form_config::{FieldOption, FieldValidation, VisibleWhen};
    use crate::domain::types::{FieldType, FormVersion};
    use chrono::NaiveDate;

    fn field(key: &str, field_type: FieldType) -> FormField {
        FormField {
            field_key: key.to_string(),
            label: key.to_uppercase(),
            field_type,
            required: false,
            visible: true,
            editable: true,
            order: 0,
            placeholder: None,
            help_text: None,
            default_value: None,
            grid_column: None,
            options: if field_type.is_choice() {
                vec![FieldOption::new("a", "A"), FieldOption::new("b", "B")]
            } else {
                Vec::new()
            },
            validation: None,
            is_custom: false,
            visible_when: None,
        }
    }

    fn section(key: &str, fields: Vec<FormField>) -> FormSection {
        FormSection {
            section_key: key.to_string(),
            name: key.to_string(),
            description: None,
            order: 0,
            visible: true,
            collapsible: true,
            default_expanded: true,
            is_custom: false,
            fields,
        }
    }

    fn config(sections: Vec<FormSection>) -> FormConfiguration {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        FormConfiguration {
            config_id: "cfg-1".to_string(),
            name: "test".to_string(),
            description: None,
            version: FormVersion::INITIAL,
            published_version: None,
            is_draft: false,
            is_active: false,
            sections,
            last_published_sections: None,
            last_published_at: None,
            created_by: "tester".to_string(),
            created_at: ts,
            updated_by: "tester".to_string(),
            updated_at: ts,
            revision: 1,
        }
    }

    #[test]
    fn test_find_section_and_field() {
        let cfg = config(vec![
            section("basic", vec![field("name", FieldType::Text)]),
            section("chem", vec![field("cas", FieldType::Text), field("family", FieldType::Select)]),
        ]);

        assert!(find_section(&cfg, "chem").is_some());
        assert!(find_section(&cfg, "missing").is_none());
        assert_eq!(find_field(&cfg, "chem", "family").unwrap().field_type, FieldType::Select);
        // 字段键作用域是分区内
        assert!(find_field(&cfg, "basic", "cas").is_none());
        assert!(find_field(&cfg, "missing", "cas").is_none());
        assert_eq!(find_field_anywhere(&cfg.sections, "cas").unwrap().label, "CAS");
        assert!(find_field_anywhere(&cfg.sections, "missing").is_none());
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let mut hazardous = field("hazard_class", FieldType::Select);
        hazardous.visible_when = Some(VisibleWhen {
            field_key: "is_hazardous".to_string(),
            value: serde_json::json!("yes"),
        });
        let source = vec![section("chem", vec![hazardous])];

        let mut copy = deep_clone_sections(&source);
        assert_eq!(copy, source);

        // 修改副本不影响源
        copy[0].name = "changed".to_string();
        copy[0].fields[0].options.push(FieldOption::new("c", "C"));
        copy[0].fields[0].visible_when.as_mut().unwrap().value = serde_json::json!("no");
        assert_eq!(source[0].name, "chem");
        assert_eq!(source[0].fields[0].options.len(), 2);
        assert_eq!(
            source[0].fields[0].visible_when.as_ref().unwrap().value,
            serde_json::json!("yes")
        );

        // 修改源不影响副本
        let mut source = source;
        let copy = deep_clone_sections(&source);
        source[0].fields.clear();
        assert_eq!(copy[0].fields.len(), 1);
    }

    #[test]
    fn test_validate_duplicate_keys() {
        let dup_sections = vec![section("a", vec![]), section("a", vec![])];
        assert_eq!(
            validate_sections(&dup_sections),
            Err(SchemaError::DuplicateSectionKey("a".to_string()))
        );

        let dup_fields = vec![section(
            "a",
            vec![field("x", FieldType::Text), field("x", FieldType::Number)],
        )];
        assert!(matches!(
            validate_sections(&dup_fields),
            Err(SchemaError::DuplicateFieldKey { .. })
        ));

        assert_eq!(
            validate_sections(&[section(" ", vec![])]),
            Err(SchemaError::EmptySectionKey)
        );
    }

    #[test]
    fn test_validate_visibility_dependency() {
        let mut hazard_class = field("hazard_class", FieldType::Select);
        hazard_class.visible_when = Some(VisibleWhen {
            field_key: "is_hazardous".to_string(),
            value: serde_json::json!("yes"),
        });

        // 依赖字段在另一个分区: 通过
        let ok = vec![
            section("basic", vec![field("is_hazardous", FieldType::Radio)]),
            section("chem", vec![hazard_class.clone()]),
        ];
        assert!(validate_sections(&ok).is_ok());

        // 依赖字段不存在
        let dangling = vec![section("chem", vec![hazard_class])];
        assert_eq!(
            validate_sections(&dangling),
            Err(SchemaError::UnresolvedDependency {
                field_key: "hazard_class".to_string(),
                depends_on: "is_hazardous".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_field_shape() {
        // 选择类缺 options
        let mut f = field("family", FieldType::Select);
        f.options.clear();
        assert!(validate_field(&f).is_err());

        // 非选择类带 options
        let mut f = field("name", FieldType::Text);
        f.options.push(FieldOption::new("a", "A"));
        assert!(validate_field(&f).is_err());

        // 数值约束放在文本字段上
        let mut f = field("name", FieldType::Text);
        f.validation = Some(FieldValidation {
            min: Some(1.0),
            ..Default::default()
        });
        assert!(validate_field(&f).is_err());

        // min > max
        let mut f = field("purity", FieldType::Number);
        f.validation = Some(FieldValidation {
            min: Some(10.0),
            max: Some(1.0),
            ..Default::default()
        });
        assert!(validate_field(&f).is_err());

        let mut f = field("purity", FieldType::Number);
        f.validation = Some(FieldValidation {
            min: Some(0.0),
            max: Some(100.0),
            step: Some(0.1),
            ..Default::default()
        });
        assert!(validate_field(&f).is_ok());
    }
}
