// ==========================================
// 新品工单表单配置 - 系统内置默认分区
// ==========================================
// 用途: 新建配置（未提供 sections 时）与"恢复出厂默认"
// 红线: 内置分区/字段 is_custom = false，不可删除
// ==========================================

use crate::domain::form_config::{
    FieldOption, FieldValidation, FormField, FormSection, VisibleWhen,
};
use crate::domain::types::FieldType;
use serde_json::json;

/// 启动时自动创建的默认配置名称
pub const DEFAULT_CONFIG_NAME: &str = "Default New Product Form";

fn builtin_field(key: &str, label: &str, field_type: FieldType, order: i32) -> FormField {
    FormField {
        field_key: key.to_string(),
        label: label.to_string(),
        field_type,
        required: false,
        visible: true,
        editable: true,
        order,
        placeholder: None,
        help_text: None,
        default_value: None,
        grid_column: None,
        options: Vec::new(),
        validation: None,
        is_custom: false,
        visible_when: None,
    }
}

fn builtin_section(key: &str, name: &str, description: &str, order: i32, fields: Vec<FormField>) -> FormSection {
    FormSection {
        section_key: key.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        order,
        visible: true,
        collapsible: true,
        default_expanded: order == 0,
        is_custom: false,
        fields,
    }
}

fn options(pairs: &[(&str, &str)]) -> Vec<FieldOption> {
    pairs.iter().map(|(v, l)| FieldOption::new(v, l)).collect()
}

fn required(mut field: FormField) -> FormField {
    field.required = true;
    field
}

/// 系统出厂的默认分区（每次调用返回新的独立副本）
pub fn default_sections() -> Vec<FormSection> {
    vec![
        basic_information(),
        chemical_information(),
        packaging(),
        pricing(),
        regulatory(),
    ]
}

fn basic_information() -> FormSection {
    let mut product_name = required(builtin_field("product_name", "Product Name", FieldType::Text, 0));
    product_name.placeholder = Some("e.g. Polyol Blend 220".to_string());
    product_name.validation = Some(FieldValidation {
        max_length: Some(120),
        ..Default::default()
    });

    let mut business_unit = required(builtin_field("business_unit", "Business Unit", FieldType::Select, 1));
    business_unit.options = options(&[
        ("coatings", "Coatings"),
        ("adhesives", "Adhesives"),
        ("specialty", "Specialty Chemicals"),
    ]);

    let mut description = builtin_field("product_description", "Product Description", FieldType::Textarea, 2);
    description.grid_column = Some("span 2".to_string());

    let launch_date = builtin_field("target_launch_date", "Target Launch Date", FieldType::Date, 3);

    builtin_section(
        "basic_information",
        "Basic Information",
        "Identity of the new product",
        0,
        vec![product_name, business_unit, description, launch_date],
    )
}

fn chemical_information() -> FormSection {
    let mut cas = builtin_field("cas_number", "CAS Number", FieldType::Text, 0);
    cas.placeholder = Some("0000-00-0".to_string());
    cas.validation = Some(FieldValidation {
        pattern: Some(r"^\d{2,7}-\d{2}-\d$".to_string()),
        ..Default::default()
    });

    let mut family = required(builtin_field("chemical_family", "Chemical Family", FieldType::Select, 1));
    family.options = options(&[
        ("solvent", "Solvent"),
        ("resin", "Resin"),
        ("surfactant", "Surfactant"),
        ("pigment", "Pigment"),
    ]);

    let mut hazardous = required(builtin_field("is_hazardous", "Hazardous Material", FieldType::Radio, 2));
    hazardous.options = options(&[("yes", "Yes"), ("no", "No")]);
    hazardous.default_value = Some(json!("no"));

    let mut hazard_class = builtin_field("hazard_class", "Hazard Class", FieldType::Select, 3);
    hazard_class.options = options(&[
        ("3", "Class 3 - Flammable Liquids"),
        ("6.1", "Class 6.1 - Toxic"),
        ("8", "Class 8 - Corrosive"),
        ("9", "Class 9 - Miscellaneous"),
    ]);
    hazard_class.visible_when = Some(VisibleWhen {
        field_key: "is_hazardous".to_string(),
        value: json!("yes"),
    });

    let mut purity = builtin_field("purity_percent", "Purity (%)", FieldType::Number, 4);
    purity.validation = Some(FieldValidation {
        min: Some(0.0),
        max: Some(100.0),
        step: Some(0.01),
        ..Default::default()
    });

    builtin_section(
        "chemical_information",
        "Chemical Information",
        "Composition and hazard data",
        1,
        vec![cas, family, hazardous, hazard_class, purity],
    )
}

fn packaging() -> FormSection {
    let mut package_type = required(builtin_field("package_type", "Package Type", FieldType::Select, 0));
    package_type.options = options(&[
        ("drum", "Drum"),
        ("tote", "IBC Tote"),
        ("bag", "Bag"),
        ("bulk", "Bulk"),
    ]);

    let mut net_weight = builtin_field("net_weight", "Net Weight", FieldType::Number, 1);
    net_weight.validation = Some(FieldValidation {
        min: Some(0.0),
        ..Default::default()
    });

    let mut weight_unit = builtin_field("weight_unit", "Weight Unit", FieldType::Select, 2);
    weight_unit.options = options(&[("kg", "kg"), ("lb", "lb")]);
    weight_unit.default_value = Some(json!("kg"));

    let mut bulk_notes = builtin_field("bulk_handling_notes", "Bulk Handling Notes", FieldType::Textarea, 3);
    bulk_notes.visible_when = Some(VisibleWhen {
        field_key: "package_type".to_string(),
        value: json!("bulk"),
    });

    builtin_section(
        "packaging",
        "Packaging",
        "Container and labeling",
        2,
        vec![package_type, net_weight, weight_unit, bulk_notes],
    )
}

fn pricing() -> FormSection {
    let mut list_price = builtin_field("list_price", "List Price", FieldType::Number, 0);
    list_price.validation = Some(FieldValidation {
        min: Some(0.0),
        step: Some(0.01),
        ..Default::default()
    });

    let mut currency = required(builtin_field("currency", "Currency", FieldType::Select, 1));
    currency.options = options(&[("USD", "USD"), ("EUR", "EUR"), ("CNY", "CNY")]);
    currency.default_value = Some(json!("USD"));

    let mut moq = builtin_field("minimum_order_qty", "Minimum Order Quantity", FieldType::Number, 2);
    moq.validation = Some(FieldValidation {
        min: Some(1.0),
        step: Some(1.0),
        ..Default::default()
    });

    builtin_section(
        "pricing",
        "Pricing",
        "Commercial terms",
        3,
        vec![list_price, currency, moq],
    )
}

fn regulatory() -> FormSection {
    let reach = builtin_field("reach_registered", "REACH Registered", FieldType::Checkbox, 0);
    let tsca = builtin_field("tsca_listed", "TSCA Listed", FieldType::Checkbox, 1);

    let mut sds = required(builtin_field("sds_available", "SDS Available", FieldType::Radio, 2));
    sds.options = options(&[("yes", "Yes"), ("no", "No"), ("pending", "Pending")]);

    let mut contact = builtin_field("regulatory_contact", "Regulatory Contact", FieldType::Email, 3);
    contact.placeholder = Some("name@example.com".to_string());

    let notes = builtin_field("regulatory_notes", "Regulatory Notes", FieldType::Textarea, 4);

    builtin_section(
        "regulatory",
        "Regulatory",
        "Registrations and safety documentation",
        4,
        vec![reach, tsca, sds, contact, notes],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::validate_sections;

    #[test]
    fn test_defaults_are_valid_and_builtin() {
        let sections = default_sections();
        assert_eq!(sections.len(), 5);
        validate_sections(&sections).expect("内置默认分区必须通过校验");

        for s in &sections {
            assert!(!s.is_custom, "section {} 应为内置", s.section_key);
            assert!(s.fields.iter().all(|f| !f.is_custom));
        }

        let orders: Vec<i32> = sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    }
}
