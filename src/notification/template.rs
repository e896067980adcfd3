//! `{placeholder}` substitution for notification subjects and bodies.

use crate::models::NotificationContext;

/// Subject used when an observer has no subject template configured.
const DEFAULT_SUBJECT: &str = "[{observer_name}] condition met on {table_name}";

/// Body used when an observer has no body template configured.
const DEFAULT_BODY: &str = "Observer {observer_name} matched on table {table_name}.\n\
     Field: {field}\n\
     Condition: {condition}\n\
     Current value: {current_value}\n\
     Record: {record_id}";

/// Renders a template against the context. Unknown placeholders are left
/// as-is so a typo is visible in the delivered message instead of silently
/// vanishing.
pub fn render(template: &str, context: &NotificationContext) -> String {
    template
        .replace("{observer_name}", &context.observer_name)
        .replace("{table_name}", &context.table_name)
        .replace("{field}", &context.field)
        .replace("{condition}", &context.condition)
        .replace("{current_value}", &context.current_value)
        .replace("{record_id}", &context.record_id)
}

/// The rendered subject, falling back to the default template.
pub fn render_subject(context: &NotificationContext) -> String {
    let template = if context.subject_template.trim().is_empty() {
        DEFAULT_SUBJECT
    } else {
        &context.subject_template
    };
    render(template, context)
}

/// The rendered body, falling back to the default template.
pub fn render_body(context: &NotificationContext) -> String {
    let template = if context.body_template.trim().is_empty() {
        DEFAULT_BODY
    } else {
        &context.body_template
    };
    render(template, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationChannels;

    fn context() -> NotificationContext {
        NotificationContext {
            observer_name: "low stock".into(),
            table_name: "products".into(),
            field: "quantity".into(),
            condition: "value < 10".into(),
            current_value: "3".into(),
            record_id: "42".into(),
            subject_template: String::new(),
            body_template: String::new(),
            channels: NotificationChannels::default(),
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let rendered = render(
            "{observer_name}/{table_name}/{field}/{condition}/{current_value}/{record_id}",
            &context(),
        );
        assert_eq!(rendered, "low stock/products/quantity/value < 10/3/42");
    }

    #[test]
    fn unknown_placeholders_survive() {
        assert_eq!(render("{nope} {field}", &context()), "{nope} quantity");
    }

    #[test]
    fn empty_templates_fall_back_to_defaults() {
        let subject = render_subject(&context());
        assert_eq!(subject, "[low stock] condition met on products");

        let body = render_body(&context());
        assert!(body.contains("Current value: 3"));
        assert!(body.contains("Record: 42"));
    }

    #[test]
    fn configured_templates_win() {
        let mut ctx = context();
        ctx.subject_template = "ALERT {record_id}".into();
        assert_eq!(render_subject(&ctx), "ALERT 42");
    }
}
