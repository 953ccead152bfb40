//! # Plant-shop BDD suite
//!
//! Step definitions for the feature files under `features/`. Every scenario
//! gets its own [`Session`](plantshop_test_utils::Session) from the before
//! hook and loses it in the after hook, so nothing leaks between scenarios.
//!
//! To run the suite against a running target:
//!
//! ```bash
//! BASE_URL=http://localhost:8080 cargo run -p plantshop-bdd-tests --bin bdd-runner
//!
//! # Only API scenarios
//! cargo run -p plantshop-bdd-tests --bin bdd-runner -- --tags @api
//! ```

pub use steps::world::PlantShopWorld;

pub mod steps;

pub use cucumber;

/// Helpers shared by step definitions
pub mod utils {
    use serde_json::Value;

    /// Substituted for `{saleId}`/`{plantId}` when the scenario has none, so
    /// the request targets an id that does not exist.
    pub const MISSING_ID: &str = "999999";

    /// Split a comma-separated field list from a step
    pub fn parse_fields(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Replace `{name}` in `template` with `value`, or [`MISSING_ID`]
    pub fn substitute(template: &str, name: &str, value: Option<&str>) -> String {
        template.replace(&format!("{{{}}}", name), value.unwrap_or(MISSING_ID))
    }

    /// Append `key=value` with the right separator
    pub fn with_query(endpoint: &str, key: &str, value: impl std::fmt::Display) -> String {
        let joiner = if endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", endpoint, joiner, key, value)
    }

    /// Whether a JSON value counts as empty for "body should not be empty"
    pub fn is_empty_body(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use serde_json::json;

        #[test]
        fn placeholders_fall_back_to_missing_id() {
            assert_eq!(substitute("/api/sales/{saleId}", "saleId", Some("12")), "/api/sales/12");
            assert_eq!(substitute("/api/sales/{saleId}", "saleId", None), "/api/sales/999999");
            assert_eq!(substitute("/api/plants", "plantId", Some("3")), "/api/plants");
        }

        #[test]
        fn query_joiner_depends_on_existing_query() {
            assert_eq!(with_query("/api/sales/plant/3", "quantity", 2), "/api/sales/plant/3?quantity=2");
            assert_eq!(with_query("/api/sales/plant/3?x=1", "quantity", 2), "/api/sales/plant/3?x=1&quantity=2");
        }

        #[test]
        fn field_lists_are_trimmed() {
            assert_eq!(
                parse_fields("id, plant ,quantity,,totalPrice"),
                vec!["id", "plant", "quantity", "totalPrice"]
            );
        }

        #[test]
        fn empty_bodies() {
            assert!(is_empty_body(&Value::Null));
            assert!(is_empty_body(&json!({})));
            assert!(is_empty_body(&json!([])));
            assert!(!is_empty_body(&json!({"id": 1})));
            assert!(!is_empty_body(&json!(0)));
        }
    }
}
