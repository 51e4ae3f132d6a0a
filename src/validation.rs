//! Required-parameter gate run before anything is dispatched

use crate::intents::{Intent, ParameterBag};

/// Names of required parameters that are unset or blank, in declared order
pub fn validate(intent: &Intent, bag: &ParameterBag) -> Vec<String> {
    intent
        .parameters
        .iter()
        .filter(|p| p.required && bag.get_trimmed(&p.name).is_none())
        .map(|p| p.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::ParamSpec;

    fn create_schema() -> Intent {
        Intent::new("create_schema", "Create Schema")
            .param(ParamSpec::required("name"))
            .param(ParamSpec::required("catalogName"))
            .param(ParamSpec::optional("comment"))
    }

    #[test]
    fn test_missing_catalog_name() {
        let bag: ParameterBag = [("name", "s1")].into_iter().collect();
        assert_eq!(validate(&create_schema(), &bag), vec!["catalogName"]);
    }

    #[test]
    fn test_blank_counts_as_missing_in_declared_order() {
        let bag: ParameterBag = [("catalogName", "main"), ("name", "  \t")].into_iter().collect();
        assert_eq!(validate(&create_schema(), &bag), vec!["name"]);
        assert_eq!(validate(&create_schema(), &ParameterBag::new()), vec!["name", "catalogName"]);
    }

    #[test]
    fn test_optional_never_reported() {
        let bag: ParameterBag = [("name", "s1"), ("catalogName", "main")].into_iter().collect();
        assert!(validate(&create_schema(), &bag).is_empty());
    }
}
