// Variable substitution engine for `${NAME}` placeholders in job and step
// environment templates.

use crate::errors::SubstitutionError;
use regex::Regex;
use std::collections::HashMap;

/// VariableSubstitutor handles template variable substitution.
///
/// Supports `${VAR_NAME}` syntax for placeholders.
pub struct VariableSubstitutor {
    placeholder_regex: Regex,
}

impl VariableSubstitutor {
    pub fn new() -> Result<Self, SubstitutionError> {
        // Matches ${VAR_NAME} and captures the name inside the braces
        let placeholder_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| SubstitutionError::RegexError(e.to_string()))?;

        Ok(Self { placeholder_regex })
    }

    /// Substitute placeholders using a lookup function.
    ///
    /// Returns `SubstitutionError::UndefinedVariable` listing every
    /// placeholder the lookup could not resolve.
    pub fn substitute_with<'a, F>(
        &self,
        template: &str,
        mut lookup: F,
    ) -> Result<String, SubstitutionError>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut result = template.to_string();
        let mut undefined_vars = Vec::new();

        for cap in self.placeholder_regex.captures_iter(template) {
            let full_match = cap.get(0).unwrap().as_str();
            let var_name = cap.get(1).unwrap().as_str();

            match lookup(var_name) {
                Some(value) => {
                    result = result.replace(full_match, value);
                }
                None => {
                    undefined_vars.push(var_name.to_string());
                }
            }
        }

        if !undefined_vars.is_empty() {
            return Err(SubstitutionError::UndefinedVariable {
                variables: undefined_vars,
                template: template.to_string(),
            });
        }

        Ok(result)
    }

    /// Substitute placeholders from a map of variable values
    pub fn substitute(
        &self,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, SubstitutionError> {
        self.substitute_with(template, |name| variables.get(name).map(String::as_str))
    }

    /// Extract all unique variable names referenced by a template
    pub fn extract_variables(&self, template: &str) -> Vec<String> {
        let mut variables = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for cap in self.placeholder_regex.captures_iter(template) {
            let var_name = cap.get(1).unwrap().as_str().to_string();
            if seen.insert(var_name.clone()) {
                variables.push(var_name);
            }
        }

        variables
    }

    /// Check if a template contains any variable placeholders
    pub fn has_variables(&self, template: &str) -> bool {
        self.placeholder_regex.is_match(template)
    }
}

impl Default for VariableSubstitutor {
    fn default() -> Self {
        Self::new().expect("placeholder regex is valid")
    }
}
