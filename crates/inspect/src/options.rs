use serde::{Deserialize, Serialize};

/// Visibility toggles and limits for one browsing session.
///
/// Defaults show public and non-public fields plus void and value-returning
/// operations; everything else starts off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectOptions {
    /// Show fields declared public.
    pub public_fields: bool,

    /// Show fields declared non-public.
    pub non_public_fields: bool,

    /// Show fields flagged transient.
    pub transient_fields: bool,

    /// Show void-returning operations.
    pub void_operations: bool,

    /// Show value-returning operations.
    pub value_operations: bool,

    /// Show operations that take parameters.
    pub operations_with_params: bool,

    /// Keep null sequence elements (retained elements always keep their
    /// original numeric index label).
    pub null_elements: bool,

    /// Show operations declared on the universal base class.
    pub base_operations: bool,

    /// Expand text values into their character elements.
    pub text_internals: bool,

    /// Expand aliased values into independent subtrees instead of
    /// "reference" shortcuts.
    pub show_duplicates: bool,

    /// Depth cap for one expansion pass; capped nodes are left childless.
    pub max_depth: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            public_fields: true,
            non_public_fields: true,
            transient_fields: false,
            void_operations: true,
            value_operations: true,
            operations_with_params: false,
            null_elements: false,
            base_operations: false,
            text_internals: false,
            show_duplicates: false,
            max_depth: 32,
        }
    }
}

impl InspectOptions {
    /// Any field visibility enabled. When none is, primitive-or-null fields
    /// are skipped entirely.
    pub fn show_fields(&self) -> bool {
        self.public_fields || self.non_public_fields || self.transient_fields
    }

    /// Any operation visibility enabled.
    pub fn show_operations(&self) -> bool {
        self.void_operations || self.value_operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_visibility() {
        let options = InspectOptions::default();

        assert!(options.public_fields);
        assert!(options.non_public_fields);
        assert!(options.void_operations);
        assert!(options.value_operations);
        assert!(!options.transient_fields);
        assert!(!options.operations_with_params);
        assert!(!options.null_elements);
        assert!(!options.base_operations);
        assert!(!options.text_internals);
        assert!(!options.show_duplicates);
        assert_eq!(options.max_depth, 32);
    }

    #[test]
    fn test_show_helpers() {
        let mut options = InspectOptions::default();
        assert!(options.show_fields());
        assert!(options.show_operations());

        options.public_fields = false;
        options.non_public_fields = false;
        assert!(!options.show_fields());
        options.transient_fields = true;
        assert!(options.show_fields());

        options.void_operations = false;
        options.value_operations = false;
        assert!(!options.show_operations());
    }
}
