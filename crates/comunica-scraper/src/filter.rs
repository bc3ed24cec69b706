//! Record filter applied both upstream (as query parameters) and locally.

use crate::model::ApiItem;
use comunica_core::ApiConfig;

/// Exact-match filter on communication type and class code.
///
/// An unset criterion matches everything. The same filter feeds the query
/// string, but the upstream does not always honour it, so every item is
/// checked again before it becomes a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub communication_type: Option<String>,
    pub class_code: Option<String>,
}

impl RecordFilter {
    #[must_use]
    pub fn new(communication_type: Option<String>, class_code: Option<String>) -> Self {
        Self {
            communication_type: communication_type.filter(|s| !s.is_empty()),
            class_code: class_code.filter(|s| !s.is_empty()),
        }
    }

    /// Build from the API section; empty strings disable a criterion.
    #[must_use]
    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(
            Some(api.communication_type.clone()),
            Some(api.class_code.clone()),
        )
    }

    /// Whether `item` satisfies every configured criterion.
    #[must_use]
    pub fn matches(&self, item: &ApiItem) -> bool {
        field_matches(self.communication_type.as_deref(), item.tipo_comunicacao.as_deref())
            && field_matches(self.class_code.as_deref(), item.codigo_classe.as_deref())
    }
}

fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    expected.map_or(true, |want| actual == Some(want))
}
