use serde::{Deserialize, Serialize};

/// Outcome of an edit: how many documents the filter hit and how many changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateSummary {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            matched_count,
            modified_count,
        }
    }

    pub fn matched(&self) -> bool {
        self.matched_count > 0
    }
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub deleted_count: u64,
}

impl DeleteSummary {
    pub fn new(deleted_count: u64) -> Self {
        Self { deleted_count }
    }

    pub fn deleted(&self) -> bool {
        self.deleted_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_wire_names() {
        assert_eq!(
            serde_json::to_value(UpdateSummary::new(1, 0)).unwrap(),
            json!({"matchedCount": 1, "modifiedCount": 0})
        );
        assert_eq!(
            serde_json::to_value(DeleteSummary::new(2)).unwrap(),
            json!({"deletedCount": 2})
        );
    }

    #[test]
    fn test_matched_without_modification_is_distinct() {
        let unchanged = UpdateSummary::new(1, 0);
        assert!(unchanged.matched());
        assert!(!UpdateSummary::default().matched());
        assert!(!DeleteSummary::default().deleted());
    }
}
