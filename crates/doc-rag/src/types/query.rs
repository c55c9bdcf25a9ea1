//! Query request types

use serde::{Deserialize, Serialize};

/// Question submitted to the query entry point
///
/// Accepted both as a form field (`question=...`) and as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    #[serde(default)]
    pub question: String,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_question_deserializes_empty() {
        let request: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(request.question.is_empty());
    }
}
