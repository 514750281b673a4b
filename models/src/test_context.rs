use std::fmt::{Display, Formatter, Result as FormatResult};

use uuid::Uuid;

/// Correlation token identifying the test unit a lifecycle call belongs to.
///
/// Carries no state the harness depends on; it only tags log lines so the
/// output of concurrently running tests can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestContext {
    name: String,
    id: Uuid,
}

impl TestContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Display for TestContext {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{} [{}]", self.name, self.id)
    }
}
