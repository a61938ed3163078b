use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{CategoryId, DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    fn normalized(self) -> DomainResult<(String, Option<String>)> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok((name, description))
    }
}

impl Category {
    pub fn create(input: NewCategory, at: DateTime<Utc>) -> DomainResult<Self> {
        let (name, description) = input.normalized()?;
        Ok(Self {
            id: CategoryId::new(),
            name,
            description,
            created_at: at,
        })
    }

    /// Replace name and description; identity and creation time are kept.
    pub fn updated(&self, input: NewCategory) -> DomainResult<Self> {
        let (name, description) = input.normalized()?;
        Ok(Self {
            name,
            description,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_required() {
        let blank = NewCategory {
            name: "  ".into(),
            description: None,
        };
        assert!(matches!(
            Category::create(blank, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn name_is_trimmed() {
        let c = Category::create(
            NewCategory {
                name: " Tools ".into(),
                description: Some("hand tools".into()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(c.name, "Tools");
        assert_eq!(c.description.as_deref(), Some("hand tools"));
    }

    #[test]
    fn update_keeps_identity_and_revalidates() {
        let original = Category::create(
            NewCategory {
                name: "Tools".into(),
                description: Some("hand tools".into()),
            },
            Utc::now(),
        )
        .unwrap();

        let renamed = original
            .updated(NewCategory {
                name: " Power tools ".into(),
                description: None,
            })
            .unwrap();
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.created_at, original.created_at);
        assert_eq!(renamed.name, "Power tools");
        assert_eq!(renamed.description, None);

        let blank = NewCategory {
            name: "".into(),
            description: None,
        };
        assert!(matches!(original.updated(blank), Err(DomainError::Validation(_))));
    }
}
