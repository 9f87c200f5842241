use serde::{Deserialize, Serialize};

use crate::core::ImageId;

/// Role of a conversation turn, in the ShareGPT `from` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Gpt,
}

/// A single turn in a dataset item's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub from: Role,
    pub value: String,
}

/// One annotatable unit: an image plus the conversation that references it.
///
/// Items are immutable once loaded; the exporter works on deep copies and
/// never writes back into the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: ImageId,
    pub image: String,
    pub conversations: Vec<Conversation>,
}

impl DatasetItem {
    /// The first `gpt`-role turn, which carries the region placeholders.
    pub fn gpt_turn(&self) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.from == Role::Gpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_roles(roles: &[(Role, &str)]) -> DatasetItem {
        DatasetItem {
            id: ImageId::new("img_0001"),
            image: "images/img_0001.jpg".to_owned(),
            conversations: roles
                .iter()
                .map(|(from, value)| Conversation {
                    from: *from,
                    value: (*value).to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::Human).unwrap(), "\"human\"");
        assert_eq!(serde_json::to_string(&Role::Gpt).unwrap(), "\"gpt\"");

        let role: Role = serde_json::from_str("\"gpt\"").unwrap();
        assert_eq!(role, Role::Gpt);
    }

    #[test]
    fn test_dataset_item_parses_sharegpt_shape() {
        let raw = r#"{
            "id": "img_0001",
            "image": "images/img_0001.jpg",
            "conversations": [
                {"from": "human", "value": "<image>Kutulari isaretle"},
                {"from": "gpt", "value": "Iste <region>kirmizi kutu</region>"}
            ]
        }"#;

        let item: DatasetItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id, ImageId::new("img_0001"));
        assert_eq!(item.conversations.len(), 2);
        assert_eq!(item.conversations[1].from, Role::Gpt);
    }

    #[test]
    fn test_gpt_turn_returns_first_gpt_role() {
        let item = item_with_roles(&[
            (Role::System, "system prompt"),
            (Role::Human, "question"),
            (Role::Gpt, "first answer"),
            (Role::Gpt, "second answer"),
        ]);

        assert_eq!(item.gpt_turn().unwrap().value, "first answer");
    }

    #[test]
    fn test_gpt_turn_absent() {
        let item = item_with_roles(&[(Role::Human, "question")]);
        assert!(item.gpt_turn().is_none());
    }
}
