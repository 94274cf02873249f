//! Post and comment form rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::forms::{FieldErrors, required_text};

/// Characters kept by the short display form of a post.
pub const SHORT_TEXT_CHARS: usize = 15;

pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

pub fn short_text(text: &str) -> &str {
    match text.char_indices().nth(SHORT_TEXT_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Raw post fields as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFormInput {
    #[serde(default)]
    pub text: String,
    /// Group id; empty means "no group".
    #[serde(default)]
    pub group: Option<String>,
}

/// Post fields after field-level checks. Group existence is checked by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostForm {
    pub text: String,
    pub group_id: Option<Uuid>,
}

impl PostFormInput {
    pub fn validate(&self) -> Result<PostForm, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = required_text(&mut errors, "text", &self.text);

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("group", INVALID_CHOICE_MESSAGE);
                    None
                }
            },
        };

        if errors.is_empty() {
            Ok(PostForm { text, group_id })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFormInput {
    #[serde(default)]
    pub text: String,
}

impl CommentFormInput {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = required_text(&mut errors, "text", &self.text);
        if errors.is_empty() {
            Ok(text)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_keeps_fifteen_characters() {
        assert_eq!(short_text("short"), "short");
        assert_eq!(short_text("0123456789abcdefghij"), "0123456789abcde");
        assert_eq!(short_text("Тестовый текст поста"), "Тестовый текст ");
    }

    #[test]
    fn empty_group_means_no_group() {
        let input = PostFormInput {
            text: "hello".to_string(),
            group: Some("  ".to_string()),
        };
        let form = input.validate().expect("valid form");
        assert_eq!(form.group_id, None);
        assert_eq!(form.text, "hello");
    }

    #[test]
    fn malformed_group_and_blank_text_are_both_reported() {
        let input = PostFormInput {
            text: String::new(),
            group: Some("not-a-uuid".to_string()),
        };
        let errors = input.validate().expect_err("invalid form");
        assert!(errors.get("text").is_some());
        assert_eq!(
            errors.get("group"),
            Some(&[INVALID_CHOICE_MESSAGE.to_string()][..])
        );
    }

    #[test]
    fn comment_text_is_trimmed() {
        let input = CommentFormInput {
            text: "  nice post \n".to_string(),
        };
        assert_eq!(input.validate().expect("valid comment"), "nice post");

        let blank = CommentFormInput::default();
        assert!(blank.validate().is_err());
    }
}
