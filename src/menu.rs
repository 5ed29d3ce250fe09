//! /start reply keyboard and the fixed mode acknowledgements.
//!
//! The modes are cosmetic: each label maps to a canned reply, every other text
//! message goes to the model.

use serde::Deserialize;
use teloxide::types::{KeyboardButton, KeyboardMarkup};

#[derive(Debug, Clone, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub reply: String,
}

pub fn default_menu() -> Vec<MenuEntry> {
    vec![
        MenuEntry {
            label: "Режим общения".to_string(),
            reply: "Пиши сообщение, отвечу как умею 🤣".to_string(),
        },
        MenuEntry {
            label: "Режим фотографий".to_string(),
            reply: "Фоток пока нет, жми другую кнопку 😅".to_string(),
        },
        MenuEntry {
            label: "Режим перевёрнутых сообщений".to_string(),
            reply: "Пришли сообщение, я его переверну!".to_string(),
        },
    ]
}

/// One-row reply keyboard with all mode labels.
pub fn start_keyboard(entries: &[MenuEntry], input_placeholder: &str) -> KeyboardMarkup {
    let row: Vec<KeyboardButton> = entries
        .iter()
        .map(|entry| KeyboardButton::new(entry.label.clone()))
        .collect();

    KeyboardMarkup::new(vec![row])
        .resize_keyboard()
        .input_field_placeholder(input_placeholder.to_string())
}

/// Canned reply if the text is exactly one of the menu labels.
pub fn acknowledgement<'a>(entries: &'a [MenuEntry], text: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|entry| entry.label == text)
        .map(|entry| entry.reply.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_maps_to_reply() {
        let menu = default_menu();
        assert_eq!(
            acknowledgement(&menu, "Режим общения"),
            Some("Пиши сообщение, отвечу как умею 🤣")
        );
    }

    #[test]
    fn test_other_text_is_not_a_mode() {
        let menu = default_menu();
        assert_eq!(acknowledgement(&menu, "привет"), None);
        assert_eq!(acknowledgement(&menu, "режим общения"), None);
    }

    #[test]
    fn test_keyboard_has_one_row_with_all_labels() {
        let menu = default_menu();
        let keyboard = start_keyboard(&menu, "Выбери режим общения");
        assert_eq!(keyboard.keyboard.len(), 1);
        let labels: Vec<&str> = keyboard.keyboard[0]
            .iter()
            .map(|button| button.text.as_str())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Режим общения",
                "Режим фотографий",
                "Режим перевёрнутых сообщений"
            ]
        );
    }
}
