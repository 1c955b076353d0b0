use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line scratch buffer used while adding a task or entering a date.
/// `cursor` is a byte offset that always sits on a char boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
    placeholder: String,
}

impl TextInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Clears the buffer and shows `placeholder` until something is typed.
    pub fn reset(&mut self, placeholder: &str) {
        self.value.clear();
        self.cursor = 0;
        self.placeholder = placeholder.to_string();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Applies an editing key. Returns false for keys the buffer ignores.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) => {
                if key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    return false;
                }
                self.insert_char(c);
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),
            _ => return false,
        }
        true
    }

    pub fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.insert_char(ch);
        }
    }

    fn move_left(&mut self) {
        self.cursor = prev_boundary(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        self.cursor = next_boundary(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_boundary(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn delete(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        let next = next_boundary(self.cursor, &self.value);
        self.value.drain(self.cursor..next);
    }

    /// The buffer with a block caret at the cursor, for rendering.
    pub fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert(self.cursor, '▌');
        text
    }
}

fn prev_boundary(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_boundary(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_editing() {
        let mut input = TextInput::default();
        input.reset("new task");
        for c in "héllo".chars() {
            assert!(input.handle_key(key(KeyCode::Char(c))));
        }
        assert_eq!(input.value(), "héllo");

        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "hllo");
        assert_eq!(input.with_caret(), "h▌llo");

        input.handle_key(key(KeyCode::Delete));
        assert_eq!(input.value(), "hlo");
        input.handle_key(key(KeyCode::End));
        input.insert_str("!");
        assert_eq!(input.value(), "hlo!");
        assert_eq!(input.placeholder(), "new task");
    }

    #[test]
    fn control_chords_are_ignored() {
        let mut input = TextInput::default();
        let chord = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(!input.handle_key(chord));
        assert!(input.is_empty());
    }

    #[test]
    fn reset_clears_value_and_sets_placeholder() {
        let mut input = TextInput::default();
        input.insert_str("partial");
        input.reset("YYYY-MM-DD or MM-DD");
        assert!(input.is_empty());
        assert_eq!(input.with_caret(), "▌");
        assert_eq!(input.placeholder(), "YYYY-MM-DD or MM-DD");
    }
}
