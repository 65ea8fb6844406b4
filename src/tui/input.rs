//! Single-line text entry state for modal prompts.

/// A text input with cursor tracking, used by the create/edit modals.
#[derive(Clone, Default)]
pub struct InputField {
    pub value: String,
    pub cursor: usize,
}

impl InputField {
    pub fn new() -> Self {
        InputField::default()
    }

    /// Prefill with existing text, cursor at the end.
    pub fn with_value(value: &str) -> Self {
        InputField {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    pub fn handle_char(&mut self, c: char) {
        self.value.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn handle_backspace(&mut self) {
        if self.cursor > 0 {
            let prev = floor_char_boundary(&self.value, self.cursor - 1);
            self.value.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = floor_char_boundary(&self.value, self.cursor - 1);
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.value.len() {
            self.cursor = ceil_char_boundary(&self.value, self.cursor + 1);
        }
    }

    /// Trimmed contents, or `None` when effectively empty.
    pub fn submit(&self) -> Option<String> {
        let trimmed = self.value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_at_cursor() {
        let mut field = InputField::new();
        field.handle_char('a');
        field.handle_char('b');
        field.move_cursor_left();
        field.handle_char('X');
        assert_eq!(field.value, "aXb");
        field.handle_backspace();
        assert_eq!(field.value, "ab");
    }

    #[test]
    fn handles_multibyte_boundaries() {
        let mut field = InputField::with_value("héllo");
        field.handle_backspace();
        assert_eq!(field.value, "héll");
        field.move_cursor_left();
        field.move_cursor_left();
        field.handle_backspace();
        assert_eq!(field.value, "hll");
    }

    #[test]
    fn submit_trims_and_rejects_empty() {
        assert_eq!(InputField::with_value("  hi  ").submit().as_deref(), Some("hi"));
        assert_eq!(InputField::with_value("   ").submit(), None);
    }
}
