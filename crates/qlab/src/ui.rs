//! Shared UI state: the footer status line and the widget list.

use smol_str::SmolStr;

/// Maximum footer length, in characters.
pub const FOOTER_LIMIT: usize = 120;
/// Prefix marking that older footer content was dropped.
pub const CONTINUATION: &str = "...";
const SEPARATOR: &str = " | ";
const INITIAL_FOOTER: &str = "Ready.";

/// Status line that accumulates messages, newest last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FooterStore {
    text: String,
}

impl Default for FooterStore {
    fn default() -> Self {
        Self {
            text: INITIAL_FOOTER.to_owned(),
        }
    }
}

impl FooterStore {
    /// Current footer text.
    pub fn footer_text(&self) -> &str {
        &self.text
    }

    /// Append `text` after a separator, keeping at most [`FOOTER_LIMIT`] characters.
    ///
    /// When the limit is exceeded the oldest characters are dropped and the
    /// result starts with [`CONTINUATION`]; the marker counts toward the limit.
    pub fn set_footer_text(&mut self, text: &str) {
        let mut next = String::with_capacity(self.text.len() + SEPARATOR.len() + text.len());
        next.push_str(&self.text);
        next.push_str(SEPARATOR);
        next.push_str(text);

        let len = next.chars().count();
        if len > FOOTER_LIMIT {
            let keep = FOOTER_LIMIT - CONTINUATION.chars().count();
            let tail: String = next.chars().skip(len - keep).collect();
            next = format!("{CONTINUATION}{tail}");
        }
        self.text = next;
    }

    /// Record a route change.
    pub fn navigate(&mut self, from: &str, to: &str) {
        tracing::debug!(from, to, "navigating");
        self.set_footer_text(&format!("Navigating from <{from}> to <{to}>."));
    }
}

/// Ordered list of widget names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetStore {
    widgets: Vec<SmolStr>,
}

impl WidgetStore {
    /// Widgets in insertion order.
    pub fn widgets(&self) -> &[SmolStr] {
        &self.widgets
    }

    /// Append a widget.
    pub fn add_widget(&mut self, widget: impl Into<SmolStr>) {
        self.widgets.push(widget.into());
    }

    /// Remove the first widget equal to `widget`. Returns whether one was removed.
    pub fn remove_widget(&mut self, widget: &str) -> bool {
        match self.widgets.iter().position(|w| w == widget) {
            Some(index) => {
                self.widgets.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_appends_with_separator() {
        let mut footer = FooterStore::default();
        assert_eq!(footer.footer_text(), "Ready.");
        footer.set_footer_text("Saved.");
        assert_eq!(footer.footer_text(), "Ready. | Saved.");
    }

    #[test]
    fn footer_never_exceeds_limit() {
        let mut footer = FooterStore::default();
        for i in 0..50 {
            footer.set_footer_text(&format!("message number {i}"));
            assert!(footer.footer_text().chars().count() <= FOOTER_LIMIT);
        }
        let text = footer.footer_text();
        assert_eq!(text.chars().count(), FOOTER_LIMIT);
        assert!(text.starts_with(CONTINUATION));
        assert!(text.ends_with(" | message number 49"));
    }

    #[test]
    fn footer_truncates_oversized_message() {
        let mut footer = FooterStore::default();
        let long = "x".repeat(300);
        footer.set_footer_text(&long);
        assert_eq!(footer.footer_text(), format!("...{}", "x".repeat(117)));
    }

    #[test]
    fn footer_counts_characters_not_bytes() {
        let mut footer = FooterStore::default();
        footer.set_footer_text(&"é".repeat(200));
        let text = footer.footer_text();
        assert_eq!(text.chars().count(), FOOTER_LIMIT);
        assert!(text.ends_with('é'));
    }

    #[test]
    fn navigate_records_route_change() {
        let mut footer = FooterStore::default();
        footer.navigate("/login", "/profile");
        assert_eq!(
            footer.footer_text(),
            "Ready. | Navigating from </login> to </profile>."
        );
    }

    #[test]
    fn add_then_remove_restores_empty_list() {
        let mut store = WidgetStore::default();
        store.add_widget("x");
        assert_eq!(store.widgets(), ["x"]);
        assert!(store.remove_widget("x"));
        assert!(store.widgets().is_empty());
    }

    #[test]
    fn remove_absent_is_noop_and_first_match_only() {
        let mut store = WidgetStore::default();
        store.add_widget("clock");
        store.add_widget("chart");
        store.add_widget("clock");
        assert!(!store.remove_widget("weather"));
        assert_eq!(store.widgets(), ["clock", "chart", "clock"]);
        assert!(store.remove_widget("clock"));
        assert_eq!(store.widgets(), ["chart", "clock"]);
    }
}
