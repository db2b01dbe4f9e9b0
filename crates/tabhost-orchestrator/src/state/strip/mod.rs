//! Tab strips: the ordered tabs of one window and which one is active.

mod operations;
mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use tabhost_common::TabId;

    fn t(s: &str) -> TabId {
        TabId::from(s)
    }

    fn strip(ids: &[&str]) -> TabStrip {
        let mut strip = TabStrip::new();
        for id in ids {
            strip.push(t(id));
        }
        strip
    }

    #[test]
    fn new_strip_is_empty() {
        let strip = TabStrip::new();
        assert!(strip.is_empty());
        assert_eq!(strip.active(), None);
    }

    #[test]
    fn push_does_not_activate() {
        let mut strip = strip(&["a"]);
        assert_eq!(strip.active(), None);
        assert!(strip.set_active(&t("a")));
        strip.push(t("b"));
        assert_eq!(strip.active(), Some(&t("a")));
    }

    #[test]
    fn insert_before_active_keeps_active_tab() {
        let mut strip = strip(&["a", "b"]);
        strip.set_active(&t("b"));
        assert_eq!(strip.insert(Some(0), t("c")), 0);
        assert_eq!(strip.tab_ids(), &[t("c"), t("a"), t("b")]);
        assert_eq!(strip.active(), Some(&t("b")));
    }

    #[test]
    fn insert_index_is_clamped() {
        let mut strip = strip(&["a"]);
        assert_eq!(strip.insert(Some(99), t("b")), 1);
        assert_eq!(strip.tab_ids(), &[t("a"), t("b")]);
    }

    #[test]
    fn removing_active_picks_right_neighbour() {
        let mut strip = strip(&["a", "b", "c"]);
        strip.set_active(&t("b"));
        assert_eq!(strip.remove(&t("b")), Some(1));
        assert_eq!(strip.active(), Some(&t("c")));
    }

    #[test]
    fn removing_last_active_picks_new_last() {
        let mut strip = strip(&["a", "b", "c"]);
        strip.set_active(&t("c"));
        strip.remove(&t("c"));
        assert_eq!(strip.active(), Some(&t("b")));
    }

    #[test]
    fn removing_earlier_tab_shifts_active_index() {
        let mut strip = strip(&["a", "b", "c"]);
        strip.set_active(&t("c"));
        strip.remove(&t("a"));
        assert_eq!(strip.active(), Some(&t("c")));
        assert_eq!(strip.active_index(), Some(1));
    }

    #[test]
    fn removing_only_tab_clears_active() {
        let mut strip = strip(&["a"]);
        strip.set_active(&t("a"));
        strip.remove(&t("a"));
        assert!(strip.is_empty());
        assert_eq!(strip.active(), None);
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut strip = strip(&["a"]);
        assert_eq!(strip.remove(&t("zz")), None);
        assert!(!strip.set_active(&t("zz")));
    }

    #[test]
    fn move_to_keeps_active_and_clamps() {
        let mut strip = strip(&["a", "b", "c"]);
        strip.set_active(&t("a"));
        assert!(strip.move_to(&t("a"), 10));
        assert_eq!(strip.tab_ids(), &[t("b"), t("c"), t("a")]);
        assert_eq!(strip.active(), Some(&t("a")));

        assert!(strip.move_to(&t("c"), 0));
        assert_eq!(strip.tab_ids(), &[t("c"), t("b"), t("a")]);
        assert!(!strip.move_to(&t("zz"), 0));
    }
}
