//! clipkeep - Selection history store
//!
//! Tiered, deduplicating container for observed clipboard selections.
//! Selections at the end of each tier are the most recent.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::clipboard::models::{strip_terminator, Selection, LINE_TERMINATOR};

/// Which retention tier an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    All,
    Ephemeral,
    Important,
}

impl Tier {
    fn covers_ephemeral(self) -> bool {
        matches!(self, Tier::All | Tier::Ephemeral)
    }

    fn covers_important(self) -> bool {
        matches!(self, Tier::All | Tier::Important)
    }
}

/// Retention limits for the two tiers
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub max_ephemeral: usize,
    pub max_important: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_ephemeral: 200,
            max_important: 100,
        }
    }
}

/// Whole-store state as moved across the persistence boundary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub ephemeral: Vec<Selection>,
    pub important: Vec<Selection>,
    pub last: Option<Selection>,
}

/// The selection history.
///
/// The ephemeral tier holds unconfirmed history, the important tier holds
/// selections the user explicitly copied back. `last` always tracks the
/// most recently observed selection, independent of tier membership.
///
/// The store itself is a plain container; the daemon shares one instance
/// behind a mutex and every public operation runs under a single lock
/// acquisition.
pub struct SelectionStore {
    ephemeral: Vec<Selection>,
    important: Vec<Selection>,
    last: Option<Selection>,
    options: StoreOptions,
}

impl SelectionStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            ephemeral: Vec::new(),
            important: Vec::new(),
            last: None,
            options,
        }
    }

    /// Rebuild a store from a persisted snapshot, re-applying the caps
    pub fn restore(snapshot: HistorySnapshot, options: StoreOptions) -> Self {
        let mut store = Self {
            ephemeral: snapshot.ephemeral,
            important: snapshot.important,
            last: snapshot.last,
            options,
        };
        store.enforce_caps();
        store
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            ephemeral: self.ephemeral.clone(),
            important: self.important.clone(),
            last: self.last.clone(),
        }
    }

    pub fn ephemeral(&self) -> &[Selection] {
        &self.ephemeral
    }

    pub fn important(&self) -> &[Selection] {
        &self.important
    }

    pub fn last(&self) -> Option<&Selection> {
        self.last.as_ref()
    }

    /// Ingest a newly observed selection.
    ///
    /// Repeated reads of an unchanged clipboard are ignored. A selection
    /// already present in the important tier refreshes its recency there
    /// instead of duplicating into ephemeral. New ephemeral entries absorb
    /// earlier entries whose content they contain, so incremental typing
    /// replaces its own partial selections. Returns whether the store
    /// changed.
    pub fn add(&mut self, selection: Selection) -> bool {
        log::debug!("adding selection: {} bytes", selection.content.len());

        if let Some(last) = &self.last {
            if selection.content_eq(last) {
                log::debug!("selection matches the last observed one, ignoring");
                return false;
            }
        }
        self.last = Some(selection.clone());

        let mut is_important = false;
        self.important.retain(|sel| {
            if sel.content_eq(&selection) {
                is_important = true;
                false
            } else {
                true
            }
        });
        if is_important {
            log::debug!("selection already in the important tier, refreshing");
            self.important.push(selection.clone());
        }

        self.ephemeral.retain(|sel| {
            let absorbed = contains_subslice(&selection.content, &sel.content);
            if absorbed {
                log::debug!(
                    "dropping selection contained in the new one: {} bytes",
                    sel.content.len()
                );
            }
            !absorbed
        });
        if !is_important {
            self.ephemeral.push(selection);
        }

        self.enforce_caps();

        log::debug!(
            "history now holds {} ephemeral and {} important selections",
            self.ephemeral.len(),
            self.important.len()
        );
        true
    }

    /// Write the externally visible ordering as terminated lines.
    ///
    /// `last` comes first, exactly once; the remaining entries interleave
    /// by recency with important entries ahead of ephemeral ones at each
    /// rank, skipping any entry whose line duplicates `last`'s.
    pub fn list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        log::debug!(
            "listing {} important and {} ephemeral selections",
            self.important.len(),
            self.ephemeral.len()
        );

        let last_line = match &self.last {
            Some(last) => {
                let line = last.line();
                out.write_all(&line)?;
                out.write_all(&[LINE_TERMINATOR])?;
                Some(line)
            }
            None => None,
        };

        let rounds = self.important.len().max(self.ephemeral.len());
        for rank in 0..rounds {
            for tier in [&self.important, &self.ephemeral] {
                let Some(sel) = tier
                    .len()
                    .checked_sub(rank + 1)
                    .and_then(|idx| tier.get(idx))
                else {
                    continue;
                };
                let line = sel.line();
                if last_line.as_deref() == Some(line.as_slice()) {
                    continue;
                }
                out.write_all(&line)?;
                out.write_all(&[LINE_TERMINATOR])?;
            }
        }
        Ok(())
    }

    /// Resolve a client-supplied line back to a selection and promote it
    /// to the important tier
    pub fn copy(&mut self, line: &[u8]) -> Option<Selection> {
        let line = strip_terminator(line)?;

        if let Some(idx) = self.important.iter().position(|sel| sel.line() == line) {
            let selection = self.important.remove(idx);
            self.important.push(selection.clone());
            self.last = Some(selection.clone());
            return Some(selection);
        }

        if let Some(idx) = self.ephemeral.iter().position(|sel| sel.line() == line) {
            let selection = self.ephemeral.remove(idx);
            log::debug!("promoting selection to the important tier");
            self.important.push(selection.clone());
            self.last = Some(selection.clone());
            self.enforce_caps();
            return Some(selection);
        }

        None
    }

    /// Look a line up without promotion or any other mutation
    pub fn find_match(&self, line: &[u8]) -> Option<&Selection> {
        let line = strip_terminator(line)?;
        self.important
            .iter()
            .chain(self.ephemeral.iter())
            .find(|sel| sel.line() == line)
    }

    /// Remove every entry of the selected tier(s) whose line equals
    /// `pattern`; reports whether anything was removed. `last` is never
    /// touched.
    pub fn clear(&mut self, pattern: &[u8], tier: Tier) -> bool {
        let mut found = false;
        if tier.covers_ephemeral() {
            self.ephemeral.retain(|sel| {
                if sel.line() == pattern {
                    log::debug!("clearing ephemeral selection: {} bytes", sel.content.len());
                    found = true;
                    false
                } else {
                    true
                }
            });
        }
        if tier.covers_important() {
            self.important.retain(|sel| {
                if sel.line() == pattern {
                    log::debug!("clearing important selection: {} bytes", sel.content.len());
                    found = true;
                    false
                } else {
                    true
                }
            });
        }
        found
    }

    /// Empty the selected tier(s). `last` is never touched.
    pub fn clear_all(&mut self, tier: Tier) {
        if tier.covers_ephemeral() {
            log::debug!("clearing all ephemeral selections");
            self.ephemeral.clear();
        }
        if tier.covers_important() {
            log::debug!("clearing all important selections");
            self.important.clear();
        }
    }

    fn enforce_caps(&mut self) {
        if self.ephemeral.len() > self.options.max_ephemeral {
            let excess = self.ephemeral.len() - self.options.max_ephemeral;
            log::debug!("truncating ephemeral tier by {} oldest entries", excess);
            self.ephemeral.drain(..excess);
        }
        if self.important.len() > self.options.max_important {
            let excess = self.important.len() - self.options.max_important;
            log::debug!("truncating important tier by {} oldest entries", excess);
            self.important.drain(..excess);
        }
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::clipboard::models::Target;

    fn store() -> SelectionStore {
        SelectionStore::new(StoreOptions::default())
    }

    fn text(content: &str) -> Selection {
        Selection::new(content.as_bytes().to_vec(), Target::Utf8String)
    }

    fn png(width: u32, height: u32, luma: u8) -> Selection {
        let img = image::GrayImage::from_pixel(width, height, image::Luma([luma]));
        let mut out = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        Selection::new(out, Target::ImagePng)
    }

    fn listed(store: &SelectionStore) -> Vec<u8> {
        let mut out = Vec::new();
        store.list(&mut out).unwrap();
        out
    }

    #[test]
    fn add_single() {
        let mut s = store();
        s.add(text("test"));
        assert_eq!(listed(&s), b"test\0".to_vec());
    }

    #[test]
    fn add_multiple_lists_most_recent_first() {
        let mut s = store();
        s.add(text("Selection A"));
        s.add(text("Selection B"));
        assert_eq!(listed(&s), b"Selection B\0Selection A\0".to_vec());
    }

    #[test]
    fn repeated_read_is_idempotent() {
        let mut s = store();
        assert!(s.add(text("x")));
        let before = s.snapshot();
        assert!(!s.add(text("x")));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn new_selection_absorbs_its_own_prefix() {
        let mut s = store();
        s.add(text("Sel"));
        s.add(text("Selection"));
        assert_eq!(listed(&s), b"Selection\0".to_vec());
        assert_eq!(s.ephemeral().len(), 1);
    }

    #[test]
    fn absorption_is_order_dependent() {
        let mut s = store();
        s.add(text("Selection B"));
        s.add(text("Selection"));
        // Neither contains the other, both remain, newest first.
        assert_eq!(listed(&s), b"Selection\0Selection B\0".to_vec());
    }

    #[test]
    fn absorption_skips_the_important_tier() {
        let mut s = store();
        s.add(text("Selection"));
        let copied = s.copy(b"Selection\0").unwrap();
        assert_eq!(copied.content, b"Selection".to_vec());

        s.add(text("Selection B"));
        s.add(text("Selection C"));

        assert_eq!(
            listed(&s),
            b"Selection C\0Selection\0Selection B\0".to_vec()
        );
        assert_eq!(s.important().len(), 1);
        assert_eq!(s.important()[0].content, b"Selection".to_vec());
    }

    #[test]
    fn readding_known_important_content_refreshes_it() {
        let mut s = store();
        s.add(text("keep"));
        s.copy(b"keep").unwrap();
        s.add(text("other"));
        s.add(text("keep"));

        assert_eq!(s.important().len(), 1);
        assert!(s.ephemeral().iter().all(|sel| sel.content != b"keep"));
        assert_eq!(s.last().unwrap().content, b"keep".to_vec());
    }

    #[test]
    fn copy_promotes_and_sets_last() {
        let mut s = store();
        s.add(text("a"));
        s.add(text("b"));

        let copied = s.copy(b"a").unwrap();
        assert_eq!(copied.content, b"a".to_vec());
        assert_eq!(s.important().len(), 1);
        assert!(s.ephemeral().iter().all(|sel| sel.content != b"a"));
        assert_eq!(s.last().unwrap().content, b"a".to_vec());
    }

    #[test]
    fn copy_miss_leaves_the_store_unchanged() {
        let mut s = store();
        s.add(text("a"));
        let before = s.snapshot();
        assert!(s.copy(b"nope").is_none());
        assert!(s.copy(b"").is_none());
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn copy_accepts_terminated_lines() {
        let mut s = store();
        s.add(text("a"));
        assert!(s.copy(b"a\n").is_some());
        s.add(text("b"));
        assert!(s.copy(b"b\0").is_some());
    }

    #[test]
    fn list_interleaves_by_recency_important_first() {
        let mut s = store();
        s.add(text("A"));
        s.add(text("B"));
        s.copy(b"A").unwrap();
        s.add(text("C"));
        s.add(text("D"));

        // last, most recent important, then ephemeral by recency with the
        // duplicate of last skipped.
        assert_eq!(listed(&s), b"D\0A\0C\0B\0".to_vec());
    }

    #[test]
    fn list_without_last_is_empty_store() {
        let s = store();
        assert_eq!(listed(&s), Vec::<u8>::new());
    }

    #[test]
    fn find_match_does_not_mutate() {
        let mut s = store();
        s.add(text("a"));
        let before = s.snapshot();
        let found = s.find_match(b"a").unwrap().clone();
        assert_eq!(found.content, b"a".to_vec());
        assert!(s.find_match(b"nope").is_none());
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn clear_preserves_last() {
        let mut s = store();
        s.add(text("A"));
        s.add(text("B"));
        s.copy(b"B").unwrap();

        assert!(s.clear(b"A", Tier::Ephemeral));
        assert!(s.ephemeral().is_empty());
        assert_eq!(s.important().len(), 1);
        assert_eq!(s.important()[0].content, b"B".to_vec());
        assert_eq!(s.last().unwrap().content, b"B".to_vec());
    }

    #[test]
    fn clear_respects_the_tier() {
        let mut s = store();
        s.add(text("A"));
        s.copy(b"A").unwrap();
        s.add(text("B"));

        // "A" lives in important, clearing ephemeral misses it.
        assert!(!s.clear(b"A", Tier::Ephemeral));
        assert!(s.clear(b"A", Tier::Important));
        assert!(s.important().is_empty());
    }

    #[test]
    fn clear_all_empties_tiers_but_keeps_last() {
        let mut s = store();
        s.add(text("A"));
        s.copy(b"A").unwrap();
        s.add(text("B"));

        s.clear_all(Tier::All);
        assert!(s.ephemeral().is_empty());
        assert!(s.important().is_empty());
        assert_eq!(s.last().unwrap().content, b"B".to_vec());
        assert_eq!(listed(&s), b"B\0".to_vec());
    }

    #[test]
    fn cap_eviction_drops_the_oldest() {
        let mut s = SelectionStore::new(StoreOptions {
            max_ephemeral: 3,
            max_important: 2,
        });
        // Numbered contents share no substrings, nothing is absorbed.
        for content in ["one", "two", "three", "four"] {
            s.add(text(content));
        }
        assert_eq!(s.ephemeral().len(), 3);
        assert_eq!(s.ephemeral()[0].content, b"two".to_vec());
        assert_eq!(s.ephemeral()[2].content, b"four".to_vec());
    }

    #[test]
    fn image_lines_are_hash_addressed() {
        // Image addressing collapses on the content hash: distinct images
        // get distinct lines, identical bytes share one line, and two
        // different images with a colliding hash would be
        // indistinguishable to copy/clear. The collision case is accepted,
        // not resolved.
        let a = png(2, 2, 0x00);
        let b = png(2, 2, 0xff);
        assert_ne!(a.line(), b.line());

        let mut s = store();
        s.add(a.clone());
        s.add(b.clone());
        s.add(text("t"));

        let copied = s.copy(&a.line()).unwrap();
        assert!(copied.content_eq(&a));
        assert!(s.clear(&b.line(), Tier::All));
        assert!(s.ephemeral().iter().all(|sel| !sel.content_eq(&b)));
    }

    #[test]
    fn restore_reapplies_caps() {
        let snapshot = HistorySnapshot {
            ephemeral: vec![text("one"), text("two"), text("three")],
            important: vec![],
            last: Some(text("three")),
        };
        let s = SelectionStore::restore(
            snapshot,
            StoreOptions {
                max_ephemeral: 2,
                max_important: 2,
            },
        );
        assert_eq!(s.ephemeral().len(), 2);
        assert_eq!(s.ephemeral()[0].content, b"two".to_vec());
    }
}
