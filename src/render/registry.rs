use std::collections::HashMap;

/// Bookkeeping for one currently-displayed note's render state.
///
/// Holds only plain data: DOM handles are re-resolved by element id and the
/// iframe itself lives in the surface pool, so the registry can be mutated
/// (and unit-tested) without a document.
#[derive(Clone, Debug)]
pub(crate) struct RenderEntry {
    pub note_key: String,

    /// Incremented on every (re)load of this slot. A measurement signal is
    /// applied only if it carries the entry's current generation; anything
    /// else is a late echo from a disposed surface.
    pub generation: u64,

    /// Element id of the slot the surface is mounted into.
    pub slot_id: String,

    /// Element id of the note's outer container (header + slot).
    pub container_id: String,

    /// Height of the title/date row, measured once before the surface loads.
    pub header_height: i32,

    /// Width last used for layout. Resize passes skip entries whose
    /// available width has not changed.
    pub last_width: i32,

    /// Measurement-in-flight state for the debounced applier.
    pub pending_height: Option<f64>,
    pub debounce_timer: Option<i32>,

    /// Set when the surface failed to load. The entry stays registered but
    /// resize and measurement become no-ops for it.
    pub load_failed: bool,

    /// Last container height actually applied, plus how many times a
    /// debounced apply has run for this entry.
    pub applied_height: Option<i32>,
    pub apply_count: u32,
}

/// Registry of all live render entries, keyed by note key.
#[derive(Default)]
pub(crate) struct RenderRegistry {
    entries: HashMap<String, RenderEntry>,
}

impl RenderRegistry {
    /// Register a fresh entry for `note_key`, superseding any incumbent.
    ///
    /// Returns the new generation and the incumbent's pending debounce timer
    /// (if any) so the caller can cancel it. Generations are monotonic per
    /// key for the registry's lifetime, so a signal armed against the old
    /// slot occupant can never be applied to the new one.
    pub fn create_entry(
        &mut self,
        note_key: &str,
        slot_id: &str,
        container_id: &str,
        header_height: i32,
        width: i32,
    ) -> (u64, Option<i32>) {
        let (generation, old_timer) = match self.entries.get_mut(note_key) {
            Some(prev) => (prev.generation + 1, prev.debounce_timer.take()),
            None => (1, None),
        };

        self.entries.insert(
            note_key.to_string(),
            RenderEntry {
                note_key: note_key.to_string(),
                generation,
                slot_id: slot_id.to_string(),
                container_id: container_id.to_string(),
                header_height,
                last_width: width,
                pending_height: None,
                debounce_timer: None,
                load_failed: false,
                applied_height: None,
                apply_count: 0,
            },
        );

        (generation, old_timer)
    }

    /// Bump the entry's generation and drop in-flight measurement state so
    /// any late signal for the old generation is filtered out. Returns the
    /// pending debounce timer for the caller to cancel.
    pub fn invalidate(&mut self, note_key: &str) -> Option<i32> {
        let e = self.entries.get_mut(note_key)?;
        e.generation += 1;
        e.pending_height = None;
        e.debounce_timer.take()
    }

    /// Invalidate and drop every entry. Returns all pending debounce timers.
    pub fn clear_all(&mut self) -> Vec<i32> {
        self.entries
            .drain()
            .filter_map(|(_, mut e)| e.debounce_timer.take())
            .collect()
    }

    /// Whether a signal carrying `generation` is still current for this key.
    pub fn accepts(&self, note_key: &str, generation: u64) -> bool {
        self.entries
            .get(note_key)
            .is_some_and(|e| e.generation == generation && !e.load_failed)
    }

    pub fn entry(&self, note_key: &str) -> Option<&RenderEntry> {
        self.entries.get(note_key)
    }

    /// Store a candidate height and hand back the previous debounce timer so
    /// the caller can restart the quiet-period countdown.
    pub fn set_pending(&mut self, note_key: &str, generation: u64, height: f64) -> Option<i32> {
        if !self.accepts(note_key, generation) {
            return None;
        }
        let e = self.entries.get_mut(note_key)?;
        e.pending_height = Some(height);
        e.debounce_timer.take()
    }

    pub fn store_debounce(&mut self, note_key: &str, generation: u64, timer: i32) {
        if let Some(e) = self.entries.get_mut(note_key) {
            if e.generation == generation {
                e.debounce_timer = Some(timer);
            }
        }
    }

    /// Take the pending height for an in-generation entry, clearing the
    /// debounce state. Each stored burst of candidates yields at most one
    /// height here.
    pub fn take_pending(&mut self, note_key: &str, generation: u64) -> Option<f64> {
        if !self.accepts(note_key, generation) {
            return None;
        }
        let e = self.entries.get_mut(note_key)?;
        e.debounce_timer = None;
        e.pending_height.take()
    }

    /// Record a completed layout application. Returns the entry's apply
    /// count so far, 0 when the generation no longer matches.
    pub fn record_applied(&mut self, note_key: &str, generation: u64, total_height: i32) -> u32 {
        if let Some(e) = self.entries.get_mut(note_key) {
            if e.generation == generation {
                e.applied_height = Some(total_height);
                e.apply_count += 1;
                return e.apply_count;
            }
        }
        0
    }

    pub fn mark_load_failed(&mut self, note_key: &str, generation: u64) {
        if let Some(e) = self.entries.get_mut(note_key) {
            if e.generation == generation {
                e.load_failed = true;
                e.pending_height = None;
            }
        }
    }

    pub fn set_width(&mut self, note_key: &str, width: i32) {
        if let Some(e) = self.entries.get_mut(note_key) {
            e.last_width = width;
        }
    }

    /// Snapshot used by the resize coordinator: (key, slot id, last width,
    /// load_failed) per entry.
    pub fn resize_snapshot(&self) -> Vec<(String, String, i32, bool)> {
        self.entries
            .values()
            .map(|e| {
                (
                    e.note_key.clone(),
                    e.slot_id.clone(),
                    e.last_width,
                    e.load_failed,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(reg: &mut RenderRegistry, key: &str) -> u64 {
        reg.create_entry(key, "slot", "card", 24, 600).0
    }

    #[test]
    fn test_first_entry_starts_at_generation_one() {
        let mut reg = RenderRegistry::default();
        assert_eq!(create(&mut reg, "a"), 1);
    }

    #[test]
    fn test_recreating_a_slot_increments_generation() {
        let mut reg = RenderRegistry::default();
        assert_eq!(create(&mut reg, "a"), 1);
        assert_eq!(create(&mut reg, "a"), 2);
        assert_eq!(create(&mut reg, "a"), 3);
        // an unrelated key is unaffected
        assert_eq!(create(&mut reg, "b"), 1);
    }

    #[test]
    fn test_invalidate_bumps_generation_and_returns_timer() {
        let mut reg = RenderRegistry::default();
        let gen1 = create(&mut reg, "a");
        reg.set_pending("a", gen1, 120.0);
        reg.store_debounce("a", gen1, 7);

        assert_eq!(reg.invalidate("a"), Some(7));
        assert!(!reg.accepts("a", gen1));
        assert_eq!(reg.entry("a").unwrap().pending_height, None);

        // a slot reused after invalidation continues the sequence
        assert_eq!(create(&mut reg, "a"), 3);
    }

    #[test]
    fn test_stale_signal_is_rejected() {
        let mut reg = RenderRegistry::default();
        let gen1 = create(&mut reg, "a");
        let gen2 = create(&mut reg, "a");

        assert_eq!(reg.set_pending("a", gen1, 300.0), None);
        assert_eq!(reg.entry("a").unwrap().pending_height, None);
        assert_eq!(reg.take_pending("a", gen1), None);

        reg.set_pending("a", gen2, 300.0);
        assert_eq!(reg.take_pending("a", gen2), Some(300.0));
    }

    #[test]
    fn test_burst_of_candidates_yields_one_pending_take() {
        let mut reg = RenderRegistry::default();
        let generation = create(&mut reg, "a");

        reg.set_pending("a", generation, 100.0);
        reg.store_debounce("a", generation, 1);
        // each later candidate supersedes the previous and hands the old
        // timer back for cancellation
        assert_eq!(reg.set_pending("a", generation, 140.0), Some(1));
        reg.store_debounce("a", generation, 2);
        assert_eq!(reg.set_pending("a", generation, 180.0), Some(2));
        reg.store_debounce("a", generation, 3);

        assert_eq!(reg.take_pending("a", generation), Some(180.0));
        // the burst is spent: nothing further to apply
        assert_eq!(reg.take_pending("a", generation), None);
        assert_eq!(reg.entry("a").unwrap().debounce_timer, None);
    }

    #[test]
    fn test_clear_all_drains_entries_and_timers() {
        let mut reg = RenderRegistry::default();
        let ga = create(&mut reg, "a");
        let gb = create(&mut reg, "b");
        reg.set_pending("a", ga, 100.0);
        reg.store_debounce("a", ga, 11);
        reg.set_pending("b", gb, 100.0);
        reg.store_debounce("b", gb, 12);

        let mut timers = reg.clear_all();
        timers.sort();
        assert_eq!(timers, vec![11, 12]);
        assert!(reg.entry("a").is_none());
        assert!(reg.entry("b").is_none());
        assert!(!reg.accepts("a", ga));
    }

    #[test]
    fn test_load_failed_entry_stops_accepting() {
        let mut reg = RenderRegistry::default();
        let generation = create(&mut reg, "a");
        reg.mark_load_failed("a", generation);

        assert!(!reg.accepts("a", generation));
        assert_eq!(reg.set_pending("a", generation, 200.0), None);
        let snap = reg.resize_snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap[0].3, "resize snapshot should carry the failed flag");
    }

    #[test]
    fn test_record_applied_tracks_count_per_generation() {
        let mut reg = RenderRegistry::default();
        let gen1 = create(&mut reg, "a");
        reg.record_applied("a", gen1, 240);
        assert_eq!(reg.entry("a").unwrap().applied_height, Some(240));
        assert_eq!(reg.entry("a").unwrap().apply_count, 1);

        // stale generation does not touch the applied size
        let _gen2 = create(&mut reg, "a");
        reg.record_applied("a", gen1, 999);
        assert_eq!(reg.entry("a").unwrap().applied_height, None);
        assert_eq!(reg.entry("a").unwrap().apply_count, 0);
    }
}
