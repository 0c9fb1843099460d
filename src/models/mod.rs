use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct Notebook {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct Chapter {
    pub id: String,
    pub notebook_id: String,
    pub name: String,
}

/// One note as served by the backend. Immutable for the duration of a
/// render pass; the viewer only reads it.
///
/// `content` is the markdown body and is treated as opaque input to the
/// markdown renderer. `date` arrives externally formatted; `created_at`
/// (epoch millis) is what list ordering uses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct NoteRecord {
    /// Stable key, unique within its chapter.
    pub id: String,
    pub notebook_id: String,
    pub chapter_id: String,
    pub title: String,
    pub date: String,

    /// Comma-separated; kept for future search/indexing, not displayed.
    #[serde(default)]
    pub people: String,
    #[serde(default)]
    pub labels: String,

    pub content: String,
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Viewer settings persisted locally (see `storage`).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(crate) struct AppSettings {
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Order notes for display: by creation time, note id as tiebreaker so the
/// order is stable across reloads.
pub(crate) fn sort_notes(notes: &mut [NoteRecord], order: SortOrder) {
    notes.sort_by(|a, b| {
        let by_time = a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id));
        match order {
            SortOrder::Ascending => by_time,
            SortOrder::Descending => by_time.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, created_at: i64) -> NoteRecord {
        NoteRecord {
            id: id.to_string(),
            notebook_id: "nb".to_string(),
            chapter_id: "ch".to_string(),
            title: format!("note {id}"),
            date: "2026-01-01".to_string(),
            people: String::new(),
            labels: String::new(),
            content: String::new(),
            created_at,
        }
    }

    #[test]
    fn test_note_record_contract_deserialize() {
        let json = r#"{
            "id": "2026-01-05-standup.json",
            "notebook_id": "work",
            "chapter_id": "meetings",
            "title": "Standup",
            "date": "2026-01-05",
            "people": "ana,li",
            "labels": "daily",
            "content": "- brief\n- notes",
            "created_at": 1767600000000
        }"#;
        let parsed: NoteRecord = serde_json::from_str(json).expect("note record should parse");
        assert_eq!(parsed.id, "2026-01-05-standup.json");
        assert_eq!(parsed.people, "ana,li");
        assert_eq!(parsed.created_at, 1_767_600_000_000);
    }

    #[test]
    fn test_note_record_people_and_labels_default_empty() {
        let json = r#"{
            "id": "n", "notebook_id": "nb", "chapter_id": "ch",
            "title": "t", "date": "d", "content": "", "created_at": 1
        }"#;
        let parsed: NoteRecord = serde_json::from_str(json).expect("should parse");
        assert_eq!(parsed.people, "");
        assert_eq!(parsed.labels, "");
    }

    #[test]
    fn test_sort_descending_is_default_and_newest_first() {
        assert_eq!(SortOrder::default(), SortOrder::Descending);

        let mut notes = vec![note("a", 10), note("b", 30), note("c", 20)];
        sort_notes(&mut notes, SortOrder::Descending);
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_ascending_with_stable_tiebreak() {
        let mut notes = vec![note("b", 10), note("a", 10), note("c", 5)];
        sort_notes(&mut notes, SortOrder::Ascending);
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_settings_deserialize_with_missing_fields() {
        let parsed: AppSettings = serde_json::from_str("{}").expect("should parse");
        assert_eq!(parsed.sort_order, SortOrder::Descending);
    }
}
