//! Search overlay: tagged matches and the "related events" heuristic.

use crate::types::Event;

/// Minimum length (exclusive) for a word to count as a keyword
const MIN_KEYWORD_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Title,
    Notes,
    Category,
}

impl MatchType {
    pub fn label(&self) -> &'static str {
        match self {
            MatchType::Title => "Título",
            MatchType::Notes => "Notas",
            MatchType::Category => "Categoría",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult<'a> {
    pub event: &'a Event,
    pub match_type: MatchType,
    pub match_text: &'a str,
}

/// One result per matching event, tagged with the first field that matched
/// (title, then notes, then category). A blank term yields no results.
pub fn search<'a>(events: &'a [Event], term: &str) -> Vec<SearchResult<'a>> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }

    events
        .iter()
        .filter_map(|event| {
            let (match_type, match_text) = if event.title.to_lowercase().contains(&term) {
                (MatchType::Title, event.title.as_str())
            } else if event.notes.to_lowercase().contains(&term) {
                (MatchType::Notes, event.notes.as_str())
            } else if event.category.slug().contains(&term) {
                (MatchType::Category, event.category.as_str())
            } else {
                return None;
            };
            Some(SearchResult {
                event,
                match_type,
                match_text,
            })
        })
        .collect()
}

/// Lowercased words longer than three characters from title and notes
pub fn keywords(event: &Event) -> Vec<String> {
    event
        .title
        .split_whitespace()
        .chain(event.notes.split_whitespace())
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() > MIN_KEYWORD_LEN)
        .collect()
}

/// Other events that share the selected event's category or mention one of
/// its keywords in their title or notes. Keeps input order.
pub fn related_events<'a>(events: &'a [Event], selected: &Event) -> Vec<&'a Event> {
    let keywords = keywords(selected);

    events
        .iter()
        .filter(|event| event.id != selected.id)
        .filter(|event| {
            if event.category == selected.category {
                return true;
            }
            let title = event.title.to_lowercase();
            let notes = event.notes.to_lowercase();
            keywords
                .iter()
                .any(|kw| title.contains(kw.as_str()) || notes.contains(kw.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn make_event(id: &str, title: &str, category: Category, notes: &str) -> Event {
        Event::new(
            id.to_string(),
            "2025-01-15".to_string(),
            title.to_string(),
            category,
            notes.to_string(),
        )
    }

    // ========== search tests ==========

    #[test]
    fn test_search_blank_term_is_empty() {
        let events = vec![make_event("1", "Reunión", Category::Docentes, "")];
        assert!(search(&events, "").is_empty());
        assert!(search(&events, "   ").is_empty());
    }

    #[test]
    fn test_search_match_priority() {
        let events = vec![
            make_event("1", "Taller de robótica", Category::Alumnos, "taller práctico"),
            make_event("2", "Charla", Category::Alumnos, "taller después"),
            make_event("3", "Claustro", Category::Docentes, ""),
        ];

        let results = search(&events, "taller");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].match_type, MatchType::Title);
        assert_eq!(results[0].match_text, "Taller de robótica");
        assert_eq!(results[1].match_type, MatchType::Notes);
        assert_eq!(results[1].match_text, "taller después");
    }

    #[test]
    fn test_search_category_match() {
        let events = vec![make_event("1", "Claustro", Category::Docentes, "")];
        let results = search(&events, "docentes");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::Category);
        assert_eq!(results[0].match_text, "Docentes");
    }

    // ========== keyword tests ==========

    #[test]
    fn test_keywords_skip_short_words() {
        let event = make_event("1", "Día de la Feria", Category::Otros, "con mesas");
        assert_eq!(keywords(&event), vec!["feria", "mesas"]);
    }

    #[test]
    fn test_keywords_count_characters_not_bytes() {
        // "día" is three characters but four bytes
        let event = make_event("1", "día años", Category::Otros, "");
        assert_eq!(keywords(&event), vec!["años"]);
    }

    // ========== related_events tests ==========

    #[test]
    fn test_related_same_category() {
        let events = vec![
            make_event("1", "Claustro", Category::Docentes, ""),
            make_event("2", "Evaluaciones", Category::Docentes, ""),
            make_event("3", "Recreo", Category::Alumnos, ""),
        ];
        let related = related_events(&events, &events[0]);
        let ids: Vec<&str> = related.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_related_by_keyword_in_other_category() {
        let events = vec![
            make_event("1", "Feria de ciencias", Category::Alumnos, ""),
            make_event("2", "Montaje", Category::Otros, "preparar la feria"),
            make_event("3", "Ciencias naturales", Category::Presentaciones, ""),
            make_event("4", "Recreo", Category::Docentes, "sin relación"),
        ];
        let related = related_events(&events, &events[0]);
        let ids: Vec<&str> = related.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_related_excludes_selected() {
        let events = vec![make_event("1", "Feria", Category::Alumnos, "feria")];
        assert!(related_events(&events, &events[0]).is_empty());
    }

    #[test]
    fn test_related_short_words_do_not_link() {
        let events = vec![
            make_event("1", "Ida y vuelta", Category::Alumnos, ""),
            make_event("2", "La ida", Category::Docentes, ""),
        ];
        assert!(related_events(&events, &events[0]).is_empty());
    }
}
