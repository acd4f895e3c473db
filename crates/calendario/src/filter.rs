//! Narrowing the event list by search term, category and date window.
//!
//! All three predicates look only at the event itself, so they compose as
//! a plain AND and can be applied in any order.

use chrono::{Datelike, Duration, NaiveDate};
use std::str::FromStr;
use strum::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::types::{Category, Event};

/// Number of days covered by the `last30` window, excluding today
const LAST_DAYS_WINDOW: i64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unknown category filter '{0}'")]
    Category(String),

    #[error("unknown date range '{0}'")]
    DateRange(String),
}

/// Category selector: everything, or one exact category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(category) => category.as_str(),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => event.category == *category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = FilterParseError;

    /// `"all"` or an exact, case-sensitive category name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(CategoryFilter::All);
        }
        s.parse::<Category>()
            .map(CategoryFilter::Only)
            .map_err(|_| FilterParseError::Category(s.to_string()))
    }
}

/// Preset date windows relative to today
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Last30,
}

impl DateRange {
    pub fn parse(s: &str) -> Result<Self, FilterParseError> {
        s.parse()
            .map_err(|_| FilterParseError::DateRange(s.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Spanish label shown in the filter selector
    pub fn label(&self) -> &'static str {
        match self {
            DateRange::All => "Todas las fechas",
            DateRange::Today => "Hoy",
            DateRange::Week => "Esta semana",
            DateRange::Month => "Este mes",
            DateRange::Last30 => "Últimos 30 días",
        }
    }

    /// Whether `date` lies inside this window as seen from `today`
    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            DateRange::All => true,
            DateRange::Today => date == today,
            DateRange::Week => {
                let (start, end) = week_bounds(today, WeekStart::Sunday);
                date >= start && date <= end
            }
            DateRange::Month => date.year() == today.year() && date.month() == today.month(),
            DateRange::Last30 => {
                let from = today - Duration::days(LAST_DAYS_WINDOW);
                date >= from && date <= today
            }
        }
    }
}

/// First day of the week.
///
/// The month grid lays weeks out Monday-first while the "this week" filter
/// counts from Sunday. Both conventions are kept as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    /// Position of `date` within its week, 0-based from the week start
    pub fn offset(&self, date: NaiveDate) -> u32 {
        match self {
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            WeekStart::Monday => date.weekday().num_days_from_monday(),
        }
    }
}

/// Inclusive first and last day of the week containing `date`
pub fn week_bounds(date: NaiveDate, start: WeekStart) -> (NaiveDate, NaiveDate) {
    let first = date - Duration::days(start.offset(date) as i64);
    (first, first + Duration::days(6))
}

/// The full set of criteria applied by the list and calendar views
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub search: String,
    pub category: CategoryFilter,
    pub range: DateRange,
}

impl EventFilter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty()
            || self.category != CategoryFilter::All
            || self.range != DateRange::All
    }

    pub fn matches(&self, event: &Event, today: NaiveDate) -> bool {
        matches_search(event, &self.search)
            && self.category.matches(event)
            && matches_range(event, self.range, today)
    }

    /// Apply to a list, keeping input order
    pub fn apply<'a>(&self, events: &'a [Event], today: NaiveDate) -> Vec<&'a Event> {
        events.iter().filter(|e| self.matches(e, today)).collect()
    }
}

/// Convenience wrapper over [`EventFilter::apply`] returning owned events
pub fn filter_events(
    events: &[Event],
    search: &str,
    category: CategoryFilter,
    range: DateRange,
    today: NaiveDate,
) -> Vec<Event> {
    let filter = EventFilter {
        search: search.to_string(),
        category,
        range,
    };
    filter.apply(events, today).into_iter().cloned().collect()
}

/// Case-insensitive substring match on title, notes or category name.
/// A blank term matches everything.
pub fn matches_search(event: &Event, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    event.title.to_lowercase().contains(&term)
        || event.notes.to_lowercase().contains(&term)
        || event.category.slug().contains(&term)
}

/// Events with an unparseable date never fall inside a bounded window
pub fn matches_range(event: &Event, range: DateRange, today: NaiveDate) -> bool {
    if range == DateRange::All {
        return true;
    }
    event
        .calendar_date()
        .map(|date| range.contains(date, today))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn make_event(id: &str, date: &str, title: &str, category: Category, notes: &str) -> Event {
        Event::new(
            id.to_string(),
            date.to_string(),
            title.to_string(),
            category,
            notes.to_string(),
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_events() -> Vec<Event> {
        vec![
            make_event("1", "2025-01-15", "Reunión de Docentes", Category::Docentes, "Reunión mensual"),
            make_event("2", "2025-01-20", "Presentación Final", Category::Presentaciones, "Proyectos"),
            make_event("3", "2025-01-25", "Taller para Alumnos", Category::Alumnos, "Habilidades digitales"),
            make_event("4", "2024-12-30", "Cierre de año", Category::Otros, ""),
            make_event("5", "sin fecha", "Pendiente", Category::Docentes, "fecha por definir"),
        ]
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    // ========== identity and composition tests ==========

    #[test]
    fn test_filter_identity_with_empty_criteria() {
        let events = sample_events();
        let today = ymd(2025, 1, 15);

        assert_eq!(
            filter_events(&events, "", CategoryFilter::All, DateRange::All, today),
            events
        );
        assert_eq!(
            filter_events(&events, "   \t", CategoryFilter::All, DateRange::All, today),
            events
        );
    }

    #[test]
    fn test_filter_preserves_input_order() {
        let mut events = sample_events();
        events.reverse();
        let result = filter_events(&events, "e", CategoryFilter::All, DateRange::All, ymd(2025, 1, 15));
        let positions: Vec<usize> = result
            .iter()
            .map(|r| events.iter().position(|e| e.id == r.id).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_filter_predicates_compose_as_and() {
        let events = sample_events();
        let result = filter_events(
            &events,
            "reunión",
            CategoryFilter::Only(Category::Docentes),
            DateRange::Month,
            ymd(2025, 1, 3),
        );
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_filter_result_independent_of_order() {
        let events = sample_events();
        let today = ymd(2025, 1, 20);
        let all_at_once = filter_events(
            &events,
            "a",
            CategoryFilter::Only(Category::Presentaciones),
            DateRange::Week,
            today,
        );

        let by_range = filter_events(&events, "", CategoryFilter::All, DateRange::Week, today);
        let by_category = filter_events(
            &by_range,
            "",
            CategoryFilter::Only(Category::Presentaciones),
            DateRange::All,
            today,
        );
        let stepwise = filter_events(&by_category, "a", CategoryFilter::All, DateRange::All, today);

        assert_eq!(all_at_once, stepwise);
    }

    // ========== search tests ==========

    #[test]
    fn test_search_matches_title_case_insensitive() {
        let events = sample_events();
        let result = filter_events(&events, "TALLER", CategoryFilter::All, DateRange::All, ymd(2025, 1, 1));
        assert_eq!(ids(&result), vec!["3"]);
    }

    #[test]
    fn test_search_matches_notes() {
        let events = sample_events();
        let result = filter_events(&events, "digitales", CategoryFilter::All, DateRange::All, ymd(2025, 1, 1));
        assert_eq!(ids(&result), vec!["3"]);
    }

    #[test]
    fn test_search_matches_category_only() {
        let event = make_event("1", "2025-01-15", "Claustro", Category::Docentes, "");
        assert!(matches_search(&event, "docentes"));
        assert!(matches_search(&event, "  DOCENTES "));
        assert!(!matches_search(&event, "alumnos"));
    }

    #[test]
    fn test_search_trims_term() {
        let events = sample_events();
        let result = filter_events(&events, "  final  ", CategoryFilter::All, DateRange::All, ymd(2025, 1, 1));
        assert_eq!(ids(&result), vec!["2"]);
    }

    // ========== category tests ==========

    #[test]
    fn test_category_filter_keeps_only_category() {
        let events = sample_events();
        for category in Category::iter() {
            let result = filter_events(
                &events,
                "",
                CategoryFilter::Only(category),
                DateRange::All,
                ymd(2025, 1, 1),
            );
            assert!(result.len() <= events.len());
            assert!(result.iter().all(|e| e.category == category));
        }
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!("all".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "Alumnos".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(Category::Alumnos))
        );
        assert_eq!(
            "alumnos".parse::<CategoryFilter>(),
            Err(FilterParseError::Category("alumnos".to_string()))
        );
    }

    #[test]
    fn test_unparseable_date_still_matches_search_and_category() {
        let events = sample_events();
        let result = filter_events(
            &events,
            "pendiente",
            CategoryFilter::Only(Category::Docentes),
            DateRange::All,
            ymd(2025, 1, 1),
        );
        assert_eq!(ids(&result), vec!["5"]);
    }

    // ========== date range tests ==========

    #[test]
    fn test_range_today_keeps_today_excludes_yesterday() {
        let today = ymd(2025, 1, 15);
        let events = vec![
            make_event("a", "2025-01-15", "Hoy", Category::Otros, ""),
            make_event("b", "2025-01-14", "Ayer", Category::Otros, ""),
        ];
        let result = filter_events(&events, "", CategoryFilter::All, DateRange::Today, today);
        assert_eq!(ids(&result), vec!["a"]);
    }

    #[test]
    fn test_range_today_with_time_component() {
        let today = ymd(2025, 1, 15);
        let event = make_event("a", "2025-01-15T08:30:00.000Z", "Hoy", Category::Otros, "");
        assert!(matches_range(&event, DateRange::Today, today));
    }

    #[test]
    fn test_range_week_is_sunday_first() {
        // Wednesday 2025-01-15: week runs Sunday 12th to Saturday 18th
        let today = ymd(2025, 1, 15);
        assert!(DateRange::Week.contains(ymd(2025, 1, 12), today));
        assert!(DateRange::Week.contains(ymd(2025, 1, 18), today));
        assert!(!DateRange::Week.contains(ymd(2025, 1, 11), today));
        assert!(!DateRange::Week.contains(ymd(2025, 1, 19), today));
    }

    #[test]
    fn test_range_week_on_sunday() {
        let today = ymd(2025, 1, 19);
        assert!(DateRange::Week.contains(ymd(2025, 1, 19), today));
        assert!(DateRange::Week.contains(ymd(2025, 1, 25), today));
        assert!(!DateRange::Week.contains(ymd(2025, 1, 18), today));
    }

    #[test]
    fn test_range_month() {
        let today = ymd(2025, 1, 31);
        assert!(DateRange::Month.contains(ymd(2025, 1, 1), today));
        assert!(!DateRange::Month.contains(ymd(2024, 1, 15), today));
        assert!(!DateRange::Month.contains(ymd(2025, 2, 1), today));
    }

    #[test]
    fn test_range_last30_inclusive_bounds() {
        let today = ymd(2025, 1, 15);
        assert!(DateRange::Last30.contains(ymd(2024, 12, 16), today));
        assert!(DateRange::Last30.contains(today, today));
        assert!(!DateRange::Last30.contains(ymd(2024, 12, 15), today));
        assert!(!DateRange::Last30.contains(ymd(2025, 1, 16), today));
    }

    #[test]
    fn test_range_excludes_unparseable_dates() {
        let event = make_event("x", "mañana", "X", Category::Otros, "");
        let today = ymd(2025, 1, 15);
        for range in [DateRange::Today, DateRange::Week, DateRange::Month, DateRange::Last30] {
            assert!(!matches_range(&event, range, today));
        }
        assert!(matches_range(&event, DateRange::All, today));
    }

    #[test]
    fn test_date_range_parse_round_trip_names() {
        for range in DateRange::iter() {
            assert_eq!(DateRange::parse(range.as_str()), Ok(range));
        }
        assert_eq!(DateRange::parse("last30"), Ok(DateRange::Last30));
        assert!(DateRange::parse("year").is_err());
    }

    // ========== week helpers ==========

    #[test]
    fn test_week_bounds_monday_first() {
        let (start, end) = week_bounds(ymd(2025, 1, 19), WeekStart::Monday);
        assert_eq!(start, ymd(2025, 1, 13));
        assert_eq!(end, ymd(2025, 1, 19));
    }

    #[test]
    fn test_event_filter_is_active() {
        assert!(!EventFilter::default().is_active());
        assert!(EventFilter {
            search: " x ".to_string(),
            ..EventFilter::default()
        }
        .is_active());
        assert!(EventFilter {
            range: DateRange::Today,
            ..EventFilter::default()
        }
        .is_active());
    }
}
