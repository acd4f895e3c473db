use chrono::{Datelike, NaiveDate};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::cmp::Reverse;
use strum::IntoEnumIterator;

use crate::cache::StoreMode;
use crate::filter::{DateRange, EventFilter};
use crate::grid::{events_for_date, DayCell, MonthCursor, DAY_NAMES, MINI_DAY_NAMES};
use crate::search::SearchResult;
use crate::types::{Category, Event, EventDraft};

/// Longer titles are cut to this many characters inside calendar cells
const CELL_TITLE_CHARS: usize = 20;

const WEEKDAYS_SHORT: [&str; 7] = ["lun", "mar", "mié", "jue", "vie", "sáb", "dom"];
const MONTHS_SHORT: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// State shared by every page
pub struct Page<'a> {
    pub mode: StoreMode,
    pub notice: Option<&'a str>,
    pub today: NaiveDate,
}

/// Build `path?k=v&...`, skipping empty values
pub fn link(path: &str, pairs: &[(&str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if !value.is_empty() {
            serializer.append_pair(key, value);
            any = true;
        }
    }
    if any {
        format!("{}?{}", path, serializer.finish())
    } else {
        path.to_string()
    }
}

/// `/events/{id}/{action}` with the id percent-encoded as one path segment
pub fn event_path(id: &str, action: &str) -> String {
    // form encoding writes spaces as '+', which a path would keep literally
    let segment: String = url::form_urlencoded::byte_serialize(id.as_bytes())
        .map(|part| if part == "+" { "%20" } else { part })
        .collect();
    format!("/events/{}/{}", segment, action)
}

/// Title as shown in a calendar cell
fn cell_title(title: &str) -> String {
    if title.chars().count() > CELL_TITLE_CHARS {
        let head: String = title.chars().take(CELL_TITLE_CHARS).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Query pairs for the non-default parts of a filter
pub fn filter_pairs(filter: &EventFilter) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if !filter.search.trim().is_empty() {
        pairs.push(("q", filter.search.trim().to_string()));
    }
    if filter.category.as_str() != "all" {
        pairs.push(("category", filter.category.as_str().to_string()));
    }
    if filter.range != DateRange::All {
        pairs.push(("range", filter.range.as_str().to_string()));
    }
    pairs
}

/// e.g. "mié, 15 ene 2025"; unparseable dates are shown as stored
pub fn format_date_es(raw: &str) -> String {
    match crate::types::parse_calendar_date(raw) {
        Some(date) => format!(
            "{}, {} {} {}",
            WEEKDAYS_SHORT[date.weekday().num_days_from_monday() as usize],
            date.day(),
            MONTHS_SHORT[date.month0() as usize],
            date.year()
        ),
        None => raw.to_string(),
    }
}

fn layout(page: &Page, title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="es" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " · Calendario de Eventos" }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.container {
                    header.header {
                        div {
                            h1 { "Calendario de Eventos" }
                            p.subtitle { "Gestiona tus eventos académicos" }
                        }
                        nav.actions {
                            a.button href="/" { "Calendario" }
                            a.button href="/list" { "Lista" }
                            a.button href="/search" { "Buscar" }
                            a.button.primary href="/events/new" { "Nuevo Evento" }
                        }
                    }
                    div.status {
                        @match page.mode {
                            StoreMode::Connected => span.badge.online { "Conectado" },
                            StoreMode::LocalOnly => span.badge.offline { "Modo Offline" },
                        }
                        form.inline method="post" action="/reload" {
                            button.link type="submit" { "Recargar" }
                        }
                    }
                    @if let Some(notice) = page.notice {
                        div.notice { (notice) }
                    }
                    (content)
                }
            }
        }
    }
}

fn render_filters(action: &str, filter: &EventFilter, cursor: Option<MonthCursor>, shown: usize, total: usize) -> Markup {
    html! {
        form.filters method="get" action=(action) {
            @if let Some(cursor) = cursor {
                input type="hidden" name="year" value=(cursor.year());
                input type="hidden" name="month" value=(cursor.month0());
            }
            input type="search" name="q" value=(filter.search)
                placeholder="Buscar por título, notas o categoría...";
            select name="category" {
                option value="all" selected[filter.category.as_str() == "all"] { "Todas las categorías" }
                @for category in Category::iter() {
                    option value=(category.as_str()) selected[filter.category.as_str() == category.as_str()] {
                        (category.as_str())
                    }
                }
            }
            select name="range" {
                @for range in DateRange::iter() {
                    option value=(range.as_str()) selected[filter.range == range] { (range.label()) }
                }
            }
            button type="submit" { "Filtrar" }
            @if filter.is_active() {
                a.button href=(action) { "Limpiar" }
            }
            a.button href="/export" { "Exportar Excel" }
        }
        @if filter.is_active() {
            div.count { "Mostrando " (shown) " de " (total) " eventos" }
        }
    }
}

fn category_badge(category: Category) -> Markup {
    html! {
        span class={"badge cat-" (category.slug())} { (category.as_str()) }
    }
}

/// Month grid with the (already filtered) events bucketed by day
pub fn render_calendar(
    page: &Page,
    cursor: MonthCursor,
    filter: &EventFilter,
    events: &[Event],
    total: usize,
) -> Markup {
    let pairs = filter_pairs(filter);
    let nav_link = |target: MonthCursor| {
        let mut with_month = pairs.clone();
        with_month.push(("year", target.year().to_string()));
        with_month.push(("month", target.month0().to_string()));
        link("/", &with_month)
    };

    let content = html! {
        (render_filters("/", filter, Some(cursor), events.len(), total))
        div.calendar {
            div.calendar-header {
                (render_mini_month(cursor.previous(), &nav_link(cursor.previous())))
                div.month-nav {
                    a.button href=(nav_link(cursor.previous())) { "‹" }
                    h2 { (cursor.title()) }
                    a.button href=(nav_link(cursor.next())) { "›" }
                }
                (render_mini_month(cursor.next(), &nav_link(cursor.next())))
            }
            div.grid {
                @for name in DAY_NAMES {
                    div.day-name { (name) }
                }
                @for cell in cursor.grid() {
                    (render_cell(page, cell, events))
                }
            }
        }
    };
    layout(page, &cursor.title(), content)
}

/// Small day-number grid for a neighbouring month
fn render_mini_month(cursor: MonthCursor, href: &str) -> Markup {
    html! {
        a.mini-month href=(href) {
            h3 { (cursor.title()) }
            div.mini-grid {
                @for name in MINI_DAY_NAMES {
                    div.mini-day-name { (name) }
                }
                @for cell in cursor.grid() {
                    @match cell.date() {
                        Some(date) => div.mini-day { (date.day()) },
                        None => div.mini-day.empty {},
                    }
                }
            }
        }
    }
}

fn render_cell(page: &Page, cell: DayCell, events: &[Event]) -> Markup {
    let Some(date) = cell.date() else {
        return html! { div.cell.empty {} };
    };
    let day_events = events_for_date(events, date);
    let new_link = link("/events/new", &[("date", date.format("%Y-%m-%d").to_string())]);

    html! {
        div.cell.today[date == page.today] {
            a.day-number href=(new_link) { (date.day()) }
            @for event in day_events {
                a href=(event_path(&event.id, "edit")) class={"chip cat-" (event.category.slug())} title=(event.notes) {
                    (cell_title(&event.title))
                }
            }
        }
    }
}

/// Newest first; events whose date cannot be read go last
fn sorted_by_date_desc<'a>(events: &'a [Event]) -> Vec<&'a Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| Reverse(e.calendar_date()));
    sorted
}

/// History table with edit and delete actions
pub fn render_list(page: &Page, filter: &EventFilter, events: &[Event], total: usize) -> Markup {
    let content = html! {
        (render_filters("/list", filter, None, events.len(), total))
        @if events.is_empty() {
            div.empty-state { p { "No hay eventos para mostrar" } }
        } @else {
            table.history {
                thead {
                    tr { th { "Fecha" } th { "Título" } th { "Categoría" } th { "Notas" } th {} }
                }
                tbody {
                    @for event in sorted_by_date_desc(events) {
                        tr {
                            td.nowrap { (format_date_es(&event.date)) }
                            td { (event.title) }
                            td { (category_badge(event.category)) }
                            td.notes { (event.notes) }
                            td.nowrap {
                                a.button href=(event_path(&event.id, "edit")) { "Editar" }
                                form.inline method="post" action=(event_path(&event.id, "delete")) {
                                    button.danger type="submit" { "Eliminar" }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    layout(page, "Historial", content)
}

/// Create/edit form. `editing` carries the id of the event being replaced.
pub fn render_form(page: &Page, draft: &EventDraft, editing: Option<&str>, error: Option<&str>) -> Markup {
    let heading = if editing.is_some() { "Editar Evento" } else { "Nuevo Evento" };
    let content = html! {
        div.card {
            h2 { (heading) }
            @if let Some(error) = error {
                div.error { (error) }
            }
            form.event-form method="post" action="/events" {
                @if let Some(id) = editing {
                    input type="hidden" name="id" value=(id);
                }
                label for="date" { "Fecha" }
                input #date type="date" name="date" value=(draft.date) required;
                label for="title" { "Título" }
                input #title type="text" name="title" value=(draft.title) required
                    placeholder="Nombre del evento";
                label for="category" { "Categoría" }
                select #category name="category" {
                    @for category in Category::iter() {
                        option value=(category.as_str()) selected[draft.category == category] { (category.as_str()) }
                    }
                }
                label for="notes" { "Notas" }
                textarea #notes name="notes" rows="4" { (draft.notes) }
                div.form-actions {
                    button.primary type="submit" {
                        @if editing.is_some() { "Actualizar" } @else { "Guardar" }
                    }
                    a.button href="/" { "Cancelar" }
                }
            }
        }
    };
    layout(page, heading, content)
}

/// Search overlay: tagged results, and details plus related events for the selection
pub fn render_search(
    page: &Page,
    term: &str,
    results: &[SearchResult],
    selected: Option<(&Event, &[&Event])>,
) -> Markup {
    let term = term.trim();
    let select_link = |event: &Event| {
        link(
            "/search",
            &[("q", term.to_string()), ("selected", event.id.clone())],
        )
    };

    let content = html! {
        div.search {
            form.filters method="get" action="/search" {
                input type="search" name="q" value=(term) autofocus
                    placeholder="Buscar eventos por título, notas o categoría...";
                button type="submit" { "Buscar" }
            }
            div.search-columns {
                div.results {
                    @if term.is_empty() {
                        p.hint { "Escribe para buscar eventos" }
                    } @else if results.is_empty() {
                        p.hint { "No se encontraron eventos para \"" (term) "\"" }
                    } @else {
                        p.count { (results.len()) " resultado(s)" }
                        @for result in results {
                            a.result href=(select_link(result.event)) {
                                div.result-title { (result.event.title) }
                                div.result-meta {
                                    (format_date_es(&result.event.date)) " · "
                                    (category_badge(result.event.category)) " · "
                                    span.match { (result.match_type.label()) ": " (result.match_text) }
                                }
                            }
                        }
                    }
                }
                @if let Some((event, related)) = selected {
                    div.details {
                        h3 { (event.title) }
                        p { (format_date_es(&event.date)) " · " (category_badge(event.category)) }
                        @if !event.notes.is_empty() {
                            p.notes { (event.notes) }
                        }
                        a.button href=(event_path(&event.id, "edit")) { "Editar" }
                        h4 { "Eventos relacionados (" (related.len()) ")" }
                        @if related.is_empty() {
                            p.hint { "No hay eventos relacionados" }
                        }
                        @for other in related {
                            a.result href=(select_link(other)) {
                                div.result-title { (other.title) }
                                div.result-meta { (format_date_es(&other.date)) " · " (category_badge(other.category)) }
                            }
                        }
                    }
                }
            }
        }
    };
    layout(page, "Buscar", content)
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
    background: #f7f7f8;
    color: #1f2933;
    line-height: 1.4;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    padding: 24px 16px 48px;
}

.header {
    display: flex;
    flex-wrap: wrap;
    justify-content: space-between;
    align-items: center;
    gap: 16px;
    margin-bottom: 16px;
}

h1 { font-size: 1.9em; font-weight: 700; }
.subtitle { color: #6b7280; }

.actions, .form-actions { display: flex; flex-wrap: wrap; gap: 8px; }

.button, button {
    display: inline-block;
    padding: 6px 14px;
    border: 1px solid #d1d5db;
    border-radius: 6px;
    background: #fff;
    color: inherit;
    font: inherit;
    text-decoration: none;
    cursor: pointer;
}

.primary { background: #0f766e; border-color: #0f766e; color: #fff; }
.danger { border-color: #dc2626; color: #dc2626; }
button.link { border: none; background: none; color: #0f766e; text-decoration: underline; }

form.inline { display: inline; }

.status { display: flex; gap: 12px; align-items: center; margin-bottom: 12px; }
.notice { background: #ecfdf5; border: 1px solid #a7f3d0; padding: 10px 14px; border-radius: 6px; margin-bottom: 16px; }
.error { background: #fef2f2; border: 1px solid #fecaca; color: #b91c1c; padding: 10px 14px; border-radius: 6px; margin-bottom: 12px; }

.filters {
    display: flex;
    flex-wrap: wrap;
    gap: 8px;
    background: #fff;
    border: 1px solid #e5e7eb;
    border-radius: 8px;
    padding: 12px;
    margin-bottom: 8px;
}
.filters input[type=search] { flex: 1; min-width: 220px; }
input, select, textarea { padding: 6px 10px; border: 1px solid #d1d5db; border-radius: 6px; font: inherit; }
.count, .hint { color: #6b7280; font-size: 0.9em; margin: 8px 0; }

.badge { display: inline-block; padding: 2px 8px; border-radius: 999px; font-size: 0.8em; border: 1px solid transparent; }
.online { background: #dcfce7; color: #166534; }
.offline { background: #fef3c7; color: #92400e; }
.cat-alumnos { background: #d1fae5; color: #065f46; border-color: #a7f3d0; }
.cat-docentes { background: #dbeafe; color: #1e40af; border-color: #bfdbfe; }
.cat-presentaciones { background: #ffedd5; color: #9a3412; border-color: #fed7aa; }
.cat-otros { background: #f3f4f6; color: #1f2937; border-color: #e5e7eb; }

.calendar { background: #fff; border: 1px solid #e5e7eb; border-radius: 8px; padding: 16px; margin-top: 16px; }
.calendar-header { display: flex; justify-content: space-between; align-items: flex-start; gap: 16px; margin-bottom: 12px; }
.month-nav { display: flex; align-items: center; gap: 12px; }
.mini-month { width: 180px; color: inherit; text-decoration: none; }
.mini-month h3 { font-size: 0.85em; font-weight: 500; text-align: center; color: #4b5563; margin-bottom: 4px; }
.mini-grid { display: grid; grid-template-columns: repeat(7, 1fr); gap: 1px; font-size: 0.7em; text-align: center; }
.mini-day-name { color: #6b7280; font-weight: 600; }
.mini-day { color: #374151; padding: 1px 0; }
.grid { display: grid; grid-template-columns: repeat(7, 1fr); gap: 4px; }
.day-name { text-align: center; font-weight: 600; font-size: 0.85em; color: #6b7280; padding: 4px 0; }
.cell { min-height: 96px; border: 1px solid #e5e7eb; border-radius: 6px; padding: 4px; display: flex; flex-direction: column; gap: 2px; }
.cell.empty { border: none; }
.cell.today { border-color: #0f766e; box-shadow: inset 0 0 0 1px #0f766e; }
.day-number { font-weight: 600; font-size: 0.85em; color: inherit; text-decoration: none; }
.chip { display: block; font-size: 0.75em; padding: 1px 6px; border-radius: 4px; border: 1px solid; text-decoration: none; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }

table.history { width: 100%; border-collapse: collapse; background: #fff; margin-top: 16px; }
.history th, .history td { text-align: left; padding: 8px; border-bottom: 1px solid #e5e7eb; vertical-align: top; }
.nowrap { white-space: nowrap; }
.notes { color: #4b5563; }

.card { background: #fff; border: 1px solid #e5e7eb; border-radius: 8px; padding: 20px; max-width: 520px; }
.event-form { display: grid; gap: 8px; margin-top: 12px; }

.search-columns { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; margin-top: 12px; }
.result { display: block; background: #fff; border: 1px solid #e5e7eb; border-radius: 6px; padding: 10px; margin-bottom: 8px; color: inherit; text-decoration: none; }
.result-title { font-weight: 600; }
.result-meta { font-size: 0.85em; color: #6b7280; margin-top: 4px; }
.details { background: #fff; border: 1px solid #e5e7eb; border-radius: 8px; padding: 16px; }
.details h4 { margin: 16px 0 8px; }

.empty-state { padding: 60px 20px; text-align: center; color: #6b7280; }

@media (max-width: 768px) {
    .search-columns { grid-template-columns: 1fr; }
    .mini-month { display: none; }
    .cell { min-height: 64px; }
}
"#;
