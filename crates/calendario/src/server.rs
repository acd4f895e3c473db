use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::{Applied, CacheError, EventCache, StoreMode};
use crate::filter::{filter_events, CategoryFilter, DateRange, EventFilter, FilterParseError};
use crate::grid::MonthCursor;
use crate::html::{self, link, Page};
use crate::search::{related_events, search};
use crate::store::EXPORT_FILE_NAME;
use crate::types::{parse_calendar_date, Category, Event, EventDraft};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Application state shared across requests
pub struct AppState {
    pub cache: RwLock<EventCache>,
}

impl AppState {
    pub fn new(cache: EventCache) -> Arc<Self> {
        Arc::new(Self {
            cache: RwLock::new(cache),
        })
    }
}

/// Start the web server on an already loaded cache
pub async fn serve(port: u16, cache: EventCache) -> anyhow::Result<()> {
    let app = router(AppState::new(cache));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %format!("http://{}", addr), "Server running");

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(calendar_handler))
        .route("/list", get(list_handler))
        .route("/search", get(search_handler))
        .route("/events", post(save_handler))
        .route("/events/new", get(new_form_handler))
        .route("/events/{id}/edit", get(edit_form_handler))
        .route("/events/{id}/delete", post(delete_handler))
        .route("/export", get(export_handler))
        .route("/reload", post(reload_handler))
        .route("/api/events", get(api_events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Filter and navigation parameters shared by the views
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    q: Option<String>,
    category: Option<String>,
    range: Option<String>,
    year: Option<i32>,
    month: Option<u32>,
    notice: Option<String>,
}

impl ViewQuery {
    fn filter(&self) -> Result<EventFilter, FilterParseError> {
        let category = match self.category.as_deref() {
            None | Some("") => CategoryFilter::All,
            Some(value) => value.parse()?,
        };
        let range = match self.range.as_deref() {
            None | Some("") => DateRange::All,
            Some(value) => DateRange::parse(value)?,
        };
        Ok(EventFilter {
            search: self.q.clone().unwrap_or_default(),
            category,
            range,
        })
    }
}

fn apply_filter(cache: &EventCache, filter: &EventFilter, today: NaiveDate) -> Vec<Event> {
    filter_events(
        cache.events(),
        &filter.search,
        filter.category,
        filter.range,
        today,
    )
}

fn bad_request(err: FilterParseError) -> Response {
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}

fn redirect_with_notice(path: &str, notice: &str) -> Response {
    Redirect::to(&link(path, &[("notice", notice.to_string())])).into_response()
}

/// Calendar month view
async fn calendar_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(e) => return bad_request(e),
    };

    let cache = state.cache.read().await;
    let today = cache.clock().today();
    let cursor = match (query.year, query.month) {
        (Some(year), Some(month)) => match MonthCursor::checked(year, month) {
            Some(cursor) => cursor,
            None => {
                return (StatusCode::BAD_REQUEST, format!("invalid month: {}-{}", year, month))
                    .into_response()
            }
        },
        _ => MonthCursor::from_date(today),
    };
    let filtered = apply_filter(&cache, &filter, today);

    let page = Page {
        mode: cache.mode(),
        notice: query.notice.as_deref(),
        today,
    };
    let markup = html::render_calendar(&page, cursor, &filter, &filtered, cache.events().len());
    Html(markup.into_string()).into_response()
}

/// List/history view
async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(e) => return bad_request(e),
    };

    let cache = state.cache.read().await;
    let today = cache.clock().today();
    let filtered = apply_filter(&cache, &filter, today);

    let page = Page {
        mode: cache.mode(),
        notice: query.notice.as_deref(),
        today,
    };
    let markup = html::render_list(&page, &filter, &filtered, cache.events().len());
    Html(markup.into_string()).into_response()
}

/// Filtered events as JSON
async fn api_events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(e) => return bad_request(e),
    };

    let cache = state.cache.read().await;
    let today = cache.clock().today();
    let filtered = apply_filter(&cache, &filter, today);
    Json(filtered).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    selected: Option<String>,
}

/// Search overlay with related events for the selected result
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Html<String> {
    let cache = state.cache.read().await;
    let term = query.q.unwrap_or_default();
    let results = search(cache.events(), &term);

    let selected = query.selected.as_deref().and_then(|id| cache.get(id));
    let related = selected
        .map(|event| related_events(cache.events(), event))
        .unwrap_or_default();

    let page = Page {
        mode: cache.mode(),
        notice: None,
        today: cache.clock().today(),
    };
    let markup = html::render_search(
        &page,
        &term,
        &results,
        selected.map(|event| (event, related.as_slice())),
    );
    Html(markup.into_string())
}

#[derive(Debug, Default, Deserialize)]
struct NewFormQuery {
    date: Option<String>,
}

async fn new_form_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewFormQuery>,
) -> Html<String> {
    let cache = state.cache.read().await;
    let today = cache.clock().today();
    let date = query
        .date
        .as_deref()
        .and_then(parse_calendar_date)
        .unwrap_or(today);

    let page = Page {
        mode: cache.mode(),
        notice: None,
        today,
    };
    let markup = html::render_form(&page, &EventDraft::for_date(date), None, None);
    Html(markup.into_string())
}

async fn edit_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let cache = state.cache.read().await;
    let Some(event) = cache.get(&id) else {
        return (StatusCode::NOT_FOUND, "Evento no encontrado").into_response();
    };

    let page = Page {
        mode: cache.mode(),
        notice: None,
        today: cache.clock().today(),
    };
    let markup = html::render_form(&page, &EventDraft::from_event(event), Some(&id), None);
    Html(markup.into_string()).into_response()
}

/// Submitted event form; a non-empty `id` means edit
#[derive(Debug, Deserialize)]
struct EventForm {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: Category,
    #[serde(default)]
    notes: String,
}

impl EventForm {
    fn editing(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    fn draft(&self) -> EventDraft {
        EventDraft {
            date: self.date.clone(),
            title: self.title.clone(),
            category: self.category,
            notes: self.notes.clone(),
        }
    }
}

async fn save_handler(State(state): State<Arc<AppState>>, Form(form): Form<EventForm>) -> Response {
    let draft = form.draft();
    let editing = form.editing();

    let mut cache = state.cache.write().await;
    let result = cache.save(&draft, editing).await;

    match result {
        Ok(applied) => {
            let notice = match (applied, editing.is_some()) {
                (Applied::Remote, false) => "Evento guardado en el almacén",
                (Applied::Remote, true) => "Evento actualizado en el almacén",
                (Applied::Local, false) => "Evento creado en modo offline",
                (Applied::Local, true) => "Evento actualizado en modo offline",
            };
            // Show the month the event landed in
            let mut pairs = vec![("notice", notice.to_string())];
            if let Some(date) = parse_calendar_date(&draft.date) {
                pairs.push(("year", date.year().to_string()));
                pairs.push(("month", date.month0().to_string()));
            }
            Redirect::to(&link("/", &pairs)).into_response()
        }
        Err(CacheError::Invalid(e)) => {
            let page = Page {
                mode: cache.mode(),
                notice: None,
                today: cache.clock().today(),
            };
            let markup = html::render_form(&page, &draft, editing, Some(&e.to_string()));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(markup.into_string())).into_response()
        }
        Err(CacheError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "Evento no encontrado").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to save event");
            redirect_with_notice("/", "Error: no se pudo guardar el evento")
        }
    }
}

async fn delete_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let mut cache = state.cache.write().await;
    match cache.delete(&id).await {
        Ok(Applied::Remote) => redirect_with_notice("/list", "Evento eliminado correctamente"),
        Ok(Applied::Local) => redirect_with_notice("/list", "Evento eliminado localmente"),
        Err(CacheError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "Evento no encontrado").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to delete event");
            redirect_with_notice("/list", "Error: no se pudo eliminar el evento")
        }
    }
}

/// Proxy the store's spreadsheet export as a download
async fn export_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut cache = state.cache.write().await;
    match cache.export().await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(CacheError::ExportUnavailable) => redirect_with_notice(
            "/",
            "Función no disponible: la exportación requiere conexión con el almacén",
        ),
        Err(e) => {
            warn!(error = %e, "Export failed");
            redirect_with_notice("/", "Error: no se pudo exportar el archivo")
        }
    }
}

/// Manual reload, the only way back from offline mode
async fn reload_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut cache = state.cache.write().await;
    match cache.load().await {
        StoreMode::Connected => redirect_with_notice("/", "Conectado: datos cargados desde el almacén"),
        StoreMode::LocalOnly => {
            redirect_with_notice("/", "Modo offline: no se pudo conectar, usando datos locales")
        }
    }
}
