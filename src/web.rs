use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::completion::{CompletionOutcome, PriorProgress};
use crate::due::Tracker;
use crate::entry::MemorizationEntry;
use crate::error::Error;
use crate::phase::MemorizationPhase;
use crate::repair::Repair;
use crate::stats::Statistics;
use crate::store::{CsvLibrary, EntryStore};

// -- App state --

// One lock over the whole record set keeps mutations of an entry serial.
struct ServerState {
    tracker: Tracker<SystemClock>,
    entries: Vec<MemorizationEntry>,
    store: CsvLibrary,
}

type SharedState = Arc<Mutex<ServerState>>;

// -- Responses --

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.1 }));
        (self.0, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Persistence { .. } | Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidBootstrap { .. } | Error::FlashcardProgress => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::UnknownEntry(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if err.is_persistence() {
            format!("{err}; will retry")
        } else {
            err.to_string()
        };
        ApiError(status, message)
    }
}

#[derive(Serialize)]
struct DueItem {
    id: Uuid,
    reference: String,
    phase: MemorizationPhase,
    units_completed: u32,
    target: Option<u32>,
}

impl DueItem {
    fn from_entry(entry: &MemorizationEntry) -> Self {
        DueItem {
            id: entry.id,
            reference: entry.reference.clone(),
            phase: entry.current_phase,
            units_completed: entry.units_in(entry.current_phase),
            target: entry.current_phase.target(),
        }
    }
}

#[derive(Serialize)]
struct PhaseQueueResponse {
    phase1: Vec<DueItem>,
    phase2: Vec<DueItem>,
    phase3: Vec<DueItem>,
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: Statistics,
    completion_rate: f64,
    streak: u32,
}

#[derive(Serialize)]
struct RepairResponse {
    examined: usize,
    repaired: Vec<RepairedEntry>,
    failed: Vec<String>,
}

#[derive(Serialize)]
struct RepairedEntry {
    id: Uuid,
    repairs: Vec<Repair>,
}

#[derive(Deserialize)]
struct NewEntry {
    reference: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    phase: Option<u8>,
    #[serde(default)]
    completed: u32,
    #[serde(default)]
    completed_today: bool,
    #[serde(default)]
    flashcard: bool,
}

fn due_items(entries: Vec<&MemorizationEntry>) -> Vec<DueItem> {
    entries.into_iter().map(DueItem::from_entry).collect()
}

fn find_entry(entries: &[MemorizationEntry], id: &str) -> Result<usize, ApiError> {
    let parsed = Uuid::parse_str(id).map_err(|_| Error::UnknownEntry(id.to_string()))?;
    entries
        .iter()
        .position(|e| e.id == parsed)
        .ok_or_else(|| Error::UnknownEntry(id.to_string()).into())
}

// -- Route handlers --

async fn due_today(State(state): State<SharedState>) -> Json<Vec<DueItem>> {
    let st = state.lock().await;
    let today = st.tracker.today();
    Json(due_items(
        st.tracker.verses_needing_completion(today, &st.entries),
    ))
}

async fn phases(State(state): State<SharedState>) -> Json<PhaseQueueResponse> {
    let st = state.lock().await;
    let queues = st.tracker.verses_by_phase(&st.entries);
    Json(PhaseQueueResponse {
        phase1: due_items(queues.phase1),
        phase2: due_items(queues.phase2),
        phase3: due_items(queues.phase3),
    })
}

async fn stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    let st = state.lock().await;
    let stats = st.tracker.statistics(&st.entries);
    Json(StatsResponse {
        stats,
        completion_rate: stats.completion_rate(),
        streak: st.tracker.completion_streak(&st.entries),
    })
}

async fn entry_detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MemorizationEntry>, ApiError> {
    let st = state.lock().await;
    let index = find_entry(&st.entries, &id)?;
    Ok(Json(st.entries[index].clone()))
}

async fn complete(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CompletionOutcome>, ApiError> {
    let mut guard = state.lock().await;
    let st = &mut *guard;
    let index = find_entry(&st.entries, &id)?;
    let outcome = st
        .tracker
        .complete_now(&mut st.entries[index], &mut st.store)?;
    Ok(Json(outcome))
}

async fn create_entry(
    State(state): State<SharedState>,
    Json(form): Json<NewEntry>,
) -> Result<(StatusCode, Json<MemorizationEntry>), ApiError> {
    let mut guard = state.lock().await;
    let st = &mut *guard;
    let prior = match form.phase {
        Some(n) => Some(PriorProgress {
            phase: MemorizationPhase::from_number(n).ok_or_else(|| {
                ApiError(StatusCode::UNPROCESSABLE_ENTITY, format!("unknown phase: {n}"))
            })?,
            completed: form.completed,
            completed_today: form.completed_today,
        }),
        None => None,
    };
    let entry = st
        .tracker
        .new_entry(form.reference, form.text, form.flashcard, prior)?;

    st.entries.push(entry.clone());
    st.store.save(&entry).map_err(|source| Error::Persistence {
        id: entry.id,
        source,
    })?;
    info!("added {} ({})", entry.reference, entry.id);
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn repair(State(state): State<SharedState>) -> Json<RepairResponse> {
    let mut guard = state.lock().await;
    let st = &mut *guard;
    let report = st.tracker.validate_and_repair(&mut st.entries, &mut st.store);
    Json(RepairResponse {
        examined: report.examined,
        repaired: report
            .repaired
            .into_iter()
            .map(|(id, repairs)| RepairedEntry { id, repairs })
            .collect(),
        failed: report.failed.iter().map(|e| e.to_string()).collect(),
    })
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/due", get(due_today))
        .route("/api/phases", get(phases))
        .route("/api/stats", get(stats))
        .route("/api/repair", post(repair))
        .route("/api/entries", post(create_entry))
        .route("/api/entries/{id}", get(entry_detail))
        .route("/api/entries/{id}/complete", post(complete))
        .with_state(state)
}

// -- Public entry point --

pub async fn serve(
    files: Vec<PathBuf>,
    port: u16,
    tracker: Tracker<SystemClock>,
) -> Result<(), Error> {
    let mut store = CsvLibrary::open(&files);
    if store.file_count() == 0 {
        warn!("no readable entry files; new entries cannot be saved");
    }
    let entries = store.load_all()?;
    info!(
        "Loaded {} entries from {} files.",
        entries.len(),
        store.file_count()
    );
    for file in store.files() {
        info!("  {}", file.display());
    }

    let state = Arc::new(Mutex::new(ServerState {
        tracker,
        entries,
        store,
    }));

    let addr = format!("0.0.0.0:{port}");
    info!("Serving at http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
