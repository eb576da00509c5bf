//! Thin HTTP shell (ambient supplement, §6): `axum` handlers for the
//! alternate-path endpoints. Every handler calls the exact same
//! `Registry`/`Matchmaker` methods the WebSocket path uses.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use chess::PieceKind;
use chess_wire::dto::{
    ApiErrorBody, ColorPreference as ColorPreferenceDto, CreateGameRequest, CreateGameResponse,
    DelayMode as DelayModeDto, GameSnapshotResponse, JoinGameResponse, LobbyEntryDto, LobbyResponse,
    MakeMoveRequest, MoveHistoryEntryDto, MoveHistoryResponse, PageQuery, TimeControlDto,
};

use crate::clock::{DelayMode, TimeControl};
use crate::identity::Identity;
use crate::matchmaker::ColorPreference;
use crate::persistence::MoveRow;

use super::converters::{snapshot_to_dto, ApiError};
use super::AppState;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

fn auth_error(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        code: "auth-failed",
        message: message.to_string(),
    }
}

fn invalid_arg(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid-arg",
        message: message.into(),
    }
}

fn rate_limited() -> ApiError {
    ApiError {
        status: StatusCode::TOO_MANY_REQUESTS,
        code: "rate-limited",
        message: "rate limit exceeded".to_string(),
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let credential = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| auth_error("missing Authorization header"))?;
    state.identity.authenticate(credential).map_err(|_| auth_error("invalid or expired token"))
}

fn time_control_from_dto(dto: &TimeControlDto) -> TimeControl {
    TimeControl {
        initial_ms: dto.initial_ms,
        increment_ms: dto.increment_ms,
        delay_ms: dto.delay_ms,
        delay_mode: match dto.delay_mode {
            DelayModeDto::None => DelayMode::None,
            DelayModeDto::FischerOnly => DelayMode::FischerOnly,
            DelayModeDto::Bronstein => DelayMode::Bronstein,
            DelayModeDto::Simple => DelayMode::Simple,
        },
    }
}

fn delay_mode_dto_from_str(s: &str) -> DelayModeDto {
    match s {
        "fischer" => DelayModeDto::FischerOnly,
        "bronstein" => DelayModeDto::Bronstein,
        "simple" => DelayModeDto::Simple,
        _ => DelayModeDto::None,
    }
}

pub async fn create_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let identity = authenticate(&state, &headers)?;
    if !state.create_limiter.try_acquire(&identity.user_id) {
        return Err(rate_limited());
    }

    let color_pref = match req.color_preference {
        ColorPreferenceDto::White => ColorPreference::Fixed(chess::PieceColor::White),
        ColorPreferenceDto::Black => ColorPreference::Fixed(chess::PieceColor::Black),
        ColorPreferenceDto::Random => ColorPreference::Random,
    };
    let time_control = time_control_from_dto(&req.time_control);

    let handle = state
        .matchmaker
        .create(identity.user_id, color_pref, time_control, "standard")
        .await?;
    state.lobby_cache.invalidate();

    Ok(Json(CreateGameResponse {
        game_id: handle.game_id().to_string(),
    }))
}

pub async fn join_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
) -> Result<Json<JoinGameResponse>, ApiError> {
    let identity = authenticate(&state, &headers)?;
    let handle = state.matchmaker.join(&game_id, identity.user_id.clone()).await?;
    state.lobby_cache.invalidate();

    let snapshot = handle.snapshot().await.map_err(ApiError::from)?;
    let seated_as = if snapshot.white_id.as_deref() == Some(identity.user_id.as_str()) {
        "white"
    } else {
        "black"
    };

    Ok(Json(JoinGameResponse {
        game_id,
        seated_as: seated_as.to_string(),
    }))
}

pub async fn get_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
) -> Result<Json<GameSnapshotResponse>, ApiError> {
    authenticate(&state, &headers)?;
    let handle = state.registry.lookup(&game_id).await?;
    let snapshot = handle.snapshot().await.map_err(ApiError::from)?;
    Ok(Json(snapshot_to_dto(&snapshot)))
}

pub async fn make_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
    Json(req): Json<MakeMoveRequest>,
) -> Result<Json<GameSnapshotResponse>, ApiError> {
    let identity = authenticate(&state, &headers)?;
    if !state.move_limiter.try_acquire(&format!("{}:{game_id}", identity.user_id)) {
        return Err(rate_limited());
    }

    let from = chess::parse_square(&req.from).ok_or_else(|| invalid_arg("invalid `from` square"))?;
    let to = chess::parse_square(&req.to).ok_or_else(|| invalid_arg("invalid `to` square"))?;
    let promotion = req
        .promotion
        .as_deref()
        .map(|p| p.chars().next().and_then(PieceKind::from_char).ok_or_else(|| invalid_arg("invalid promotion piece")))
        .transpose()?;

    let handle = state.registry.lookup(&game_id).await?;
    let snapshot = handle.make_move(identity.user_id, from, to, promotion).await.map_err(ApiError::from)?;
    Ok(Json(snapshot_to_dto(&snapshot)))
}

pub async fn resign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
) -> Result<Json<GameSnapshotResponse>, ApiError> {
    let identity = authenticate(&state, &headers)?;
    let handle = state.registry.lookup(&game_id).await?;
    let snapshot = handle.resign(identity.user_id).await.map_err(ApiError::from)?;
    Ok(Json(snapshot_to_dto(&snapshot)))
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<MoveHistoryResponse>, ApiError> {
    authenticate(&state, &headers)?;
    let (moves, total) = state
        .moves
        .list_moves(&game_id, page.limit as i64, page.offset as i64)
        .await
        .map_err(|_| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "durable store read failed".to_string(),
        })?;

    Ok(Json(MoveHistoryResponse {
        moves: moves.iter().map(move_row_to_dto).collect(),
        total: total as u32,
    }))
}

pub async fn lobby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<Json<LobbyResponse>, ApiError> {
    authenticate(&state, &headers)?;

    let games = if let Some(cached) = state.lobby_cache.get() {
        cached
    } else {
        let fetched = state
            .games
            .list_lobby(page.limit as i64, page.offset as i64)
            .await
            .map_err(|_| ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: "durable store read failed".to_string(),
            })?;
        state.lobby_cache.put(fetched.clone());
        fetched
    };

    let mut entries = Vec::with_capacity(games.len());
    for game in games {
        let creator_id = game.white_id.clone().or(game.black_id.clone()).unwrap_or_default();
        let creator_elo = state
            .users
            .get_user(&creator_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.elo_rating)
            .unwrap_or(1200);
        let open_seat = if game.white_id.is_none() { "white" } else { "black" };

        entries.push(LobbyEntryDto {
            id: game.id,
            time_control: TimeControlDto {
                initial_ms: game.time_control_ms as u64,
                increment_ms: game.increment_ms as u64,
                delay_ms: game.delay_ms as u64,
                delay_mode: delay_mode_dto_from_str(&game.delay_mode),
            },
            creator_id,
            creator_elo,
            open_seat: open_seat.to_string(),
        });
    }

    Ok(Json(LobbyResponse { games: entries }))
}

fn move_row_to_dto(row: &MoveRow) -> MoveHistoryEntryDto {
    MoveHistoryEntryDto {
        ordinal: row.ordinal as u32,
        color: row.color.clone(),
        from: row.from.clone(),
        to: row.to.clone(),
        san: row.san.clone(),
        is_check: row.is_check,
        is_checkmate: row.is_checkmate,
        elapsed_ms: row.elapsed_ms as u64,
    }
}
