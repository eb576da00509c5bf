//! Request/response bodies for the thin HTTP shell (`POST /games`,
//! `GET /games/{id}`, etc).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayMode {
    None,
    FischerOnly,
    Bronstein,
    Simple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeControlDto {
    pub initial_ms: u64,
    pub increment_ms: u64,
    pub delay_ms: u64,
    pub delay_mode: DelayMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPreference {
    White,
    Black,
    Random,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGameRequest {
    pub time_control: TimeControlDto,
    #[serde(default = "default_color_pref")]
    pub color_preference: ColorPreference,
}

fn default_color_pref() -> ColorPreference {
    ColorPreference::Random
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGameResponse {
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinGameResponse {
    pub game_id: String,
    pub seated_as: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MakeMoveRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshotResponse {
    pub id: String,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub fen: String,
    pub fsm_state: String,
    pub active_color: Option<String>,
    pub white_remaining_ms: u64,
    pub black_remaining_ms: u64,
    pub result: Option<String>,
    pub end_reason: Option<String>,
    pub winner_id: Option<String>,
    pub ply_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveHistoryEntryDto {
    pub ordinal: u32,
    pub color: String,
    pub from: String,
    pub to: String,
    pub san: String,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveHistoryResponse {
    pub moves: Vec<MoveHistoryEntryDto>,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobbyEntryDto {
    pub id: String,
    pub time_control: TimeControlDto,
    pub creator_id: String,
    pub creator_elo: i32,
    pub open_seat: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobbyResponse {
    pub games: Vec<LobbyEntryDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_game_request_defaults_color_to_random() {
        let json = r#"{"time_control":{"initial_ms":180000,"increment_ms":2000,"delay_ms":0,"delay_mode":"fischer_only"}}"#;
        let req: CreateGameRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.color_preference, ColorPreference::Random);
    }

    #[test]
    fn page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
    }
}
