//! Client for the lichess board API.

use std::time::Duration;

use common::{error::RemoteError, grid::Side, session::GameClient};
use futures::future::BoxFuture;
use reqwest::{
    Client, Response,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use tracing::debug;

/// A game from `account/playing`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingGame {
    pub full_id: String,
    pub game_id: String,
    pub color: Side,
    #[serde(default)]
    pub is_my_turn: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NowPlaying {
    now_playing: Vec<PlayingGame>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GameState {
    #[serde(deserialize_with = "split_moves")]
    pub moves: Vec<String>,
    pub wtime: u64,
    pub btime: u64,
    pub status: String,
    #[serde(default)]
    pub winner: Option<Side>,
}

fn split_moves<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let moves = String::deserialize(deserializer)?;
    Ok(moves.split_whitespace().map(String::from).collect())
}

/// One line of the game stream.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    GameFull {
        state: GameState,
    },
    GameState(GameState),
    ChatLine {
        username: String,
        text: String,
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    OpponentGone {
        gone: bool,
        #[serde(default)]
        claim_win_in_seconds: Option<i64>,
    },
    #[serde(other)]
    Other,
}

/// Splits newline delimited JSON that may arrive cut at any byte.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        Some(line)
    }
}

pub struct GameStream {
    response: Response,
    lines: LineBuffer,
}

impl GameStream {
    /// Next event, or `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<GameEvent>, RemoteError> {
        loop {
            while let Some(line) = self.lines.next_line() {
                // lichess sends empty lines as keep-alives
                if line.trim_ascii().is_empty() {
                    continue;
                }
                return parse(&line).map(Some);
            }
            match self.response.chunk().await.map_err(transport)? {
                Some(chunk) => self.lines.extend(&chunk),
                None => return Ok(None),
            }
        }
    }
}

#[derive(Clone)]
pub struct Lichess {
    http: Client,
    api_base: String,
}

impl Lichess {
    pub fn new(api_base: &str, token: &str) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    /// The game the account is currently playing, if any.
    pub async fn current_game(&self) -> Result<Option<PlayingGame>, RemoteError> {
        let request = self
            .http
            .get(self.url("account/playing"))
            .query(&[("nb", "1")]);
        let response = checked(request.send().await).await?;
        let body = response.bytes().await.map_err(transport)?;
        let playing: NowPlaying = parse(&body)?;
        Ok(playing.now_playing.into_iter().next())
    }

    pub async fn stream_game(&self, game_id: &str) -> Result<GameStream, RemoteError> {
        let request = self.http.get(self.url(&format!("board/game/stream/{game_id}")));
        let response = checked(request.send().await).await?;
        Ok(GameStream {
            response,
            lines: LineBuffer::default(),
        })
    }

    async fn post(&self, path: String) -> Result<(), RemoteError> {
        debug!(%path, "POST");
        checked(self.http.post(self.url(&path)).send().await).await?;
        Ok(())
    }
}

impl GameClient for Lichess {
    fn submit_move<'a>(
        &'a self,
        game_id: &'a str,
        mv: &'a str,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.post(format!("board/game/{game_id}/move/{mv}")))
    }

    fn claim_victory<'a>(&'a self, game_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.post(format!("board/game/{game_id}/claim-victory")))
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(bytes)
        .map_err(|e| RemoteError::Protocol(format!("{e} in {}", String::from_utf8_lossy(bytes))))
}

async fn checked(response: reqwest::Result<Response>) -> Result<Response, RemoteError> {
    let response = response.map_err(transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_game_full() {
        let line = br#"{"type":"gameFull","id":"5IrD6Gzz","rated":false,"variant":{"key":"standard"},"clock":{"initial":600000,"increment":0},"speed":"rapid","white":{"id":"bobby","name":"bobby"},"black":{"id":"mary","name":"mary"},"initialFen":"startpos","state":{"type":"gameState","moves":"e2e4 c7c5 f2f4","wtime":597000,"btime":600000,"winc":0,"binc":0,"status":"started"}}"#;
        let event: GameEvent = parse(line).unwrap();
        let GameEvent::GameFull { state } = event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(state.moves, ["e2e4", "c7c5", "f2f4"]);
        assert_eq!(state.wtime, 597000);
        assert_eq!(state.status, "started");
        assert_eq!(state.winner, None);
    }

    #[test]
    fn parses_game_state_with_no_moves() {
        let line = br#"{"type":"gameState","moves":"","wtime":600000,"btime":600000,"winc":0,"binc":0,"status":"started"}"#;
        let GameEvent::GameState(state) = parse(line).unwrap() else {
            panic!("expected a game state");
        };
        assert!(state.moves.is_empty());
    }

    #[test]
    fn parses_finished_game_state() {
        let line = br#"{"type":"gameState","moves":"f2f3 e7e5 g2g4 d8h4","wtime":1,"btime":2,"status":"mate","winner":"black"}"#;
        let GameEvent::GameState(state) = parse(line).unwrap() else {
            panic!("expected a game state");
        };
        assert_eq!(state.moves.len(), 4);
        assert_eq!(state.winner, Some(Side::Black));
    }

    #[test]
    fn parses_opponent_gone() {
        let gone: GameEvent =
            parse(br#"{"type":"opponentGone","gone":true,"claimWinInSeconds":0}"#).unwrap();
        assert_eq!(
            gone,
            GameEvent::OpponentGone {
                gone: true,
                claim_win_in_seconds: Some(0)
            }
        );
        let back: GameEvent = parse(br#"{"type":"opponentGone","gone":false}"#).unwrap();
        assert_eq!(
            back,
            GameEvent::OpponentGone {
                gone: false,
                claim_win_in_seconds: None
            }
        );
    }

    #[test]
    fn parses_chat_and_ignores_unknown_events() {
        let chat: GameEvent =
            parse(br#"{"type":"chatLine","room":"player","username":"mary","text":"gl hf"}"#)
                .unwrap();
        assert!(matches!(chat, GameEvent::ChatLine { ref text, .. } if text == "gl hf"));

        let other: GameEvent = parse(br#"{"type":"somethingNew","data":1}"#).unwrap();
        assert_eq!(other, GameEvent::Other);
    }

    #[test]
    fn malformed_lines_are_protocol_errors() {
        let err = parse::<GameEvent>(b"{\"type\":\"gameState\"").unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
    }

    #[test]
    fn parses_now_playing() {
        let body = br#"{"nowPlaying":[{"fullId":"abcd1234wxyz","gameId":"abcd1234","fen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1","color":"white","lastMove":"","source":"lobby","isMyTurn":true,"opponent":{"id":"mary","username":"mary","rating":1500}}]}"#;
        let playing: NowPlaying = parse(body).unwrap();
        assert_eq!(
            playing.now_playing,
            [PlayingGame {
                full_id: "abcd1234wxyz".into(),
                game_id: "abcd1234".into(),
                color: Side::White,
                is_my_turn: true,
            }]
        );

        let idle: NowPlaying = parse(br#"{"nowPlaying":[]}"#).unwrap();
        assert!(idle.now_playing.is_empty());
    }

    #[test]
    fn lines_survive_chunk_boundaries() {
        let mut lines = LineBuffer::default();
        lines.extend(b"{\"a\":1}\n{\"b\"");
        assert_eq!(lines.next_line().as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(lines.next_line(), None);

        lines.extend(b":2}\n\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"{\"b\":2}"[..]));
        assert_eq!(lines.next_line().as_deref(), Some(&b""[..]));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn api_base_is_joined_with_paths() {
        let lichess = Lichess::new("https://lichess.org/api/", "lip_test").unwrap();
        assert_eq!(
            lichess.url("board/game/abc/move/e2e4"),
            "https://lichess.org/api/board/game/abc/move/e2e4"
        );
    }
}
