//! Binary frame codec
//!
//! Every frame starts with a [`MsgTag`] byte. Sync frames carry fixed-size
//! big-endian input records; every other frame carries a UTF-8 JSON payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::{Fixed, Input, InputKind, Vec2};

use super::protocol::{
    ApiKind, ApiReply, ApiRequest, ApiResponse, ClientMessage, ClientSync, GameStartMsg, MsgTag,
    PlayerInfo, PlayerListMsg, RoomInfo, RoomListMsg, RoomMsg, ServerMessage, ServerSync,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message tag {0}")]
    UnknownTag(u8),

    #[error("unknown input tag {0}")]
    UnknownInput(u8),

    #[error("truncated frame: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("tag {0:?} is not valid in this direction")]
    UnexpectedTag(MsgTag),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 payload: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

// ---- input records ----

fn put_vec2(buf: &mut BytesMut, v: Vec2) {
    buf.put_i32(v.x.raw());
    buf.put_i32(v.y.raw());
}

fn get_vec2(buf: &mut &[u8]) -> Vec2 {
    let x = Fixed::from_raw(buf.get_i32());
    let y = Fixed::from_raw(buf.get_i32());
    Vec2::new(x, y)
}

pub fn encode_input(buf: &mut BytesMut, input: &Input) {
    buf.reserve(input.kind().record_len());
    buf.put_u8(input.kind() as u8);
    match *input {
        Input::ActorMove {
            actor_id,
            direction,
            dt,
        } => {
            buf.put_u32(actor_id);
            put_vec2(buf, direction);
            buf.put_i32(dt.raw());
        }
        Input::WeaponShoot {
            owner_id,
            position,
            direction,
        } => {
            buf.put_u32(owner_id);
            put_vec2(buf, position);
            put_vec2(buf, direction);
        }
        Input::TimePast { dt } => {
            buf.put_i32(dt.raw());
        }
    }
}

/// Read one record from the front of `buf`, advancing past it
pub fn decode_input(buf: &mut &[u8]) -> Result<Input, CodecError> {
    let Some(&tag) = buf.first() else {
        return Err(CodecError::Truncated {
            needed: 1,
            remaining: 0,
        });
    };
    let kind = InputKind::try_from(tag).map_err(CodecError::UnknownInput)?;
    let needed = kind.record_len();
    if buf.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    buf.advance(1);

    Ok(match kind {
        InputKind::ActorMove => {
            let actor_id = buf.get_u32();
            let direction = get_vec2(buf);
            let dt = Fixed::from_raw(buf.get_i32());
            Input::ActorMove {
                actor_id,
                direction,
                dt,
            }
        }
        InputKind::WeaponShoot => {
            let owner_id = buf.get_u32();
            let position = get_vec2(buf);
            let direction = get_vec2(buf);
            Input::WeaponShoot {
                owner_id,
                position,
                direction,
            }
        }
        InputKind::TimePast => Input::TimePast {
            dt: Fixed::from_raw(buf.get_i32()),
        },
    })
}

fn read_u32(buf: &mut &[u8]) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated {
            needed: 4,
            remaining: buf.remaining(),
        });
    }
    Ok(buf.get_u32())
}

// ---- JSON payloads ----

fn json_frame<T: Serialize + ?Sized>(tag: MsgTag, payload: &T) -> Result<Bytes, CodecError> {
    let body = serde_json::to_vec(payload)?;
    let mut buf = BytesMut::with_capacity(1 + body.len());
    buf.put_u8(tag as u8);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

fn json_body<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

#[derive(Serialize, Deserialize)]
struct NicknameBody {
    nickname: String,
}

#[derive(Serialize, Deserialize)]
struct RoomIdBody {
    room_id: u32,
}

#[derive(Serialize, Deserialize)]
struct Empty {}

#[derive(Serialize, Deserialize)]
struct PlayerBody {
    player: PlayerInfo,
}

#[derive(Serialize, Deserialize)]
struct PlayersBody {
    list: Vec<PlayerInfo>,
}

#[derive(Serialize, Deserialize)]
struct RoomBody {
    room: RoomInfo,
}

#[derive(Serialize, Deserialize)]
struct RoomsBody {
    list: Vec<RoomInfo>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    res: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn reply_value(reply: &ApiReply) -> Result<Value, CodecError> {
    let value = match reply {
        ApiReply::PlayerJoin { player } => serde_json::to_value(PlayerBody {
            player: player.clone(),
        })?,
        ApiReply::PlayerList { list } => serde_json::to_value(PlayersBody { list: list.clone() })?,
        ApiReply::RoomCreate { room } | ApiReply::RoomJoin { room } => {
            serde_json::to_value(RoomBody { room: room.clone() })?
        }
        ApiReply::RoomList { list } => serde_json::to_value(RoomsBody { list: list.clone() })?,
        ApiReply::RoomLeave | ApiReply::GameStart => serde_json::to_value(Empty {})?,
    };
    Ok(value)
}

fn parse_reply(api: ApiKind, res: Value) -> Result<ApiReply, CodecError> {
    Ok(match api {
        ApiKind::PlayerJoin => {
            let body: PlayerBody = serde_json::from_value(res)?;
            ApiReply::PlayerJoin {
                player: body.player,
            }
        }
        ApiKind::PlayerList => {
            let body: PlayersBody = serde_json::from_value(res)?;
            ApiReply::PlayerList { list: body.list }
        }
        ApiKind::RoomCreate => {
            let body: RoomBody = serde_json::from_value(res)?;
            ApiReply::RoomCreate { room: body.room }
        }
        ApiKind::RoomList => {
            let body: RoomsBody = serde_json::from_value(res)?;
            ApiReply::RoomList { list: body.list }
        }
        ApiKind::RoomJoin => {
            let body: RoomBody = serde_json::from_value(res)?;
            ApiReply::RoomJoin { room: body.room }
        }
        ApiKind::RoomLeave => ApiReply::RoomLeave,
        ApiKind::GameStart => ApiReply::GameStart,
    })
}

// ---- client -> server ----

pub fn encode_client(msg: &ClientMessage) -> Result<Bytes, CodecError> {
    match msg {
        ClientMessage::ClientSync(sync) => {
            let mut buf = BytesMut::with_capacity(5 + sync.input.kind().record_len());
            buf.put_u8(MsgTag::MsgClientSync as u8);
            buf.put_u32(sync.frame_id);
            encode_input(&mut buf, &sync.input);
            Ok(buf.freeze())
        }
        ClientMessage::Request(request) => {
            let tag = request.kind().tag();
            match request {
                ApiRequest::PlayerJoin { nickname } => json_frame(
                    tag,
                    &NicknameBody {
                        nickname: nickname.clone(),
                    },
                ),
                ApiRequest::RoomJoin { room_id } => json_frame(tag, &RoomIdBody { room_id: *room_id }),
                ApiRequest::PlayerList
                | ApiRequest::RoomCreate
                | ApiRequest::RoomList
                | ApiRequest::RoomLeave
                | ApiRequest::GameStart => json_frame(tag, &Empty {}),
            }
        }
    }
}

pub fn decode_client(frame: &[u8]) -> Result<ClientMessage, CodecError> {
    let (&raw_tag, mut rest) = frame.split_first().ok_or(CodecError::Empty)?;
    let tag = MsgTag::try_from(raw_tag).map_err(CodecError::UnknownTag)?;

    if tag == MsgTag::MsgClientSync {
        let frame_id = read_u32(&mut rest)?;
        let input = decode_input(&mut rest)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes(rest.len()));
        }
        return Ok(ClientMessage::ClientSync(ClientSync { frame_id, input }));
    }

    let api = ApiKind::from_tag(tag).ok_or(CodecError::UnexpectedTag(tag))?;
    let request = match api {
        ApiKind::PlayerJoin => {
            let body: NicknameBody = json_body(rest)?;
            ApiRequest::PlayerJoin {
                nickname: body.nickname,
            }
        }
        ApiKind::RoomJoin => {
            let body: RoomIdBody = json_body(rest)?;
            ApiRequest::RoomJoin {
                room_id: body.room_id,
            }
        }
        // Bodies of argument-less calls are ignored
        ApiKind::PlayerList => ApiRequest::PlayerList,
        ApiKind::RoomCreate => ApiRequest::RoomCreate,
        ApiKind::RoomList => ApiRequest::RoomList,
        ApiKind::RoomLeave => ApiRequest::RoomLeave,
        ApiKind::GameStart => ApiRequest::GameStart,
    };
    Ok(ClientMessage::Request(request))
}

// ---- server -> client ----

pub fn encode_server(msg: &ServerMessage) -> Result<Bytes, CodecError> {
    let tag = msg.tag();
    match msg {
        ServerMessage::ServerSync(sync) => {
            let records: usize = sync.inputs.iter().map(|i| i.kind().record_len()).sum();
            let mut buf = BytesMut::with_capacity(5 + records);
            buf.put_u8(tag as u8);
            buf.put_u32(sync.last_frame_id);
            for input in &sync.inputs {
                encode_input(&mut buf, input);
            }
            Ok(buf.freeze())
        }
        ServerMessage::Response(response) => {
            let envelope = match &response.outcome {
                Ok(reply) => Envelope {
                    success: true,
                    res: Some(reply_value(reply)?),
                    error: None,
                },
                Err(message) => Envelope {
                    success: false,
                    res: None,
                    error: Some(message.clone()),
                },
            };
            json_frame(tag, &envelope)
        }
        ServerMessage::PlayerList(body) => json_frame(tag, body),
        ServerMessage::RoomList(body) => json_frame(tag, body),
        ServerMessage::Room(body) => json_frame(tag, body),
        ServerMessage::GameStart(body) => json_frame(tag, body),
    }
}

pub fn decode_server(frame: &[u8]) -> Result<ServerMessage, CodecError> {
    let (&raw_tag, mut rest) = frame.split_first().ok_or(CodecError::Empty)?;
    let tag = MsgTag::try_from(raw_tag).map_err(CodecError::UnknownTag)?;

    if let Some(api) = ApiKind::from_tag(tag) {
        let envelope: Envelope = json_body(rest)?;
        let outcome = if envelope.success {
            Ok(parse_reply(api, envelope.res.unwrap_or(Value::Null))?)
        } else {
            Err(envelope.error.unwrap_or_default())
        };
        return Ok(ServerMessage::Response(ApiResponse { api, outcome }));
    }

    Ok(match tag {
        MsgTag::MsgServerSync => {
            let last_frame_id = read_u32(&mut rest)?;
            let mut inputs = Vec::new();
            while !rest.is_empty() {
                inputs.push(decode_input(&mut rest)?);
            }
            ServerMessage::ServerSync(ServerSync {
                last_frame_id,
                inputs,
            })
        }
        MsgTag::MsgPlayerList => ServerMessage::PlayerList(json_body::<PlayerListMsg>(rest)?),
        MsgTag::MsgRoomList => ServerMessage::RoomList(json_body::<RoomListMsg>(rest)?),
        MsgTag::MsgRoom => ServerMessage::Room(json_body::<RoomMsg>(rest)?),
        MsgTag::MsgGameStart => ServerMessage::GameStart(json_body::<GameStartMsg>(rest)?),
        other => return Err(CodecError::UnexpectedTag(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::WorldState;

    fn v(x: i32, y: i32) -> Vec2 {
        Vec2::new(Fixed::from_raw(x), Fixed::from_raw(y))
    }

    #[test]
    fn record_sizes_match_layout() {
        let inputs = [
            Input::ActorMove {
                actor_id: 1,
                direction: v(1000, 0),
                dt: Fixed::from_raw(16),
            },
            Input::WeaponShoot {
                owner_id: 1,
                position: v(0, 0),
                direction: v(0, -1000),
            },
            Input::TimePast {
                dt: Fixed::from_raw(17),
            },
        ];
        for input in inputs {
            let mut buf = BytesMut::new();
            encode_input(&mut buf, &input);
            assert_eq!(buf.len(), input.kind().record_len());
        }
    }

    #[test]
    fn actor_move_layout_is_big_endian() {
        let mut buf = BytesMut::new();
        encode_input(
            &mut buf,
            &Input::ActorMove {
                actor_id: 0x0102_0304,
                direction: v(-1000, 500),
                dt: Fixed::ZERO,
            },
        );
        assert_eq!(
            &buf[..],
            &[
                0, 1, 2, 3, 4, 0xff, 0xff, 0xfc, 0x18, 0, 0, 0x01, 0xf4, 0, 0, 0, 0
            ]
        );
    }

    #[test]
    fn client_sync_round_trip_keeps_extremes() {
        let msg = ClientMessage::ClientSync(ClientSync {
            frame_id: u32::MAX,
            input: Input::WeaponShoot {
                owner_id: u32::MAX,
                position: v(-960_000, 640_000),
                direction: v(i32::MIN, i32::MAX),
            },
        });
        let frame = encode_client(&msg).unwrap();
        assert_eq!(frame.len(), 5 + 21);
        assert_eq!(decode_client(&frame).unwrap(), msg);
    }

    #[test]
    fn every_input_variant_keeps_extremes() {
        let inputs = [
            Input::ActorMove {
                actor_id: u32::MAX,
                direction: v(-707, -707),
                dt: Fixed::ZERO,
            },
            Input::ActorMove {
                actor_id: 0,
                direction: v(i32::MIN, i32::MAX),
                dt: Fixed::from_raw(i32::MIN),
            },
            Input::TimePast {
                dt: Fixed::from_raw(i32::MIN),
            },
            Input::TimePast {
                dt: Fixed::from_raw(i32::MAX),
            },
        ];
        for input in inputs {
            let msg = ClientMessage::ClientSync(ClientSync {
                frame_id: u32::MAX,
                input,
            });
            let frame = encode_client(&msg).unwrap();
            assert_eq!(frame.len(), 5 + input.kind().record_len());
            assert_eq!(decode_client(&frame).unwrap(), msg);
        }
    }

    #[test]
    fn server_sync_carries_many_records() {
        let sync = ServerSync {
            last_frame_id: 11,
            inputs: vec![
                Input::ActorMove {
                    actor_id: 2,
                    direction: v(0, 1000),
                    dt: Fixed::ZERO,
                },
                Input::TimePast {
                    dt: Fixed::from_raw(50),
                },
                Input::TimePast {
                    dt: Fixed::from_raw(-1),
                },
            ],
        };
        let frame = encode_server(&ServerMessage::ServerSync(sync.clone())).unwrap();
        assert_eq!(frame.len(), 5 + 17 + 5 + 5);
        assert_eq!(
            decode_server(&frame).unwrap(),
            ServerMessage::ServerSync(sync)
        );
    }

    #[test]
    fn empty_server_sync_is_five_bytes() {
        let frame = encode_server(&ServerMessage::ServerSync(ServerSync {
            last_frame_id: 0,
            inputs: vec![],
        }))
        .unwrap();
        assert_eq!(&frame[..], &[12, 0, 0, 0, 0]);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(decode_client(&[]), Err(CodecError::Empty)));
        assert!(matches!(
            decode_client(&[200]),
            Err(CodecError::UnknownTag(200))
        ));
        assert!(matches!(
            decode_client(&[11, 0, 0, 0, 1, 9]),
            Err(CodecError::UnknownInput(9))
        ));
        assert!(matches!(
            decode_client(&[11, 0, 0, 0, 1, 2, 0, 0]),
            Err(CodecError::Truncated {
                needed: 5,
                remaining: 3
            })
        ));
        assert!(matches!(
            decode_client(&[11, 0, 0, 0, 1, 2, 0, 0, 0, 1, 7]),
            Err(CodecError::TrailingBytes(1))
        ));
        assert!(matches!(
            decode_server(&[12, 0, 0, 0, 1, 2, 0]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn direction_mismatch_is_unexpected() {
        let server_only = encode_server(&ServerMessage::ServerSync(ServerSync {
            last_frame_id: 1,
            inputs: vec![],
        }))
        .unwrap();
        assert!(matches!(
            decode_client(&server_only),
            Err(CodecError::UnexpectedTag(MsgTag::MsgServerSync))
        ));

        let client_only = encode_client(&ClientMessage::ClientSync(ClientSync {
            frame_id: 1,
            input: Input::TimePast { dt: Fixed::ZERO },
        }))
        .unwrap();
        assert!(matches!(
            decode_server(&client_only),
            Err(CodecError::UnexpectedTag(MsgTag::MsgClientSync))
        ));
    }

    #[test]
    fn requests_use_tag_plus_json() {
        let frame = encode_client(&ClientMessage::Request(ApiRequest::PlayerJoin {
            nickname: "ace".into(),
        }))
        .unwrap();
        assert_eq!(frame[0], 0);
        assert_eq!(&frame[1..], br#"{"nickname":"ace"}"#);

        let parsed = decode_client(&[MsgTag::ApiRoomJoin as u8]
            .iter()
            .copied()
            .chain(br#"{"room_id":7}"#.iter().copied())
            .collect::<Vec<u8>>())
        .unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Request(ApiRequest::RoomJoin { room_id: 7 })
        );
    }

    #[test]
    fn response_envelope_shapes() {
        let failure = ServerMessage::Response(ApiResponse::error(ApiKind::RoomJoin, "room is full"));
        let frame = encode_server(&failure).unwrap();
        assert_eq!(frame[0], MsgTag::ApiRoomJoin as u8);
        let json: Value = serde_json::from_slice(&frame[1..]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "room is full"})
        );
        assert_eq!(decode_server(&frame).unwrap(), failure);

        let player = PlayerInfo {
            id: 3,
            nickname: "ace".into(),
            room_id: None,
        };
        let success = ServerMessage::Response(ApiResponse::ok(
            ApiKind::PlayerJoin,
            ApiReply::PlayerJoin {
                player: player.clone(),
            },
        ));
        let frame = encode_server(&success).unwrap();
        let json: Value = serde_json::from_slice(&frame[1..]).unwrap();
        assert_eq!(json["success"], Value::Bool(true));
        assert_eq!(json["res"]["player"]["nickname"], "ace");
        assert_eq!(decode_server(&frame).unwrap(), success);
    }

    #[test]
    fn game_start_carries_snapshot() {
        let msg = ServerMessage::GameStart(GameStartMsg {
            room: RoomInfo {
                id: 1,
                name: "room-1".into(),
                owner_id: 1,
                players: vec![],
                max_players: 4,
                running: true,
            },
            state: WorldState::new(42),
        });
        let frame = encode_server(&msg).unwrap();
        assert_eq!(frame[0], 10);
        assert_eq!(decode_server(&frame).unwrap(), msg);
    }
}
