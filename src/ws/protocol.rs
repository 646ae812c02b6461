//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{Input, WorldState};

/// First byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgTag {
    ApiPlayerJoin = 0,
    ApiPlayerList = 1,
    ApiRoomCreate = 2,
    ApiRoomList = 3,
    ApiRoomJoin = 4,
    ApiRoomLeave = 5,
    ApiGameStart = 6,
    MsgPlayerList = 7,
    MsgRoomList = 8,
    MsgRoom = 9,
    MsgGameStart = 10,
    MsgClientSync = 11,
    MsgServerSync = 12,
}

impl TryFrom<u8> for MsgTag {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => MsgTag::ApiPlayerJoin,
            1 => MsgTag::ApiPlayerList,
            2 => MsgTag::ApiRoomCreate,
            3 => MsgTag::ApiRoomList,
            4 => MsgTag::ApiRoomJoin,
            5 => MsgTag::ApiRoomLeave,
            6 => MsgTag::ApiGameStart,
            7 => MsgTag::MsgPlayerList,
            8 => MsgTag::MsgRoomList,
            9 => MsgTag::MsgRoom,
            10 => MsgTag::MsgGameStart,
            11 => MsgTag::MsgClientSync,
            12 => MsgTag::MsgServerSync,
            other => return Err(other),
        })
    }
}

/// Request/response calls; the response reuses the request's tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    PlayerJoin,
    PlayerList,
    RoomCreate,
    RoomList,
    RoomJoin,
    RoomLeave,
    GameStart,
}

impl ApiKind {
    pub fn tag(self) -> MsgTag {
        match self {
            ApiKind::PlayerJoin => MsgTag::ApiPlayerJoin,
            ApiKind::PlayerList => MsgTag::ApiPlayerList,
            ApiKind::RoomCreate => MsgTag::ApiRoomCreate,
            ApiKind::RoomList => MsgTag::ApiRoomList,
            ApiKind::RoomJoin => MsgTag::ApiRoomJoin,
            ApiKind::RoomLeave => MsgTag::ApiRoomLeave,
            ApiKind::GameStart => MsgTag::ApiGameStart,
        }
    }

    pub fn from_tag(tag: MsgTag) -> Option<Self> {
        match tag {
            MsgTag::ApiPlayerJoin => Some(ApiKind::PlayerJoin),
            MsgTag::ApiPlayerList => Some(ApiKind::PlayerList),
            MsgTag::ApiRoomCreate => Some(ApiKind::RoomCreate),
            MsgTag::ApiRoomList => Some(ApiKind::RoomList),
            MsgTag::ApiRoomJoin => Some(ApiKind::RoomJoin),
            MsgTag::ApiRoomLeave => Some(ApiKind::RoomLeave),
            MsgTag::ApiGameStart => Some(ApiKind::GameStart),
            _ => None,
        }
    }
}

/// Player roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u32,
    pub nickname: String,
    pub room_id: Option<u32>,
}

/// Room roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: u32,
    pub name: String,
    pub owner_id: u32,
    pub players: Vec<PlayerInfo>,
    pub max_players: usize,
    pub running: bool,
}

/// Client calls into the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    PlayerJoin { nickname: String },
    PlayerList,
    RoomCreate,
    RoomList,
    RoomJoin { room_id: u32 },
    RoomLeave,
    GameStart,
}

impl ApiRequest {
    pub fn kind(&self) -> ApiKind {
        match self {
            ApiRequest::PlayerJoin { .. } => ApiKind::PlayerJoin,
            ApiRequest::PlayerList => ApiKind::PlayerList,
            ApiRequest::RoomCreate => ApiKind::RoomCreate,
            ApiRequest::RoomList => ApiKind::RoomList,
            ApiRequest::RoomJoin { .. } => ApiKind::RoomJoin,
            ApiRequest::RoomLeave => ApiKind::RoomLeave,
            ApiRequest::GameStart => ApiKind::GameStart,
        }
    }
}

/// Successful result of an [`ApiRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReply {
    PlayerJoin { player: PlayerInfo },
    PlayerList { list: Vec<PlayerInfo> },
    RoomCreate { room: RoomInfo },
    RoomList { list: Vec<RoomInfo> },
    RoomJoin { room: RoomInfo },
    RoomLeave,
    GameStart,
}

/// Answer to an [`ApiRequest`]; failures carry a readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub api: ApiKind,
    pub outcome: Result<ApiReply, String>,
}

impl ApiResponse {
    pub fn ok(api: ApiKind, reply: ApiReply) -> Self {
        Self {
            api,
            outcome: Ok(reply),
        }
    }

    pub fn error(api: ApiKind, message: impl Into<String>) -> Self {
        Self {
            api,
            outcome: Err(message.into()),
        }
    }
}

/// One locally issued input, tagged for acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSync {
    pub frame_id: u32,
    pub input: Input,
}

/// Inputs applied by the server since the last broadcast, plus the highest
/// frame id seen from the recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSync {
    pub last_frame_id: u32,
    pub inputs: Vec<Input>,
}

/// Roster pushes and game start payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerListMsg {
    pub list: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListMsg {
    pub list: Vec<RoomInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMsg {
    pub room: RoomInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartMsg {
    pub room: RoomInfo,
    pub state: WorldState,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Request(ApiRequest),
    ClientSync(ClientSync),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Response(ApiResponse),
    PlayerList(PlayerListMsg),
    RoomList(RoomListMsg),
    Room(RoomMsg),
    GameStart(GameStartMsg),
    ServerSync(ServerSync),
}

impl ServerMessage {
    pub fn tag(&self) -> MsgTag {
        match self {
            ServerMessage::Response(response) => response.api.tag(),
            ServerMessage::PlayerList(_) => MsgTag::MsgPlayerList,
            ServerMessage::RoomList(_) => MsgTag::MsgRoomList,
            ServerMessage::Room(_) => MsgTag::MsgRoom,
            ServerMessage::GameStart(_) => MsgTag::MsgGameStart,
            ServerMessage::ServerSync(_) => MsgTag::MsgServerSync,
        }
    }
}
