//! Wire types shared with the remote peer.
//!
//! Push-channel frames are `{"event": ..., "data": ...}` objects; the payload
//! shapes below mirror what the planning server sends and expects. Everything
//! is decoded into explicit types at the boundary so a malformed payload fails
//! the trial instead of travelling further as untyped JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::{Cell, GameMap};

/// Event names used on the push channel.
pub mod events {
    /// Peer → client: the map for the requested trial.
    pub const INITIALIZE_GAME: &str = "initializeGame";
    /// Peer → client: revised posterior over the goals.
    pub const UPDATE_POSTERIOR: &str = "updatePosterior";
    /// Client → peer: ask for the map of a trial.
    pub const REQUEST_MAP: &str = "requestMap";
    /// Client → peer: participant pressed the ready button.
    pub const PLAYER_READY: &str = "playerReady";

    /// Local lifecycle notifications published by the transport itself.
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
}

pub const PLAYER_READY_MESSAGE: &str = "Player is ready!";

/// One line on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPayload {
    pub player_position: [i32; 2],
    pub goals: Vec<[i32; 2]>,
    #[serde(default)]
    pub blocks: Vec<[i32; 2]>,
}

impl MapPayload {
    pub fn to_map(&self) -> GameMap {
        GameMap {
            start: Cell::from(self.player_position),
            goals: self.goals.iter().copied().map(Cell::from).collect(),
            blocks: self.blocks.iter().copied().map(Cell::from).collect(),
        }
    }
}

/// `updatePosterior` payload: slots `G1..G3` address goals `0..2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosteriorPayload {
    #[serde(rename = "G1")]
    pub g1: f64,
    #[serde(rename = "G2")]
    pub g2: f64,
    #[serde(rename = "G3")]
    pub g3: f64,
}

impl PosteriorPayload {
    pub fn weights(&self) -> [f64; 3] {
        [self.g1, self.g2, self.g3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMap {
    pub trial_number: usize,
}

/// Opaque policy handed out by the game service and threaded back verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy(Value);

impl Policy {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Body of `POST /initialize`.
///
/// `goal` carries the player's start cell; the field name is what the
/// service expects.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest<'a> {
    pub custom_map: &'a MapPayload,
    pub goal: [i32; 2],
    pub gamma: f64,
    pub theta: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResponse {
    pub policy: Policy,
}

/// Body of `POST /update`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest<'a> {
    pub state: [i32; 2],
    pub action: [i32; 2],
    pub policy: &'a Policy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_payload_decodes_server_shape() {
        let raw = json!({
            "playerPosition": [0, 0],
            "goals": [[2, 0], [9, 9], [0, 9]],
            "blocks": [[1, 0], [4, 4]]
        });
        let payload: MapPayload = serde_json::from_value(raw).unwrap();
        let map = payload.to_map();
        assert_eq!(map.start, Cell::new(0, 0));
        assert_eq!(map.goals[0], Cell::new(2, 0));
        assert_eq!(map.blocks, vec![Cell::new(1, 0), Cell::new(4, 4)]);
    }

    #[test]
    fn map_payload_rejects_wrong_shapes() {
        let bad_cell = json!({ "playerPosition": [0], "goals": [], "blocks": [] });
        assert!(serde_json::from_value::<MapPayload>(bad_cell).is_err());

        let missing_goals = json!({ "playerPosition": [0, 0] });
        assert!(serde_json::from_value::<MapPayload>(missing_goals).is_err());

        let stringly = json!({ "playerPosition": ["0", "0"], "goals": [] });
        assert!(serde_json::from_value::<MapPayload>(stringly).is_err());
    }

    #[test]
    fn posterior_slots_map_in_order() {
        let p: PosteriorPayload =
            serde_json::from_value(json!({ "G1": 0.1, "G2": 0.7, "G3": 0.2 })).unwrap();
        assert_eq!(p.weights(), [0.1, 0.7, 0.2]);
        assert!(serde_json::from_value::<PosteriorPayload>(json!({ "G1": 0.1, "G2": 0.7 }))
            .is_err());
    }

    #[test]
    fn outbound_bodies_use_service_field_names() {
        let req = serde_json::to_value(RequestMap { trial_number: 2 }).unwrap();
        assert_eq!(req, json!({ "trialNumber": 2 }));

        let policy = Policy::new(json!({ "q": [[0.1, 0.2]] }));
        let update = UpdateRequest {
            state: [1, 1],
            action: [0, -1],
            policy: &policy,
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({ "state": [1, 1], "action": [0, -1], "policy": { "q": [[0.1, 0.2]] } })
        );

        let map = MapPayload {
            player_position: [0, 0],
            goals: vec![[2, 0]],
            blocks: vec![],
        };
        let init = InitializeRequest {
            custom_map: &map,
            goal: [0, 0],
            gamma: 0.9,
            theta: 0.1,
        };
        let v = serde_json::to_value(init).unwrap();
        assert_eq!(v["custom_map"]["playerPosition"], json!([0, 0]));
        assert_eq!(v["gamma"], json!(0.9));
    }

    #[test]
    fn envelope_defaults_missing_data_to_null() {
        let env: Envelope = serde_json::from_str(r#"{"event":"connect"}"#).unwrap();
        assert_eq!(env.event, events::CONNECT);
        assert!(env.data.is_null());
    }
}
