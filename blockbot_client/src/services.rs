// Boundaries to collaborators outside the game connection.
//
// `SessionService` stands in for the account service the server may ask us
// to authenticate against during the handshake. Only the offline variant is
// provided: it makes no remote calls and accepts everything.
//
// `LocationStore` remembers named places for the `mark` and `goto` chat
// commands. `MemoryLocationStore` lives and dies with the process;
// `JsonLocationStore` persists to a JSON object on disk, rewritten in full
// on every save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockbot_agent::BlockPos;
use tracing::{debug, info};

use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Session service
// ---------------------------------------------------------------------------

pub trait SessionService {
    /// Authenticate the account and return a session token.
    fn login(&mut self, username: &str, password: &str) -> Result<String, ClientError>;

    /// Tell the service we are joining the server that sent `server_id`.
    fn join(&mut self, server_id: &str, token: &str) -> Result<(), ClientError>;
}

/// Session service for servers that do not verify accounts.
#[derive(Debug, Default)]
pub struct OfflineSession;

impl SessionService for OfflineSession {
    fn login(&mut self, username: &str, _password: &str) -> Result<String, ClientError> {
        debug!(username, "offline login");
        Ok(format!("offline-{username}"))
    }

    fn join(&mut self, server_id: &str, _token: &str) -> Result<(), ClientError> {
        debug!(server_id, "offline join");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Location store
// ---------------------------------------------------------------------------

pub trait LocationStore {
    fn save(&mut self, name: &str, pos: BlockPos) -> Result<(), ClientError>;
    fn load(&self, name: &str) -> Option<BlockPos>;
}

#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    places: BTreeMap<String, BlockPos>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationStore for MemoryLocationStore {
    fn save(&mut self, name: &str, pos: BlockPos) -> Result<(), ClientError> {
        self.places.insert(name.to_owned(), pos);
        Ok(())
    }

    fn load(&self, name: &str) -> Option<BlockPos> {
        self.places.get(name).copied()
    }
}

#[derive(Debug)]
pub struct JsonLocationStore {
    path: PathBuf,
    places: BTreeMap<String, BlockPos>,
}

impl JsonLocationStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let places = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), "location store opened");
        Ok(Self { path, places })
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl LocationStore for JsonLocationStore {
    fn save(&mut self, name: &str, pos: BlockPos) -> Result<(), ClientError> {
        self.places.insert(name.to_owned(), pos);
        let json = serde_json::to_string_pretty(&self.places)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self, name: &str) -> Option<BlockPos> {
        self.places.get(name).copied()
    }
}
