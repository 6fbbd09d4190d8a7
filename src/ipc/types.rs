use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::TokenSigner;
use crate::cache::TtlCache;
use crate::model::AttendanceSheet;
use crate::notify::{GroupEvent, SubscriptionHandle, SubscriptionHub};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub tokens: TokenSigner,
    pub hub: SubscriptionHub,
    pub history_cache: TtlCache<Vec<AttendanceSheet>>,
    /// Where events for this session's subscriptions are delivered.
    pub events: Sender<GroupEvent>,
    /// This session's live subscriptions, one per group.
    pub subscriptions: HashMap<String, SubscriptionHandle>,
}
