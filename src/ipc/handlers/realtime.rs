use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{authenticate, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::notify::SubscriptionHandle;
use crate::roster;
use serde_json::json;

fn realtime_join(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let conn = require_db(&state.db)?;
    roster::require_member(conn, &group_id, &user.id)?;

    let handle = match state.subscriptions.get(&group_id) {
        Some(existing) => *existing,
        None => {
            let handle = state.hub.subscribe(&group_id, state.events.clone());
            state.subscriptions.insert(group_id.clone(), handle);
            handle
        }
    };
    let observers = state.hub.subscriber_count(&group_id);
    Ok(json!({
        "groupId": group_id,
        "subscriptionId": handle.id(),
        "observers": observers,
    }))
}

fn realtime_leave(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    authenticate(&state.tokens, req)?;
    let subscription_id = req
        .params
        .get("subscriptionId")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing subscriptionId"))?;
    let handle = SubscriptionHandle::from_id(subscription_id);
    let Some(group_id) = state.hub.unsubscribe(handle) else {
        return Err(HandlerErr::new("not_found", "subscription not found"));
    };
    state.subscriptions.remove(&group_id);
    Ok(json!({ "groupId": group_id, "left": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "realtime.join" => realtime_join(state, req),
        "realtime.leave" => realtime_leave(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
